//! On-chain verification entrypoint
//!
//! `VerifiableCompute::submit_proof` mirrors the contract call a wallet makes:
//! every argument is a `uint256` (or a CID string), the proof arrives as EVM
//! calldata, and the outcome is reported through events.
//!
//! ```text
//! submit_proof ─► check uint256s are field elements ─► create job ─► JobCreated
//!                                                          │
//!                                  JobLedger::verify_job ◄─┘ ─► ProofSubmitted
//! ```
//!
//! A pairing failure is a normal outcome (`verified = false`, job `INVALID`),
//! not an error. Arguments that are not canonical field elements, or an output
//! that is not a bit, are refused before any job exists.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    circuit::field_to_bit,
    field::U256,
    ledger::NewJob,
    proof::Calldata,
    ComputeError, JobId, JobLedger, JobStatus, Proof, ProofBundle, PublicSignals, Result,
    Verifier, F,
};

/// Arguments of `submitProof`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProof {
    #[serde(rename = "modelCID")]
    pub model_cid: String,
    #[serde(rename = "inputCID")]
    pub input_cid: String,
    pub model_hash: U256,
    pub input_hash: U256,
    pub output: U256,
    pub p_a: [U256; 2],
    pub p_b: [[U256; 2]; 2],
    pub p_c: [U256; 2],
}

impl SubmitProof {
    /// Calldata for a proof bundle, as a wallet would build it.
    pub fn from_bundle(
        model_cid: impl Into<String>,
        input_cid: impl Into<String>,
        bundle: &ProofBundle,
    ) -> Result<Self> {
        let cd = bundle.proof.to_calldata()?;
        let s = &bundle.public_signals;
        Ok(Self {
            model_cid: model_cid.into(),
            input_cid: input_cid.into(),
            model_hash: U256::from_field(s.model_hash),
            input_hash: U256::from_field(s.input_hash),
            output: U256::from(s.output_u8() as u64),
            p_a: cd.a,
            p_b: cd.b,
            p_c: cd.c,
        })
    }

    fn signals(&self) -> Result<PublicSignals> {
        let output = field_to_bit(self.output.to_field::<F>()?).ok_or_else(|| {
            ComputeError::InvalidFieldElement(format!("output {} is not a bit", self.output))
        })?;
        Ok(PublicSignals::new(output, self.model_hash.to_field()?, self.input_hash.to_field()?))
    }

    fn proof(&self) -> Result<Proof> {
        Proof::from_calldata(&Calldata { a: self.p_a.clone(), b: self.p_b.clone(), c: self.p_c.clone() })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum ContractEvent {
    JobCreated { job_id: JobId, requester: String },
    ProofSubmitted { job_id: JobId, prover: String, verified: bool },
}

pub struct VerifiableCompute {
    ledger: Arc<JobLedger>,
    verifier: Arc<dyn Verifier>,
    events: Mutex<Vec<ContractEvent>>,
}

impl VerifiableCompute {
    pub fn new(ledger: Arc<JobLedger>, verifier: Arc<dyn Verifier>) -> Self {
        Self { ledger, verifier, events: Mutex::new(Vec::new()) }
    }

    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    fn emit(&self, ev: ContractEvent) {
        info!(?ev, "event");
        self.events.lock().unwrap_or_else(|p| p.into_inner()).push(ev);
    }

    /// Open a job for `sender` and settle it with the supplied proof.
    ///
    /// If the verifier cannot run (no key), the error is returned and the job
    /// stays `PENDING` with only `JobCreated` emitted.
    pub fn submit_proof(&self, sender: &str, call: &SubmitProof) -> Result<(JobId, bool)> {
        let signals = call.signals()?;
        let proof = call.proof()?;

        let job_id = self.ledger.create_job(NewJob::from_signals(
            sender,
            call.model_cid.clone(),
            call.input_cid.clone(),
            &signals,
        ));
        self.emit(ContractEvent::JobCreated { job_id, requester: sender.to_string() });

        let verified = match self.ledger.verify_job(job_id, &proof, &signals, self.verifier.as_ref()) {
            Ok(status) => status == JobStatus::Verified,
            Err(ComputeError::VerificationFailed) => false,
            Err(e) => return Err(e),
        };
        self.emit(ContractEvent::ProofSubmitted { job_id, prover: sender.to_string(), verified });
        Ok((job_id, verified))
    }

    /// Event log in emission order.
    pub fn events(&self) -> Vec<ContractEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
