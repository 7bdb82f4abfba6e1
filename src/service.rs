//! Async façade over the blocking core.
//!
//! Proving and pairing checks are CPU-bound, so they run on tokio's blocking
//! pool. Proving is bounded by a timeout; on expiry the caller gets
//! `ProofGenerationTimeout` while the blocking task runs to completion and its
//! result is dropped.

#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    config::{Backend, Config},
    contract::{SubmitProof, VerifiableCompute},
    AcceptAllVerifier, CommitmentHasher, ComputeError, Groth16Prover, Groth16Verifier,
    InputData, JobId, JobLedger, JobStatus, KeyRing, ModelData, Proof, ProofBundle, Prover,
    PublicSignals, Result, Verifier,
};

fn join_error(e: tokio::task::JoinError) -> ComputeError {
    ComputeError::Io(std::io::Error::other(format!("blocking task failed: {e}")))
}

#[derive(Clone)]
pub struct ProofService {
    prover: Arc<dyn Prover>,
    verifier: Arc<dyn Verifier>,
    ledger: Arc<JobLedger>,
    contract: Arc<VerifiableCompute>,
    keys: Option<Arc<KeyRing>>,
    prove_timeout: Duration,
}

impl std::fmt::Debug for ProofService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofService")
            .field("prover", &self.prover.name())
            .field("verifier", &self.verifier.name())
            .field("prove_timeout", &self.prove_timeout)
            .finish()
    }
}

impl ProofService {
    pub fn new(
        prover: Arc<dyn Prover>,
        verifier: Arc<dyn Verifier>,
        keys: Option<Arc<KeyRing>>,
        prove_timeout: Duration,
    ) -> Self {
        let ledger = Arc::new(JobLedger::new());
        let contract = Arc::new(VerifiableCompute::new(ledger.clone(), verifier.clone()));
        Self { prover, verifier, ledger, contract, keys, prove_timeout }
    }

    /// Wire up the backend named in `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        let hasher = CommitmentHasher::new();
        match cfg.backend {
            Backend::Groth16 => {
                let ring = Arc::new(KeyRing::new(cfg.key_source(), hasher));
                Self::new(
                    Arc::new(Groth16Prover::new(ring.clone())),
                    Arc::new(Groth16Verifier::new(ring.clone())),
                    Some(ring),
                    cfg.prove_timeout,
                )
            }
            Backend::Mock => {
                warn!("mock backend: proofs are placeholders and every proof is accepted");
                Self::new(
                    Arc::new(crate::MockProver::new(hasher)),
                    Arc::new(AcceptAllVerifier),
                    None,
                    cfg.prove_timeout,
                )
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.prover.name()
    }

    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    pub fn contract(&self) -> &Arc<VerifiableCompute> {
        &self.contract
    }

    /// Load or generate keys now instead of on the first request.
    pub async fn warm_up(&self) -> Result<()> {
        let Some(ring) = self.keys.clone() else {
            return Ok(());
        };
        let keys = tokio::task::spawn_blocking(move || ring.get_or_init())
            .await
            .map_err(join_error)?
            .map_err(|e| {
                warn!(error = %e, "key initialization failed");
                ComputeError::ProvingKeyUnavailable
            })?;
        info!(vk_digest = %keys.vk_digest_hex(), "keys ready");
        Ok(())
    }

    pub async fn prove(&self, model: ModelData, input: InputData) -> Result<ProofBundle> {
        let prover = self.prover.clone();
        let task = tokio::task::spawn_blocking(move || {
            crate::prover::generate_proof(prover.as_ref(), &model, &input)
        });
        match tokio::time::timeout(self.prove_timeout, task).await {
            Ok(joined) => joined.map_err(join_error)?,
            Err(_) => {
                warn!(timeout_ms = self.prove_timeout.as_millis() as u64, "proof generation timed out");
                Err(ComputeError::ProofGenerationTimeout(self.prove_timeout))
            }
        }
    }

    pub async fn verify(&self, proof: Proof, signals: PublicSignals) -> Result<bool> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.verify(&proof, &signals))
            .await
            .map_err(join_error)?
    }

    pub async fn verify_job(&self, id: JobId, proof: Proof, signals: PublicSignals) -> Result<JobStatus> {
        let (ledger, verifier) = (self.ledger.clone(), self.verifier.clone());
        tokio::task::spawn_blocking(move || ledger.verify_job(id, &proof, &signals, verifier.as_ref()))
            .await
            .map_err(join_error)?
    }

    pub async fn submit(&self, sender: String, call: SubmitProof) -> Result<(JobId, bool)> {
        let contract = self.contract.clone();
        tokio::task::spawn_blocking(move || contract.submit_proof(&sender, &call))
            .await
            .map_err(join_error)?
    }

    /// Release the key ring; later proving/verifying attempts fail.
    pub fn shutdown(&self) {
        if let Some(ring) = &self.keys {
            ring.shutdown();
        }
    }
}
