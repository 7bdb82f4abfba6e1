//! Job Ledger
//!
//! Each job records the commitments and output it was opened with. A proof
//! is accepted for a job only if its public signals carry exactly those
//! values *and* the verifier accepts it, so a valid proof for one
//! (model, input) pair cannot be replayed against another job.
//!
//! ```text
//!            verify_job: signals match record ∧ verifier → true
//!   PENDING ───────────────────────────────────────────────────► VERIFIED
//!      │
//!      └── signals mismatch (ReplayDetected) or verifier → false ─► INVALID
//! ```
//!
//! Both terminal states are final. `verify_job` on a terminal job is a no-op
//! returning the recorded status. When the verifier cannot run at all (key
//! unavailable) the job stays `PENDING` and the error is returned.
//!
//! Locking: the table lock is held only to look up or insert an entry; each
//! job has its own mutex, held across the whole check-and-transition so
//! concurrent submissions for the same job are serialized.

#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, RwLock,
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::BoundField, field::serialize_decimal, ComputeError, Proof, PublicSignals, Result,
    Verifier, F,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Verified,
    Invalid,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// What a requester supplies when opening a job.
#[derive(Clone, Debug)]
pub struct NewJob {
    pub requester: String,
    pub model_cid: String,
    pub input_cid: String,
    pub model_hash: F,
    pub input_hash: F,
    pub output: bool,
}

impl NewJob {
    /// Record exactly what a set of public signals claims.
    pub fn from_signals(
        requester: impl Into<String>,
        model_cid: impl Into<String>,
        input_cid: impl Into<String>,
        signals: &PublicSignals,
    ) -> Self {
        Self {
            requester: requester.into(),
            model_cid: model_cid.into(),
            input_cid: input_cid.into(),
            model_hash: signals.model_hash,
            input_hash: signals.input_hash,
            output: signals.output,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub requester: String,
    #[serde(rename = "modelCID")]
    pub model_cid: String,
    #[serde(rename = "inputCID")]
    pub input_cid: String,
    #[serde(serialize_with = "serialize_decimal")]
    pub model_hash: F,
    #[serde(serialize_with = "serialize_decimal")]
    pub input_hash: F,
    pub output: bool,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: Option<String>,
    /// Why the job ended `INVALID`.
    pub rejection: Option<String>,
}

impl Job {
    /// First recorded value the signals disagree with, if any.
    fn mismatch(&self, signals: &PublicSignals) -> Option<BoundField> {
        if signals.model_hash != self.model_hash {
            Some(BoundField::ModelHash)
        } else if signals.input_hash != self.input_hash {
            Some(BoundField::InputHash)
        } else if signals.output != self.output {
            Some(BoundField::Output)
        } else {
            None
        }
    }

    fn reject(&mut self, reason: String) {
        self.status = JobStatus::Invalid;
        self.rejection = Some(reason);
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Default)]
pub struct JobLedger {
    jobs: RwLock<BTreeMap<JobId, Arc<Mutex<Job>>>>,
    next_id: AtomicU64,
}

fn lock(job: &Mutex<Job>) -> MutexGuard<'_, Job> {
    // A panic mid-transition leaves a whole Job value behind; keep serving it.
    job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_tx_hash(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|h| h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a job in `PENDING`. Ids are assigned in order starting at 0.
    pub fn create_job(&self, new: NewJob) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::AcqRel));
        let job = Job {
            id,
            requester: new.requester,
            model_cid: new.model_cid,
            input_cid: new.input_cid,
            model_hash: new.model_hash,
            input_hash: new.input_hash,
            output: new.output,
            status: JobStatus::Pending,
            timestamp: Utc::now(),
            tx_hash: None,
            rejection: None,
        };
        info!(job = %id, requester = %job.requester, "job created");
        self.jobs
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, Arc::new(Mutex::new(job)));
        id
    }

    fn entry(&self, id: JobId) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
            .ok_or(ComputeError::UnknownJob(id.0))
    }

    /// Settle a pending job with a proof. Second of the two core entry points.
    pub fn verify_job(
        &self,
        id: JobId,
        proof: &Proof,
        signals: &PublicSignals,
        verifier: &dyn Verifier,
    ) -> Result<JobStatus> {
        let entry = self.entry(id)?;
        let mut job = lock(&entry);

        if job.status.is_terminal() {
            debug!(job = %id, status = ?job.status, "job already settled");
            return Ok(job.status);
        }

        if let Some(field) = job.mismatch(signals) {
            warn!(job = %id, %field, "public signals do not match job record");
            job.reject(format!("{field} mismatch"));
            return Err(ComputeError::ReplayDetected(field));
        }

        if verifier.verify(proof, signals)? {
            job.status = JobStatus::Verified;
            info!(job = %id, verifier = verifier.name(), "job verified");
            Ok(JobStatus::Verified)
        } else {
            warn!(job = %id, verifier = verifier.name(), "proof rejected");
            job.reject("proof verification failed".into());
            Err(ComputeError::VerificationFailed)
        }
    }

    /// Attach the settlement transaction hash. Verified jobs only, once.
    pub fn set_tx_hash(&self, id: JobId, tx_hash: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let mut job = lock(&entry);
        let reject = |reason| ComputeError::TxHashRejected { id: id.0, reason };
        if job.status != JobStatus::Verified {
            return Err(reject("job is not verified"));
        }
        if job.tx_hash.is_some() {
            return Err(reject("tx hash already recorded"));
        }
        if !is_tx_hash(tx_hash) {
            return Err(reject("not a 0x-prefixed 32-byte hash"));
        }
        job.tx_hash = Some(tx_hash.to_ascii_lowercase());
        info!(job = %id, tx_hash, "tx hash recorded");
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.entry(id).ok().map(|e| lock(&e).clone())
    }

    /// Snapshot of every job, ordered by id.
    pub fn list(&self) -> Vec<Job> {
        let entries: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        entries.iter().map(|e| lock(e).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AcceptAllVerifier;
    use std::{sync::atomic::AtomicUsize, thread};

    struct Fixed(Result<bool>);

    impl Verifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn verify(&self, _: &Proof, _: &PublicSignals) -> Result<bool> {
            match &self.0 {
                Ok(b) => Ok(*b),
                Err(_) => Err(ComputeError::VerifyingKeyUnavailable),
            }
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Verifier for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn verify(&self, _: &Proof, _: &PublicSignals) -> Result<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn signals(seed: u64) -> PublicSignals {
        PublicSignals::new(true, F::from(seed), F::from(seed + 1))
    }

    fn open(ledger: &JobLedger, s: &PublicSignals) -> JobId {
        ledger.create_job(NewJob::from_signals("0xabc", "QmModel", "QmInput", s))
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        let l = JobLedger::new();
        assert_eq!(open(&l, &signals(1)), JobId(0));
        assert_eq!(open(&l, &signals(1)), JobId(1));
        assert_eq!(l.list().len(), 2);
        assert_eq!(l.get(JobId(0)).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn matching_signals_and_accepting_verifier_verify() {
        let l = JobLedger::new();
        let s = signals(10);
        let id = open(&l, &s);
        assert_eq!(l.verify_job(id, &Proof::dummy(), &s, &AcceptAllVerifier).unwrap(), JobStatus::Verified);
    }

    #[test]
    fn replay_against_another_job_is_invalid() {
        let l = JobLedger::new();
        let id = open(&l, &signals(10));

        // A proof for a different (model, input) pair, even one the verifier accepts.
        let foreign = signals(20);
        let err = l.verify_job(id, &Proof::dummy(), &foreign, &AcceptAllVerifier).unwrap_err();
        assert!(matches!(err, ComputeError::ReplayDetected(BoundField::ModelHash)));

        let job = l.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Invalid);
        assert!(job.rejection.unwrap().contains("modelHash"));
    }

    #[test]
    fn each_bound_value_is_checked() {
        let l = JobLedger::new();
        let s = signals(3);

        let id = open(&l, &s);
        let mut other = s;
        other.input_hash = F::from(99u64);
        assert!(matches!(
            l.verify_job(id, &Proof::dummy(), &other, &AcceptAllVerifier),
            Err(ComputeError::ReplayDetected(BoundField::InputHash))
        ));

        let id = open(&l, &s);
        let mut other = s;
        other.output = false;
        assert!(matches!(
            l.verify_job(id, &Proof::dummy(), &other, &AcceptAllVerifier),
            Err(ComputeError::ReplayDetected(BoundField::Output))
        ));
    }

    #[test]
    fn rejected_proof_makes_job_invalid() {
        let l = JobLedger::new();
        let s = signals(4);
        let id = open(&l, &s);
        assert!(matches!(
            l.verify_job(id, &Proof::dummy(), &s, &Fixed(Ok(false))),
            Err(ComputeError::VerificationFailed)
        ));
        assert_eq!(l.get(id).unwrap().status, JobStatus::Invalid);
    }

    #[test]
    fn terminal_jobs_ignore_further_submissions() {
        let l = JobLedger::new();
        let s = signals(5);

        let verified = open(&l, &s);
        l.verify_job(verified, &Proof::dummy(), &s, &AcceptAllVerifier).unwrap();
        assert_eq!(
            l.verify_job(verified, &Proof::dummy(), &signals(6), &Fixed(Ok(false))).unwrap(),
            JobStatus::Verified
        );

        let invalid = open(&l, &s);
        let _ = l.verify_job(invalid, &Proof::dummy(), &s, &Fixed(Ok(false)));
        assert_eq!(
            l.verify_job(invalid, &Proof::dummy(), &s, &AcceptAllVerifier).unwrap(),
            JobStatus::Invalid
        );
    }

    #[test]
    fn verifier_errors_leave_job_pending() {
        let l = JobLedger::new();
        let s = signals(7);
        let id = open(&l, &s);
        let err = l
            .verify_job(id, &Proof::dummy(), &s, &Fixed(Err(ComputeError::VerifyingKeyUnavailable)))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(l.get(id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn unknown_job() {
        let l = JobLedger::new();
        assert!(matches!(
            l.verify_job(JobId(42), &Proof::dummy(), &signals(1), &AcceptAllVerifier),
            Err(ComputeError::UnknownJob(42))
        ));
        assert!(l.get(JobId(42)).is_none());
    }

    #[test]
    fn concurrent_submissions_settle_once() {
        let l = Arc::new(JobLedger::new());
        let s = signals(8);
        let id = open(&l, &s);
        let counting = Arc::new(Counting::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (l, c) = (l.clone(), counting.clone());
                thread::spawn(move || l.verify_job(id, &Proof::dummy(), &s, c.as_ref()).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), JobStatus::Verified);
        }
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tx_hash_rules() {
        let l = JobLedger::new();
        let s = signals(9);
        let id = open(&l, &s);
        let tx = format!("0x{}", "ab".repeat(32));

        assert!(matches!(l.set_tx_hash(id, &tx), Err(ComputeError::TxHashRejected { .. })));
        l.verify_job(id, &Proof::dummy(), &s, &AcceptAllVerifier).unwrap();
        assert!(l.set_tx_hash(id, "0x1234").is_err());
        l.set_tx_hash(id, &tx).unwrap();
        assert!(matches!(
            l.set_tx_hash(id, &tx),
            Err(ComputeError::TxHashRejected { reason: "tx hash already recorded", .. })
        ));
        assert_eq!(l.get(id).unwrap().tx_hash.as_deref(), Some(tx.as_str()));
    }

    #[test]
    fn job_json_uses_decimal_hashes() {
        let l = JobLedger::new();
        let id = open(&l, &signals(11));
        let json = serde_json::to_value(l.get(id).unwrap()).unwrap();
        assert_eq!(json["modelHash"], "11");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["modelCID"], "QmModel");
    }
}
