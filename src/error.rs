//! Error taxonomy for the verifiable-compute core.
//!
//! Every failure surfaces as a typed [`ComputeError`]. None of the
//! correctness errors are retried by the core: feeding the same inputs back
//! reproduces the same failure, so only a caller with corrected inputs can
//! succeed.

#![forbid(unsafe_code)]

use std::time::Duration;

use ark_relations::r1cs::SynthesisError;

/// Which public value of a submission disagreed with the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundField {
    Output,
    ModelHash,
    InputHash,
}

impl std::fmt::Display for BoundField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BoundField::Output => "output",
            BoundField::ModelHash => "modelHash",
            BoundField::InputHash => "inputHash",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// A vector does not have the circuit's fixed arity.
    #[error("dimension mismatch: weights={weights}, features={features}, expected {expected}")]
    DimensionMismatch {
        weights: usize,
        features: usize,
        expected: usize,
    },

    /// A value is not finite, not integral, or outside the signed value window.
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    /// `dot(weights, features) + bias` falls outside the sign gadget's range.
    #[error("dot product {dot} exceeds the sign gadget's safe range")]
    ArithmeticOverflow { dot: i128 },

    #[error("proving key unavailable")]
    ProvingKeyUnavailable,

    #[error("verifying key unavailable")]
    VerifyingKeyUnavailable,

    #[error("proof generation exceeded {0:?}")]
    ProofGenerationTimeout(Duration),

    /// The pairing check rejected the proof.
    #[error("proof verification failed")]
    VerificationFailed,

    /// Public signals carry commitments that belong to another job.
    #[error("replay detected: {0} in public signals does not match the job record")]
    ReplayDetected(BoundField),

    #[error("unsupported model kind: {0}")]
    UnsupportedModelKind(String),

    #[error("unknown job id {0}")]
    UnknownJob(u64),

    /// A transaction hash was already recorded or the job is not verified.
    #[error("job {id} cannot take a tx hash: {reason}")]
    TxHashRejected { id: u64, reason: &'static str },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("constraint synthesis: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("serialization: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComputeError {
    /// Whether a caller could succeed by retrying with the *same* inputs.
    ///
    /// Only resource availability qualifies (keys not loaded yet, a timeout
    /// under load); everything else is a property of the inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ComputeError::ProvingKeyUnavailable
                | ComputeError::VerifyingKeyUnavailable
                | ComputeError::ProofGenerationTimeout(_)
                | ComputeError::Io(_)
        )
    }
}

impl From<serde_json::Error> for ComputeError {
    fn from(e: serde_json::Error) -> Self {
        ComputeError::Serialization(e.to_string())
    }
}
