//! Proof Generator
//!
//! `generate_proof` is the first of the two calls the surrounding system
//! makes. It validates shapes and values, computes both commitments and the
//! output bit, and hands a fully determined witness to the backend.
//!
//! Every refusal happens in [`Witness::build`], before any constraint is
//! synthesized:
//!
//! - `DimensionMismatch` when either vector is not exactly `N` long;
//! - `InvalidFieldElement` when a value is fractional, non-finite, or outside
//!   the signed value window;
//! - `ArithmeticOverflow` when the integer dot product leaves the sign
//!   gadget's range.
//!
//! A witness that passes these checks always satisfies the circuit, so the
//! Groth16 backend never produces a proof that fails to verify.

#![forbid(unsafe_code)]

use std::{sync::Arc, time::Instant};

use ark_groth16::Groth16;
use ark_snark::SNARK;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    circuit::{LinearModelCircuit, Witness, SIGN_BITS},
    field::{int_to_field, lift_all, lift_value},
    CommitmentHasher, ComputeError, Curve, InputData, KeyRing, ModelData, Proof, ProofBundle,
    PublicSignals, Result, N,
};

impl Witness {
    /// Validate artifacts and compute the full circuit assignment.
    pub fn build(hasher: &CommitmentHasher, model: &ModelData, input: &InputData) -> Result<Self> {
        if model.weights.len() != N || input.features.len() != N {
            return Err(ComputeError::DimensionMismatch {
                weights: model.weights.len(),
                features: input.features.len(),
                expected: N,
            });
        }

        let w = lift_all(&model.weights, "weights")?;
        let b = lift_value(model.bias).map_err(|e| match e {
            ComputeError::InvalidFieldElement(msg) => {
                ComputeError::InvalidFieldElement(format!("bias: {msg}"))
            }
            other => other,
        })?;
        let x = lift_all(&input.features, "features")?;

        let dot: i128 = w
            .iter()
            .zip(&x)
            .map(|(&wi, &xi)| wi as i128 * xi as i128)
            .sum::<i128>()
            + b as i128;
        let bound = 1i128 << (SIGN_BITS - 1);
        if dot < -bound || dot >= bound {
            return Err(ComputeError::ArithmeticOverflow { dot });
        }

        let weights: [crate::F; N] = std::array::from_fn(|i| int_to_field(w[i] as i128));
        let features: [crate::F; N] = std::array::from_fn(|i| int_to_field(x[i] as i128));
        let bias = int_to_field(b as i128);

        let mut model_elems = weights.to_vec();
        model_elems.push(bias);
        let model_hash = hasher.hash(&model_elems);
        let input_hash = hasher.hash(&features);

        debug!(dot = %dot, output = dot >= 0, "witness built");
        Ok(Self { weights, bias, features, output: dot >= 0, model_hash, input_hash })
    }

    pub fn public_signals(&self) -> PublicSignals {
        PublicSignals::new(self.output, self.model_hash, self.input_hash)
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Something that turns (model, input) into a proof of `sign(w·x + b)`.
pub trait Prover: Send + Sync {
    /// Backend label for logs and `/v1/version`.
    fn name(&self) -> &'static str;

    fn prove(&self, model: &ModelData, input: &InputData) -> Result<ProofBundle>;
}

/// Groth16 over BN254 with keys from a shared [`KeyRing`].
#[derive(Clone, Debug)]
pub struct Groth16Prover {
    keys: Arc<KeyRing>,
}

impl Groth16Prover {
    pub fn new(keys: Arc<KeyRing>) -> Self {
        Self { keys }
    }

    pub fn key_ring(&self) -> &Arc<KeyRing> {
        &self.keys
    }
}

impl Prover for Groth16Prover {
    fn name(&self) -> &'static str {
        "groth16"
    }

    fn prove(&self, model: &ModelData, input: &InputData) -> Result<ProofBundle> {
        let hasher = self.keys.hasher();
        let witness = Witness::build(hasher, model, input)?;

        let keys = self.keys.get_or_init().map_err(|e| {
            warn!(error = %e, "proving key unavailable");
            ComputeError::ProvingKeyUnavailable
        })?;
        let pk = keys.proving_key().ok_or(ComputeError::ProvingKeyUnavailable)?;

        let public_signals = witness.public_signals();
        let circuit = LinearModelCircuit::new(hasher.clone(), witness);

        let t0 = Instant::now();
        let mut rng = StdRng::from_entropy();
        let proof = Groth16::<Curve>::prove(pk, circuit, &mut rng)?;
        info!(
            output = public_signals.output_u8(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "proof generated"
        );

        Ok(ProofBundle { proof: Proof::from_ark(&proof), public_signals })
    }
}

/// Deterministic test double: real commitments and output, dummy proof.
#[derive(Clone, Debug, Default)]
pub struct MockProver {
    hasher: CommitmentHasher,
}

impl MockProver {
    pub fn new(hasher: CommitmentHasher) -> Self {
        Self { hasher }
    }
}

impl Prover for MockProver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn prove(&self, model: &ModelData, input: &InputData) -> Result<ProofBundle> {
        let witness = Witness::build(&self.hasher, model, input)?;
        debug!("mock prover: emitting dummy proof");
        Ok(ProofBundle { proof: Proof::dummy(), public_signals: witness.public_signals() })
    }
}

/// Entry point: prove that `output = sign(model · input)` for the committed pair.
pub fn generate_proof(
    prover: &dyn Prover,
    model: &ModelData,
    input: &InputData,
) -> Result<ProofBundle> {
    let span = tracing::info_span!("generate_proof", backend = prover.name());
    let _enter = span.enter();
    prover.prove(model, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::shared_keys;

    fn vector_model() -> ModelData {
        ModelData::from_ints(&[1, 2, 3, 4, 5, 6, 7, 8], 0)
    }

    fn vector_input() -> InputData {
        InputData::from_ints(&[1, 0, 1, 0, 1, 0, 1, 0])
    }

    #[test]
    fn evaluates_the_reference_vector() {
        let h = CommitmentHasher::new();
        let w = Witness::build(&h, &vector_model(), &vector_input()).unwrap();
        // 1 + 3 + 5 + 7 = 16
        assert!(w.output);
        assert_eq!(w.model_hash, h.commit_model(&vector_model()).unwrap());
        assert_eq!(w.input_hash, h.commit_input(&vector_input()).unwrap());
    }

    #[test]
    fn sign_boundary() {
        let h = CommitmentHasher::new();
        let zero = Witness::build(&h, &ModelData::from_ints(&[0; N], 0), &vector_input()).unwrap();
        assert!(zero.output, "dot = 0 counts as non-negative");

        let neg = Witness::build(&h, &ModelData::from_ints(&[-1; N], 0), &InputData::from_ints(&[1; N]))
            .unwrap();
        assert!(!neg.output);

        let just_neg = Witness::build(&h, &ModelData::from_ints(&[0; N], -1), &vector_input()).unwrap();
        assert!(!just_neg.output);
    }

    #[test]
    fn dimension_guard() {
        let h = CommitmentHasher::new();
        let short = ModelData::from_ints(&[1; 7], 0);
        let err = Witness::build(&h, &short, &vector_input()).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::DimensionMismatch { weights: 7, features: 8, expected: 8 }
        ));

        let long = InputData::from_ints(&[1; 9]);
        assert!(matches!(
            Witness::build(&h, &vector_model(), &long),
            Err(ComputeError::DimensionMismatch { features: 9, .. })
        ));
    }

    #[test]
    fn overflow_guard() {
        let h = CommitmentHasher::new();
        let max = (1i64 << 31) - 1;
        let err = Witness::build(&h, &ModelData::from_ints(&[max; N], 0), &InputData::from_ints(&[max; N]))
            .unwrap_err();
        assert!(matches!(err, ComputeError::ArithmeticOverflow { dot } if dot > 1i128 << 63));
    }

    #[test]
    fn negative_zero_lifts_to_zero_and_huge_values_are_refused() {
        let h = CommitmentHasher::new();
        let w = Witness::build(&h, &ModelData::new(vec![-0.0; N], -0.0), &InputData::new(vec![-0.0; N]))
            .unwrap();
        assert!(w.output);
        assert_eq!(w.model_hash, h.commit_model(&ModelData::from_ints(&[0; N], 0)).unwrap());

        let huge = ModelData::new(vec![1e300; N], 0.0);
        assert!(matches!(
            Witness::build(&h, &huge, &vector_input()),
            Err(ComputeError::InvalidFieldElement(_))
        ));
    }

    #[test]
    fn rejects_fractional_bias() {
        let h = CommitmentHasher::new();
        let m = ModelData::new(vec![1.0; N], 0.25);
        let err = Witness::build(&h, &m, &vector_input()).unwrap_err();
        assert!(err.to_string().contains("bias"));
    }

    #[test]
    fn mock_prover_emits_dummy_proof_with_real_signals() {
        let h = CommitmentHasher::new();
        let bundle = generate_proof(&MockProver::new(h.clone()), &vector_model(), &vector_input()).unwrap();
        assert_eq!(bundle.proof, Proof::dummy());
        assert!(bundle.public_signals.output);
        assert_eq!(bundle.public_signals.model_hash, h.commit_model(&vector_model()).unwrap());
    }

    #[test]
    fn groth16_proof_passes_pairing_check() {
        let keys = shared_keys();
        let prover = Groth16Prover::new(Arc::new(KeyRing::with_keys(keys.clone(), CommitmentHasher::new())));
        let bundle = generate_proof(&prover, &vector_model(), &vector_input()).unwrap();

        let proof = bundle.proof.to_ark().unwrap();
        let ok = Groth16::<Curve>::verify_with_processed_vk(
            keys.prepared_verifying_key(),
            &bundle.public_signals.to_inputs(),
            &proof,
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn released_ring_means_no_proving_key() {
        let ring = Arc::new(KeyRing::with_keys(shared_keys(), CommitmentHasher::new()));
        ring.shutdown();
        let prover = Groth16Prover::new(ring);
        assert!(matches!(
            prover.prove(&vector_model(), &vector_input()),
            Err(ComputeError::ProvingKeyUnavailable)
        ));
    }

    #[test]
    fn invalid_inputs_fail_before_touching_keys() {
        // An empty ring would fail on key load; shape errors must win.
        let dir = tempfile::tempdir().unwrap();
        let ring = Arc::new(KeyRing::new(
            crate::keys::KeySource::Files(dir.path().into()),
            CommitmentHasher::new(),
        ));
        let prover = Groth16Prover::new(ring.clone());
        let err = prover.prove(&ModelData::from_ints(&[1; 3], 0), &vector_input()).unwrap_err();
        assert!(matches!(err, ComputeError::DimensionMismatch { .. }));
        assert_eq!(ring.build_count(), 0);
    }
}
