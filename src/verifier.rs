//! Proof Verifier
//!
//! A verifier answers one question: does this proof attest to these public
//! signals under the circuit's verifying key? It knows nothing about jobs;
//! binding signals to a job record is the ledger's business.
//!
//! A proof whose points do not decode (off-curve, outside the subgroup, wrong
//! protocol tag) is a `false` verdict rather than an error, matching what an
//! on-chain pairing check would return.

#![forbid(unsafe_code)]

use std::sync::Arc;

use ark_groth16::Groth16;
use ark_snark::SNARK;
use tracing::{debug, warn};

use crate::{ComputeError, Curve, KeyRing, Proof, PublicSignals, Result};

pub trait Verifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool>;
}

/// Pairing check against the prepared verifying key of a [`KeyRing`].
#[derive(Clone, Debug)]
pub struct Groth16Verifier {
    keys: Arc<KeyRing>,
}

impl Groth16Verifier {
    pub fn new(keys: Arc<KeyRing>) -> Self {
        Self { keys }
    }
}

impl Verifier for Groth16Verifier {
    fn name(&self) -> &'static str {
        "groth16"
    }

    fn verify(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool> {
        let keys = self.keys.get_or_init().map_err(|e| {
            warn!(error = %e, "verifying key unavailable");
            ComputeError::VerifyingKeyUnavailable
        })?;

        let proof = match proof.to_ark() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "proof does not decode");
                return Ok(false);
            }
        };

        let ok = Groth16::<Curve>::verify_with_processed_vk(
            keys.prepared_verifying_key(),
            &signals.to_inputs(),
            &proof,
        )?;
        debug!(ok, "pairing check done");
        Ok(ok)
    }
}

/// Accepts everything. Pairs with `MockProver` in tests and local demos.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllVerifier;

impl Verifier for AcceptAllVerifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn verify(&self, _proof: &Proof, _signals: &PublicSignals) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        keys::tests::shared_keys, prover::generate_proof, CommitmentHasher, Groth16Prover,
        InputData, ModelData, ProofBundle, F,
    };
    use std::sync::OnceLock;

    fn ring() -> Arc<KeyRing> {
        Arc::new(KeyRing::with_keys(shared_keys(), CommitmentHasher::new()))
    }

    fn bundle() -> ProofBundle {
        static BUNDLE: OnceLock<ProofBundle> = OnceLock::new();
        BUNDLE
            .get_or_init(|| {
                generate_proof(
                    &Groth16Prover::new(ring()),
                    &ModelData::from_ints(&[1, 2, 3, 4, 5, 6, 7, 8], 0),
                    &InputData::from_ints(&[1, 0, 1, 0, 1, 0, 1, 0]),
                )
                .unwrap()
            })
            .clone()
    }

    #[test]
    fn honest_proof_verifies() {
        let b = bundle();
        assert!(Groth16Verifier::new(ring()).verify(&b.proof, &b.public_signals).unwrap());
    }

    #[test]
    fn proof_survives_json() {
        let b = bundle();
        let json = serde_json::to_string(&b).unwrap();
        let back: ProofBundle = serde_json::from_str(&json).unwrap();
        assert!(Groth16Verifier::new(ring()).verify(&back.proof, &back.public_signals).unwrap());
    }

    #[test]
    fn value_window_edges_prove_and_verify() {
        use crate::field::{VALUE_MAX, VALUE_MIN};

        let prover = Groth16Prover::new(ring());
        let verifier = Groth16Verifier::new(ring());
        let (min, max) = (VALUE_MIN as f64, VALUE_MAX as f64);
        let mut pair_w = vec![0.0; 8];
        pair_w[..2].copy_from_slice(&[min, min]);
        let mut pair_x = vec![0.0; 8];
        pair_x[..2].copy_from_slice(&[max, max]);
        let mut lone_min = vec![0.0; 8];
        lone_min[0] = min;

        let cases = [
            // all weights and bias at the bottom of the window
            (ModelData::new(vec![min; 8], min), InputData::new(vec![1.0; 8]), false),
            (ModelData::new(vec![max; 8], max), InputData::new(vec![1.0; 8]), true),
            // dot = -2^63 + 2^32, just inside the sign range
            (ModelData::new(pair_w, 0.0), InputData::new(pair_x), false),
            // dot = 2^62 - 1
            (ModelData::new(lone_min.clone(), -1.0), InputData::new(lone_min), true),
            (ModelData::new(vec![-0.0; 8], -0.0), InputData::new(vec![-0.0; 8]), true),
        ];

        for (i, (model, input, expected)) in cases.into_iter().enumerate() {
            let b = generate_proof(&prover, &model, &input).unwrap();
            assert_eq!(b.public_signals.output, expected, "case {i}");
            assert!(verifier.verify(&b.proof, &b.public_signals).unwrap(), "case {i}");
        }
    }

    #[test]
    fn tampered_signals_are_rejected() {
        let v = Groth16Verifier::new(ring());
        let b = bundle();

        let mut s = b.public_signals;
        s.output = !s.output;
        assert!(!v.verify(&b.proof, &s).unwrap());

        let mut s = b.public_signals;
        s.model_hash += F::from(1u64);
        assert!(!v.verify(&b.proof, &s).unwrap());

        let mut s = b.public_signals;
        s.input_hash = s.model_hash;
        assert!(!v.verify(&b.proof, &s).unwrap());
    }

    #[test]
    fn tampered_proofs_are_rejected_not_errors() {
        let v = Groth16Verifier::new(ring());
        let b = bundle();

        // Swap A and C: valid points, wrong proof.
        let mut p = b.proof.clone();
        std::mem::swap(&mut p.pi_a, &mut p.pi_c);
        assert!(!v.verify(&p, &b.public_signals).unwrap());

        // Off-curve coordinate.
        let mut p = b.proof.clone();
        p.pi_a[0] = "1".into();
        assert!(!v.verify(&p, &b.public_signals).unwrap());

        assert!(!v.verify(&Proof::dummy(), &b.public_signals).unwrap());
    }

    #[test]
    fn missing_key_is_an_error_not_a_verdict() {
        let r = ring();
        r.shutdown();
        let b = bundle();
        assert!(matches!(
            Groth16Verifier::new(r).verify(&b.proof, &b.public_signals),
            Err(ComputeError::VerifyingKeyUnavailable)
        ));
    }

    #[test]
    fn accept_all_accepts_dummy() {
        let s = PublicSignals::new(false, F::from(0u64), F::from(0u64));
        assert!(AcceptAllVerifier.verify(&Proof::dummy(), &s).unwrap());
    }
}
