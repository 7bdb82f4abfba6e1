//! Commitment Hasher: Poseidon over BN254 `Fr`, natively and in-circuit
//!
//! The circuit re-derives `modelHash`/`inputHash` from the private witness and
//! compares them to the public inputs, so the native hash and the gadget must
//! run the **same** permutation with the **same** absorb schedule. Both sides
//! are driven from one [`PoseidonConfig`] held by [`CommitmentHasher`]:
//!
//! ```text
//! state width 3 (rate 2, capacity 1), α = 5, R_F = 8, R_P = 57
//! absorb(len) ; absorb(e_0) ; … ; absorb(e_{len-1}) ; squeeze 1
//! ```
//!
//! Absorbing the length first separates call sites of different arity
//! (9 elements for the model, 8 for the input). Round constants and the MDS
//! matrix come from the Grain LFSR, seeded by the field size and round counts.
//! This is not the circomlibjs parameter set, and circomlibjs does not absorb
//! a length, so its `poseidon` outputs do not match these commitments.

#![forbid(unsafe_code)]

use std::sync::Arc;

use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{constraints::PoseidonSpongeVar, find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::PrimeField;
use ark_r1cs_std::fields::{fp::FpVar, FieldVar};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use tracing::debug;

use crate::{
    field::{int_to_field, lift_all, lift_value},
    InputData, ModelData, ComputeError, F,
};

/// Absorption rate (elements per permutation).
pub const RATE: usize = 2;
/// Capacity (state width = RATE + CAPACITY).
pub const CAPACITY: usize = 1;
/// S-box exponent.
pub const ALPHA: u64 = 5;
/// Full rounds.
pub const FULL_ROUNDS: usize = 8;
/// Partial rounds.
pub const PARTIAL_ROUNDS: usize = 57;

/// Build the Poseidon parameter set shared by native and in-circuit hashing.
pub fn poseidon_config() -> PoseidonConfig<F> {
    let (ark, mds) = find_poseidon_ark_and_mds::<F>(
        F::MODULUS_BIT_SIZE as u64,
        RATE,
        FULL_ROUNDS as u64,
        PARTIAL_ROUNDS as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
}

/// Explicitly constructed hasher; clones share the parameter set.
#[derive(Clone)]
pub struct CommitmentHasher {
    config: Arc<PoseidonConfig<F>>,
}

impl std::fmt::Debug for CommitmentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitmentHasher")
            .field("rate", &RATE)
            .field("full_rounds", &FULL_ROUNDS)
            .field("partial_rounds", &PARTIAL_ROUNDS)
            .finish()
    }
}

impl Default for CommitmentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentHasher {
    pub fn new() -> Self {
        Self { config: Arc::new(poseidon_config()) }
    }

    pub fn config(&self) -> &PoseidonConfig<F> {
        &self.config
    }

    /// Native hash of an ordered sequence of field elements.
    pub fn hash(&self, elements: &[F]) -> F {
        let mut sponge = PoseidonSponge::<F>::new(&self.config);
        sponge.absorb(&F::from(elements.len() as u64));
        for e in elements {
            sponge.absorb(e);
        }
        sponge.squeeze_field_elements::<F>(1)[0]
    }

    /// In-circuit hash; allocates the same permutation as [`Self::hash`].
    pub fn hash_var(
        &self,
        cs: ConstraintSystemRef<F>,
        elements: &[FpVar<F>],
    ) -> Result<FpVar<F>, SynthesisError> {
        let mut sponge = PoseidonSpongeVar::<F>::new(cs, &self.config);
        sponge.absorb(&FpVar::constant(F::from(elements.len() as u64)))?;
        for e in elements {
            sponge.absorb(e)?;
        }
        let mut out = sponge.squeeze_field_elements(1)?;
        out.pop().ok_or(SynthesisError::Unsatisfiable)
    }

    /// `Hash(weights ++ [bias])`.
    pub fn commit_model(&self, model: &ModelData) -> Result<F, ComputeError> {
        let mut elems: Vec<F> = lift_all(&model.weights, "weights")?
            .into_iter()
            .map(|w| int_to_field(w as i128))
            .collect();
        elems.push(int_to_field(lift_value(model.bias)? as i128));
        let h = self.hash(&elems);
        debug!(len = elems.len(), "model commitment computed");
        Ok(h)
    }

    /// `Hash(features)`.
    pub fn commit_input(&self, input: &InputData) -> Result<F, ComputeError> {
        let elems: Vec<F> = lift_all(&input.features, "features")?
            .into_iter()
            .map(|x| int_to_field(x as i128))
            .collect();
        let h = self.hash(&elems);
        debug!(len = elems.len(), "input commitment computed");
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::to_decimal;
    use ark_r1cs_std::{alloc::AllocVar, R1CSVar};
    use ark_relations::r1cs::ConstraintSystem;
    use std::collections::HashSet;

    fn elems(vals: &[i128]) -> Vec<F> {
        vals.iter().map(|&v| int_to_field(v)).collect()
    }

    #[test]
    fn hash_is_deterministic() {
        let h = CommitmentHasher::new();
        let e = elems(&[1, 2, 3, 4, 5, 6, 7, 8, 0]);
        assert_eq!(h.hash(&e), h.hash(&e));
        // Independently built parameters agree.
        assert_eq!(h.hash(&e), CommitmentHasher::new().hash(&e));
    }

    #[test]
    fn hash_is_order_sensitive() {
        let h = CommitmentHasher::new();
        assert_ne!(h.hash(&elems(&[1, 2])), h.hash(&elems(&[2, 1])));
    }

    #[test]
    fn length_tag_separates_trailing_zeros() {
        let h = CommitmentHasher::new();
        let eight = elems(&[0; 8]);
        let nine = elems(&[0; 9]);
        assert_ne!(h.hash(&eight), h.hash(&nine));
    }

    #[test]
    fn differs_from_circomlibjs_poseidon() {
        // circomlibjs poseidon([1, 2])
        let circom = crate::field::from_decimal::<F>(
            "7853200120776062878684798364095072458815029376092732009249414926327459813530",
        )
        .unwrap();
        assert_ne!(CommitmentHasher::new().hash(&elems(&[1, 2])), circom);
    }

    #[test]
    fn single_element_changes_move_the_commitment() {
        let h = CommitmentHasher::new();
        let base = ModelData::from_ints(&[1, 2, 3, 4, 5, 6, 7, 8], 0);
        let mut seen = HashSet::new();
        seen.insert(to_decimal(h.commit_model(&base).unwrap()));
        for i in 0..8 {
            let mut m = base.clone();
            m.weights[i] += 1.0;
            assert!(seen.insert(to_decimal(h.commit_model(&m).unwrap())), "weight {i} collided");
        }
        let mut m = base.clone();
        m.bias = -1.0;
        assert!(seen.insert(to_decimal(h.commit_model(&m).unwrap())));

        let input = InputData::from_ints(&[1, 0, 1, 0, 1, 0, 1, 0]);
        let ih = h.commit_input(&input).unwrap();
        for i in 0..8 {
            let mut x = input.clone();
            x.features[i] = -x.features[i] - 1.0;
            assert_ne!(h.commit_input(&x).unwrap(), ih, "feature {i} collided");
        }
    }

    #[test]
    fn commit_rejects_unrepresentable_values() {
        let h = CommitmentHasher::new();
        let m = ModelData::new(vec![0.5; 8], 0.0);
        assert!(matches!(h.commit_model(&m), Err(ComputeError::InvalidFieldElement(_))));
        let m = ModelData::new(vec![0.0; 8], f64::NAN);
        assert!(matches!(h.commit_model(&m), Err(ComputeError::InvalidFieldElement(_))));
    }

    #[test]
    fn gadget_matches_native_hash() {
        let h = CommitmentHasher::new();
        for vals in [vec![0i128; 8], vec![1, -2, 3, -4, 5, -6, 7, -8, 9]] {
            let native = h.hash(&elems(&vals));

            let cs = ConstraintSystem::<F>::new_ref();
            let vars: Vec<FpVar<F>> = elems(&vals)
                .into_iter()
                .map(|v| FpVar::new_witness(cs.clone(), || Ok(v)).unwrap())
                .collect();
            let out = h.hash_var(cs.clone(), &vars).unwrap();

            assert_eq!(out.value().unwrap(), native);
            assert!(cs.is_satisfied().unwrap());
        }
    }
}
