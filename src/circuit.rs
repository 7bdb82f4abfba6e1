//! Circuit Model: `sign(dot(w, x) + b)` bound to Poseidon commitments
//!
//! Private witness: `weights[N]`, `bias`, `features[N]`.
//! Public inputs, in this order: `output`, `model_hash`, `input_hash`.
//!
//! ## Constraints
//!
//! 1. `model_hash == H(weights ++ [bias])`
//! 2. `input_hash == H(features)`
//! 3. each private value `v` satisfies `v + 2^(VALUE_BITS-1) ∈ [0, 2^VALUE_BITS)`
//! 4. `dot = Σ weights[i]·features[i] + bias` (field arithmetic)
//! 5. `dot + 2^(SIGN_BITS-1)` decomposes into `SIGN_BITS` boolean limbs and
//!    `output` equals the top limb
//!
//! The field has no order, so (5) is what gives `output` its meaning: after
//! the shift, the top bit is set exactly when `dot ∈ [0, 2^(SIGN_BITS-1))`.
//! Constraint (3) keeps `|dot|` far below `p/2`, so the field value of `dot`
//! is the integer dot product and cannot wrap. Honest dot products outside
//! `[-2^(SIGN_BITS-1), 2^(SIGN_BITS-1))` have no satisfying assignment; the
//! generator refuses them up front (`ArithmeticOverflow`).

#![forbid(unsafe_code)]

use ark_ff::{BigInteger, One, PrimeField, Zero};
use ark_r1cs_std::{
    alloc::AllocVar, boolean::Boolean, eq::EqGadget, fields::fp::FpVar, R1CSVar,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::{CommitmentHasher, F, N};

/// Signed bit-width of every private value (weights, bias, features).
pub const VALUE_BITS: u32 = 32;

/// Bit-width of the sign decomposition; the safe range of `dot` is
/// `[-2^(SIGN_BITS-1), 2^(SIGN_BITS-1))`.
pub const SIGN_BITS: usize = 64;

/// Number of public inputs (`output`, `model_hash`, `input_hash`).
pub const NUM_PUBLIC_INPUTS: usize = 3;

/// Full assignment of the circuit, private and public.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness {
    pub weights: [F; N],
    pub bias: F,
    pub features: [F; N],
    pub output: bool,
    pub model_hash: F,
    pub input_hash: F,
}

impl Witness {
    /// Public inputs in allocation order.
    pub fn public_inputs(&self) -> [F; NUM_PUBLIC_INPUTS] {
        [F::from(self.output), self.model_hash, self.input_hash]
    }
}

#[derive(Clone)]
pub struct LinearModelCircuit {
    hasher: CommitmentHasher,
    witness: Witness,
}

impl LinearModelCircuit {
    pub fn new(hasher: CommitmentHasher, witness: Witness) -> Self {
        Self { hasher, witness }
    }

    /// Satisfying all-zero instance: `dot = 0`, so `output = 1`.
    ///
    /// Used for key generation, where only the constraint shape matters.
    pub fn blank(hasher: CommitmentHasher) -> Self {
        let zeros_model = [F::zero(); N + 1];
        let zeros_input = [F::zero(); N];
        let witness = Witness {
            weights: [F::zero(); N],
            bias: F::zero(),
            features: [F::zero(); N],
            output: true,
            model_hash: hasher.hash(&zeros_model),
            input_hash: hasher.hash(&zeros_input),
        };
        Self { hasher, witness }
    }

    pub fn witness(&self) -> &Witness {
        &self.witness
    }
}

/// Constrain `v + 2^(bits-1)` to `bits` boolean limbs, little-endian.
///
/// Returns the limbs so callers can read off the top bit.
pub fn signed_range_bits(
    cs: ConstraintSystemRef<F>,
    v: &FpVar<F>,
    bits: usize,
) -> Result<Vec<Boolean<F>>, SynthesisError> {
    debug_assert!((1..=64).contains(&bits));
    let offset = F::from(1u64 << (bits - 1));
    let shifted = v + offset;

    let limbs = (0..bits)
        .map(|i| {
            Boolean::new_witness(cs.clone(), || {
                Ok(shifted.value()?.into_bigint().get_bit(i))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Boolean::le_bits_to_fp_var(&limbs)?.enforce_equal(&shifted)?;
    Ok(limbs)
}

fn alloc_witnesses(
    cs: &ConstraintSystemRef<F>,
    values: &[F],
) -> Result<Vec<FpVar<F>>, SynthesisError> {
    values
        .iter()
        .map(|v| FpVar::new_witness(cs.clone(), || Ok(*v)))
        .collect()
}

impl ConstraintSynthesizer<F> for LinearModelCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let w = &self.witness;

        // Public inputs first, in the order the verifier supplies them.
        let output = FpVar::new_input(cs.clone(), || Ok(F::from(w.output)))?;
        let model_hash = FpVar::new_input(cs.clone(), || Ok(w.model_hash))?;
        let input_hash = FpVar::new_input(cs.clone(), || Ok(w.input_hash))?;

        let weights = alloc_witnesses(&cs, &w.weights)?;
        let bias = FpVar::new_witness(cs.clone(), || Ok(w.bias))?;
        let features = alloc_witnesses(&cs, &w.features)?;

        for v in weights.iter().chain(std::iter::once(&bias)).chain(features.iter()) {
            signed_range_bits(cs.clone(), v, VALUE_BITS as usize)?;
        }

        let mut model_elems = weights.clone();
        model_elems.push(bias.clone());
        self.hasher
            .hash_var(cs.clone(), &model_elems)?
            .enforce_equal(&model_hash)?;
        self.hasher
            .hash_var(cs.clone(), &features)?
            .enforce_equal(&input_hash)?;

        let mut dot = bias;
        for (wi, xi) in weights.iter().zip(features.iter()) {
            dot += wi * xi;
        }

        let limbs = signed_range_bits(cs.clone(), &dot, SIGN_BITS)?;
        FpVar::from(limbs[SIGN_BITS - 1].clone()).enforce_equal(&output)?;

        Ok(())
    }
}

/// `true` when `F::one()`, `false` when zero; anything else is not a bit.
pub fn field_to_bit(x: F) -> Option<bool> {
    if x.is_zero() {
        Some(false)
    } else if x.is_one() {
        Some(true)
    } else {
        None
    }
}
