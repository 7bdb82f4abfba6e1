//! Moving values in and out of the scalar field.
//!
//! Artifacts carry JSON numbers (`f64` on the wire). Before anything touches
//! the field, each number must be finite, integral, and inside the signed
//! [`VALUE_BITS`](crate::circuit::VALUE_BITS) window. Negative integers map to
//! `p - |v|`, which is the representative the circuit's range gadget expects.
//!
//! Decimal strings are the interchange format for field and base-field
//! elements (snarkjs `publicSignals`, proof coordinates); `U256` models the
//! `uint256` arguments of the on-chain entrypoint.

#![forbid(unsafe_code)]

use std::str::FromStr;

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::{circuit::VALUE_BITS, ComputeError, F};

/// Smallest admissible value: `-2^(VALUE_BITS-1)`.
pub const VALUE_MIN: i64 = -(1i64 << (VALUE_BITS - 1));
/// Largest admissible value: `2^(VALUE_BITS-1) - 1`.
pub const VALUE_MAX: i64 = (1i64 << (VALUE_BITS - 1)) - 1;

/// Check a JSON number and return it as an integer in the value window.
pub fn lift_value(v: f64) -> Result<i64, ComputeError> {
    if !v.is_finite() {
        return Err(ComputeError::InvalidFieldElement(format!("{v} is not finite")));
    }
    if v.fract() != 0.0 {
        return Err(ComputeError::InvalidFieldElement(format!("{v} is not an integer")));
    }
    if v < VALUE_MIN as f64 || v > VALUE_MAX as f64 {
        return Err(ComputeError::InvalidFieldElement(format!(
            "{v} outside [{VALUE_MIN}, {VALUE_MAX}]"
        )));
    }
    Ok(v as i64)
}

/// Lift every value of a slice, reporting the first offending index.
pub fn lift_all(values: &[f64], what: &str) -> Result<Vec<i64>, ComputeError> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            lift_value(v).map_err(|e| match e {
                ComputeError::InvalidFieldElement(msg) => {
                    ComputeError::InvalidFieldElement(format!("{what}[{i}]: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Signed integer → field element (`-a` becomes `p - a`).
#[inline]
pub fn int_to_field(v: i128) -> F {
    let mag = F::from(v.unsigned_abs());
    if v < 0 {
        -mag
    } else {
        mag
    }
}

/// Canonical decimal representation of any prime-field element.
pub fn to_decimal<Fp: PrimeField>(x: Fp) -> String {
    let v: BigUint = x.into();
    v.to_string()
}

/// Parse a canonical decimal string (digits only, value < modulus).
pub fn from_decimal<Fp: PrimeField>(s: &str) -> Result<Fp, ComputeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ComputeError::InvalidFieldElement(format!(
            "`{s}` is not a decimal integer"
        )));
    }
    let v = BigUint::from_str(s)
        .map_err(|e| ComputeError::InvalidFieldElement(format!("`{s}`: {e}")))?;
    let modulus: BigUint = Fp::MODULUS.into();
    if v >= modulus {
        return Err(ComputeError::InvalidFieldElement(format!(
            "`{s}` is not below the field modulus"
        )));
    }
    Ok(Fp::from(v))
}

/// `serialize_with` helper: a scalar as its decimal string.
pub fn serialize_decimal<S: serde::Serializer>(x: &F, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_decimal(*x))
}

/// Lowercase `0x`-prefixed big-endian hex of a scalar (32 bytes).
pub fn to_hex(x: F) -> String {
    format!("0x{}", hex::encode(x.into_bigint().to_bytes_be()))
}

// ============================================================================
// uint256
// ============================================================================

/// An EVM `uint256` as passed to the verification entrypoint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256(BigUint);

impl U256 {
    /// Parse decimal, or hex with a `0x` prefix. Values ≥ 2^256 are rejected.
    pub fn parse(s: &str) -> Result<Self, ComputeError> {
        let bad = |why: &str| ComputeError::InvalidFieldElement(format!("uint256 `{s}`: {why}"));
        let v = match s.strip_prefix("0x") {
            Some(h) if !h.is_empty() && h.bytes().all(|b| b.is_ascii_hexdigit()) => {
                BigUint::parse_bytes(h.as_bytes(), 16).ok_or_else(|| bad("bad hex"))?
            }
            Some(_) => return Err(bad("bad hex")),
            None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                BigUint::from_str(s).map_err(|_| bad("bad decimal"))?
            }
            None => return Err(bad("bad decimal")),
        };
        if v.bits() > 256 {
            return Err(bad("wider than 256 bits"));
        }
        Ok(Self(v))
    }

    /// Reduce into a prime field, refusing values at or above its modulus
    /// (the Solidity verifier's `checkField`).
    pub fn to_field<Fp: PrimeField>(&self) -> Result<Fp, ComputeError> {
        let modulus: BigUint = Fp::MODULUS.into();
        if self.0 >= modulus {
            return Err(ComputeError::InvalidFieldElement(format!(
                "uint256 {} is not below the field modulus",
                self.0
            )));
        }
        Ok(Fp::from(self.0.clone()))
    }

    pub fn from_field<Fp: PrimeField>(x: Fp) -> Self {
        Self(x.into())
    }
}

impl From<u64> for U256 {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl std::fmt::Display for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for U256 {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for U256 {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(d)?;
        U256::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;

    #[test]
    fn lift_accepts_integral_values_in_window() {
        assert_eq!(lift_value(0.0).unwrap(), 0);
        assert_eq!(lift_value(-8.0).unwrap(), -8);
        assert_eq!(lift_value(VALUE_MAX as f64).unwrap(), VALUE_MAX);
        assert_eq!(lift_value(VALUE_MIN as f64).unwrap(), VALUE_MIN);
    }

    #[test]
    fn lift_rejects_fractions_infinities_and_out_of_range() {
        for bad in [0.5, f64::NAN, f64::INFINITY, (VALUE_MAX as f64) + 1.0, (VALUE_MIN as f64) - 1.0] {
            assert!(matches!(lift_value(bad), Err(ComputeError::InvalidFieldElement(_))), "{bad}");
        }
    }

    #[test]
    fn lift_all_reports_index() {
        let err = lift_all(&[1.0, 2.0, 2.5], "weights").unwrap_err();
        assert!(err.to_string().contains("weights[2]"));
    }

    #[test]
    fn negative_ints_are_additive_inverses() {
        assert_eq!(int_to_field(-5) + int_to_field(5), F::zero());
        assert_eq!(int_to_field(7), F::from(7u64));
    }

    #[test]
    fn decimal_codec() {
        let x = int_to_field(-1);
        let s = to_decimal(x);
        assert_eq!(from_decimal::<F>(&s).unwrap(), x);
        assert_eq!(to_decimal(F::zero()), "0");

        let modulus: BigUint = F::MODULUS.into();
        assert!(from_decimal::<F>(&modulus.to_string()).is_err());
        assert!(from_decimal::<F>("").is_err());
        assert!(from_decimal::<F>("-1").is_err());
        assert!(from_decimal::<F>("0x10").is_err());
    }

    #[test]
    fn u256_parse_and_reduce() {
        assert_eq!(U256::parse("0x10").unwrap(), U256::from(16));
        assert_eq!(U256::parse("16").unwrap().to_field::<F>().unwrap(), F::from(16u64));

        let max = format!("0x{}", "f".repeat(64));
        let v = U256::parse(&max).unwrap();
        assert!(v.to_field::<F>().is_err());
        assert!(U256::parse(&format!("0x1{}", "0".repeat(64))).is_err());
        assert!(U256::parse("").is_err());
        assert!(U256::parse("0x").is_err());
    }

    #[test]
    fn hex_is_32_bytes() {
        assert_eq!(to_hex(F::from(1u64)).len(), 66);
    }
}
