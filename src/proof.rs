//! Wire format for proofs and public signals
//!
//! Proofs travel in the snarkjs Groth16 JSON layout so existing tooling can
//! read them:
//!
//! ```text
//! pi_a: [x, y, "1"]                       G1, projective z = 1
//! pi_b: [[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]    G2 over Fq2
//! pi_c: [x, y, "1"]
//! protocol: "groth16", curve: "bn128"
//! ```
//!
//! The point at infinity is written `["0", "1", "0"]` (G1) or
//! `[["0","0"],["1","0"],["0","0"]]` (G2), again as snarkjs does.
//!
//! Public signals are the array `[output, modelHash, inputHash]` of decimal
//! strings. Calldata for the on-chain entrypoint swaps each `Fq2` pair to
//! `[c1, c0]`, the order the EVM pairing precompile reads.

#![forbid(unsafe_code)]

use ark_bn254::{Fq, Fq2, G1Affine, G2Affine};
use ark_ff::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    circuit::{field_to_bit, NUM_PUBLIC_INPUTS},
    field::{from_decimal, to_decimal, U256},
    ComputeError, Curve, F,
};

pub const PROTOCOL: &str = "groth16";
pub const CURVE: &str = "bn128";

/// Groth16 proof in snarkjs JSON layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub pi_a: [String; 3],
    pub pi_b: [[String; 2]; 3],
    pub pi_c: [String; 3],
    pub protocol: String,
    pub curve: String,
}

/// `uint256` arguments of the on-chain entrypoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Calldata {
    pub a: [U256; 2],
    pub b: [[U256; 2]; 2],
    pub c: [U256; 2],
}

fn s(x: &str) -> String {
    x.to_string()
}

fn g1_to_wire(p: &G1Affine) -> [String; 3] {
    if p.infinity {
        return [s("0"), s("1"), s("0")];
    }
    [to_decimal(p.x), to_decimal(p.y), s("1")]
}

fn g2_to_wire(p: &G2Affine) -> [[String; 2]; 3] {
    if p.infinity {
        return [[s("0"), s("0")], [s("1"), s("0")], [s("0"), s("0")]];
    }
    [
        [to_decimal(p.x.c0), to_decimal(p.x.c1)],
        [to_decimal(p.y.c0), to_decimal(p.y.c1)],
        [s("1"), s("0")],
    ]
}

fn malformed(what: &str, e: ComputeError) -> ComputeError {
    ComputeError::MalformedProof(format!("{what}: {e}"))
}

fn checked_g1(x: Fq, y: Fq, what: &str) -> Result<G1Affine, ComputeError> {
    let p = G1Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ComputeError::MalformedProof(format!("{what} is not a G1 point")));
    }
    Ok(p)
}

fn checked_g2(x: Fq2, y: Fq2, what: &str) -> Result<G2Affine, ComputeError> {
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ComputeError::MalformedProof(format!("{what} is not a G2 point")));
    }
    Ok(p)
}

fn g1_from_wire(w: &[String; 3], what: &str) -> Result<G1Affine, ComputeError> {
    let coord = |i: usize| from_decimal::<Fq>(&w[i]).map_err(|e| malformed(what, e));
    let (x, y, z) = (coord(0)?, coord(1)?, coord(2)?);
    if z.is_zero() {
        return Ok(G1Affine::identity());
    }
    if z != Fq::from(1u64) {
        return Err(ComputeError::MalformedProof(format!("{what}: z must be 0 or 1")));
    }
    checked_g1(x, y, what)
}

fn g2_from_wire(w: &[[String; 2]; 3], what: &str) -> Result<G2Affine, ComputeError> {
    let fq2 = |i: usize| -> Result<Fq2, ComputeError> {
        let c0 = from_decimal::<Fq>(&w[i][0]).map_err(|e| malformed(what, e))?;
        let c1 = from_decimal::<Fq>(&w[i][1]).map_err(|e| malformed(what, e))?;
        Ok(Fq2::new(c0, c1))
    };
    let (x, y, z) = (fq2(0)?, fq2(1)?, fq2(2)?);
    if z.is_zero() {
        return Ok(G2Affine::identity());
    }
    if z != Fq2::new(Fq::from(1u64), Fq::zero()) {
        return Err(ComputeError::MalformedProof(format!("{what}: z must be 0 or 1")));
    }
    checked_g2(x, y, what)
}

fn g1_calldata(p: &G1Affine) -> [U256; 2] {
    if p.infinity {
        return [U256::from(0), U256::from(0)];
    }
    [U256::from_field(p.x), U256::from_field(p.y)]
}

fn g2_calldata(p: &G2Affine) -> [[U256; 2]; 2] {
    if p.infinity {
        return [[U256::from(0), U256::from(0)], [U256::from(0), U256::from(0)]];
    }
    [
        [U256::from_field(p.x.c1), U256::from_field(p.x.c0)],
        [U256::from_field(p.y.c1), U256::from_field(p.y.c0)],
    ]
}

impl Proof {
    pub fn from_ark(p: &ark_groth16::Proof<Curve>) -> Self {
        Self {
            pi_a: g1_to_wire(&p.a),
            pi_b: g2_to_wire(&p.b),
            pi_c: g1_to_wire(&p.c),
            protocol: s(PROTOCOL),
            curve: s(CURVE),
        }
    }

    /// Decode into curve points. Every point is checked to be on the curve and
    /// in the prime-order subgroup.
    pub fn to_ark(&self) -> Result<ark_groth16::Proof<Curve>, ComputeError> {
        if self.protocol != PROTOCOL || self.curve != CURVE {
            return Err(ComputeError::MalformedProof(format!(
                "expected {PROTOCOL}/{CURVE}, got {}/{}",
                self.protocol, self.curve
            )));
        }
        Ok(ark_groth16::Proof {
            a: g1_from_wire(&self.pi_a, "pi_a")?,
            b: g2_from_wire(&self.pi_b, "pi_b")?,
            c: g1_from_wire(&self.pi_c, "pi_c")?,
        })
    }

    /// Fixed placeholder emitted by the mock backend. Never decodes.
    pub fn dummy() -> Self {
        Self {
            pi_a: [s("0"), s("0"), s("1")],
            pi_b: [[s("0"), s("0")], [s("0"), s("0")], [s("1"), s("0")]],
            pi_c: [s("0"), s("0"), s("1")],
            protocol: s(PROTOCOL),
            curve: s(CURVE),
        }
    }

    pub fn to_calldata(&self) -> Result<Calldata, ComputeError> {
        let p = self.to_ark()?;
        Ok(Calldata { a: g1_calldata(&p.a), b: g2_calldata(&p.b), c: g1_calldata(&p.c) })
    }

    /// Inverse of [`Self::to_calldata`]. Coordinates must be below the base
    /// field modulus; whether they form valid points is left to [`Self::to_ark`].
    pub fn from_calldata(cd: &Calldata) -> Result<Self, ComputeError> {
        let fq = |v: &U256| v.to_field::<Fq>();
        let (ax, ay) = (fq(&cd.a[0])?, fq(&cd.a[1])?);
        let (cx, cy) = (fq(&cd.c[0])?, fq(&cd.c[1])?);
        let bx = Fq2::new(fq(&cd.b[0][1])?, fq(&cd.b[0][0])?);
        let by = Fq2::new(fq(&cd.b[1][1])?, fq(&cd.b[1][0])?);

        let g1 = |x: Fq, y: Fq| {
            if x.is_zero() && y.is_zero() {
                [s("0"), s("1"), s("0")]
            } else {
                [to_decimal(x), to_decimal(y), s("1")]
            }
        };
        let pi_b = if bx.is_zero() && by.is_zero() {
            [[s("0"), s("0")], [s("1"), s("0")], [s("0"), s("0")]]
        } else {
            [
                [to_decimal(bx.c0), to_decimal(bx.c1)],
                [to_decimal(by.c0), to_decimal(by.c1)],
                [s("1"), s("0")],
            ]
        };
        Ok(Self {
            pi_a: g1(ax, ay),
            pi_b,
            pi_c: g1(cx, cy),
            protocol: s(PROTOCOL),
            curve: s(CURVE),
        })
    }
}

// ============================================================================
// Public signals
// ============================================================================

/// `[output, modelHash, inputHash]`, the circuit's public inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicSignals {
    pub output: bool,
    pub model_hash: F,
    pub input_hash: F,
}

impl PublicSignals {
    pub fn new(output: bool, model_hash: F, input_hash: F) -> Self {
        Self { output, model_hash, input_hash }
    }

    /// Field elements in the order the verifying key expects.
    pub fn to_inputs(&self) -> [F; NUM_PUBLIC_INPUTS] {
        [F::from(self.output), self.model_hash, self.input_hash]
    }

    pub fn output_u8(&self) -> u8 {
        self.output as u8
    }

    pub fn to_strings(&self) -> [String; NUM_PUBLIC_INPUTS] {
        self.to_inputs().map(to_decimal)
    }

    pub fn from_strings(v: &[String]) -> Result<Self, ComputeError> {
        if v.len() != NUM_PUBLIC_INPUTS {
            return Err(ComputeError::Serialization(format!(
                "expected {NUM_PUBLIC_INPUTS} public signals, got {}",
                v.len()
            )));
        }
        let output = field_to_bit(from_decimal::<F>(&v[0])?).ok_or_else(|| {
            ComputeError::InvalidFieldElement(format!("output `{}` is not a bit", v[0]))
        })?;
        Ok(Self {
            output,
            model_hash: from_decimal(&v[1])?,
            input_hash: from_decimal(&v[2])?,
        })
    }
}

impl Serialize for PublicSignals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_strings())
    }
}

impl<'de> Deserialize<'de> for PublicSignals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        PublicSignals::from_strings(&raw).map_err(de::Error::custom)
    }
}

/// What a prover hands back: the proof and the signals it proves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: Proof,
    #[serde(rename = "publicSignals")]
    pub public_signals: PublicSignals,
}

/// Response body of `/v1/prove` and the CLI prover's output file. Readers
/// that only need the bundle can deserialize it as a [`ProofBundle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveResponse {
    pub proof: Proof,
    pub public_signals: PublicSignals,
    pub output: u8,
    pub model_hash: String,
    pub input_hash: String,
}

impl From<ProofBundle> for ProveResponse {
    fn from(b: ProofBundle) -> Self {
        let s = b.public_signals;
        Self {
            proof: b.proof,
            output: s.output_u8(),
            model_hash: to_decimal(s.model_hash),
            input_hash: to_decimal(s.input_hash),
            public_signals: s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn random_proof() -> ark_groth16::Proof<Curve> {
        let mut rng = StdRng::seed_from_u64(1);
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        ark_groth16::Proof {
            a: (g1 * F::rand(&mut rng)).into(),
            b: (g2 * F::rand(&mut rng)).into(),
            c: (g1 * F::rand(&mut rng)).into(),
        }
    }

    #[test]
    fn wire_layout_matches_snarkjs() {
        let json = serde_json::to_value(Proof::from_ark(&random_proof())).unwrap();
        assert_eq!(json["protocol"], "groth16");
        assert_eq!(json["curve"], "bn128");
        assert_eq!(json["pi_a"][2], "1");
        assert_eq!(json["pi_b"][2], serde_json::json!(["1", "0"]));
        assert_eq!(json["pi_c"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn decode_recovers_points() {
        let p = random_proof();
        assert_eq!(Proof::from_ark(&p).to_ark().unwrap(), p);
    }

    #[test]
    fn dummy_proof_does_not_decode() {
        assert!(matches!(Proof::dummy().to_ark(), Err(ComputeError::MalformedProof(_))));
    }

    #[test]
    fn off_curve_and_foreign_protocol_are_malformed() {
        let mut w = Proof::from_ark(&random_proof());
        w.pi_a[1] = "5".into();
        assert!(matches!(w.to_ark(), Err(ComputeError::MalformedProof(_))));

        let mut w = Proof::from_ark(&random_proof());
        w.protocol = "plonk".into();
        assert!(w.to_ark().is_err());

        let mut w = Proof::from_ark(&random_proof());
        w.pi_c[0] = "not a number".into();
        assert!(w.to_ark().is_err());
    }

    #[test]
    fn calldata_swaps_fq2_coefficients() {
        let p = random_proof();
        let w = Proof::from_ark(&p);
        let cd = w.to_calldata().unwrap();
        assert_eq!(cd.b[0][0], U256::from_field(p.b.x.c1));
        assert_eq!(cd.b[0][1], U256::from_field(p.b.x.c0));
        assert_eq!(Proof::from_calldata(&cd).unwrap(), w);
    }

    #[test]
    fn identity_points_use_snarkjs_encoding() {
        let mut p = random_proof();
        p.c = G1Affine::identity();
        let w = Proof::from_ark(&p);
        assert_eq!(w.pi_c, ["0", "1", "0"].map(String::from));
        assert_eq!(w.to_ark().unwrap().c, G1Affine::identity());
        assert_eq!(Proof::from_calldata(&w.to_calldata().unwrap()).unwrap(), w);
    }

    #[test]
    fn public_signals_are_a_decimal_array() {
        let sig = PublicSignals::new(true, F::from(7u64), F::from(9u64));
        let json = serde_json::to_value(sig).unwrap();
        assert_eq!(json, serde_json::json!(["1", "7", "9"]));
        assert_eq!(serde_json::from_value::<PublicSignals>(json).unwrap(), sig);

        assert!(serde_json::from_value::<PublicSignals>(serde_json::json!(["2", "7", "9"])).is_err());
        assert!(serde_json::from_value::<PublicSignals>(serde_json::json!(["1", "7"])).is_err());
    }

    #[test]
    fn prove_response_reads_back_as_bundle() {
        let bundle = ProofBundle {
            proof: Proof::dummy(),
            public_signals: PublicSignals::new(false, F::from(3u64), F::from(4u64)),
        };
        let json = serde_json::to_value(ProveResponse::from(bundle.clone())).unwrap();
        assert_eq!(json["output"], 0);
        assert_eq!(json["modelHash"], "3");
        assert_eq!(json["publicSignals"][2], "4");
        assert_eq!(serde_json::from_value::<ProofBundle>(json).unwrap(), bundle);
    }
}
