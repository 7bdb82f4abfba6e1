//! Crate root: public surface, core aliases, and pipeline-wide invariants
//!
//! `zkvc` lets a prover show that a public output bit was produced by
//! evaluating a **private** linear model on a **private** input vector,
//! while binding the proof to commitments of both so it cannot be replayed
//! against another (model, input) pair.
//!
//! ## Pipeline
//!
//! ```text
//!   ModelData ─┐                       ┌─ modelHash ─┐
//!              ├─ CommitmentHasher ────┤             ├─ PublicSignals ─┐
//!   InputData ─┘                       └─ inputHash ─┘                 │
//!                                                                      ▼
//!   Witness (w, b, x, dot, output) ─ LinearModelCircuit ─ Groth16 ─ Proof
//!                                                                      │
//!   JobLedger::verify_job ◄─ Verifier (pairing check) ◄────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - **Field & curve.** All arithmetic happens in `ark_bn254::Fr` (`F` in this
//!   crate); proofs are Groth16 over BN254 (`bn128` in snarkjs terms).
//! - **Fixed arity.** Vectors are exactly [`N`] long. Shape violations are
//!   rejected before any field arithmetic, never padded or truncated.
//! - **Same hash on both sides.** The native Poseidon sponge and the in-circuit
//!   gadget share one parameter set and one absorb schedule (see [`hasher`]).
//!   These are the ark-crypto-primitives Grain parameters with a length tag,
//!   so commitments do not match circomlibjs `poseidon` outputs.
//! - **Bounded sign.** The sign gadget covers `dot ∈ [-2^63, 2^63)`; inputs
//!   outside that window fail with [`ComputeError::ArithmeticOverflow`].
//! - **Single verdict.** A job leaves `Pending` exactly once.
//!
//! The only two calls the surrounding system needs are
//! [`prover::generate_proof`] and [`ledger::JobLedger::verify_job`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Typed error taxonomy shared by every stage.
pub mod error;
/// Lifting numbers into the field and decimal / uint256 codecs.
pub mod field;
/// Model and input artifacts, closed model-kind parsing.
pub mod model;
/// Poseidon commitments, natively and as a constraint gadget.
pub mod hasher;
/// The arithmetic circuit (commitments, dot product, sign gadget).
pub mod circuit;
/// Proving/verifying key pair and its one-time-init holder.
pub mod keys;
/// Wire-format proof and public signals.
pub mod proof;
/// Proof generation (Groth16 backend and deterministic test double).
pub mod prover;
/// Proof verification (Groth16 pairing check and accept-all fixture).
pub mod verifier;
/// Job records and their PENDING → VERIFIED | INVALID state machine.
pub mod ledger;
/// On-chain verification entrypoint with event log.
pub mod contract;
/// Async façade: worker-pool dispatch and proving timeout.
pub mod service;
/// Environment-driven configuration.
pub mod config;
/// Content-addressed artifact fetch (IPFS gateway, in-memory store).
pub mod artifacts;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// Pairing engine used for Groth16.
pub type Curve = ark_bn254::Bn254;

/// Vector length of the linear model (weights and features).
pub const N: usize = 8;

pub use crate::error::ComputeError;
pub use crate::hasher::CommitmentHasher;
pub use crate::keys::{CircuitKeys, KeyRing};
pub use crate::ledger::{Job, JobId, JobLedger, JobStatus};
pub use crate::model::{InputData, ModelData, ModelKind};
pub use crate::proof::{Proof, ProofBundle, ProveResponse, PublicSignals};
pub use crate::prover::{generate_proof, Groth16Prover, MockProver, Prover};
pub use crate::verifier::{AcceptAllVerifier, Groth16Verifier, Verifier};

/// Convenience result alias for the core.
pub type Result<T> = std::result::Result<T, ComputeError>;
