//! Proving/verifying keys and their process-wide holder
//!
//! # Lifecycle
//!
//! ```text
//!   KeyRing::new(source) ──► get_or_init() ──► Arc<CircuitKeys> (shared, read-only)
//!                               │   ▲
//!                               │   └─ concurrent first callers block on the
//!                               │      init lock; exactly one builds/loads
//!                               ▼
//!                           shutdown() ──► later get_or_init() fails
//! ```
//!
//! Keys are immutable once built, so readers never lock: the fast path is a
//! `OnceLock` read. Work already holding an `Arc<CircuitKeys>` finishes after
//! [`KeyRing::shutdown`]; memory is freed when the last holder drops it.
//!
//! # Sources
//!
//! - [`KeySource::Seeded`]: circuit-specific Groth16 setup from a fixed seed.
//!   The toxic waste is reproducible from the seed, so this is for development
//!   and tests only.
//! - [`KeySource::Files`]: load `proving_key.bin` + `verifying_key.bin` written
//!   by the `setup` binary.
//! - [`KeySource::VerifyingOnly`]: load just a verifying key (verifier hosts).
//!
//! # File format
//!
//! ```text
//! magic (8 bytes) | u16 big-endian version | ark-compressed key
//! ```

#![forbid(unsafe_code)]

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, OnceLock,
    },
};

use ark_groth16::{Groth16, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};
use tracing::{info, warn};

use crate::{circuit::LinearModelCircuit, CommitmentHasher, Curve};

pub const PK_MAGIC: &[u8; 8] = b"ZKVCpk1\0";
pub const VK_MAGIC: &[u8; 8] = b"ZKVCvk1\0";
pub const FILE_VERSION: u16 = 1;

pub const PROVING_KEY_FILE: &str = "proving_key.bin";
pub const VERIFYING_KEY_FILE: &str = "verifying_key.bin";

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: bad key file magic")]
    BadMagic(PathBuf),
    #[error("unsupported key file version {0}")]
    UnsupportedVersion(u16),
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("key setup failed: {0}")]
    Setup(String),
    #[error("key ring has been shut down")]
    Released,
    #[error("key ring init lock poisoned")]
    Poisoned,
}

// ============================================================================
// CircuitKeys
// ============================================================================

/// Groth16 keys for [`LinearModelCircuit`]. The proving half is optional so
/// verifier-only hosts can hold just the verifying key.
pub struct CircuitKeys {
    proving: Option<ProvingKey<Curve>>,
    verifying: VerifyingKey<Curve>,
    prepared: PreparedVerifyingKey<Curve>,
}

impl std::fmt::Debug for CircuitKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitKeys")
            .field("has_proving_key", &self.proving.is_some())
            .field("vk_digest", &self.vk_digest_hex())
            .finish()
    }
}

impl CircuitKeys {
    /// Circuit-specific setup over the blank instance.
    pub fn generate<R: RngCore + CryptoRng>(
        hasher: &CommitmentHasher,
        rng: &mut R,
    ) -> Result<Self, KeyError> {
        let circuit = LinearModelCircuit::blank(hasher.clone());
        let (pk, vk) = Groth16::<Curve>::circuit_specific_setup(circuit, rng)
            .map_err(|e| KeyError::Setup(e.to_string()))?;
        Self::from_parts(Some(pk), vk)
    }

    /// Deterministic setup. Anyone with the seed can forge proofs.
    pub fn from_seed(hasher: &CommitmentHasher, seed: u64) -> Result<Self, KeyError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::generate(hasher, &mut rng)
    }

    pub fn from_parts(
        proving: Option<ProvingKey<Curve>>,
        verifying: VerifyingKey<Curve>,
    ) -> Result<Self, KeyError> {
        let prepared = Groth16::<Curve>::process_vk(&verifying)
            .map_err(|e| KeyError::Setup(e.to_string()))?;
        Ok(Self { proving, verifying, prepared })
    }

    pub fn proving_key(&self) -> Option<&ProvingKey<Curve>> {
        self.proving.as_ref()
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Curve> {
        &self.verifying
    }

    pub fn prepared_verifying_key(&self) -> &PreparedVerifyingKey<Curve> {
        &self.prepared
    }

    /// Number of public inputs the verifying key expects.
    pub fn num_public_inputs(&self) -> usize {
        self.verifying.gamma_abc_g1.len().saturating_sub(1)
    }

    /// BLAKE3 digest of the compressed verifying key (audit trail).
    pub fn vk_digest(&self) -> [u8; 32] {
        let mut bytes = Vec::new();
        // Serializing into a Vec cannot fail.
        let _ = self.verifying.serialize_compressed(&mut bytes);
        let mut h = blake3::Hasher::new();
        h.update(b"ZKVC.VK.v1");
        h.update(&(bytes.len() as u64).to_be_bytes());
        h.update(&bytes);
        *h.finalize().as_bytes()
    }

    pub fn vk_digest_hex(&self) -> String {
        format!("0x{}", hex::encode(self.vk_digest()))
    }

    /// Write both keys into `dir` (created if missing).
    pub fn save(&self, dir: &Path) -> Result<(), KeyError> {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        if let Some(pk) = &self.proving {
            write_key(&dir.join(PROVING_KEY_FILE), PK_MAGIC, pk)?;
        }
        write_key(&dir.join(VERIFYING_KEY_FILE), VK_MAGIC, &self.verifying)
    }

    /// Load both keys from `dir`.
    pub fn load(dir: &Path) -> Result<Self, KeyError> {
        let pk: ProvingKey<Curve> = read_key(&dir.join(PROVING_KEY_FILE), PK_MAGIC)?;
        let vk: VerifyingKey<Curve> = read_key(&dir.join(VERIFYING_KEY_FILE), VK_MAGIC)?;
        if pk.vk != vk {
            return Err(KeyError::Deserialize(
                "proving key does not embed the verifying key on disk".into(),
            ));
        }
        Self::from_parts(Some(pk), vk)
    }

    /// Load a verifying key file only.
    pub fn load_verifying(path: &Path) -> Result<Self, KeyError> {
        let vk: VerifyingKey<Curve> = read_key(path, VK_MAGIC)?;
        Self::from_parts(None, vk)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> KeyError {
    KeyError::Io { path: path.to_path_buf(), source }
}

fn write_key<T: CanonicalSerialize>(path: &Path, magic: &[u8; 8], key: &T) -> Result<(), KeyError> {
    let mut payload = Vec::new();
    key.serialize_compressed(&mut payload)
        .map_err(|e| KeyError::Deserialize(e.to_string()))?;
    let mut f = fs::File::create(path).map_err(|e| io_err(path, e))?;
    f.write_all(magic).map_err(|e| io_err(path, e))?;
    f.write_all(&FILE_VERSION.to_be_bytes()).map_err(|e| io_err(path, e))?;
    f.write_all(&payload).map_err(|e| io_err(path, e))?;
    f.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

fn read_key<T: CanonicalDeserialize>(path: &Path, magic: &[u8; 8]) -> Result<T, KeyError> {
    let mut f = fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut got = [0u8; 8];
    f.read_exact(&mut got).map_err(|e| io_err(path, e))?;
    if &got != magic {
        return Err(KeyError::BadMagic(path.to_path_buf()));
    }
    let mut ver = [0u8; 2];
    f.read_exact(&mut ver).map_err(|e| io_err(path, e))?;
    let version = u16::from_be_bytes(ver);
    if version != FILE_VERSION {
        return Err(KeyError::UnsupportedVersion(version));
    }
    let mut payload = Vec::new();
    f.read_to_end(&mut payload).map_err(|e| io_err(path, e))?;
    T::deserialize_compressed(payload.as_slice()).map_err(|e| KeyError::Deserialize(e.to_string()))
}

// ============================================================================
// KeyRing
// ============================================================================

/// Where a [`KeyRing`] gets its keys on first use.
#[derive(Clone, Debug)]
pub enum KeySource {
    Seeded(u64),
    Files(PathBuf),
    VerifyingOnly(PathBuf),
}

impl KeySource {
    fn build(&self, hasher: &CommitmentHasher) -> Result<CircuitKeys, KeyError> {
        match self {
            KeySource::Seeded(seed) => {
                warn!(seed, "generating Groth16 keys from a fixed seed; NOT for production");
                CircuitKeys::from_seed(hasher, *seed)
            }
            KeySource::Files(dir) => CircuitKeys::load(dir),
            KeySource::VerifyingOnly(path) => CircuitKeys::load_verifying(path),
        }
    }
}

/// One-time-initialized, shareable holder of [`CircuitKeys`].
pub struct KeyRing {
    source: KeySource,
    hasher: CommitmentHasher,
    keys: OnceLock<Arc<CircuitKeys>>,
    init_lock: Mutex<()>,
    released: AtomicBool,
    builds: AtomicUsize,
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("source", &self.source)
            .field("initialized", &self.keys.get().is_some())
            .field("released", &self.released.load(Ordering::Acquire))
            .finish()
    }
}

impl KeyRing {
    pub fn new(source: KeySource, hasher: CommitmentHasher) -> Self {
        Self {
            source,
            hasher,
            keys: OnceLock::new(),
            init_lock: Mutex::new(()),
            released: AtomicBool::new(false),
            builds: AtomicUsize::new(0),
        }
    }

    /// A ring that is already initialized with `keys`.
    pub fn with_keys(keys: Arc<CircuitKeys>, hasher: CommitmentHasher) -> Self {
        let ring = Self::new(KeySource::Seeded(0), hasher);
        let _ = ring.keys.set(keys);
        ring
    }

    pub fn hasher(&self) -> &CommitmentHasher {
        &self.hasher
    }

    /// Keys if already initialized and not shut down; never builds.
    pub fn get(&self) -> Option<Arc<CircuitKeys>> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        self.keys.get().cloned()
    }

    /// Keys, building/loading them exactly once across all callers.
    pub fn get_or_init(&self) -> Result<Arc<CircuitKeys>, KeyError> {
        if self.released.load(Ordering::Acquire) {
            return Err(KeyError::Released);
        }
        if let Some(k) = self.keys.get() {
            return Ok(k.clone());
        }
        let _guard = self.init_lock.lock().map_err(|_| KeyError::Poisoned)?;
        if let Some(k) = self.keys.get() {
            return Ok(k.clone());
        }
        let built = Arc::new(self.source.build(&self.hasher)?);
        self.builds.fetch_add(1, Ordering::AcqRel);
        info!(vk_digest = %built.vk_digest_hex(), "circuit keys initialized");
        let _ = self.keys.set(built.clone());
        Ok(built)
    }

    /// Stop handing out keys. Callers already holding an `Arc` are unaffected.
    pub fn shutdown(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            info!("key ring shut down");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// How many times keys were actually built or loaded (0 or 1).
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Acquire)
    }
}
