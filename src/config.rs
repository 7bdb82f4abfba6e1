//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `VCOMPUTE_ADDR` | `127.0.0.1:4000` |
//! | `VCOMPUTE_BACKEND` | `groth16` (`mock` needs the `mock-backend` feature) |
//! | `VCOMPUTE_PROVE_TIMEOUT_MS` | `60000` |
//! | `VCOMPUTE_KEY_DIR` | unset: keys come from `VCOMPUTE_SETUP_SEED` |
//! | `VCOMPUTE_SETUP_SEED` | `42` |
//! | `PINATA_GATEWAY_URL` | `https://gateway.pinata.cloud/ipfs/` |
//! | `CORS_ALLOWED_ORIGINS` | `*` |
//!
//! Values that are present but unparsable are errors; only absent variables
//! fall back to defaults.

#![forbid(unsafe_code)]

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::keys::KeySource;

pub const DEFAULT_ADDR: &str = "127.0.0.1:4000";
pub const DEFAULT_PROVE_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SETUP_SEED: u64 = 42;
pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("the mock backend is disabled in this build (enable feature `mock-backend`)")]
    MockDisabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Groth16,
    Mock,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groth16" => Ok(Backend::Groth16),
            "mock" => Ok(Backend::Mock),
            other => Err(format!("unknown backend `{other}` (expected groth16|mock)")),
        }
    }
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Groth16 => "groth16",
            Backend::Mock => "mock",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: Backend,
    pub prove_timeout: Duration,
    pub key_dir: Option<PathBuf>,
    pub setup_seed: u64,
    pub gateway_url: String,
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            backend: Backend::Groth16,
            prove_timeout: Duration::from_millis(DEFAULT_PROVE_TIMEOUT_MS),
            key_dir: None,
            setup_seed: DEFAULT_SETUP_SEED,
            gateway_url: DEFAULT_GATEWAY.into(),
            cors_allowed_origins: "*".into(),
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key → value source (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let backend = parsed(&lookup, "VCOMPUTE_BACKEND", d.backend)?;
        if backend == Backend::Mock && !cfg!(any(test, feature = "mock-backend")) {
            return Err(ConfigError::MockDisabled);
        }
        let timeout_ms = parsed(&lookup, "VCOMPUTE_PROVE_TIMEOUT_MS", DEFAULT_PROVE_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "VCOMPUTE_PROVE_TIMEOUT_MS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let mut gateway_url = lookup("PINATA_GATEWAY_URL").unwrap_or(d.gateway_url);
        if !gateway_url.ends_with('/') {
            gateway_url.push('/');
        }

        Ok(Self {
            addr: parsed(&lookup, "VCOMPUTE_ADDR", d.addr)?,
            backend,
            prove_timeout: Duration::from_millis(timeout_ms),
            key_dir: lookup("VCOMPUTE_KEY_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            setup_seed: parsed(&lookup, "VCOMPUTE_SETUP_SEED", d.setup_seed)?,
            gateway_url,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").unwrap_or(d.cors_allowed_origins),
        })
    }

    /// Where the Groth16 backend gets its keys.
    pub fn key_source(&self) -> KeySource {
        match &self.key_dir {
            Some(dir) => KeySource::Files(dir.clone()),
            None => KeySource::Seeded(self.setup_seed),
        }
    }
}
