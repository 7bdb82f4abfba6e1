//! Content-addressed artifact fetch.
//!
//! Model and input documents live in IPFS and are referenced by CID. The
//! gateway store resolves `${gateway}${cid}` over HTTP; the memory store keys
//! documents by a BLAKE3 digest of their bytes and backs tests and the
//! inline-artifact path of the API.

#![forbid(unsafe_code)]

use std::{collections::HashMap, sync::RwLock, time::Duration};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{ComputeError, InputData, ModelKind};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid CID `{0}`")]
    InvalidCid(String),
    #[error("artifact {0} not found")]
    NotFound(String),
    #[error("gateway returned {status} for {cid}")]
    Status { cid: String, status: u16 },
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Artifact(#[from] ComputeError),
}

/// CIDs are base-encoded multihashes; anything else never reaches a URL.
fn check_cid(cid: &str) -> Result<(), ArtifactError> {
    if cid.is_empty() || cid.len() > 128 || !cid.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ArtifactError::InvalidCid(cid.to_string()));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct GatewayStore {
    client: reqwest::Client,
    gateway: String,
}

impl GatewayStore {
    pub fn new(gateway: impl Into<String>) -> Result<Self, ArtifactError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, gateway: gateway.into() })
    }

    pub fn url_for(&self, cid: &str) -> Result<String, ArtifactError> {
        check_cid(cid)?;
        Ok(format!("{}{}", self.gateway, cid))
    }

    async fn fetch(&self, cid: &str) -> Result<Value, ArtifactError> {
        let url = self.url_for(cid)?;
        debug!(%url, "fetching artifact");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ArtifactError::NotFound(cid.to_string()));
        }
        if !status.is_success() {
            warn!(cid, status = status.as_u16(), "gateway error");
            return Err(ArtifactError::Status { cid: cid.to_string(), status: status.as_u16() });
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document and return its content address.
    pub fn put(&self, doc: Value) -> String {
        let cid = format!("b3{}", blake3::hash(doc.to_string().as_bytes()).to_hex());
        self.docs
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(cid.clone(), doc);
        cid
    }

    fn fetch(&self, cid: &str) -> Result<Value, ArtifactError> {
        check_cid(cid)?;
        self.docs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(cid)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(cid.to_string()))
    }
}

/// Where artifacts come from.
#[derive(Debug)]
pub enum ArtifactStore {
    Gateway(GatewayStore),
    Memory(MemoryStore),
}

impl ArtifactStore {
    pub async fn fetch(&self, cid: &str) -> Result<Value, ArtifactError> {
        match self {
            ArtifactStore::Gateway(g) => g.fetch(cid).await,
            ArtifactStore::Memory(m) => m.fetch(cid),
        }
    }

    pub async fn load_model(&self, cid: &str) -> Result<ModelKind, ArtifactError> {
        Ok(ModelKind::from_json(self.fetch(cid).await?)?)
    }

    pub async fn load_input(&self, cid: &str) -> Result<InputData, ArtifactError> {
        Ok(InputData::from_json(self.fetch(cid).await?)?)
    }
}
