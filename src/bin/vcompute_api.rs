//! vcompute_api: REST façade over the proof service and job ledger.
//!
//! Endpoints (JSON):
//! - GET  /v1/health
//! - GET  /v1/version
//! - POST /v1/prove          { modelCID, inputCID } | { model, input } -> ProveResponse
//! - POST /v1/jobs           { requester, modelCID, inputCID, modelHash, inputHash,
//!                             output, pA, pB, pC } -> { jobId, verified, job }
//! - GET  /v1/jobs           -> [Job]
//! - GET  /v1/jobs/:id       -> Job
//! - POST /v1/jobs/:id/tx    { txHash } -> Job
//!
//! Notes:
//! - CIDs are resolved through `PINATA_GATEWAY_URL`; inline artifacts skip the
//!   gateway.
//! - Keys load (or are generated from `VCOMPUTE_SETUP_SEED`) before the
//!   listener binds, so the first request does not pay for setup.
//! - On Ctrl-C the server drains, then releases the key ring.

#![forbid(unsafe_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use zkvc::{
    artifacts::{ArtifactError, ArtifactStore, GatewayStore},
    config::Config,
    contract::SubmitProof,
    service::ProofService,
    ComputeError, InputData, Job, JobId, ModelKind, ProveResponse,
};

#[derive(Clone)]
struct AppState {
    service: ProofService,
    artifacts: Arc<ArtifactStore>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

// ------------------------------ Errors ------------------------------

fn compute_status(e: &ComputeError) -> StatusCode {
    use ComputeError::*;
    match e {
        DimensionMismatch { .. }
        | InvalidFieldElement(_)
        | ArithmeticOverflow { .. }
        | UnsupportedModelKind(_)
        | MalformedProof(_)
        | Serialization(_) => StatusCode::BAD_REQUEST,
        UnknownJob(_) => StatusCode::NOT_FOUND,
        TxHashRejected { .. } => StatusCode::CONFLICT,
        VerificationFailed | ReplayDetected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ProvingKeyUnavailable | VerifyingKeyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ProofGenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Synthesis(_) | Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn compute_err(e: ComputeError) -> (StatusCode, String) {
    let code = compute_status(&e);
    if code.is_server_error() {
        error!(error = %e, "request failed");
    }
    (code, e.to_string())
}

fn artifact_err(e: ArtifactError) -> (StatusCode, String) {
    match e {
        ArtifactError::Artifact(inner) => compute_err(inner),
        ArtifactError::InvalidCid(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        ArtifactError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        ArtifactError::Status { .. } | ArtifactError::Http(_) => {
            warn!(error = %e, "artifact fetch failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

fn bad_request(msg: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

// ------------------------------ Handlers ------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn version(State(st): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "backend": st.service.backend_name(),
        "protocol": zkvc::proof::PROTOCOL,
        "curve": zkvc::proof::CURVE,
        "arity": zkvc::N,
    }))
}

#[derive(Deserialize)]
struct ProveRequest {
    #[serde(rename = "modelCID")]
    model_cid: Option<String>,
    #[serde(rename = "inputCID")]
    input_cid: Option<String>,
    model: Option<serde_json::Value>,
    input: Option<serde_json::Value>,
}

async fn prove(State(st): State<AppState>, Json(req): Json<ProveRequest>) -> ApiResult<ProveResponse> {
    let model = match (req.model, req.model_cid) {
        (Some(doc), _) => ModelKind::from_json(doc).map_err(compute_err)?,
        (None, Some(cid)) => {
            info!(%cid, "fetching model");
            st.artifacts.load_model(&cid).await.map_err(artifact_err)?
        }
        (None, None) => return Err(bad_request("need `model` or `modelCID`")),
    };
    let input = match (req.input, req.input_cid) {
        (Some(doc), _) => InputData::from_json(doc).map_err(compute_err)?,
        (None, Some(cid)) => {
            info!(%cid, "fetching input");
            st.artifacts.load_input(&cid).await.map_err(artifact_err)?
        }
        (None, None) => return Err(bad_request("need `input` or `inputCID`")),
    };

    let bundle = st
        .service
        .prove(model.into_linear(), input)
        .await
        .map_err(compute_err)?;
    Ok(Json(ProveResponse::from(bundle)))
}

#[derive(Deserialize)]
struct SubmitRequest {
    requester: String,
    #[serde(flatten)]
    call: SubmitProof,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: JobId,
    verified: bool,
    job: Option<Job>,
}

async fn submit_job(State(st): State<AppState>, Json(req): Json<SubmitRequest>) -> ApiResult<SubmitResponse> {
    let (job_id, verified) = st
        .service
        .submit(req.requester, req.call)
        .await
        .map_err(compute_err)?;
    Ok(Json(SubmitResponse { job_id, verified, job: st.service.ledger().get(job_id) }))
}

async fn list_jobs(State(st): State<AppState>) -> Json<Vec<Job>> {
    Json(st.service.ledger().list())
}

async fn get_job(State(st): State<AppState>, Path(id): Path<u64>) -> ApiResult<Job> {
    st.service
        .ledger()
        .get(JobId(id))
        .map(Json)
        .ok_or_else(|| compute_err(ComputeError::UnknownJob(id)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxRequest {
    tx_hash: String,
}

async fn set_tx(
    State(st): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<TxRequest>,
) -> ApiResult<Job> {
    let ledger = st.service.ledger();
    ledger.set_tx_hash(JobId(id), &req.tx_hash).map_err(compute_err)?;
    ledger
        .get(JobId(id))
        .map(Json)
        .ok_or_else(|| compute_err(ComputeError::UnknownJob(id)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
    }
    info!("shutdown requested");
}

// ------------------------------ Main ------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "zkvc=info,vcompute_api=info,tower_http=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cfg = Config::from_env()?;
    info!(backend = cfg.backend.as_str(), addr = %cfg.addr, "starting vcompute API");

    let service = ProofService::from_config(&cfg);
    service.warm_up().await?;
    let artifacts = Arc::new(ArtifactStore::Gateway(GatewayStore::new(cfg.gateway_url.clone())?));

    let cors = if cfg.cors_allowed_origins == "*" {
        warn!("CORS set to permissive mode (*)");
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cfg
            .cors_allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        info!("CORS configured for origins: {:?}", origins);
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    // 10 req/sec per IP, burst of 30.
    let governor_conf = Box::leak(Box::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    ));

    let app = Router::new()
        .route("/v1/health", get(health))
        .route("/v1/version", get(version))
        .route("/v1/prove", post(prove))
        .route("/v1/jobs", post(submit_job).get(list_jobs))
        .route("/v1/jobs/:id", get(get_job))
        .route("/v1/jobs/:id/tx", post(set_tx))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(GovernorLayer { config: governor_conf })
        .with_state(AppState { service: service.clone(), artifacts })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(cfg.addr).await?;
    info!("vcompute API listening on http://{}", cfg.addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown();
    Ok(())
}
