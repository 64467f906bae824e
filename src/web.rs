use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::signal;

use crate::{
    coordinator::RunState,
    engine::{GapFiller, RunReport},
    live_graph::GraphSnapshot,
    vault::NoteEvent,
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8787";

#[derive(Clone)]
struct SharedState {
    filler: Arc<GapFiller>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Join(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router(filler: Arc<GapFiller>) -> Router {
    let shared_state = Arc::new(SharedState { filler });

    Router::new()
        .route("/api/notes/event", post(note_event))
        .route("/api/graph", get(graph))
        .route("/api/graph/filter", post(graph_filter))
        .route("/api/embeddings/reindex", post(reindex))
        .route("/api/embeddings/reload", post(reload))
        .route("/api/run", get(run_state))
        .route("/api/config/threshold", post(set_threshold))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        log::error!("failed to install Ctrl+C handler: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

async fn serve(filler: Arc<GapFiller>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, router(filler))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Blocks until Ctrl+C.
pub fn start_daemon(filler: GapFiller, addr: &str) -> anyhow::Result<()> {
    // the engine owns a blocking http client, which must be dropped outside the runtime
    let filler = Arc::new(filler);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(filler.clone(), addr))
}

async fn note_event(
    State(state): State<Arc<SharedState>>,
    Json(event): Json<NoteEvent>,
) -> Result<Json<RunReport>, HttpError> {
    log::debug!("payload: {event:?}");
    if event.file_path().trim().is_empty() {
        return Err(AppError::BadRequest("file_path is empty".to_string()).into());
    }

    let filler = state.filler.clone();
    let report = tokio::task::spawn_blocking(move || filler.handle_event(&event)).await??;
    Ok(Json(report))
}

async fn graph(State(state): State<Arc<SharedState>>) -> Json<GraphSnapshot> {
    Json(state.filler.snapshot())
}

#[derive(Debug, Deserialize)]
struct FilterRequest {
    #[serde(default)]
    filter: String,
}

async fn graph_filter(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<FilterRequest>,
) -> Json<GraphSnapshot> {
    state.filler.set_filter(&payload.filter);
    Json(state.filler.snapshot())
}

#[derive(Debug, Serialize)]
struct ReindexResponse {
    embedded: usize,
}

async fn reindex(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<ReindexResponse>, HttpError> {
    let filler = state.filler.clone();
    let embedded = tokio::task::spawn_blocking(move || filler.reindex_embeddings(false)).await??;
    Ok(Json(ReindexResponse { embedded }))
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    was_loaded: bool,
}

async fn reload(State(state): State<Arc<SharedState>>) -> Json<ReloadResponse> {
    Json(ReloadResponse {
        was_loaded: state.filler.reload_embeddings(),
    })
}

async fn run_state(State(state): State<Arc<SharedState>>) -> Json<RunState> {
    Json(state.filler.run_state())
}

#[derive(Debug, Serialize, Deserialize)]
struct ThresholdPayload {
    similarity_threshold: f32,
}

async fn set_threshold(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ThresholdPayload>,
) -> Result<Json<ThresholdPayload>, HttpError> {
    let threshold = payload.similarity_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::BadRequest(format!(
            "similarity_threshold must be between 0.0 and 1.0, got {threshold}"
        ))
        .into());
    }

    let filler = state.filler.clone();
    tokio::task::spawn_blocking(move || filler.set_similarity_threshold(threshold)).await??;
    Ok(Json(ThresholdPayload {
        similarity_threshold: state.filler.similarity_threshold(),
    }))
}
