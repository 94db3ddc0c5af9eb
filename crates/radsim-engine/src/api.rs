//! HTTP API for driving a quiz session from a browser front end.
//!
//! The front end renders the scene and forwards learner input here; the
//! engine answers with a fresh [`QuizSnapshot`] and broadcasts the resulting
//! events to WebSocket observers.
//!
//! # Endpoints
//!
//! - `GET /api/status` - Current snapshot
//! - `POST /api/session/start` - Enter the simulation
//! - `POST /api/session/confirm` - Answer lab confirmation (`{confirmed}`)
//! - `POST /api/pose/position` - Drag the model (`{x, y, z}`)
//! - `POST /api/pose/rotation` - Rotate one axis (`{axis, degrees}`)
//! - `POST /api/verify` - Check the placement
//! - `POST /api/next` - Advance to the next exercise
//! - `POST /api/asset/retry` - Retry an unavailable exercise model
//! - `POST /api/session/pause` - Open the exit prompt (holds the countdown)
//! - `POST /api/session/resume` - Dismiss the exit prompt
//! - `POST /api/session/finish` - End the session early
//! - `POST /api/session/exit` - Discard the session
//! - `POST /api/session/restart` - Back to the intro after completion
//! - `GET /api/report` - The most recent report
//! - `GET /api/ws` - Event stream
//!
//! # Example
//!
//! ```no_run
//! use radsim_engine::{create_router, AppState, Catalog, Config, QuizEngine};
//! use radsim_scene::HeadlessScene;
//!
//! # async fn example() {
//! let config = Config::default();
//! let engine = QuizEngine::new(config.clone(), Catalog::reference(), HeadlessScene::new());
//! let state = AppState::new(config, engine);
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use radsim_report::{export_logged, FileExporter, Report, ReportExporter};
use radsim_scene::HeadlessScene;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::events::QuizEvent;
use crate::geometry::{Axis, Vec3};
use crate::quiz::{QuizEngine, QuizSnapshot};
use crate::verifier::Verification;
use crate::websocket::{ws_handler, EventBroadcaster};
use crate::Config;

/// The engine as shared between handlers and the clock driver.
pub type SharedEngine = Arc<Mutex<QuizEngine<HeadlessScene>>>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/session/confirm`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    /// `true` to begin, `false` to go back to the intro.
    pub confirmed: bool,
}

/// Request body for `POST /api/pose/position`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionRequest {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

/// Request body for `POST /api/pose/rotation`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RotationRequest {
    /// Axis to rotate.
    pub axis: Axis,
    /// Angle in degrees.
    pub degrees: f64,
}

/// Response body for the pose endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseResponse {
    /// Whether the input changed the pose.
    pub applied: bool,
    /// Snapshot after the update.
    pub snapshot: QuizSnapshot,
}

/// Response body for `POST /api/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// The verification result.
    pub verification: Verification,
    /// Snapshot after the verification.
    pub snapshot: QuizSnapshot,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration.
    pub config: Config,
    /// The quiz engine.
    pub engine: SharedEngine,
    /// Fan-out of engine events to WebSocket observers.
    pub broadcaster: EventBroadcaster,
    /// Collaborator that receives finalized reports.
    pub exporter: Arc<dyn ReportExporter>,
}

impl AppState {
    /// Creates state around `engine`, exporting reports to the configured
    /// output directory.
    #[must_use]
    pub fn new(config: Config, engine: QuizEngine<HeadlessScene>) -> Self {
        let exporter = FileExporter::new(&config.output_dir)
            .with_formats(config.report_formats.clone());
        Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
            broadcaster: EventBroadcaster::default(),
            exporter: Arc::new(exporter),
        }
    }

    /// Replaces the report exporter.
    #[must_use]
    pub fn with_exporter(mut self, exporter: Arc<dyn ReportExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Hands any report the events carry to the exporter, then broadcasts
    /// the events.
    ///
    /// Inside a tokio runtime the export runs on the blocking pool and the
    /// caller does not wait for it. Export failures are logged and never
    /// reach the caller.
    pub fn publish(&self, events: Vec<QuizEvent>) {
        let reports: Vec<Report> = events
            .iter()
            .filter_map(QuizEvent::report)
            .cloned()
            .collect();
        if !reports.is_empty() {
            self.export_in_background(reports);
        }
        self.broadcaster.send_all(events);
    }

    fn export_in_background(&self, reports: Vec<Report>) {
        let exporter = Arc::clone(&self.exporter);
        let export = move || {
            for report in &reports {
                export_logged(exporter.as_ref(), report);
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                debug!(destination = %self.exporter.target(), "Exporting report in the background");
                drop(handle.spawn_blocking(export));
            }
            Err(_) => export(),
        }
    }

    /// Runs `op` on the engine, publishes the events it produced and returns
    /// its value together with a fresh snapshot.
    async fn with_engine<T>(
        &self,
        op: impl FnOnce(&mut QuizEngine<HeadlessScene>) -> Result<T>,
    ) -> std::result::Result<(T, QuizSnapshot), ApiError> {
        let mut engine = self.engine.lock().await;
        let outcome = op(&mut engine);
        let events = engine.drain_events();
        let snapshot = engine.snapshot();
        drop(engine);

        self.publish(events);
        Ok((outcome?, snapshot))
    }

    async fn transition(
        &self,
        op: impl FnOnce(&mut QuizEngine<HeadlessScene>) -> Result<()>,
    ) -> std::result::Result<Json<QuizSnapshot>, ApiError> {
        let ((), snapshot) = self.with_engine(op).await?;
        Ok(Json(snapshot))
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The command is not valid in the current state.
    Conflict(String),
    /// The requested resource does not exist yet.
    NotFound(String),
    /// Anything else.
    Internal(String),
}

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::InvalidStateTransition { .. } => Self::Conflict(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes are nested under `/api` with permissive CORS for the browser front
/// end and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handle_status))
        .route("/session/start", post(handle_start))
        .route("/session/confirm", post(handle_confirm))
        .route("/pose/position", post(handle_position))
        .route("/pose/rotation", post(handle_rotation))
        .route("/verify", post(handle_verify))
        .route("/next", post(handle_next))
        .route("/asset/retry", post(handle_retry_asset))
        .route("/session/pause", post(handle_pause))
        .route("/session/resume", post(handle_resume))
        .route("/session/finish", post(handle_finish))
        .route("/session/exit", post(handle_exit))
        .route("/session/restart", post(handle_restart))
        .route("/report", get(handle_report))
        .route("/ws", get(ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/status`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<QuizSnapshot> {
    let engine = state.engine.lock().await;
    Json(engine.snapshot())
}

/// Handler for `POST /api/session/start`.
async fn handle_start(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    info!("Start requested");
    state.transition(QuizEngine::start).await
}

/// Handler for `POST /api/session/confirm`.
async fn handle_confirm(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<QuizSnapshot> {
    info!(confirmed = request.confirmed, "Lab confirmation received");
    state
        .transition(|engine| engine.confirm_lab(request.confirmed))
        .await
}

/// Handler for `POST /api/pose/position`.
async fn handle_position(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PositionRequest>,
) -> ApiResult<PoseResponse> {
    let position = Vec3::new(request.x, request.y, request.z);
    let (applied, snapshot) = state
        .with_engine(|engine| Ok(engine.set_position(position)))
        .await?;
    Ok(Json(PoseResponse { applied, snapshot }))
}

/// Handler for `POST /api/pose/rotation`.
async fn handle_rotation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RotationRequest>,
) -> ApiResult<PoseResponse> {
    let (applied, snapshot) = state
        .with_engine(|engine| Ok(engine.set_rotation(request.axis, request.degrees)))
        .await?;
    Ok(Json(PoseResponse { applied, snapshot }))
}

/// Handler for `POST /api/verify`.
async fn handle_verify(State(state): State<Arc<AppState>>) -> ApiResult<VerifyResponse> {
    let (verification, snapshot) = state.with_engine(QuizEngine::verify).await?;
    info!(pass = verification.pass, reason = ?verification.reason, "Placement verified");
    Ok(Json(VerifyResponse {
        verification,
        snapshot,
    }))
}

/// Handler for `POST /api/next`.
async fn handle_next(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    state.transition(QuizEngine::next_exercise).await
}

/// Handler for `POST /api/asset/retry`.
async fn handle_retry_asset(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    state.transition(QuizEngine::retry_asset_load).await
}

/// Handler for `POST /api/session/pause`.
async fn handle_pause(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    state.transition(QuizEngine::open_exit_prompt).await
}

/// Handler for `POST /api/session/resume`.
async fn handle_resume(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    state.transition(QuizEngine::dismiss_exit_prompt).await
}

/// Handler for `POST /api/session/finish`.
async fn handle_finish(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    info!("Early finish requested");
    state.transition(QuizEngine::finish_early).await
}

/// Handler for `POST /api/session/exit`.
async fn handle_exit(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    info!("Exit requested");
    state
        .transition(|engine| {
            engine.exit();
            Ok(())
        })
        .await
}

/// Handler for `POST /api/session/restart`.
async fn handle_restart(State(state): State<Arc<AppState>>) -> ApiResult<QuizSnapshot> {
    state.transition(QuizEngine::restart).await
}

/// Handler for `GET /api/report`.
async fn handle_report(State(state): State<Arc<AppState>>) -> ApiResult<Report> {
    let engine = state.engine.lock().await;
    engine.report().cloned().map(Json).ok_or_else(|| {
        warn!(state = %engine.state(), "Report requested before one exists");
        ApiError::NotFound("No report available yet".to_string())
    })
}

// ============================================================================
// Tests
// ============================================================================
