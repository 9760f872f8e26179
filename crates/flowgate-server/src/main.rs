//! FlowGate Server - Message Gate HTTP Server
//!
//! This is the main entry point for the FlowGate server. It hosts named
//! gates and exposes them over a small JSON API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use flowgate_core::{GateInfo, GateManager};
use flowgate_storage::{ContextStore, FileStore, MemoryStore};
use flowgate_types::{
    CommandTable, Emission, Error, GateConfig, GateStats, Message, Mode, Status,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

// ==================== Server Config ====================

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Process-level settings read from the environment
#[derive(Debug)]
struct ServerConfig {
    /// Listen address (`FLOWGATE_ADDR`)
    addr: SocketAddr,
    /// Directory for file-backed gate state (`FLOWGATE_STORE_DIR`); in-memory when unset
    store_dir: Option<PathBuf>,
}

#[derive(Debug, ThisError)]
enum ConfigError {
    #[error("invalid FLOWGATE_ADDR {value:?}: {source}")]
    InvalidAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let addr = std::env::var("FLOWGATE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddr { value: addr, source })?;
        let store_dir = std::env::var_os("FLOWGATE_STORE_DIR").map(PathBuf::from);
        Ok(Self { addr, store_dir })
    }
}

// ==================== App State ====================

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<GateManager>,
}

// ==================== Request/Response Types ====================

/// Create gate request
#[derive(Debug, Deserialize, ToSchema)]
struct CreateGateRequest {
    /// Name of the gate to create
    name: String,
    /// Optional gate configuration
    #[serde(default)]
    config: Option<GateConfig>,
}

/// Publish message request
#[derive(Debug, Deserialize, ToSchema)]
struct PublishRequest {
    /// Message topic; the gate's control topic marks a control message
    #[serde(default)]
    topic: Option<String>,
    /// Message payload
    #[serde(default)]
    payload: Option<Value>,
}

impl From<PublishRequest> for Message {
    fn from(req: PublishRequest) -> Self {
        Message::with_parts(req.topic, req.payload)
    }
}

/// Publish response
#[derive(Debug, Serialize, ToSchema)]
struct PublishResponse {
    /// ID assigned to the message
    message_id: String,
}

/// Output query parameters
#[derive(Debug, Deserialize, ToSchema)]
struct OutputQuery {
    /// Maximum number of emissions to take (default: 100)
    #[serde(default = "default_max_output")]
    max: usize,
}

fn default_max_output() -> usize {
    100
}

/// Gate response (for API)
#[derive(Debug, Serialize, ToSchema)]
struct GateResponse {
    /// Gate name
    name: String,
    /// Configuration the gate was created with
    config: GateConfig,
    /// Current mode
    mode: Mode,
    /// Buffered messages
    queue_len: usize,
    /// Status display
    status: Status,
    /// Counters
    stats: GateStats,
    /// Whether the drain timer is armed
    timer_armed: bool,
    /// Emissions waiting to be taken
    output_len: usize,
    /// Emissions discarded before anyone took them
    output_evicted: u64,
}

impl From<GateInfo> for GateResponse {
    fn from(info: GateInfo) -> Self {
        Self {
            name: info.name,
            config: info.config,
            mode: info.view.mode,
            queue_len: info.view.queue_len,
            status: info.view.status,
            stats: info.view.stats,
            timer_armed: info.view.timer_armed,
            output_len: info.view.output_len,
            output_evicted: info.view.output_evicted,
        }
    }
}

/// API Error response
#[derive(Debug, Serialize, ToSchema)]
struct ApiErrorBody {
    /// Error message
    error: String,
    /// Error code
    code: String,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    /// Health status
    status: String,
    /// Server version
    version: String,
}

// ==================== Error Handling ====================

/// Wrapper for FlowGate errors to implement IntoResponse
struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            Error::GateNotFound(_) => (StatusCode::NOT_FOUND, "GATE_NOT_FOUND"),
            Error::GateAlreadyExists(_) => (StatusCode::CONFLICT, "GATE_ALREADY_EXISTS"),
            Error::GateStopped(_) => (StatusCode::GONE, "GATE_STOPPED"),
            Error::InvalidMode(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            Error::DuplicateCommand { .. } => (StatusCode::BAD_REQUEST, "DUPLICATE_COMMAND"),
            Error::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIG"),
            Error::QueueFull(_) => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ApiErrorBody {
            error: self.0.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// ==================== OpenAPI Documentation ====================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FlowGate API",
        version = "0.1.0",
        description = "FlowGate - message gate with open, closed and queueing modes",
        license(name = "MIT OR Apache-2.0"),
        contact(name = "FlowGate Team", url = "https://github.com/flowgate/flowgate")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health,
        list_gates,
        create_gate,
        get_gate,
        delete_gate,
        publish_message,
        take_output,
    ),
    components(
        schemas(
            HealthResponse,
            GateConfig,
            CommandTable,
            Mode,
            Status,
            GateStats,
            Message,
            Emission,
            CreateGateRequest,
            PublishRequest,
            PublishResponse,
            GateResponse,
            OutputQuery,
            ApiErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "gates", description = "Gate management endpoints"),
        (name = "messages", description = "Message operations endpoints")
    )
)]
struct ApiDoc;

// ==================== Handlers ====================

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List all gates
#[utoipa::path(
    get,
    path = "/api/v1/gates",
    tag = "gates",
    responses(
        (status = 200, description = "List of all gates", body = Vec<GateResponse>)
    )
)]
async fn list_gates(State(state): State<AppState>) -> Result<Json<Vec<GateResponse>>, AppError> {
    let gates = state.manager.list_gates().await?;
    Ok(Json(gates.into_iter().map(Into::into).collect()))
}

/// Create a new gate
#[utoipa::path(
    post,
    path = "/api/v1/gates",
    tag = "gates",
    request_body = CreateGateRequest,
    responses(
        (status = 201, description = "Gate created successfully", body = GateResponse),
        (status = 400, description = "Invalid configuration", body = ApiErrorBody),
        (status = 409, description = "Gate already exists", body = ApiErrorBody)
    )
)]
async fn create_gate(
    State(state): State<AppState>,
    Json(req): Json<CreateGateRequest>,
) -> Result<(StatusCode, Json<GateResponse>), AppError> {
    let config = req.config.unwrap_or_default();
    let info = state.manager.create_gate(req.name, config).await?;
    Ok((StatusCode::CREATED, Json(info.into())))
}

/// Get gate details
#[utoipa::path(
    get,
    path = "/api/v1/gates/{name}",
    tag = "gates",
    params(
        ("name" = String, Path, description = "Gate name")
    ),
    responses(
        (status = 200, description = "Gate details", body = GateResponse),
        (status = 404, description = "Gate not found", body = ApiErrorBody)
    )
)]
async fn get_gate(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<GateResponse>, AppError> {
    let info = state.manager.get_gate(&name).await?;
    Ok(Json(info.into()))
}

/// Stop and delete a gate
#[utoipa::path(
    delete,
    path = "/api/v1/gates/{name}",
    tag = "gates",
    params(
        ("name" = String, Path, description = "Gate name")
    ),
    responses(
        (status = 204, description = "Gate deleted successfully"),
        (status = 404, description = "Gate not found", body = ApiErrorBody)
    )
)]
async fn delete_gate(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.manager.remove_gate(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a message into a gate
#[utoipa::path(
    post,
    path = "/api/v1/gates/{name}/messages",
    tag = "messages",
    params(
        ("name" = String, Path, description = "Gate name")
    ),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Message handled by the gate", body = PublishResponse),
        (status = 404, description = "Gate not found", body = ApiErrorBody),
        (status = 503, description = "Gate queue is full", body = ApiErrorBody)
    )
)]
async fn publish_message(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let message: Message = req.into();
    let message_id = message.id.to_string();

    state.manager.publish(&name, message).await?;

    Ok((StatusCode::OK, Json(PublishResponse { message_id })))
}

/// Take pending output of a gate
#[utoipa::path(
    get,
    path = "/api/v1/gates/{name}/output",
    tag = "messages",
    params(
        ("name" = String, Path, description = "Gate name"),
        ("max" = Option<usize>, Query, description = "Maximum emissions to take")
    ),
    responses(
        (status = 200, description = "Emissions in send order", body = Vec<Emission>),
        (status = 404, description = "Gate not found", body = ApiErrorBody)
    )
)]
async fn take_output(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<OutputQuery>,
) -> Result<Json<Vec<Emission>>, AppError> {
    let output = state.manager.take_output(&name, query.max)?;
    Ok(Json(output))
}

// ==================== Router ====================

fn create_router(state: AppState) -> Router {
    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health
        .route("/health", get(health))
        // Gates
        .route("/api/v1/gates", get(list_gates).post(create_gate))
        .route("/api/v1/gates/:name", get(get_gate).delete(delete_gate))
        // Messages
        .route("/api/v1/gates/:name/messages", post(publish_message))
        .route("/api/v1/gates/:name/output", get(take_output))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

// ==================== Main ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Pick the context store
    let store: Arc<dyn ContextStore> = match &config.store_dir {
        Some(dir) => Arc::new(FileStore::open(dir.clone()).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let manager = Arc::new(GateManager::with_store(store));

    // Create app state
    let state = AppState {
        manager: Arc::clone(&manager),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    info!("FlowGate server listening on {}", config.addr);
    info!("Swagger UI: http://{}/swagger-ui/", config.addr);
    info!("Health check: http://{}/health", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown().await;

    Ok(())
}
