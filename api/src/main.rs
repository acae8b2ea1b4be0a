// ./api/src/main.rs
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::{get, post},
};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::{ApplicationError, DocumentService};
use domain::{DocumentDraft, SearchRequest};
use infrastructure::InMemoryDocumentRepository;

#[derive(Clone)]
struct AppState {
    document_service: Arc<DocumentService>,
}

const DEFAULT_PORT: u16 = 3000;

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let port = resolve_port(env::var("PORT").ok());

    // --- Dependency Injection ---
    let document_repository = Arc::new(InMemoryDocumentRepository::new());
    let document_service = Arc::new(DocumentService::new(document_repository));
    info!("Document service initialized.");

    let app = router(AppState { document_service });
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Picks the listen port from the raw `PORT` value, falling back to the default.
fn resolve_port(raw: Option<String>) -> u16 {
    match raw {
        Some(port_str) => match u16::from_str(port_str.trim()) {
            Ok(port_num) => {
                info!("Using port {} from environment variable PORT.", port_num);
                port_num
            }
            Err(_) => {
                warn!(
                    "Invalid PORT value '{}' in environment variable. Using default port {}.",
                    port_str, DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        },
        None => {
            info!(
                "PORT environment variable not set. Using default port {}.",
                DEFAULT_PORT
            );
            DEFAULT_PORT
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats_handler))
        .route("/documents", post(save_document_handler))
        .route("/documents/search", post(search_documents_handler))
        .route("/documents/:id", get(get_document_handler))
        .with_state(state)
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

/// Handler for upserting a document (POST /documents).
async fn save_document_handler(
    State(state): State<AppState>,
    Json(payload): Json<DocumentDraft>,
) -> Response {
    info!(requested_id = ?payload.requested_id(), "Received request to save document");
    match state.document_service.save_document(payload).await {
        Ok(document) => (StatusCode::OK, JsonResponse(document)).into_response(),
        Err(e) => {
            error!("Failed to save document via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for fetching a document (GET /documents/:id).
async fn get_document_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    info!(doc_id = %id, "Received request to get document");
    match state.document_service.get_document(&id).await {
        Ok(document) => (StatusCode::OK, JsonResponse(document)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for searching documents (POST /documents/search).
/// A `null` body matches every document.
async fn search_documents_handler(
    State(state): State<AppState>,
    Json(request): Json<Option<SearchRequest>>,
) -> Response {
    info!(has_request = request.is_some(), "Received search request");
    match state.document_service.search_documents(request).await {
        Ok(response) => {
            info!("Search completed via handler, {} hits", response.nb_hits);
            (StatusCode::OK, JsonResponse(response)).into_response()
        }
        Err(e) => {
            error!("Failed to search documents via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

async fn get_stats_handler(State(state): State<AppState>) -> Response {
    info!("Received request to get statistics");
    match state.document_service.get_stats().await {
        Ok(stats) => (StatusCode::OK, JsonResponse(stats)).into_response(),
        Err(e) => {
            error!("Failed to get statistics via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Maps ApplicationError to HTTP status codes and response body.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let (status, body) = match err {
        ApplicationError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            format!("Document '{}' not found", id),
        ),
        ApplicationError::IdGenerationExhausted { attempts } => {
            error!(attempts, "Document id generation exhausted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not assign a document id".to_string(),
            )
        }
        ApplicationError::InfrastructureError(msg) => {
            error!("Underlying infrastructure error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
    };
    (status, body).into_response()
}
