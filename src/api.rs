//! REST API server for the bank RAG agent
//!
//! Exposes the orchestrator via HTTP endpoints consumed by the chat UI.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{Orchestrator, GENERIC_FAILURE_MESSAGE};

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BankQueryInput {
    pub text: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BankQueryOutput {
    pub output: String,
    pub intermediate_steps: Vec<String>,
    pub session_id: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Helpers — Session Tokens
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Callers may hand us any opaque token; non-UUID tokens map to a stable
/// UUID so the same token always lands on the same session.
fn normalize_session_id(token: Option<&str>) -> Option<Uuid> {
    match token {
        Some(v) if !v.trim().is_empty() => {
            Some(Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v)))
        }
        _ => None,
    }
}

/// =============================
/// Status Endpoint
/// =============================

async fn get_status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "running" }))
}

/// =============================
/// Agent Endpoint
/// =============================

async fn ask_bank_agent(
    State(state): State<ApiState>,
    Json(query): Json<BankQueryInput>,
) -> (StatusCode, Json<serde_json::Value>) {
    info!("Received agent query: {}", query.text);

    let session_id = normalize_session_id(query.session_id.as_deref());

    match state.orchestrator.answer(&query.text, session_id).await {
        Ok(response) => {
            let body = BankQueryOutput {
                output: response.output,
                intermediate_steps: response.intermediate_steps,
                session_id: response.session_id.to_string(),
            };
            (
                StatusCode::OK,
                Json(serde_json::to_value(body).unwrap_or_default()),
            )
        }
        Err(e) => {
            error!(error = %e, "Agent turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": GENERIC_FAILURE_MESSAGE,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/", get(get_status))
        .route("/bank-rag-agent", post(ask_bank_agent))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
