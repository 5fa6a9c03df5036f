use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use tably_core::{ApplicationError, ConversationTurn};

use crate::bootstrap::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/call-reserve", post(call_reserve))
        .with_state(state)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Tably",
        "status": "operational",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    message: String,
    #[serde(default)]
    chat_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

/// Text chat against the same runtime the voice relay uses, without bound
/// reservation parameters.
async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    match state.runtime.respond(None, &body.chat_history, &body.message).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(err) => {
            error!(error = %err, "chat exchange failed");
            Err(internal_error(ApplicationError::from(err)))
        }
    }
}

fn internal_error(error: ApplicationError) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { detail: error.detail() }))
}

#[derive(Debug, Deserialize)]
struct CallReserveBody {
    date: String,
    time: String,
    people: u32,
    name: String,
    phone_number: String,
}

/// Kicks off an outbound reservation call. The gateway dials the guest and
/// connects the call back to this service's relay websocket; the call id is
/// appended by the gateway as the final path segment.
async fn call_reserve(
    State(state): State<AppState>,
    Json(body): Json<CallReserveBody>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    let relay_url = relay_url(&state).map_err(|detail| {
        error!(detail, "outbound call rejected");
        internal_error(ApplicationError::Configuration(detail.to_owned()))
    })?;

    let metadata = json!({
        "date": body.date,
        "time": body.time,
        "people": body.people,
        "name": body.name,
    });

    match state.initiator.initiate(&body.phone_number, &relay_url, metadata).await {
        Ok(gateway_response) => {
            info!(to_number = %body.phone_number, "outbound call initiated");
            Ok(Json(json!({
                "status": "initiated",
                "retell_response": gateway_response,
            })))
        }
        Err(err) => {
            error!(error = %err, "outbound call initiation failed");
            Err(internal_error(ApplicationError::from(err)))
        }
    }
}

fn relay_url(state: &AppState) -> Result<String, &'static str> {
    let public_url = state
        .config
        .server
        .public_url
        .as_deref()
        .ok_or("server.public_url is not configured; cannot derive the relay websocket URL")?;

    let base = public_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };

    Ok(format!("{ws_base}/relay"))
}
