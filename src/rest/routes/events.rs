//! Events API endpoint for chat commands.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use crate::rest::dto::{ChallengeResponse, EventEnvelope};
use crate::rest::error::RestError;
use crate::rest::state::AppState;
use crate::workflow::WorkflowError;

/// Set by Slack when it redelivers an event it thinks was lost
const RETRY_HEADER: &str = "x-slack-retry-num";

pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    envelope: Result<Json<EventEnvelope>, JsonRejection>,
) -> Result<Response, RestError> {
    let Json(envelope) = envelope.map_err(|e| {
        warn!(error = %e, "Unreadable event body");
        RestError::malformed(e.body_text())
    })?;

    if let Some(token) = envelope.token() {
        if !state.verify(token) {
            warn!("Event with bad verification token");
            return Err(WorkflowError::AuthRejected.into());
        }
    }

    match envelope {
        EventEnvelope::UrlVerification { challenge, .. } => {
            Ok(Json(ChallengeResponse { challenge }).into_response())
        }
        EventEnvelope::EventCallback { event, .. } => {
            if headers.contains_key(RETRY_HEADER) {
                debug!("Skipping redelivered event");
                return Ok(StatusCode::OK.into_response());
            }
            if let Some(chat_event) = event.chat_event() {
                let commands = state.commands.clone();
                tokio::spawn(async move {
                    commands.handle(&chat_event).await;
                });
            }
            Ok(StatusCode::OK.into_response())
        }
        EventEnvelope::Other => Ok(StatusCode::OK.into_response()),
    }
}
