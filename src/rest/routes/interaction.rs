//! Interactive-message callback.
//!
//! Every button press or menu selection on a release prompt lands here. The
//! response body replaces the prompt in the channel.

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use tracing::{info, warn};

use crate::api::providers::chat::Message;
use crate::rest::dto::{InteractionForm, InteractionPayload};
use crate::rest::error::RestError;
use crate::rest::state::AppState;
use crate::workflow::{Transition, WorkflowError, CALLBACK_ID};

pub async fn interaction(
    State(state): State<AppState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> Result<Json<Message>, RestError> {
    let Form(form) = form.map_err(|e| {
        warn!(error = %e, "Unreadable interaction body");
        RestError::malformed(e.body_text())
    })?;
    let payload: InteractionPayload = serde_json::from_str(&form.payload).map_err(|e| {
        warn!(error = %e, "Unreadable interaction payload");
        RestError::malformed(e.to_string())
    })?;

    if !state.verify(&payload.token) {
        warn!(channel = %payload.channel.id, "Interaction with bad verification token");
        return Err(WorkflowError::AuthRejected.into());
    }
    if !payload.callback_id.is_empty() && payload.callback_id != CALLBACK_ID {
        return Err(RestError::malformed(format!(
            "unknown callback `{}`",
            payload.callback_id
        )));
    }
    let interaction = payload
        .interaction()
        .ok_or_else(|| RestError::malformed("no action in payload"))?;

    info!(
        action = %interaction.action,
        user = %interaction.user_name,
        channel = %interaction.channel_id,
        "Interaction"
    );

    let transition = state.workflow.advance(&interaction).await.map_err(|e| {
        warn!(action = %interaction.action, error = %e, "Workflow step failed");
        RestError::from(e)
    })?;

    match transition {
        Transition::Dispatched {
            acknowledgement,
            job,
        } => {
            state.releaser.spawn(job);
            Ok(Json(acknowledgement))
        }
        Transition::Prompt(message) | Transition::Cancelled(message) => Ok(Json(message)),
    }
}
