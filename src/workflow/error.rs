//! Failure taxonomy for a release workflow.
//!
//! Nothing here is retried. Every variant ends the current workflow; the user
//! starts over with a new `deliver` command.

use thiserror::Error;

use crate::api::ApiError;
use crate::manifest::ManifestError;
use crate::version::MalformedVersion;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The request did not carry the shared verification token.
    #[error("verification token rejected")]
    AuthRejected,

    /// The request body could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    MalformedVersion(#[from] MalformedVersion),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// An outward API call failed; carries the provider's error text.
    #[error(transparent)]
    UpstreamFailure(#[from] ApiError),

    /// The token does not satisfy the preconditions of the requested step.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The manifest snapshot could not be written to temporary storage.
    #[error("could not store manifest snapshot: {0}")]
    Storage(#[from] std::io::Error),
}

impl WorkflowError {
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        WorkflowError::InvalidTransition(message.into())
    }

    /// Errors that reject the request itself rather than the workflow.
    /// These are answered with an HTTP status and never rendered in-channel.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::AuthRejected | WorkflowError::MalformedRequest(_)
        )
    }

    /// Headline shown above the error text in the channel.
    pub fn title(&self) -> &'static str {
        match self {
            WorkflowError::AuthRejected | WorkflowError::MalformedRequest(_) => "Request rejected.",
            WorkflowError::MalformedVersion(_) | WorkflowError::Manifest(_) => {
                "The version manifest could not be read."
            }
            WorkflowError::UpstreamFailure(_) | WorkflowError::Storage(_) => "Error occurred.",
            WorkflowError::InvalidTransition(_) => {
                "This release can no longer continue. Start over with `deliver`."
            }
        }
    }
}
