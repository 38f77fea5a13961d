//! HTTP rendering of workflow failures.
//!
//! Request-level failures answer with a status code and no body. Everything
//! else is a failed workflow step: it answers 200 with an error message that
//! replaces the prompt in the channel.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::workflow::{render_error, WorkflowError};

#[derive(Debug)]
pub struct RestError(pub WorkflowError);

impl From<WorkflowError> for RestError {
    fn from(err: WorkflowError) -> Self {
        RestError(err)
    }
}

impl RestError {
    pub fn malformed(message: impl Into<String>) -> Self {
        RestError(WorkflowError::MalformedRequest(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            WorkflowError::AuthRejected => StatusCode::UNAUTHORIZED,
            WorkflowError::MalformedRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        if self.0.is_request_error() {
            return self.status().into_response();
        }
        (self.status(), Json(render_error(&self.0))).into_response()
    }
}
