use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evlog::meta;
use serde_json::json;
use thiserror::Error;

use crate::runtime::get_logger;
use crate::workflow::WorkflowError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// `message` is what the caller sees; `detail` is only logged.
    #[error("{message}")]
    Internal {
        message: &'static str,
        detail: anyhow::Error,
    },
}

impl AppError {
    /// Maps a workflow failure onto a response, using `internal` as the
    /// caller-facing message for unexpected errors.
    pub fn from_workflow(e: WorkflowError, internal: &'static str) -> Self {
        match e {
            WorkflowError::NotFound(m) => AppError::NotFound(m),
            WorkflowError::Conflict(m) => AppError::BadRequest(m.to_owned()),
            WorkflowError::Invalid(m) => AppError::BadRequest(m),
            WorkflowError::Internal(detail) => AppError::Internal {
                message: internal,
                detail,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { message, detail } = &self {
            get_logger().error("Request failed.", meta! {
                "Message" => message,
                "Error" => format!("{:#}", detail),
            });
        }

        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shorthand for handlers: `.map_err(fail("Failed to ..."))`.
pub fn fail(internal: &'static str) -> impl Fn(WorkflowError) -> AppError {
    move |e| AppError::from_workflow(e, internal)
}
