//! Error types for scheduling runs
//!
//! Two layers:
//! - `ModelError`: the language-model boundary (CLI, HTTP, timeouts)
//! - `SchedulingError`: everything a plan run can fail with, classified by
//!   `FailureKind` so the inbound surface can map it to a result code

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DbError;

/// Errors raised by a language-model adapter.
#[derive(Debug, Error)]
pub enum ModelError {
    // Transient
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("API rate limit exceeded")]
    ApiRateLimit,

    // Permanent
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Model returned an unusable response: {0}")]
    BadResponse(String),

    #[error("IO error: {0}")]
    IoError(String),

    // Requires user action
    #[error("Claude Code CLI not found. Install from https://claude.ai/code")]
    ClaudeCodeNotFound,

    #[error("Claude Code not authenticated. Run 'claude login'")]
    ClaudeCodeNotAuthenticated,

    #[error("API key not set in environment variable {0}")]
    MissingApiKey(String),
}

impl ModelError {
    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ModelError::ClaudeCodeNotFound
                | ModelError::ClaudeCodeNotAuthenticated
                | ModelError::MissingApiKey(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ModelError::NetworkError(_) => "Check your internet connection and try again.",
            ModelError::Timeout(_) => "The assistant took too long to answer. Try again.",
            ModelError::ApiRateLimit => "Wait a few minutes and try again.",
            ModelError::ConfigurationError(_) => "Check the model section of ~/.schedly/config.json",
            ModelError::BadResponse(_) => "Rephrase the request and try again.",
            ModelError::IoError(_) => "Check file permissions and disk space.",
            ModelError::ClaudeCodeNotFound => "Install Claude Code from https://claude.ai/code",
            ModelError::ClaudeCodeNotAuthenticated => {
                "Run 'claude login' in your terminal to authenticate."
            }
            ModelError::MissingApiKey(_) => "Export the API key and try again.",
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::IoError(err.to_string())
    }
}

/// Coarse classification of a failed run. Each kind maps to one result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    MalformedInput,
    NotFound,
    Unavailable,
    PreconditionNotMet,
    MalformedPlan,
    UpstreamFailure,
    InternalError,
}

impl FailureKind {
    /// HTTP-style result code handed to the inbound layer.
    pub fn code(self) -> u16 {
        match self {
            FailureKind::MalformedInput => 400,
            FailureKind::NotFound => 404,
            FailureKind::Unavailable => 409,
            FailureKind::PreconditionNotMet => 412,
            FailureKind::MalformedPlan => 422,
            FailureKind::UpstreamFailure => 502,
            FailureKind::InternalError => 500,
        }
    }
}

/// Everything a tool call or plan run can fail with.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Attendee not found: {0}")]
    AttendeeNotFound(String),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Attendee is not available at {at}")]
    AttendeeUnavailable { attendee_id: String, at: DateTime<Utc> },

    #[error("No attendee has been found before checking availability")]
    AttendeeMissing,

    #[error("Cannot schedule appointment: {0}")]
    PreconditionNotMet(String),

    #[error("Could not understand the request: {0}")]
    MalformedPlan(String),

    #[error("Could not resolve a date from {raw:?}: {reason}")]
    UnusableDate { raw: String, reason: String },

    #[error("Language model failed: {0}")]
    Model(#[from] ModelError),

    #[error("Record store failed: {0}")]
    Store(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedulingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SchedulingError::MalformedInput(_) => FailureKind::MalformedInput,
            SchedulingError::AttendeeNotFound(_)
            | SchedulingError::PersonNotFound(_)
            | SchedulingError::AppointmentNotFound(_) => FailureKind::NotFound,
            SchedulingError::AttendeeUnavailable { .. } => FailureKind::Unavailable,
            SchedulingError::AttendeeMissing | SchedulingError::PreconditionNotMet(_) => {
                FailureKind::PreconditionNotMet
            }
            SchedulingError::MalformedPlan(_) => FailureKind::MalformedPlan,
            SchedulingError::UnusableDate { .. }
            | SchedulingError::Model(_)
            | SchedulingError::Store(_) => FailureKind::UpstreamFailure,
            SchedulingError::Internal(_) => FailureKind::InternalError,
        }
    }

    /// Message safe to show the caller. Store and internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            SchedulingError::Store(_) => "The calendar store is unavailable. Try again.".to_string(),
            SchedulingError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    /// True when the run cannot succeed until the operator fixes the setup
    /// (missing CLI, login, API key).
    pub fn requires_user_action(&self) -> bool {
        matches!(self, SchedulingError::Model(e) if e.requires_user_action())
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SchedulingError::MalformedInput(_) => "Check the request fields and try again.",
            SchedulingError::AttendeeNotFound(_) | SchedulingError::PersonNotFound(_) => {
                "Check the spelling of the name."
            }
            SchedulingError::AppointmentNotFound(_) => "Check the appointment id.",
            SchedulingError::AttendeeUnavailable { .. } => "Pick another time inside their working hours.",
            SchedulingError::AttendeeMissing | SchedulingError::PreconditionNotMet(_) => {
                "Say who the meeting is with and when."
            }
            SchedulingError::MalformedPlan(_) | SchedulingError::UnusableDate { .. } => {
                "Rephrase the request with an explicit day and time."
            }
            SchedulingError::Model(e) => e.recovery_suggestion(),
            SchedulingError::Store(_) | SchedulingError::Internal(_) => "Try again later.",
        }
    }
}

/// Serializable failure handed to the inbound layer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingFailure {
    pub message: String,
    pub kind: FailureKind,
    pub code: u16,
    pub recovery_suggestion: String,
}

impl From<&SchedulingError> for SchedulingFailure {
    fn from(err: &SchedulingError) -> Self {
        let kind = err.kind();
        SchedulingFailure {
            message: err.public_message(),
            kind,
            code: kind.code(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
