//! Error taxonomy for remote calls and for the flow itself.

use thiserror::Error;

use crate::flow::FlowStage;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The backend refused the input (HTTP 422 or a local precheck).
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status (auth, not found, conflict, ...).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Transport-level trouble, as opposed to the backend saying no.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ServiceError::Network(_) | ServiceError::Server { .. } | ServiceError::Timeout(_)
        )
    }
}

/// What a controller operation reports to its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("AI breakdown unavailable: {0}")]
    BreakdownUnavailable(String),

    #[error("could not start focus session: {0}")]
    Launch(String),

    #[error("cannot {action} while {stage:?}")]
    InvalidTransition { action: &'static str, stage: FlowStage },

    #[error("draft is frozen once the task is created")]
    DraftFrozen,
}

impl FlowError {
    /// Map a failed call on a halting step (creation) to a user-facing error.
    pub fn from_service(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(m) => FlowError::Validation(m),
            ServiceError::Network(m) => FlowError::Network(m),
            ServiceError::Timeout(secs) => FlowError::Network(format!("timed out after {secs}s")),
            ServiceError::Server { status, message } => {
                FlowError::Server(format!("{status}: {message}"))
            }
            ServiceError::Rejected { status, message } => {
                FlowError::Server(format!("{status}: {message}"))
            }
            ServiceError::Decode(m) => FlowError::Server(m),
        }
    }

    /// Terminal failures end the flow; the rest leave it waiting for the user.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowError::Launch(_))
    }
}
