//! Error types for the alert workflow.

use rollcall_protocol::AlertStatus;
use rollcall_registry::RegistryError;

/// Why an alert operation was rejected.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// An `other` alert needs a description so responders know what
    /// they are responding to. Rejected locally, before any network.
    #[error("a description is required for this alert type")]
    MissingDescription,

    /// The caller's role cannot perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The alert does not exist.
    #[error("alert not found")]
    NotFound,

    /// The requested status change is not a legal forward transition.
    #[error("cannot move alert from {from} to {to}")]
    InvalidTransition {
        /// The alert's current status.
        from: AlertStatus,
        /// The rejected target status.
        to: AlertStatus,
    },

    /// The bearer token is missing or invalid.
    #[error("your session has ended, please sign in again")]
    Unauthorized,

    /// Anything else from the registry, passed through for diagnostics.
    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for AlertError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Unauthorized => AlertError::Unauthorized,
            RegistryError::Forbidden(msg) => AlertError::Forbidden(msg),
            RegistryError::AlertNotFound => AlertError::NotFound,
            RegistryError::InvalidTransition { from, to } => {
                AlertError::InvalidTransition { from, to }
            }
            RegistryError::InvalidAlert(_) => AlertError::MissingDescription,
            other => AlertError::Registry(other),
        }
    }
}
