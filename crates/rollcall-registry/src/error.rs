//! Error types for the registry layer.

use rollcall_protocol::{AlertStatus, SessionId};

/// Errors reported by a session registry.
///
/// The first group mirrors the collaborator contract's error taxonomy —
/// these are *answers* from the authoritative store, and callers must
/// treat them as final even when their own pre-checks disagreed (another
/// device may have won the race). The second group covers the transport
/// between us and the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The bearer token is missing, invalid, or expired. All identity
    /// failures collapse into this one variant by design.
    #[error("unauthorized: missing or invalid bearer token")]
    Unauthorized,

    /// The caller is authenticated but their role does not permit the
    /// operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The session's deadline has passed or it was superseded.
    #[error("session has expired")]
    Expired,

    /// Attendance for this (session, student) pair is already recorded.
    #[error("attendance already marked for this session")]
    Duplicate,

    /// The calling student is not enrolled in the session's class section.
    #[error("student is not enrolled in class section {0}")]
    NotEnrolled(String),

    /// The token referred to a session the registry has never issued.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// The registry could not make sense of the submitted token at all.
    #[error("invalid token payload: {0}")]
    InvalidPayload(String),

    /// The requested alert does not exist.
    #[error("alert not found")]
    AlertNotFound,

    /// The requested alert status change is not a legal forward
    /// transition.
    #[error("invalid alert transition: {from} -> {to}")]
    InvalidTransition {
        /// The alert's current status.
        from: AlertStatus,
        /// The rejected target status.
        to: AlertStatus,
    },

    /// The alert payload was rejected (e.g. a missing description).
    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    /// The request never produced a registry answer: connection refused,
    /// DNS, timeout, TLS.
    #[error("registry unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The registry answered with something outside the contract.
    #[error("unexpected registry response (status {status}): {message}")]
    Unexpected {
        /// HTTP status code of the response.
        status: u16,
        /// Whatever detail could be salvaged from the body.
        message: String,
    },
}
