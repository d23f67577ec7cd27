//! Error types for the redemption engine.
//!
//! Every variant here is user-facing: redemption failures are surfaced as
//! human-readable messages and always return the UI to an interactive
//! state, so the `Display` strings are written for the student holding
//! the phone, not for a log file.

use rollcall_registry::RegistryError;

/// Why a redemption attempt was rejected.
#[derive(Debug, thiserror::Error)]
pub enum RedemptionError {
    /// The scanned data was not a token, or referred to a session the
    /// registry never issued. Recoverable: the student re-scans.
    #[error("that QR code is not a valid attendance code")]
    InvalidPayload,

    /// The session's deadline has passed or it was superseded. Terminal
    /// for this session; the student needs a freshly issued code.
    #[error("this attendance code has expired")]
    Expired,

    /// Attendance is already marked for this (session, student) pair.
    /// Terminal and informational — presence is recorded, nothing to do.
    #[error("attendance is already marked for this session")]
    Duplicate,

    /// The student is not enrolled in the session's class section.
    #[error("you are not enrolled in class section {0}")]
    NotEnrolled(String),

    /// The bearer token is missing or invalid. Surfaced so the caller
    /// can trigger re-authentication.
    #[error("your session has ended, please sign in again")]
    Unauthorized,

    /// The caller's role cannot redeem (teachers don't mark attendance).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The registry misbehaved or was unreachable — not part of the
    /// redemption taxonomy, passed through for diagnostics.
    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for RedemptionError {
    /// Folds registry answers into the redemption taxonomy.
    ///
    /// `Duplicate`/`Expired` from the registry are authoritative: another
    /// device may have redeemed or the clock may have run out between our
    /// local pre-checks and the registry's own check. An `UnknownSession`
    /// means the token decoded fine but points at nothing — to the
    /// student that is indistinguishable from a bad scan.
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Unauthorized => RedemptionError::Unauthorized,
            RegistryError::Forbidden(msg) => RedemptionError::Forbidden(msg),
            RegistryError::Expired => RedemptionError::Expired,
            RegistryError::Duplicate => RedemptionError::Duplicate,
            RegistryError::NotEnrolled(section) => {
                RedemptionError::NotEnrolled(section)
            }
            RegistryError::UnknownSession(_)
            | RegistryError::InvalidPayload(_) => {
                RedemptionError::InvalidPayload
            }
            other => RedemptionError::Registry(other),
        }
    }
}
