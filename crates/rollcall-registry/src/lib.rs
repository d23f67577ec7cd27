//! Session registry contract and clients for Rollcall.
//!
//! The registry is the authoritative store of issued sessions, attendance
//! records, and emergency alerts. Rollcall consumes it as a remote
//! collaborator: every call carries an opaque bearer identity, and the
//! registry — not the client — is the serialization point for duplicate
//! detection and expiry across devices.
//!
//! This crate provides:
//!
//! - [`SessionRegistry`] — the trait every registry client implements.
//! - [`HttpRegistry`] — the production client, HTTP + bearer tokens.
//! - [`MemoryRegistry`] — an in-process reference implementation that
//!   enforces the same invariants server-side; it backs the integration
//!   tests and doubles as the normative description of what the remote
//!   service must do.
//!
//! # How it fits in the stack
//!
//! ```text
//! Redeem / Alert layers (above)  ← call the registry through this trait
//!     ↕
//! Registry layer (this crate)    ← owns the collaborator contract
//!     ↕
//! Remote service (below)         ← HTTP, out of scope
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod http;
mod memory;

pub use error::RegistryError;
pub use http::HttpRegistry;
pub use memory::{Clock, MemoryRegistry};

use rollcall_protocol::{
    AlertId, AlertStatus, AlertType, AttendanceRecord, EmergencyAlert,
    Identity, Session, SessionId, SessionRef,
};
use serde::{Deserialize, Serialize};

/// Parameters for minting a new attendance session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Class section the window applies to (e.g. `"A5"`).
    pub class_section: String,
    /// Subject being taught (e.g. `"Mathematics"`).
    pub subject: String,
    /// Short class code from the timetable (e.g. `"MC"`).
    pub class_code: String,
    /// Timetable slot (e.g. `"09:30-10:30"`); the registry derives the
    /// session's absolute expiry from it at issuance.
    pub time_slot: String,
}

/// The result of a successful issuance: the stored session plus the
/// encoded token to embed in a QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issued {
    /// The session as the registry recorded it.
    pub session: Session,
    /// The encoded token payload.
    pub token: String,
}

/// The session registry collaborator contract.
///
/// A trait rather than a concrete client for the same reason the identity
/// service is a bearer token: production talks HTTP, tests talk to
/// [`MemoryRegistry`], and the engine code in between never changes.
///
/// Every method takes the caller's [`Identity`]; a missing or invalid
/// bearer yields [`RegistryError::Unauthorized`] uniformly.
pub trait SessionRegistry: Send + Sync + 'static {
    /// Mints a new session and its token. Teacher/principal only.
    ///
    /// Issuing for a `(class_section, subject, time_slot)` that already
    /// has an active session supersedes the old one — its `is_active`
    /// flag drops, and outstanding tokens for it stop redeeming.
    async fn issue_session(
        &self,
        identity: &Identity,
        request: IssueRequest,
    ) -> Result<Issued, RegistryError>;

    /// Looks up one session by id. `Ok(None)` if the registry has no
    /// record of it.
    async fn session(
        &self,
        identity: &Identity,
        id: SessionId,
    ) -> Result<Option<Session>, RegistryError>;

    /// Lists issued sessions.
    async fn sessions(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Session>, RegistryError>;

    /// Records attendance for the calling student against the session the
    /// token refers to.
    ///
    /// The registry enforces the core invariants regardless of any client
    /// pre-checks: at most one record per `(session, student)`
    /// ([`RegistryError::Duplicate`]) and the absolute deadline
    /// ([`RegistryError::Expired`]).
    async fn redeem(
        &self,
        identity: &Identity,
        token: &SessionRef,
    ) -> Result<AttendanceRecord, RegistryError>;

    /// Lists attendance records visible to the caller.
    async fn attendance(
        &self,
        identity: &Identity,
    ) -> Result<Vec<AttendanceRecord>, RegistryError>;

    /// Files a new emergency alert for the calling student.
    async fn create_alert(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        description: Option<String>,
    ) -> Result<EmergencyAlert, RegistryError>;

    /// Lists emergency alerts, most recent first. Teacher/principal only.
    async fn alerts(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EmergencyAlert>, RegistryError>;

    /// Moves an alert to a new status. Principal only; transitions must
    /// follow the forward-only [`AlertStatus`] machine.
    async fn update_alert_status(
        &self,
        identity: &Identity,
        id: AlertId,
        status: AlertStatus,
    ) -> Result<EmergencyAlert, RegistryError>;
}
