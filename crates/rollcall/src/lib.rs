//! # Rollcall
//!
//! QR code attendance toolkit for schools.
//!
//! Teachers issue short-lived attendance sessions that render as QR
//! codes; students scan (or type) the token to mark presence exactly
//! once; emergencies flow through a role-gated alert workflow. The
//! registry service is the single source of truth — this crate is the
//! client-side machinery around it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollcall::prelude::*;
//!
//! # async fn demo() -> Result<(), RollcallError> {
//! let client = RollcallClient::builder()
//!     .base_url("https://attendance.example.edu")
//!     .build();
//!
//! let teacher = Identity::teacher("bearer...", "T-1", "R. Atkins");
//! let issued = client
//!     .issue_session(
//!         &teacher,
//!         IssueRequest {
//!             class_section: "A5".into(),
//!             subject: "Mathematics".into(),
//!             class_code: "MC".into(),
//!             time_slot: "09:30-10:30".into(),
//!         },
//!     )
//!     .await?;
//! // issued.qr_svg goes on the projector.
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod qr;
mod telemetry;

pub use client::{IssuedSession, RollcallClient, RollcallClientBuilder};
pub use error::RollcallError;
pub use telemetry::init_tracing;

/// The usual imports for applications built on Rollcall.
pub mod prelude {
    pub use crate::{
        IssuedSession, RollcallClient, RollcallClientBuilder, RollcallError,
    };
    pub use rollcall_alert::{AlertError, AlertWorkflow};
    pub use rollcall_protocol::{
        AlertId, AlertStatus, AlertType, AttendanceId, AttendanceRecord,
        EmergencyAlert, Identity, JsonTokenCodec, Role, Session, SessionId,
        SessionRef, StudentId, TimeSlot, TokenCodec,
    };
    pub use rollcall_redeem::{RedemptionEngine, RedemptionError};
    pub use rollcall_registry::{
        HttpRegistry, IssueRequest, Issued, MemoryRegistry, RegistryError,
        SessionRegistry,
    };
    pub use rollcall_scan::{
        spawn_scanner, Camera, CameraCapabilities, CameraError, CameraStream,
        CaptureSource, Frame, FrameDecoder, ScanError, ScanEvent, ScanState,
        ScannerHandle,
    };
}
