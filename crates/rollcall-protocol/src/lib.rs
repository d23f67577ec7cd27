//! Core data model and QR token codec for Rollcall.
//!
//! This crate defines the "language" that every other Rollcall crate speaks:
//!
//! - **Types** ([`Session`], [`AttendanceRecord`], [`EmergencyAlert`],
//!   [`Identity`], [`Role`], etc.) — the structures that describe one
//!   attendance window and who is acting on it.
//! - **Token codec** ([`TokenCodec`] trait, [`JsonTokenCodec`]) — how a
//!   session is materialized into the opaque string carried by a QR code,
//!   and how a scanned string is turned back into a [`SessionRef`].
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding a token.
//!
//! # Architecture
//!
//! The protocol layer sits below everything else. It knows nothing about
//! cameras, HTTP, or the registry — it only knows how attendance data is
//! shaped and how tokens are (de)serialized.
//!
//! ```text
//! Scan / Redeem / Alert (above) → Protocol (this crate)
//! ```

mod error;
mod token;
mod types;

pub use error::ProtocolError;
pub use token::{JsonTokenCodec, TokenCodec};
pub use types::{
    AlertId, AlertStatus, AlertType, AttendanceId, AttendanceRecord,
    EmergencyAlert, Identity, Role, Session, SessionId, SessionRef,
    StudentId, TimeSlot,
};
