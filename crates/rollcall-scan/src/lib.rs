//! Scan acquisition for Rollcall.
//!
//! This crate turns a camera (or a keyboard) into token strings. Each
//! scan session is an isolated Tokio task owning an exclusive camera
//! handle, driven through a small command channel and observed through
//! an event channel.
//!
//! # Key types
//!
//! - [`ScanState`] — the scan lifecycle state machine
//! - [`Camera`] / [`FrameDecoder`] — the hardware and decoder seams
//! - [`CameraStream`] — scoped camera handle; drop is release
//! - [`ScannerHandle`] — send commands to a running scanner actor
//! - [`ScanEvent`] — captures and failures, as seen by the subscriber
//!
//! The crate deliberately knows nothing about tokens or redemption:
//! it produces raw strings, and the redemption layer decides what they
//! mean.

mod camera;
mod error;
mod scanner;
mod state;

pub use camera::{
    Camera, CameraCapabilities, CameraControl, CameraError, CameraStream,
    Frame, FrameDecoder,
};
pub use error::ScanError;
pub use scanner::{
    spawn_scanner, CaptureSource, ScanEvent, ScannerHandle, MIN_DECODE_GAP,
};
pub use state::ScanState;
