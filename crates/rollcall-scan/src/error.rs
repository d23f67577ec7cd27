//! Error types for the scan layer.

use crate::{CameraError, ScanState};

/// Errors reported by a scanner handle.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The requested action is not valid in the scanner's current state
    /// (e.g. submitting manual text while the camera is scanning).
    #[error("cannot {action} while scanner is {state}")]
    InvalidState {
        /// The scanner's state at the time of the request.
        state: ScanState,
        /// The rejected action, for the message.
        action: &'static str,
    },

    /// The camera could not be opened. The scanner is now in
    /// `CameraError` and manual entry is the recovery path.
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Manual entry was submitted with nothing in it.
    #[error("manual entry is empty")]
    EmptyInput,

    /// The scanner task is gone (closed or panicked); the handle is dead.
    #[error("scanner is no longer running")]
    Terminated,
}
