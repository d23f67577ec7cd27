//! The scan acquisition state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a scan session.
///
/// The camera path is strictly ordered, with manual entry as a parallel
/// mode reachable from `Idle` or from `CameraError`:
///
/// ```text
/// Idle → Requesting → Scanning → Decoded
///              │          │         │ (resume)
///              ▼          ▼         ▼
///         CameraError  CameraError  Scanning
///              │
///              ▼
///         ManualEntry ←── Idle
/// ```
///
/// Any state returns to `Idle` on explicit close, and close always
/// releases the camera handle immediately.
///
/// - **Idle**: No camera held. The starting and resting state.
/// - **Requesting**: Acquiring an exclusive camera handle. The only
///   state in which acquisition happens.
/// - **Scanning**: Frames are being sampled and fed to the decoder.
/// - **Decoded**: A decode has been dispatched. Further frames are
///   ignored until resumed — one dispatch per scan, never two.
/// - **CameraError**: Acquisition or streaming failed. The recovery
///   path is manual entry, never a silent retry.
/// - **ManualEntry**: Free-text input, independent of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Requesting,
    Scanning,
    Decoded,
    CameraError,
    ManualEntry,
}

impl ScanState {
    /// Returns `true` while a camera handle is (or is being) held.
    pub fn holds_camera(&self) -> bool {
        matches!(self, Self::Requesting | Self::Scanning | Self::Decoded)
    }

    /// Returns `true` if frames should be sampled and decoded.
    pub fn is_sampling(&self) -> bool {
        matches!(self, Self::Scanning)
    }

    /// Returns `true` if transitioning to `target` is valid.
    ///
    /// Close (any state → `Idle`) is always valid — it must be, so the
    /// camera can be released from every state without ceremony.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (_, Self::Idle) => true,
            (Self::Idle, Self::Requesting) => true,
            (Self::Requesting, Self::Scanning) => true,
            (Self::Requesting, Self::CameraError) => true,
            (Self::Scanning, Self::Decoded) => true,
            (Self::Scanning, Self::CameraError) => true,
            (Self::Decoded, Self::Scanning) => true,
            (Self::Idle | Self::CameraError, Self::ManualEntry) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Requesting => write!(f, "Requesting"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Decoded => write!(f, "Decoded"),
            Self::CameraError => write!(f, "CameraError"),
            Self::ManualEntry => write!(f, "ManualEntry"),
        }
    }
}
