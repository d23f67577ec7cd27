//! The camera seam: how the scanner talks to actual hardware.
//!
//! The scanner never touches devices directly. It goes through the
//! [`Camera`] trait, which yields a [`CameraStream`] — an exclusive,
//! scoped handle whose drop is the release. There is no separate
//! `close()` to forget: when the stream goes out of scope, the frame
//! and control channels close and the producing side shuts the device
//! down.

use std::future::Future;
use std::ops::RangeInclusive;

use tokio::sync::mpsc;

/// One video frame handed to the decoder.
///
/// The scanner treats frames as opaque — only the [`FrameDecoder`]
/// interprets `data`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, in whatever layout the camera produces.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// What the opened device can do beyond streaming frames.
///
/// Both controls are best-effort probes. Absence never blocks scanning.
#[derive(Debug, Clone, Default)]
pub struct CameraCapabilities {
    /// Supported zoom range, if the device exposes one.
    pub zoom: Option<RangeInclusive<f32>>,
    /// Whether the device has a controllable torch.
    pub torch: bool,
}

/// A control request forwarded to the device task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraControl {
    /// Set the zoom level (clamped to the advertised range by the device).
    Zoom(f32),
    /// Switch the torch on or off.
    Torch(bool),
}

/// Why the camera could not be opened or kept streaming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// The user (or platform policy) denied camera access.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No camera device is present on this hardware.
    #[error("no camera device found")]
    NoDevice,

    /// Another process or scan session holds the device.
    #[error("camera is in use")]
    Busy,

    /// The stream ended unexpectedly mid-scan.
    #[error("camera disconnected")]
    Disconnected,
}

/// An exclusive handle on a streaming camera.
///
/// Dropping the stream is the release: both channels close, and the
/// device side tears down when it observes them closed. This makes
/// release deterministic on every exit path — decode, error, explicit
/// close, or task teardown — with no cleanup call to miss.
pub struct CameraStream {
    frames: mpsc::Receiver<Frame>,
    capabilities: CameraCapabilities,
    controls: Option<mpsc::UnboundedSender<CameraControl>>,
}

impl CameraStream {
    /// Creates a stream with no control channel (fixed-lens device).
    pub fn new(
        frames: mpsc::Receiver<Frame>,
        capabilities: CameraCapabilities,
    ) -> Self {
        Self {
            frames,
            capabilities,
            controls: None,
        }
    }

    /// Creates a stream whose zoom/torch requests are forwarded to the
    /// device task over `controls`.
    pub fn with_controls(
        frames: mpsc::Receiver<Frame>,
        capabilities: CameraCapabilities,
        controls: mpsc::UnboundedSender<CameraControl>,
    ) -> Self {
        Self {
            frames,
            capabilities,
            controls: Some(controls),
        }
    }

    /// The capabilities probed at open time.
    pub fn capabilities(&self) -> &CameraCapabilities {
        &self.capabilities
    }

    /// Receives the next frame. `None` means the device disconnected.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Takes a frame only if one is already buffered. Used to drain
    /// stale frames that queued up while sampling was paused.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }

    /// Requests a zoom change. Returns `false` when the device has no
    /// zoom or the request could not be delivered — the caller carries
    /// on scanning either way.
    pub fn set_zoom(&self, level: f32) -> bool {
        let Some(range) = &self.capabilities.zoom else {
            return false;
        };
        if !range.contains(&level) {
            return false;
        }
        self.send_control(CameraControl::Zoom(level))
    }

    /// Requests a torch toggle. Best-effort, like [`Self::set_zoom`].
    pub fn set_torch(&self, on: bool) -> bool {
        if !self.capabilities.torch {
            return false;
        }
        self.send_control(CameraControl::Torch(on))
    }

    fn send_control(&self, control: CameraControl) -> bool {
        match &self.controls {
            Some(tx) => tx.send(control).is_ok(),
            None => false,
        }
    }
}

/// A camera device that can be opened for streaming.
///
/// `open` returns a `Send` future so scanner actors holding a camera
/// can run on the multi-threaded runtime. Implementations just write
/// `async fn open`.
pub trait Camera {
    /// Acquires the device exclusively and starts the frame stream.
    fn open(
        &mut self,
    ) -> impl Future<Output = Result<CameraStream, CameraError>> + Send;
}

/// Extracts a token string from a frame, if one is visible.
///
/// Returning `None` is the common case — most frames contain no
/// decodable code. Decoders must never panic on arbitrary pixel data.
pub trait FrameDecoder {
    /// Attempts to decode a single frame.
    fn decode(&self, frame: &Frame) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_zoom_without_capability_is_rejected() {
        let (_tx, rx) = mpsc::channel(1);
        let stream = CameraStream::new(rx, CameraCapabilities::default());
        assert!(!stream.set_zoom(2.0));
    }

    #[test]
    fn test_set_zoom_outside_range_is_rejected() {
        let (_tx, rx) = mpsc::channel(1);
        let (ctl_tx, _ctl_rx) = mpsc::unbounded_channel();
        let stream = CameraStream::with_controls(
            rx,
            CameraCapabilities {
                zoom: Some(1.0..=4.0),
                torch: false,
            },
            ctl_tx,
        );
        assert!(!stream.set_zoom(8.0));
        assert!(stream.set_zoom(2.5));
    }

    #[test]
    fn test_set_torch_forwards_when_supported() {
        let (_tx, rx) = mpsc::channel(1);
        let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();
        let stream = CameraStream::with_controls(
            rx,
            CameraCapabilities {
                zoom: None,
                torch: true,
            },
            ctl_tx,
        );
        assert!(stream.set_torch(true));
        assert_eq!(ctl_rx.try_recv().unwrap(), CameraControl::Torch(true));
    }

    #[test]
    fn test_dropping_stream_closes_frame_channel() {
        let (tx, rx) = mpsc::channel::<Frame>(1);
        let stream = CameraStream::new(rx, CameraCapabilities::default());
        assert!(!tx.is_closed());
        drop(stream);
        assert!(tx.is_closed());
    }
}
