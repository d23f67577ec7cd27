//! Scanner actor: an isolated Tokio task that owns the camera.
//!
//! One scan session runs in its own task, talking to the outside world
//! through an mpsc command channel. The actor is the only owner of the
//! [`CameraStream`], so camera release is a matter of dropping one
//! value — on close, on error, or when the last handle goes away.
//!
//! Two rules from the state machine are enforced here rather than in
//! [`ScanState`], because they are about frames, not transitions:
//!
//! - **Bounded sampling**: at most one decode attempt per
//!   [`MIN_DECODE_GAP`]. Frames arriving early are skipped unexamined,
//!   which bounds CPU and battery cost at ≤5 attempts/second.
//! - **First decode wins**: after a decode is dispatched, no frame is
//!   sampled again until the caller resumes or closes. A QR code held
//!   up to a camera produces many decodable frames within milliseconds,
//!   and exactly one of them may become a redemption.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use crate::{Camera, CameraError, CameraStream, Frame, FrameDecoder};
use crate::{ScanError, ScanState};

/// Minimum spacing between decode attempts (5 per second).
pub const MIN_DECODE_GAP: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Where a captured token string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// Decoded from a camera frame.
    Camera,
    /// Typed by the user in manual entry.
    Manual,
}

/// Notifications emitted by the scanner to its subscriber.
///
/// The subscriber is whoever drives redemption — it receives at most
/// one `Captured` per scan until it resumes the scanner.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A token string was obtained and should be redeemed.
    Captured {
        /// The raw token text.
        text: String,
        /// Camera decode or manual entry.
        source: CaptureSource,
    },
    /// The camera failed; the scanner is in `CameraError`.
    CameraFailed(CameraError),
    /// The scanner was closed and the camera released.
    Closed,
}

/// Commands sent to a scanner actor through its channel.
enum ScannerCommand {
    /// Acquire the camera and start scanning.
    Open {
        reply: oneshot::Sender<Result<(), ScanError>>,
    },
    /// Release the camera and return to idle.
    Close { reply: oneshot::Sender<()> },
    /// Re-arm frame sampling after a dispatched decode.
    Resume {
        reply: oneshot::Sender<Result<(), ScanError>>,
    },
    /// Switch to manual text entry.
    EnterManual {
        reply: oneshot::Sender<Result<(), ScanError>>,
    },
    /// Submit manually typed token text.
    SubmitManual {
        text: String,
        reply: oneshot::Sender<Result<(), ScanError>>,
    },
    /// Best-effort zoom request.
    SetZoom(f32),
    /// Best-effort torch request.
    SetTorch(bool),
    /// Request the current state.
    GetState { reply: oneshot::Sender<ScanState> },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running scanner actor. Cheap to clone.
#[derive(Clone)]
pub struct ScannerHandle {
    sender: mpsc::Sender<ScannerCommand>,
}

impl ScannerHandle {
    /// Opens the camera and starts scanning.
    ///
    /// On camera failure the scanner lands in `CameraError`, a
    /// [`ScanEvent::CameraFailed`] is emitted, and the error is also
    /// returned here.
    pub async fn open(&self) -> Result<(), ScanError> {
        self.request(|reply| ScannerCommand::Open { reply }).await?
    }

    /// Closes the scanner from any state, releasing the camera
    /// immediately. The scanner returns to `Idle` and can be reopened.
    pub async fn close(&self) -> Result<(), ScanError> {
        self.request(|reply| ScannerCommand::Close { reply }).await
    }

    /// Re-arms frame sampling after a decode was dispatched.
    pub async fn resume(&self) -> Result<(), ScanError> {
        self.request(|reply| ScannerCommand::Resume { reply })
            .await?
    }

    /// Switches to manual text entry (from `Idle` or `CameraError`).
    pub async fn enter_manual(&self) -> Result<(), ScanError> {
        self.request(|reply| ScannerCommand::EnterManual { reply })
            .await?
    }

    /// Submits manually typed token text. The text is trimmed; empty
    /// input is rejected without emitting an event.
    pub async fn submit_manual(
        &self,
        text: impl Into<String>,
    ) -> Result<(), ScanError> {
        let text = text.into();
        self.request(|reply| ScannerCommand::SubmitManual { text, reply })
            .await?
    }

    /// Requests a zoom change. Fire-and-forget: unsupported levels are
    /// logged and dropped, never an error.
    pub async fn set_zoom(&self, level: f32) -> Result<(), ScanError> {
        self.sender
            .send(ScannerCommand::SetZoom(level))
            .await
            .map_err(|_| ScanError::Terminated)
    }

    /// Requests a torch toggle. Fire-and-forget, like [`Self::set_zoom`].
    pub async fn set_torch(&self, on: bool) -> Result<(), ScanError> {
        self.sender
            .send(ScannerCommand::SetTorch(on))
            .await
            .map_err(|_| ScanError::Terminated)
    }

    /// Returns the scanner's current state.
    pub async fn state(&self) -> Result<ScanState, ScanError> {
        self.request(|reply| ScannerCommand::GetState { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ScannerCommand,
    ) -> Result<T, ScanError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| ScanError::Terminated)?;
        reply_rx.await.map_err(|_| ScanError::Terminated)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// What one turn of the actor loop produced.
enum Step {
    Command(Option<ScannerCommand>),
    Frame(Option<Frame>),
}

/// The internal scanner state. Runs inside a Tokio task.
struct ScannerActor<C, D> {
    camera: C,
    decoder: D,
    state: ScanState,
    /// Held only while `state.holds_camera()`. Dropping it is the release.
    stream: Option<CameraStream>,
    /// Set when a decode has been dispatched; cleared by resume/close.
    dispatched: bool,
    last_attempt: Option<Instant>,
    events: mpsc::UnboundedSender<ScanEvent>,
    receiver: mpsc::Receiver<ScannerCommand>,
}

impl<C: Camera, D: FrameDecoder> ScannerActor<C, D> {
    async fn run(mut self) {
        tracing::debug!("scanner started");

        loop {
            let sampling = self.state.is_sampling();
            let step = tokio::select! {
                cmd = self.receiver.recv() => Step::Command(cmd),
                frame = Self::next_frame(&mut self.stream), if sampling => {
                    Step::Frame(frame)
                }
            };
            match step {
                Step::Command(Some(cmd)) => self.handle_command(cmd).await,
                // All handles dropped: tear down. The stream drops with
                // self, releasing the camera.
                Step::Command(None) => break,
                Step::Frame(Some(frame)) => self.handle_frame(frame),
                Step::Frame(None) => self.handle_disconnect(),
            }
        }

        tracing::debug!("scanner stopped");
    }

    /// Resolves the next frame, or parks forever when no camera is held.
    /// Only polled while `state.is_sampling()`, which implies a stream.
    async fn next_frame(stream: &mut Option<CameraStream>) -> Option<Frame> {
        match stream {
            Some(s) => s.next_frame().await,
            None => std::future::pending().await,
        }
    }

    async fn handle_command(&mut self, cmd: ScannerCommand) {
        match cmd {
            ScannerCommand::Open { reply } => {
                let _ = reply.send(self.handle_open().await);
            }
            ScannerCommand::Close { reply } => {
                self.handle_close();
                let _ = reply.send(());
            }
            ScannerCommand::Resume { reply } => {
                let _ = reply.send(self.handle_resume());
            }
            ScannerCommand::EnterManual { reply } => {
                let _ = reply.send(self.handle_enter_manual());
            }
            ScannerCommand::SubmitManual { text, reply } => {
                let _ = reply.send(self.handle_submit_manual(text));
            }
            ScannerCommand::SetZoom(level) => {
                let applied = self
                    .stream
                    .as_ref()
                    .is_some_and(|s| s.set_zoom(level));
                if !applied {
                    tracing::debug!(level, "zoom request not applied");
                }
            }
            ScannerCommand::SetTorch(on) => {
                let applied =
                    self.stream.as_ref().is_some_and(|s| s.set_torch(on));
                if !applied {
                    tracing::debug!(on, "torch request not applied");
                }
            }
            ScannerCommand::GetState { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    async fn handle_open(&mut self) -> Result<(), ScanError> {
        if !self.state.can_transition_to(ScanState::Requesting) {
            return Err(ScanError::InvalidState {
                state: self.state,
                action: "open the camera",
            });
        }
        self.state = ScanState::Requesting;
        tracing::debug!("acquiring camera");

        match self.camera.open().await {
            Ok(stream) => {
                tracing::info!(
                    zoom = stream.capabilities().zoom.is_some(),
                    torch = stream.capabilities().torch,
                    "camera acquired, scanning"
                );
                self.stream = Some(stream);
                self.dispatched = false;
                self.last_attempt = None;
                self.state = ScanState::Scanning;
                Ok(())
            }
            Err(e) => {
                self.state = ScanState::CameraError;
                tracing::warn!(error = %e, "camera acquisition failed");
                let _ = self.events.send(ScanEvent::CameraFailed(e.clone()));
                Err(ScanError::Camera(e))
            }
        }
    }

    fn handle_close(&mut self) {
        // Release before anything else observes the close.
        self.stream = None;
        self.state = ScanState::Idle;
        self.dispatched = false;
        self.last_attempt = None;
        tracing::debug!("scanner closed, camera released");
        let _ = self.events.send(ScanEvent::Closed);
    }

    fn handle_resume(&mut self) -> Result<(), ScanError> {
        if !self.state.can_transition_to(ScanState::Scanning) {
            return Err(ScanError::InvalidState {
                state: self.state,
                action: "resume scanning",
            });
        }
        // Frames that queued up while dispatch was pending are stale;
        // resume only ever samples fresh ones.
        if let Some(stream) = &mut self.stream {
            while stream.try_next_frame().is_some() {}
        }
        self.dispatched = false;
        self.state = ScanState::Scanning;
        Ok(())
    }

    fn handle_enter_manual(&mut self) -> Result<(), ScanError> {
        if !self.state.can_transition_to(ScanState::ManualEntry) {
            return Err(ScanError::InvalidState {
                state: self.state,
                action: "enter manual entry",
            });
        }
        self.state = ScanState::ManualEntry;
        Ok(())
    }

    fn handle_submit_manual(
        &mut self,
        text: String,
    ) -> Result<(), ScanError> {
        if self.state != ScanState::ManualEntry {
            return Err(ScanError::InvalidState {
                state: self.state,
                action: "submit manual entry",
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ScanError::EmptyInput);
        }
        let _ = self.events.send(ScanEvent::Captured {
            text: text.to_owned(),
            source: CaptureSource::Manual,
        });
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) {
        // The select guard stops sampling outside Scanning; this covers
        // frames already pulled off the channel in the same poll.
        if self.dispatched {
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.last_attempt {
            if now.duration_since(last) < MIN_DECODE_GAP {
                // Too soon: skip the frame without examining it.
                return;
            }
        }
        self.last_attempt = Some(now);

        if let Some(text) = self.decoder.decode(&frame) {
            self.dispatched = true;
            self.state = ScanState::Decoded;
            tracing::info!("frame decoded, capture dispatched");
            let _ = self.events.send(ScanEvent::Captured {
                text,
                source: CaptureSource::Camera,
            });
        }
    }

    fn handle_disconnect(&mut self) {
        self.stream = None;
        self.state = ScanState::CameraError;
        tracing::warn!("camera stream ended mid-scan");
        let _ = self
            .events
            .send(ScanEvent::CameraFailed(CameraError::Disconnected));
    }
}

/// Spawns a scanner actor task and returns a handle to command it.
///
/// Events flow out through `events`; the actor never blocks on the
/// subscriber. Dropping every handle shuts the actor down and releases
/// the camera.
pub fn spawn_scanner<C, D>(
    camera: C,
    decoder: D,
    events: mpsc::UnboundedSender<ScanEvent>,
) -> ScannerHandle
where
    C: Camera + Send + 'static,
    D: FrameDecoder + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    let actor = ScannerActor {
        camera,
        decoder,
        state: ScanState::Idle,
        stream: None,
        dispatched: false,
        last_attempt: None,
        events,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    ScannerHandle { sender: tx }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraCapabilities;

    // -- Test doubles -----------------------------------------------------

    /// A camera whose stream is scripted by the test through `frame_tx`.
    struct FakeCamera {
        stream: Option<CameraStream>,
        fail_with: Option<CameraError>,
    }

    impl FakeCamera {
        /// Returns the camera plus the test's end of the frame channel.
        fn streaming() -> (Self, mpsc::Sender<Frame>) {
            let (tx, rx) = mpsc::channel(16);
            let camera = Self {
                stream: Some(CameraStream::new(
                    rx,
                    CameraCapabilities::default(),
                )),
                fail_with: None,
            };
            (camera, tx)
        }

        fn failing(err: CameraError) -> Self {
            Self {
                stream: None,
                fail_with: Some(err),
            }
        }
    }

    impl Camera for FakeCamera {
        async fn open(&mut self) -> Result<CameraStream, CameraError> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            self.stream.take().ok_or(CameraError::Busy)
        }
    }

    /// Decodes frames whose data starts with `QR:` to the remainder.
    struct PrefixDecoder;

    impl FrameDecoder for PrefixDecoder {
        fn decode(&self, frame: &Frame) -> Option<String> {
            let text = std::str::from_utf8(&frame.data).ok()?;
            text.strip_prefix("QR:").map(str::to_owned)
        }
    }

    fn frame(data: &str) -> Frame {
        Frame {
            data: data.as_bytes().to_vec(),
            width: 640,
            height: 480,
        }
    }

    async fn recv_event(
        events: &mut mpsc::UnboundedReceiver<ScanEvent>,
    ) -> ScanEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for scan event")
            .expect("event channel closed")
    }

    // =====================================================================
    // Camera path
    // =====================================================================

    #[tokio::test]
    async fn test_open_transitions_to_scanning_and_decodes_frame() {
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);

        scanner.open().await.unwrap();
        assert_eq!(scanner.state().await.unwrap(), ScanState::Scanning);

        frame_tx.send(frame("QR:token-1")).await.unwrap();

        match recv_event(&mut events).await {
            ScanEvent::Captured { text, source } => {
                assert_eq!(text, "token-1");
                assert_eq!(source, CaptureSource::Camera);
            }
            other => panic!("expected Captured, got {other:?}"),
        }
        assert_eq!(scanner.state().await.unwrap(), ScanState::Decoded);
    }

    #[tokio::test]
    async fn test_first_decode_wins_until_resume() {
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        // A physical QR code produces a burst of decodable frames.
        for _ in 0..3 {
            frame_tx.send(frame("QR:token-1")).await.unwrap();
        }

        match recv_event(&mut events).await {
            ScanEvent::Captured { text, .. } => assert_eq!(text, "token-1"),
            other => panic!("expected Captured, got {other:?}"),
        }

        // No second dispatch while in Decoded.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err());

        // After resume (and the sampling gap), scanning works again.
        scanner.resume().await.unwrap();
        assert_eq!(scanner.state().await.unwrap(), ScanState::Scanning);
        tokio::time::sleep(Duration::from_millis(250)).await;
        frame_tx.send(frame("QR:token-2")).await.unwrap();

        match recv_event(&mut events).await {
            ScanEvent::Captured { text, .. } => assert_eq!(text, "token-2"),
            other => panic!("expected Captured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frames_inside_decode_gap_are_skipped() {
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        // First frame consumes the attempt slot without decoding; the
        // decodable frame right behind it lands inside the gap.
        frame_tx.send(frame("static noise")).await.unwrap();
        frame_tx.send(frame("QR:token-1")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err(), "gapped frame was decoded");

        // Once the gap has passed, decoding resumes.
        tokio::time::sleep(Duration::from_millis(250)).await;
        frame_tx.send(frame("QR:token-1")).await.unwrap();
        assert!(matches!(
            recv_event(&mut events).await,
            ScanEvent::Captured { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_releases_camera_immediately() {
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        scanner.close().await.unwrap();

        // The stream was dropped before close() returned.
        assert!(frame_tx.is_closed());
        assert_eq!(scanner.state().await.unwrap(), ScanState::Idle);
        assert!(matches!(recv_event(&mut events).await, ScanEvent::Closed));
    }

    #[tokio::test]
    async fn test_disconnect_mid_scan_lands_in_camera_error() {
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        drop(frame_tx);

        assert!(matches!(
            recv_event(&mut events).await,
            ScanEvent::CameraFailed(CameraError::Disconnected)
        ));
        assert_eq!(scanner.state().await.unwrap(), ScanState::CameraError);
    }

    // =====================================================================
    // Manual entry fallback
    // =====================================================================

    #[tokio::test]
    async fn test_camera_failure_recovers_through_manual_entry() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(
            FakeCamera::failing(CameraError::PermissionDenied),
            PrefixDecoder,
            events_tx,
        );

        let result = scanner.open().await;
        assert!(matches!(
            result,
            Err(ScanError::Camera(CameraError::PermissionDenied))
        ));
        assert!(matches!(
            recv_event(&mut events).await,
            ScanEvent::CameraFailed(CameraError::PermissionDenied)
        ));
        assert_eq!(scanner.state().await.unwrap(), ScanState::CameraError);

        scanner.enter_manual().await.unwrap();
        scanner.submit_manual("typed-token").await.unwrap();

        match recv_event(&mut events).await {
            ScanEvent::Captured { text, source } => {
                assert_eq!(text, "typed-token");
                assert_eq!(source, CaptureSource::Manual);
            }
            other => panic!("expected Captured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_manual_rejects_blank_input() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(
            FakeCamera::failing(CameraError::NoDevice),
            PrefixDecoder,
            events_tx,
        );
        let _ = scanner.open().await;
        let _ = recv_event(&mut events).await;
        scanner.enter_manual().await.unwrap();

        let result = scanner.submit_manual("   ").await;

        assert!(matches!(result, Err(ScanError::EmptyInput)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(events.try_recv().is_err(), "blank input emitted an event");
    }

    #[tokio::test]
    async fn test_submit_manual_outside_manual_entry_is_invalid() {
        let (camera, _frame_tx) = FakeCamera::streaming();
        let (events_tx, _events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);

        let result = scanner.submit_manual("token").await;

        assert!(matches!(
            result,
            Err(ScanError::InvalidState {
                state: ScanState::Idle,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_manual_entry_unreachable_while_scanning() {
        let (camera, _frame_tx) = FakeCamera::streaming();
        let (events_tx, _events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        let result = scanner.enter_manual().await;

        assert!(matches!(result, Err(ScanError::InvalidState { .. })));
    }

    // =====================================================================
    // Best-effort controls
    // =====================================================================

    #[tokio::test]
    async fn test_zoom_and_torch_never_fail_the_scan() {
        // Fixed-lens camera: controls are dropped, scanning continues.
        let (camera, frame_tx) = FakeCamera::streaming();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let scanner = spawn_scanner(camera, PrefixDecoder, events_tx);
        scanner.open().await.unwrap();

        scanner.set_zoom(2.0).await.unwrap();
        scanner.set_torch(true).await.unwrap();

        frame_tx.send(frame("QR:still-works")).await.unwrap();
        assert!(matches!(
            recv_event(&mut events).await,
            ScanEvent::Captured { .. }
        ));
    }
}
