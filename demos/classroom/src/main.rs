//! An offline morning at a school, end to end.
//!
//! Runs the whole flow against the in-memory registry: the teacher
//! issues a session, one student scans the projected code, a second
//! tries to cheat with the same phone, and a fire alert goes through
//! triage. No network, no camera hardware — the "camera" replays the
//! projected token as frames.
//!
//! ```text
//! cargo run -p classroom
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use rollcall::prelude::*;
use rollcall::init_tracing;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// A camera that replays the projected token
// ---------------------------------------------------------------------------

struct ProjectorCamera {
    stream: Option<CameraStream>,
}

impl ProjectorCamera {
    /// Returns the camera and the sender the demo feeds "frames" into.
    fn new() -> (Self, mpsc::Sender<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        let stream = CameraStream::new(rx, CameraCapabilities::default());
        (
            Self {
                stream: Some(stream),
            },
            tx,
        )
    }
}

impl Camera for ProjectorCamera {
    async fn open(&mut self) -> Result<CameraStream, CameraError> {
        self.stream.take().ok_or(CameraError::Busy)
    }
}

/// Treats any UTF-8 frame as a decoded QR payload.
struct PassthroughDecoder;

impl FrameDecoder for PassthroughDecoder {
    fn decode(&self, frame: &Frame) -> Option<String> {
        String::from_utf8(frame.data.clone()).ok()
    }
}

// ---------------------------------------------------------------------------
// The walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), RollcallError> {
    init_tracing();

    let client = RollcallClient::with_registry(Arc::new(
        MemoryRegistry::with_ttl(ChronoDuration::minutes(10)),
    ));

    let teacher = Identity::teacher("demo-teacher", "T-1", "R. Atkins");
    let principal = Identity::principal("demo-principal", "P-1", "M. Okafor");
    let joy = Identity::student("demo-joy", "STU-1042", "J. Mwangi", "A5");

    // 09:30 — the teacher puts the code on the projector.
    let issued = client
        .issue_session(
            &teacher,
            IssueRequest {
                class_section: "A5".into(),
                subject: "Mathematics".into(),
                class_code: "MC".into(),
                time_slot: "09:30-10:30".into(),
            },
        )
        .await?;
    tracing::info!(
        session = %issued.session.id,
        svg_bytes = issued.qr_svg.len(),
        "session on the projector"
    );

    // Joy points her phone at it.
    let (camera, frames) = ProjectorCamera::new();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let scanner = client.start_scanner(camera, PassthroughDecoder, events_tx);
    scanner.open().await?;

    // The projected code shows up on a burst of frames; exactly one
    // capture comes out the other side.
    for _ in 0..4 {
        let _ = frames
            .send(Frame {
                data: issued.token.clone().into_bytes(),
                width: 1280,
                height: 720,
            })
            .await;
    }

    let captured = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no capture within two seconds")
        .expect("scanner went away");
    if let ScanEvent::Captured { text, .. } = captured {
        let record = client.redeem(&text, &joy).await?;
        tracing::info!(record = %record.id, student = %record.student_name, "marked present");

        // Scanning the same code again is politely refused.
        match client.redeem(&text, &joy).await {
            Err(RollcallError::Redemption(RedemptionError::Duplicate)) => {
                tracing::info!("second scan refused: already marked")
            }
            other => tracing::error!(?other, "expected a duplicate refusal"),
        }
    }
    scanner.close().await?;

    // 09:41 — someone smells smoke in the lab.
    let alert = client
        .report_alert(&joy, AlertType::Fire, None)
        .await?;
    client.acknowledge_alert(&principal, alert.id).await?;
    let resolved = client.resolve_alert(&principal, alert.id).await?;
    tracing::info!(
        alert = %resolved.id,
        resolver = resolved.resolver_name.as_deref().unwrap_or("-"),
        "alert resolved, drill over"
    );

    Ok(())
}
