//! `RollcallClient`: the one type an application needs.
//!
//! The client ties the layers together: registry → redemption → scan →
//! alerts. Every operation takes the caller's [`Identity`] explicitly,
//! because one device can host several signed-in people over a day
//! (shared tablets at the school office are the norm, not the edge
//! case).

use std::sync::Arc;

use rollcall_alert::AlertWorkflow;
use rollcall_protocol::{
    AlertId, AlertType, AttendanceRecord, EmergencyAlert, Identity, Session,
};
use rollcall_redeem::RedemptionEngine;
use rollcall_registry::{
    HttpRegistry, IssueRequest, SessionRegistry,
};
use rollcall_scan::{
    spawn_scanner, Camera, FrameDecoder, ScanEvent, ScannerHandle,
};
use tokio::sync::mpsc;

use crate::{qr, RollcallError};

/// A freshly issued attendance session, ready to show the class.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// The session as the registry recorded it.
    pub session: Session,
    /// The raw token embedded in the QR code.
    pub token: String,
    /// The token rendered as an SVG QR code.
    pub qr_svg: String,
}

/// Builder for configuring a [`RollcallClient`] against an HTTP registry.
///
/// # Example
///
/// ```rust,ignore
/// use rollcall::prelude::*;
///
/// let client = RollcallClient::builder()
///     .base_url("https://attendance.example.edu")
///     .build();
/// ```
pub struct RollcallClientBuilder {
    base_url: String,
}

impl RollcallClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }

    /// Sets the registry service's base URL.
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Builds a client backed by the HTTP registry.
    pub fn build(self) -> RollcallClient<HttpRegistry> {
        RollcallClient::with_registry(Arc::new(HttpRegistry::new(
            self.base_url,
        )))
    }
}

impl Default for RollcallClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// High-level client over a session registry.
///
/// Generic over the registry so tests (and offline demos) can run
/// against an in-memory one.
pub struct RollcallClient<R> {
    registry: Arc<R>,
    engine: RedemptionEngine<R>,
    alerts: AlertWorkflow<R>,
}

impl RollcallClient<HttpRegistry> {
    /// Creates a new builder.
    pub fn builder() -> RollcallClientBuilder {
        RollcallClientBuilder::new()
    }
}

impl<R: SessionRegistry> RollcallClient<R> {
    /// Creates a client over an already-constructed registry.
    pub fn with_registry(registry: Arc<R>) -> Self {
        Self {
            engine: RedemptionEngine::new(Arc::clone(&registry)),
            alerts: AlertWorkflow::new(Arc::clone(&registry)),
            registry,
        }
    }

    // -- Sessions ---------------------------------------------------------

    /// Issues a new attendance session and renders its QR code.
    /// Teacher/principal only.
    pub async fn issue_session(
        &self,
        identity: &Identity,
        request: IssueRequest,
    ) -> Result<IssuedSession, RollcallError> {
        let issued = self.registry.issue_session(identity, request).await?;
        let qr_svg = qr::token_to_svg(&issued.token)?;
        tracing::info!(
            session_id = %issued.session.id,
            class_section = %issued.session.class_section,
            subject = %issued.session.subject,
            svg_bytes = qr_svg.len(),
            "session issued and rendered"
        );
        Ok(IssuedSession {
            session: issued.session,
            token: issued.token,
            qr_svg,
        })
    }

    /// Lists known sessions.
    pub async fn sessions(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Session>, RollcallError> {
        Ok(self.registry.sessions(identity).await?)
    }

    // -- Attendance -------------------------------------------------------

    /// Redeems a scanned or typed token for the calling student.
    pub async fn redeem(
        &self,
        raw_input: &str,
        identity: &Identity,
    ) -> Result<AttendanceRecord, RollcallError> {
        Ok(self.engine.redeem(raw_input, identity).await?)
    }

    /// Lists attendance records visible to the caller.
    pub async fn attendance(
        &self,
        identity: &Identity,
    ) -> Result<Vec<AttendanceRecord>, RollcallError> {
        Ok(self.registry.attendance(identity).await?)
    }

    // -- Scanning ---------------------------------------------------------

    /// Starts a scanner session over the given camera and decoder.
    ///
    /// Captured token strings arrive as [`ScanEvent::Captured`] on
    /// `events`; feed them to [`Self::redeem`]. The scanner holds the
    /// camera exclusively until closed or dropped.
    pub fn start_scanner<C, D>(
        &self,
        camera: C,
        decoder: D,
        events: mpsc::UnboundedSender<ScanEvent>,
    ) -> ScannerHandle
    where
        C: Camera + Send + 'static,
        D: FrameDecoder + Send + 'static,
    {
        tracing::debug!("scanner session started");
        spawn_scanner(camera, decoder, events)
    }

    // -- Alerts -----------------------------------------------------------

    /// Reports a new emergency alert. Student-only.
    pub async fn report_alert(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        description: Option<String>,
    ) -> Result<EmergencyAlert, RollcallError> {
        Ok(self.alerts.report(identity, alert_type, description).await?)
    }

    /// Lists alerts, most recent first. Teacher/principal only.
    pub async fn alerts(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EmergencyAlert>, RollcallError> {
        Ok(self.alerts.list(identity).await?)
    }

    /// Acknowledges a pending alert. Principal-only.
    pub async fn acknowledge_alert(
        &self,
        identity: &Identity,
        alert_id: AlertId,
    ) -> Result<EmergencyAlert, RollcallError> {
        Ok(self.alerts.acknowledge(identity, alert_id).await?)
    }

    /// Resolves an alert. Principal-only; terminal.
    pub async fn resolve_alert(
        &self,
        identity: &Identity,
        alert_id: AlertId,
    ) -> Result<EmergencyAlert, RollcallError> {
        Ok(self.alerts.resolve(identity, alert_id).await?)
    }
}
