//! HTTP registry client.
//!
//! Talks to the remote session registry over HTTP with a bearer token on
//! every request. The wire format is the service's concern; this client
//! only pins down the parts Rollcall depends on for correctness:
//!
//! - `401` means [`RegistryError::Unauthorized`], always.
//! - Contract errors arrive as a JSON body `{ "error": "<code>", ... }`
//!   and are mapped onto [`RegistryError`]; anything unrecognized becomes
//!   [`RegistryError::Unexpected`] rather than being guessed at.

use reqwest::{Response, StatusCode};
use rollcall_protocol::{
    AlertId, AlertStatus, AlertType, AttendanceRecord, EmergencyAlert,
    Identity, Session, SessionId, SessionRef,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Issued, IssueRequest, RegistryError, SessionRegistry};

/// A [`SessionRegistry`] backed by the remote HTTP service.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistry {
    /// Creates a client for the service at `base_url`
    /// (e.g. `"https://attendance.example.edu"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Creates a client reusing an existing `reqwest::Client` (connection
    /// pools, proxies, timeouts configured by the caller).
    pub fn with_client(
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RedeemBody<'a> {
    token_payload: &'a SessionRef,
}

#[derive(Serialize)]
struct CreateAlertBody<'a> {
    alert_type: AlertType,
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateStatusBody {
    status: AlertStatus,
}

/// The error body the registry sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    from: Option<AlertStatus>,
    #[serde(default)]
    to: Option<AlertStatus>,
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Reads a successful response body, or maps the error.
async fn parse<T: DeserializeOwned>(
    resp: Response,
) -> Result<T, RegistryError> {
    if resp.status().is_success() {
        let status = resp.status().as_u16();
        resp.json().await.map_err(|e| RegistryError::Unexpected {
            status,
            message: format!("undecodable success body: {e}"),
        })
    } else {
        Err(map_error(resp).await)
    }
}

/// Maps a non-2xx response onto the contract's error taxonomy.
async fn map_error(resp: Response) -> RegistryError {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return RegistryError::Unauthorized;
    }

    let code = status.as_u16();
    let body: Option<ErrorBody> = resp.json().await.ok();
    let Some(body) = body else {
        if status == StatusCode::FORBIDDEN {
            return RegistryError::Forbidden("forbidden".into());
        }
        return RegistryError::Unexpected {
            status: code,
            message: "unreadable error body".into(),
        };
    };

    let detail = || body.detail.clone().unwrap_or_else(|| body.error.clone());
    match body.error.as_str() {
        "expired" => RegistryError::Expired,
        "duplicate" => RegistryError::Duplicate,
        "invalid_payload" => RegistryError::InvalidPayload(detail()),
        "not_enrolled" => RegistryError::NotEnrolled(detail()),
        "forbidden" => RegistryError::Forbidden(detail()),
        "invalid_alert" => RegistryError::InvalidAlert(detail()),
        "invalid_transition" => match (body.from, body.to) {
            (Some(from), Some(to)) => {
                RegistryError::InvalidTransition { from, to }
            }
            _ => RegistryError::Unexpected {
                status: code,
                message: "invalid_transition without from/to".into(),
            },
        },
        other => RegistryError::Unexpected {
            status: code,
            message: format!("{other}: {}", detail()),
        },
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        RegistryError::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry impl
// ---------------------------------------------------------------------------

impl SessionRegistry for HttpRegistry {
    async fn issue_session(
        &self,
        identity: &Identity,
        request: IssueRequest,
    ) -> Result<Issued, RegistryError> {
        tracing::debug!(
            class_section = %request.class_section,
            subject = %request.subject,
            "issuing session"
        );
        let resp = self
            .client
            .post(self.url("/api/qr/generate"))
            .bearer_auth(&identity.bearer)
            .json(&request)
            .send()
            .await?;
        parse(resp).await
    }

    async fn session(
        &self,
        identity: &Identity,
        id: SessionId,
    ) -> Result<Option<Session>, RegistryError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/qr/sessions/{}", id.0)))
            .bearer_auth(&identity.bearer)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse(resp).await.map(Some)
    }

    async fn sessions(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Session>, RegistryError> {
        let resp = self
            .client
            .get(self.url("/api/qr/sessions"))
            .bearer_auth(&identity.bearer)
            .send()
            .await?;
        parse(resp).await
    }

    async fn redeem(
        &self,
        identity: &Identity,
        token: &SessionRef,
    ) -> Result<AttendanceRecord, RegistryError> {
        tracing::debug!(session_id = %token.session_id, "marking attendance");
        let resp = self
            .client
            .post(self.url("/api/attendance/mark"))
            .bearer_auth(&identity.bearer)
            .json(&RedeemBody {
                token_payload: token,
            })
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            // The registry has never issued this session id.
            return Err(RegistryError::UnknownSession(token.session_id));
        }
        parse(resp).await
    }

    async fn attendance(
        &self,
        identity: &Identity,
    ) -> Result<Vec<AttendanceRecord>, RegistryError> {
        let resp = self
            .client
            .get(self.url("/api/attendance/records"))
            .bearer_auth(&identity.bearer)
            .send()
            .await?;
        parse(resp).await
    }

    async fn create_alert(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        description: Option<String>,
    ) -> Result<EmergencyAlert, RegistryError> {
        tracing::debug!(%alert_type, "filing emergency alert");
        let resp = self
            .client
            .post(self.url("/api/alerts"))
            .bearer_auth(&identity.bearer)
            .json(&CreateAlertBody {
                alert_type,
                description: description.as_deref(),
            })
            .send()
            .await?;
        parse(resp).await
    }

    async fn alerts(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EmergencyAlert>, RegistryError> {
        let resp = self
            .client
            .get(self.url("/api/alerts"))
            .bearer_auth(&identity.bearer)
            .send()
            .await?;
        parse(resp).await
    }

    async fn update_alert_status(
        &self,
        identity: &Identity,
        id: AlertId,
        status: AlertStatus,
    ) -> Result<EmergencyAlert, RegistryError> {
        tracing::debug!(alert_id = %id, %status, "updating alert status");
        let resp = self
            .client
            .put(self.url(&format!("/api/alerts/{}/status", id.0)))
            .bearer_auth(&identity.bearer)
            .json(&UpdateStatusBody { status })
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::AlertNotFound);
        }
        parse(resp).await
    }
}
