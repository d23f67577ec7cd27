//! The redemption engine: validates a scanned token and records presence.
//!
//! The flow is strictly cheap-first:
//!
//! ```text
//! raw string ──decode──→ SessionRef ──lookup──→ Session ──checks──→ record
//!      │                     │                     │
//!      ▼                     ▼                     ▼
//! InvalidPayload       InvalidPayload      Expired / NotEnrolled
//! (no network yet)     (unknown session)
//! ```
//!
//! Malformed input is rejected before any network call; expiry is checked
//! before duplicate detection so an expired duplicate reports `Expired`
//! (the actionable message); and the final `redeem` call leaves duplicate
//! detection to the registry, which is the only place it can be decided —
//! two phones scanning the same code race at the registry, not here.
//!
//! The engine caches nothing. Every attempt re-queries the registry,
//! because session state may have changed (superseded, expired) since the
//! token was minted.

use std::sync::Arc;

use chrono::Utc;
use rollcall_protocol::{
    AttendanceRecord, Identity, JsonTokenCodec, Role, TokenCodec,
};
use rollcall_registry::SessionRegistry;

use crate::RedemptionError;

/// Validates scanned tokens and records attendance through the registry.
///
/// Generic over the registry (HTTP in production, in-memory in tests) and
/// the token codec, with [`JsonTokenCodec`] as the default.
pub struct RedemptionEngine<R, C = JsonTokenCodec> {
    registry: Arc<R>,
    codec: C,
}

impl<R: SessionRegistry> RedemptionEngine<R> {
    /// Creates an engine with the default JSON token codec.
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            codec: JsonTokenCodec,
        }
    }
}

impl<R: SessionRegistry, C: TokenCodec> RedemptionEngine<R, C> {
    /// Creates an engine with a custom codec.
    pub fn with_codec(registry: Arc<R>, codec: C) -> Self {
        Self { registry, codec }
    }

    /// Redeems `raw_input` for the calling student.
    ///
    /// `raw_input` is whatever the scan layer produced — a camera decode
    /// or pasted text. Check order matters and is part of the contract:
    ///
    /// 1. decode locally → [`RedemptionError::InvalidPayload`];
    /// 2. resolve the session from the registry (unknown id is also
    ///    `InvalidPayload`);
    /// 3. deadline/active check → [`RedemptionError::Expired`];
    /// 4. section membership → [`RedemptionError::NotEnrolled`];
    /// 5. record via the registry, whose `Duplicate`/`Expired` answers
    ///    are final even when the checks above passed.
    pub async fn redeem(
        &self,
        raw_input: &str,
        identity: &Identity,
    ) -> Result<AttendanceRecord, RedemptionError> {
        // Cheap-first: reject garbage before touching the network.
        let token = self.codec.decode(raw_input).map_err(|e| {
            tracing::debug!(error = %e, "scan rejected: undecodable payload");
            RedemptionError::InvalidPayload
        })?;

        if identity.role != Role::Student {
            return Err(RedemptionError::Forbidden(
                "only students can mark attendance".into(),
            ));
        }

        let session = self
            .registry
            .session(identity, token.session_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(
                    session_id = %token.session_id,
                    "scan rejected: unknown session"
                );
                RedemptionError::InvalidPayload
            })?;

        // Expiry is computed at check time against the absolute deadline;
        // there is no background sweep to rely on.
        let now = Utc::now();
        if !session.is_redeemable(now) {
            tracing::info!(
                session_id = %session.id,
                expires_at = %session.expires_at,
                "redemption rejected: session no longer redeemable"
            );
            return Err(RedemptionError::Expired);
        }

        if identity.class_section.as_deref()
            != Some(session.class_section.as_str())
        {
            return Err(RedemptionError::NotEnrolled(
                session.class_section.clone(),
            ));
        }

        let record = self.registry.redeem(identity, &token).await?;
        tracing::info!(
            record_id = %record.id,
            session_id = %record.session_id,
            subject = %record.subject,
            "attendance marked"
        );
        Ok(record)
    }
}

// =========================================================================
// Tests
// =========================================================================
