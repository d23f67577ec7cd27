//! Token codec: how a session becomes a QR payload and back.
//!
//! A "token" is the opaque string embedded in the QR image a teacher
//! projects. The codec converts between [`SessionRef`] and that string.
//! Nothing else in the system looks inside a token — the scan layer hands
//! raw strings to the redemption engine, and the engine decodes them
//! through this trait.
//!
//! Currently there is one implementation, [`JsonTokenCodec`]: the payload
//! is a JSON object, which keeps tokens debuggable (paste one into any
//! JSON viewer) at the cost of a denser QR image. A compact binary codec
//! could be swapped in later without touching the engine.

use crate::{ProtocolError, SessionRef};

/// Encodes sessions into QR payload strings and decodes scans back.
///
/// `Send + Sync + 'static` so one codec instance can be shared across the
/// async tasks that make up a scan session.
pub trait TokenCodec: Send + Sync + 'static {
    /// Materializes a token string for a freshly issued session.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, payload: &SessionRef) -> Result<String, ProtocolError>;

    /// Parses a scanned (or hand-typed) string back into a [`SessionRef`].
    ///
    /// Must accept *any* `&str` without panicking — camera decodes and
    /// manual entry both produce arbitrary text.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] for anything that is not a
    /// well-formed token payload.
    fn decode(&self, raw: &str) -> Result<SessionRef, ProtocolError>;
}

/// A [`TokenCodec`] that stores the payload as JSON.
///
/// Matches what the registry embeds in its QR images, so a token issued
/// by the remote service and one issued locally decode identically.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTokenCodec;

impl TokenCodec for JsonTokenCodec {
    fn encode(&self, payload: &SessionRef) -> Result<String, ProtocolError> {
        serde_json::to_string(payload).map_err(ProtocolError::Encode)
    }

    fn decode(&self, raw: &str) -> Result<SessionRef, ProtocolError> {
        // Trim first: hand-typed tokens routinely pick up surrounding
        // whitespace or a trailing newline from the clipboard.
        serde_json::from_str(raw.trim())
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

// =========================================================================
// Tests
// =========================================================================
