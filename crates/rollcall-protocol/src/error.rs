//! Error types for the protocol layer.
//!
//! Each crate in Rollcall defines its own error enum. When you see a
//! `ProtocolError`, the problem is in token (de)serialization — not in
//! the network, the camera, or the registry.

/// Errors that can occur while encoding or decoding a QR token.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The scanned string is not a valid token payload.
    ///
    /// This is the first line of defense against hostile or truncated
    /// scan data: decoding never panics, whatever arrives from the camera
    /// or the manual-entry field — it reports `Malformed` instead.
    #[error("malformed token payload: {0}")]
    Malformed(String),

    /// Serializing a token payload failed. Should not happen for the
    /// types in this crate; wrapped rather than unwrapped so issuance
    /// paths can propagate it with `?`.
    #[error("token encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}
