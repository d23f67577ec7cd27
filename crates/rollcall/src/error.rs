//! Unified error type for the Rollcall toolkit.

use rollcall_alert::AlertError;
use rollcall_protocol::ProtocolError;
use rollcall_redeem::RedemptionError;
use rollcall_registry::RegistryError;
use rollcall_scan::ScanError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `rollcall` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// A protocol-level error (token encode/decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (transport, authorization, contract).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A redemption rejection (invalid, expired, duplicate...).
    #[error(transparent)]
    Redemption(#[from] RedemptionError),

    /// A scan-level error (bad state, dead scanner, camera failure).
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// An alert workflow rejection.
    #[error(transparent)]
    Alert(#[from] AlertError),

    /// The token could not be rendered as a QR code.
    #[error("QR rendering failed: {0:?}")]
    QrRender(qrcode::types::QrError),
}
