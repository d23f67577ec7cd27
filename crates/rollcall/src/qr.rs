//! QR rendering: turn an issued token into a displayable code.
//!
//! The token string goes into the QR verbatim — whatever the codec
//! produced is what students scan back out.

use qrcode::render::svg;
use qrcode::QrCode;

use crate::RollcallError;

/// Minimum rendered size, in SVG user units. Small codes scan poorly
/// on low-end phone cameras.
const MIN_DIMENSION: u32 = 240;

/// Renders a token as an SVG image, ready to drop into a page or a
/// projector slide.
pub fn token_to_svg(token: &str) -> Result<String, RollcallError> {
    let code =
        QrCode::new(token.as_bytes()).map_err(RollcallError::QrRender)?;
    Ok(code
        .render()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
