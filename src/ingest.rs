//! Frame ingest: base64 text from the shared buffer into an RGBA image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::core::FrameImage;
use crate::error::Result;
use crate::shm::payload_of;

/// Decode one frame payload.
///
/// Accepts any bitmap container the `image` crate can sniff (BMP, PNG, JPEG)
/// and converts it to 8-bit RGBA.
pub fn decode_frame(raw: &[u8]) -> Result<FrameImage> {
    let encoded = STANDARD.decode(payload_of(raw))?;
    let pixels = image::load_from_memory(&encoded)?.to_rgba8();
    Ok(FrameImage::new(pixels))
}
