//! Image set and overlay compositing.
//!
//! Payloads are base64 encoded rasters, optionally carrying a
//! `data:<mime>;base64,` prefix. Compositing is best effort: any failure
//! leaves the base payload in place.

mod image_set;
pub use image_set::*;


use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::Pixel;
use image::RgbaImage;
use tracing::debug;
use tracing::warn;

use crate::constants::FIELD_IMAGE_NAME;
use crate::constants::FIELD_OVERLAY_IMAGE_NAME;
use crate::constants::FIELD_PNG64;
use crate::constants::PNG_MEDIA_PREFIX;
use crate::metrics::COMPOSITE_FALLBACKS;
use crate::CompositingError;
use crate::FeedbackState;

/// Encoding options for composited payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorOptions {
    /// Prefix output with `data:image/png;base64,`
    pub include_media_prefix: bool,
}

/// Alpha-composites `overlay` over `base` and returns the encoded PNG.
///
/// The overlay is tiled when smaller than the base; the output keeps the
/// base dimensions.
pub fn composite(
    base64_base: &str,
    base64_overlay: &str,
    options: CompositorOptions,
) -> Result<String, CompositingError> {
    let mut base = decode_rgba(base64_base)?;
    let overlay = decode_rgba(base64_overlay)?;

    let (ow, oh) = overlay.dimensions();
    if ow > 0 && oh > 0 {
        for (x, y, pixel) in base.enumerate_pixels_mut() {
            pixel.blend(overlay.get_pixel(x % ow, y % oh));
        }
    }

    encode_png(&base, options)
}

/// Turns a cached value into what the host gets to see.
///
/// - `imageName` is resolved against the image set into `png64` and stripped
/// - `overlayImageName` is composited over `png64` (or used as the image when
///   the state has no base) and stripped
///
/// The input is never modified, so the cached entry stays exactly as written.
pub fn post_process(
    cached: &FeedbackState,
    images: &ImageSet,
    options: CompositorOptions,
) -> FeedbackState {
    let mut state = cached.clone();

    if let Some(name) = state.remove(FIELD_IMAGE_NAME) {
        match name.as_str().and_then(|name| images.get(name)) {
            Some(payload) => {
                state.insert(FIELD_PNG64, payload.to_string());
            }
            None => debug!(?name, "image reference not in image set"),
        }
    }

    if let Some(overlay_name) = state.remove(FIELD_OVERLAY_IMAGE_NAME) {
        let overlay_name = overlay_name.as_str().unwrap_or_default().to_string();
        let merged = match (state.png64(), images.get(&overlay_name)) {
            (Some(base), Some(overlay)) => composite(base, overlay, options),
            (None, Some(overlay)) => Ok(overlay.to_string()),
            (_, None) => Err(CompositingError::MissingOverlay(overlay_name.clone())),
        };
        match merged {
            Ok(payload) => {
                state.insert(FIELD_PNG64, payload);
            }
            Err(e) => {
                COMPOSITE_FALLBACKS.inc();
                warn!(overlay = %overlay_name, "compositing failed, keeping base image: {}", e);
            }
        }
    }

    state
}

/// Strips an optional `data:<mime>;base64,` prefix
pub fn strip_media_prefix(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some(idx) = payload.find(";base64,") {
            return &payload[idx + ";base64,".len()..];
        }
    }
    payload
}

fn decode_rgba(payload: &str) -> Result<RgbaImage, CompositingError> {
    let bytes = STANDARD.decode(strip_media_prefix(payload).trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

fn encode_png(
    image: &RgbaImage,
    options: CompositorOptions,
) -> Result<String, CompositingError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    let encoded = STANDARD.encode(buffer.into_inner());
    if options.include_media_prefix {
        Ok(format!("{PNG_MEDIA_PREFIX}{encoded}"))
    } else {
        Ok(encoded)
    }
}
