//! Screenshot normalization
//!
//! Turns a [`RawCapture`] into a [`ScreenshotResult`]: an image small enough
//! to send to a model, encoded as lossless PNG, plus the scale factors that
//! map image coordinates back to the logical screen coordinates the input
//! tools use.
//!
//! # Algorithm
//!
//! 1. Reject empty captures and pixel buffers whose length does not match
//!    the declared dimensions.
//! 2. Pick the logical size. An unknown screen size (0) means the capture
//!    size. On HiDPI displays the capture is physically larger than the
//!    logical screen; when the aspect ratios agree the capture is first
//!    aligned to the logical size, whatever `max_edge` is.
//! 3. If `max_edge > 0` and the longer side exceeds it, resize by
//!    `r = max_edge / max(w, h)` to `round(w * r) x round(h * r)` with a
//!    Lanczos3 filter.
//! 4. Encode as PNG at the configured compression level.
//!
//! `scale_x = logical_width / image_width` (and likewise for y), so a point
//! `(ix, iy)` in the image maps to `(ix * scale_x, iy * scale_y)` on screen.
//!
//! # Examples
//!
//! ```
//! use computer_use_mcp::{normalize::normalize, providers::RawCapture};
//!
//! let capture = RawCapture::test_pattern(400, 200);
//! let shot = normalize(&capture, 400, 200, 100, 6).unwrap();
//!
//! assert_eq!((shot.image_width, shot.image_height), (100, 50));
//! assert_eq!(shot.scale_x, 4.0);
//! ```

use std::io::Cursor;

use image::{
    ImageEncoder, RgbImage,
    codecs::png::{CompressionType, FilterType, PngEncoder},
    imageops::{self, FilterType as ResizeFilter},
};

use crate::{
    error::{CaptureError, CaptureResult},
    model::ScreenshotResult,
    providers::{PixelLayout, RawCapture},
};

/// MIME type of every encoded screenshot
pub const PNG_MIME_TYPE: &str = "image/png";

/// Aspect ratios closer than this are treated as the same display
const ASPECT_TOLERANCE: f64 = 0.02;

/// Maps a zlib-style level (0-9) to a PNG compression type
///
/// - 0-3: Fast
/// - 4-6: Default
/// - 7-9: Best
///
/// ```
/// use image::codecs::png::CompressionType;
/// use computer_use_mcp::normalize::compression_type_from_level;
///
/// assert!(matches!(compression_type_from_level(1), CompressionType::Fast));
/// assert!(matches!(compression_type_from_level(6), CompressionType::Default));
/// assert!(matches!(compression_type_from_level(9), CompressionType::Best));
/// ```
pub fn compression_type_from_level(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Output size for a `width x height` image capped at `max_edge`
///
/// Returns the input unchanged when `max_edge` is 0 or the image already
/// fits. Each side is at least 1 pixel.
///
/// ```
/// use computer_use_mcp::normalize::target_dimensions;
///
/// assert_eq!(target_dimensions(3840, 2160, 1920), (1920, 1080));
/// assert_eq!(target_dimensions(1280, 720, 1920), (1280, 720));
/// assert_eq!(target_dimensions(3840, 2160, 0), (3840, 2160));
/// ```
pub fn target_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_edge == 0 || longest <= max_edge {
        return (width, height);
    }
    let ratio = f64::from(max_edge) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * ratio).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Logical size to align a HiDPI capture to, if alignment applies
///
/// Alignment applies when the capture is at least as large as the logical
/// screen on both axes, strictly larger on one, and both have the same aspect
/// ratio within a small tolerance.
pub fn logical_alignment(
    raw_width: u32,
    raw_height: u32,
    logical_width: u32,
    logical_height: u32,
) -> Option<(u32, u32)> {
    if logical_width == 0 || logical_height == 0 {
        return None;
    }
    if raw_width < logical_width || raw_height < logical_height {
        return None;
    }
    if (raw_width, raw_height) == (logical_width, logical_height) {
        return None;
    }
    let raw_aspect = f64::from(raw_width) / f64::from(raw_height);
    let logical_aspect = f64::from(logical_width) / f64::from(logical_height);
    if (raw_aspect - logical_aspect).abs() > ASPECT_TOLERANCE {
        return None;
    }
    Some((logical_width, logical_height))
}

/// Normalizes a raw capture for transmission
///
/// `screen_width`/`screen_height` are the logical screen size reported by the
/// input provider (0 if unknown). `max_edge` caps the longer output side (0
/// disables resampling). `compression_level` is 0-9.
///
/// # Errors
///
/// - [`CaptureError::EmptyCapture`] if the capture has no pixels
/// - [`CaptureError::MalformedCapture`] if the buffer length does not match
/// - [`CaptureError::EncodingFailed`] if PNG encoding fails
pub fn normalize(
    raw: &RawCapture,
    screen_width: u32,
    screen_height: u32,
    max_edge: u32,
    compression_level: u8,
) -> CaptureResult<ScreenshotResult> {
    let mut image = to_rgb(raw)?;

    let (logical_width, logical_height) = if screen_width == 0 || screen_height == 0 {
        (raw.width, raw.height)
    } else {
        (screen_width, screen_height)
    };

    if let Some((w, h)) = logical_alignment(raw.width, raw.height, logical_width, logical_height) {
        tracing::debug!(
            "Aligning {}x{} capture to logical {}x{}",
            raw.width,
            raw.height,
            w,
            h
        );
        image = imageops::resize(&image, w, h, ResizeFilter::Lanczos3);
    }

    let (current_width, current_height) = image.dimensions();
    let (image_width, image_height) = target_dimensions(current_width, current_height, max_edge);
    if (image_width, image_height) != (current_width, current_height) {
        image = imageops::resize(&image, image_width, image_height, ResizeFilter::Lanczos3);
    }

    let encoded_image = encode_png(&image, compression_type_from_level(compression_level))?;

    Ok(ScreenshotResult {
        encoded_image,
        logical_width,
        logical_height,
        image_width,
        image_height,
        scale_x: f64::from(logical_width) / f64::from(image_width),
        scale_y: f64::from(logical_height) / f64::from(image_height),
    })
}

/// Drops alpha and reorders channels into an RGB image
fn to_rgb(raw: &RawCapture) -> CaptureResult<RgbImage> {
    if raw.width == 0 || raw.height == 0 || raw.pixels.is_empty() {
        return Err(CaptureError::EmptyCapture {
            width: raw.width,
            height: raw.height,
        });
    }

    let expected = raw.width as usize * raw.height as usize * 4;
    let malformed = || CaptureError::MalformedCapture {
        width: raw.width,
        height: raw.height,
        expected,
        actual: raw.pixels.len(),
    };
    if raw.pixels.len() != expected {
        return Err(malformed());
    }

    let mut rgb = Vec::with_capacity(raw.width as usize * raw.height as usize * 3);
    match raw.layout {
        PixelLayout::Rgba8 => {
            for px in raw.pixels.chunks_exact(4) {
                rgb.extend_from_slice(&[px[0], px[1], px[2]]);
            }
        }
        PixelLayout::Bgra8 => {
            for px in raw.pixels.chunks_exact(4) {
                rgb.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
    }

    RgbImage::from_raw(raw.width, raw.height, rgb).ok_or_else(malformed)
}

fn encode_png(image: &RgbImage, compression: CompressionType) -> CaptureResult<Vec<u8>> {
    let mut output = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(Cursor::new(&mut output), compression, FilterType::Adaptive);
    let (width, height) = image.dimensions();
    encoder
        .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| CaptureError::EncodingFailed {
            reason: e.to_string(),
        })?;
    Ok(output)
}
