// src/services/image_normalizer.rs
use crate::config::{Config, JPEG_QUALITY, MAX_EDGE};
use crate::errors::ConciergeError;
use crate::models::{NormalizedImage, RawImage};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageDecoder, ImageReader};
use log::{info, warn};
use std::io::Cursor;
use std::time::Duration;

pub struct ImageNormalizer {
    max_edge: u32,
    quality: u8,
    decode_timeout: Duration,
    max_input_bytes: usize,
}

impl ImageNormalizer {
    pub fn new(decode_timeout: Duration, max_input_bytes: usize) -> Self {
        Self {
            max_edge: MAX_EDGE,
            quality: JPEG_QUALITY,
            decode_timeout,
            max_input_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.decode_timeout, config.max_input_bytes)
    }

    /// Decodes, bounds and re-encodes one image as a JPEG data URL.
    ///
    /// The decode runs on the blocking pool. If it does not finish within the
    /// decode timeout the call fails with `Decode`; the worker itself is left to
    /// finish in the background.
    pub async fn normalize(&self, raw: RawImage) -> Result<NormalizedImage, ConciergeError> {
        let name = raw.filename.as_deref().unwrap_or("<unnamed>").to_string();

        if raw.data.is_empty() {
            return Err(ConciergeError::Decode(format!("{}: empty image data", name)));
        }
        if raw.data.len() > self.max_input_bytes {
            return Err(ConciergeError::Decode(format!(
                "{}: image is {} bytes, limit is {}",
                name,
                raw.data.len(),
                self.max_input_bytes
            )));
        }

        let data = raw.data;
        let (max_edge, quality) = (self.max_edge, self.quality);
        let task = tokio::task::spawn_blocking(move || encode_bounded(&data, max_edge, quality));

        match tokio::time::timeout(self.decode_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ConciergeError::Unknown(format!("Image worker failed: {}", e))),
            Err(_) => {
                warn!("Decoding {} exceeded {:?}", name, self.decode_timeout);
                Err(ConciergeError::Decode(format!(
                    "{}: decode timed out after {:?}",
                    name, self.decode_timeout
                )))
            }
        }
    }
}

/// Target size with the longer edge capped at `max_edge`. Never upscales.
pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge {
        return (width, height);
    }

    let scale = max_edge as f64 / longer as f64;
    let scaled = |side: u32| {
        if side == longer {
            max_edge
        } else {
            ((side as f64 * scale).round() as u32).clamp(1, max_edge)
        }
    };

    (scaled(width), scaled(height))
}

/// Decodes `data` and applies its EXIF orientation, so the pixels come out the
/// way a photo viewer shows them.
fn decode_upright(data: &[u8]) -> Result<DynamicImage, ConciergeError> {
    let invalid =
        |e: image::ImageError| ConciergeError::Decode(format!("Invalid image format: {}", e));

    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ConciergeError::Decode(format!("Unreadable image data: {}", e)))?
        .into_decoder()
        .map_err(invalid)?;

    let orientation = decoder.orientation().unwrap_or_else(|e| {
        warn!("Ignoring unreadable orientation metadata: {}", e);
        Orientation::NoTransforms
    });
    let mut img = DynamicImage::from_decoder(decoder).map_err(invalid)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode_bounded(
    data: &[u8],
    max_edge: u32,
    quality: u8,
) -> Result<NormalizedImage, ConciergeError> {
    let img = decode_upright(data)?;

    let (width, height) = img.dimensions();
    let (target_w, target_h) = bounded_dimensions(width, height, max_edge);

    let bounded = if (target_w, target_h) == (width, height) {
        img
    } else {
        img.resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3)
    };

    let rgb = bounded.to_rgb8();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .encode(rgb.as_raw(), target_w, target_h, ExtendedColorType::Rgb8)
        .map_err(|e| ConciergeError::Decode(format!("Failed to encode image: {}", e)))?;

    info!(
        "Normalized image {}x{} -> {}x{} ({} bytes jpeg)",
        width,
        height,
        target_w,
        target_h,
        output.len()
    );

    Ok(NormalizedImage::from_encoded("image/jpeg", &output, target_w, target_h))
}
