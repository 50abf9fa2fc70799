// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image decoding helpers: size filtering and canonical encoding for vision models

use base64::{engine::general_purpose, Engine as _};
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

use crate::detect::PNG_SIGNATURE;
use crate::{Result, VistaError};

/// Check that both dimensions reach `threshold`. Undecodable images fail the check.
pub fn meets_minimum(path: &Path, threshold: u32) -> bool {
    match read_dimensions(path) {
        Ok((width, height)) => width >= threshold && height >= threshold,
        Err(e) => {
            warn!("Could not load image for size check {:?}: {}", path, e);
            false
        }
    }
}

/// Header-only dimension probe; the format is guessed from content, not the extension
fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    ImageReader::open(path)?.with_guessed_format()?.into_dimensions()
}

/// A PNG re-encoding ready to send to a vision model
#[derive(Debug, Clone)]
pub struct EncodedImage {
    base64: String,
}

impl EncodedImage {
    /// Raw base64 payload (what Ollama expects in `images`)
    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.base64)
    }
}

/// Decode, normalize and re-encode an image as PNG
///
/// Anything that is not already RGB8 or L8 is converted to RGB8. When
/// `max_dimension` is set, larger images are downscaled first.
pub fn encode_for_vision(path: &Path, max_dimension: Option<u32>) -> Result<EncodedImage> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let img = normalize_color(img);

    let img = match max_dimension {
        Some(max) if img.width() > max || img.height() > max => {
            img.resize(max, max, image::imageops::FilterType::Triangle)
        }
        _ => img,
    };

    let png = to_png(&img)?;
    Ok(EncodedImage {
        base64: general_purpose::STANDARD.encode(&png),
    })
}

fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::Rgb8 | ColorType::L8 => img,
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

fn to_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;

    if !buffer.starts_with(PNG_SIGNATURE) {
        return Err(VistaError::Encoding("Invalid PNG header".to_string()));
    }

    Ok(buffer)
}
