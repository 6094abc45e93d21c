//! Image decoding, resampling and encoding.
//!
//! The export step takes the synthesized portrait and a crop rectangle
//! expressed in that portrait's pixel space, and draws the rectangle onto
//! a fixed 1050×1350 canvas.
//!
//! # Coordinate Mapping
//!
//! Each target pixel centre `(tx + 0.5, ty + 0.5)` is mapped into the crop
//! rectangle with independent X and Y scales:
//!
//! ```text
//! sx = crop.x + (tx + 0.5) * crop.width  / 1050
//! sy = crop.y + (ty + 0.5) * crop.height / 1350
//! ```
//!
//! The source is sampled bilinearly around `(sx, sy)` with
//! [`imageops::interpolate_bilinear`]. Points that fall outside the source
//! image stay transparent; the rectangle itself is never clamped. A crop
//! larger than the canvas is first shrunk with a triangle filter.

use crate::crop::{CropRect, EXPORT_HEIGHT, EXPORT_WIDTH};
use crate::error::{AppError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Image processing utilities for the upload and export steps.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Decodes an encoded bitmap (PNG, JPEG or WebP).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DecodeFailure`] if the data is not a supported image.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| AppError::decode(e.to_string()))
    }

    /// Checks that an uploaded file is a readable image and returns its size.
    ///
    /// The format is guessed from the content, then the whole image is
    /// decoded so truncated files are rejected up front.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UploadDecodeFailure`] for anything unreadable.
    pub fn validate_upload(bytes: &[u8]) -> Result<(u32, u32)> {
        if bytes.is_empty() {
            return Err(AppError::upload("file is empty"));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AppError::upload(e.to_string()))?;
        if reader.format().is_none() {
            return Err(AppError::upload("unrecognised image format"));
        }

        let image = reader.decode().map_err(|e| AppError::upload(e.to_string()))?;
        Ok((image.width(), image.height()))
    }

    /// Reads the pixel size from the image header without decoding pixels.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DecodeFailure`] if the format is unknown or the
    /// header is unreadable.
    pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AppError::decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| AppError::decode(e.to_string()))
    }

    /// Draws `crop` from the encoded `source` onto the export canvas and
    /// returns it as PNG bytes.
    ///
    /// # Errors
    ///
    /// - [`AppError::DecodeFailure`] if `source` cannot be decoded
    /// - [`AppError::EmptySelection`] if `crop` has no positive area
    /// - [`AppError::RenderingUnavailable`] if the canvas cannot be encoded
    pub fn resample(source: &[u8], crop: CropRect) -> Result<Vec<u8>> {
        let image = Self::decode(source)?;
        let canvas = Self::resample_image(&image, crop)?;
        Self::encode_png(&canvas)
    }

    /// Same as [`ImageProcessor::resample`] on an already decoded image,
    /// without the PNG step.
    pub fn resample_image(image: &DynamicImage, crop: CropRect) -> Result<RgbaImage> {
        if !crop.is_valid() {
            return Err(AppError::EmptySelection);
        }

        debug!(
            source_width = image.width(),
            source_height = image.height(),
            ?crop,
            "resampling crop onto export canvas"
        );

        let (source, crop) = prefilter(image, crop);
        let scale_x = crop.width / EXPORT_WIDTH as f32;
        let scale_y = crop.height / EXPORT_HEIGHT as f32;

        Ok(RgbaImage::from_fn(EXPORT_WIDTH, EXPORT_HEIGHT, |tx, ty| {
            let sx = crop.x + (tx as f32 + 0.5) * scale_x;
            let sy = crop.y + (ty as f32 + 0.5) * scale_y;
            sample(&source, sx, sy)
        }))
    }

    /// Encodes an RGBA buffer as PNG.
    pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        canvas
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| AppError::rendering(format!("Failed to encode PNG: {}", e)))?;

        Ok(buffer)
    }
}

/// Shrinks the source when the crop is larger than the canvas, so that
/// bilinear sampling does not skip source pixels. The crop is rescaled into
/// the reduced image.
fn prefilter(image: &DynamicImage, crop: CropRect) -> (RgbaImage, CropRect) {
    let factor = (crop.width / EXPORT_WIDTH as f32).max(crop.height / EXPORT_HEIGHT as f32);
    let source = image.to_rgba8();
    if factor <= 1.0 || source.width() == 0 || source.height() == 0 {
        return (source, crop);
    }

    let width = ((source.width() as f32 / factor).round() as u32).max(1);
    let height = ((source.height() as f32 / factor).round() as u32).max(1);
    let reduced = imageops::resize(&source, width, height, FilterType::Triangle);

    let fx = width as f32 / source.width() as f32;
    let fy = height as f32 / source.height() as f32;
    let crop = CropRect::new(crop.x * fx, crop.y * fy, crop.width * fx, crop.height * fy);
    (reduced, crop)
}

/// Samples `source` at the continuous point `(x, y)`, where pixel `(i, j)`
/// covers `[i, i + 1) × [j, j + 1)`.
///
/// Points outside the image are transparent. Inside, the sample position is
/// clamped to the outermost pixel centres so the border does not bleed
/// transparency.
fn sample(source: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = source.dimensions();
    if x < 0.0 || y < 0.0 || x >= w as f32 || y >= h as f32 {
        return TRANSPARENT;
    }

    let cx = (x - 0.5).clamp(0.0, (w - 1) as f32);
    let cy = (y - 0.5).clamp(0.0, (h - 1) as f32);
    imageops::interpolate_bilinear(source, cx, cy).unwrap_or(TRANSPARENT)
}
