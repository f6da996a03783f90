//! Image persistence policy (§4.4 step 3): choose the on-disk format and
//! extension for each extracted image, falling back through several decode
//! strategies before giving up.

use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, Rgb, Rgba};
use tracing::warn;

use super::extractor::ImageRecord;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Writes `record`'s bytes under `images_dir/<image_id>.<ext>` per the
/// format-detection policy, returning the path relative to the task
/// directory (e.g. `images/p3-i2.png`), or `None` if every strategy failed
/// (a warning is logged; the image is dropped, not an error).
pub async fn persist_image(
    record: &ImageRecord,
    images_dir: &Path,
    task_relative_images_dir: &str,
) -> Option<String> {
    let (ext, bytes) = encode_for_disk(record)?;
    let filename = format!("{}.{}", record.image_id, ext);
    let path = images_dir.join(&filename);

    if let Err(err) = tokio::fs::write(&path, &bytes).await {
        warn!(image_id = %record.image_id, error = %err, "failed to write extracted image");
        return None;
    }

    Some(format!("{task_relative_images_dir}/{filename}"))
}

/// Determines the extension and final bytes to write, per §4.4 step 3.
fn encode_for_disk(record: &ImageRecord) -> Option<(&'static str, Vec<u8>)> {
    let bytes = &record.raw_bytes;

    if bytes.starts_with(JPEG_MAGIC) {
        return Some(("jpeg", bytes.clone()));
    }
    if bytes.starts_with(PNG_MAGIC) {
        return Some(("png", bytes.clone()));
    }

    if let Ok(decoded) = image::load_from_memory(bytes) {
        return encode_png(decoded);
    }

    if let (Some(width), Some(height)) = (record.width, record.height) {
        if let Some(decoded) = decode_raw_pixels(bytes, width, height) {
            return encode_png(decoded);
        }
    }

    warn!(image_id = %record.image_id, "could not decode image by any known strategy, dropping");
    None
}

/// Re-encodes a decoded image as PNG, converting CMYK/anything non-RGB(A)
/// to RGB first.
fn encode_png(image: DynamicImage) -> Option<(&'static str, Vec<u8>)> {
    let rgba = image.to_rgba8();
    let mut buffer = std::io::Cursor::new(Vec::new());
    rgba.write_to(&mut buffer, image::ImageFormat::Png).ok()?;
    Some(("png", buffer.into_inner()))
}

/// Attempts to interpret `bytes` as packed pixels, in the order RGB, L
/// (grayscale), RGBA — accepting the first mode whose byte count matches
/// `width * height * bpp`.
fn decode_raw_pixels(bytes: &[u8], width: u32, height: u32) -> Option<DynamicImage> {
    let pixel_count = (width as usize) * (height as usize);

    if bytes.len() == pixel_count * 3 {
        let buffer: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(width, height, bytes.to_vec())?;
        return Some(DynamicImage::ImageRgb8(buffer));
    }
    if bytes.len() == pixel_count {
        let buffer: ImageBuffer<Luma<u8>, _> = ImageBuffer::from_raw(width, height, bytes.to_vec())?;
        return Some(DynamicImage::ImageLuma8(buffer));
    }
    if bytes.len() == pixel_count * 4 {
        let buffer: ImageBuffer<Rgba<u8>, _> = ImageBuffer::from_raw(width, height, bytes.to_vec())?;
        return Some(DynamicImage::ImageRgba8(buffer));
    }

    None
}

/// Returns the image's dimensions after any decode, for tests that need to
/// confirm re-encoding preserved geometry.
#[must_use]
pub fn dimensions_of(bytes: &[u8]) -> Option<(u32, u32)> {
    image::load_from_memory(bytes).ok().map(|img| img.dimensions())
}
