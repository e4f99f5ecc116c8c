//! Upload preparation: downscale oversized captures before they are sent
//! for analysis.

use std::borrow::Cow;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use inspecta_core::photo::PhotoFile;

/// Longest side, in pixels, of an uploaded photo.
pub const MAX_UPLOAD_SIDE: u32 = 1400;
/// JPEG quality used when re-encoding a downscaled photo.
pub const UPLOAD_JPEG_QUALITY: u8 = 85;

/// Downscale `file` so its longest side is at most [`MAX_UPLOAD_SIDE`].
///
/// Re-encodes as JPEG and renames `name.ext` to `name_opt.jpg`. Files
/// that are already small enough, are not images, or cannot be decoded
/// are returned unchanged.
pub fn optimize_photo(file: &PhotoFile) -> Cow<'_, PhotoFile> {
    if !file.content_type.starts_with("image/") {
        return Cow::Borrowed(file);
    }
    let img = match image::load_from_memory(&file.bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(file = %file.file_name, error = %e, "Photo not decodable; uploading as is");
            return Cow::Borrowed(file);
        }
    };

    let (width, height) = (img.width(), img.height());
    let longest = width.max(height);
    if longest <= MAX_UPLOAD_SIDE {
        return Cow::Borrowed(file);
    }

    let scale = f64::from(MAX_UPLOAD_SIDE) / f64::from(longest);
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);
    let resized = img.resize_exact(new_width, new_height, FilterType::Triangle);

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, UPLOAD_JPEG_QUALITY);
    if let Err(e) = DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder) {
        tracing::warn!(file = %file.file_name, error = %e, "Photo re-encode failed; uploading original");
        return Cow::Borrowed(file);
    }

    tracing::debug!(
        file = %file.file_name,
        from = format!("{width}x{height}"),
        to = format!("{new_width}x{new_height}"),
        bytes = bytes.len(),
        "Photo downscaled for upload",
    );

    Cow::Owned(PhotoFile::new(optimized_name(&file.file_name), "image/jpeg", bytes))
}

fn optimized_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    let stem = [".jpeg", ".jpg", ".png"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(file_name, |ext| &file_name[..file_name.len() - ext.len()]);
    format!("{stem}_opt.jpg")
}
