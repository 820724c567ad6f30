use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{ImageFormat, ImageResult};

pub const THUMBNAIL_SIZE: u32 = 256;

/// URL prefix under which the uploads directory is served.
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Sniff the image type from its leading bytes. Only JPEG and PNG are accepted.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Some(format),
        _ => None,
    }
}

fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        _ => "jpeg",
    }
}

/// Square thumbnail, scaled to cover and center-cropped, re-encoded in the source format.
pub fn thumbnail(bytes: &[u8], format: ImageFormat) -> ImageResult<Vec<u8>> {
    let source = image::load_from_memory_with_format(bytes, format)?;
    let thumb = source.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => thumb.to_rgb8().write_to(&mut out, format)?,
        _ => thumb.write_to(&mut out, format)?,
    }
    Ok(out.into_inner())
}

/// Write an encoded thumbnail under a fresh name and return its public path.
pub fn store(dir: &Path, encoded: &[u8], format: ImageFormat) -> std::io::Result<String> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("{}.{}", uuid::Uuid::now_v7(), extension(format));
    std::fs::write(dir.join(&filename), encoded)?;
    Ok(format!("{PUBLIC_PREFIX}{filename}"))
}

/// Delete the file behind a stored public path. Paths that do not point
/// directly inside the uploads directory are ignored.
pub fn remove(dir: &Path, public_path: &str) -> std::io::Result<()> {
    let Some(filename) = public_path.strip_prefix(PUBLIC_PREFIX) else {
        tracing::warn!("Avatar path {} is outside the uploads prefix", public_path);
        return Ok(());
    };
    if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
        tracing::warn!("Refusing to remove avatar path {}", public_path);
        return Ok(());
    }

    match std::fs::remove_file(dir.join(filename)) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Avatar file {} was already gone", public_path);
            Ok(())
        }
        other => other,
    }
}
