use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use bytes::Bytes;
use image::{imageops::FilterType, ImageFormat};
use uuid::Uuid;

use crate::error::DomainError;

/// Profile photos are scaled down to fit this square.
pub const PROFILE_PHOTO_MAX: u32 = 300;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// An image pulled out of a multipart body, plus its other text fields.
pub struct UploadedImage {
    pub bytes: Bytes,
    pub ext: &'static str,
    pub fields: Vec<(String, String)>,
}

impl UploadedImage {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub fn detect_image_ext(content_type: &str, filename: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => return Some("png"),
        "image/jpeg" | "image/jpg" => return Some("jpg"),
        "image/webp" => return Some("webp"),
        "image/gif" => return Some("gif"),
        _ => {}
    }
    let ext = filename.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        _ => None,
    }
}

fn image_format(ext: &str) -> ImageFormat {
    match ext {
        "png" => ImageFormat::Png,
        "webp" => ImageFormat::WebP,
        "gif" => ImageFormat::Gif,
        _ => ImageFormat::Jpeg,
    }
}

/// Reads the `photo` (or `file`) part of a multipart body.
pub async fn read_image(mut multipart: Multipart) -> anyhow::Result<UploadedImage> {
    let mut image: Option<(Bytes, &'static str)> = None;
    let mut fields = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "photo" | "file" => {
                let ct = field.content_type().unwrap_or("").to_string();
                let fname = field.file_name().unwrap_or("").to_string();
                let ext = detect_image_ext(&ct, &fname).ok_or_else(|| {
                    DomainError::Validation("Unsupported image format. Use PNG, JPG, WebP or GIF.".into())
                })?;
                let data = field.bytes().await?;
                if data.len() > MAX_PHOTO_BYTES {
                    return Err(DomainError::Validation("Image too large (max 5 MB)".into()).into());
                }
                image = Some((data, ext));
            }
            _ => {
                let value = field.text().await?;
                fields.push((name, value));
            }
        }
    }

    let (bytes, ext) = image.ok_or_else(|| DomainError::Validation("No image provided".into()))?;
    Ok(UploadedImage { bytes, ext, fields })
}

/// Scales the image down to fit `max`x`max`, keeping the aspect ratio.
/// Smaller images are re-encoded unchanged in size.
pub fn fit_within(bytes: &Bytes, ext: &str, max: u32) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|_| DomainError::Validation("File is not a readable image".into()))?;
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image_format(ext))?;
    Ok(out)
}

/// Writes the bytes under `media_dir/<subdir>/<uuid>.<ext>` and returns the
/// path relative to `media_dir`.
pub async fn store(media_dir: &str, subdir: &str, ext: &str, data: &[u8]) -> anyhow::Result<String> {
    let dir = PathBuf::from(media_dir).join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let filename = format!("{}.{ext}", Uuid::new_v4());
    tokio::fs::write(dir.join(&filename), data).await?;
    Ok(format!("{subdir}/{filename}"))
}

/// Best-effort removal of a previously stored file.
pub async fn remove(media_dir: &str, relative: &str) {
    let path = Path::new(media_dir).join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, RgbImage};

    fn png(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png).unwrap();
        Bytes::from(out)
    }

    #[test]
    fn detects_extension_from_content_type_or_name() {
        assert_eq!(detect_image_ext("image/png", "x.bin"), Some("png"));
        assert_eq!(detect_image_ext("", "Portrait.JPEG"), Some("jpg"));
        assert_eq!(detect_image_ext("application/pdf", "file.pdf"), None);
    }

    #[test]
    fn large_images_fit_the_profile_square() {
        let out = fit_within(&png(900, 600), "png", PROFILE_PHOTO_MAX).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (300, 200));
    }

    #[test]
    fn small_images_keep_their_size() {
        let out = fit_within(&png(120, 80), "png", PROFILE_PHOTO_MAX).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (120, 80));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(fit_within(&Bytes::from_static(b"not an image"), "png", 300).is_err());
    }
}
