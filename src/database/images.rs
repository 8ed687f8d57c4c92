use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use potion::Error;

use super::error::{QueryError, ValidationError};
use crate::constants::{IMAGE_DIR, IMAGE_EXTENSIONS};

/// Image decoded from a `data:image/<ext>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl TryFrom<&str> for DecodedImage {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = || ValidationError::new("image", "Upload a valid base64-encoded image.");

        let (header, payload) = value.split_once(";base64,").ok_or_else(invalid)?;
        let mime = header.strip_prefix("data:image/").ok_or_else(invalid)?;

        let extension = IMAGE_EXTENSIONS
            .iter()
            .find_map(|(m, ext)| (m.eq_ignore_ascii_case(mime)).then_some(*ext))
            .ok_or_else(|| {
                ValidationError::new("image", format!("Unsupported image type \"{mime}\"."))
            })?;

        let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
        if bytes.is_empty() {
            return Err(invalid());
        }

        Ok(Self { extension, bytes })
    }
}

/// Writes the image under `media_root` and returns its path relative to it.
pub async fn store_image(media_root: &str, image: &DecodedImage) -> Result<String, Error> {
    let relative = format!(
        "{IMAGE_DIR}/{}.{}",
        uuid::Uuid::new_v4().simple(),
        image.extension
    );
    let path: PathBuf = Path::new(media_root).join(&relative);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| QueryError::new(format!("Failed to create media dir: {e}")))?;
    }

    tokio::fs::write(&path, &image.bytes)
        .await
        .map_err(|e| QueryError::new(format!("Failed to write image: {e}")))?;

    log::debug!("Stored image {}", path.display());

    Ok(relative)
}

/// Best-effort removal of a previously stored image.
pub async fn remove_image(media_root: &str, relative: &str) {
    if relative.is_empty() {
        return;
    }

    let path = Path::new(media_root).join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        log::warn!("Failed to remove image {}: {e}", path.display());
    }
}

pub fn image_url(media_url: &str, relative: &str) -> String {
    format!("{media_url}{relative}")
}
