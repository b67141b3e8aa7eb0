use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

use crate::utils::http::get_http_client;
use crate::utils::text::truncate_for_log;

const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

/// One image ready to be embedded into a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .filter(|mime| mime.starts_with("image/"))
}

fn mime_from_path(path: &str) -> Option<&'static str> {
    let extension = path.rsplit_once('.')?.1.to_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// The platform's path hint decides png vs. jpeg; byte sniffing covers
/// paths without a usable extension.
pub fn resolve_image_mime(path_hint: &str, data: &[u8]) -> String {
    mime_from_path(path_hint)
        .map(str::to_string)
        .or_else(|| detect_mime_type(data))
        .unwrap_or_else(|| "image/jpeg".to_string())
}

/// Single download attempt; any failure is returned to the caller.
pub async fn download_media(url: &str) -> Result<Vec<u8>> {
    let response = get_http_client().get(url).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            "Media download failed with status {}: {}",
            status,
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return Err(anyhow!("media download failed with status {status}"));
    }

    Ok(response.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn path_extension_wins() {
        assert_eq!(resolve_image_mime("photos/file_1.PNG", b"anything"), "image/png");
        assert_eq!(resolve_image_mime("photos/file_2.jpg", &PNG_HEADER), "image/jpeg");
    }

    #[test]
    fn sniffs_bytes_without_extension() {
        assert_eq!(resolve_image_mime("photos/file_3", &PNG_HEADER), "image/png");
        assert_eq!(resolve_image_mime("", b"not an image"), "image/jpeg");
    }

    #[test]
    fn data_url_is_base64() {
        let image = ImagePayload::new(b"abc".to_vec(), "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,YWJj");
    }
}
