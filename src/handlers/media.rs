use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::debug;

use crate::flow::{PhotoRef, PhotoSource};
use crate::llm::media::{download_media, resolve_image_mime};
use crate::llm::ImagePayload;

pub fn file_download_url(bot_token: &str, file_path: &str) -> String {
    format!("https://api.telegram.org/file/bot{bot_token}/{file_path}")
}

/// Picks the photo to store from an incoming message: the largest size of
/// a compressed photo, or a document sent with an image mime type.
pub fn photo_from_message(message: &Message) -> Option<PhotoRef> {
    if let Some(sizes) = message.photo() {
        let largest = sizes.iter().max_by_key(|size| size.width * size.height)?;
        return Some(PhotoRef {
            file_id: largest.file.id.0.clone(),
            unique_id: largest.file.unique_id.0.clone(),
        });
    }

    let document = message.document()?;
    let is_image = document
        .mime_type
        .as_ref()
        .is_some_and(|mime| mime.essence_str().starts_with("image/"));
    is_image.then(|| PhotoRef {
        file_id: document.file.id.0.clone(),
        unique_id: document.file.unique_id.0.clone(),
    })
}

/// Downloads stored photos through the Bot API file endpoint.
#[derive(Clone)]
pub struct TelegramPhotoSource {
    bot: Bot,
    bot_token: String,
}

impl TelegramPhotoSource {
    pub fn new(bot: Bot, bot_token: &str) -> Self {
        Self {
            bot,
            bot_token: bot_token.to_string(),
        }
    }
}

impl PhotoSource for TelegramPhotoSource {
    async fn fetch(&self, photo: &PhotoRef) -> Result<ImagePayload> {
        let file = self.bot.get_file(FileId(photo.file_id.clone())).await?;
        let url = file_download_url(&self.bot_token, &file.path);
        let bytes = download_media(&url).await?;
        let mime_type = resolve_image_mime(&file.path, &bytes);
        debug!(
            "Fetched photo {} ({} bytes, {mime_type})",
            photo.unique_id,
            bytes.len()
        );
        Ok(ImagePayload::new(bytes, mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_url_embeds_token_and_path() {
        assert_eq!(
            file_download_url("123:abc", "photos/file_7.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_7.jpg"
        );
    }
}
