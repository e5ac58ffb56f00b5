//! Inbound media handling for the Telegram adapter.
//!
//! Downloads Telegram media via `get_file` + `download_file` and classifies
//! it as voice or a generic file for `InboundEvent::Voice`/`File`.

use teloxide::net::Download;
use teloxide::prelude::*;
use tracing::warn;

pub enum Media {
    Voice { blob: Vec<u8> },
    File { blob: Vec<u8>, filename: String },
}

/// Extract the first downloadable attachment from a message, if any.
pub async fn extract_media(bot: &Bot, msg: &Message, max_bytes: u64) -> Option<Media> {
    if let Some(voice) = msg.voice() {
        let blob = download(bot, &voice.file.id, voice.file.size as u64, max_bytes).await?;
        return Some(Media::Voice { blob });
    }
    if let Some(photos) = msg.photo() {
        if let Some(photo) = photos.last() {
            let blob = download(bot, &photo.file.id, photo.file.size as u64, max_bytes).await?;
            return Some(Media::File { blob, filename: format!("{}.jpg", photo.file.id) });
        }
    }
    if let Some(doc) = msg.document() {
        let filename = doc.file_name.clone().unwrap_or_else(|| doc.file.id.clone());
        let blob = download(bot, &doc.file.id, doc.file.size as u64, max_bytes).await?;
        return Some(Media::File { blob, filename });
    }
    if let Some(audio) = msg.audio() {
        let filename = audio.file_name.clone().unwrap_or_else(|| format!("{}.mp3", audio.file.id));
        let blob = download(bot, &audio.file.id, audio.file.size as u64, max_bytes).await?;
        return Some(Media::File { blob, filename });
    }
    None
}

async fn download(bot: &Bot, file_id: &str, size: u64, max_bytes: u64) -> Option<Vec<u8>> {
    if size > max_bytes {
        warn!(file_id, size, limit = max_bytes, "Telegram: file exceeds size limit, skipping");
        return None;
    }
    let file = match bot.get_file(file_id).await {
        Ok(f) => f,
        Err(e) => {
            warn!(file_id, error = %e, "Telegram: get_file failed");
            return None;
        }
    };
    let mut buf: Vec<u8> = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut buf).await {
        warn!(file_id, error = %e, "Telegram: download_file failed");
        return None;
    }
    Some(buf)
}
