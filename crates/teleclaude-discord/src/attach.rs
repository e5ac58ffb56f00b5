//! Attachment classification and download — feeds raw bytes into
//! `InboundEvent::Voice`/`InboundEvent::File`.

use serenity::model::channel::Attachment;

pub enum AttachmentKind {
    Voice,
    File,
}

/// Classify a Discord attachment by its content type and filename. Voice
/// messages are always OGG in Discord's own voice-message feature.
pub fn classify(attachment: &Attachment) -> AttachmentKind {
    let ct = attachment.content_type.as_deref().unwrap_or("");
    if ct == "audio/ogg" && attachment.filename.ends_with(".ogg") {
        AttachmentKind::Voice
    } else {
        AttachmentKind::File
    }
}

pub async fn download_bytes(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let resp = reqwest::get(url).await?;
    resp.bytes().await.map(|b| b.to_vec())
}
