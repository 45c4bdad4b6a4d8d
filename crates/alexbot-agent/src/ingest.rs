//! Attachment ingestion: user uploads become transcript context.
//!
//! Text and source files are inlined as a system entry. Images are described
//! by a separate vision query and only the description enters the
//! transcript. Everything else is skipped.

use std::path::Path;

use base64::Engine as _;

use crate::provider::{ChatRequest, Content, ContentPart, ImageUrl, Message};

pub const VISION_PROMPT: &str = "Describe this image in detail.";

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rs", "py", "js", "ts", "json", "toml", "yaml", "yml", "xml", "html", "css",
    "csv", "log", "sh", "bash", "cfg", "ini", "conf", "go", "java", "c", "cpp", "h", "hpp", "rb",
    "sql", "env", "kt", "swift", "php", "lua",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Text,
    Image,
    Unsupported,
}

/// Where the attachment's content can be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Bytes(Vec<u8>),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAttachment {
    pub filename: String,
    pub source: AttachmentSource,
}

impl InboundAttachment {
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            source: AttachmentSource::Bytes(bytes),
        }
    }

    pub fn from_url(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source: AttachmentSource::Url(url.into()),
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        classify(&self.filename)
    }
}

/// Classify a filename by its extension, case-insensitively.
pub fn classify(filename: &str) -> AttachmentKind {
    let ext = match extension(filename) {
        Some(ext) => ext,
        None => return AttachmentKind::Unsupported,
    };
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        AttachmentKind::Text
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        AttachmentKind::Image
    } else {
        AttachmentKind::Unsupported
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// System entry carrying the decoded contents of a text attachment.
pub fn text_entry(filename: &str, bytes: &[u8]) -> Message {
    let contents = String::from_utf8_lossy(bytes);
    Message::system(format!(
        "The user attached the file '{filename}':\n{contents}"
    ))
}

/// System entry carrying the vision model's description of an image.
pub fn image_entry(filename: &str, description: &str) -> Message {
    Message::system(format!(
        "The user attached the image '{filename}'. Description: {description}"
    ))
}

/// URL handed to the vision model: the original URL, or a data URL for
/// inline bytes.
pub fn image_url(attachment: &InboundAttachment) -> String {
    match &attachment.source {
        AttachmentSource::Url(url) => url.clone(),
        AttachmentSource::Bytes(bytes) => {
            let mime = match extension(&attachment.filename).as_deref() {
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("gif") => "image/gif",
                Some("webp") => "image/webp",
                _ => "image/png",
            };
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            format!("data:{mime};base64,{encoded}")
        }
    }
}

/// Standalone vision query for one image; the persistent transcript is not sent.
pub fn vision_request(model: &str, url: String, max_tokens: u32) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![Message::user(Content::Parts(vec![
            ContentPart::Text {
                text: VISION_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
        ]))],
        max_tokens,
        tools: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify("notes.TXT"), AttachmentKind::Text);
        assert_eq!(classify("main.rs"), AttachmentKind::Text);
        assert_eq!(classify("settings.env"), AttachmentKind::Text);
        assert_eq!(classify("cat.JPeG"), AttachmentKind::Image);
        assert_eq!(classify("anim.webp"), AttachmentKind::Image);
        assert_eq!(classify("archive.zip"), AttachmentKind::Unsupported);
        assert_eq!(classify("README"), AttachmentKind::Unsupported);
    }

    #[test]
    fn text_entry_inlines_contents() {
        let entry = text_entry("notes.txt", b"line one\nline two");
        assert_eq!(entry.role, Role::System);
        assert_eq!(
            entry.content.as_text(),
            "The user attached the file 'notes.txt':\nline one\nline two"
        );
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let entry = text_entry("bad.txt", &[b'o', b'k', 0xff]);
        assert!(entry.content.as_text().ends_with("ok\u{fffd}"));
    }

    #[test]
    fn image_entry_format() {
        let entry = image_entry("cat.png", "A grey cat on a sofa.");
        assert_eq!(
            entry.content.as_text(),
            "The user attached the image 'cat.png'. Description: A grey cat on a sofa."
        );
    }

    #[test]
    fn inline_image_becomes_data_url() {
        let att = InboundAttachment::from_bytes("photo.jpg", vec![1, 2, 3]);
        assert_eq!(image_url(&att), "data:image/jpeg;base64,AQID");

        let att = InboundAttachment::from_url("photo.jpg", "https://cdn.example/p.jpg");
        assert_eq!(image_url(&att), "https://cdn.example/p.jpg");
    }

    #[test]
    fn vision_request_has_prompt_and_image() {
        let req = vision_request("gpt-4o", "https://cdn.example/p.png".into(), 300);
        assert!(req.tools.is_empty());
        assert_eq!(req.messages.len(), 1);
        let json = serde_json::to_value(&req.messages[0]).unwrap();
        assert_eq!(json["content"][0]["text"], VISION_PROMPT);
        assert_eq!(json["content"][1]["image_url"]["url"], "https://cdn.example/p.png");
    }
}
