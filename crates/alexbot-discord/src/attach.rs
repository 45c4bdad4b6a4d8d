//! Converts Discord attachments into pipeline inputs.
//!
//! Text files are downloaded here (subject to the size cap). Images are
//! passed on by proxy URL for the vision model to fetch. Anything else is
//! dropped.

use std::time::Duration;

use serenity::model::channel::Attachment;
use tracing::{debug, warn};

use alexbot_agent::ingest::{classify, AttachmentKind, InboundAttachment};

use crate::error::DiscordError;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Download,
    PassUrl,
    TooLarge,
    Skip,
}

/// Decide how to handle an attachment from its name and size alone.
pub fn plan(filename: &str, size: u64, max_bytes: u64) -> Fetch {
    match classify(filename) {
        AttachmentKind::Text if size > max_bytes => Fetch::TooLarge,
        AttachmentKind::Text => Fetch::Download,
        AttachmentKind::Image => Fetch::PassUrl,
        AttachmentKind::Unsupported => Fetch::Skip,
    }
}

/// Fetches attachment bodies from the Discord CDN over one shared client.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Result<Self, DiscordError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DiscordError> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Convert a message's attachments, in order, skipping the ones that cannot be used.
    pub async fn collect(
        &self,
        attachments: &[Attachment],
        max_bytes: u64,
    ) -> Vec<InboundAttachment> {
        let mut out = Vec::with_capacity(attachments.len());

        for att in attachments {
            match plan(&att.filename, u64::from(att.size), max_bytes) {
                Fetch::Download => match self.download(&att.url).await {
                    Ok(bytes) => out.push(InboundAttachment::from_bytes(&att.filename, bytes)),
                    Err(e) => {
                        warn!(
                            filename = %att.filename,
                            error = %e,
                            kind = %e.kind(),
                            "failed to download text file"
                        );
                    }
                },
                Fetch::PassUrl => {
                    out.push(InboundAttachment::from_url(&att.filename, &att.proxy_url));
                }
                Fetch::TooLarge => {
                    warn!(
                        filename = %att.filename,
                        size = att.size,
                        limit = max_bytes,
                        "attachment skipped: exceeds size limit"
                    );
                }
                Fetch::Skip => {
                    debug!(filename = %att.filename, "attachment skipped: unsupported type");
                }
            }
        }

        out
    }
}
