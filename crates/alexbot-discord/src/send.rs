//! Reply emission: sequential segments, generated files on the first one.

use std::path::PathBuf;

use serenity::builder::{CreateAttachment, CreateMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};
use tracing::{debug, warn};

use alexbot_agent::chunk::{split_segments, DISCORD_MESSAGE_LIMIT};

use crate::error::{is_permission_error, DiscordError};

/// Build the messages to send: one per segment, files on the first.
///
/// With no text but some files, a single files-only message is produced.
/// Returns `(content, attach_files)` pairs in send order.
pub fn plan_messages(segments: &[String], has_files: bool) -> Vec<(Option<&str>, bool)> {
    if segments.is_empty() {
        return if has_files {
            vec![(None, true)]
        } else {
            Vec::new()
        };
    }
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| (Some(s.as_str()), i == 0 && has_files))
        .collect()
}

/// Send `segments` (and `files`) to `channel_id`, the first message replying
/// to `reply_to`.
///
/// A permission failure is logged and swallowed: the turn counts as complete.
pub async fn deliver(
    http: &Http,
    channel_id: ChannelId,
    reply_to: Option<MessageId>,
    segments: &[String],
    files: &[PathBuf],
) -> Result<(), DiscordError> {
    match deliver_inner(http, channel_id, reply_to, segments, files).await {
        Err(DiscordError::Serenity(e)) if is_permission_error(&e) => {
            warn!(channel = %channel_id, error = %e, "missing permission to send reply");
            Ok(())
        }
        other => other,
    }
}

async fn deliver_inner(
    http: &Http,
    channel_id: ChannelId,
    reply_to: Option<MessageId>,
    segments: &[String],
    files: &[PathBuf],
) -> Result<(), DiscordError> {
    let plan = plan_messages(segments, !files.is_empty());
    if plan.is_empty() {
        debug!(channel = %channel_id, "empty reply, nothing to send");
        return Ok(());
    }

    for (i, (content, with_files)) in plan.into_iter().enumerate() {
        let mut msg = CreateMessage::new();
        if let Some(text) = content {
            msg = msg.content(text);
        }
        if with_files {
            for path in files {
                msg = msg.add_file(CreateAttachment::path(path).await?);
            }
        }
        if i == 0 {
            if let Some(id) = reply_to {
                msg = msg.reference_message((channel_id, id));
            }
        }
        channel_id.send_message(http, msg).await?;
    }
    Ok(())
}

/// Send plain `text` (command output, error notices) in limit-sized pieces.
pub async fn send_text(
    http: &Http,
    channel_id: ChannelId,
    reply_to: Option<MessageId>,
    text: &str,
) -> Result<(), DiscordError> {
    let segments = split_segments(text, DISCORD_MESSAGE_LIMIT);
    deliver(http, channel_id, reply_to, &segments, &[]).await
}
