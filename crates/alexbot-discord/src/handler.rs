use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::{Attachment, Message};
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, MessageId, UserId};
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use alexbot_agent::{begin_turn, handle_command, InboundTurn, TurnLease};
use alexbot_core::config::DiscordConfig;
use alexbot_core::{ConversationKey, SessionScope};

use crate::attach::Downloader;
use crate::context::DiscordAppContext;
use crate::{notice, send};

const ATTACHMENT_ONLY_TEXT: &str = "[User sent attachment(s)]";

/// Serenity event handler wired to the turn pipeline.
pub struct DiscordHandler<C: DiscordAppContext + 'static> {
    pub ctx: Arc<C>,
    pub config: DiscordConfig,
    pub scope: SessionScope,
    pub bot_id: OnceLock<UserId>,
    pub downloader: Downloader,
}

#[async_trait]
impl<C: DiscordAppContext + 'static> EventHandler for DiscordHandler<C> {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || self.bot_id.get() == Some(&msg.author.id) {
            return;
        }

        if let Some(guild_id) = msg.guild_id {
            if self.config.server_only && guild_id.get() != self.config.server_id {
                debug!(guild = %guild_id, "message from another server ignored");
                return;
            }
            if self.config.require_mention {
                let Some(bot_id) = self.bot_id.get() else {
                    return;
                };
                if !msg.mentions_user_id(*bot_id) {
                    return;
                }
            }
        }

        let content = strip_mention(&msg.content).trim().to_string();
        let key = ConversationKey::resolve(self.scope, msg.channel_id.get(), msg.author.id.get());

        // Intercept text commands before sending to the model.
        if content.starts_with('/') {
            if let Some(response) = handle_command(&content, self.ctx.as_ref(), &key).await {
                if let Err(e) =
                    send::send_text(&ctx.http, msg.channel_id, Some(msg.id), &response).await
                {
                    warn!(error = %e, session = %key, "Discord command reply failed");
                }
                return;
            }
        }

        // Don't drop messages that have attachments even if text is empty.
        if content.is_empty() && msg.attachments.is_empty() {
            return;
        }

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        let author = msg
            .member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .unwrap_or_else(|| msg.author.display_name().to_string());

        // Claim this message's place in the conversation before any download.
        let lease = begin_turn(self.ctx.sessions(), &key).await;

        let job = TurnJob {
            http: Arc::clone(&ctx.http),
            downloader: self.downloader.clone(),
            channel_id: msg.channel_id,
            reply_to: msg.id,
            author,
            content,
            attachments: msg.attachments.clone(),
            max_attachment_bytes: self.config.max_attachment_bytes,
        };
        let app = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            job.run(app, lease).await;
        });
    }
}

/// Everything a spawned turn needs from the triggering message.
struct TurnJob {
    http: Arc<Http>,
    downloader: Downloader,
    channel_id: ChannelId,
    reply_to: MessageId,
    author: String,
    content: String,
    attachments: Vec<Attachment>,
    max_attachment_bytes: u64,
}

impl TurnJob {
    async fn run<C: DiscordAppContext + 'static>(self, app: Arc<C>, lease: TurnLease) {
        let attachments = self
            .downloader
            .collect(&self.attachments, self.max_attachment_bytes)
            .await;

        let text = if self.content.is_empty() {
            ATTACHMENT_ONLY_TEXT.to_string()
        } else {
            self.content
        };
        let inbound = InboundTurn::new(self.author, text).with_attachments(attachments);
        let key = lease.key().clone();

        let outcome = match lease.run(app.processor(), &inbound).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), session = %key, "turn failed");
                let notice = notice::message_for(e.kind());
                if let Err(e) =
                    send::send_text(&self.http, self.channel_id, Some(self.reply_to), notice).await
                {
                    warn!(error = %e, session = %key, "Discord error notice failed");
                }
                return;
            }
        };

        let files: Vec<_> = outcome.artifacts.iter().map(|a| a.path.clone()).collect();
        if let Err(e) = send::deliver(
            &self.http,
            self.channel_id,
            Some(self.reply_to),
            &outcome.segments(),
            &files,
        )
        .await
        {
            warn!(error = %e, kind = %e.kind(), session = %key, "Discord send failed");
        }
    }
}

/// Remove an @mention prefix (e.g. `<@123456789>`) from a message.
fn strip_mention(s: &str) -> &str {
    let trimmed = s.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}
