//! Turn processing: one inbound message in, one reply (plus files) out.
//!
//! `TurnProcessor::process` runs the whole turn against a locked transcript:
//! persona entry → attachments → user entry → trim → model query with tools →
//! tool execution, trim and a tool-free follow-up query (when the model asked
//! for tools) → assistant entry → trim.

use std::borrow::Cow;
use std::sync::Arc;

use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use alexbot_core::{BotConfig, ConversationKey};

use crate::artifact::{Artifact, ArtifactStore};
use crate::chunk::{split_segments, DISCORD_MESSAGE_LIMIT};
use crate::error::TurnError;
use crate::ingest::{self, AttachmentKind, AttachmentSource, InboundAttachment};
use crate::provider::{
    ChatRequest, ChatResponse, LlmProvider, MediaProvider, ProviderError, ToolDefinition,
};
use crate::session::{Session, SessionRegistry};
use crate::tools::{self, ToolError, ToolExecutor, ToolInvocation};
use crate::transcript::Transcript;

/// One user message as seen by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct InboundTurn {
    /// Display name of the author, used in the persona entry.
    pub author: String,
    pub text: String,
    pub attachments: Vec<InboundAttachment>,
}

impl InboundTurn {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<InboundAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Result of a completed turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// Files produced by tool calls, in call order.
    pub artifacts: Vec<Artifact>,
    /// Tool calls that could not be parsed or executed. The turn still completed.
    pub tool_failures: Vec<ToolError>,
}

impl TurnOutcome {
    /// The reply cut into Discord-sized messages.
    pub fn segments(&self) -> Vec<String> {
        split_segments(&self.reply, DISCORD_MESSAGE_LIMIT)
    }
}

/// Static per-process turn settings.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub system_message: String,
    pub chat_model: String,
    pub vision_model: String,
    pub max_tokens: u32,
    pub max_history: usize,
}

impl TurnSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            system_message: config.bot.system_message.clone(),
            chat_model: config.openai.chat_model.clone(),
            vision_model: config.openai.vision_model.clone(),
            max_tokens: config.openai.max_tokens,
            max_history: config.bot.max_history,
        }
    }
}

/// Runs turns. Shared across all conversations via `Arc` in the app state.
pub struct TurnProcessor {
    llm: Arc<dyn LlmProvider>,
    media: Arc<dyn MediaProvider>,
    executor: ToolExecutor,
    settings: TurnSettings,
    chat_model: RwLock<String>,
}

impl TurnProcessor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        media: Arc<dyn MediaProvider>,
        store: ArtifactStore,
        settings: TurnSettings,
    ) -> Self {
        Self {
            executor: ToolExecutor::new(Arc::clone(&media), store),
            chat_model: RwLock::new(settings.chat_model.clone()),
            llm,
            media,
            settings,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    /// Current chat model.
    pub async fn model(&self) -> String {
        self.chat_model.read().await.clone()
    }

    /// Change the chat model at runtime. Returns the previous model.
    pub async fn set_model(&self, model: String) -> String {
        let mut guard = self.chat_model.write().await;
        std::mem::replace(&mut *guard, model)
    }

    /// Run one turn against `transcript`.
    ///
    /// On error the transcript keeps whatever was appended before the failure;
    /// no assistant entry is added.
    pub async fn process(
        &self,
        transcript: &mut Transcript,
        inbound: &InboundTurn,
    ) -> Result<TurnOutcome, TurnError> {
        let max_history = self.settings.max_history;

        transcript.push_system(format!(
            "{}\n\nYou are talking to {}.",
            self.settings.system_message, inbound.author
        ));
        for attachment in &inbound.attachments {
            self.ingest(transcript, attachment).await?;
        }
        transcript.push_user(inbound.text.clone());
        let dropped = transcript.trim(max_history);
        if dropped > 0 {
            debug!(dropped, "transcript trimmed");
        }

        let model = self.model().await;
        let first = self.query(&model, transcript, tools::manifest()).await?;

        let mut artifacts = Vec::new();
        let mut tool_failures = Vec::new();

        let reply = if first.tool_calls.is_empty() {
            first.content
        } else {
            for call in &first.tool_calls {
                let result = match ToolInvocation::parse(call) {
                    Ok(invocation) => self.executor.execute(&invocation).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(artifact) => {
                        transcript.push_system(format!(
                            "The file has been created and is attached to your reply: {}",
                            artifact.file_name()
                        ));
                        artifacts.push(artifact);
                    }
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, kind = %e.kind(), "tool call failed");
                        transcript
                            .push_system(format!("The tool call '{}' failed: {}", call.name, e));
                        tool_failures.push(e);
                    }
                }
            }
            transcript.trim(max_history);
            self.query(&model, transcript, Vec::new()).await?.content
        };

        transcript.push_assistant(reply.clone());
        transcript.trim(max_history);

        Ok(TurnOutcome {
            reply,
            artifacts,
            tool_failures,
        })
    }

    async fn query(
        &self,
        model: &str,
        transcript: &Transcript,
        tools: Vec<ToolDefinition>,
    ) -> Result<ChatResponse, ProviderError> {
        let req = ChatRequest {
            model: model.to_string(),
            messages: transcript.entries().to_vec(),
            max_tokens: self.settings.max_tokens,
            tools,
        };
        let resp = self.llm.send(&req).await?;
        info!(
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            tool_calls = resp.tool_calls.len(),
            stop_reason = %resp.stop_reason,
            "chat complete"
        );
        Ok(resp)
    }

    async fn ingest(
        &self,
        transcript: &mut Transcript,
        attachment: &InboundAttachment,
    ) -> Result<(), TurnError> {
        let filename = &attachment.filename;
        let wrap = |source: ProviderError| TurnError::Attachment {
            filename: filename.clone(),
            source,
        };

        match attachment.kind() {
            AttachmentKind::Text => {
                let bytes: Cow<'_, [u8]> = match &attachment.source {
                    AttachmentSource::Bytes(b) => Cow::Borrowed(b.as_slice()),
                    AttachmentSource::Url(url) => {
                        Cow::Owned(self.media.download(url).await.map_err(wrap)?)
                    }
                };
                debug!(file = %filename, bytes = bytes.len(), "text attachment ingested");
                transcript.push(ingest::text_entry(filename, &bytes));
            }
            AttachmentKind::Image => {
                let req = ingest::vision_request(
                    &self.settings.vision_model,
                    ingest::image_url(attachment),
                    self.settings.max_tokens,
                );
                let resp = self.llm.send(&req).await.map_err(wrap)?;
                debug!(file = %filename, "image attachment described");
                transcript.push(ingest::image_entry(filename, &resp.content));
            }
            AttachmentKind::Unsupported => {
                debug!(file = %filename, "unsupported attachment skipped");
            }
        }
        Ok(())
    }
}

/// A conversation's transcript, locked for one turn.
///
/// Taking the lease fixes the turn's place in the conversation: leases of the
/// same key are granted in the order they were requested, so an adapter can
/// take one as soon as a message arrives and prepare its attachments
/// afterwards without letting a later message overtake it.
pub struct TurnLease {
    key: ConversationKey,
    // Keeps the session registered (and safe from eviction) while the turn runs.
    _session: Arc<Session>,
    transcript: OwnedMutexGuard<Transcript>,
}

impl TurnLease {
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Run the turn against the leased transcript, releasing it afterwards.
    pub async fn run(
        mut self,
        processor: &TurnProcessor,
        inbound: &InboundTurn,
    ) -> Result<TurnOutcome, TurnError> {
        info!(
            session = %self.key,
            author = %inbound.author,
            attachments = inbound.attachments.len(),
            "processing turn"
        );
        let outcome = processor.process(&mut self.transcript, inbound).await?;
        info!(
            session = %self.key,
            reply_chars = outcome.reply.chars().count(),
            artifacts = outcome.artifacts.len(),
            tool_failures = outcome.tool_failures.len(),
            "turn complete"
        );
        Ok(outcome)
    }
}

/// Wait for the conversation identified by `key` and lease its transcript.
pub async fn begin_turn(sessions: &SessionRegistry, key: &ConversationKey) -> TurnLease {
    let session = sessions.get_or_create(key);
    let transcript = session.lock_owned().await;
    TurnLease {
        key: key.clone(),
        _session: session,
        transcript,
    }
}

/// Run one turn in the conversation identified by `key`.
///
/// Turns of the same conversation are serialized by the session lock.
pub async fn handle_turn(
    sessions: &SessionRegistry,
    key: &ConversationKey,
    processor: &TurnProcessor,
    inbound: &InboundTurn,
) -> Result<TurnOutcome, TurnError> {
    begin_turn(sessions, key).await.run(processor, inbound).await
}
