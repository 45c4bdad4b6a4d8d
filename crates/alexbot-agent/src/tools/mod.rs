//! Tool system for model tool calling.
//!
//! The set of tools is closed: every call the model makes is parsed into a
//! [`ToolInvocation`] with typed arguments before anything runs. Unknown names
//! and malformed arguments are errors, never silently dropped.

pub mod create_text_file;
pub mod generate_image;
pub mod text_to_speech;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::artifact::{Artifact, ArtifactStore};
use crate::provider::{MediaProvider, ProviderError, ToolCall, ToolDefinition};

pub use create_text_file::TextFileArgs;
pub use generate_image::ImageArgs;
pub use text_to_speech::SpeechArgs;

/// A validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    GenerateImage(ImageArgs),
    CreateTextFile(TextFileArgs),
    TextToSpeech(SpeechArgs),
}

impl ToolInvocation {
    /// Resolve a raw model tool call into a typed invocation.
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        match call.name.as_str() {
            generate_image::NAME => {
                let args: ImageArgs = decode(generate_image::NAME, &call.input)?;
                args.validate()
                    .map_err(|reason| invalid(generate_image::NAME, reason))?;
                Ok(Self::GenerateImage(args))
            }
            create_text_file::NAME => {
                let args: TextFileArgs = decode(create_text_file::NAME, &call.input)?;
                Ok(Self::CreateTextFile(args))
            }
            text_to_speech::NAME => {
                let args: SpeechArgs = decode(text_to_speech::NAME, &call.input)?;
                args.validate()
                    .map_err(|reason| invalid(text_to_speech::NAME, reason))?;
                Ok(Self::TextToSpeech(args))
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateImage(_) => generate_image::NAME,
            Self::CreateTextFile(_) => create_text_file::NAME,
            Self::TextToSpeech(_) => text_to_speech::NAME,
        }
    }
}

/// Definitions of every tool offered to the model.
pub fn manifest() -> Vec<ToolDefinition> {
    vec![
        generate_image::definition(),
        create_text_file::definition(),
        text_to_speech::definition(),
    ]
}

fn decode<T: DeserializeOwned>(tool: &str, input: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone()).map_err(|e| invalid(tool, e.to_string()))
}

fn invalid(tool: &str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("could not decode generated content: {0}")]
    Decode(String),

    #[error("could not write output file: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs invocations against the media endpoints and stores the results.
pub struct ToolExecutor {
    media: Arc<dyn MediaProvider>,
    store: ArtifactStore,
}

impl ToolExecutor {
    pub fn new(media: Arc<dyn MediaProvider>, store: ArtifactStore) -> Self {
        Self { media, store }
    }

    pub async fn execute(&self, invocation: &ToolInvocation) -> Result<Artifact, ToolError> {
        info!(tool = invocation.name(), "executing tool");
        let artifact = match invocation {
            ToolInvocation::GenerateImage(args) => {
                generate_image::run(args, self.media.as_ref(), &self.store).await?
            }
            ToolInvocation::CreateTextFile(args) => create_text_file::run(args, &self.store).await?,
            ToolInvocation::TextToSpeech(args) => {
                text_to_speech::run(args, self.media.as_ref(), &self.store).await?
            }
        };
        info!(tool = invocation.name(), file = %artifact.file_name(), "tool produced file");
        Ok(artifact)
    }
}
