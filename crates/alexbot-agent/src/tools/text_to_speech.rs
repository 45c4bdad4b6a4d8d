//! Tool: text_to_speech — synthesize spoken audio and save it as MP3.

use serde::Deserialize;

use crate::artifact::{Artifact, ArtifactKind, ArtifactStore};
use crate::provider::{MediaProvider, SpeechRequest, ToolDefinition, Voice};

use super::ToolError;

pub const NAME: &str = "text_to_speech";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeechArgs {
    pub text: String,
    #[serde(default)]
    pub voice: Voice,
}

impl SpeechArgs {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text must not be empty".to_string());
        }
        Ok(())
    }
}

pub(crate) fn definition() -> ToolDefinition {
    let voices: Vec<&str> = Voice::ALL.iter().map(Voice::as_str).collect();
    ToolDefinition {
        name: NAME.to_string(),
        description: "Convert text to spoken audio. The recording is saved and attached \
                      to your reply."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to speak."
                },
                "voice": {
                    "type": "string",
                    "enum": voices,
                    "description": "Voice to use. Defaults to alloy."
                }
            },
            "required": ["text"]
        }),
    }
}

pub(crate) async fn run(
    args: &SpeechArgs,
    media: &dyn MediaProvider,
    store: &ArtifactStore,
) -> Result<Artifact, ToolError> {
    let audio = media
        .synthesize_speech(&SpeechRequest {
            input: args.text.clone(),
            voice: args.voice,
        })
        .await?;
    Ok(store.write(ArtifactKind::Audio, "mp3", &audio).await?)
}
