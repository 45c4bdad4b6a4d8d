//! Tool: create_text_file — save model-written text as a document.

use serde::Deserialize;

use crate::artifact::{Artifact, ArtifactKind, ArtifactStore};
use crate::provider::ToolDefinition;

use super::ToolError;

pub const NAME: &str = "create_text_file";

const DEFAULT_EXTENSION: &str = "txt";
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextFileArgs {
    pub content: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl TextFileArgs {
    /// Requested extension reduced to lowercase ASCII alphanumerics.
    pub fn file_extension(&self) -> String {
        let ext: String = self
            .extension
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(MAX_EXTENSION_LEN)
            .collect::<String>()
            .to_ascii_lowercase();
        if ext.is_empty() {
            default_extension()
        } else {
            ext
        }
    }
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_string(),
        description: "Create a text or code file with the given content. The file is saved \
                      and attached to your reply."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Full text content of the file."
                },
                "extension": {
                    "type": "string",
                    "description": "File extension without the dot, e.g. \"md\" or \"py\". Defaults to txt."
                }
            },
            "required": ["content"]
        }),
    }
}

pub(crate) async fn run(args: &TextFileArgs, store: &ArtifactStore) -> Result<Artifact, ToolError> {
    let ext = args.file_extension();
    Ok(store
        .write(ArtifactKind::Document, &ext, args.content.as_bytes())
        .await?)
}
