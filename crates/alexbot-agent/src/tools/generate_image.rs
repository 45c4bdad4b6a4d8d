//! Tool: generate_image — render an image from a prompt and save it as PNG.

use base64::Engine as _;
use serde::Deserialize;

use crate::artifact::{Artifact, ArtifactKind, ArtifactStore};
use crate::provider::{
    GeneratedImage, ImageQuality, ImageRequest, ImageStyle, MediaProvider, ToolDefinition,
};

use super::ToolError;

pub const NAME: &str = "generate_image";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageArgs {
    pub prompt: String,
    #[serde(default)]
    pub style: ImageStyle,
    #[serde(default)]
    pub quality: ImageQuality,
}

impl ImageArgs {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        Ok(())
    }
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_string(),
        description: "Generate an image from a text description. The image is saved \
                      and attached to your reply."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Detailed description of the image to generate."
                },
                "style": {
                    "type": "string",
                    "enum": ["vivid", "natural"],
                    "description": "Vivid leans hyper-real and dramatic; natural is more subdued. Defaults to vivid."
                },
                "quality": {
                    "type": "string",
                    "enum": ["standard", "hd"],
                    "description": "Rendering quality. Defaults to standard."
                }
            },
            "required": ["prompt"]
        }),
    }
}

pub(crate) async fn run(
    args: &ImageArgs,
    media: &dyn MediaProvider,
    store: &ArtifactStore,
) -> Result<Artifact, ToolError> {
    let image = media
        .generate_image(&ImageRequest {
            prompt: args.prompt.clone(),
            style: args.style,
            quality: args.quality,
        })
        .await?;

    let bytes = match image {
        GeneratedImage::Url(url) => media.download(&url).await?,
        GeneratedImage::Base64(data) => base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| ToolError::Decode(e.to_string()))?,
    };

    Ok(store.write(ArtifactKind::Image, "png", &bytes).await?)
}
