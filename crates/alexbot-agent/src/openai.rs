use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use alexbot_core::config::OpenAiConfig;

use crate::provider::{
    ChatRequest, ChatResponse, GeneratedImage, ImageRequest, LlmProvider, MediaProvider,
    ProviderError, SpeechRequest, ToolCall,
};

/// OpenAI HTTP client covering chat completions, image generation and speech.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    organization: Option<String>,
    base_url: String,
    image_model: String,
    speech_model: String,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            organization: config.organization.clone().filter(|o| !o.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_model: config.image_model.clone(),
            speech_model: config.speech_model.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key);
        if let Some(ref org) = self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = builder.send().await.map_err(map_transport_error)?;
        check_status(resp).await
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);

        debug!(
            model = %req.model,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "sending request to OpenAI"
        );

        let resp = self
            .execute(self.post("/v1/chat/completions").json(&body))
            .await?;

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

#[async_trait]
impl MediaProvider for OpenAiProvider {
    async fn generate_image(&self, req: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let body = serde_json::json!({
            "model": self.image_model,
            "prompt": req.prompt,
            "style": req.style,
            "quality": req.quality,
            "response_format": "url",
            "size": "1024x1024",
            "n": 1,
        });

        debug!(model = %self.image_model, "requesting image generation");

        let resp = self
            .execute(self.post("/v1/images/generations").json(&body))
            .await?;
        let api_resp: ImageResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_image_response(api_resp)
    }

    async fn synthesize_speech(&self, req: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        let body = serde_json::json!({
            "model": self.speech_model,
            "input": req.input,
            "voice": req.voice,
        });

        debug!(model = %self.speech_model, voice = req.voice.as_str(), "requesting speech");

        let resp = self.execute(self.post("/v1/audio/speech").json(&body)).await?;
        let bytes = resp.bytes().await.map_err(map_transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await.map_err(map_transport_error)?;
        Ok(bytes.to_vec())
    }
}

/// Classify transport-level failures (no HTTP status available).
fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::Connection(e.to_string())
    } else {
        ProviderError::Http(e)
    }
}

/// Turn non-2xx responses into typed errors.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status().as_u16();
    if resp.status().is_success() {
        return Ok(resp);
    }

    if status == 429 {
        let retry = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|s| s * 1000) // convert seconds to ms
            .unwrap_or(5000);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry,
        });
    }

    let text = resp.text().await.unwrap_or_default();
    warn!(status, body = %text, "OpenAI API error");
    Err(match status {
        401 | 403 => ProviderError::Unauthorized(text),
        404 => ProviderError::NotFound(text),
        _ => ProviderError::Api {
            status,
            message: text,
        },
    })
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "max_tokens": req.max_tokens,
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
        body["tool_choice"] = serde_json::Value::String("auto".to_string());
    }

    body
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let (message, finish_reason) = match choice {
        Some(c) => (c.message, c.finish_reason),
        None => (ApiMessage::default(), None),
    };

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            input: serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments)),
            name: call.function.name,
        })
        .collect();

    ChatResponse {
        content: message.content.unwrap_or_default(),
        model: resp.model,
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp
            .usage
            .as_ref()
            .map(|u| u.completion_tokens)
            .unwrap_or(0),
        stop_reason: finish_reason.unwrap_or_default(),
        tool_calls,
    }
}

fn parse_image_response(resp: ImageResponse) -> Result<GeneratedImage, ProviderError> {
    let data = resp
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("image response contained no data".to_string()))?;
    match (data.url, data.b64_json) {
        (Some(url), _) => Ok(GeneratedImage::Url(url)),
        (None, Some(b64)) => Ok(GeneratedImage::Base64(b64)),
        (None, None) => Err(ProviderError::Parse(
            "image response had neither url nor b64_json".to_string(),
        )),
    }
}

// OpenAI API response types (private — deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}
