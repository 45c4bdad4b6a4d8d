use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Discord caps a single message at 2000 characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_ENV_VAR: &str = "ALEXBOT_CONFIG";

/// Top-level config (config.toml + ALEXBOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub discord: DiscordConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub bot: BehaviorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Guild the bot is installed in.
    pub server_id: u64,
    /// Bot token.
    pub api_key: String,
    /// When true, guild messages are only processed when the bot is @mentioned.
    #[serde(default)]
    pub require_mention: bool,
    /// When true, guild messages from servers other than `server_id` are ignored.
    #[serde(default)]
    pub server_only: bool,
    /// Text attachments larger than this are not downloaded.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Sent as the `OpenAI-Organization` header when set.
    #[serde(default)]
    pub organization: Option<String>,
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used to describe image attachments.
    #[serde(default = "default_chat_model")]
    pub vision_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Conversation behavior: persona, history window, output files, sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_system_message")]
    pub system_message: String,
    /// Maximum number of transcript entries kept after each trim.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Directory generated images, audio and documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// chrono strftime pattern used for generated file names.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default)]
    pub session_scope: SessionScope,
    /// Conversations untouched for longer than this are evicted.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            system_message: default_system_message(),
            max_history: default_max_history(),
            output_dir: default_output_dir(),
            timestamp_format: default_timestamp_format(),
            session_scope: SessionScope::default(),
            session_idle_secs: default_session_idle_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// How inbound messages are grouped into conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionScope {
    /// One conversation per channel (DMs are their own channel).
    #[default]
    Channel,
    /// One conversation per author, across channels.
    User,
    /// A single process-wide conversation.
    Global,
}

fn default_max_attachment_bytes() -> u64 {
    8 * 1024 * 1024
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_image_model() -> String {
    "dall-e-3".to_string()
}
fn default_speech_model() -> String {
    "tts-1".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_system_message() -> String {
    "You are Alex, a friendly and helpful assistant in a Discord server.".to_string()
}
fn default_max_history() -> usize {
    20
}
fn default_output_dir() -> String {
    "output".to_string()
}
fn default_timestamp_format() -> String {
    "%Y-%m-%d_%H-%M-%S".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}
fn default_max_sessions() -> usize {
    256
}

impl BotConfig {
    /// Load config from a TOML file with ALEXBOT_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `ALEXBOT_CONFIG`, then
    /// `./config.toml`. Nested keys use a double underscore in env vars,
    /// e.g. `ALEXBOT_OPENAI__API_KEY` overrides `openai.api_key`.
    ///
    /// A missing `./config.toml` is tolerated (env vars alone may configure
    /// the bot); a named file that cannot be read is a [`CoreError::Io`].
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let explicit = config_path
            .map(String::from)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let config: BotConfig = Figment::new()
            .merge(Toml::string(&contents))
            .merge(Env::prefixed("ALEXBOT_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(path = %path, "configuration loaded");
        Ok(config)
    }

    /// Reject values the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.discord.api_key.trim().is_empty() {
            return Err(CoreError::Config("discord.api_key is empty".to_string()));
        }
        if self.openai.api_key.trim().is_empty() {
            return Err(CoreError::Config("openai.api_key is empty".to_string()));
        }
        if self.bot.max_history == 0 {
            return Err(CoreError::Config(
                "bot.max_history must be at least 1".to_string(),
            ));
        }
        if self.bot.max_sessions == 0 {
            return Err(CoreError::Config(
                "bot.max_sessions must be at least 1".to_string(),
            ));
        }
        let bad_format = self.bot.timestamp_format.is_empty()
            || StrftimeItems::new(&self.bot.timestamp_format).any(|i| matches!(i, Item::Error));
        if bad_format {
            return Err(CoreError::Config(format!(
                "bot.timestamp_format is not a valid strftime pattern: {:?}",
                self.bot.timestamp_format
            )));
        }
        Ok(())
    }
}
