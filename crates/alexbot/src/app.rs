use std::sync::Arc;

use alexbot_agent::artifact::ArtifactStore;
use alexbot_agent::openai::OpenAiProvider;
use alexbot_agent::pipeline::{TurnContext, TurnProcessor, TurnSettings};
use alexbot_agent::provider::{LlmProvider, MediaProvider};
use alexbot_agent::SessionRegistry;
use alexbot_core::BotConfig;

/// Central shared state, passed as `Arc<AppState>` to the Discord adapter.
pub struct AppState {
    pub config: BotConfig,
    pub processor: TurnProcessor,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: BotConfig, processor: TurnProcessor) -> Self {
        Self {
            sessions: SessionRegistry::from_config(&config.bot),
            config,
            processor,
        }
    }

    /// Wire the OpenAI client into a turn processor according to `config`.
    pub fn from_config(config: BotConfig) -> anyhow::Result<Self> {
        let openai = Arc::new(OpenAiProvider::new(&config.openai)?);
        let llm: Arc<dyn LlmProvider> = openai.clone();
        let media: Arc<dyn MediaProvider> = openai;
        let processor = TurnProcessor::new(
            llm,
            media,
            ArtifactStore::from_config(&config.bot),
            TurnSettings::from_config(&config),
        );
        Ok(Self::new(config, processor))
    }
}

impl TurnContext for AppState {
    fn processor(&self) -> &TurnProcessor {
        &self.processor
    }

    fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}
