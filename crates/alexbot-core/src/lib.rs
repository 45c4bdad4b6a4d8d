pub mod config;
pub mod error;
pub mod types;

pub use config::{BotConfig, SessionScope};
pub use error::{CoreError, Result};
pub use types::ConversationKey;
