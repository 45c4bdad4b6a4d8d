use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SessionScope;

/// Identifies one conversation (one transcript).
///
/// Format depends on the configured [`SessionScope`]:
/// `channel:{channel_id}`, `user:{author_id}` or `global`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub String);

impl ConversationKey {
    pub fn for_channel(channel_id: u64) -> Self {
        Self(format!("channel:{}", channel_id))
    }

    pub fn for_user(author_id: u64) -> Self {
        Self(format!("user:{}", author_id))
    }

    pub fn global() -> Self {
        Self("global".to_string())
    }

    /// Derive the key for a message under the given scope.
    pub fn resolve(scope: SessionScope, channel_id: u64, author_id: u64) -> Self {
        match scope {
            SessionScope::Channel => Self::for_channel(channel_id),
            SessionScope::User => Self::for_user(author_id),
            SessionScope::Global => Self::global(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
