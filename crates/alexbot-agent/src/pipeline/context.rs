//! Shared context interface for channel adapters.

use crate::session::SessionRegistry;

use super::process::TurnProcessor;

/// What a channel host must expose for the pipeline to run turns.
///
/// Implemented by the binary's `AppState`; defined here so adapter crates
/// depend only on `alexbot-agent`.
pub trait TurnContext: Send + Sync {
    fn processor(&self) -> &TurnProcessor;
    fn sessions(&self) -> &SessionRegistry;
}
