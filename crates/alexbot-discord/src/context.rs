//! Discord context interface — re-exported from the shared pipeline.
//!
//! The binary's app state implements `TurnContext` once and every adapter
//! uses it under its own name.

pub use alexbot_agent::pipeline::TurnContext as DiscordAppContext;
