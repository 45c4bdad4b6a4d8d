//! Shared message pipeline: channel-agnostic turn processing.
//!
//! Channel adapters resolve a [`ConversationKey`](alexbot_core::ConversationKey),
//! give slash commands a chance via [`handle_command`], then call
//! [`handle_turn`] (or take a [`TurnLease`] with [`begin_turn`] first when
//! attachments still need fetching). Emitting the reply is left to the adapter.

pub mod context;
pub mod process;
pub mod slash;

pub use context::TurnContext;
pub use process::{
    begin_turn, handle_turn, InboundTurn, TurnLease, TurnOutcome, TurnProcessor, TurnSettings,
};
pub use slash::handle_command;
