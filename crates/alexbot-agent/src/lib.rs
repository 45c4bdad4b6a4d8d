pub mod artifact;
pub mod chunk;
pub mod error;
pub mod ingest;
pub mod openai;
pub mod pipeline;
pub mod provider;
pub mod session;
pub mod tools;
pub mod transcript;

pub use error::{ErrorKind, TurnError};
pub use pipeline::{
    begin_turn, handle_command, handle_turn, InboundTurn, TurnContext, TurnLease, TurnOutcome,
    TurnProcessor,
};
pub use session::SessionRegistry;
