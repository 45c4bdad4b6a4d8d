//! Text commands, intercepted before the model sees the message.
//!
//! Handles `/help`, `/reset`, `/model` and `/tools` for every channel adapter.

use tracing::info;

use alexbot_core::ConversationKey;

use crate::tools;

use super::context::TurnContext;

/// Handle a text command addressed to the bot.
///
/// Returns `Some(response)` if the message was a recognized command,
/// `None` if it should be forwarded to the turn pipeline.
///
/// Recognized commands:
///   `/help`            — list all available commands
///   `/reset`           — forget this conversation
///   `/model`           — show current model
///   `/model <name>`    — switch to a different chat model
///   `/tools`           — list the tools the model may call
pub async fn handle_command<C: TurnContext + ?Sized>(
    message: &str,
    ctx: &C,
    key: &ConversationKey,
) -> Option<String> {
    let trimmed = message.trim();

    if trimmed.eq_ignore_ascii_case("/help") {
        return Some(
            "**Commands**\n\
             - `/help` — show this help\n\
             - `/reset` — forget this conversation and start over\n\
             - `/model` — show current model\n\
             - `/model <name>` — switch the chat model\n\
             - `/tools` — list what I can make for you"
                .to_string(),
        );
    }

    if trimmed.eq_ignore_ascii_case("/reset") {
        let existed = ctx.sessions().reset(key);
        info!(session = %key, existed, "conversation reset via /reset");
        return Some(if existed {
            "Conversation cleared. Let's start fresh.".to_string()
        } else {
            "Nothing to clear, this conversation is already fresh.".to_string()
        });
    }

    if trimmed.eq_ignore_ascii_case("/model") {
        let model = ctx.processor().model().await;
        return Some(format!(
            "Current model: **{}** (provider `{}`)",
            model,
            ctx.processor().provider_name()
        ));
    }

    if let Some(arg) = trimmed
        .strip_prefix("/model ")
        .or_else(|| trimmed.strip_prefix("/model\t"))
    {
        let arg = arg.trim();
        if arg.is_empty() || arg.chars().any(char::is_whitespace) {
            return Some(format!("Invalid model name: `{}`", arg));
        }
        let previous = ctx.processor().set_model(arg.to_string()).await;
        info!(previous = %previous, new = %arg, "model switched via /model command");
        return Some(format!("Model switched: **{}** -> **{}**", previous, arg));
    }

    if trimmed.eq_ignore_ascii_case("/tools") {
        let mut out = String::from("**Tools**\n");
        for def in tools::manifest() {
            out.push_str(&format!("- `{}` — {}\n", def.name, def.description));
        }
        return Some(out);
    }

    None
}
