//! User-facing text for failed turns, one fixed message per error kind.

use alexbot_agent::ErrorKind;

pub fn message_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Incompatible => {
            "\u{26a0}\u{fe0f} The AI service sent a response I don't understand. \
             The bot may need an update."
        }
        ErrorKind::Unavailable => {
            "\u{26a0}\u{fe0f} That feature isn't available right now. \
             Check the configured models."
        }
        ErrorKind::Authentication => {
            "\u{26a0}\u{fe0f} The AI service rejected my credentials. Please tell the bot owner."
        }
        ErrorKind::RateLimited => {
            "\u{23f3} I'm being rate limited. Please try again in a moment."
        }
        ErrorKind::Timeout => "\u{23f3} The AI service took too long to answer. Please try again.",
        ErrorKind::Connection => {
            "\u{26a0}\u{fe0f} I couldn't reach the AI service. Please try again later."
        }
        ErrorKind::Permission => "I don't have permission to post here.",
        ErrorKind::Internal => "\u{26a0}\u{fe0f} Something went wrong on my side. Please try again.",
    }
}
