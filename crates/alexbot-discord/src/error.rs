use alexbot_agent::ErrorKind;
use serenity::http::HttpError;
use serenity::model::ModelError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("attachment download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("no bot token configured")]
    NoToken,
}

impl DiscordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscordError::Serenity(e) if is_permission_error(e) => ErrorKind::Permission,
            DiscordError::Serenity(serenity::Error::Http(_)) => ErrorKind::Connection,
            DiscordError::Serenity(_) => ErrorKind::Internal,
            DiscordError::Download(e) if e.is_timeout() => ErrorKind::Timeout,
            DiscordError::Download(_) => ErrorKind::Connection,
            DiscordError::NoToken => ErrorKind::Authentication,
        }
    }
}

/// True when Discord refused the request for lack of permissions (HTTP 403).
pub fn is_permission_error(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            resp.status_code.as_u16() == 403
        }
        serenity::Error::Model(ModelError::InvalidPermissions { .. }) => true,
        _ => false,
    }
}
