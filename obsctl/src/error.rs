use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid {what}: {reason}")]
    Validation { what: &'static str, reason: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("no current context, please login")]
    NoCurrentContext,

    #[error("current context {0} is invalid, please run `obsctl context set`")]
    InvalidContext(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("operation timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    pub(crate) fn validation(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn api_not_found(name: impl ToString) -> Self {
        Self::NotFound {
            kind: "api",
            name: name.to_string(),
        }
    }

    pub(crate) fn tenant_not_found(name: impl ToString) -> Self {
        Self::NotFound {
            kind: "tenant",
            name: name.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_timeout(deadline: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*deadline)
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OIDC configuration is incomplete: {0} is required")]
    IncompleteCredentials(&'static str),

    #[error("failed to connect to {url}: {message}")]
    Connection { url: String, message: String },

    #[error("OIDC discovery for {issuer} failed: {reason}")]
    Discovery { issuer: String, reason: String },

    #[error("authentication failed: invalid client_id, client_secret or audience")]
    AuthenticationFailed,

    #[error("token endpoint returned an error: {0}")]
    ServerError(String),
}
