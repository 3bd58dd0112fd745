//! Error types.
//!
//! Two families live here. [`Error`] surfaces infrastructure failures:
//! loading settings, initialising the renderer, binding a port. Any of them
//! at startup is fatal. [`ActionError`] is what an action returns when it
//! cannot finish; the dispatcher turns it into a `500` for that one request.
//!
//! Authorization and routing failures are not errors at all. They are plain
//! HTTP [`Response`](crate::Response) values (`403`, `404`).

use thiserror::Error;

/// Startup and infrastructure failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("renderer: {0}")]
    Render(#[from] RenderError),

    #[error("unknown renderer `{0}` (expected `template` or `string`)")]
    UnknownRenderer(String),

    #[error("invalid socket address `{0}`")]
    Address(String),
}

/// Failure while loading or validating [`Settings`](crate::config::Settings)
/// or the extra config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Failure while turning a view name and a model into markup.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not process template `{view}`: {source}")]
    Template {
        view: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("model is not serializable: {0}")]
    Model(#[from] serde_json::Error),

    #[error("renderer used before init")]
    Uninitialized,
}

/// Why an action did not complete.
///
/// The `Display` output is what the client sees in the `500` error body.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request parameters: {0}")]
    Params(#[from] serde_urlencoded::de::Error),

    #[error("request body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Message(String),
}

impl ActionError {
    /// An error carrying only a message, for failures an action detects itself.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Message(message.to_string())
    }
}
