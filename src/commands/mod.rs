//! One function per CLI subcommand. `main` parses the arguments, calls one of these and prints
//! the `Out` it returns.

mod auth;
mod init;
mod serve;

use serde::Serialize;
use tracing::{debug, info};

pub use auth::{auth, auth_verify, AuthStatus};
pub use init::init;
pub use serve::serve;

/// What a command reports when it finishes: a line for the user and, from `auth --verify`, the
/// details it found.
#[derive(Debug, Clone)]
pub struct Out<T = ()> {
    message: String,
    detail: Option<T>,
}

impl<T> Out<T> {
    pub fn with_detail(message: impl Into<String>, detail: T) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&T> {
        self.detail.as_ref()
    }
}

impl<T: Serialize> Out<T> {
    /// Logs the message at info and the detail, as JSON, at debug.
    pub fn print(&self) {
        info!("{}", self.message);
        let Some(detail) = &self.detail else {
            return;
        };
        if let Ok(json) = serde_json::to_string_pretty(detail) {
            debug!("{json}");
        }
    }
}

impl<T> From<String> for Out<T> {
    fn from(message: String) -> Self {
        Self {
            message,
            detail: None,
        }
    }
}

impl<T> From<&str> for Out<T> {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}
