//! Messaging-platform collaborator seam
//!
//! The farm loop never talks to the messaging platform directly. It consumes
//! one capability, turning a saved session into a mini-app webview URL, through
//! the `WebViewSource` trait. Account registration goes through
//! `SessionRegistrar`. `HelperClient` implements both by delegating to an
//! external helper program that speaks the platform protocol.
//!
//! Failures are classified into `AuthError` variants so callers can decide
//! what to log without inspecting message strings.

pub mod helper;
pub mod init_data;

pub use helper::{HelperClient, HelperConfig};
pub use init_data::{InitData, InitDataError, WebAppUser, extract_init_data};

use common::Secret;
use std::future::Future;
use std::pin::Pin;

/// Helper exit code meaning the platform call timed out (same as `timeout(1)`).
pub const EXIT_TIMEOUT: i32 = 124;

/// Helper exit code meaning the platform returned a payload the client could
/// not cast into its expected shape (`EX_DATAERR`).
pub const EXIT_CAST: i32 = 65;

/// Classified failure of a platform authentication or webview call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("platform call timed out")]
    Timeout,

    #[error("platform returned a malformed payload")]
    Cast,

    #[error("failed to start platform helper: {0}")]
    Spawn(String),

    #[error("platform helper failed (exit code {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("platform helper produced no output")]
    EmptyOutput,
}

impl AuthError {
    /// Benign, expected failures that are kept out of the logs.
    pub fn is_noise(&self) -> bool {
        matches!(self, AuthError::Timeout | AuthError::Cast)
    }
}

/// Map a helper exit code (and its stderr) to an `AuthError`.
pub fn classify_exit(code: Option<i32>, stderr: &str) -> AuthError {
    match code {
        Some(EXIT_TIMEOUT) => AuthError::Timeout,
        Some(EXIT_CAST) => AuthError::Cast,
        _ => AuthError::Failed {
            code,
            stderr: stderr.trim().to_string(),
        },
    }
}

/// Result alias for platform operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Produces the mini-app webview URL for a stored account.
///
/// Uses `Pin<Box<dyn Future>>` so implementations can be shared as
/// `Arc<dyn WebViewSource>` across account tasks.
pub trait WebViewSource: Send + Sync {
    fn request_web_view<'a>(
        &'a self,
        phone_number: &'a str,
        session: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Runs the interactive login flow and returns the serialized session.
pub trait SessionRegistrar: Send + Sync {
    fn register<'a>(
        &'a self,
        phone_number: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Secret<String>>> + Send + 'a>>;
}
