//! Subprocess-backed platform client
//!
//! The platform protocol lives in an external helper program. Contract:
//!
//! - `<helper> [args..] webview --phone P --bot B --url U --start-param S --platform ios`
//!   reads the saved session from `TG_SESSION` and prints the webview URL.
//! - `<helper> [args..] login --phone P` prompts on the inherited terminal and
//!   prints the new serialized session.
//!
//! Exit code 0 is success. Exit codes 124 and 65 map to `AuthError::Timeout`
//! and `AuthError::Cast`; anything else becomes `AuthError::Failed`.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use common::Secret;
use tokio::process::Command;
use tracing::debug;

use crate::{AuthError, Result, SessionRegistrar, WebViewSource, classify_exit};

/// Environment variable carrying the saved session to the helper.
pub const SESSION_ENV: &str = "TG_SESSION";

/// How to invoke the helper and which mini-app to open.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Bot username owning the mini-app
    pub bot: String,
    pub web_app_url: String,
    pub start_param: String,
    /// Client platform tag; must match the one the backend is told
    pub platform: String,
    /// Deadline for one webview request (login is interactive and unbounded)
    pub timeout: Duration,
}

/// `WebViewSource` and `SessionRegistrar` backed by the helper program.
pub struct HelperClient {
    config: HelperConfig,
}

impl HelperClient {
    pub fn new(config: HelperConfig) -> Self {
        Self { config }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args).arg(subcommand).kill_on_drop(true);
        cmd
    }

    async fn web_view(&self, phone_number: &str, session: &str) -> Result<String> {
        let mut cmd = self.command("webview");
        cmd.args(["--phone", phone_number])
            .args(["--bot", self.config.bot.as_str()])
            .args(["--url", self.config.web_app_url.as_str()])
            .args(["--start-param", self.config.start_param.as_str()])
            .args(["--platform", self.config.platform.as_str()])
            .env(SESSION_ENV, session)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.config.program, "requesting webview URL from helper");

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(AuthError::Spawn(e.to_string())),
            Err(_) => return Err(AuthError::Timeout),
        };

        if !output.status.success() {
            return Err(classify_exit(
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        non_empty_stdout(&output.stdout)
    }

    async fn login(&self, phone_number: &str) -> Result<Secret<String>> {
        let mut cmd = self.command("login");
        cmd.args(["--phone", phone_number])
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let output = cmd
            .output()
            .await
            .map_err(|e| AuthError::Spawn(e.to_string()))?;

        if !output.status.success() {
            // stderr went to the terminal
            return Err(classify_exit(output.status.code(), ""));
        }

        non_empty_stdout(&output.stdout).map(Secret::new)
    }
}

fn non_empty_stdout(stdout: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(stdout).trim().to_string();
    if text.is_empty() {
        return Err(AuthError::EmptyOutput);
    }
    Ok(text)
}

impl WebViewSource for HelperClient {
    fn request_web_view<'a>(
        &'a self,
        phone_number: &'a str,
        session: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.web_view(phone_number, session))
    }
}

impl SessionRegistrar for HelperClient {
    fn register<'a>(
        &'a self,
        phone_number: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Secret<String>>> + Send + 'a>> {
        Box::pin(self.login(phone_number))
    }
}
