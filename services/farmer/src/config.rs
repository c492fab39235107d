//! Configuration types and loading
//!
//! Precedence: CLI args > env vars > config file > defaults. Every section is
//! optional; a missing file at the default path means "all defaults", but a
//! path given explicitly must exist.

use farm_fleet::FarmSettings;
use platform::HelperConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "timefarm-farmer.toml";

/// Env var overriding `api.base_url`
pub const API_URL_ENV: &str = "TIMEFARM_API_URL";

/// Where the config file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    pub path: PathBuf,
    /// Named by `--config` or `CONFIG_PATH` rather than the built-in default
    pub explicit: bool,
}

impl ConfigPath {
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            explicit: true,
        }
    }
}

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub farm: FarmConfig,
    pub store: StoreConfig,
    pub platform: PlatformConfig,
    pub metrics: MetricsConfig,
}

/// Mini-app backend settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: timefarm_api::BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Farm loop tuning
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    pub retry_backoff_secs: u64,
    /// Consecutive token failures before init-data is re-derived (0 disables)
    pub reinit_after_failures: u32,
    /// How long shutdown waits for loops to stop
    pub drain_timeout_secs: u64,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            retry_backoff_secs: 300,
            reinit_after_failures: 3,
            drain_timeout_secs: 5,
        }
    }
}

impl FarmConfig {
    pub fn settings(&self) -> FarmSettings {
        FarmSettings {
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            reinit_after_failures: self.reinit_after_failures,
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("accounts.json"),
        }
    }
}

/// Messaging-platform helper program
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub helper: String,
    pub helper_args: Vec<String>,
    pub bot: String,
    pub web_app_url: String,
    /// Referral code for the bot's start command; empty sends none
    pub start_param: String,
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            helper: "tg-helper".to_string(),
            helper_args: Vec::new(),
            bot: "TimeFarmCryptoBot".to_string(),
            web_app_url: "https://timefarm.app".to_string(),
            start_param: String::new(),
            timeout_secs: 60,
        }
    }
}

impl PlatformConfig {
    pub fn helper_config(&self) -> HelperConfig {
        HelperConfig {
            program: self.helper.clone(),
            args: self.helper_args.clone(),
            bot: self.bot.clone(),
            web_app_url: self.web_app_url.clone(),
            start_param: self.start_param.clone(),
            platform: timefarm_api::PLATFORM.to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Prometheus exporter; disabled unless `listen_addr` is set
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen_addr: Option<SocketAddr>,
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

fn require_non_zero(field: &str, value: u64) -> common::Result<()> {
    if value == 0 {
        return Err(common::Error::Config(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file at the built-in default path yields
    /// defaults. A path from `--config` or `CONFIG_PATH` must exist.
    pub fn load_or_default(source: &ConfigPath) -> common::Result<Self> {
        if !source.explicit && !source.path.exists() {
            return Config::default().finish();
        }
        Self::load(&source.path)
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api.base_url = url;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("api.base_url", &self.api.base_url)?;
        require_non_zero("api.timeout_secs", self.api.timeout_secs)?;
        require_non_zero("farm.retry_backoff_secs", self.farm.retry_backoff_secs)?;
        require_non_zero("farm.drain_timeout_secs", self.farm.drain_timeout_secs)?;
        require_http_url("platform.web_app_url", &self.platform.web_app_url)?;
        require_non_zero("platform.timeout_secs", self.platform.timeout_secs)?;

        if self.platform.helper.trim().is_empty() {
            return Err(common::Error::Config(
                "platform.helper must not be empty".into(),
            ));
        }
        if self.platform.bot.trim().is_empty() {
            return Err(common::Error::Config(
                "platform.bot must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> ConfigPath {
        if let Some(p) = cli_path {
            return ConfigPath::explicit(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigPath::explicit(p);
        }
        ConfigPath {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            explicit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        let (_dir, path) = write_config(
            r#"
[api]
base_url = "http://127.0.0.1:9000"
timeout_secs = 10

[farm]
retry_backoff_secs = 120
reinit_after_failures = 0
drain_timeout_secs = 2

[store]
path = "/var/lib/timefarm/accounts.json"

[platform]
helper = "/usr/local/bin/tg-helper"
helper_args = ["--api-id", "12345"]
start_param = "ref123"
timeout_secs = 30

[metrics]
listen_addr = "127.0.0.1:9100"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.farm.settings().retry_backoff, Duration::from_secs(120));
        assert_eq!(config.farm.settings().reinit_after_failures, 0);
        assert_eq!(config.farm.drain_timeout(), Duration::from_secs(2));
        assert_eq!(
            config.store.path,
            PathBuf::from("/var/lib/timefarm/accounts.json")
        );

        let helper = config.platform.helper_config();
        assert_eq!(helper.program, "/usr/local/bin/tg-helper");
        assert_eq!(helper.args, vec!["--api-id", "12345"]);
        assert_eq!(helper.bot, "TimeFarmCryptoBot");
        assert_eq!(helper.start_param, "ref123");
        assert_eq!(helper.platform, timefarm_api::PLATFORM);
        assert_eq!(helper.timeout, Duration::from_secs(30));

        assert_eq!(
            config.metrics.listen_addr,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        let (_dir, path) = write_config("");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://tg-bot-tap.laborx.io");
        assert_eq!(config.farm.retry_backoff_secs, 300);
        assert_eq!(config.farm.reinit_after_failures, 3);
        assert_eq!(config.farm.drain_timeout_secs, 5);
        assert_eq!(config.store.path, PathBuf::from("accounts.json"));
        assert_eq!(config.platform.web_app_url, "https://timefarm.app");
        assert_eq!(config.platform.timeout_secs, 60);
        assert!(config.metrics.listen_addr.is_none());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());

        let result =
            Config::load_or_default(&ConfigPath::explicit("/nonexistent/path/config.toml"));
        assert!(result.is_err(), "explicit path must exist");
    }

    #[test]
    fn test_missing_explicit_default_name_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };

        // Same file name as the built-in default, but asked for by name
        let source = Config::resolve_path(Some(Path::new(DEFAULT_CONFIG_PATH)));
        assert!(source.explicit);
        assert!(Config::load_or_default(&source).is_err());

        unsafe { set_env("CONFIG_PATH", DEFAULT_CONFIG_PATH) };
        let source = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert!(source.explicit);
        assert!(Config::load_or_default(&source).is_err());
    }

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        // Tests run from the crate dir, which ships no config file
        unsafe { remove_env("CONFIG_PATH") };
        let source = Config::resolve_path(None);
        assert!(!source.explicit);
        let config = Config::load_or_default(&source).unwrap();
        assert_eq!(config.farm.retry_backoff_secs, 300);
        assert_eq!(config.platform.start_param, "");
    }

    #[test]
    fn test_load_invalid_toml() {
        let (_dir, path) = write_config("not valid {{{{ toml");
        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_api_url_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[api]
base_url = "https://file.example"
"#,
        );

        unsafe { set_env(API_URL_ENV, "http://127.0.0.1:4000") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(API_URL_ENV) };

        assert_eq!(config.api.base_url, "http://127.0.0.1:4000");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        let (_dir, path) = write_config(
            r#"
[api]
base_url = "tg-bot-tap.laborx.io"
"#,
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("api.base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_backoff_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        let (_dir, path) = write_config(
            r#"
[farm]
retry_backoff_secs = 0
"#,
        );
        assert!(Config::load(&path).is_err(), "zero backoff must be rejected");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        for toml in [
            "[api]\ntimeout_secs = 0\n",
            "[platform]\ntimeout_secs = 0\n",
            "[farm]\ndrain_timeout_secs = 0\n",
        ] {
            let (_dir, path) = write_config(toml);
            assert!(Config::load(&path).is_err(), "must reject: {toml}");
        }
    }

    #[test]
    fn test_empty_helper_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_URL_ENV) };
        let (_dir, path) = write_config(
            r#"
[platform]
helper = "  "
"#,
        );
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("platform.helper"), "got: {err}");
    }

    #[test]
    fn test_unknown_metrics_addr_rejected() {
        let (_dir, path) = write_config(
            r#"
[metrics]
listen_addr = "not-an-addr"
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let source = Config::resolve_path(Some(Path::new("/custom/path.toml")));
        assert_eq!(source, ConfigPath::explicit("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let source = Config::resolve_path(None);
        assert_eq!(source, ConfigPath::explicit("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let source = Config::resolve_path(None);
        assert_eq!(source.path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!source.explicit);
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let source = Config::resolve_path(Some(Path::new("/cli/wins.toml")));
        assert_eq!(
            source.path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
