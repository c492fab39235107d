//! Fixed API surface of the Time Farm backend

use reqwest::Method;

/// Production backend host
pub const BASE_URL: &str = "https://tg-bot-tap.laborx.io";

/// Platform tag sent alongside init-data
pub const PLATFORM: &str = "ios";

/// Origin of the mini-app frontend; the backend checks it
pub const ORIGIN: &str = "https://timefarm.app";

/// iOS Safari user agent, matching the platform tag
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

/// Browser-like headers sent with every request, in addition to
/// `origin` and `user-agent`.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("content-type", "application/json"),
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-fetch-site", "cross-site"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-dest", "empty"),
];

/// Backend endpoints used by the farm loop.
///
/// Claiming and reading the balance share one path and differ only by
/// method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ValidateInit,
    FarmingInfo,
    Balance,
    Claim,
    StartFarming,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::ValidateInit => "/api/v1/auth/validate-init/v2",
            Endpoint::FarmingInfo => "/api/v1/farming/info",
            Endpoint::Balance | Endpoint::Claim => "/api/v1/balance",
            Endpoint::StartFarming => "/api/v1/farming/start",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Endpoint::FarmingInfo | Endpoint::Balance => Method::GET,
            Endpoint::ValidateInit | Endpoint::Claim | Endpoint::StartFarming => Method::POST,
        }
    }

    /// Short label for logs and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Endpoint::ValidateInit => "validate-init",
            Endpoint::FarmingInfo => "farming-info",
            Endpoint::Balance => "balance",
            Endpoint::Claim => "claim",
            Endpoint::StartFarming => "start-farming",
        }
    }

    /// Whether the endpoint requires `authorization: Bearer <token>`.
    pub fn authenticated(self) -> bool {
        !matches!(self, Endpoint::ValidateInit)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
