//! Init-data extraction from a mini-app webview URL
//!
//! The platform hands the mini-app its signed init-data in the URL fragment:
//!
//! ```text
//! https://timefarm.app/#tgWebAppData=<encoded init-data>&tgWebAppVersion=7.4&...
//! ```
//!
//! Everything from `&tgWebAppVersion=` onward is dropped, the part after
//! `#tgWebAppData=` is taken and URL-decoded once. The result is the exact
//! string the game backend validates. It also carries a `user` parameter
//! holding the account's JSON user object.

use common::Secret;
use percent_encoding::percent_decode_str;
use serde::Deserialize;

const VERSION_MARKER: &str = "&tgWebAppVersion=";
const DATA_MARKER: &str = "#tgWebAppData=";

/// Errors from parsing a webview URL into init-data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitDataError {
    #[error("webview URL has no tgWebAppData fragment")]
    MissingFragment,

    #[error("init-data is not valid UTF-8 after decoding")]
    InvalidEncoding,

    #[error("init-data has no user parameter")]
    MissingUser,

    #[error("init-data user is not valid JSON: {0}")]
    InvalidUser(String),
}

/// The platform user embedded in init-data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Signed init-data plus the user it identifies.
#[derive(Debug, Clone)]
pub struct InitData {
    raw: Secret<String>,
    user: WebAppUser,
}

impl InitData {
    /// The decoded init-data string sent to the validation endpoint.
    pub fn raw(&self) -> &Secret<String> {
        &self.raw
    }

    pub fn user(&self) -> &WebAppUser {
        &self.user
    }

    /// External user id, used as the per-account log context.
    pub fn ext_user_id(&self) -> i64 {
        self.user.id
    }
}

/// Parse init-data out of a webview URL.
pub fn extract_init_data(web_view_url: &str) -> Result<InitData, InitDataError> {
    let head = web_view_url
        .split_once(VERSION_MARKER)
        .map_or(web_view_url, |(head, _)| head);

    let fragment = head
        .split(DATA_MARKER)
        .nth(1)
        .filter(|fragment| !fragment.is_empty())
        .ok_or(InitDataError::MissingFragment)?;

    let raw = percent_decode_str(fragment)
        .decode_utf8()
        .map_err(|_| InitDataError::InvalidEncoding)?
        .into_owned();

    let user = parse_user(&raw)?;

    Ok(InitData {
        raw: Secret::new(raw),
        user,
    })
}

/// Read the `user` query parameter and decode its JSON object.
fn parse_user(raw: &str) -> Result<WebAppUser, InitDataError> {
    let encoded = url::form_urlencoded::parse(raw.as_bytes())
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.into_owned())
        .ok_or(InitDataError::MissingUser)?;

    let json = percent_decode_str(&encoded)
        .decode_utf8()
        .map_err(|_| InitDataError::InvalidEncoding)?;

    serde_json::from_str(&json).map_err(|e| InitDataError::InvalidUser(e.to_string()))
}
