//! Wire types for the backend's JSON payloads

use std::fmt;

use chrono::{DateTime, Utc};
use common::Secret;
use serde::{Deserialize, Serialize};

/// Short-lived bearer token for the farming endpoints.
#[derive(Clone)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", self.0)
    }
}

/// Body of `validate-init`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateInitRequest<'a> {
    pub init_data: &'a str,
    pub platform: &'a str,
}

/// Response of `validate-init`. Other fields (user info, level) are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ValidateInitResponse {
    pub token: String,
}

/// Current farming state of an account.
///
/// A cycle is active only when both fields are present and the reward
/// duration is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmInfo {
    #[serde(default)]
    pub active_farming_started_at: Option<DateTime<Utc>>,
    /// Cycle length in seconds
    #[serde(default)]
    pub farming_reward: Option<f64>,
}

/// A running farming cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveCycle {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl FarmInfo {
    pub fn active_cycle(&self) -> Option<ActiveCycle> {
        match (self.active_farming_started_at, self.farming_reward) {
            (Some(started_at), Some(duration_secs)) if duration_secs != 0.0 => Some(ActiveCycle {
                started_at,
                duration_secs,
            }),
            _ => None,
        }
    }
}

/// Balance amount; the backend sends either a number or a decimal string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Number(n) => write!(f, "{n}"),
            Amount::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub balance: Option<Amount>,
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.balance {
            Some(amount) => amount.fmt(f),
            None => f.write_str("unknown"),
        }
    }
}
