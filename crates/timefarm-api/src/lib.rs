//! Client for the Time Farm mini-app backend
//!
//! Covers the fixed API surface the farm loop needs:
//! 1. `validate-init` exchanges signed init-data for a bearer token
//! 2. `farming/info` and `balance` read the account's state
//! 3. `balance` (POST) claims a finished cycle, `farming/start` begins one
//!
//! `ApiClient` talks HTTP through an optional per-account proxy. The loop
//! depends on the `FarmApi` trait so it can run against in-memory fakes.

pub mod client;
pub mod constants;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use constants::*;
pub use error::{Error, Result};
pub use types::{AccessToken, ActiveCycle, Amount, Balance, FarmInfo};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `FarmApi` methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The five calls one farming cycle is built from.
///
/// Every method is a single request with no retry; retry policy belongs to
/// the caller.
pub trait FarmApi: Send + Sync {
    /// Exchange init-data for a fresh access token.
    fn access_token<'a>(&'a self, init_data: &'a str) -> ApiFuture<'a, AccessToken>;

    fn farm_info<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, FarmInfo>;

    fn balance<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, Balance>;

    /// Claim a finished cycle. `None` when the backend answers with no body.
    fn claim_farming<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, Option<Balance>>;

    fn start_farming<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, FarmInfo>;
}
