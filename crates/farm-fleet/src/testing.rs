//! In-memory fakes for loop and fleet tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use common::Secret;
use platform::{AuthError, WebViewSource};
use timefarm_api::{AccessToken, ApiFuture, Balance, Endpoint, FarmApi, FarmInfo};

use crate::schedule::Clock;
use crate::store::Account;

/// Backend call observed by `FakeApi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Token,
    FarmInfo,
    Balance,
    Claim,
    Start,
}

impl Call {
    fn endpoint(self) -> Endpoint {
        match self {
            Call::Token => Endpoint::ValidateInit,
            Call::FarmInfo => Endpoint::FarmingInfo,
            Call::Balance => Endpoint::Balance,
            Call::Claim => Endpoint::Claim,
            Call::Start => Endpoint::StartFarming,
        }
    }
}

/// Scripted backend.
///
/// `farm_info` answers pop from a queue; the last answer repeats once the
/// queue is down to one entry. Any call can be made to fail with a 503 for
/// its next `n` invocations, or to panic.
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    token_times: Mutex<Vec<tokio::time::Instant>>,
    farm_infos: Mutex<VecDeque<FarmInfo>>,
    failures: Mutex<HashMap<Call, u32>>,
    panic_on: Option<Call>,
    claim_response: Option<Balance>,
}

impl FakeApi {
    pub fn new(farm_infos: Vec<FarmInfo>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            token_times: Mutex::new(Vec::new()),
            farm_infos: Mutex::new(farm_infos.into()),
            failures: Mutex::new(HashMap::new()),
            panic_on: None,
            claim_response: Some(Balance {
                balance: Some(timefarm_api::Amount::Text("1500".into())),
            }),
        }
    }

    /// Fail the next `n` invocations of `call` with a 503.
    pub fn fail(self, call: Call, n: u32) -> Self {
        self.failures.lock().unwrap().insert(call, n);
        self
    }

    /// Panic inside `call`.
    pub fn panic_on(mut self, call: Call) -> Self {
        self.panic_on = Some(call);
        self
    }

    /// What the claim endpoint answers; `None` is an empty body.
    pub fn claim_returns(mut self, response: Option<Balance>) -> Self {
        self.claim_response = response;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn token_times(&self) -> Vec<tokio::time::Instant> {
        self.token_times.lock().unwrap().clone()
    }

    /// Record `call`, then answer `ok` unless a failure is scheduled for it.
    fn respond<T: Send + 'static>(&self, call: Call, ok: T) -> ApiFuture<'_, T> {
        self.calls.lock().unwrap().push(call);
        if self.panic_on == Some(call) {
            panic!("scripted panic in {call:?}");
        }

        let fail = match self.failures.lock().unwrap().get_mut(&call) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        Box::pin(async move {
            if fail {
                return Err(timefarm_api::Error::Status {
                    endpoint: call.endpoint(),
                    status: 503,
                    body: "maintenance".into(),
                });
            }
            Ok(ok)
        })
    }

    fn next_farm_info(&self) -> FarmInfo {
        let mut queue = self.farm_infos.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

impl FarmApi for FakeApi {
    fn access_token<'a>(&'a self, init_data: &'a str) -> ApiFuture<'a, AccessToken> {
        self.token_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let token = AccessToken::new(format!("token-for-{}", init_data.len()));
        self.respond(Call::Token, token)
    }

    fn farm_info<'a>(&'a self, _token: &'a AccessToken) -> ApiFuture<'a, FarmInfo> {
        let info = self.next_farm_info();
        self.respond(Call::FarmInfo, info)
    }

    fn balance<'a>(&'a self, _token: &'a AccessToken) -> ApiFuture<'a, Balance> {
        let balance = Balance {
            balance: Some(timefarm_api::Amount::Number(1200.0)),
        };
        self.respond(Call::Balance, balance)
    }

    fn claim_farming<'a>(&'a self, _token: &'a AccessToken) -> ApiFuture<'a, Option<Balance>> {
        self.respond(Call::Claim, self.claim_response.clone())
    }

    fn start_farming<'a>(&'a self, _token: &'a AccessToken) -> ApiFuture<'a, FarmInfo> {
        self.respond(Call::Start, FarmInfo::default())
    }
}

/// Webview source returning a fixed answer and counting calls.
pub struct FakeWebView {
    response: Result<String, AuthError>,
    calls: AtomicUsize,
}

impl FakeWebView {
    pub fn ok(user_id: i64) -> Self {
        Self {
            response: Ok(web_view_url(user_id)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(response: Result<String, AuthError>) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebViewSource for FakeWebView {
    fn request_web_view<'a>(
        &'a self,
        _phone_number: &'a str,
        _session: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = platform::Result<String>> + Send + 'a>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

/// Webview URL carrying init-data for `user_id`.
pub fn web_view_url(user_id: i64) -> String {
    format!(
        "https://timefarm.app/#tgWebAppData=query_id%3DAAH%26user%3D%257B%2522id%2522%253A{user_id}%252C%2522username%2522%253A%2522farmer{user_id}%2522%257D%26auth_date%3D1717000000%26hash%3Dabc&tgWebAppVersion=7.4&tgWebAppPlatform=ios"
    )
}

/// Clock frozen at one instant.
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn at(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn farm_info(started_at: i64, reward: f64) -> FarmInfo {
    FarmInfo {
        active_farming_started_at: Some(Utc.timestamp_opt(started_at, 0).unwrap()),
        farming_reward: Some(reward),
    }
}

pub fn account(id: u64) -> Account {
    Account {
        id,
        phone_number: format!("+1555000{id}"),
        session: Secret::from(format!("session-{id}")),
        proxy: None,
    }
}
