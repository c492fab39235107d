//! Per-account farm loop
//!
//! State machine for one account:
//!
//! ```text
//! Bootstrapping --init-data--> Cycling --shutdown--> Stopped
//!       |                        ^  |
//!       | no init-data           |  | cycle error: fixed backoff
//!       v                        +--+
//!   Abandoned
//! ```
//!
//! Bootstrapping turns the stored session into init-data through the platform
//! collaborator. A failure there abandons the account for the rest of the
//! process. Cycling never exits on an iteration's failure: it logs, sleeps the
//! fixed backoff and starts over with a fresh token. Every suspension point
//! races the shutdown token.

use std::sync::Arc;
use std::time::Duration;

use platform::{InitData, WebViewSource, extract_init_data};
use timefarm_api::{AccessToken, FarmApi};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, field, info, info_span, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::schedule::{self, Clock, Decision};
use crate::store::Account;

/// Default wait after a failed iteration
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(300);

/// Default number of consecutive token failures before re-deriving init-data
pub const DEFAULT_REINIT_AFTER_FAILURES: u32 = 3;

/// Loop tuning shared by every account.
#[derive(Debug, Clone, Copy)]
pub struct FarmSettings {
    pub retry_backoff: Duration,
    /// 0 disables init-data re-derivation
    pub reinit_after_failures: u32,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            reinit_after_failures: DEFAULT_REINIT_AFTER_FAILURES,
        }
    }
}

/// Loop states.
#[derive(Debug)]
pub enum FarmState {
    Bootstrapping,
    Cycling {
        init_data: InitData,
        token_failures: u32,
    },
    Abandoned,
}

/// How an account's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmOutcome {
    /// Bootstrap failed; the account does nothing more this process.
    Abandoned,
    /// Shutdown was requested.
    Stopped,
}

/// Result of one successful iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub decision: Decision,
    pub sleep: Duration,
}

/// One account's farm loop and its collaborators.
pub struct AccountFarm {
    account: Account,
    api: Arc<dyn FarmApi>,
    web_view: Arc<dyn WebViewSource>,
    clock: Arc<dyn Clock>,
    settings: FarmSettings,
}

impl AccountFarm {
    pub fn new(
        account: Account,
        api: Arc<dyn FarmApi>,
        web_view: Arc<dyn WebViewSource>,
        clock: Arc<dyn Clock>,
        settings: FarmSettings,
    ) -> Self {
        Self {
            account,
            api,
            web_view,
            clock,
            settings,
        }
    }

    /// Run until the account is abandoned or `shutdown` fires.
    ///
    /// Log lines are emitted inside an `account` span carrying the store id
    /// and, once known, the platform user id.
    pub async fn run(self, shutdown: CancellationToken) -> FarmOutcome {
        let span = info_span!(
            "account",
            account_id = self.account.id,
            ext_user_id = field::Empty
        );
        self.drive(shutdown).instrument(span).await
    }

    async fn drive(self, shutdown: CancellationToken) -> FarmOutcome {
        let mut state = FarmState::Bootstrapping;
        let mut _running = None;

        loop {
            state = match state {
                FarmState::Bootstrapping => {
                    let bootstrap = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return FarmOutcome::Stopped,
                        result = self.bootstrap() => result,
                    };
                    match bootstrap {
                        Ok(init_data) => {
                            Span::current().record("ext_user_id", init_data.ext_user_id());
                            info!(
                                username = init_data.user().username.as_deref().unwrap_or(""),
                                "farm loop started"
                            );
                            _running = Some(metrics::account_running());
                            FarmState::Cycling {
                                init_data,
                                token_failures: 0,
                            }
                        }
                        Err(e) => {
                            log_bootstrap_failure(&self.account, &e);
                            metrics::record_bootstrap_failure();
                            FarmState::Abandoned
                        }
                    }
                }

                FarmState::Cycling {
                    mut init_data,
                    mut token_failures,
                } => {
                    let result = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return FarmOutcome::Stopped,
                        result = self.run_cycle(&init_data) => result,
                    };

                    let wait = match result {
                        Ok(report) => {
                            token_failures = 0;
                            metrics::record_cycle(report.decision.label());
                            report.sleep
                        }
                        Err(e) => {
                            if e.is_token_failure() {
                                token_failures += 1;
                            } else {
                                token_failures = 0;
                            }
                            metrics::record_cycle("error");
                            metrics::record_error(e.code());
                            warn!(
                                code = e.code(),
                                error = %e,
                                retry_in_secs = self.settings.retry_backoff.as_secs(),
                                "farm cycle failed"
                            );
                            self.settings.retry_backoff
                        }
                    };

                    if !sleep_or_cancel(wait, &shutdown).await {
                        return FarmOutcome::Stopped;
                    }

                    if self.should_reinit(token_failures) {
                        token_failures = 0;
                        let refreshed = tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => return FarmOutcome::Stopped,
                            result = self.bootstrap() => result,
                        };
                        match refreshed {
                            Ok(fresh) => {
                                info!("re-derived init-data after repeated token failures");
                                init_data = fresh;
                            }
                            Err(e) if e.is_noise() => {
                                debug!(error = %e, "init-data re-derivation failed");
                            }
                            Err(e) => {
                                warn!(
                                    code = e.code(),
                                    error = %e,
                                    "init-data re-derivation failed, keeping previous"
                                );
                            }
                        }
                    }

                    FarmState::Cycling {
                        init_data,
                        token_failures,
                    }
                }

                FarmState::Abandoned => return FarmOutcome::Abandoned,
            };
        }
    }

    fn should_reinit(&self, token_failures: u32) -> bool {
        self.settings.reinit_after_failures > 0
            && token_failures >= self.settings.reinit_after_failures
    }

    /// Derive init-data from the account's saved session.
    pub async fn bootstrap(&self) -> Result<InitData> {
        let url = self
            .web_view
            .request_web_view(&self.account.phone_number, self.account.session.expose())
            .await?;
        Ok(extract_init_data(&url)?)
    }

    /// One iteration: token, reads, decision, mutations. Returns how long to
    /// sleep before the next one.
    pub async fn run_cycle(&self, init_data: &InitData) -> Result<CycleReport> {
        let token = self.api.access_token(init_data.raw().expose()).await?;

        let farm_info = self.api.farm_info(&token).await?;
        let balance = self.api.balance(&token).await?;
        info!(balance = %balance, "balance");

        let now = self.clock.now_unix();
        let decision = schedule::decide(&farm_info, now);

        let sleep = match decision {
            Decision::Wait(remaining) => {
                info!(ends_in_minutes = minutes(remaining), "farming in progress");
                remaining
            }
            Decision::ClaimAndStart => {
                if let Some(claimed) = self.api.claim_farming(&token).await? {
                    info!(balance = %claimed, "claimed farming reward");
                }
                metrics::record_claim();
                self.start_cycle(&token, now).await?
            }
            Decision::Start => self.start_cycle(&token, now).await?,
        };

        Ok(CycleReport { decision, sleep })
    }

    /// Start a cycle and measure its remaining time from `now`.
    async fn start_cycle(&self, token: &AccessToken, now: i64) -> Result<Duration> {
        self.api.start_farming(token).await?;
        metrics::record_start();

        let farm_info = self.api.farm_info(token).await?;
        let sleep = schedule::sleep_until_complete(&farm_info, now).ok_or(Error::NoActiveCycle)?;
        info!(ends_in_minutes = minutes(sleep), "started farming");
        Ok(sleep)
    }
}

fn log_bootstrap_failure(account: &Account, e: &Error) {
    if e.is_noise() {
        debug!(error = %e, "platform noise during bootstrap");
        error!(
            phone_number = %account.phone_number,
            "failed to get init-data, abandoning account"
        );
    } else {
        error!(
            phone_number = %account.phone_number,
            code = e.code(),
            error = %e,
            "failed to get init-data, abandoning account"
        );
    }
}

/// Sleep for `duration`. Returns false if `shutdown` fired first.
async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn minutes(duration: Duration) -> f64 {
    duration.as_secs_f64() / 60.0
}
