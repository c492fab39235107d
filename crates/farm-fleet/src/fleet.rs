//! Fleet runner
//!
//! Spawns one farm loop per stored account, all concurrent and independent.
//! An account's failure (abandoned bootstrap, bad proxy, even a panic) never
//! affects the others. The runner returns once every loop has ended.

use std::sync::Arc;

use platform::WebViewSource;
use timefarm_api::FarmApi;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::farm::{AccountFarm, FarmOutcome, FarmSettings};
use crate::schedule::Clock;
use crate::store::{Account, AccountStore};

/// Builds the backend client for an account, given its proxy.
pub type ApiFactory =
    Arc<dyn Fn(Option<&str>) -> timefarm_api::Result<Arc<dyn FarmApi>> + Send + Sync>;

/// How the fleet's loops ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FleetReport {
    pub accounts: usize,
    pub abandoned: usize,
    pub stopped: usize,
    pub panicked: usize,
}

pub struct Fleet {
    accounts: Vec<Account>,
    web_view: Arc<dyn WebViewSource>,
    api_factory: ApiFactory,
    clock: Arc<dyn Clock>,
    settings: FarmSettings,
}

impl Fleet {
    pub fn new(
        accounts: Vec<Account>,
        web_view: Arc<dyn WebViewSource>,
        api_factory: ApiFactory,
        clock: Arc<dyn Clock>,
        settings: FarmSettings,
    ) -> Self {
        Self {
            accounts,
            web_view,
            api_factory,
            clock,
            settings,
        }
    }

    /// Fleet over every account currently in `store`.
    pub async fn from_store(
        store: &AccountStore,
        web_view: Arc<dyn WebViewSource>,
        api_factory: ApiFactory,
        clock: Arc<dyn Clock>,
        settings: FarmSettings,
    ) -> Self {
        Self::new(store.list().await, web_view, api_factory, clock, settings)
    }

    /// Run every account until each loop is abandoned or `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> FleetReport {
        let mut report = FleetReport {
            accounts: self.accounts.len(),
            ..FleetReport::default()
        };

        if self.accounts.is_empty() {
            warn!("no accounts registered, nothing to farm");
            return report;
        }

        let mut tasks = JoinSet::new();
        for account in self.accounts {
            let api = match (self.api_factory)(account.proxy()) {
                Ok(api) => api,
                Err(e) => {
                    error!(
                        account_id = account.id,
                        code = e.code(),
                        error = %e,
                        "failed to build backend client, skipping account"
                    );
                    report.abandoned += 1;
                    continue;
                }
            };

            let farm = AccountFarm::new(
                account,
                api,
                self.web_view.clone(),
                self.clock.clone(),
                self.settings,
            );
            tasks.spawn(farm.run(shutdown.child_token()));
        }

        info!(accounts = tasks.len(), "fleet started");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FarmOutcome::Abandoned) => report.abandoned += 1,
                Ok(FarmOutcome::Stopped) => report.stopped += 1,
                Err(e) => {
                    error!(error = %e, "account task terminated abnormally");
                    report.panicked += 1;
                }
            }
        }

        info!(
            abandoned = report.abandoned,
            stopped = report.stopped,
            panicked = report.panicked,
            "fleet finished"
        );
        report
    }
}
