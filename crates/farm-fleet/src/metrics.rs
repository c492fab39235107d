//! Farm loop metrics
//!
//! Recorded through the `metrics` facade; the binary decides whether a
//! Prometheus recorder is installed. Without one every call is a no-op.
//!
//! - `farm_cycles_total` (counter): label `outcome` (`start`, `claim_and_start`, `wait`, `error`)
//! - `farm_claims_total` (counter)
//! - `farm_starts_total` (counter)
//! - `farm_errors_total` (counter): label `code`
//! - `farm_bootstrap_failures_total` (counter)
//! - `farm_accounts_running` (gauge)

pub fn record_cycle(outcome: &'static str) {
    metrics::counter!("farm_cycles_total", "outcome" => outcome).increment(1);
}

pub fn record_claim() {
    metrics::counter!("farm_claims_total").increment(1);
}

pub fn record_start() {
    metrics::counter!("farm_starts_total").increment(1);
}

pub fn record_error(code: &'static str) {
    metrics::counter!("farm_errors_total", "code" => code).increment(1);
}

pub fn record_bootstrap_failure() {
    metrics::counter!("farm_bootstrap_failures_total").increment(1);
}

/// Counts one running account in `farm_accounts_running` until dropped,
/// including when the loop unwinds from a panic.
#[must_use = "the account stops counting as running when the guard drops"]
pub struct RunningGuard(());

pub fn account_running() -> RunningGuard {
    metrics::gauge!("farm_accounts_running").increment(1.0);
    RunningGuard(())
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        metrics::gauge!("farm_accounts_running").decrement(1.0);
    }
}


/// Value of an unlabelled metric in Prometheus text output.
#[cfg(test)]
pub(crate) fn gauge(rendered: &str, name: &str) -> Option<f64> {
    rendered.lines().find_map(|line| {
        let value = line.strip_prefix(name)?.strip_prefix(' ')?;
        value.trim().parse().ok()
    })
}
