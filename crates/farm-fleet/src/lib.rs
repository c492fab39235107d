//! Time Farm farm loop and fleet runner
//!
//! - `store`: the JSON account file
//! - `schedule`: pure cycle arithmetic (what to do, how long to sleep)
//! - `farm`: one account's loop from bootstrap to shutdown
//! - `fleet`: every account's loop, concurrently
//!
//! Collaborators are injected as trait objects (`FarmApi`, `WebViewSource`,
//! `Clock`) so the loop can be driven by fakes and paused tokio time.

pub mod error;
pub mod farm;
pub mod fleet;
pub mod metrics;
pub mod schedule;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use farm::{AccountFarm, CycleReport, FarmOutcome, FarmSettings, FarmState};
pub use fleet::{ApiFactory, Fleet, FleetReport};
pub use schedule::{Clock, Decision, SystemClock};
pub use store::{Account, AccountStore};
