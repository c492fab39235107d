//! Types shared by every crate in the Time Farm farmer workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
