//! Error types for the farm loop and fleet

/// Errors from one farm cycle or from account bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] timefarm_api::Error),

    #[error("no active farming cycle after start")]
    NoActiveCycle,

    #[error("platform error: {0}")]
    Platform(#[from] platform::AuthError),

    #[error("init-data error: {0}")]
    InitData(#[from] platform::InitDataError),
}

impl Error {
    /// Stable short code for log lines and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Api(e) => e.code(),
            Error::NoActiveCycle => "ERR_NO_CYCLE",
            Error::Platform(_) => "ERR_PLATFORM",
            Error::InitData(_) => "ERR_INIT_DATA",
        }
    }

    /// Whether the failure happened while exchanging init-data for a token.
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            Error::Api(e) if e.endpoint() == Some(timefarm_api::Endpoint::ValidateInit)
        )
    }

    /// Platform noise (timeouts, cast errors) that is kept out of the logs.
    pub fn is_noise(&self) -> bool {
        matches!(self, Error::Platform(e) if e.is_noise())
    }
}

/// Result alias for farm operations.
pub type Result<T> = std::result::Result<T, Error>;
