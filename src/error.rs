use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("FETCH_FAILED {dataset}: {message}")]
    Fetch { dataset: String, message: String },
    #[error("TIMEOUT {dataset}: no response after {}", fmt_wait(.waited_ms))]
    Timeout { dataset: String, waited_ms: u64 },
    #[error("PARSE_FAILED {dataset}: {message}")]
    Parse { dataset: String, message: String },
    #[error("IO_FAILURE {dataset}: {message}")]
    Io { dataset: String, message: String },
}

fn fmt_wait(ms: &u64) -> String {
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}ms", ms)
    }
}

impl LoadError {
    pub fn dataset(&self) -> &str {
        match self {
            LoadError::Fetch { dataset, .. }
            | LoadError::Timeout { dataset, .. }
            | LoadError::Parse { dataset, .. }
            | LoadError::Io { dataset, .. } => dataset,
        }
    }

    /// Parse failures are deterministic; retrying the same bytes cannot help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::Fetch { .. } | LoadError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("REFRESH_IN_FLIGHT: a load cycle is already running")]
    InFlight,
    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type LoadResult<T> = Result<T, LoadError>;
