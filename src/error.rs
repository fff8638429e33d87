//! Error types shared across the crate.
//!
//! Surface failures live next to the trait in [`crate::surface`]; this module
//! holds the configuration, preference and session errors plus the
//! [`ErrorCode`] contract all of them implement.

/// Stable machine-readable code for an error, for hosts that map errors to UI.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {var}")]
    MissingEnv { var: String },
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse setup document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingEnv { .. } => "E_CONFIG_MISSING_ENV",
            Self::InvalidValue { .. } => "E_CONFIG_INVALID_VALUE",
            Self::Read { .. } => "E_CONFIG_READ",
            Self::Parse(_) => "E_CONFIG_PARSE",
            Self::Http { .. } => "E_CONFIG_HTTP",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}

// =============================================================================
// PREFS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("prefs io: {0}")]
    Io(#[from] std::io::Error),
    #[error("prefs json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for PrefsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_PREFS_IO",
            Self::Json(_) => "E_PREFS_JSON",
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Failures of host-facing session calls.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Surface(#[from] crate::surface::SurfaceError),
    #[error("map is not mounted")]
    NotMounted,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Surface(e) => e.error_code(),
            Self::NotMounted => "E_SESSION_NOT_MOUNTED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Config(e) => e.retryable(),
            Self::Surface(e) => e.retryable(),
            Self::NotMounted => false,
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
