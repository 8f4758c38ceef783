//! CLI-level error type: wraps domain errors plus the I/O and parsing
//! failures that only happen at the filesystem boundary this binary adds
//! around the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Domain(#[from] linkage_core::Error),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("exit code {0}")]
    ExitCode(i32),
}

pub type CliResult<T> = Result<T, CliError>;

impl From<serde_json::Error> for CliError {
    fn from(source: serde_json::Error) -> Self {
        Self::Parse {
            path: "<value>".to_string(),
            source,
        }
    }
}

impl CliError {
    /// The process exit code this error should produce (§7: contract
    /// errors surface their domain error code; everything else is a
    /// generic operator-facing failure).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExitCode(code) => *code,
            Self::Domain(_) => 1,
            _ => 2,
        }
    }
}
