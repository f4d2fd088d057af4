use std::io;

use switchcheck_common::error::ConfigError;
use switchcheck_common::scenario::Policy;
use thiserror::Error;

/// Captured helper output attached to a failed expectation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("switch control channel: {0}")]
    Channel(#[source] io::Error),

    #[error("{selector}@{host}: frame {policy}, listener exited with {status}")]
    MatchFailure {
        host: String,
        selector: String,
        policy: Policy,
        status: String,
        diagnostics: Diagnostics,
    },

    #[error("{selector}@{host}: listener failed with {status}")]
    ListenerCrashed {
        host: String,
        selector: String,
        status: String,
        diagnostics: Diagnostics,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl HarnessError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        HarnessError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            HarnessError::MatchFailure { diagnostics, .. }
            | HarnessError::ListenerCrashed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
