//! Error types for scriptbridge

use crate::codec::MarshalError;
use crate::config::ConfigError;
use crate::fault::{FaultStage, FaultState};
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, BridgeError>;

/// The single error type surfaced by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The selector script ran but chose a key with no registered script.
    #[error("Script selector selected invalid script '{key}'")]
    SelectorResolution { key: String },

    /// Lua reported a fault while running a script or touching the namespace.
    #[error("Script fault during {stage}: {fault}")]
    RuntimeFault { stage: FaultStage, fault: FaultState },

    /// A codec or variable name failed on the host side.
    #[error("Marshal error: {0}")]
    Marshal(#[from] MarshalError),

    /// The runtime has not been initialized, or was torn down.
    #[error("script runtime is not initialized")]
    NotInitialized,

    /// Building the Lua state failed.
    #[error("script runtime initialization failed: {0}")]
    Initialization(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A host object mutex was poisoned by a panicking holder.
    #[error("host object lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SelectorResolution,
    RuntimeFault,
    Marshal,
    Lifecycle,
    Config,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SelectorResolution { .. } => ErrorKind::SelectorResolution,
            Self::RuntimeFault { .. } => ErrorKind::RuntimeFault,
            Self::Marshal(_) | Self::LockPoisoned(_) => ErrorKind::Marshal,
            Self::NotInitialized | Self::Initialization(_) => ErrorKind::Lifecycle,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// The captured fault, for [`BridgeError::RuntimeFault`].
    pub fn fault(&self) -> Option<&FaultState> {
        match self {
            Self::RuntimeFault { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<FaultStage> {
        match self {
            Self::RuntimeFault { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
