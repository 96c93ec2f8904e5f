use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("I/O error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Mining timed out after {attempts} attempts at difficulty {difficulty}")]
    MiningTimeout { attempts: u64, difficulty: usize },

    #[error("Mining cancelled before a valid nonce was found")]
    MiningCancelled,

    #[error("Concurrent append conflict: expected block index {expected_index}, got {found_index}")]
    ConcurrentAppendConflict { expected_index: u64, found_index: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl LedgerError {
    pub fn missing_field(field: &str) -> Self {
        Self::InvalidPayload(format!("missing required field: {}", field))
    }

    pub fn unknown_action(kind: &str) -> Self {
        Self::InvalidPayload(format!("unrecognized action kind: {}", kind))
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::MiningTimeout { .. } | Self::MiningCancelled | Self::ConcurrentAppendConflict { .. }
        )
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
