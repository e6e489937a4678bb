use thiserror::Error;

/// Errors that can arise while evaluating progression rules or talking to the store.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrapper around sled's error type. The store is unavailable; never retried here.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// User, quest, skill, title, item or dungeon session is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stamina or health too low for the requested action.
    #[error("insufficient {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource: &'static str,
        required: u64,
        available: u64,
    },

    /// Skill points or gold too low.
    #[error("insufficient {currency}: need {required}, have {available}")]
    InsufficientCurrency {
        currency: &'static str,
        required: u64,
        available: u64,
    },

    /// Duplicate registration, already-unlocked skill, already-active dungeon, etc.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or malformed input (bad rank, empty title, invalid username).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown username or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password hashing backend failure or a corrupt stored hash.
    #[error("credential error: {0}")]
    Credential(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },
}

impl EngineError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        EngineError::NotFound(format!("{}: {}", kind, id))
    }

    /// True for failures of the persistence layer itself rather than rule violations.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Sled(_)
                | EngineError::Bincode(_)
                | EngineError::Io(_)
                | EngineError::SchemaMismatch { .. }
        )
    }
}

impl From<crate::validation::ValidationError> for EngineError {
    fn from(err: crate::validation::ValidationError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}
