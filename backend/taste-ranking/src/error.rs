use crate::registry::RegistryVersion;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TasteError>;

#[derive(Debug, Error)]
pub enum TasteError {
    #[error("Registry mismatch: expected version {expected}, found {found}")]
    RegistryMismatch {
        expected: RegistryVersion,
        found: RegistryVersion,
    },

    #[error("Unknown feature key: {0}")]
    UnknownFeatureKey(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Concurrent update conflict for user {user_id} after {attempts} attempts")]
    ConcurrentUpdate { user_id: Uuid, attempts: u32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<envy::Error> for TasteError {
    fn from(err: envy::Error) -> Self {
        TasteError::Configuration(err.to_string())
    }
}
