use thiserror::Error;

/// Failure while loading or saving regions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("region storage i/o failed")]
    Io(#[from] std::io::Error),

    #[error("region (de)serialization failed")]
    Serde(#[from] serde_json::Error),

    /// The driver cannot apply this diff; the caller should retry with a
    /// full save.
    #[error("driver does not support partial saves")]
    PartialSaveUnsupported,

    /// The medium parsed but its contents are inconsistent.
    #[error("region data is corrupt: {0}")]
    Corrupt(String),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
