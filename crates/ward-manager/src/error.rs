use thiserror::Error;
use ward_region::RegionError;
use ward_store::StoreError;

/// Failure of a manager lifecycle operation.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;
