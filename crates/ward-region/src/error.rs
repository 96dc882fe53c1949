//! Structural error taxonomy.
//!
//! Every variant here is raised synchronously by the mutating or registering
//! call that caused it; queries over a validated index never error.

use thiserror::Error;

use crate::flag::{FlagId, FlagKind};
use crate::id::RegionId;

/// Structural error raised at mutation time.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    /// Region name failed validation.
    #[error("invalid region id: '{0}'")]
    InvalidId(String),

    /// A region with the same normalized id already exists.
    #[error("region '{0}' already exists")]
    DuplicateId(RegionId),

    /// The referenced region is not in the index.
    #[error("region '{0}' not found")]
    UnknownRegion(RegionId),

    /// A region references a parent that is not in the index.
    #[error("parent '{parent}' of region '{child}' is not in the index")]
    UnknownParent { child: RegionId, parent: RegionId },

    /// Setting the parent would make the region its own ancestor.
    #[error("setting parent '{parent}' on '{child}' would create a cycle")]
    CircularInheritance { child: RegionId, parent: RegionId },

    /// Parent links may only be changed through the validated setter.
    #[error("parent of '{0}' must be changed through set_parent")]
    ParentViaUpdate(RegionId),

    /// The named flag is not registered.
    #[error("unknown flag '{0}'")]
    UnknownFlag(FlagId),

    /// A flag value of the wrong kind was supplied.
    #[error("flag '{flag}' expects {expected:?} values, got {got:?}")]
    WrongFlagType {
        flag: FlagId,
        expected: FlagKind,
        got: FlagKind,
    },

    /// The flag registry no longer accepts registrations.
    #[error("flag registry is sealed")]
    RegistrySealed,

    /// A flag with the same id is already registered.
    #[error("flag '{0}' is already registered")]
    DuplicateFlag(FlagId),
}

/// Result alias for structural operations.
pub type RegionResult<T> = Result<T, RegionError>;
