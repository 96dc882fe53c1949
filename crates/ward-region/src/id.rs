//! Region identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RegionError, RegionResult};

/// Reserved id of the world-covering global region.
const GLOBAL_ID: &str = "__global__";

/// A case-insensitive, lowercase-normalized region identifier.
///
/// Two ids that differ only in case compare equal because construction
/// lowercases the name. The global region's id is reserved; use
/// [`RegionId::global`] to obtain it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    /// Parse and normalize a region name.
    ///
    /// Valid names are non-empty and limited to ASCII alphanumerics plus
    /// `_ - + / , '` so every id is safe to embed in file names.
    pub fn new(name: &str) -> RegionResult<Self> {
        if name.is_empty() {
            return Err(RegionError::InvalidId(name.to_string()));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '/' | ',' | '\''));
        if !valid {
            return Err(RegionError::InvalidId(name.to_string()));
        }
        Ok(Self(name.to_ascii_lowercase()))
    }

    /// The reserved id of the global region.
    #[must_use]
    pub fn global() -> Self {
        Self(GLOBAL_ID.to_string())
    }

    /// Whether this is the reserved global-region id.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_ID
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
