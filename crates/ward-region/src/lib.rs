//! Region data model for the ward protection engine.
//!
//! This crate holds the passive entities: positions, shapes, ownership
//! domains, typed flag values, the flag registry, and the [`Region`] struct
//! itself. It contains no query or persistence logic; `ward-index` owns
//! region collections, `ward-resolve` computes flag answers over them.

mod domain;
mod error;
mod flag;
mod id;
mod pos;
mod region;
mod shape;

pub use domain::{Actor, Association, Domain};
pub use error::{RegionError, RegionResult};
pub use flag::{BUILD, FlagDef, FlagId, FlagKind, FlagRegistry, FlagValue, PASSTHROUGH, RegionGroup, State};
pub use id::RegionId;
pub use pos::{BlockPos, ChunkPos};
pub use region::Region;
pub use shape::{BoundingBox, RegionShape};
