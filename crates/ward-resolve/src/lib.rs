//! Deterministic flag-value resolution.
//!
//! An [`ApplicableRegionSet`] is the immutable snapshot of every region
//! relevant to one query: the regions whose shape contains the queried
//! point, all of their ancestors, and the world's global region. The
//! calculator in this crate is a pure function over that snapshot: it
//! never mutates a region, takes no locks, and always terminates with an
//! answer (possibly "unset").

mod calculator;
mod set;

pub use calculator::MembershipResult;
pub use set::ApplicableRegionSet;
