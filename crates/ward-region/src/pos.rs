//! Block and chunk coordinates.

use serde::{Deserialize, Serialize};

/// An integer block position in a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

/// A 16×16 chunk column position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a block position.
    #[must_use]
    pub const fn containing(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> 4,
            z: pos.z >> 4,
        }
    }

    /// Lowest block corner of this chunk (y pinned to `i32::MIN`).
    #[must_use]
    pub const fn min_block(self) -> BlockPos {
        BlockPos::new(self.x << 4, i32::MIN, self.z << 4)
    }

    /// Highest block corner of this chunk (y pinned to `i32::MAX`).
    #[must_use]
    pub const fn max_block(self) -> BlockPos {
        BlockPos::new((self.x << 4) + 15, i32::MAX, (self.z << 4) + 15)
    }
}
