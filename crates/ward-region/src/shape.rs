//! Region shapes and the spatial predicates over them.
//!
//! Point containment is exact for every shape, including the polygon ray
//! cast. Shape-to-shape intersection is a bounding-box predicate; callers that
//! need exact polygon/polygon overlap are expected to refine the candidates
//! themselves.

use serde::{Deserialize, Serialize};

use crate::pos::BlockPos;

/// Axis-aligned bounding box with inclusive corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl BoundingBox {
    #[must_use]
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[must_use]
    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// The shape of a region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionShape {
    /// Matches every point in the world. Only the global region uses this.
    Global,
    /// Axis-aligned box with inclusive corners.
    Cuboid { min: BlockPos, max: BlockPos },
    /// 2D polygon over (x, z) extruded over an inclusive vertical range.
    Polygon {
        points: Vec<(i32, i32)>,
        min_y: i32,
        max_y: i32,
    },
}

impl RegionShape {
    /// Cuboid from two arbitrary corners; corners are normalized.
    #[must_use]
    pub fn cuboid(a: BlockPos, b: BlockPos) -> Self {
        Self::Cuboid {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Whether a block position is inside this shape (inclusive bounds).
    #[must_use]
    pub fn contains(&self, pos: BlockPos) -> bool {
        match self {
            Self::Global => true,
            Self::Cuboid { min, max } => BoundingBox::new(*min, *max).contains(pos),
            Self::Polygon {
                points,
                min_y,
                max_y,
            } => pos.y >= *min_y && pos.y <= *max_y && polygon_contains(points, pos.x, pos.z),
        }
    }

    /// Bounding box of the shape; `None` for the infinite global shape.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Global => None,
            Self::Cuboid { min, max } => Some(BoundingBox::new(*min, *max)),
            Self::Polygon {
                points,
                min_y,
                max_y,
            } => {
                let (&(x0, z0), rest) = points.split_first()?;
                let mut min = BlockPos::new(x0, *min_y, z0);
                let mut max = BlockPos::new(x0, *max_y, z0);
                for &(x, z) in rest {
                    min = min.min(BlockPos::new(x, *min_y, z));
                    max = max.max(BlockPos::new(x, *max_y, z));
                }
                Some(BoundingBox { min, max })
            }
        }
    }

    /// Bounding-box intersection test between two shapes.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (self.bounding_box(), other.bounding_box()) {
            // A global shape intersects everything.
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a.overlaps(&b),
        }
    }
}

/// Even-odd ray cast over integer coordinates.
///
/// Points exactly on a vertex or an edge count as inside.
fn polygon_contains(points: &[(i32, i32)], x: i32, z: i32) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, zi) = points[i];
        let (xj, zj) = points[j];
        if xi == x && zi == z {
            return true;
        }
        if (zi > z) != (zj > z) {
            let d = i64::from(zj) - i64::from(zi);
            let t = (i64::from(xj) - i64::from(xi)) * (i64::from(z) - i64::from(zi))
                - (i64::from(x) - i64::from(xi)) * d;
            if t == 0 {
                // On the edge itself.
                return true;
            }
            if (t > 0) == (d > 0) {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_contains_inclusive() {
        let shape = RegionShape::cuboid(BlockPos::new(10, 0, 10), BlockPos::new(0, 5, 0));
        assert!(shape.contains(BlockPos::new(0, 0, 0)));
        assert!(shape.contains(BlockPos::new(10, 5, 10)));
        assert!(shape.contains(BlockPos::new(5, 2, 5)));
        assert!(!shape.contains(BlockPos::new(11, 2, 5)));
        assert!(!shape.contains(BlockPos::new(5, 6, 5)));
    }

    #[test]
    fn test_global_contains_everything() {
        assert!(RegionShape::Global.contains(BlockPos::new(i32::MIN, 0, i32::MAX)));
        assert_eq!(RegionShape::Global.bounding_box(), None);
    }

    #[test]
    fn test_polygon_contains() {
        // Square with a notch: (0,0) (10,0) (10,10) (5,5) (0,10)
        let shape = RegionShape::Polygon {
            points: vec![(0, 0), (10, 0), (10, 10), (5, 5), (0, 10)],
            min_y: 0,
            max_y: 64,
        };
        assert!(shape.contains(BlockPos::new(2, 32, 2)));
        assert!(shape.contains(BlockPos::new(9, 0, 2)));
        // Inside the notch.
        assert!(!shape.contains(BlockPos::new(5, 32, 9)));
        // Outside the vertical extent.
        assert!(!shape.contains(BlockPos::new(2, 65, 2)));
        // Vertex counts as inside.
        assert!(shape.contains(BlockPos::new(10, 10, 10)));
    }

    #[test]
    fn test_polygon_bounding_box() {
        let shape = RegionShape::Polygon {
            points: vec![(-5, 3), (7, -2), (0, 9)],
            min_y: 10,
            max_y: 20,
        };
        let bb = shape.bounding_box().unwrap();
        assert_eq!(bb.min, BlockPos::new(-5, 10, -2));
        assert_eq!(bb.max, BlockPos::new(7, 20, 9));
    }

    #[test]
    fn test_intersects() {
        let a = RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(10, 10, 10));
        let b = RegionShape::cuboid(BlockPos::new(10, 10, 10), BlockPos::new(20, 20, 20));
        let c = RegionShape::cuboid(BlockPos::new(11, 0, 0), BlockPos::new(20, 10, 10));
        assert!(a.intersects(&b)); // shared corner, inclusive bounds
        assert!(!a.intersects(&c));
        assert!(RegionShape::Global.intersects(&c));
    }
}
