use crate::point::PointRecord;
use glam::Vec3;

/// Axis aligned bounding box of point positions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Zero sized box at the origin, the bounds of an empty cloud.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Single pass over the records, tracking component-wise min and max.
    pub fn from_points(points: &[PointRecord]) -> Self {
        let Some((first, rest)) = points.split_first() else {
            return Self::ZERO;
        };

        let mut min = first.position();
        let mut max = min;

        for point in rest {
            let position = point.position();
            min = min.min(position);
            max = max.max(position);
        }

        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the span on each axis.
    #[inline]
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, position: Vec3) -> bool {
        position.cmpge(self.min).all() && position.cmple(self.max).all()
    }
}
