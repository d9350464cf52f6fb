use crate::bounds::Aabb;
use crate::format::POINT_STRIDE;
use crate::point::PointRecord;

/// Immutable, bounds-indexed set of points in file order.
///
/// Bounds, count and footprint are computed once when the collection is built.
/// Nothing mutates the collection afterwards, so it can be shared behind an `Arc`
/// and read from any number of threads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCollection {
    points: Vec<PointRecord>,
    bounds: Aabb,
    memory_footprint: usize,
}

impl PointCollection {
    pub fn new(points: Vec<PointRecord>) -> Self {
        let bounds = Aabb::from_points(&points);
        let memory_footprint = points.len() * POINT_STRIDE;

        Self {
            points,
            bounds,
            memory_footprint,
        }
    }

    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&PointRecord> {
        self.points.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PointRecord> {
        self.points.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Bytes held by the point array (`len * 16`).
    #[inline]
    pub fn memory_footprint(&self) -> usize {
        self.memory_footprint
    }

    /// Raw record memory, suitable for a vertex buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }

    pub fn into_points(self) -> Vec<PointRecord> {
        self.points
    }
}

impl From<Vec<PointRecord>> for PointCollection {
    fn from(points: Vec<PointRecord>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<PointRecord> for PointCollection {
    fn from_iter<I: IntoIterator<Item = PointRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointCollection {
    type Item = &'a PointRecord;
    type IntoIter = std::slice::Iter<'a, PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
