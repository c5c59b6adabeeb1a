use crate::geometry::{IndexBox, IndexSpace};
use std::array;

/// Flat storage for one centering component: an interior box plus a ghost
/// halo, with `depth` scalar values per location.
///
/// Values are stored depth-major (all of depth 0, then all of depth 1, ...),
/// with the first axis fastest within each depth slab.
#[derive(Debug, Clone)]
pub struct ArrayData<const N: usize, T = f64> {
    interior: IndexBox<N>,
    ghost: [usize; N],
    depth: usize,
    values: Vec<T>,
}

impl<const N: usize, T: Copy + Default> ArrayData<N, T> {
    pub fn new(interior: IndexBox<N>, ghost: [usize; N], depth: usize) -> Self {
        assert!(depth > 0, "ArrayData requires a positive depth");
        assert!(!interior.is_empty(), "ArrayData requires a non-empty box");

        let count = interior.grown(ghost).num_cells() * depth;

        Self {
            interior,
            ghost,
            depth,
            values: vec![T::default(); count],
        }
    }

    pub fn interior(&self) -> IndexBox<N> {
        self.interior
    }

    pub fn ghost_box(&self) -> IndexBox<N> {
        self.interior.grown(self.ghost)
    }

    pub fn ghost_width(&self) -> [usize; N] {
        self.ghost
    }

    /// True if the ghost width is the same along every axis.
    pub fn has_uniform_ghost_width(&self) -> bool {
        self.ghost.iter().all(|&g| g == self.ghost[0])
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn value(&self, index: [isize; N], depth: usize) -> T {
        self.values[self.offset(index, depth)]
    }

    pub fn set(&mut self, index: [isize; N], depth: usize, value: T) {
        let offset = self.offset(index, depth);
        self.values[offset] = value;
    }

    pub fn get_mut(&mut self, index: [isize; N], depth: usize) -> &mut T {
        let offset = self.offset(index, depth);
        &mut self.values[offset]
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// A copy of this array with its index box translated by `offset`.
    /// Values are unchanged; used to relocate periodic-image scratch blocks.
    pub fn shifted(&self, offset: [isize; N]) -> Self {
        Self {
            interior: self.interior.shifted(offset),
            ghost: self.ghost,
            depth: self.depth,
            values: self.values.clone(),
        }
    }

    /// Copies values for all depths over `region` from `source`. The region
    /// must lie in both ghost boxes.
    pub fn copy_from(&mut self, source: &ArrayData<N, T>, region: &IndexBox<N>) {
        debug_assert_eq!(self.depth, source.depth);

        for index in region.iter() {
            for d in 0..self.depth {
                self.set(index, d, source.value(index, d));
            }
        }
    }

    fn offset(&self, index: [isize; N], depth: usize) -> usize {
        let ghost_box = self.ghost_box();

        debug_assert!(
            ghost_box.contains(index),
            "index {index:?} outside ghost box {ghost_box:?}"
        );
        debug_assert!(depth < self.depth);

        let local: [usize; N] =
            array::from_fn(|axis| (index[axis] - ghost_box.lower[axis]) as usize);
        let space = IndexSpace::new(ghost_box.size());

        depth * space.index_count() + space.linear_from_cartesian(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_slabs_are_independent() {
        let interior = IndexBox::new([0], [9]);
        let mut data = ArrayData::<1, f64>::new(interior, [1], 2);

        data.set([3], 0, 1.0);
        data.set([3], 1, 2.0);

        assert_eq!(data.value([3], 0), 1.0);
        assert_eq!(data.value([3], 1), 2.0);
        assert_eq!(data.value([4], 0), 0.0);
    }

    #[test]
    fn copy_from_region() {
        let interior = IndexBox::new([0, 0], [4, 4]);
        let mut a = ArrayData::<2, f64>::new(interior, [1, 1], 1);
        let mut b = ArrayData::<2, f64>::new(interior, [1, 1], 1);

        for index in interior.iter() {
            a.set(index, 0, (index[0] + 10 * index[1]) as f64);
        }

        let region = IndexBox::new([1, 1], [3, 3]);
        b.copy_from(&a, &region);

        assert_eq!(b.value([2, 2], 0), 22.0);
        assert_eq!(b.value([0, 0], 0), 0.0);
    }

    #[test]
    fn uniform_ghost_detection() {
        let interior = IndexBox::new([0, 0], [4, 4]);
        assert!(ArrayData::<2, f64>::new(interior, [2, 2], 1).has_uniform_ghost_width());
        assert!(!ArrayData::<2, f64>::new(interior, [2, 1], 1).has_uniform_ghost_width());
    }
}
