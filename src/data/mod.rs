//! Patch data arrays for the four grid centerings.
//!
//! Every array owns its values together with a ghost halo of fixed width.
//! Indices are always *global* cell (or node, or side) indices on the
//! array's refinement level; the array translates them into storage offsets
//! internally.

mod array;

pub use array::ArrayData;

use crate::geometry::IndexBox;

/// The geometric association of a data sample with the grid.
///
/// Determined once when a variable is registered and carried explicitly
/// thereafter; no runtime type probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Centering {
    /// One sample per cell, at the cell center.
    Cell,
    /// One sample per cell corner.
    Node,
    /// One sample per cell face, indexed normal-axis-major.
    Side,
    /// One sample per cell face, indexed face-major. Storage is identical to
    /// `Side`; only the index convention consumers use differs.
    Face,
}

/// Cell-centered data on one patch.
#[derive(Debug, Clone)]
pub struct CellData<const N: usize, T = f64> {
    data: ArrayData<N, T>,
}

impl<const N: usize, T: Copy + Default> CellData<N, T> {
    pub fn new(interior: IndexBox<N>, ghost: [usize; N], depth: usize) -> Self {
        Self {
            data: ArrayData::new(interior, ghost, depth),
        }
    }

    pub fn array(&self) -> &ArrayData<N, T> {
        &self.data
    }

    pub fn array_mut(&mut self) -> &mut ArrayData<N, T> {
        &mut self.data
    }

    pub fn interior(&self) -> IndexBox<N> {
        self.data.interior()
    }

    pub fn ghost_box(&self) -> IndexBox<N> {
        self.data.ghost_box()
    }

    pub fn ghost_width(&self) -> [usize; N] {
        self.data.ghost_width()
    }

    pub fn depth(&self) -> usize {
        self.data.depth()
    }

    pub fn value(&self, index: [isize; N], depth: usize) -> T {
        self.data.value(index, depth)
    }

    pub fn set(&mut self, index: [isize; N], depth: usize, value: T) {
        self.data.set(index, depth, value);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

/// Node-centered data on one patch. A patch covering cells `lower..=upper`
/// owns nodes `lower..=upper+1` along every axis.
#[derive(Debug, Clone)]
pub struct NodeData<const N: usize, T = f64> {
    data: ArrayData<N, T>,
}

impl<const N: usize, T: Copy + Default> NodeData<N, T> {
    pub fn new(interior: IndexBox<N>, ghost: [usize; N], depth: usize) -> Self {
        let node_box = IndexBox::new(
            interior.lower,
            std::array::from_fn(|axis| interior.upper[axis] + 1),
        );

        Self {
            data: ArrayData::new(node_box, ghost, depth),
        }
    }

    pub fn array(&self) -> &ArrayData<N, T> {
        &self.data
    }

    pub fn array_mut(&mut self) -> &mut ArrayData<N, T> {
        &mut self.data
    }

    /// The box of nodes owned by the patch (one wider than the cell box).
    pub fn node_box(&self) -> IndexBox<N> {
        self.data.interior()
    }

    pub fn ghost_width(&self) -> [usize; N] {
        self.data.ghost_width()
    }

    pub fn depth(&self) -> usize {
        self.data.depth()
    }

    pub fn value(&self, index: [isize; N], depth: usize) -> T {
        self.data.value(index, depth)
    }

    pub fn set(&mut self, index: [isize; N], depth: usize, value: T) {
        self.data.set(index, depth, value);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

/// Side-centered (staggered) data on one patch: one component array per
/// axis, where component `a` lives on faces normal to axis `a` and spans
/// `lower..=upper+1` along that axis only.
#[derive(Debug, Clone)]
pub struct SideData<const N: usize, T = f64> {
    components: [ArrayData<N, T>; N],
}

impl<const N: usize, T: Copy + Default> SideData<N, T> {
    pub fn new(interior: IndexBox<N>, ghost: [usize; N], depth: usize) -> Self {
        Self {
            components: std::array::from_fn(|comp| {
                let mut side_box = interior;
                side_box.upper[comp] += 1;
                ArrayData::new(side_box, ghost, depth)
            }),
        }
    }

    pub fn component(&self, axis: usize) -> &ArrayData<N, T> {
        &self.components[axis]
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut ArrayData<N, T> {
        &mut self.components[axis]
    }

    pub fn ghost_width(&self) -> [usize; N] {
        self.components[0].ghost_width()
    }

    pub fn depth(&self) -> usize {
        self.components[0].depth()
    }

    pub fn value(&self, axis: usize, index: [isize; N], depth: usize) -> T {
        self.components[axis].value(index, depth)
    }

    pub fn set(&mut self, axis: usize, index: [isize; N], depth: usize, value: T) {
        self.components[axis].set(index, depth, value);
    }

    pub fn fill(&mut self, value: T) {
        for component in self.components.iter_mut() {
            component.fill(value);
        }
    }
}

/// Face-centered data. Shares the staggered storage layout of [`SideData`];
/// consumers index it face-major rather than axis-major.
#[derive(Debug, Clone)]
pub struct FaceData<const N: usize, T = f64> {
    inner: SideData<N, T>,
}

impl<const N: usize, T: Copy + Default> FaceData<N, T> {
    pub fn new(interior: IndexBox<N>, ghost: [usize; N], depth: usize) -> Self {
        Self {
            inner: SideData::new(interior, ghost, depth),
        }
    }

    pub fn component(&self, axis: usize) -> &ArrayData<N, T> {
        self.inner.component(axis)
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut ArrayData<N, T> {
        self.inner.component_mut(axis)
    }

    pub fn ghost_width(&self) -> [usize; N] {
        self.inner.ghost_width()
    }

    pub fn depth(&self) -> usize {
        self.inner.depth()
    }

    pub fn value(&self, axis: usize, index: [isize; N], depth: usize) -> T {
        self.inner.value(axis, index, depth)
    }

    pub fn set(&mut self, axis: usize, index: [isize; N], depth: usize, value: T) {
        self.inner.set(axis, index, depth, value);
    }

    pub fn fill(&mut self, value: T) {
        self.inner.fill(value);
    }
}

/// One typed data array owned by a patch.
#[derive(Debug, Clone)]
pub enum PatchData<const N: usize> {
    Cell(CellData<N, f64>),
    Node(NodeData<N, f64>),
    Side(SideData<N, f64>),
    Face(FaceData<N, f64>),
    /// Integer side data, used for masking functions.
    SideFlag(SideData<N, i32>),
}

impl<const N: usize> PatchData<N> {
    /// The box of cells this data was allocated over, regardless of
    /// centering.
    pub fn cell_box(&self) -> IndexBox<N> {
        match self {
            PatchData::Cell(data) => data.interior(),
            PatchData::Node(data) => {
                let mut cells = data.node_box();
                for axis in 0..N {
                    cells.upper[axis] -= 1;
                }
                cells
            }
            PatchData::Side(data) => {
                let mut cells = data.component(0).interior();
                cells.upper[0] -= 1;
                cells
            }
            PatchData::SideFlag(data) => {
                let mut cells = data.component(0).interior();
                cells.upper[0] -= 1;
                cells
            }
            PatchData::Face(data) => {
                let mut cells = data.component(0).interior();
                cells.upper[0] -= 1;
                cells
            }
        }
    }

    /// The cell box extended by the ghost halo.
    pub fn cell_ghost_box(&self) -> IndexBox<N> {
        self.cell_box().grown(self.ghost_width())
    }

    /// Extracts a ghost-free scratch block of the same centering covering
    /// `region` (cell indices), clipped to what this data can provide, then
    /// translated by `shift`. Used to stage refine-kernel source data.
    pub fn gather_scratch(&self, region: &IndexBox<N>, shift: [isize; N]) -> PatchData<N> {
        let clipped = region.intersect(&self.cell_ghost_box());
        debug_assert!(!clipped.is_empty());

        let depth = self.depth();
        let mut scratch = match self {
            PatchData::Cell(_) => PatchData::Cell(CellData::new(clipped, [0; N], depth)),
            PatchData::Node(_) => PatchData::Node(NodeData::new(clipped, [0; N], depth)),
            PatchData::Side(_) => PatchData::Side(SideData::new(clipped, [0; N], depth)),
            PatchData::Face(_) => PatchData::Face(FaceData::new(clipped, [0; N], depth)),
            PatchData::SideFlag(_) => PatchData::SideFlag(SideData::new(clipped, [0; N], depth)),
        };

        crate::transfer::copy_region(self, &mut scratch, &clipped, [0; N]);

        if shift != [0; N] {
            scratch = scratch.shifted(shift);
        }

        scratch
    }

    /// A copy with every component's index box translated by `offset`.
    pub fn shifted(&self, offset: [isize; N]) -> PatchData<N> {
        match self {
            PatchData::Cell(data) => {
                let mut out = data.clone();
                *out.array_mut() = data.array().shifted(offset);
                PatchData::Cell(out)
            }
            PatchData::Node(data) => {
                let mut out = data.clone();
                *out.array_mut() = data.array().shifted(offset);
                PatchData::Node(out)
            }
            PatchData::Side(data) => {
                let mut out = data.clone();
                for axis in 0..N {
                    *out.component_mut(axis) = data.component(axis).shifted(offset);
                }
                PatchData::Side(out)
            }
            PatchData::Face(data) => {
                let mut out = data.clone();
                for axis in 0..N {
                    *out.component_mut(axis) = data.component(axis).shifted(offset);
                }
                PatchData::Face(out)
            }
            PatchData::SideFlag(data) => {
                let mut out = data.clone();
                for axis in 0..N {
                    *out.component_mut(axis) = data.component(axis).shifted(offset);
                }
                PatchData::SideFlag(out)
            }
        }
    }

    pub fn centering(&self) -> Centering {
        match self {
            PatchData::Cell(_) => Centering::Cell,
            PatchData::Node(_) => Centering::Node,
            PatchData::Side(_) | PatchData::SideFlag(_) => Centering::Side,
            PatchData::Face(_) => Centering::Face,
        }
    }

    pub fn ghost_width(&self) -> [usize; N] {
        match self {
            PatchData::Cell(data) => data.ghost_width(),
            PatchData::Node(data) => data.ghost_width(),
            PatchData::Side(data) => data.ghost_width(),
            PatchData::Face(data) => data.ghost_width(),
            PatchData::SideFlag(data) => data.ghost_width(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            PatchData::Cell(data) => data.depth(),
            PatchData::Node(data) => data.depth(),
            PatchData::Side(data) => data.depth(),
            PatchData::Face(data) => data.depth(),
            PatchData::SideFlag(data) => data.depth(),
        }
    }

    pub fn as_cell(&self) -> Option<&CellData<N, f64>> {
        match self {
            PatchData::Cell(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_cell_mut(&mut self) -> Option<&mut CellData<N, f64>> {
        match self {
            PatchData::Cell(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeData<N, f64>> {
        match self {
            PatchData::Node(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeData<N, f64>> {
        match self {
            PatchData::Node(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_side(&self) -> Option<&SideData<N, f64>> {
        match self {
            PatchData::Side(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_side_mut(&mut self) -> Option<&mut SideData<N, f64>> {
        match self {
            PatchData::Side(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_face(&self) -> Option<&FaceData<N, f64>> {
        match self {
            PatchData::Face(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_face_mut(&mut self) -> Option<&mut FaceData<N, f64>> {
        match self {
            PatchData::Face(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_side_flag(&self) -> Option<&SideData<N, i32>> {
        match self {
            PatchData::SideFlag(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_side_flag_mut(&mut self) -> Option<&mut SideData<N, i32>> {
        match self {
            PatchData::SideFlag(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_data_ghost_box() {
        let interior = IndexBox::new([0, 0], [7, 3]);
        let mut data = CellData::<2>::new(interior, [2, 2], 1);

        assert_eq!(data.ghost_box(), IndexBox::new([-2, -2], [9, 5]));

        data.set([-2, -2], 0, 4.5);
        data.set([9, 5], 0, -1.0);
        assert_eq!(data.value([-2, -2], 0), 4.5);
        assert_eq!(data.value([9, 5], 0), -1.0);
        assert_eq!(data.value([0, 0], 0), 0.0);
    }

    #[test]
    fn side_data_component_boxes() {
        let interior = IndexBox::new([0, 0], [3, 3]);
        let data = SideData::<2>::new(interior, [1, 1], 1);

        // Component 0 is one wider along x, component 1 along y.
        assert_eq!(data.component(0).interior(), IndexBox::new([0, 0], [4, 3]));
        assert_eq!(data.component(1).interior(), IndexBox::new([0, 0], [3, 4]));
    }

    #[test]
    fn node_data_covers_corners() {
        let interior = IndexBox::new([0, 0], [3, 3]);
        let data = NodeData::<2>::new(interior, [0, 0], 2);

        assert_eq!(data.node_box(), IndexBox::new([0, 0], [4, 4]));
        assert_eq!(data.depth(), 2);
    }
}
