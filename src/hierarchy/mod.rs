//! The patch hierarchy substrate: patches, levels, grid geometry, and the
//! variable registry.
//!
//! Structure is separated from bulk field data in the usual way: the
//! hierarchy owns patch boxes and bookkeeping, while typed data arrays are
//! allocated onto patches per registered variable. Boundary operators hold
//! no references into the hierarchy between calls; they cache shapes and
//! take the hierarchy as an argument when they run.

mod geometry;
mod variables;

pub use geometry::GridGeometry;
pub use variables::{VariableDatabase, VariableKind, VariableRecord};

use crate::data::{CellData, Centering, FaceData, NodeData, PatchData, SideData};
use crate::geometry::{faces, IndexBox};
use crate::geometry::FaceMask;
use std::array;
use thiserror::Error;

/// A rectangular region of index space at one refinement level, owning the
/// typed data arrays allocated on it.
#[derive(Debug, Clone)]
pub struct Patch<const N: usize> {
    interior: IndexBox<N>,
    touches: FaceMask<N>,
    data: Vec<Option<PatchData<N>>>,
}

impl<const N: usize> Patch<N> {
    fn new(interior: IndexBox<N>, touches: FaceMask<N>) -> Self {
        Self {
            interior,
            touches,
            data: Vec::new(),
        }
    }

    pub fn interior_box(&self) -> IndexBox<N> {
        self.interior
    }

    /// True if any face of the patch lies on the regular (non-periodic)
    /// physical domain boundary.
    pub fn touches_regular_boundary(&self) -> bool {
        self.touches.any()
    }

    /// Per-face regular-boundary flags.
    pub fn touch_mask(&self) -> FaceMask<N> {
        self.touches
    }

    pub fn data(&self, data_index: usize) -> Option<&PatchData<N>> {
        self.data.get(data_index).and_then(|slot| slot.as_ref())
    }

    pub fn data_mut(&mut self, data_index: usize) -> Option<&mut PatchData<N>> {
        self.data.get_mut(data_index).and_then(|slot| slot.as_mut())
    }

    /// Allocates a data array into the given slot, replacing any previous
    /// allocation. Ghost widths must be uniform across axes.
    pub fn allocate(&mut self, data_index: usize, data: PatchData<N>) {
        let ghost = data.ghost_width();
        assert!(
            ghost.iter().all(|&g| g == ghost[0]),
            "patch data for index {data_index} must have uniform ghost width, got {ghost:?}"
        );

        if self.data.len() <= data_index {
            self.data.resize_with(data_index + 1, || None);
        }
        self.data[data_index] = Some(data);
    }

    pub fn deallocate(&mut self, data_index: usize) {
        if let Some(slot) = self.data.get_mut(data_index) {
            *slot = None;
        }
    }

    /// Mutable access to two distinct data slots at once.
    pub fn data_pair_mut(
        &mut self,
        a: usize,
        b: usize,
    ) -> (Option<&mut PatchData<N>>, Option<&mut PatchData<N>>) {
        assert!(a != b, "data_pair_mut requires distinct indices");

        let (low, high, swapped) = if a < b { (a, b, false) } else { (b, a, true) };
        if self.data.len() <= high {
            return if swapped {
                (None, self.data.get_mut(low).and_then(|s| s.as_mut()))
            } else {
                (self.data.get_mut(low).and_then(|s| s.as_mut()), None)
            };
        }

        let (head, tail) = self.data.split_at_mut(high);
        let low_ref = head[low].as_mut();
        let high_ref = tail[0].as_mut();

        if swapped {
            (high_ref, low_ref)
        } else {
            (low_ref, high_ref)
        }
    }
}

/// An ordered collection of non-overlapping patches at one resolution.
#[derive(Debug, Clone)]
pub struct PatchLevel<const N: usize> {
    level_number: usize,
    ratio_to_coarser: usize,
    patches: Vec<Patch<N>>,
}

impl<const N: usize> PatchLevel<N> {
    pub fn level_number(&self) -> usize {
        self.level_number
    }

    /// Integer refinement ratio to the next coarser level; 1 on level 0.
    pub fn ratio_to_coarser(&self) -> usize {
        self.ratio_to_coarser
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patch(&self, index: usize) -> &Patch<N> {
        &self.patches[index]
    }

    pub fn patch_mut(&mut self, index: usize) -> &mut Patch<N> {
        &mut self.patches[index]
    }

    pub fn patches(&self) -> impl Iterator<Item = &Patch<N>> {
        self.patches.iter()
    }

    pub fn patch_boxes(&self) -> Vec<IndexBox<N>> {
        self.patches.iter().map(|p| p.interior).collect()
    }

    /// Mutable access to two distinct patches at once.
    pub fn patch_pair_mut(&mut self, a: usize, b: usize) -> (&mut Patch<N>, &mut Patch<N>) {
        assert!(a != b, "patch_pair_mut requires distinct indices");

        if a < b {
            let (head, tail) = self.patches.split_at_mut(b);
            (&mut head[a], &mut tail[0])
        } else {
            let (head, tail) = self.patches.split_at_mut(a);
            (&mut tail[0], &mut head[b])
        }
    }
}

/// Errors detected while assembling a hierarchy. These surface to the
/// builder's caller; once a hierarchy exists, the engine treats structural
/// inconsistencies as fatal.
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("hierarchy requires at least one level")]
    Empty,
    #[error("level {level} declares refinement ratio {ratio}; levels above 0 require ratio >= 2")]
    BadRefinementRatio { level: usize, ratio: usize },
    #[error("patch {patch} on level {level} lies outside the level domain")]
    PatchOutsideDomain { level: usize, patch: usize },
    #[error("patches {a} and {b} on level {level} overlap")]
    OverlappingPatches { level: usize, a: usize, b: usize },
}

/// The full multi-level AMR mesh: geometry, variable registry, and levels.
#[derive(Debug, Clone)]
pub struct PatchHierarchy<const N: usize> {
    geometry: GridGeometry<N>,
    variables: VariableDatabase,
    levels: Vec<PatchLevel<N>>,
}

impl<const N: usize> PatchHierarchy<N> {
    pub fn grid_geometry(&self) -> &GridGeometry<N> {
        &self.geometry
    }

    pub fn grid_geometry_mut(&mut self) -> &mut GridGeometry<N> {
        &mut self.geometry
    }

    pub fn variables(&self) -> &VariableDatabase {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableDatabase {
        &mut self.variables
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest_level_number(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn patch_level(&self, level: usize) -> &PatchLevel<N> {
        &self.levels[level]
    }

    pub fn patch_level_mut(&mut self, level: usize) -> &mut PatchLevel<N> {
        &mut self.levels[level]
    }

    /// Mutable access to two distinct levels at once; used by schedules that
    /// read one level while writing its neighbor.
    pub fn level_pair_mut(
        &mut self,
        a: usize,
        b: usize,
    ) -> (&mut PatchLevel<N>, &mut PatchLevel<N>) {
        assert!(a != b, "level_pair_mut requires distinct levels");

        if a < b {
            let (head, tail) = self.levels.split_at_mut(b);
            (&mut head[a], &mut tail[0])
        } else {
            let (head, tail) = self.levels.split_at_mut(a);
            (&mut tail[0], &mut head[b])
        }
    }

    /// Product of refinement ratios from level 0 up to `level`.
    pub fn cumulative_ratio(&self, level: usize) -> usize {
        self.levels[..=level]
            .iter()
            .map(|l| l.ratio_to_coarser.max(1))
            .product()
    }

    /// The domain extent in the index space of `level`.
    pub fn level_domain(&self, level: usize) -> IndexBox<N> {
        self.geometry.domain().refined(self.cumulative_ratio(level))
    }

    /// Grid spacing on `level`.
    pub fn spacing(&self, level: usize) -> [f64; N] {
        let coarse = self.geometry.coarse_spacing();
        let ratio = self.cumulative_ratio(level) as f64;
        array::from_fn(|axis| coarse[axis] / ratio)
    }

    /// Patch counts per level; the orchestrator caches this to detect
    /// regrids between initialization and fill.
    pub fn shape(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.patches.len()).collect()
    }

    /// Nonzero periodic image shifts for boxes on `level`.
    pub fn periodic_shifts(&self, level: usize) -> Vec<[isize; N]> {
        let domain_size = self.level_domain(level).size();
        let periodic = self.geometry.periodic();

        let mut shifts: Vec<[isize; N]> = vec![[0; N]];
        for axis in 0..N {
            if !periodic[axis] {
                continue;
            }

            let extent = domain_size[axis] as isize;
            let mut next = Vec::with_capacity(shifts.len() * 3);
            for shift in &shifts {
                for step in [-extent, 0, extent] {
                    let mut s = *shift;
                    s[axis] = step;
                    next.push(s);
                }
            }
            shifts = next;
        }

        shifts.retain(|s| s.iter().any(|&v| v != 0));
        shifts
    }

    /// Allocates data for a registered variable across every level, with the
    /// given ghost width on all axes.
    pub fn allocate_data(&mut self, data_index: usize, ghost: usize) {
        for level in 0..self.num_levels() {
            self.allocate_data_on_level(data_index, ghost, level);
        }
    }

    pub fn allocate_data_on_level(&mut self, data_index: usize, ghost: usize, level: usize) {
        let record = self.variables.record(data_index).clone();
        let ghost = [ghost; N];

        for patch in self.levels[level].patches.iter_mut() {
            let interior = patch.interior;
            let data = match (record.centering, record.kind) {
                (Centering::Cell, VariableKind::Double) => {
                    PatchData::Cell(CellData::new(interior, ghost, record.depth))
                }
                (Centering::Node, VariableKind::Double) => {
                    PatchData::Node(NodeData::new(interior, ghost, record.depth))
                }
                (Centering::Side, VariableKind::Double) => {
                    PatchData::Side(SideData::new(interior, ghost, record.depth))
                }
                (Centering::Face, VariableKind::Double) => {
                    PatchData::Face(FaceData::new(interior, ghost, record.depth))
                }
                (Centering::Side, VariableKind::Flag) => {
                    PatchData::SideFlag(SideData::new(interior, ghost, record.depth))
                }
                (centering, VariableKind::Flag) => {
                    panic!("flag variables are side-centered only, got {centering:?}")
                }
            };
            patch.allocate(data_index, data);
        }
    }
}

/// Assembles a [`PatchHierarchy`] level by level, validating the structural
/// invariants the engine later relies on.
#[derive(Debug)]
pub struct HierarchyBuilder<const N: usize> {
    geometry: GridGeometry<N>,
    variables: VariableDatabase,
    levels: Vec<(usize, Vec<IndexBox<N>>)>,
}

impl<const N: usize> HierarchyBuilder<N> {
    pub fn new(geometry: GridGeometry<N>) -> Self {
        Self {
            geometry,
            variables: VariableDatabase::new(),
            levels: Vec::new(),
        }
    }

    pub fn variables_mut(&mut self) -> &mut VariableDatabase {
        &mut self.variables
    }

    /// Adds the next finer level. The ratio is relative to the previous
    /// level and is ignored for level 0.
    pub fn add_level(mut self, ratio: usize, boxes: Vec<IndexBox<N>>) -> Self {
        self.levels.push((ratio, boxes));
        self
    }

    pub fn build(self) -> Result<PatchHierarchy<N>, HierarchyError> {
        if self.levels.is_empty() {
            return Err(HierarchyError::Empty);
        }

        let mut hierarchy = PatchHierarchy {
            geometry: self.geometry,
            variables: self.variables,
            levels: Vec::new(),
        };

        for (level_number, (ratio, boxes)) in self.levels.into_iter().enumerate() {
            let ratio = if level_number == 0 { 1 } else { ratio };
            if level_number > 0 && ratio < 2 {
                return Err(HierarchyError::BadRefinementRatio {
                    level: level_number,
                    ratio,
                });
            }

            hierarchy.levels.push(PatchLevel {
                level_number,
                ratio_to_coarser: ratio,
                patches: Vec::new(),
            });

            let domain = hierarchy.level_domain(level_number);
            let periodic = hierarchy.geometry.periodic();

            for (i, interior) in boxes.iter().enumerate() {
                if !domain.contains_box(interior) || interior.is_empty() {
                    return Err(HierarchyError::PatchOutsideDomain {
                        level: level_number,
                        patch: i,
                    });
                }

                for (j, other) in boxes.iter().enumerate().skip(i + 1) {
                    if interior.intersects(other) {
                        return Err(HierarchyError::OverlappingPatches {
                            level: level_number,
                            a: i,
                            b: j,
                        });
                    }
                }

                let mut touches = FaceMask::empty();
                for face in faces::<N>() {
                    if periodic[face.axis] {
                        continue;
                    }

                    let on_boundary = if face.side {
                        interior.upper[face.axis] == domain.upper[face.axis]
                    } else {
                        interior.lower[face.axis] == domain.lower[face.axis]
                    };
                    touches.set_to(face, on_boundary);
                }

                hierarchy.levels[level_number]
                    .patches
                    .push(Patch::new(*interior, touches));
            }
        }

        Ok(hierarchy)
    }
}
