use std::collections::BTreeSet;

use crate::data::{ArrayData, PatchData};
use crate::geometry::{coarse_fine_boundary_boxes, BoundaryBox, IndexBox, Side};
use crate::hierarchy::{Patch, PatchHierarchy};
use std::array;

/// Order of the one-sided normal extension applied at coarse-fine
/// interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoarseFineStencil {
    /// Extend linearly from the two interior fine planes adjacent to the
    /// interface.
    Linear,
    /// Extend quadratically from the three interior fine planes adjacent
    /// to the interface.
    Quadratic,
}

/// Per-patch cache entry: the patch box it was computed for, plus its
/// codim-1 coarse-fine boundary boxes.
#[derive(Debug, Clone)]
struct PatchEntry<const N: usize> {
    patch_box: IndexBox<N>,
    boxes: Vec<BoundaryBox<N>>,
}

/// Rewrites ghost values of fine patches across coarse-fine interfaces by
/// one-sided extension along the interface normal, so the ghost profile
/// matches the fine-side gradient rather than the piecewise-refined coarse
/// values a schedule deposits there.
///
/// The codim-1 coarse-fine boundary of every level is computed once when a
/// hierarchy is attached and indexed by `(level, patch slot)`; the whole
/// table drops on [`CoarseFineInterpolationOperator::clear_patch_hierarchy`]
/// or re-attach. Supports sets of cell- and side-centered data indices.
#[derive(Debug, Clone)]
pub struct CoarseFineInterpolationOperator<const N: usize> {
    data_indices: BTreeSet<usize>,
    stencil: CoarseFineStencil,
    cf_boundary: Vec<Vec<PatchEntry<N>>>,
}

impl<const N: usize> CoarseFineInterpolationOperator<N> {
    pub fn new(data_index: usize, stencil: CoarseFineStencil) -> Self {
        Self {
            data_indices: BTreeSet::from([data_index]),
            stencil,
            cf_boundary: Vec::new(),
        }
    }

    pub fn with_indices(data_indices: BTreeSet<usize>, stencil: CoarseFineStencil) -> Self {
        Self {
            data_indices,
            stencil,
            cf_boundary: Vec::new(),
        }
    }

    pub fn set_patch_data_index(&mut self, data_index: usize) {
        self.data_indices.clear();
        self.data_indices.insert(data_index);
    }

    pub fn stencil(&self) -> CoarseFineStencil {
        self.stencil
    }

    /// Computes and caches the codim-1 coarse-fine boundary of every level.
    pub fn set_patch_hierarchy(&mut self, hierarchy: &PatchHierarchy<N>) {
        self.cf_boundary.clear();

        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level(ln);
            let boxes = level.patch_boxes();
            let shifts = hierarchy.periodic_shifts(ln);

            let mut entries = Vec::with_capacity(level.num_patches());
            for (slot, patch) in level.patches().enumerate() {
                // Level 0 has no coarser level; its uncovered faces belong
                // to the physical boundary machinery.
                if ln == 0 {
                    entries.push(PatchEntry {
                        patch_box: patch.interior_box(),
                        boxes: Vec::new(),
                    });
                    continue;
                }

                let mut siblings = Vec::new();
                for (other, other_box) in boxes.iter().enumerate() {
                    if other != slot {
                        siblings.push(*other_box);
                    }
                    for &shift in &shifts {
                        siblings.push(other_box.shifted(shift));
                    }
                }

                entries.push(PatchEntry {
                    patch_box: patch.interior_box(),
                    boxes: coarse_fine_boundary_boxes(
                        &patch.interior_box(),
                        patch.touch_mask(),
                        &siblings,
                    ),
                });
            }

            self.cf_boundary.push(entries);
        }
    }

    /// Drops the cached coarse-fine boundary table.
    pub fn clear_patch_hierarchy(&mut self) {
        self.cf_boundary.clear();
    }

    /// Overwrites coarse-fine ghost values of `patch` (living at `(level,
    /// slot)` of the attached hierarchy) with the one-sided normal
    /// extension, out to `ghost_width` or the data's halo, whichever is
    /// smaller.
    ///
    /// A no-op when no hierarchy is attached, when `(level, slot)` does not
    /// name this patch in the attached hierarchy, or when the patch has no
    /// coarse-fine boundary at its level. The refinement ratio must be
    /// isotropic.
    pub fn compute_normal_extension(
        &self,
        patch: &mut Patch<N>,
        level: usize,
        slot: usize,
        ratio: [usize; N],
        ghost_width: [usize; N],
    ) {
        assert!(
            ratio.iter().all(|&r| r == ratio[0]),
            "coarse-fine interpolation requires an isotropic refinement ratio, got {ratio:?}"
        );

        let Some(entry) = self
            .cf_boundary
            .get(level)
            .and_then(|entries| entries.get(slot))
        else {
            return;
        };
        if entry.patch_box != patch.interior_box() || entry.boxes.is_empty() {
            return;
        }

        for &data_index in &self.data_indices {
            let Some(data) = patch.data_mut(data_index) else {
                continue;
            };

            let data_ghost = data.ghost_width();
            assert!(
                data_ghost.iter().all(|&g| g == data_ghost[0]),
                "patch data for index {data_index} does not have uniform ghost cell widths: \
                 {data_ghost:?}"
            );
            let gcw: [usize; N] =
                array::from_fn(|axis| data_ghost[axis].min(ghost_width[axis]));

            match data {
                PatchData::Cell(cell) => {
                    for bdry_box in &entry.boxes {
                        let fill_box = bdry_box.fill_box(&entry.patch_box, gcw);
                        normal_extension(
                            self.stencil,
                            cell.array_mut(),
                            &fill_box,
                            bdry_box,
                            &entry.patch_box,
                            None,
                        );
                    }
                }
                PatchData::Side(side) => {
                    for component in 0..N {
                        for bdry_box in &entry.boxes {
                            let fill_box = bdry_box.fill_box(&entry.patch_box, gcw);
                            normal_extension(
                                self.stencil,
                                side.component_mut(component),
                                &fill_box,
                                bdry_box,
                                &entry.patch_box,
                                Some(component),
                            );
                        }
                    }
                }
                other => panic!(
                    "coarse-fine interpolation supports cell- and side-centered data, got {:?}",
                    other.centering()
                ),
            }
        }
    }
}

/// One-sided extension along the interface normal. Each ghost location at
/// distance `d` outside the interface is rebuilt from the interior fine
/// planes adjacent to it: linearly from two planes, quadratically from
/// three.
fn normal_extension<const N: usize>(
    stencil: CoarseFineStencil,
    data: &mut ArrayData<N, f64>,
    fill_box: &IndexBox<N>,
    bdry_box: &BoundaryBox<N>,
    patch_box: &IndexBox<N>,
    staggered_component: Option<usize>,
) {
    let face = bdry_box.region.to_face();
    let normal = face.axis;

    let mut target = *fill_box;
    if let Some(component) = staggered_component {
        // Component locations extend one further along their own axis; for
        // the normal component the first "ghost" face is one past the
        // interface face the patch owns.
        target.upper[component] += 1;
    }
    let target = target.intersect(&data.ghost_box());
    if target.is_empty() {
        return;
    }

    // The interface plane of owned data: boundary cells (or faces) against
    // the interface.
    let owns_extra = staggered_component == Some(normal);
    let first_plane = match bdry_box.region.side(normal) {
        Side::Lower => patch_box.lower[normal],
        Side::Upper => patch_box.upper[normal] + owns_extra as isize,
        Side::Middle => unreachable!(),
    };
    let inward = -face.outward();

    for index in target.iter() {
        let distance = (index[normal] - first_plane).abs();
        if distance == 0 {
            continue;
        }
        let d = distance as f64;

        let mut plane0 = index;
        plane0[normal] = first_plane;
        let mut plane1 = plane0;
        plane1[normal] += inward;

        for depth in 0..data.depth() {
            let f0 = data.value(plane0, depth);
            let f1 = data.value(plane1, depth);

            let value = match stencil {
                CoarseFineStencil::Linear => f0 + d * (f0 - f1),
                CoarseFineStencil::Quadratic => {
                    let mut plane2 = plane1;
                    plane2[normal] += inward;
                    let f2 = data.value(plane2, depth);

                    (0.5 * f2 - f1 + 0.5 * f0) * d * d
                        + (-0.5 * f2 + 2.0 * f1 - 1.5 * f0) * d
                        + f0
                }
            };

            data.set(index, depth, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Centering;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder, PatchHierarchy};

    fn refined_corner() -> (PatchHierarchy<2>, usize) {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .add_level(2, vec![IndexBox::new([8, 8], [15, 15])])
            .build()
            .unwrap();

        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, 2);
        (hierarchy, u)
    }

    #[test]
    fn linear_extension_matches_fine_gradient() {
        let (mut hierarchy, u) = refined_corner();

        let mut op = CoarseFineInterpolationOperator::new(u, CoarseFineStencil::Linear);
        op.set_patch_hierarchy(&hierarchy);

        let patch = hierarchy.patch_level_mut(1).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            // Affine fine data; the ghost extension continues it exactly.
            for index in IndexBox::new([8, 8], [15, 15]).iter() {
                cell.set(index, 0, 3.0 * index[0] as f64 - index[1] as f64);
            }
        }

        op.compute_normal_extension(patch, 1, 0, [2, 2], [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        // Lower-x coarse-fine interface ghosts.
        for index in [[7isize, 9isize], [6, 9], [7, 14]] {
            let expected = 3.0 * index[0] as f64 - index[1] as f64;
            assert!(
                (cell.value(index, 0) - expected).abs() < 1e-12,
                "ghost {index:?}"
            );
        }
        // The physical-boundary ghosts (upper x) are untouched by the
        // coarse-fine pass.
        assert_eq!(cell.value([16, 9], 0), 0.0);
    }

    #[test]
    fn quadratic_extension_matches_parabola() {
        let (mut hierarchy, u) = refined_corner();

        let mut op = CoarseFineInterpolationOperator::new(u, CoarseFineStencil::Quadratic);
        op.set_patch_hierarchy(&hierarchy);

        let patch = hierarchy.patch_level_mut(1).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([8, 8], [15, 15]).iter() {
                let x = index[0] as f64;
                cell.set(index, 0, x * x);
            }
        }

        op.compute_normal_extension(patch, 1, 0, [2, 2], [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        for index in [[7isize, 10isize], [6, 10]] {
            let x = index[0] as f64;
            assert!(
                (cell.value(index, 0) - x * x).abs() < 1e-12,
                "ghost {index:?}"
            );
        }
    }

    #[test]
    fn detached_operator_is_a_no_op() {
        let (mut hierarchy, u) = refined_corner();

        let mut op = CoarseFineInterpolationOperator::new(u, CoarseFineStencil::Linear);
        op.set_patch_hierarchy(&hierarchy);
        op.clear_patch_hierarchy();

        let patch = hierarchy.patch_level_mut(1).patch_mut(0);
        patch
            .data_mut(u)
            .unwrap()
            .as_cell_mut()
            .unwrap()
            .fill(1.0);

        op.compute_normal_extension(patch, 1, 0, [2, 2], [2, 2]);

        // Ghosts keep their prior value.
        let cell = patch.data(u).unwrap().as_cell().unwrap();
        assert_eq!(cell.value([7, 9], 0), 1.0);
    }

    #[test]
    #[should_panic(expected = "isotropic refinement ratio")]
    fn anisotropic_ratio_is_fatal() {
        let (mut hierarchy, u) = refined_corner();

        let mut op = CoarseFineInterpolationOperator::new(u, CoarseFineStencil::Linear);
        op.set_patch_hierarchy(&hierarchy);

        let patch = hierarchy.patch_level_mut(1).patch_mut(0);
        op.compute_normal_extension(patch, 1, 0, [2, 4], [2, 2]);
    }
}
