use bitvec::vec::BitVec;

use crate::boundary::robin::SharedRobinBcCoefs;
use crate::data::ArrayData;
use crate::geometry::{physical_boundary_boxes, BoundaryBox, IndexBox};
use crate::hierarchy::PatchHierarchy;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Tolerance for recognizing the near-binary coefficient structure the
/// staggered solvers assume.
const COEF_EPS: f64 = 1.0e-8;

/// One codim-1 box worth of classification: the boundary face coefficient
/// box and a Dirichlet flag per location, in box iteration order.
#[derive(Debug, Clone)]
struct BoxFlags<const N: usize> {
    bdry_box: BoundaryBox<N>,
    coef_box: IndexBox<N>,
    dirichlet: BitVec,
}

#[derive(Debug, Clone, Default)]
struct PatchEntry<const N: usize> {
    boxes: Vec<BoxFlags<N>>,
}

/// Classifies every codim-1 physical-boundary side-centered degree of
/// freedom as exactly Dirichlet-constrained or not, and exposes the
/// masking and copy utilities staggered solvers build on.
///
/// The classification is cached per `(level, patch slot)` when
/// [`StaggeredBoundaryMask::cache_bc_coef_data`] runs and stays valid until
/// the hierarchy, the coefficients, or their structure change; callers must
/// [`StaggeredBoundaryMask::clear_bc_coef_data`] and re-cache at that
/// point.
#[derive(Debug, Clone, Default)]
pub struct StaggeredBoundaryMask<const N: usize> {
    entries: Vec<Vec<PatchEntry<N>>>,
}

impl<const N: usize> StaggeredBoundaryMask<N> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn is_cached(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Evaluates the axis-appropriate Robin strategy on every codim-1
    /// physical boundary box and records which locations are exactly
    /// Dirichlet (`a ~ 1` and `b ~ 0`).
    ///
    /// The staggered solvers this feeds assume pure Dirichlet-or-Neumann
    /// boundaries: `a + b ~ 1` with one of the two near one is a fatal
    /// precondition, not a tolerated input.
    pub fn cache_bc_coef_data(
        &mut self,
        bc_coefs: &[SharedRobinBcCoefs<N>],
        fill_time: f64,
        hierarchy: &PatchHierarchy<N>,
    ) {
        assert_eq!(
            bc_coefs.len(),
            N,
            "staggered boundary classification requires one coefficient object per axis"
        );

        if self.is_cached() {
            self.clear_bc_coef_data();
        }

        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level(ln);

            let build = |slot: usize| -> PatchEntry<N> {
                let patch = level.patch(slot);
                if !patch.touches_regular_boundary() {
                    return PatchEntry::default();
                }

                let patch_box = patch.interior_box();
                let mut boxes = Vec::new();

                for bdry_box in physical_boundary_boxes(&patch_box, patch.touch_mask(), 1) {
                    let normal = bdry_box.normal_axis();
                    let coef_box = super::robin::side_boundary_box(&bdry_box.bounds, bdry_box.region);

                    let mut acoef = ArrayData::<N, f64>::new(coef_box, [0; N], 1);
                    let mut bcoef = ArrayData::<N, f64>::new(coef_box, [0; N], 1);
                    bc_coefs[normal].set_bc_coefs(
                        &mut acoef, &mut bcoef, None, patch, &bdry_box, fill_time,
                    );

                    let mut dirichlet = BitVec::with_capacity(coef_box.num_cells());
                    for index in coef_box.iter() {
                        let alpha = acoef.value(index, 0);
                        let beta = bcoef.value(index, 0);

                        assert!(
                            (alpha + beta - 1.0).abs() < COEF_EPS,
                            "boundary coefficients at {index:?} do not satisfy a + b = 1: \
                             a = {alpha}, b = {beta}"
                        );
                        assert!(
                            (alpha - 1.0).abs() < COEF_EPS || (beta - 1.0).abs() < COEF_EPS,
                            "boundary coefficients at {index:?} are genuinely mixed \
                             (a = {alpha}, b = {beta}); staggered solvers assume pure \
                             Dirichlet or Neumann locations"
                        );

                        dirichlet
                            .push((alpha - 1.0).abs() < COEF_EPS && beta.abs() < COEF_EPS);
                    }

                    boxes.push(BoxFlags {
                        bdry_box,
                        coef_box,
                        dirichlet,
                    });
                }

                PatchEntry { boxes }
            };

            #[cfg(feature = "parallel")]
            let entries: Vec<PatchEntry<N>> =
                (0..level.num_patches()).into_par_iter().map(build).collect();

            #[cfg(not(feature = "parallel"))]
            let entries: Vec<PatchEntry<N>> = (0..level.num_patches()).map(build).collect();

            self.entries.push(entries);
        }
    }

    /// Invalidates the cached classification.
    pub fn clear_bc_coef_data(&mut self) {
        self.entries.clear();
    }

    /// Copies side values from `src_index` into `dst_index` at flagged
    /// Dirichlet locations only; everything else in the destination is left
    /// untouched. Used to force exact boundary velocities after a solve.
    pub fn copy_data_at_dirichlet_boundaries(
        &self,
        dst_index: usize,
        src_index: usize,
        hierarchy: &mut PatchHierarchy<N>,
    ) {
        self.assert_cached();

        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level_mut(ln);

            for slot in 0..level.num_patches() {
                let entry = &self.entries[ln][slot];
                if entry.boxes.is_empty() {
                    continue;
                }

                let patch = level.patch_mut(slot);
                let (src, dst) = patch.data_pair_mut(src_index, dst_index);
                let src = src
                    .and_then(|d| d.as_side())
                    .expect("Dirichlet copy source must be side-centered double data");
                let dst = dst
                    .and_then(|d| d.as_side_mut())
                    .expect("Dirichlet copy destination must be side-centered double data");

                for flags in &entry.boxes {
                    let normal = flags.bdry_box.normal_axis();

                    for (bit, index) in flags.dirichlet.iter().zip(flags.coef_box.iter()) {
                        if !*bit {
                            continue;
                        }
                        for depth in 0..dst.depth() {
                            let value = src.value(normal, index, depth);
                            dst.set(normal, index, depth, value);
                        }
                    }
                }
            }
        }
    }

    /// Writes 1 into an integer side-centered field at flagged Dirichlet
    /// locations and 0 everywhere else. Consumers use the result to mask
    /// rows and columns during linear-system assembly.
    pub fn setup_masking_function(&self, mask_index: usize, hierarchy: &mut PatchHierarchy<N>) {
        self.assert_cached();

        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level_mut(ln);

            for slot in 0..level.num_patches() {
                let patch = level.patch_mut(slot);
                let mask = patch
                    .data_mut(mask_index)
                    .and_then(|d| d.as_side_flag_mut())
                    .expect("masking function target must be integer side data");

                mask.fill(0);

                for flags in &self.entries[ln][slot].boxes {
                    let normal = flags.bdry_box.normal_axis();

                    for (bit, index) in flags.dirichlet.iter().zip(flags.coef_box.iter()) {
                        if *bit {
                            mask.set(normal, index, 0, 1);
                        }
                    }
                }
            }
        }
    }

    /// True if any boundary location of the patch is Dirichlet-flagged.
    pub fn patch_touches_dirichlet_boundary(&self, level: usize, slot: usize) -> bool {
        (0..N).any(|axis| self.patch_touches_dirichlet_boundary_axis(level, slot, axis))
    }

    /// True if any boundary location with the given normal axis is
    /// Dirichlet-flagged on the patch.
    pub fn patch_touches_dirichlet_boundary_axis(
        &self,
        level: usize,
        slot: usize,
        axis: usize,
    ) -> bool {
        self.assert_cached();

        self.entries[level][slot]
            .boxes
            .iter()
            .filter(|flags| flags.bdry_box.normal_axis() == axis)
            .any(|flags| flags.dirichlet.any())
    }

    fn assert_cached(&self) {
        assert!(
            self.is_cached(),
            "staggered boundary classification queried before cache_bc_coef_data"
        );
    }
}
