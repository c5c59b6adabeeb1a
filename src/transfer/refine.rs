use crate::geometry::IndexBox;
use crate::hierarchy::{Patch, PatchHierarchy};
use crate::transfer::{copy_region, refine_region, FillPattern, RefineOpKind};
use std::array;

/// A callback invoked by a refine schedule after data transfer, responsible
/// for ghost regions no interior data can supply: the physical domain
/// boundary.
pub trait RefinePatchStrategy<const N: usize> {
    fn set_physical_boundary_conditions(
        &mut self,
        patch: &mut Patch<N>,
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
    );
}

/// One registered refine rule: fill `dst_index` on the destination level
/// from same-level `src_index` data where available, refining coarser data
/// into the remainder with `op`.
#[derive(Debug, Clone, Copy)]
pub struct RefineItem {
    pub dst_index: usize,
    pub src_index: usize,
    pub op: Option<RefineOpKind>,
    pub pattern: FillPattern,
}

/// A same-level copy: `region` (destination indices) receives source-patch
/// data shifted by `shift` (nonzero only for periodic images).
#[derive(Debug, Clone, Copy)]
struct LevelCopy<const N: usize> {
    dst_patch: usize,
    src_patch: usize,
    region: IndexBox<N>,
    shift: [isize; N],
}

/// A coarse fill: `region` (destination indices) is interpolated from the
/// coarse patch beneath its periodic pre-image.
#[derive(Debug, Clone, Copy)]
struct CoarseFill<const N: usize> {
    dst_patch: usize,
    coarse_patch: usize,
    region: IndexBox<N>,
    shift: [isize; N],
}

/// The cached transfer plan for one item.
#[derive(Debug, Clone)]
struct ItemPlan<const N: usize> {
    ghost: [usize; N],
    copies: Vec<LevelCopy<N>>,
    coarse_fills: Vec<CoarseFill<N>>,
}

/// A cached plan for filling one level's destination data: same-level
/// copies (including periodic images), coarse interpolation into uncovered
/// ghost regions, and physical-boundary strategy callbacks.
///
/// [`RefineSchedule::reset`] swaps items without replanning and requires an
/// unchanged shape: same item count and same per-item ghost widths.
#[derive(Debug, Clone)]
pub struct RefineSchedule<const N: usize> {
    dst_level: usize,
    items: Vec<RefineItem>,
    plans: Vec<ItemPlan<N>>,
}

impl<const N: usize> RefineSchedule<N> {
    pub fn new(hierarchy: &PatchHierarchy<N>, dst_level: usize, items: Vec<RefineItem>) -> Self {
        let plans = items
            .iter()
            .map(|item| Self::plan_item(hierarchy, dst_level, item))
            .collect();

        Self {
            dst_level,
            items,
            plans,
        }
    }

    pub fn dst_level(&self) -> usize {
        self.dst_level
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    fn item_ghost_width(
        hierarchy: &PatchHierarchy<N>,
        dst_level: usize,
        item: &RefineItem,
    ) -> [usize; N] {
        let level = hierarchy.patch_level(dst_level);
        for patch_index in 0..level.num_patches() {
            if let Some(data) = level.patch(patch_index).data(item.dst_index) {
                return data.ghost_width();
            }
        }
        panic!(
            "refine destination data index {} is not allocated on level {dst_level}",
            item.dst_index
        );
    }

    fn plan_item(
        hierarchy: &PatchHierarchy<N>,
        dst_level: usize,
        item: &RefineItem,
    ) -> ItemPlan<N> {
        let ghost = Self::item_ghost_width(hierarchy, dst_level, item);
        let level = hierarchy.patch_level(dst_level);
        let ratio = level.ratio_to_coarser();
        let domain = hierarchy.level_domain(dst_level);

        let mut shifts = vec![[0isize; N]];
        shifts.extend(hierarchy.periodic_shifts(dst_level));

        let src_boxes = level.patch_boxes();
        let coarse_boxes = if dst_level > 0 {
            hierarchy.patch_level(dst_level - 1).patch_boxes()
        } else {
            Vec::new()
        };

        let mut copies = Vec::new();
        let mut coarse_fills = Vec::new();

        for (dp, dst_box) in level.patch_boxes().into_iter().enumerate() {
            let fill_region = dst_box.grown(ghost);
            let mut pieces = match item.pattern {
                FillPattern::InteriorAndGhosts => vec![fill_region],
                FillPattern::GhostsOnly => fill_region.subtract(&dst_box),
            };

            // Same-level coverage, periodic images included.
            for (sp, src_box) in src_boxes.iter().enumerate() {
                for &shift in &shifts {
                    let image = src_box.shifted(shift);
                    let mut next = Vec::new();

                    for piece in &pieces {
                        let overlap = piece.intersect(&image);
                        if overlap.is_empty() {
                            next.push(*piece);
                            continue;
                        }

                        // Copying a variable onto itself in place is a no-op.
                        let identity =
                            sp == dp && shift == [0; N] && item.src_index == item.dst_index;
                        if !identity {
                            copies.push(LevelCopy {
                                dst_patch: dp,
                                src_patch: sp,
                                region: overlap,
                                shift,
                            });
                        }

                        next.extend(piece.subtract(&overlap));
                    }

                    pieces = next;
                }
            }

            // Whatever interior region remains comes from the coarser
            // level; ghost regions beyond the physical domain are left to
            // the boundary strategies.
            if dst_level == 0 {
                continue;
            }

            for piece in pieces {
                for &shift in &shifts {
                    let in_domain = piece.intersect(&domain.shifted(shift));
                    if in_domain.is_empty() {
                        continue;
                    }

                    let pre_image =
                        in_domain.shifted(array::from_fn(|axis| -shift[axis]));
                    let needed_coarse = pre_image.coarsened(ratio);

                    for (cp, coarse_box) in coarse_boxes.iter().enumerate() {
                        let coarse_overlap = needed_coarse.intersect(coarse_box);
                        if coarse_overlap.is_empty() {
                            continue;
                        }

                        let fine_region = coarse_overlap
                            .refined(ratio)
                            .intersect(&pre_image)
                            .shifted(shift);

                        coarse_fills.push(CoarseFill {
                            dst_patch: dp,
                            coarse_patch: cp,
                            region: fine_region,
                            shift,
                        });
                    }
                }
            }
        }

        ItemPlan {
            ghost,
            copies,
            coarse_fills,
        }
    }

    /// Replaces the registered items without replanning. Valid only when the
    /// schedule shape is unchanged: same item count, and each new item's
    /// destination ghost width matches the planned one.
    pub fn reset(&mut self, hierarchy: &PatchHierarchy<N>, items: Vec<RefineItem>) {
        assert_eq!(
            items.len(),
            self.items.len(),
            "refine schedule reset must not change the number of registered items"
        );

        for (item, plan) in items.iter().zip(&self.plans) {
            let ghost = Self::item_ghost_width(hierarchy, self.dst_level, item);
            assert_eq!(
                ghost, plan.ghost,
                "refine schedule reset must not change destination ghost widths"
            );
        }

        self.items = items;
    }

    /// Executes the plan: same-level copies, then coarse interpolation,
    /// then the physical-boundary strategies on every boundary patch.
    pub fn fill_data(
        &self,
        hierarchy: &mut PatchHierarchy<N>,
        fill_time: f64,
        strategies: &mut [&mut dyn RefinePatchStrategy<N>],
    ) {
        log::trace!(
            "refine schedule: level {}, {} items, {} strategies",
            self.dst_level,
            self.items.len(),
            strategies.len()
        );

        for (item, plan) in self.items.iter().zip(&self.plans) {
            self.execute_copies(hierarchy, item, plan);
            if dst_needs_coarse(item) {
                self.execute_coarse_fills(hierarchy, item, plan);
            }
        }

        // The maximum requested width over all items; each strategy clips
        // to its own data's halo.
        let fill_ghost: [usize; N] = array::from_fn(|axis| {
            self.plans
                .iter()
                .map(|plan| plan.ghost[axis])
                .max()
                .unwrap_or(0)
        });

        let spacing = hierarchy.spacing(self.dst_level);
        let level = hierarchy.patch_level_mut(self.dst_level);

        for patch_index in 0..level.num_patches() {
            let patch = level.patch_mut(patch_index);
            if !patch.touches_regular_boundary() {
                continue;
            }

            for strategy in strategies.iter_mut() {
                strategy.set_physical_boundary_conditions(patch, spacing, fill_time, fill_ghost);
            }
        }
    }

    fn execute_copies(&self, hierarchy: &mut PatchHierarchy<N>, item: &RefineItem, plan: &ItemPlan<N>) {
        let level = hierarchy.patch_level_mut(self.dst_level);

        for copy in &plan.copies {
            if copy.src_patch == copy.dst_patch {
                let patch = level.patch_mut(copy.dst_patch);

                if item.src_index == item.dst_index {
                    // Periodic self-image: stage through a scratch block.
                    let src = patch.data(item.src_index).unwrap();
                    let pre_image = copy.region.shifted(array::from_fn(|a| -copy.shift[a]));
                    let scratch = src.gather_scratch(&pre_image, copy.shift);
                    let dst = patch.data_mut(item.dst_index).unwrap();
                    copy_region(&scratch, dst, &copy.region, [0; N]);
                } else {
                    let (src, dst) = patch.data_pair_mut(item.src_index, item.dst_index);
                    let src = src.unwrap_or_else(|| {
                        panic!("refine source data index {} is not allocated", item.src_index)
                    });
                    let dst = dst.unwrap_or_else(|| {
                        panic!(
                            "refine destination data index {} is not allocated",
                            item.dst_index
                        )
                    });
                    copy_region(src, dst, &copy.region, copy.shift);
                }
            } else {
                let (src_patch, dst_patch) = level.patch_pair_mut(copy.src_patch, copy.dst_patch);
                let src = src_patch.data(item.src_index).unwrap_or_else(|| {
                    panic!("refine source data index {} is not allocated", item.src_index)
                });
                let dst = dst_patch.data_mut(item.dst_index).unwrap_or_else(|| {
                    panic!(
                        "refine destination data index {} is not allocated",
                        item.dst_index
                    )
                });
                copy_region(src, dst, &copy.region, copy.shift);
            }
        }
    }

    fn execute_coarse_fills(
        &self,
        hierarchy: &mut PatchHierarchy<N>,
        item: &RefineItem,
        plan: &ItemPlan<N>,
    ) {
        let op = item.op.unwrap();
        let ratio = hierarchy.patch_level(self.dst_level).ratio_to_coarser();

        for fill in &plan.coarse_fills {
            let (coarse_level, fine_level) =
                hierarchy.level_pair_mut(self.dst_level - 1, self.dst_level);

            let coarse_src = coarse_level
                .patch(fill.coarse_patch)
                .data(item.src_index)
                .unwrap_or_else(|| {
                    panic!(
                        "refine source data index {} is not allocated on level {}",
                        item.src_index,
                        self.dst_level - 1
                    )
                });

            // Stage the coarse stencil support, then relocate it to the
            // destination frame (periodic images shift by whole domains, so
            // the coarse shift is exact).
            let pre_image = fill.region.shifted(array::from_fn(|a| -fill.shift[a]));
            let needed = pre_image.coarsened(ratio).grown([1; N]);
            let coarse_shift: [isize; N] =
                array::from_fn(|axis| fill.shift[axis] / ratio as isize);
            let scratch = coarse_src.gather_scratch(&needed, coarse_shift);

            let dst = fine_level
                .patch_mut(fill.dst_patch)
                .data_mut(item.dst_index)
                .unwrap();

            refine_region(op, &scratch, dst, &fill.region, ratio);
        }
    }
}

fn dst_needs_coarse(item: &RefineItem) -> bool {
    item.op.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Centering;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder};

    fn cell_variable(hierarchy: &mut PatchHierarchy<2>, ghost: usize) -> usize {
        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, ghost);
        u
    }

    #[test]
    fn sibling_ghosts_are_copied() {
        let geometry = GridGeometry::unit([8, 4], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(
                1,
                vec![IndexBox::new([0, 0], [3, 3]), IndexBox::new([4, 0], [7, 3])],
            )
            .build()
            .unwrap();

        let u = cell_variable(&mut hierarchy, 2);

        for (p, value) in [(0usize, 1.0f64), (1, 2.0)] {
            hierarchy
                .patch_level_mut(0)
                .patch_mut(p)
                .data_mut(u)
                .unwrap()
                .as_cell_mut()
                .unwrap()
                .fill(value);
        }

        let schedule = RefineSchedule::new(
            &hierarchy,
            0,
            vec![RefineItem {
                dst_index: u,
                src_index: u,
                op: None,
                pattern: FillPattern::GhostsOnly,
            }],
        );
        schedule.fill_data(&mut hierarchy, 0.0, &mut []);

        let left = hierarchy.patch_level(0).patch(0).data(u).unwrap();
        let left = left.as_cell().unwrap();

        // The ghost strip of the left patch inside the right patch now
        // carries the right patch's value.
        assert_eq!(left.value([4, 1], 0), 2.0);
        assert_eq!(left.value([5, 2], 0), 2.0);
        // Interior untouched.
        assert_eq!(left.value([3, 1], 0), 1.0);
    }

    #[test]
    fn periodic_wrap_copies_across_domain() {
        let geometry = GridGeometry::unit([8, 4], [true, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(
                1,
                vec![IndexBox::new([0, 0], [3, 3]), IndexBox::new([4, 0], [7, 3])],
            )
            .build()
            .unwrap();

        let u = cell_variable(&mut hierarchy, 1);

        for (p, value) in [(0usize, 1.0f64), (1, 2.0)] {
            hierarchy
                .patch_level_mut(0)
                .patch_mut(p)
                .data_mut(u)
                .unwrap()
                .as_cell_mut()
                .unwrap()
                .fill(value);
        }

        let schedule = RefineSchedule::new(
            &hierarchy,
            0,
            vec![RefineItem {
                dst_index: u,
                src_index: u,
                op: None,
                pattern: FillPattern::GhostsOnly,
            }],
        );
        schedule.fill_data(&mut hierarchy, 0.0, &mut []);

        let left = hierarchy.patch_level(0).patch(0).data(u).unwrap();
        let left = left.as_cell().unwrap();

        // Left of x=0 wraps around to the right patch.
        assert_eq!(left.value([-1, 1], 0), 2.0);
    }

    #[test]
    fn uncovered_ghosts_come_from_coarse_level() {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .add_level(2, vec![IndexBox::new([4, 4], [11, 11])])
            .build()
            .unwrap();

        let u = cell_variable(&mut hierarchy, 1);

        hierarchy
            .patch_level_mut(0)
            .patch_mut(0)
            .data_mut(u)
            .unwrap()
            .as_cell_mut()
            .unwrap()
            .fill(5.0);

        let schedule = RefineSchedule::new(
            &hierarchy,
            1,
            vec![RefineItem {
                dst_index: u,
                src_index: u,
                op: Some(RefineOpKind::Constant),
                pattern: FillPattern::GhostsOnly,
            }],
        );
        schedule.fill_data(&mut hierarchy, 0.0, &mut []);

        let fine = hierarchy.patch_level(1).patch(0).data(u).unwrap();
        let fine = fine.as_cell().unwrap();

        // The fine patch's lower-left ghost corner sits over coarse data.
        assert_eq!(fine.value([3, 5], 0), 5.0);
        assert_eq!(fine.value([3, 3], 0), 5.0);
        // Interior untouched by a ghosts-only fill.
        assert_eq!(fine.value([5, 5], 0), 0.0);
    }
}
