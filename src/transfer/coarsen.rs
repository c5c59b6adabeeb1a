use crate::geometry::IndexBox;
use crate::hierarchy::PatchHierarchy;
use crate::transfer::{coarsen_region, CoarsenOpKind};

/// One registered coarsen rule: overwrite `dst_index` on the coarser level
/// with coarsened `src_index` data from the finer level. Ghost-fill passes
/// register these (src, src) to make coarse data consistent with fine data
/// before refinement runs.
#[derive(Debug, Clone, Copy)]
pub struct CoarsenItem {
    pub dst_index: usize,
    pub src_index: usize,
    pub op: CoarsenOpKind,
}

#[derive(Debug, Clone, Copy)]
struct CoarsenTransaction<const N: usize> {
    coarse_patch: usize,
    fine_patch: usize,
    /// Coarse cells covered by the fine patch, in coarse indices.
    coarse_region: IndexBox<N>,
}

/// A cached plan for synchronizing one level pair: every overlap between a
/// fine patch and the coarse cells beneath it.
///
/// The plan depends only on patch geometry; [`CoarsenSchedule::reset`]
/// swaps the registered items without rebuilding it, and is only valid when
/// the item count is unchanged.
#[derive(Debug, Clone)]
pub struct CoarsenSchedule<const N: usize> {
    src_level: usize,
    items: Vec<CoarsenItem>,
    transactions: Vec<CoarsenTransaction<N>>,
}

impl<const N: usize> CoarsenSchedule<N> {
    /// Plans the transfer from `src_level` down to `src_level - 1`.
    pub fn new(hierarchy: &PatchHierarchy<N>, src_level: usize, items: Vec<CoarsenItem>) -> Self {
        assert!(src_level >= 1, "cannot coarsen below level 0");

        let fine = hierarchy.patch_level(src_level);
        let coarse = hierarchy.patch_level(src_level - 1);
        let ratio = fine.ratio_to_coarser();

        let mut transactions = Vec::new();
        for (ci, coarse_box) in coarse.patch_boxes().into_iter().enumerate() {
            for (fi, fine_box) in fine.patch_boxes().into_iter().enumerate() {
                let coarse_region = coarse_box.intersect(&fine_box.coarsened(ratio));
                if coarse_region.is_empty() {
                    continue;
                }

                transactions.push(CoarsenTransaction {
                    coarse_patch: ci,
                    fine_patch: fi,
                    coarse_region,
                });
            }
        }

        Self {
            src_level,
            items,
            transactions,
        }
    }

    pub fn src_level(&self) -> usize {
        self.src_level
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Replaces the registered items without rebuilding the transaction
    /// plan. Valid only when the schedule shape (item count) is unchanged.
    pub fn reset(&mut self, items: Vec<CoarsenItem>) {
        assert_eq!(
            items.len(),
            self.items.len(),
            "coarsen schedule reset must not change the number of registered items"
        );
        self.items = items;
    }

    /// Executes the plan: coarsens fine interior data into the coarse level
    /// for every registered item.
    pub fn coarsen_data(&self, hierarchy: &mut PatchHierarchy<N>) {
        let ratio = hierarchy.patch_level(self.src_level).ratio_to_coarser();
        log::trace!(
            "coarsen schedule: level {} -> {}, {} transactions x {} items",
            self.src_level,
            self.src_level - 1,
            self.transactions.len(),
            self.items.len()
        );

        for tx in &self.transactions {
            let (coarse_level, fine_level) =
                hierarchy.level_pair_mut(self.src_level - 1, self.src_level);

            let fine_patch = fine_level.patch(tx.fine_patch);
            let fine_interior = fine_patch.interior_box();
            let coarse_patch = coarse_level.patch_mut(tx.coarse_patch);

            for item in &self.items {
                let fine_data = fine_patch.data(item.src_index).unwrap_or_else(|| {
                    panic!(
                        "coarsen source data index {} is not allocated on level {}",
                        item.src_index, self.src_level
                    )
                });

                let coarse_data = coarse_patch.data_mut(item.dst_index).unwrap_or_else(|| {
                    panic!(
                        "coarsen destination data index {} is not allocated on level {}",
                        item.dst_index,
                        self.src_level - 1
                    )
                });

                coarsen_region(
                    item.op,
                    fine_data,
                    &fine_interior,
                    coarse_data,
                    &tx.coarse_region,
                    ratio,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Centering;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder};

    #[test]
    fn fine_averages_land_on_coarse_cells() {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .add_level(2, vec![IndexBox::new([4, 4], [11, 11])])
            .build()
            .unwrap();

        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, 1);

        // Fine data is the checkerboard-free function 10, coarse data 0.
        if let Some(data) = hierarchy.patch_level_mut(1).patch_mut(0).data_mut(u) {
            data.as_cell_mut().unwrap().fill(10.0);
        }

        let schedule = CoarsenSchedule::new(
            &hierarchy,
            1,
            vec![CoarsenItem {
                dst_index: u,
                src_index: u,
                op: CoarsenOpKind::ConservativeAverage,
            }],
        );
        schedule.coarsen_data(&mut hierarchy);

        let coarse = hierarchy.patch_level(0).patch(0).data(u).unwrap();
        let coarse = coarse.as_cell().unwrap();

        // Cells beneath the fine patch now carry the fine average.
        assert_eq!(coarse.value([3, 3], 0), 10.0);
        assert_eq!(coarse.value([5, 5], 0), 10.0);
        // Cells outside the fine patch footprint are untouched.
        assert_eq!(coarse.value([0, 0], 0), 0.0);
        assert_eq!(coarse.value([1, 5], 0), 0.0);
    }

    #[test]
    #[should_panic(expected = "must not change the number")]
    fn reset_shape_is_enforced() {
        let geometry = GridGeometry::unit([4, 4], [false, false]);
        let hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [3, 3])])
            .add_level(2, vec![IndexBox::new([0, 0], [3, 3])])
            .build()
            .unwrap();

        let mut schedule = CoarsenSchedule::new(&hierarchy, 1, Vec::new());
        schedule.reset(vec![CoarsenItem {
            dst_index: 0,
            src_index: 0,
            op: CoarsenOpKind::ConservativeAverage,
        }]);
    }
}
