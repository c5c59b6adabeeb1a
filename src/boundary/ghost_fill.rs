use crate::boundary::{
    CoarseFineInterpolationOperator, CoarseFineStencil, ExtrapolationKind,
    PhysicalExtrapolationOperator, RobinBoundaryOperator, SharedRobinBcCoefs,
};
use crate::data::Centering;
use crate::hierarchy::PatchHierarchy;
use crate::transfer::{
    CoarsenItem, CoarsenSchedule, FillPattern, RefineItem, RefinePatchStrategy, RefineSchedule,
};

/// Configuration for filling one variable's ghost data: where it comes
/// from, how it moves between levels, and which boundary treatment it gets.
///
/// Robin coefficients, when supplied, number one object (cell-centered
/// data, applied to every depth component) or `N` objects (side-centered
/// data, one per axis).
#[derive(Clone)]
pub struct TransactionComponent<const N: usize> {
    pub dst_index: usize,
    pub src_index: usize,
    pub coarsen_op_name: Option<String>,
    pub refine_op_name: Option<String>,
    pub phys_bdry_extrap: Option<ExtrapolationKind>,
    pub use_cf_interpolation: bool,
    pub fill_pattern: FillPattern,
    pub robin_bc_coefs: Vec<Option<SharedRobinBcCoefs<N>>>,
}

impl<const N: usize> TransactionComponent<N> {
    pub fn new(dst_index: usize, src_index: usize) -> Self {
        Self {
            dst_index,
            src_index,
            coarsen_op_name: None,
            refine_op_name: None,
            phys_bdry_extrap: None,
            use_cf_interpolation: false,
            fill_pattern: FillPattern::InteriorAndGhosts,
            robin_bc_coefs: Vec::new(),
        }
    }

    pub fn with_coarsen_op(mut self, name: &str) -> Self {
        self.coarsen_op_name = Some(name.to_owned());
        self
    }

    pub fn with_refine_op(mut self, name: &str) -> Self {
        self.refine_op_name = Some(name.to_owned());
        self
    }

    pub fn with_extrapolation(mut self, kind: ExtrapolationKind) -> Self {
        self.phys_bdry_extrap = Some(kind);
        self
    }

    pub fn with_cf_interpolation(mut self) -> Self {
        self.use_cf_interpolation = true;
        self
    }

    pub fn with_fill_pattern(mut self, pattern: FillPattern) -> Self {
        self.fill_pattern = pattern;
        self
    }

    pub fn with_robin_bc_coefs(
        mut self,
        bc_coefs: Vec<Option<SharedRobinBcCoefs<N>>>,
    ) -> Self {
        self.robin_bc_coefs = bc_coefs;
        self
    }

    fn has_robin_coefs(&self) -> bool {
        self.robin_bc_coefs.iter().any(|c| c.is_some())
    }
}

/// Per-component operator wiring resolved at initialization.
struct ComponentOps<const N: usize> {
    cf_op: Option<CoarseFineInterpolationOperator<N>>,
    extrap_op: Option<PhysicalExtrapolationOperator<N>>,
    cc_robin_op: Option<RobinBoundaryOperator<N>>,
    sc_robin_op: Option<RobinBoundaryOperator<N>>,
}

/// Fills ghost data for a set of variables across a whole patch hierarchy.
///
/// One `fill_data` pass runs three strictly ordered phases:
///
/// 1. coarsen-synchronize, finest level to coarsest, so coarse data
///    reflects every already-computed fine value before it is interpolated
///    anywhere;
/// 2. refine, coarsest to finest: same-level exchange, interpolation from
///    below into uncovered ghost regions, physical extrapolation, and
///    coarse-fine normal extension, so each level's ghosts are valid before
///    the next finer level reads it as a source;
/// 3. Robin physical boundary conditions, coarsest to finest, for the cell
///    and side variants present among the registered components.
///
/// Schedules are built once per hierarchy configuration and cached; a
/// regrid requires [`HierarchyGhostFillOrchestrator::reinitialize_operator_state`].
pub struct HierarchyGhostFillOrchestrator<const N: usize> {
    is_initialized: bool,
    homogeneous_bc: bool,

    components: Vec<TransactionComponent<N>>,
    hierarchy_shape: Vec<usize>,
    coarsest_ln: usize,
    finest_ln: usize,

    coarsen_scheds: Vec<Option<CoarsenSchedule<N>>>,
    refine_scheds: Vec<Option<RefineSchedule<N>>>,
    component_ops: Vec<ComponentOps<N>>,
}

impl<const N: usize> Default for HierarchyGhostFillOrchestrator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HierarchyGhostFillOrchestrator<N> {
    pub fn new() -> Self {
        Self {
            is_initialized: false,
            homogeneous_bc: false,
            components: Vec::new(),
            hierarchy_shape: Vec::new(),
            coarsest_ln: 0,
            finest_ln: 0,
            coarsen_scheds: Vec::new(),
            refine_scheds: Vec::new(),
            component_ops: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Selects homogeneous evaluation of the registered Robin conditions
    /// (`g` forced to zero), used for linearized operator applications.
    pub fn set_homogeneous_bc(&mut self, homogeneous_bc: bool) {
        self.homogeneous_bc = homogeneous_bc;
        for ops in &mut self.component_ops {
            if let Some(op) = &mut ops.cc_robin_op {
                op.set_homogeneous_bc(homogeneous_bc);
            }
            if let Some(op) = &mut ops.sc_robin_op {
                op.set_homogeneous_bc(homogeneous_bc);
            }
        }
    }

    pub fn homogeneous_bc(&self) -> bool {
        self.homogeneous_bc
    }

    /// Builds and caches the communication schedules and boundary operators
    /// for `components` against `hierarchy`. May be called from any state;
    /// an initialized orchestrator deallocates first.
    ///
    /// `coarsest_ln`/`finest_ln` default to the whole hierarchy.
    pub fn initialize_operator_state(
        &mut self,
        components: Vec<TransactionComponent<N>>,
        hierarchy: &mut PatchHierarchy<N>,
        coarsest_ln: Option<usize>,
        finest_ln: Option<usize>,
    ) {
        if self.is_initialized {
            self.deallocate_operator_state();
        }

        self.components = components;
        self.hierarchy_shape = hierarchy.shape();
        self.coarsest_ln = coarsest_ln.unwrap_or(0);
        self.finest_ln = finest_ln.unwrap_or_else(|| hierarchy.finest_level_number());
        assert!(self.coarsest_ln <= self.finest_ln);
        assert!(self.finest_ln <= hierarchy.finest_level_number());

        // The cubic coarsen operators for cell and side data are part of
        // this engine's contract with the geometry registry; registration
        // is idempotent, so any number of orchestrators may ensure it.
        hierarchy
            .grid_geometry_mut()
            .ensure_cubic_coarsen_operators();

        let coarsen_items = self.build_coarsen_items(hierarchy);

        self.coarsen_scheds = (0..=self.finest_ln)
            .map(|ln| {
                if coarsen_items.is_empty() || ln < 1.max(self.coarsest_ln) {
                    None
                } else {
                    Some(CoarsenSchedule::new(hierarchy, ln, coarsen_items.clone()))
                }
            })
            .collect();

        self.component_ops = self
            .components
            .iter()
            .map(|comp| Self::build_component_ops(comp, hierarchy))
            .collect();

        let refine_items = self.build_refine_items(hierarchy);

        self.refine_scheds = (0..=self.finest_ln)
            .map(|ln| {
                if ln < self.coarsest_ln {
                    None
                } else {
                    Some(RefineSchedule::new(hierarchy, ln, refine_items.clone()))
                }
            })
            .collect();

        let homogeneous = self.homogeneous_bc;
        self.set_homogeneous_bc(homogeneous);

        self.is_initialized = true;
    }

    fn build_coarsen_items(&self, hierarchy: &PatchHierarchy<N>) -> Vec<CoarsenItem> {
        let mut items = Vec::new();

        for comp in &self.components {
            let Some(name) = &comp.coarsen_op_name else {
                continue;
            };

            let centering = hierarchy.variables().centering(comp.src_index);
            Self::check_centering(centering, comp.src_index);

            let op = hierarchy
                .grid_geometry()
                .lookup_coarsen_operator(centering, name);

            // Coarsening synchronizes the *source* data with finer levels
            // before any interpolation reads it.
            items.push(CoarsenItem {
                dst_index: comp.src_index,
                src_index: comp.src_index,
                op,
            });
        }

        items
    }

    fn build_refine_items(&self, hierarchy: &PatchHierarchy<N>) -> Vec<RefineItem> {
        self.components
            .iter()
            .map(|comp| {
                let centering = hierarchy.variables().centering(comp.src_index);
                Self::check_centering(centering, comp.src_index);

                let op = comp.refine_op_name.as_ref().map(|name| {
                    hierarchy
                        .grid_geometry()
                        .lookup_refine_operator(centering, name)
                });

                RefineItem {
                    dst_index: comp.dst_index,
                    src_index: comp.src_index,
                    op,
                    pattern: comp.fill_pattern,
                }
            })
            .collect()
    }

    fn check_centering(centering: Centering, data_index: usize) {
        match centering {
            Centering::Cell | Centering::Node | Centering::Side => {}
            other => panic!(
                "hierarchy ghost fill supports cell-, node-, and side-centered double data \
                 only; data index {data_index} is {other:?}-centered"
            ),
        }
    }

    fn build_component_ops(
        comp: &TransactionComponent<N>,
        hierarchy: &PatchHierarchy<N>,
    ) -> ComponentOps<N> {
        let centering = hierarchy.variables().centering(comp.src_index);
        Self::check_centering(centering, comp.src_index);

        let cf_op = if comp.use_cf_interpolation {
            match centering {
                Centering::Cell | Centering::Side => {
                    let mut op = CoarseFineInterpolationOperator::new(
                        comp.dst_index,
                        CoarseFineStencil::Quadratic,
                    );
                    op.set_patch_hierarchy(hierarchy);
                    Some(op)
                }
                Centering::Node => panic!(
                    "coarse-fine interpolation for node-centered data (index {}) is not \
                     supported",
                    comp.src_index
                ),
                _ => unreachable!(),
            }
        } else {
            None
        };

        let extrap_op = comp
            .phys_bdry_extrap
            .map(|kind| PhysicalExtrapolationOperator::new(comp.dst_index, kind));

        let mut cc_robin_op = None;
        let mut sc_robin_op = None;

        if comp.has_robin_coefs() {
            match centering {
                Centering::Cell => {
                    assert_eq!(
                        comp.robin_bc_coefs.len(),
                        1,
                        "cell-centered data takes a single Robin coefficient object, applied \
                         per depth component"
                    );
                    let strategy = comp.robin_bc_coefs[0].clone().unwrap();
                    let depth = hierarchy.variables().depth(comp.dst_index);
                    cc_robin_op = Some(RobinBoundaryOperator::new_cell(
                        comp.dst_index,
                        vec![strategy; depth],
                        false,
                    ));
                }
                Centering::Side => {
                    assert_eq!(
                        comp.robin_bc_coefs.len(),
                        N,
                        "side-centered data takes exactly {N} Robin coefficient objects, one \
                         per axis, got {}",
                        comp.robin_bc_coefs.len()
                    );
                    let strategies: Vec<SharedRobinBcCoefs<N>> = comp
                        .robin_bc_coefs
                        .iter()
                        .map(|c| {
                            c.clone().expect(
                                "side-centered Robin coefficients must be supplied for every axis",
                            )
                        })
                        .collect();
                    sc_robin_op = Some(RobinBoundaryOperator::new_side(
                        comp.dst_index,
                        strategies,
                        false,
                    ));
                }
                Centering::Node => panic!(
                    "Robin boundary conditions for node-centered data (index {}) are not \
                     supported",
                    comp.src_index
                ),
                _ => unreachable!(),
            }
        }

        ComponentOps {
            cf_op,
            extrap_op,
            cc_robin_op,
            sc_robin_op,
        }
    }

    /// Swaps the registered component values without rebuilding schedules.
    ///
    /// Changing the number of components is a fatal configuration error,
    /// detected before any cached state is touched: after a rejected reset
    /// the original schedules remain intact and usable.
    pub fn reset_transaction_components(
        &mut self,
        components: Vec<TransactionComponent<N>>,
        hierarchy: &PatchHierarchy<N>,
    ) {
        assert!(self.is_initialized);
        assert_eq!(
            components.len(),
            self.components.len(),
            "invalid reset operation: attempting to change the number of registered \
             transaction components"
        );

        self.components = components;

        let coarsen_items = self.build_coarsen_items(hierarchy);
        for sched in self.coarsen_scheds.iter_mut().flatten() {
            sched.reset(coarsen_items.clone());
        }

        // Operators keep their caches; only indices, kinds, and
        // coefficients may change.
        for (comp, ops) in self.components.iter().zip(&mut self.component_ops) {
            if let Some(op) = &mut ops.cf_op {
                assert!(comp.use_cf_interpolation);
                op.set_patch_data_index(comp.dst_index);
            } else {
                assert!(!comp.use_cf_interpolation);
            }

            if let Some(op) = &mut ops.extrap_op {
                let kind = comp
                    .phys_bdry_extrap
                    .expect("reset must not remove a component's extrapolation");
                op.set_patch_data_index(comp.dst_index);
                op.set_extrapolation_kind(kind);
            } else {
                assert!(comp.phys_bdry_extrap.is_none());
            }

            if let Some(op) = &mut ops.cc_robin_op {
                assert!(comp.has_robin_coefs());
                let strategy = comp.robin_bc_coefs[0].clone().unwrap();
                let depth = hierarchy.variables().depth(comp.dst_index);
                op.set_bc_coefs(vec![strategy; depth]);
                op.set_patch_data_index(comp.dst_index);
            }
            if let Some(op) = &mut ops.sc_robin_op {
                assert!(comp.has_robin_coefs());
                assert_eq!(comp.robin_bc_coefs.len(), N);
                let strategies = comp
                    .robin_bc_coefs
                    .iter()
                    .map(|c| c.clone().unwrap())
                    .collect();
                op.set_bc_coefs(strategies);
                op.set_patch_data_index(comp.dst_index);
            }
        }

        let refine_items = self.build_refine_items(hierarchy);
        for sched in self.refine_scheds.iter_mut().flatten() {
            sched.reset(hierarchy, refine_items.clone());
        }
    }

    /// Convenience wrapper for the single-component case.
    pub fn reset_transaction_component(
        &mut self,
        component: TransactionComponent<N>,
        hierarchy: &PatchHierarchy<N>,
    ) {
        assert!(self.is_initialized);
        assert_eq!(
            self.components.len(),
            1,
            "invalid reset operation: attempting to change the number of registered \
             transaction components"
        );
        self.reset_transaction_components(vec![component], hierarchy);
    }

    /// Re-attaches the same component configuration to a (re)gridded
    /// hierarchy. A no-op when uninitialized.
    pub fn reinitialize_operator_state(&mut self, hierarchy: &mut PatchHierarchy<N>) {
        if !self.is_initialized {
            return;
        }

        let components = self.components.clone();
        self.initialize_operator_state(components, hierarchy, None, None);
    }

    pub fn deallocate_operator_state(&mut self) {
        if !self.is_initialized {
            return;
        }

        self.component_ops.clear();
        self.coarsen_scheds.clear();
        self.refine_scheds.clear();
        self.is_initialized = false;
    }

    /// Fills ghost data for every registered component at `fill_time`.
    ///
    /// On return, every destination index has valid ghost values out to its
    /// declared halo, consistent across patch boundaries, coarse-fine
    /// interfaces, and the physical boundary.
    pub fn fill_data(&mut self, hierarchy: &mut PatchHierarchy<N>, fill_time: f64) {
        assert!(
            self.is_initialized,
            "fill_data called on an uninitialized ghost fill orchestrator"
        );
        assert_eq!(
            hierarchy.shape(),
            self.hierarchy_shape,
            "hierarchy changed shape since initialization; call reinitialize_operator_state"
        );

        let homogeneous = self.homogeneous_bc;
        self.set_homogeneous_bc(homogeneous);

        // Phase 1: synchronize coarse data with fine data, finest first, so
        // the coarsest levels already reflect all finer information when
        // the refine phase reads them.
        for ln in (1.max(self.coarsest_ln)..=self.finest_ln).rev() {
            if let Some(sched) = &self.coarsen_scheds[ln] {
                sched.coarsen_data(hierarchy);
            }
        }

        // Phase 2: fill each level coarsest to finest; every level's ghosts
        // (physical and coarse-fine) are valid before the next finer level
        // uses it as an interpolation source.
        for ln in self.coarsest_ln..=self.finest_ln {
            let refine_scheds = &self.refine_scheds;
            let mut strategies: Vec<&mut dyn RefinePatchStrategy<N>> = self
                .component_ops
                .iter_mut()
                .filter_map(|ops| {
                    ops.extrap_op
                        .as_mut()
                        .map(|op| op as &mut dyn RefinePatchStrategy<N>)
                })
                .collect();

            if let Some(sched) = &refine_scheds[ln] {
                sched.fill_data(hierarchy, fill_time, &mut strategies);
            }

            let ratio = hierarchy.patch_level(ln).ratio_to_coarser();
            let num_patches = hierarchy.patch_level(ln).num_patches();

            for slot in 0..num_patches {
                for (comp, ops) in self.components.iter().zip(&self.component_ops) {
                    let Some(cf_op) = &ops.cf_op else {
                        continue;
                    };

                    let patch = hierarchy.patch_level_mut(ln).patch_mut(slot);
                    let Some(ghost) = patch.data(comp.dst_index).map(|d| d.ghost_width())
                    else {
                        continue;
                    };

                    cf_op.compute_normal_extension(patch, ln, slot, [ratio; N], ghost);
                }
            }
        }

        // Phase 3: Robin conditions at the regular physical boundary.
        for ln in self.coarsest_ln..=self.finest_ln {
            let spacing = hierarchy.spacing(ln);
            let num_patches = hierarchy.patch_level(ln).num_patches();

            for slot in 0..num_patches {
                if !hierarchy
                    .patch_level(ln)
                    .patch(slot)
                    .touches_regular_boundary()
                {
                    continue;
                }

                for (comp, ops) in self.components.iter().zip(&self.component_ops) {
                    let patch = hierarchy.patch_level_mut(ln).patch_mut(slot);
                    let Some(ghost) = patch.data(comp.dst_index).map(|d| d.ghost_width())
                    else {
                        continue;
                    };

                    if let Some(op) = &ops.cc_robin_op {
                        op.apply(patch, spacing, fill_time, ghost);
                    }
                    if let Some(op) = &ops.sc_robin_op {
                        op.apply(patch, spacing, fill_time, ghost);
                    }
                }
            }
        }

        log::trace!(
            "ghost fill complete: levels {}..={}, {} components, t = {fill_time}",
            self.coarsest_ln,
            self.finest_ln,
            self.components.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ConstantRobinBcCoefs;
    use crate::geometry::IndexBox;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder};
    use crate::transfer::{CONSERVATIVE_COARSEN, LINEAR_REFINE};
    use std::sync::Arc;

    fn two_level_hierarchy() -> (PatchHierarchy<2>, usize) {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .add_level(2, vec![IndexBox::new([4, 4], [11, 11])])
            .build()
            .unwrap();

        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, 2);
        (hierarchy, u)
    }

    fn fill_component(u: usize) -> TransactionComponent<2> {
        TransactionComponent::new(u, u)
            .with_coarsen_op(CONSERVATIVE_COARSEN)
            .with_refine_op(LINEAR_REFINE)
            .with_extrapolation(ExtrapolationKind::Linear)
            .with_cf_interpolation()
            .with_robin_bc_coefs(vec![Some(
                Arc::new(ConstantRobinBcCoefs::dirichlet(1.0)) as _,
            )])
    }

    fn seed(hierarchy: &mut PatchHierarchy<2>, u: usize) {
        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level_mut(ln);
            for slot in 0..level.num_patches() {
                let patch = level.patch_mut(slot);
                let interior = patch.interior_box();
                let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
                cell.fill(f64::NAN);
                for index in interior.iter() {
                    cell.set(index, 0, 1.0);
                }
            }
        }
    }

    #[test]
    fn ghost_width_coverage_no_sentinel_survives() {
        let (mut hierarchy, u) = two_level_hierarchy();
        seed(&mut hierarchy, u);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![fill_component(u)],
            &mut hierarchy,
            None,
            None,
        );
        orchestrator.fill_data(&mut hierarchy, 0.0);

        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level(ln);
            for slot in 0..level.num_patches() {
                let cell = level.patch(slot).data(u).unwrap().as_cell().unwrap();
                for index in cell.ghost_box().iter() {
                    assert!(
                        !cell.value(index, 0).is_nan(),
                        "sentinel survived at level {ln} patch {slot} index {index:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn fill_is_idempotent_without_new_data() {
        use rand::Rng;

        let (mut hierarchy, u) = two_level_hierarchy();
        seed(&mut hierarchy, u);

        // Randomize interiors so the check is not trivially satisfied by
        // symmetric data.
        let mut rng = rand::thread_rng();
        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level_mut(ln);
            for slot in 0..level.num_patches() {
                let patch = level.patch_mut(slot);
                let interior = patch.interior_box();
                let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
                for index in interior.iter() {
                    cell.set(index, 0, rng.gen_range(-1.0..1.0));
                }
            }
        }

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![fill_component(u)],
            &mut hierarchy,
            None,
            None,
        );

        orchestrator.fill_data(&mut hierarchy, 0.0);
        let first: Vec<Vec<f64>> = snapshot(&hierarchy, u);

        orchestrator.fill_data(&mut hierarchy, 0.0);
        let second: Vec<Vec<f64>> = snapshot(&hierarchy, u);

        for (a, b) in first.iter().zip(&second) {
            for (x, y) in a.iter().zip(b) {
                assert_eq!(x.to_bits(), y.to_bits(), "fill is not bit-identical");
            }
        }
    }

    fn snapshot(hierarchy: &PatchHierarchy<2>, u: usize) -> Vec<Vec<f64>> {
        let mut result = Vec::new();
        for ln in 0..hierarchy.num_levels() {
            let level = hierarchy.patch_level(ln);
            for slot in 0..level.num_patches() {
                let cell = level.patch(slot).data(u).unwrap().as_cell().unwrap();
                result.push(cell.ghost_box().iter().map(|i| cell.value(i, 0)).collect());
            }
        }
        result
    }

    #[test]
    fn rejected_reset_leaves_schedules_usable() {
        let (mut hierarchy, u) = two_level_hierarchy();
        seed(&mut hierarchy, u);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![fill_component(u)],
            &mut hierarchy,
            None,
            None,
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            orchestrator.reset_transaction_components(
                vec![fill_component(u), fill_component(u)],
                &hierarchy,
            );
        }));
        assert!(result.is_err(), "wrong-count reset must be fatal");

        // The rejection happened before any cached state was touched; the
        // original configuration still fills.
        orchestrator.fill_data(&mut hierarchy, 0.0);
    }

    #[test]
    fn homogeneous_flag_reaches_robin_operators() {
        let (mut hierarchy, u) = two_level_hierarchy();
        seed(&mut hierarchy, u);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![fill_component(u)],
            &mut hierarchy,
            None,
            None,
        );

        orchestrator.set_homogeneous_bc(true);
        orchestrator.fill_data(&mut hierarchy, 0.0);

        // Homogeneous Dirichlet: interior 1.0 mirrors to -1.0 in the first
        // ghost layer at the physical boundary.
        let cell = hierarchy
            .patch_level(0)
            .patch(0)
            .data(u)
            .unwrap()
            .as_cell()
            .unwrap();
        assert!((cell.value([-1, 3], 0) + 1.0).abs() < 1e-12);

        orchestrator.set_homogeneous_bc(false);
        orchestrator.fill_data(&mut hierarchy, 0.0);
        // Inhomogeneous: boundary value 1.0 and interior 1.0 give ghost 1.0.
        let cell = hierarchy
            .patch_level(0)
            .patch(0)
            .data(u)
            .unwrap()
            .as_cell()
            .unwrap();
        assert!((cell.value([-1, 3], 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reinitialize_follows_a_regrid() {
        let (mut hierarchy, u) = two_level_hierarchy();
        seed(&mut hierarchy, u);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![fill_component(u)],
            &mut hierarchy,
            None,
            None,
        );
        orchestrator.fill_data(&mut hierarchy, 0.0);

        // Regrid: move the fine patch.
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut regridded = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .add_level(2, vec![IndexBox::new([0, 0], [7, 7])])
            .build()
            .unwrap();
        let u2 = regridded
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        assert_eq!(u, u2);
        regridded.allocate_data(u2, 2);
        seed(&mut regridded, u2);

        orchestrator.reinitialize_operator_state(&mut regridded);
        orchestrator.fill_data(&mut regridded, 0.0);
    }

    #[test]
    #[should_panic(expected = "not supported")]
    fn node_cf_interpolation_is_fatal() {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .build()
            .unwrap();
        let w = hierarchy
            .variables_mut()
            .register_variable("w", Centering::Node, 1);
        hierarchy.allocate_data(w, 1);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![TransactionComponent::new(w, w).with_cf_interpolation()],
            &mut hierarchy,
            None,
            None,
        );
    }

    #[test]
    #[should_panic(expected = "exactly 2 Robin coefficient objects")]
    fn side_robin_coefficient_count_is_fatal() {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .build()
            .unwrap();
        let v = hierarchy
            .variables_mut()
            .register_variable("v", Centering::Side, 1);
        hierarchy.allocate_data(v, 1);

        let mut orchestrator = HierarchyGhostFillOrchestrator::new();
        orchestrator.initialize_operator_state(
            vec![TransactionComponent::new(v, v).with_robin_bc_coefs(vec![Some(
                Arc::new(ConstantRobinBcCoefs::dirichlet(0.0)) as _,
            )])],
            &mut hierarchy,
            None,
            None,
        );
    }
}
