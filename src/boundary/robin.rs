use std::array;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::data::{ArrayData, Centering, PatchData};
use crate::geometry::{physical_boundary_boxes, BoundaryBox, IndexBox, Region, Side};
use crate::hierarchy::Patch;
use crate::transfer::RefinePatchStrategy;

/// Supplies the Robin coefficients `a`, `b`, and `g` over one codim-1
/// boundary box, discretized at boundary face locations.
///
/// `gcoef` is `None` when the caller only needs the homogeneous structure
/// (for example when classifying Dirichlet locations).
pub trait RobinBcCoefStrategy<const N: usize> {
    fn set_bc_coefs(
        &self,
        acoef: &mut ArrayData<N, f64>,
        bcoef: &mut ArrayData<N, f64>,
        gcoef: Option<&mut ArrayData<N, f64>>,
        patch: &Patch<N>,
        bdry_box: &BoundaryBox<N>,
        fill_time: f64,
    );

    /// True if the strategy evaluates the homogeneous problem itself when
    /// asked; otherwise the boundary operator forces `g = 0` in homogeneous
    /// mode.
    fn is_homogeneous_aware(&self) -> bool {
        false
    }
}

/// Shared handle to a coefficient strategy.
pub type SharedRobinBcCoefs<const N: usize> = Arc<dyn RobinBcCoefStrategy<N> + Send + Sync>;

/// Spatially uniform Robin coefficients. The workhorse for tests and for
/// simple physical setups (no-slip walls, uniform traction).
#[derive(Debug, Clone, Copy)]
pub struct ConstantRobinBcCoefs {
    pub acoef: f64,
    pub bcoef: f64,
    pub gcoef: f64,
}

impl ConstantRobinBcCoefs {
    pub fn dirichlet(value: f64) -> Self {
        Self {
            acoef: 1.0,
            bcoef: 0.0,
            gcoef: value,
        }
    }

    pub fn neumann(flux: f64) -> Self {
        Self {
            acoef: 0.0,
            bcoef: 1.0,
            gcoef: flux,
        }
    }
}

impl<const N: usize> RobinBcCoefStrategy<N> for ConstantRobinBcCoefs {
    fn set_bc_coefs(
        &self,
        acoef: &mut ArrayData<N, f64>,
        bcoef: &mut ArrayData<N, f64>,
        gcoef: Option<&mut ArrayData<N, f64>>,
        _patch: &Patch<N>,
        _bdry_box: &BoundaryBox<N>,
        _fill_time: f64,
    ) {
        acoef.fill(self.acoef);
        bcoef.fill(self.bcoef);
        if let Some(gcoef) = gcoef {
            gcoef.fill(self.gcoef);
        }
    }
}

/// Evaluated coefficient fields over one boundary box.
pub struct BcCoefData<const N: usize> {
    pub acoef: ArrayData<N, f64>,
    pub bcoef: ArrayData<N, f64>,
    pub gcoef: ArrayData<N, f64>,
}

/// Whether a traversal applies the boundary operator or accumulates its
/// transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpMode {
    Apply,
    ApplyAdjoint,
}

/// Enforces the Robin condition `a u + b du/dn = g` at the physical
/// boundary for cell- or side-centered double data.
///
/// Codim-1 ghost values come from a one-sided finite-difference closure of
/// the condition; codim-2 and codim-3 regions are filled by linear
/// extrapolation of the values the codim-1 pass already set, never by
/// re-evaluating coefficients. [`RobinBoundaryOperator::apply`] runs codim
/// 1 -> 2 -> 3; [`RobinBoundaryOperator::apply_adjoint`] accumulates the
/// transpose contribution in the reverse order, since the adjoint of
/// "extrapolate faces into corners" is "accumulate corners back into
/// faces". Both share one parameterized per-box routine.
pub struct RobinBoundaryOperator<const N: usize> {
    data_indices: BTreeSet<usize>,
    bc_coefs: Vec<SharedRobinBcCoefs<N>>,
    centering: Centering,
    homogeneous_bc: bool,
}

impl<const N: usize> RobinBoundaryOperator<N> {
    /// Cell-centered operator: one coefficient strategy per depth component.
    pub fn new_cell(
        data_index: usize,
        bc_coefs: Vec<SharedRobinBcCoefs<N>>,
        homogeneous_bc: bool,
    ) -> Self {
        assert!(
            !bc_coefs.is_empty(),
            "cell-centered Robin operator requires at least one coefficient object"
        );

        Self {
            data_indices: BTreeSet::from([data_index]),
            bc_coefs,
            centering: Centering::Cell,
            homogeneous_bc,
        }
    }

    /// Side-centered operator: exactly one coefficient strategy per axis.
    pub fn new_side(
        data_index: usize,
        bc_coefs: Vec<SharedRobinBcCoefs<N>>,
        homogeneous_bc: bool,
    ) -> Self {
        assert_eq!(
            bc_coefs.len(),
            N,
            "side-centered Robin operator requires exactly {N} coefficient objects, got {}",
            bc_coefs.len()
        );

        Self {
            data_indices: BTreeSet::from([data_index]),
            bc_coefs,
            centering: Centering::Side,
            homogeneous_bc,
        }
    }

    pub fn set_patch_data_index(&mut self, data_index: usize) {
        self.data_indices.clear();
        self.data_indices.insert(data_index);
    }

    pub fn set_bc_coefs(&mut self, bc_coefs: Vec<SharedRobinBcCoefs<N>>) {
        match self.centering {
            Centering::Side => assert_eq!(bc_coefs.len(), N),
            _ => assert!(!bc_coefs.is_empty()),
        }
        self.bc_coefs = bc_coefs;
    }

    pub fn set_homogeneous_bc(&mut self, homogeneous_bc: bool) {
        self.homogeneous_bc = homogeneous_bc;
    }

    pub fn homogeneous_bc(&self) -> bool {
        self.homogeneous_bc
    }

    /// Fills physical-boundary ghost values for every registered index.
    pub fn apply(
        &self,
        patch: &mut Patch<N>,
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
    ) {
        self.run(patch, spacing, fill_time, ghost_width, OpMode::Apply);
    }

    /// Accumulates the transpose of the (homogeneous part of the) boundary
    /// operator: ghost contributions flow back onto the interior and
    /// codim-1 values they were built from.
    pub fn apply_adjoint(
        &self,
        patch: &mut Patch<N>,
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
    ) {
        self.run(patch, spacing, fill_time, ghost_width, OpMode::ApplyAdjoint);
    }

    fn run(
        &self,
        patch: &mut Patch<N>,
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
        mode: OpMode,
    ) {
        if ghost_width.iter().all(|&g| g == 0) {
            return;
        }

        self.check_preconditions(patch);

        let patch_box = patch.interior_box();
        let touches = patch.touch_mask();

        let codims: Vec<usize> = match mode {
            OpMode::Apply => (1..=N).collect(),
            OpMode::ApplyAdjoint => (1..=N).rev().collect(),
        };

        for codim in codims {
            let boxes = physical_boundary_boxes(&patch_box, touches, codim);
            if boxes.is_empty() {
                continue;
            }

            for &data_index in &self.data_indices {
                if codim == 1 {
                    self.fill_codim1(
                        patch, data_index, &boxes, spacing, fill_time, ghost_width, mode,
                    );
                } else {
                    self.fill_higher_codim(patch, data_index, &boxes, ghost_width, mode);
                }
            }
        }
    }

    fn check_preconditions(&self, patch: &Patch<N>) {
        for &data_index in &self.data_indices {
            let Some(data) = patch.data(data_index) else {
                continue;
            };

            match (self.centering, data) {
                (Centering::Cell, PatchData::Cell(cell)) => {
                    debug_assert_eq!(
                        cell.depth(),
                        self.bc_coefs.len(),
                        "data depth for index {data_index} does not match the number of \
                         boundary coefficient objects"
                    );
                }
                (Centering::Side, PatchData::Side(_)) => {}
                (expected, data) => panic!(
                    "Robin boundary operator for {expected:?} data applied to index \
                     {data_index} with {:?} centering",
                    data.centering()
                ),
            }

            let ghost = data.ghost_width();
            assert!(
                ghost.iter().all(|&g| g == ghost[0]),
                "patch data for index {data_index} does not have uniform ghost widths: {ghost:?}"
            );
        }
    }

    /// Evaluates coefficients and applies the discrete Robin closure over
    /// every codim-1 box.
    fn fill_codim1(
        &self,
        patch: &mut Patch<N>,
        data_index: usize,
        boxes: &[BoundaryBox<N>],
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
        mode: OpMode,
    ) {
        let Some(data) = patch.data(data_index) else {
            return;
        };
        let data_ghost = data.ghost_width();
        let gcw: [usize; N] = array::from_fn(|axis| data_ghost[axis].min(ghost_width[axis]));

        match self.centering {
            Centering::Cell => {
                let depth = patch
                    .data(data_index)
                    .unwrap()
                    .as_cell()
                    .expect("checked in preconditions")
                    .depth();

                for bdry_box in boxes {
                    let coef_box = side_boundary_box(&bdry_box.bounds, bdry_box.region);

                    for d in 0..depth {
                        let coefs =
                            self.evaluate_coefs(patch, bdry_box, &coef_box, d, fill_time);
                        let cell = patch
                            .data_mut(data_index)
                            .unwrap()
                            .as_cell_mut()
                            .unwrap()
                            .array_mut();
                        robin_closure_column(cell, &coefs, bdry_box, spacing, gcw, d, mode);
                    }
                }
            }
            Centering::Side => {
                for bdry_box in boxes {
                    let normal = bdry_box.normal_axis();

                    for component in 0..N {
                        let mut coef_box = side_boundary_box(&bdry_box.bounds, bdry_box.region);
                        if component != normal {
                            // Component locations extend one further along
                            // their own axis.
                            coef_box.upper[component] += 1;
                        }

                        let coefs = self.evaluate_component_coefs(
                            patch, bdry_box, &coef_box, component, fill_time,
                        );
                        let side = patch
                            .data_mut(data_index)
                            .unwrap()
                            .as_side_mut()
                            .unwrap();

                        for d in 0..side.depth() {
                            let array = side.component_mut(component);
                            if component == normal {
                                robin_closure_normal_sides(
                                    array, &coefs, bdry_box, spacing, gcw, d, mode,
                                );
                            } else {
                                robin_closure_column(
                                    array, &coefs, bdry_box, spacing, gcw, d, mode,
                                );
                            }
                        }
                    }
                }
            }
            centering => panic!("Robin boundary operator does not support {centering:?} data"),
        }
    }

    fn evaluate_coefs(
        &self,
        patch: &Patch<N>,
        bdry_box: &BoundaryBox<N>,
        coef_box: &IndexBox<N>,
        depth: usize,
        fill_time: f64,
    ) -> BcCoefData<N> {
        let strategy = &self.bc_coefs[depth];
        self.evaluate_strategy(strategy, patch, bdry_box, coef_box, fill_time)
    }

    fn evaluate_component_coefs(
        &self,
        patch: &Patch<N>,
        bdry_box: &BoundaryBox<N>,
        coef_box: &IndexBox<N>,
        component: usize,
        fill_time: f64,
    ) -> BcCoefData<N> {
        let strategy = &self.bc_coefs[component];
        self.evaluate_strategy(strategy, patch, bdry_box, coef_box, fill_time)
    }

    fn evaluate_strategy(
        &self,
        strategy: &SharedRobinBcCoefs<N>,
        patch: &Patch<N>,
        bdry_box: &BoundaryBox<N>,
        coef_box: &IndexBox<N>,
        fill_time: f64,
    ) -> BcCoefData<N> {
        let mut coefs = BcCoefData {
            acoef: ArrayData::new(*coef_box, [0; N], 1),
            bcoef: ArrayData::new(*coef_box, [0; N], 1),
            gcoef: ArrayData::new(*coef_box, [0; N], 1),
        };

        strategy.set_bc_coefs(
            &mut coefs.acoef,
            &mut coefs.bcoef,
            Some(&mut coefs.gcoef),
            patch,
            bdry_box,
            fill_time,
        );

        if self.homogeneous_bc && !strategy.is_homogeneous_aware() {
            coefs.gcoef.fill(0.0);
        }

        coefs
    }

    /// Extends codim-1 results into codim-2/3 regions by linear
    /// extrapolation (or accumulates the transpose).
    fn fill_higher_codim(
        &self,
        patch: &mut Patch<N>,
        data_index: usize,
        boxes: &[BoundaryBox<N>],
        ghost_width: [usize; N],
        mode: OpMode,
    ) {
        let Some(data) = patch.data(data_index) else {
            return;
        };
        let data_ghost = data.ghost_width();
        let gcw: [usize; N] = array::from_fn(|axis| data_ghost[axis].min(ghost_width[axis]));
        let patch_box = patch.interior_box();

        match self.centering {
            Centering::Cell => {
                let cell = patch
                    .data_mut(data_index)
                    .unwrap()
                    .as_cell_mut()
                    .unwrap()
                    .array_mut();
                for bdry_box in boxes {
                    let fill_box = bdry_box.fill_box(&patch_box, gcw);
                    corner_extension(cell, &fill_box, &bdry_box.region, &patch_box, None, mode);
                }
            }
            Centering::Side => {
                let side = patch
                    .data_mut(data_index)
                    .unwrap()
                    .as_side_mut()
                    .unwrap();
                for component in 0..N {
                    let array = side.component_mut(component);
                    for bdry_box in boxes {
                        let fill_box = bdry_box.fill_box(&patch_box, gcw);
                        corner_extension(
                            array,
                            &fill_box,
                            &bdry_box.region,
                            &patch_box,
                            Some(component),
                            mode,
                        );
                    }
                }
            }
            centering => panic!("Robin boundary operator does not support {centering:?} data"),
        }
    }
}

impl<const N: usize> RefinePatchStrategy<N> for RobinBoundaryOperator<N> {
    fn set_physical_boundary_conditions(
        &mut self,
        patch: &mut Patch<N>,
        spacing: [f64; N],
        fill_time: f64,
        ghost_width: [usize; N],
    ) {
        self.apply(patch, spacing, fill_time, ghost_width);
    }
}

/// The box of boundary face locations for a codim-1 boundary box: the
/// trimmed tangential extent, with the normal coordinate at the boundary
/// face's side index.
pub(crate) fn side_boundary_box<const N: usize>(
    bounds: &IndexBox<N>,
    region: Region<N>,
) -> IndexBox<N> {
    let normal = region.to_face().axis;
    let mut result = *bounds;

    match region.side(normal) {
        Side::Lower => {
            // The boundary strip sits at lower - 1; the face between it and
            // the interior has side index lower.
            result.lower[normal] += 1;
            result.upper[normal] += 1;
        }
        Side::Upper => {}
        Side::Middle => unreachable!(),
    }

    result
}

/// Applies (or transposes) the discrete Robin closure along every ghost
/// column of one codim-1 box, for data whose locations sit at cell centers
/// along the boundary normal (cell data and tangential side components).
///
/// Ghost layer `k` pairs with the interior location mirrored across the
/// boundary face; with `h` the distance between the pair,
/// `a (u_g + u_i)/2 + b (u_g - u_i)/h = g` closes to
/// `u_g = (g + u_i (b/h - a/2)) / (a/2 + b/h)`.
fn robin_closure_column<const N: usize>(
    data: &mut ArrayData<N, f64>,
    coefs: &BcCoefData<N>,
    bdry_box: &BoundaryBox<N>,
    spacing: [f64; N],
    gcw: [usize; N],
    depth: usize,
    mode: OpMode,
) {
    let face = bdry_box.region.to_face();
    let normal = face.axis;
    let dx = spacing[normal];
    let layers = gcw[normal];

    for coef_index in coefs.acoef.interior().iter() {
        let a = coefs.acoef.value(coef_index, 0);
        let b = coefs.bcoef.value(coef_index, 0);
        let g = coefs.gcoef.value(coef_index, 0);

        for k in 1..=layers {
            let (ghost, interior) = mirror_pair(coef_index, face.side, normal, k);
            if !data.ghost_box().contains(ghost) || !data.ghost_box().contains(interior) {
                continue;
            }

            // Distance between the mirrored pair straddling the boundary.
            let h = (2.0 * k as f64 - 1.0) * dx;
            let denom = 0.5 * a + b / h;
            debug_assert!(
                denom != 0.0,
                "degenerate Robin coefficients a = {a}, b = {b}"
            );
            let slope = (b / h - 0.5 * a) / denom;

            match mode {
                OpMode::Apply => {
                    let u_i = data.value(interior, depth);
                    data.set(ghost, depth, g / denom + slope * u_i);
                }
                OpMode::ApplyAdjoint => {
                    let u_g = data.value(ghost, depth);
                    *data.get_mut(interior, depth) += slope * u_g;
                }
            }
        }
    }
}

/// The closure for the side component normal to the boundary: the boundary
/// face itself carries a degree of freedom, fixed directly from the
/// condition with a one-sided gradient; ghost faces mirror interior faces
/// at spacing `2 k dx`.
fn robin_closure_normal_sides<const N: usize>(
    data: &mut ArrayData<N, f64>,
    coefs: &BcCoefData<N>,
    bdry_box: &BoundaryBox<N>,
    spacing: [f64; N],
    gcw: [usize; N],
    depth: usize,
    mode: OpMode,
) {
    let face = bdry_box.region.to_face();
    let normal = face.axis;
    let dx = spacing[normal];
    let inward = -face.outward();
    let layers = gcw[normal];

    for coef_index in coefs.acoef.interior().iter() {
        let a = coefs.acoef.value(coef_index, 0);
        let b = coefs.bcoef.value(coef_index, 0);
        let g = coefs.gcoef.value(coef_index, 0);

        // Boundary face value: a u + b (u - u_in)/dx = g with the first
        // interior face one spacing inward.
        let boundary = coef_index;
        let mut interior1 = coef_index;
        interior1[normal] += inward;

        let denom = a + b / dx;
        debug_assert!(
            denom != 0.0,
            "degenerate Robin coefficients a = {a}, b = {b}"
        );
        let slope = (b / dx) / denom;

        if data.ghost_box().contains(boundary) && data.ghost_box().contains(interior1) {
            match mode {
                OpMode::Apply => {
                    let u_in = data.value(interior1, depth);
                    data.set(boundary, depth, g / denom + slope * u_in);
                }
                OpMode::ApplyAdjoint => {
                    let u_b = data.value(boundary, depth);
                    *data.get_mut(interior1, depth) += slope * u_b;
                }
            }
        }

        // Ghost faces mirror interior faces across the boundary.
        for k in 1..=layers {
            let mut ghost = coef_index;
            ghost[normal] -= inward * k as isize;
            let mut mirror = coef_index;
            mirror[normal] += inward * k as isize;

            if !data.ghost_box().contains(ghost) || !data.ghost_box().contains(mirror) {
                continue;
            }

            let h = 2.0 * k as f64 * dx;
            let denom = 0.5 * a + b / h;
            let slope = (b / h - 0.5 * a) / denom;

            match mode {
                OpMode::Apply => {
                    let u_i = data.value(mirror, depth);
                    data.set(ghost, depth, g / denom + slope * u_i);
                }
                OpMode::ApplyAdjoint => {
                    let u_g = data.value(ghost, depth);
                    *data.get_mut(mirror, depth) += slope * u_g;
                }
            }
        }
    }
}

/// The ghost/interior cell pair for ghost layer `k` behind a boundary face,
/// starting from a coefficient index whose normal coordinate is the face's
/// side index.
fn mirror_pair<const N: usize>(
    coef_index: [isize; N],
    upper: bool,
    normal: usize,
    k: usize,
) -> ([isize; N], [isize; N]) {
    let mut ghost = coef_index;
    let mut interior = coef_index;
    let k = k as isize;

    if upper {
        // Face side index u+1: ghost cells u+1, u+2, ...; interiors u, u-1, ...
        ghost[normal] += k - 1;
        interior[normal] -= k;
    } else {
        // Face side index l: ghost cells l-1, l-2, ...; interiors l, l+1, ...
        ghost[normal] -= k;
        interior[normal] += k - 1;
    }

    (ghost, interior)
}

/// Linear extension of codim-1 results into a codim-2/3 region (or its
/// transpose): each corner location combines its single-axis projections
/// onto the previously filled strips, minus the over-counted interior
/// projection.
fn corner_extension<const N: usize>(
    data: &mut ArrayData<N, f64>,
    fill_box: &IndexBox<N>,
    region: &Region<N>,
    patch_box: &IndexBox<N>,
    staggered_component: Option<usize>,
    mode: OpMode,
) {
    let mut target = *fill_box;
    if let Some(component) = staggered_component {
        target.upper[component] += 1;
    }
    let target = target.intersect(&data.ghost_box());
    if target.is_empty() {
        return;
    }

    let normal_axes: Vec<usize> = (0..N)
        .filter(|&axis| region.side(axis) != Side::Middle)
        .collect();
    let m = normal_axes.len();
    debug_assert!(m >= 2);

    for index in target.iter() {
        // Clamp one axis at a time back to the nearest owned layer; the
        // all-clamped projection is the interior reference.
        let clamp = |axis: usize| -> isize {
            match region.side(axis) {
                Side::Lower => patch_box.lower[axis],
                Side::Upper => {
                    let owns_extra = staggered_component == Some(axis);
                    patch_box.upper[axis] + owns_extra as isize
                }
                Side::Middle => unreachable!(),
            }
        };

        // Only genuine corner locations, strictly outside the owned range
        // along every normal axis; widened staggered columns on the owned
        // boundary plane belong to the codim-1 pass.
        let strictly_outside = normal_axes.iter().all(|&axis| match region.side(axis) {
            Side::Lower => index[axis] < clamp(axis),
            Side::Upper => index[axis] > clamp(axis),
            Side::Middle => unreachable!(),
        });
        if !strictly_outside {
            continue;
        }

        let mut all_clamped = index;
        for &axis in &normal_axes {
            all_clamped[axis] = clamp(axis);
        }

        for depth in 0..data.depth() {
            match mode {
                OpMode::Apply => {
                    let mut value = -((m as f64 - 1.0) * data.value(all_clamped, depth));
                    for &axis in &normal_axes {
                        let mut projection = all_clamped;
                        projection[axis] = index[axis];
                        value += data.value(projection, depth);
                    }
                    data.set(index, depth, value);
                }
                OpMode::ApplyAdjoint => {
                    let u = data.value(index, depth);
                    for &axis in &normal_axes {
                        let mut projection = all_clamped;
                        projection[axis] = index[axis];
                        *data.get_mut(projection, depth) += u;
                    }
                    *data.get_mut(all_clamped, depth) -= (m as f64 - 1.0) * u;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder, PatchHierarchy};

    fn cell_patch(ghost: usize) -> (PatchHierarchy<2>, usize) {
        let geometry = GridGeometry::unit([8, 8], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [7, 7])])
            .build()
            .unwrap();

        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, ghost);
        (hierarchy, u)
    }

    fn coefs(a: f64, b: f64, g: f64) -> Vec<SharedRobinBcCoefs<2>> {
        vec![Arc::new(ConstantRobinBcCoefs {
            acoef: a,
            bcoef: b,
            gcoef: g,
        })]
    }

    #[test]
    fn dirichlet_closure_hits_boundary_value() {
        let (mut hierarchy, u) = cell_patch(2);
        let spacing = hierarchy.spacing(0);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        patch
            .data_mut(u)
            .unwrap()
            .as_cell_mut()
            .unwrap()
            .fill(3.0);

        let op = RobinBoundaryOperator::new_cell(u, coefs(1.0, 0.0, 4.0), false);
        op.apply(patch, spacing, 0.0, [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        // The face value interpolated between each ghost/interior mirror
        // pair equals the prescribed Dirichlet value.
        for layer in 1..=2isize {
            let ghost = cell.value([-layer, 4], 0);
            let interior = cell.value([layer - 1, 4], 0);
            assert!(((ghost + interior) / 2.0 - 4.0).abs() < 1e-12);

            let ghost = cell.value([7 + layer, 4], 0);
            let interior = cell.value([8 - layer, 4], 0);
            assert!(((ghost + interior) / 2.0 - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn homogeneous_neumann_mirrors_interior() {
        let (mut hierarchy, u) = cell_patch(2);
        let spacing = hierarchy.spacing(0);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [7, 7]).iter() {
                cell.set(index, 0, (1 + index[0] + 13 * index[1]) as f64);
            }
        }

        let op = RobinBoundaryOperator::new_cell(u, coefs(0.0, 1.0, 0.0), false);
        op.apply(patch, spacing, 0.0, [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        for j in 0..8isize {
            for layer in 1..=2isize {
                assert_eq!(cell.value([-layer, j], 0), cell.value([layer - 1, j], 0));
                assert_eq!(cell.value([7 + layer, j], 0), cell.value([8 - layer, j], 0));
            }
        }
    }

    #[test]
    fn homogeneous_mode_forces_g_to_zero() {
        let (mut hierarchy, u) = cell_patch(1);
        let spacing = hierarchy.spacing(0);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        patch
            .data_mut(u)
            .unwrap()
            .as_cell_mut()
            .unwrap()
            .fill(5.0);

        let mut op = RobinBoundaryOperator::new_cell(u, coefs(1.0, 0.0, 100.0), false);
        op.set_homogeneous_bc(true);
        op.apply(patch, spacing, 0.0, [1, 1]);

        // Homogeneous Dirichlet: ghost = -interior regardless of g.
        let cell = patch.data(u).unwrap().as_cell().unwrap();
        assert!((cell.value([-1, 3], 0) + 5.0).abs() < 1e-12);
    }

    #[test]
    fn corners_extend_linearly() {
        let (mut hierarchy, u) = cell_patch(1);
        let spacing = hierarchy.spacing(0);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            // Affine interior data; Neumann-free boundaries reproduce it.
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [7, 7]).iter() {
                cell.set(index, 0, index[0] as f64 + 2.0 * index[1] as f64);
            }
        }

        // Pure Dirichlet with the exact affine trace: u = x + 2 y along
        // x = 0 is not constant, so use Neumann with the exact flux
        // instead: du/dn = -1 at the lower-x wall. Simplest correctness
        // check: corner = edge + edge - interior.
        let op = RobinBoundaryOperator::new_cell(u, coefs(0.0, 1.0, 0.0), false);
        op.apply(patch, spacing, 0.0, [1, 1]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        let expected =
            cell.value([-1, 0], 0) + cell.value([0, -1], 0) - cell.value([0, 0], 0);
        assert!((cell.value([-1, -1], 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn adjoint_transposes_codim1_closure() {
        // <T x, y> == <x, T^t y> for the homogeneous part of the map,
        // checked on a small patch with mixed coefficients.
        let geometry = GridGeometry::unit([4, 4], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [3, 3])])
            .build()
            .unwrap();
        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, 1);
        let spacing = hierarchy.spacing(0);

        let op = RobinBoundaryOperator::new_cell(
            u,
            vec![Arc::new(ConstantRobinBcCoefs {
                acoef: 0.7,
                bcoef: 0.3,
                gcoef: 0.0,
            })],
            true,
        );

        // x: interior seeded, ghosts zero (so untouched ghost slots drop
        // out of <x, T^t y>). T x fills the ghosts.
        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [3, 3]).iter() {
                cell.set(index, 0, (1 + index[0] + 5 * index[1]) as f64);
            }
        }
        let x: Vec<f64> = {
            let cell = patch.data(u).unwrap().as_cell().unwrap();
            cell.ghost_box().iter().map(|i| cell.value(i, 0)).collect()
        };
        op.apply(patch, spacing, 0.0, [1, 1]);
        let tx: Vec<f64> = {
            let cell = patch.data(u).unwrap().as_cell().unwrap();
            cell.ghost_box().iter().map(|i| cell.value(i, 0)).collect()
        };

        // y: an unrelated field over the full ghost box.
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for (n, index) in cell.ghost_box().iter().enumerate() {
                cell.set(index, 0, ((n * 7 + 3) % 11) as f64 - 5.0);
            }
        }
        let y: Vec<f64> = {
            let cell = patch.data(u).unwrap().as_cell().unwrap();
            cell.ghost_box().iter().map(|i| cell.value(i, 0)).collect()
        };
        op.apply_adjoint(patch, spacing, 0.0, [1, 1]);
        let tty: Vec<f64> = {
            let cell = patch.data(u).unwrap().as_cell().unwrap();
            cell.ghost_box().iter().map(|i| cell.value(i, 0)).collect()
        };

        let lhs: f64 = tx.iter().zip(&y).map(|(a, b)| a * b).sum();
        let rhs: f64 = x.iter().zip(&tty).map(|(a, b)| a * b).sum();
        assert!(
            (lhs - rhs).abs() < 1e-9,
            "adjoint identity violated: {lhs} vs {rhs}"
        );
    }
}
