use std::collections::BTreeSet;
use std::sync::Once;

use crate::data::ArrayData;
use crate::geometry::{physical_boundary_boxes, IndexBox, Region, Side};
use crate::hierarchy::Patch;
use crate::transfer::RefinePatchStrategy;

static QUADRATIC_WARNING: Once = Once::new();

/// Extrapolation scheme used to fill physical-boundary ghost regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtrapolationKind {
    /// Copy the nearest interior value.
    Constant,
    /// One-sided linear fit along each boundary-normal axis, summed over
    /// the axes a corner or edge region touches.
    Linear,
    /// One-sided three-point fit along the normal axis at codim-1 regions;
    /// falls back to the linear combination at higher codimension.
    Quadratic,
}

impl ExtrapolationKind {
    /// Resolves a caller-supplied extrapolation type name. Unknown names are
    /// a configuration error and abort.
    pub fn from_name(name: &str) -> Self {
        match name {
            "CONSTANT" => ExtrapolationKind::Constant,
            "LINEAR" => ExtrapolationKind::Linear,
            "QUADRATIC" => ExtrapolationKind::Quadratic,
            _ => panic!(
                "unknown extrapolation type {name:?}; valid selections are CONSTANT, LINEAR, or QUADRATIC"
            ),
        }
    }
}

/// Fills ghost regions at the outer physical domain boundary by constant,
/// linear, or quadratic extrapolation from interior data.
///
/// Works for cell-, node-, side-, and face-centered double data; registered
/// indices whose data is absent on a patch are skipped. Every codimension
/// extrapolates purely from interior samples, so the codim 3 -> 2 -> 1
/// processing order carries no data dependencies; it only fixes which write
/// wins where widened staggered regions overlap.
#[derive(Debug, Clone)]
pub struct PhysicalExtrapolationOperator<const N: usize> {
    data_indices: BTreeSet<usize>,
    kind: ExtrapolationKind,
}

impl<const N: usize> PhysicalExtrapolationOperator<N> {
    pub fn new(data_index: usize, kind: ExtrapolationKind) -> Self {
        let mut result = Self {
            data_indices: BTreeSet::new(),
            kind: ExtrapolationKind::Constant,
        };
        result.set_patch_data_index(data_index);
        result.set_extrapolation_kind(kind);
        result
    }

    pub fn with_indices(data_indices: BTreeSet<usize>, kind: ExtrapolationKind) -> Self {
        let mut result = Self {
            data_indices,
            kind: ExtrapolationKind::Constant,
        };
        result.set_extrapolation_kind(kind);
        result
    }

    pub fn set_patch_data_index(&mut self, data_index: usize) {
        self.data_indices.clear();
        self.data_indices.insert(data_index);
    }

    pub fn set_extrapolation_kind(&mut self, kind: ExtrapolationKind) {
        if kind == ExtrapolationKind::Quadratic {
            QUADRATIC_WARNING.call_once(|| {
                log::warn!(
                    "quadratic boundary extrapolation generally requires large ghost cell widths"
                );
            });
        }
        self.kind = kind;
    }

    pub fn extrapolation_kind(&self) -> ExtrapolationKind {
        self.kind
    }

    /// Fills physical-boundary ghost regions of every registered data index
    /// on `patch`, out to `ghost_width` cells.
    pub fn apply(&self, patch: &mut Patch<N>, ghost_width: [usize; N]) {
        if ghost_width.iter().all(|&g| g == 0) {
            return;
        }

        let patch_box = patch.interior_box();
        let touches = patch.touch_mask();

        // Collect fill boxes highest codimension first; the final codim-1
        // writes win at staggered-location overlaps.
        let mut fill_boxes: Vec<(IndexBox<N>, Region<N>)> = Vec::new();
        for codim in (1..=N).rev() {
            for bdry_box in physical_boundary_boxes(&patch_box, touches, codim) {
                fill_boxes.push((bdry_box.fill_box(&patch_box, ghost_width), bdry_box.region));
            }
        }

        for &data_index in &self.data_indices {
            let Some(data) = patch.data_mut(data_index) else {
                continue;
            };

            match data {
                crate::data::PatchData::Cell(cell) => {
                    for (fill_box, region) in &fill_boxes {
                        extrapolate_component(
                            self.kind,
                            cell.array_mut(),
                            fill_box,
                            region,
                            &patch_box,
                            CenteringShape::Cell,
                        );
                    }
                }
                crate::data::PatchData::Node(node) => {
                    for (fill_box, region) in &fill_boxes {
                        extrapolate_component(
                            self.kind,
                            node.array_mut(),
                            fill_box,
                            region,
                            &patch_box,
                            CenteringShape::Node,
                        );
                    }
                }
                crate::data::PatchData::Side(side) => {
                    for axis in 0..N {
                        for (fill_box, region) in &fill_boxes {
                            extrapolate_component(
                                self.kind,
                                side.component_mut(axis),
                                fill_box,
                                region,
                                &patch_box,
                                CenteringShape::Staggered(axis),
                            );
                        }
                    }
                }
                crate::data::PatchData::Face(face) => {
                    for axis in 0..N {
                        for (fill_box, region) in &fill_boxes {
                            extrapolate_component(
                                self.kind,
                                face.component_mut(axis),
                                fill_box,
                                region,
                                &patch_box,
                                CenteringShape::Staggered(axis),
                            );
                        }
                    }
                }
                crate::data::PatchData::SideFlag(_) => {}
            }
        }
    }
}

impl<const N: usize> RefinePatchStrategy<N> for PhysicalExtrapolationOperator<N> {
    fn set_physical_boundary_conditions(
        &mut self,
        patch: &mut Patch<N>,
        _spacing: [f64; N],
        _fill_time: f64,
        ghost_width: [usize; N],
    ) {
        self.apply(patch, ghost_width);
    }
}

/// How a component's owned index range relates to the patch cell box.
#[derive(Debug, Clone, Copy)]
enum CenteringShape {
    Cell,
    Node,
    /// Side- or face-centered component normal to the given axis.
    Staggered(usize),
}

impl CenteringShape {
    /// Widening of a cell region to this component's locations.
    fn widen<const N: usize>(&self, region: &IndexBox<N>) -> IndexBox<N> {
        let mut result = *region;
        match self {
            CenteringShape::Cell => {}
            CenteringShape::Node => {
                for axis in 0..N {
                    result.upper[axis] += 1;
                }
            }
            CenteringShape::Staggered(normal) => {
                result.upper[*normal] += 1;
            }
        }
        result
    }

    /// The interior reference location for a ghost index: clamp each normal
    /// axis of the region to the last owned layer of this component.
    fn interior_reference<const N: usize>(
        &self,
        index: [isize; N],
        region: &Region<N>,
        patch_box: &IndexBox<N>,
    ) -> ([isize; N], [isize; N]) {
        let mut reference = index;
        let mut shift = [0isize; N];

        for axis in 0..N {
            match region.side(axis) {
                Side::Lower => {
                    reference[axis] = patch_box.lower[axis];
                    shift[axis] = 1;
                }
                Side::Upper => {
                    let owns_extra = match self {
                        CenteringShape::Cell => false,
                        CenteringShape::Node => true,
                        CenteringShape::Staggered(normal) => *normal == axis,
                    };
                    reference[axis] = patch_box.upper[axis] + owns_extra as isize;
                    shift[axis] = -1;
                }
                Side::Middle => {}
            }
        }

        (reference, shift)
    }
}

fn extrapolate_component<const N: usize>(
    kind: ExtrapolationKind,
    data: &mut ArrayData<N, f64>,
    fill_box: &IndexBox<N>,
    region: &Region<N>,
    patch_box: &IndexBox<N>,
    shape: CenteringShape,
) {
    let trimmed = shape.widen(fill_box).intersect(&data.ghost_box());
    if trimmed.is_empty() {
        return;
    }

    let codim = region.codimension();

    for depth in 0..data.depth() {
        for index in trimmed.iter() {
            let (reference, shift) = shape.interior_reference(index, region, patch_box);

            let value = match kind {
                ExtrapolationKind::Constant => data.value(reference, depth),
                ExtrapolationKind::Linear => linear_extrap(data, index, reference, shift, depth),
                ExtrapolationKind::Quadratic => {
                    quadratic_extrap(data, index, reference, shift, depth, codim)
                }
            };

            data.set(index, depth, value);
        }
    }
}

/// One-sided linear extension: the interior value plus, per shifted axis,
/// the first difference toward the boundary times the ghost distance.
fn linear_extrap<const N: usize>(
    data: &ArrayData<N, f64>,
    index: [isize; N],
    reference: [isize; N],
    shift: [isize; N],
    depth: usize,
) -> f64 {
    let mut result = data.value(reference, depth);

    for axis in 0..N {
        if shift[axis] == 0 {
            continue;
        }

        let mut inward = reference;
        inward[axis] += shift[axis];

        let f0 = data.value(reference, depth);
        let f1 = data.value(inward, depth);
        let delta = (index[axis] - reference[axis]).abs() as f64;

        result += (f0 - f1) * delta;
    }

    result
}

/// One-sided three-point Newton-form fit through the interior samples at
/// offsets 0, 1, 2 from the boundary, evaluated at the ghost distance.
/// Higher-codimension regions use the linear combination instead.
fn quadratic_extrap<const N: usize>(
    data: &ArrayData<N, f64>,
    index: [isize; N],
    reference: [isize; N],
    shift: [isize; N],
    depth: usize,
    codim: usize,
) -> f64 {
    if codim != 1 {
        return linear_extrap(data, index, reference, shift, depth);
    }

    for axis in 0..N {
        if shift[axis] == 0 {
            continue;
        }

        let mut inward1 = reference;
        inward1[axis] += shift[axis];
        let mut inward2 = inward1;
        inward2[axis] += shift[axis];

        let f0 = data.value(reference, depth);
        let f1 = data.value(inward1, depth);
        let f2 = data.value(inward2, depth);

        let x = (index[axis] - reference[axis]).abs() as f64;

        return (0.5 * f2 - f1 + 0.5 * f0) * x * x + (-0.5 * f2 + 2.0 * f1 - 1.5 * f0) * x + f0;
    }

    unreachable!("codim-1 region with no shifted axis");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Centering;
    use crate::geometry::IndexBox;
    use crate::hierarchy::{GridGeometry, HierarchyBuilder, PatchHierarchy};

    fn single_patch(ghost: usize) -> (PatchHierarchy<2>, usize) {
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

    #[test]
    fn constant_round_trip() {
        let (mut hierarchy, u) = single_patch(2);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        patch
            .data_mut(u)
            .unwrap()
            .as_cell_mut()
            .unwrap()
            .fill(f64::NAN);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [7, 7]).iter() {
                cell.set(index, 0, 6.25);
            }
        }

        let op = PhysicalExtrapolationOperator::new(u, ExtrapolationKind::Constant);
        op.apply(patch, [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        for index in cell.ghost_box().iter() {
            assert_eq!(cell.value(index, 0), 6.25, "ghost cell {index:?}");
        }
    }

    #[test]
    fn linear_reproduces_affine_data() {
        let (mut hierarchy, u) = single_patch(2);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [7, 7]).iter() {
                cell.set(index, 0, 3.0 * index[0] as f64 - 2.0 * index[1] as f64 + 0.5);
            }
        }

        let op = PhysicalExtrapolationOperator::new(u, ExtrapolationKind::Linear);
        op.apply(patch, [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        for index in cell.ghost_box().iter() {
            let expected = 3.0 * index[0] as f64 - 2.0 * index[1] as f64 + 0.5;
            assert!(
                (cell.value(index, 0) - expected).abs() < 1e-12,
                "ghost cell {index:?}"
            );
        }
    }

    #[test]
    fn quadratic_reproduces_parabolic_data_at_faces() {
        let (mut hierarchy, u) = single_patch(2);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0, 0], [7, 7]).iter() {
                let x = index[0] as f64;
                cell.set(index, 0, x * x + 1.0);
            }
        }

        let op = PhysicalExtrapolationOperator::new(u, ExtrapolationKind::Quadratic);
        op.apply(patch, [2, 2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        // Codim-1 ghosts along x continue the parabola exactly.
        for index in [[-1isize, 3isize], [-2, 3], [8, 3], [9, 3]] {
            let x = index[0] as f64;
            assert!(
                (cell.value(index, 0) - (x * x + 1.0)).abs() < 1e-12,
                "ghost cell {index:?}"
            );
        }
    }

    #[test]
    fn one_dimensional_ramp_matches_closed_forms() {
        // Interior u[i] = i on [0, 8) with ghost width two.
        let geometry = GridGeometry::<1>::unit([8], [false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0], [7])])
            .build()
            .unwrap();

        let u = hierarchy
            .variables_mut()
            .register_variable("u", Centering::Cell, 1);
        hierarchy.allocate_data(u, 2);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let cell = patch.data_mut(u).unwrap().as_cell_mut().unwrap();
            for index in IndexBox::new([0], [7]).iter() {
                cell.set(index, 0, index[0] as f64);
            }
        }

        let op = PhysicalExtrapolationOperator::new(u, ExtrapolationKind::Constant);
        op.apply(patch, [2]);

        {
            let cell = patch.data(u).unwrap().as_cell().unwrap();
            assert_eq!(cell.value([-1], 0), 0.0);
            assert_eq!(cell.value([-2], 0), 0.0);
            assert_eq!(cell.value([8], 0), 7.0);
            assert_eq!(cell.value([9], 0), 7.0);
        }

        let op = PhysicalExtrapolationOperator::new(u, ExtrapolationKind::Linear);
        op.apply(patch, [2]);

        let cell = patch.data(u).unwrap().as_cell().unwrap();
        assert_eq!(cell.value([-1], 0), -1.0);
        assert_eq!(cell.value([-2], 0), -2.0);
        assert_eq!(cell.value([8], 0), 8.0);
        assert_eq!(cell.value([9], 0), 9.0);
    }

    #[test]
    fn side_data_corners_are_filled() {
        let geometry = GridGeometry::unit([4, 4], [false, false]);
        let mut hierarchy = HierarchyBuilder::new(geometry)
            .add_level(1, vec![IndexBox::new([0, 0], [3, 3])])
            .build()
            .unwrap();

        let v = hierarchy
            .variables_mut()
            .register_variable("v", Centering::Side, 1);
        hierarchy.allocate_data(v, 1);

        let patch = hierarchy.patch_level_mut(0).patch_mut(0);
        {
            let side = patch.data_mut(v).unwrap().as_side_mut().unwrap();
            side.fill(f64::NAN);
            for axis in 0..2 {
                let mut owned = IndexBox::new([0, 0], [3, 3]);
                owned.upper[axis] += 1;
                for index in owned.iter() {
                    side.set(axis, index, 0, 2.0);
                }
            }
        }

        let op = PhysicalExtrapolationOperator::new(v, ExtrapolationKind::Constant);
        op.apply(patch, [1, 1]);

        let side = patch.data(v).unwrap().as_side().unwrap();
        for axis in 0..2 {
            for index in side.component(axis).ghost_box().iter() {
                assert!(
                    side.value(axis, index, 0) == 2.0,
                    "component {axis} location {index:?} left unfilled"
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "unknown extrapolation type")]
    fn unknown_type_name_is_fatal() {
        ExtrapolationKind::from_name("CUBIC");
    }
}
