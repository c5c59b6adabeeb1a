use crate::data::{ArrayData, PatchData};
use crate::geometry::IndexBox;
use crate::transfer::{CoarsenOpKind, RefineOpKind};
use std::array;

/// Cubic restriction weights over the four fine locations surrounding a
/// coarse location at ratio two.
const CUBIC_WEIGHTS: [f64; 4] = [-1.0 / 16.0, 9.0 / 16.0, 9.0 / 16.0, -1.0 / 16.0];

/// Applies a coarsen operator over `coarse_region` (coarse cell indices),
/// reading fine interior values only. Fine ghost values are never touched:
/// coarsening runs before any ghost fill in a synchronization pass.
pub fn coarsen_region<const N: usize>(
    op: CoarsenOpKind,
    fine: &PatchData<N>,
    fine_interior: &IndexBox<N>,
    coarse: &mut PatchData<N>,
    coarse_region: &IndexBox<N>,
    ratio: usize,
) {
    match (fine, coarse) {
        (PatchData::Cell(f), PatchData::Cell(c)) => {
            coarsen_cell(op, f.array(), fine_interior, c.array_mut(), coarse_region, ratio);
        }
        (PatchData::Node(f), PatchData::Node(c)) => {
            coarsen_node(f.array(), fine_interior, c.array_mut(), coarse_region, ratio);
        }
        (PatchData::Side(f), PatchData::Side(c)) => {
            for axis in 0..N {
                coarsen_side(
                    op,
                    f.component(axis),
                    fine_interior,
                    c.component_mut(axis),
                    coarse_region,
                    ratio,
                    axis,
                );
            }
        }
        (f, c) => panic!(
            "cannot coarsen {:?} data into {:?} data",
            f.centering(),
            c.centering()
        ),
    }
}

fn coarsen_cell<const N: usize>(
    op: CoarsenOpKind,
    fine: &ArrayData<N, f64>,
    fine_interior: &IndexBox<N>,
    coarse: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
) {
    let clipped = region.intersect(&coarse.ghost_box());
    let r = ratio as isize;

    for index in clipped.iter() {
        for depth in 0..coarse.depth() {
            let value = match op {
                CoarsenOpKind::ConservativeAverage => {
                    average_children(fine, index, ratio, depth)
                }
                CoarsenOpKind::Cubic => {
                    // The wide stencil needs one extra fine cell per side;
                    // degrade to the conservative average where the fine
                    // interior cannot supply it, and for ratios other than
                    // two where the tabulated weights do not apply.
                    let support = IndexBox::new(
                        array::from_fn(|axis| r * index[axis] - 1),
                        array::from_fn(|axis| r * index[axis] + r),
                    );
                    if ratio == 2 && fine_interior.contains_box(&support) {
                        cubic_restrict(fine, index, depth)
                    } else {
                        average_children(fine, index, ratio, depth)
                    }
                }
            };
            coarse.set(index, depth, value);
        }
    }
}

fn average_children<const N: usize>(
    fine: &ArrayData<N, f64>,
    coarse_index: [isize; N],
    ratio: usize,
    depth: usize,
) -> f64 {
    let r = ratio as isize;
    let children = IndexBox::new(
        array::from_fn(|axis| r * coarse_index[axis]),
        array::from_fn(|axis| r * coarse_index[axis] + r - 1),
    );

    let mut sum = 0.0;
    for child in children.iter() {
        sum += fine.value(child, depth);
    }

    sum / children.num_cells() as f64
}

fn cubic_restrict<const N: usize>(
    fine: &ArrayData<N, f64>,
    coarse_index: [isize; N],
    depth: usize,
) -> f64 {
    let support = IndexBox::new(
        array::from_fn(|axis| 2 * coarse_index[axis] - 1),
        array::from_fn(|axis| 2 * coarse_index[axis] + 2),
    );

    let mut result = 0.0;
    for fine_index in support.iter() {
        let mut weight = 1.0;
        for axis in 0..N {
            let offset = (fine_index[axis] - (2 * coarse_index[axis] - 1)) as usize;
            weight *= CUBIC_WEIGHTS[offset];
        }
        result += weight * fine.value(fine_index, depth);
    }

    result
}

fn coarsen_node<const N: usize>(
    fine: &ArrayData<N, f64>,
    _fine_interior: &IndexBox<N>,
    coarse: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
) {
    // Coinciding nodes: injection.
    let mut node_region = *region;
    for axis in 0..N {
        node_region.upper[axis] += 1;
    }

    let clipped = node_region.intersect(&coarse.ghost_box());
    let r = ratio as isize;

    for index in clipped.iter() {
        let fine_index = array::from_fn(|axis| r * index[axis]);
        for depth in 0..coarse.depth() {
            coarse.set(index, depth, fine.value(fine_index, depth));
        }
    }
}

fn coarsen_side<const N: usize>(
    op: CoarsenOpKind,
    fine: &ArrayData<N, f64>,
    fine_interior: &IndexBox<N>,
    coarse: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
    normal: usize,
) {
    let mut side_region = *region;
    side_region.upper[normal] += 1;

    let clipped = side_region.intersect(&coarse.ghost_box());
    let r = ratio as isize;

    for index in clipped.iter() {
        for depth in 0..coarse.depth() {
            let value = match op {
                CoarsenOpKind::ConservativeAverage => {
                    average_coplanar(fine, index, ratio, depth, normal)
                }
                CoarsenOpKind::Cubic => {
                    let support = IndexBox::new(
                        array::from_fn(|axis| {
                            if axis == normal {
                                r * index[axis]
                            } else {
                                r * index[axis] - 1
                            }
                        }),
                        array::from_fn(|axis| {
                            if axis == normal {
                                r * index[axis]
                            } else {
                                r * index[axis] + r
                            }
                        }),
                    );
                    let mut fine_sides = *fine_interior;
                    fine_sides.upper[normal] += 1;

                    if ratio == 2 && fine_sides.contains_box(&support) {
                        cubic_restrict_side(fine, index, depth, normal)
                    } else {
                        average_coplanar(fine, index, ratio, depth, normal)
                    }
                }
            };
            coarse.set(index, depth, value);
        }
    }
}

/// Average of the fine faces covering one coarse face: the normal index is
/// aligned, tangential indices fan out over the refinement ratio.
fn average_coplanar<const N: usize>(
    fine: &ArrayData<N, f64>,
    coarse_index: [isize; N],
    ratio: usize,
    depth: usize,
    normal: usize,
) -> f64 {
    let r = ratio as isize;
    let covering = IndexBox::new(
        array::from_fn(|axis| r * coarse_index[axis]),
        array::from_fn(|axis| {
            if axis == normal {
                r * coarse_index[axis]
            } else {
                r * coarse_index[axis] + r - 1
            }
        }),
    );

    let mut sum = 0.0;
    for fine_index in covering.iter() {
        sum += fine.value(fine_index, depth);
    }

    sum / covering.num_cells() as f64
}

fn cubic_restrict_side<const N: usize>(
    fine: &ArrayData<N, f64>,
    coarse_index: [isize; N],
    depth: usize,
    normal: usize,
) -> f64 {
    let support = IndexBox::new(
        array::from_fn(|axis| {
            if axis == normal {
                2 * coarse_index[axis]
            } else {
                2 * coarse_index[axis] - 1
            }
        }),
        array::from_fn(|axis| {
            if axis == normal {
                2 * coarse_index[axis]
            } else {
                2 * coarse_index[axis] + 2
            }
        }),
    );

    let mut result = 0.0;
    for fine_index in support.iter() {
        let mut weight = 1.0;
        for axis in 0..N {
            if axis == normal {
                continue;
            }
            let offset = (fine_index[axis] - (2 * coarse_index[axis] - 1)) as usize;
            weight *= CUBIC_WEIGHTS[offset];
        }
        result += weight * fine.value(fine_index, depth);
    }

    result
}

/// Applies a refine operator over `fine_region` (fine cell indices), reading
/// coarse values from `coarse` (typically a gathered scratch block). Stencil
/// reads clamp to the coarse block, degrading toward constant interpolation
/// at its edges.
pub fn refine_region<const N: usize>(
    op: RefineOpKind,
    coarse: &PatchData<N>,
    fine: &mut PatchData<N>,
    fine_region: &IndexBox<N>,
    ratio: usize,
) {
    match (coarse, fine) {
        (PatchData::Cell(c), PatchData::Cell(f)) => {
            refine_cell(op, c.array(), f.array_mut(), fine_region, ratio);
        }
        (PatchData::Node(c), PatchData::Node(f)) => {
            refine_node(op, c.array(), f.array_mut(), fine_region, ratio);
        }
        (PatchData::Side(c), PatchData::Side(f)) => {
            for axis in 0..N {
                refine_side(
                    op,
                    c.component(axis),
                    f.component_mut(axis),
                    fine_region,
                    ratio,
                    axis,
                );
            }
        }
        (c, f) => panic!(
            "cannot refine {:?} data into {:?} data",
            c.centering(),
            f.centering()
        ),
    }
}

fn refine_cell<const N: usize>(
    op: RefineOpKind,
    coarse: &ArrayData<N, f64>,
    fine: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
) {
    let clipped = region.intersect(&fine.ghost_box());
    let r = ratio as isize;

    for index in clipped.iter() {
        for depth in 0..fine.depth() {
            let value = match op {
                RefineOpKind::Constant => {
                    let covering = array::from_fn(|axis| index[axis].div_euclid(r));
                    clamped_value(coarse, covering, depth)
                }
                RefineOpKind::Linear => {
                    // Fine cell center in coarse cell-center coordinates.
                    let coords =
                        array::from_fn(|axis| (index[axis] as f64 + 0.5) / ratio as f64 - 0.5);
                    multilinear(coarse, coords, depth)
                }
            };
            fine.set(index, depth, value);
        }
    }
}

fn refine_node<const N: usize>(
    op: RefineOpKind,
    coarse: &ArrayData<N, f64>,
    fine: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
) {
    let mut node_region = *region;
    for axis in 0..N {
        node_region.upper[axis] += 1;
    }

    let clipped = node_region.intersect(&fine.ghost_box());

    for index in clipped.iter() {
        let coords: [f64; N] = array::from_fn(|axis| index[axis] as f64 / ratio as f64);

        for depth in 0..fine.depth() {
            let value = match op {
                RefineOpKind::Constant => {
                    let nearest = array::from_fn(|axis| coords[axis].round() as isize);
                    clamped_value(coarse, nearest, depth)
                }
                RefineOpKind::Linear => multilinear(coarse, coords, depth),
            };
            fine.set(index, depth, value);
        }
    }
}

fn refine_side<const N: usize>(
    op: RefineOpKind,
    coarse: &ArrayData<N, f64>,
    fine: &mut ArrayData<N, f64>,
    region: &IndexBox<N>,
    ratio: usize,
    normal: usize,
) {
    let mut side_region = *region;
    side_region.upper[normal] += 1;

    let clipped = side_region.intersect(&fine.ghost_box());

    for index in clipped.iter() {
        // Normal coordinate interpolates between the bracketing coarse
        // faces for both operators; fine faces coplanar with a coarse face
        // take its value exactly.
        let coords: [f64; N] = array::from_fn(|axis| {
            if axis == normal {
                index[axis] as f64 / ratio as f64
            } else {
                (index[axis] as f64 + 0.5) / ratio as f64 - 0.5
            }
        });

        for depth in 0..fine.depth() {
            let value = match op {
                RefineOpKind::Constant => {
                    let mut axis_coords = coords;
                    for axis in 0..N {
                        if axis != normal {
                            axis_coords[axis] = axis_coords[axis].round();
                        }
                    }
                    multilinear(coarse, axis_coords, depth)
                }
                RefineOpKind::Linear => multilinear(coarse, coords, depth),
            };
            fine.set(index, depth, value);
        }
    }
}

/// Multilinear interpolation at fractional coarse coordinates, clamping the
/// stencil to the available coarse block.
fn multilinear<const N: usize>(coarse: &ArrayData<N, f64>, coords: [f64; N], depth: usize) -> f64 {
    let base: [isize; N] = array::from_fn(|axis| coords[axis].floor() as isize);
    let frac: [f64; N] = array::from_fn(|axis| coords[axis] - base[axis] as f64);

    let corners = IndexBox::new([0; N], [1; N]);
    let mut result = 0.0;

    for corner in corners.iter() {
        let mut weight = 1.0;
        for axis in 0..N {
            weight *= if corner[axis] == 1 {
                frac[axis]
            } else {
                1.0 - frac[axis]
            };
        }
        if weight == 0.0 {
            continue;
        }

        let index = array::from_fn(|axis| base[axis] + corner[axis]);
        result += weight * clamped_value(coarse, index, depth);
    }

    result
}

fn clamped_value<const N: usize>(
    coarse: &ArrayData<N, f64>,
    index: [isize; N],
    depth: usize,
) -> f64 {
    let bounds = coarse.ghost_box();
    let clamped = array::from_fn(|axis| index[axis].clamp(bounds.lower[axis], bounds.upper[axis]));
    coarse.value(clamped, depth)
}
