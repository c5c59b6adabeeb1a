use crate::data::{ArrayData, PatchData};
use crate::geometry::IndexBox;
use std::array;

/// Copies `region` (given in destination cell indices) from `src` into
/// `dst`, where the source is shifted by `shift` relative to the
/// destination frame: `src_index = dst_index - shift`.
///
/// The copy is centering-aware: node and side regions are widened to the
/// locations owned by the cells of `region`. Values are gathered into a
/// buffer before any write, so `src` and `dst` may alias the same variable
/// on different patches of one level.
pub fn copy_region<const N: usize>(
    src: &PatchData<N>,
    dst: &mut PatchData<N>,
    region: &IndexBox<N>,
    shift: [isize; N],
) {
    match (src, dst) {
        (PatchData::Cell(s), PatchData::Cell(d)) => {
            copy_component(s.array(), d.array_mut(), region, shift);
        }
        (PatchData::Node(s), PatchData::Node(d)) => {
            let node_region = widen(region, [true; N]);
            copy_component(s.array(), d.array_mut(), &node_region, shift);
        }
        (PatchData::Side(s), PatchData::Side(d)) => {
            for axis in 0..N {
                let mut widen_axes = [false; N];
                widen_axes[axis] = true;
                let side_region = widen(region, widen_axes);
                copy_component(s.component(axis), d.component_mut(axis), &side_region, shift);
            }
        }
        (PatchData::Face(s), PatchData::Face(d)) => {
            for axis in 0..N {
                let mut widen_axes = [false; N];
                widen_axes[axis] = true;
                let side_region = widen(region, widen_axes);
                copy_component(s.component(axis), d.component_mut(axis), &side_region, shift);
            }
        }
        (PatchData::SideFlag(s), PatchData::SideFlag(d)) => {
            for axis in 0..N {
                let mut widen_axes = [false; N];
                widen_axes[axis] = true;
                let side_region = widen(region, widen_axes);
                copy_component(s.component(axis), d.component_mut(axis), &side_region, shift);
            }
        }
        (s, d) => panic!(
            "cannot copy between {:?} and {:?} data",
            s.centering(),
            d.centering()
        ),
    }
}

/// Extends a cell region to the index range of node- or side-type locations
/// along the flagged axes (one wider on the upper side).
fn widen<const N: usize>(region: &IndexBox<N>, axes: [bool; N]) -> IndexBox<N> {
    let mut result = *region;
    for axis in 0..N {
        if axes[axis] {
            result.upper[axis] += 1;
        }
    }
    result
}

fn copy_component<const N: usize, T: Copy + Default>(
    src: &ArrayData<N, T>,
    dst: &mut ArrayData<N, T>,
    region: &IndexBox<N>,
    shift: [isize; N],
) {
    debug_assert_eq!(src.depth(), dst.depth());
    let depth = dst.depth();

    // Clip to what both arrays can actually provide and accept.
    let src_window = src.ghost_box().shifted(shift);
    let clipped = region.intersect(&dst.ghost_box()).intersect(&src_window);
    if clipped.is_empty() {
        return;
    }

    let mut buffer = Vec::with_capacity(clipped.num_cells() * depth);
    for index in clipped.iter() {
        let src_index = array::from_fn(|axis| index[axis] - shift[axis]);
        for d in 0..depth {
            buffer.push(src.value(src_index, d));
        }
    }

    let mut cursor = 0;
    for index in clipped.iter() {
        for d in 0..depth {
            dst.set(index, d, buffer[cursor]);
            cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellData;

    #[test]
    fn shifted_copy_between_patches() {
        // Source patch [0,3]^2 and destination patch [4,7]x[0,3] sharing a
        // face; copy the destination's lower-x ghost strip.
        let src_box = IndexBox::new([0, 0], [3, 3]);
        let dst_box = IndexBox::new([4, 0], [7, 3]);

        let mut src = PatchData::Cell(CellData::new(src_box, [1, 1], 1));
        let mut dst = PatchData::Cell(CellData::new(dst_box, [1, 1], 1));

        if let PatchData::Cell(data) = &mut src {
            for index in src_box.iter() {
                data.set(index, 0, (index[0] + 10 * index[1]) as f64);
            }
        }

        let ghost_strip = IndexBox::new([3, 0], [3, 3]);
        copy_region(&src, &mut dst, &ghost_strip, [0, 0]);

        if let PatchData::Cell(data) = &dst {
            assert_eq!(data.value([3, 2], 0), 23.0);
        }
    }

    #[test]
    fn periodic_copy_uses_shift() {
        let src_box = IndexBox::new([0, 0], [3, 3]);
        let mut src = PatchData::Cell(CellData::new(src_box, [1, 1], 1));
        let mut dst = PatchData::Cell(CellData::new(src_box, [1, 1], 1));

        if let PatchData::Cell(data) = &mut src {
            data.set([0, 1], 0, 7.0);
        }

        // The image of the source shifted by the domain width fills the
        // destination's upper-x ghost strip.
        let ghost_strip = IndexBox::new([4, 0], [4, 3]);
        copy_region(&src, &mut dst, &ghost_strip, [4, 0]);

        if let PatchData::Cell(data) = &dst {
            assert_eq!(data.value([4, 1], 0), 7.0);
        }
    }
}
