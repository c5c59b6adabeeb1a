use std::array::from_fn;

use super::{Face, IndexSpace};

/// Placement of a boundary region relative to a patch along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Lower = 0,
    Middle = 1,
    Upper = 2,
}

impl Side {
    pub fn reverse(self) -> Self {
        match self {
            Self::Lower => Self::Upper,
            Self::Upper => Self::Lower,
            Self::Middle => Self::Middle,
        }
    }
}

/// One of the `3^N - 1` boundary regions surrounding a patch, identified by
/// its placement along each axis. The number of non-`Middle` axes is the
/// codimension of the region: 1 for a face neighbor, 2 for an edge neighbor,
/// 3 for a corner neighbor in three dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region<const N: usize> {
    #[serde(with = "crate::geometry::serde_array")]
    sides: [Side; N],
}

impl<const N: usize> Region<N> {
    /// Number of distinct regions (including the interior) in `N` dimensions.
    pub const COUNT: usize = 3usize.pow(N as u32);

    pub const INTERIOR: Self = Self::new([Side::Middle; N]);

    pub const fn new(sides: [Side; N]) -> Self {
        Self { sides }
    }

    /// The codim-1 region outside a single face.
    pub fn from_face(face: Face<N>) -> Self {
        let mut sides = [Side::Middle; N];
        sides[face.axis] = if face.side { Side::Upper } else { Side::Lower };
        Self { sides }
    }

    pub fn sides(&self) -> [Side; N] {
        self.sides
    }

    pub fn side(&self, axis: usize) -> Side {
        self.sides[axis]
    }

    /// Number of axes along which the region lies outside the patch.
    pub fn codimension(&self) -> usize {
        self.sides
            .into_iter()
            .filter(|&s| s != Side::Middle)
            .count()
    }

    /// Iterates over the faces one would have to cross to reach the region.
    pub fn normal_faces(&self) -> impl Iterator<Item = Face<N>> + '_ {
        (0..N)
            .filter(|&axis| self.side(axis) != Side::Middle)
            .map(|axis| Face {
                axis,
                side: self.side(axis) == Side::Upper,
            })
    }

    /// The unit step pointing from the patch interior into the region.
    pub fn outward_dir(&self) -> [isize; N] {
        self.sides.map(|side| match side {
            Side::Lower => -1,
            Side::Upper => 1,
            Side::Middle => 0,
        })
    }

    /// For a codim-1 region, the face it lies outside of.
    pub fn to_face(&self) -> Face<N> {
        debug_assert_eq!(self.codimension(), 1);

        let axis = (0..N).find(|&a| self.sides[a] != Side::Middle).unwrap();
        Face {
            axis,
            side: self.sides[axis] == Side::Upper,
        }
    }

    /// A linear location index for the region. For codim-1 regions this
    /// agrees with `Face::to_linear` (0/1 lower/upper along axis 0, ...).
    pub fn location_index(&self) -> usize {
        match self.codimension() {
            1 => self.to_face().to_linear(),
            _ => {
                let space = IndexSpace::new([3; N]);
                let index = from_fn(|axis| self.side(axis) as usize);
                space.linear_from_cartesian(index)
            }
        }
    }
}

/// Iterates over all boundary regions (interior excluded) in `N` dimensions.
pub fn regions<const N: usize>() -> impl Iterator<Item = Region<N>> {
    RegionIter {
        inner: IndexSpace::new([3; N]).iter(),
    }
    .filter(|region| region.codimension() > 0)
}

pub struct RegionIter<const N: usize> {
    inner: super::index::CartesianIter<N>,
}

impl<const N: usize> Iterator for RegionIter<N> {
    type Item = Region<N>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Region::new(self.inner.next()?.map(|idx| match idx {
            0 => Side::Lower,
            1 => Side::Middle,
            2 => Side::Upper,
            _ => unreachable!(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codimension_counts() {
        let by_codim = |c: usize| regions::<3>().filter(|r| r.codimension() == c).count();

        // 6 faces, 12 edges, 8 corners.
        assert_eq!(by_codim(1), 6);
        assert_eq!(by_codim(2), 12);
        assert_eq!(by_codim(3), 8);
        assert_eq!(regions::<3>().count(), Region::<3>::COUNT - 1);
    }

    #[test]
    fn codim1_location_matches_face() {
        for face in super::super::faces::<3>() {
            let region = Region::from_face(face);
            assert_eq!(region.codimension(), 1);
            assert_eq!(region.location_index(), face.to_linear());
            assert_eq!(region.to_face(), face);
        }
    }

    #[test]
    fn outward_direction() {
        let region = Region::new([Side::Lower, Side::Middle, Side::Upper]);
        assert_eq!(region.outward_dir(), [-1, 0, 1]);
        assert_eq!(region.codimension(), 2);
        assert_eq!(region.normal_faces().count(), 2);
    }
}
