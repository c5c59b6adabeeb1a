/// A face of a rectangular box in `N` dimensional space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Face<const N: usize> {
    pub axis: usize,
    /// False for the lower side of the axis, true for the upper side.
    pub side: bool,
}

impl<const N: usize> Face<N> {
    /// Face on the lower side of an axis.
    pub fn lower(axis: usize) -> Self {
        assert!(axis < N);
        Self { axis, side: false }
    }

    /// Face on the upper side of an axis.
    pub fn upper(axis: usize) -> Self {
        assert!(axis < N);
        Self { axis, side: true }
    }

    pub fn reversed(self) -> Self {
        Self {
            axis: self.axis,
            side: !self.side,
        }
    }

    /// The outward-pointing step along the face normal.
    pub fn outward(self) -> isize {
        if self.side {
            1
        } else {
            -1
        }
    }

    /// Transforms a face into a linear location index. Lower/upper of axis 0
    /// map to 0/1, lower/upper of axis 1 to 2/3, and so on.
    pub fn to_linear(self) -> usize {
        2 * self.axis + self.side as usize
    }

    /// Constructs a face from a linear location index.
    pub fn from_linear(linear: usize) -> Self {
        assert!(linear < 2 * N);

        Self {
            axis: linear / 2,
            side: linear % 2 == 1,
        }
    }
}

/// Iterates over all faces in a given number of dimensions.
pub fn faces<const N: usize>() -> FaceIter<N> {
    FaceIter {
        axis: 0,
        side: false,
    }
}

/// Iterator over all faces in a given number of dimensions.
#[derive(Debug)]
pub struct FaceIter<const N: usize> {
    axis: usize,
    side: bool,
}

impl<const N: usize> Iterator for FaceIter<N> {
    type Item = Face<N>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.axis >= N {
            return None;
        }

        let result = Face {
            axis: self.axis,
            side: self.side,
        };

        self.axis += self.side as usize;
        self.side = !self.side;

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (2 * N, Some(2 * N))
    }
}

/// A boolean flag per face of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FaceMask<const N: usize>(#[serde(with = "crate::geometry::serde_array")] [[bool; 2]; N]);

impl<const N: usize> FaceMask<N> {
    pub fn pack(bits: [[bool; 2]; N]) -> Self {
        Self(bits)
    }

    pub fn empty() -> Self {
        Self([[false; 2]; N])
    }

    pub fn full() -> Self {
        Self([[true; 2]; N])
    }

    pub fn is_set(&self, face: Face<N>) -> bool {
        self.0[face.axis][face.side as usize]
    }

    pub fn set(&mut self, face: Face<N>) {
        self.0[face.axis][face.side as usize] = true;
    }

    pub fn set_to(&mut self, face: Face<N>, val: bool) {
        self.0[face.axis][face.side as usize] = val;
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|pair| pair[0] || pair[1])
    }
}

impl<const N: usize> Default for FaceMask<N> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_iteration() {
        let mut list = faces::<3>();
        assert_eq!(list.next(), Some(Face::lower(0)));
        assert_eq!(list.next(), Some(Face::upper(0)));
        assert_eq!(list.next(), Some(Face::lower(1)));
        assert_eq!(list.next(), Some(Face::upper(1)));
        assert_eq!(list.next(), Some(Face::lower(2)));
        assert_eq!(list.next(), Some(Face::upper(2)));
        assert_eq!(list.next(), None);

        assert_eq!(Face::<4>::lower(1).to_linear(), 2);
        assert_eq!(Face::<4>::upper(3).to_linear(), 7);
        assert_eq!(Face::<4>::upper(3), Face::<4>::from_linear(7));
    }

    #[test]
    fn face_mask_flags() {
        let mut mask = FaceMask::<2>::empty();
        assert!(!mask.any());

        mask.set(Face::upper(1));
        assert!(mask.is_set(Face::upper(1)));
        assert!(!mask.is_set(Face::lower(1)));
        assert!(mask.any());

        mask.set_to(Face::upper(1), false);
        assert!(!mask.any());
    }
}
