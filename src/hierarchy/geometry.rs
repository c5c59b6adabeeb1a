use std::array;
use std::collections::BTreeMap;

use crate::data::Centering;
use crate::geometry::IndexBox;
use crate::transfer::{CoarsenOpKind, RefineOpKind};

/// Cartesian description of the computational domain: its coarsest-level
/// index box, physical extents, periodicity, and the registry of named
/// coarsen/refine operators.
///
/// The operator registry replaces process-global operator registration: the
/// composition root that builds the geometry (or any operator handed the
/// geometry) may call the `ensure_*` methods, which insert idempotently.
#[derive(Debug, Clone)]
pub struct GridGeometry<const N: usize> {
    domain: IndexBox<N>,
    x_lower: [f64; N],
    x_upper: [f64; N],
    periodic: [bool; N],

    coarsen_ops: BTreeMap<(Centering, String), CoarsenOpKind>,
    refine_ops: BTreeMap<(Centering, String), RefineOpKind>,
}

impl<const N: usize> GridGeometry<N> {
    /// Creates a geometry with the standard conservative/constant/linear
    /// operators pre-registered for cell, node, and side data.
    pub fn new(
        domain: IndexBox<N>,
        x_lower: [f64; N],
        x_upper: [f64; N],
        periodic: [bool; N],
    ) -> Self {
        assert!(!domain.is_empty(), "domain index box must be non-empty");
        for axis in 0..N {
            assert!(
                x_upper[axis] > x_lower[axis],
                "domain extent must be positive along axis {axis}"
            );
        }

        let mut result = Self {
            domain,
            x_lower,
            x_upper,
            periodic,
            coarsen_ops: BTreeMap::new(),
            refine_ops: BTreeMap::new(),
        };

        for centering in [Centering::Cell, Centering::Node, Centering::Side] {
            result.register_coarsen_operator(
                centering,
                crate::transfer::CONSERVATIVE_COARSEN,
                CoarsenOpKind::ConservativeAverage,
            );
            result.register_refine_operator(
                centering,
                crate::transfer::CONSTANT_REFINE,
                RefineOpKind::Constant,
            );
            result.register_refine_operator(
                centering,
                crate::transfer::LINEAR_REFINE,
                RefineOpKind::Linear,
            );
        }

        result
    }

    /// Unit square/cube `[0, 1]^N` with the given coarse resolution.
    pub fn unit(cells: [usize; N], periodic: [bool; N]) -> Self {
        Self::new(IndexBox::from_size(cells), [0.0; N], [1.0; N], periodic)
    }

    pub fn domain(&self) -> IndexBox<N> {
        self.domain
    }

    pub fn x_lower(&self) -> [f64; N] {
        self.x_lower
    }

    pub fn periodic(&self) -> [bool; N] {
        self.periodic
    }

    /// Grid spacing on the coarsest level.
    pub fn coarse_spacing(&self) -> [f64; N] {
        let size = self.domain.size();
        array::from_fn(|axis| (self.x_upper[axis] - self.x_lower[axis]) / size[axis] as f64)
    }

    /// Registers a coarsen operator under a name. Insertion is idempotent:
    /// re-registering the same (centering, name) pair is a no-op, so any
    /// number of operator instances may ensure their operators exist.
    pub fn register_coarsen_operator(
        &mut self,
        centering: Centering,
        name: &str,
        kind: CoarsenOpKind,
    ) {
        self.coarsen_ops
            .entry((centering, name.to_owned()))
            .or_insert(kind);
    }

    pub fn register_refine_operator(
        &mut self,
        centering: Centering,
        name: &str,
        kind: RefineOpKind,
    ) {
        self.refine_ops
            .entry((centering, name.to_owned()))
            .or_insert(kind);
    }

    /// Makes the cubic coarsen operators for cell and side double data
    /// available. Called by the ghost-fill orchestrator on initialization;
    /// safe to call any number of times.
    pub fn ensure_cubic_coarsen_operators(&mut self) {
        self.register_coarsen_operator(
            Centering::Cell,
            crate::transfer::CUBIC_COARSEN,
            CoarsenOpKind::Cubic,
        );
        self.register_coarsen_operator(
            Centering::Side,
            crate::transfer::CUBIC_COARSEN,
            CoarsenOpKind::Cubic,
        );
    }

    /// Looks up a coarsen operator by name. Fatal when the name was never
    /// registered for the centering: the transaction component naming it is
    /// misconfigured.
    pub fn lookup_coarsen_operator(&self, centering: Centering, name: &str) -> CoarsenOpKind {
        *self
            .coarsen_ops
            .get(&(centering, name.to_owned()))
            .unwrap_or_else(|| {
                panic!("no coarsen operator named {name:?} is registered for {centering:?} data")
            })
    }

    pub fn lookup_refine_operator(&self, centering: Centering, name: &str) -> RefineOpKind {
        *self
            .refine_ops
            .get(&(centering, name.to_owned()))
            .unwrap_or_else(|| {
                panic!("no refine operator named {name:?} is registered for {centering:?} data")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_from_extents() {
        let geometry = GridGeometry::<2>::new(
            IndexBox::from_size([8, 4]),
            [0.0, 0.0],
            [2.0, 1.0],
            [false, false],
        );

        assert_eq!(geometry.coarse_spacing(), [0.25, 0.25]);
    }

    #[test]
    fn cubic_registration_is_idempotent() {
        let mut geometry = GridGeometry::<2>::unit([8, 8], [false; 2]);

        geometry.ensure_cubic_coarsen_operators();
        geometry.ensure_cubic_coarsen_operators();

        assert_eq!(
            geometry.lookup_coarsen_operator(Centering::Cell, crate::transfer::CUBIC_COARSEN),
            CoarsenOpKind::Cubic
        );
        assert_eq!(
            geometry.lookup_coarsen_operator(Centering::Side, crate::transfer::CUBIC_COARSEN),
            CoarsenOpKind::Cubic
        );
    }

    #[test]
    #[should_panic(expected = "no coarsen operator named")]
    fn unknown_operator_is_fatal() {
        let geometry = GridGeometry::<2>::unit([8, 8], [false; 2]);
        geometry.lookup_coarsen_operator(Centering::Cell, "SPECTRAL_COARSEN");
    }
}
