//! The hierarchy ghost-fill and boundary-condition engine.
//!
//! [`HierarchyGhostFillOrchestrator`] drives the whole machinery; the other
//! operators here can also be used standalone on individual patches.

mod cf_interpolation;
mod extrapolation;
mod ghost_fill;
mod mask;
mod robin;

pub use cf_interpolation::{CoarseFineInterpolationOperator, CoarseFineStencil};
pub use extrapolation::{ExtrapolationKind, PhysicalExtrapolationOperator};
pub use ghost_fill::{HierarchyGhostFillOrchestrator, TransactionComponent};
pub use mask::StaggeredBoundaryMask;
pub use robin::{
    BcCoefData, ConstantRobinBcCoefs, RobinBcCoefStrategy, RobinBoundaryOperator,
    SharedRobinBcCoefs,
};
