//! Inter-patch data movement: coarsen/refine operators and the per-level
//! communication schedules that apply them.
//!
//! Schedules are built once per hierarchy configuration and executed many
//! times. Execution follows a gather/scatter discipline: source values are
//! packed into transaction buffers before any destination is written, which
//! is also the shape a distributed implementation of the same contract
//! takes (pack, exchange, unpack).

mod coarsen;
mod copy;
mod kernels;
mod ops;
mod refine;

pub use coarsen::{CoarsenItem, CoarsenSchedule};
pub use copy::copy_region;
pub use kernels::{coarsen_region, refine_region};
pub use ops::{
    CoarsenOpKind, FillPattern, RefineOpKind, CONSERVATIVE_COARSEN, CONSTANT_REFINE,
    CUBIC_COARSEN, LINEAR_REFINE,
};
pub use refine::{RefineItem, RefinePatchStrategy, RefineSchedule};
