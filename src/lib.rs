#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

//! `stratum` keeps field data consistent across a block-structured AMR patch
//! hierarchy: it coarsens fine data onto coarser levels, refines coarse data
//! into fine ghost regions, interpolates across coarse-fine interfaces, and
//! applies physical boundary conditions (Robin-type and extrapolation) for
//! cell-, node-, side-, and face-centered data.
//!
//! The entry point for most consumers is
//! [`boundary::HierarchyGhostFillOrchestrator`], which drives the three-phase
//! fill (coarsen-synchronize, refine with coarse-fine interpolation, apply
//! physical Robin conditions) over a set of registered
//! [`boundary::TransactionComponent`]s.

pub mod boundary;
pub mod data;
pub mod geometry;
pub mod hierarchy;
pub mod transfer;

/// Provides common types used by most `stratum` applications.
pub mod prelude {
    pub use crate::boundary::{
        CoarseFineInterpolationOperator, CoarseFineStencil, ConstantRobinBcCoefs,
        ExtrapolationKind, HierarchyGhostFillOrchestrator, PhysicalExtrapolationOperator,
        RobinBcCoefStrategy, RobinBoundaryOperator, SharedRobinBcCoefs, StaggeredBoundaryMask,
        TransactionComponent,
    };
    pub use crate::data::{ArrayData, CellData, Centering, FaceData, NodeData, PatchData, SideData};
    pub use crate::geometry::{
        faces, regions, BoundaryBox, Face, FaceMask, IndexBox, IndexSpace, Region, Side,
    };
    pub use crate::hierarchy::{
        GridGeometry, HierarchyBuilder, Patch, PatchHierarchy, PatchLevel, VariableDatabase,
    };
    pub use crate::transfer::FillPattern;
}
