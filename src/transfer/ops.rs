/// A named data-coarsening rule, resolved from the geometry's operator
/// registry at schedule-construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoarsenOpKind {
    /// Volume-weighted average of the fine values covering a coarse location.
    ConservativeAverage,
    /// Cubic-weighted restriction. Falls back to the conservative average
    /// near patch edges where the wide stencil has no support.
    Cubic,
}

/// A named data-refinement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RefineOpKind {
    /// Piecewise-constant injection of the covering coarse value.
    Constant,
    /// Linear interpolation of the surrounding coarse values.
    Linear,
}

/// Canonical operator names, matching the strings callers put in
/// transaction components.
pub const CONSERVATIVE_COARSEN: &str = "CONSERVATIVE_COARSEN";
pub const CUBIC_COARSEN: &str = "CUBIC_COARSEN";
pub const CONSTANT_REFINE: &str = "CONSTANT_REFINE";
pub const LINEAR_REFINE: &str = "LINEAR_REFINE";

/// Which destination locations a refine schedule writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FillPattern {
    /// Fill the destination interior and its ghost halo.
    InteriorAndGhosts,
    /// Fill only the ghost halo, leaving interior values untouched.
    GhostsOnly,
}

