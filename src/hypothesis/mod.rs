//! Nested reclustering hypotheses.
//!
//! A hypothesis is a named overlay of hit availability explored without
//! touching ground truth. Hypotheses nest strictly: opening an initial
//! hypothesis starts a new nesting level, sibling hypotheses share that level,
//! and applying one resolves the whole level at once, either into the parent
//! overlay or, at the outermost level, into the hits themselves.

pub mod manager;
pub mod overlay;

pub use manager::{ApplyOutcome, HypothesisManager, HypothesisSummary};
pub use overlay::UsageOverlay;
