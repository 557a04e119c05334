//! # calohits - calorimeter hit bookkeeping for particle-flow reconstruction
//!
//! Reclustering algorithms try several ways of grouping the same calorimeter
//! hits before settling on one. This crate tracks which hits are still free to
//! be clustered, lets an algorithm open nested "what-if" hypotheses over that
//! availability and commit or discard them, and computes the per-hit
//! properties (density weight, isolation, surrounding energy, MIP-likeness)
//! that clustering relies on.
//!
//! ## Core Concepts
//!
//! - **Hit**: a calorimeter cell measurement, owned by a [`HitStore`] and referred to by [`HitId`]
//! - **Ordered hit list**: hits bucketed by pseudolayer
//! - **Hypothesis**: a named availability overlay; siblings share a nesting level
//! - **Property calculator**: layer-windowed neighbourhood kernels
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calohits::{CaloHit, DetectorRegion, HitContext, HitSettings, HitType, OrderedHitList};
//!
//! let mut ctx = HitContext::new(HitSettings::default())?;
//! let hit = CaloHit::builder()
//!     .position(1800.0, 0.0, 100.0)
//!     .cell_size(10.0, 10.0)
//!     .hit_type(HitType::Ecal)
//!     .region(DetectorRegion::Barrel)
//!     .pseudo_layer(3)
//!     .build()?;
//! let mut layers = OrderedHitList::new();
//! layers.add_hit(&hit)?;
//! let id = ctx.add_hit(hit)?;
//!
//! ctx.create_initial_hypothesis("recluster", &layers)?;
//! ctx.set_available(id, true)?;
//! ctx.apply_hypothesis("recluster")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod cluster;
pub mod error;
pub mod hit;
pub mod settings;
pub mod vector;

// Storage, hypotheses and properties
pub mod context;
pub mod hypothesis;
pub mod properties;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use cluster::{merge_cluster_hits, Cluster, ClusterId};
pub use context::HitContext;
pub use error::{CaloError, CaloResult, ErrorKind, ValidationError};
pub use hit::{CaloHit, CaloHitBuilder, DetectorRegion, HitId, HitType, PseudoLayer};
pub use hypothesis::{ApplyOutcome, HypothesisManager, HypothesisSummary, UsageOverlay};
pub use properties::{HitProperties, PropertyCalculator};
pub use settings::HitSettings;
pub use storage::{HitStore, OrderedHitList};
pub use vector::CartesianVector;
