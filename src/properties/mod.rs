//! Layer-windowed spatial properties of calorimeter hits.
//!
//! Properties are computed from raw hit quantities (positions, cell sizes,
//! energies) only; availability and open hypotheses play no part.

pub mod calculator;
mod neighbourhood;

pub use calculator::{HitProperties, PropertyCalculator};
