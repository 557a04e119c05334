//! Hit ownership and layer indexing.
//!
//! `HitStore` owns every hit of a reconstruction pass and holds their
//! ground-truth availability. `OrderedHitList` groups hit ids by pseudolayer
//! and is what hypotheses are seeded from and properties are computed over.

mod hit_store;
mod ordered;

pub use hit_store::HitStore;
pub use ordered::OrderedHitList;
