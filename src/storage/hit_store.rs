//! Owning arena of calorimeter hits.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::hit::{CaloHit, HitId};

/// Owns the hits of one reconstruction pass.
///
/// The availability flag stored on each hit is the ground truth that applies
/// when no hypothesis is open.
#[derive(Debug, Default, Clone)]
pub struct HitStore {
    hits: HashMap<HitId, CaloHit>,
}

impl HitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hit. Returns error if its ID is already stored.
    pub fn insert(&mut self, hit: CaloHit) -> Result<HitId, StoreError> {
        let id = hit.id;
        if self.hits.contains_key(&id) {
            return Err(StoreError::DuplicateHit { id });
        }
        self.hits.insert(id, hit);
        Ok(id)
    }

    /// Get a hit by ID.
    pub fn get(&self, id: HitId) -> Result<&CaloHit, StoreError> {
        self.hits.get(&id).ok_or(StoreError::HitNotFound { id })
    }

    /// Get a mutable hit by ID.
    pub fn get_mut(&mut self, id: HitId) -> Result<&mut CaloHit, StoreError> {
        self.hits.get_mut(&id).ok_or(StoreError::HitNotFound { id })
    }

    /// Returns true if the store holds `id`.
    #[must_use]
    pub fn contains(&self, id: HitId) -> bool {
        self.hits.contains_key(&id)
    }

    /// Number of stored hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterate over every stored hit in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &CaloHit> {
        self.hits.values()
    }

    /// Clear the derived properties of every hit ahead of a new property pass.
    ///
    /// Surrounding energy accumulates across `calculate_properties` calls and
    /// the isolated / possible-MIP flags are only ever raised, so a second pass
    /// over the same hits starts from here.
    pub fn reset_derived_properties(&mut self) {
        for hit in self.hits.values_mut() {
            hit.reset_derived_properties();
        }
    }

    /// Ground-truth availability of a hit.
    pub fn is_available(&self, id: HitId) -> Result<bool, StoreError> {
        self.get(id).map(CaloHit::is_available)
    }

    /// Overwrite the ground-truth availability of a hit.
    pub fn set_available(&mut self, id: HitId, available: bool) -> Result<(), StoreError> {
        self.get_mut(id)?.is_available = available;
        Ok(())
    }
}
