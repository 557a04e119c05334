//! Per-hypothesis availability overlay.

use std::collections::HashMap;

use crate::error::HypothesisError;
use crate::hit::HitId;

/// Shadow mapping of hit → availability for one hypothesis.
///
/// The key set is fixed when the overlay is seeded; later writes may only
/// change values of existing keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageOverlay {
    entries: HashMap<HitId, bool>,
}

impl UsageOverlay {
    /// Seed an overlay with every id marked unavailable.
    pub fn seeded(name: &str, ids: impl IntoIterator<Item = HitId>) -> Result<Self, HypothesisError> {
        let mut entries = HashMap::new();
        for id in ids {
            if entries.insert(id, false).is_some() {
                return Err(HypothesisError::DuplicateSeedHit {
                    name: name.to_string(),
                    id,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Copy of this overlay's key set with every hit marked available.
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self {
            entries: self.entries.keys().map(|&id| (id, true)).collect(),
        }
    }

    /// Availability of `id`, or `None` if the overlay does not track it.
    #[must_use]
    pub fn get(&self, id: HitId) -> Option<bool> {
        self.entries.get(&id).copied()
    }

    /// Overwrite the availability of a tracked hit.
    pub fn set(&mut self, id: HitId, available: bool) -> Result<(), HypothesisError> {
        match self.entries.get_mut(&id) {
            Some(slot) => {
                *slot = available;
                Ok(())
            }
            None => Err(HypothesisError::HitNotInHypothesis { id }),
        }
    }

    /// Returns true if the overlay tracks `id`.
    #[must_use]
    pub fn contains(&self, id: HitId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Iterate over (hit, availability) pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (HitId, bool)> + '_ {
        self.entries.iter().map(|(&id, &available)| (id, available))
    }

    /// Number of tracked hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no hit is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
