//! Pseudolayer-ordered hit index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::LayerError;
use crate::hit::{CaloHit, HitId, PseudoLayer};

/// Ordered mapping from pseudolayer to the ids of the hits in that layer.
///
/// Each hit id appears in at most one layer. Layers never hold an empty set:
/// removing the last hit of a layer drops the layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrderedHitList {
    layers: BTreeMap<PseudoLayer, BTreeSet<HitId>>,
    layer_of: HashMap<HitId, PseudoLayer>,
}

impl OrderedHitList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from hits, using each hit's own pseudolayer.
    pub fn from_hits<'a>(hits: impl IntoIterator<Item = &'a CaloHit>) -> Result<Self, LayerError> {
        let mut list = Self::new();
        for hit in hits {
            list.add_hit(hit)?;
        }
        Ok(list)
    }

    /// Add a hit id to `layer`. Returns error if the id is already present.
    pub fn add(&mut self, id: HitId, layer: PseudoLayer) -> Result<(), LayerError> {
        if let Some(&existing) = self.layer_of.get(&id) {
            return Err(LayerError::DuplicateHit { id, layer: existing });
        }
        self.layers.entry(layer).or_default().insert(id);
        self.layer_of.insert(id, layer);
        Ok(())
    }

    /// Add a hit under its own pseudolayer.
    pub fn add_hit(&mut self, hit: &CaloHit) -> Result<(), LayerError> {
        self.add(hit.id, hit.pseudo_layer)
    }

    /// Add every hit of `other`. Stops at the first id already present.
    pub fn add_list(&mut self, other: &Self) -> Result<(), LayerError> {
        for (&layer, ids) in &other.layers {
            for &id in ids {
                self.add(id, layer)?;
            }
        }
        Ok(())
    }

    /// Remove a set of hit ids.
    ///
    /// Every id must be present; if any is missing nothing is removed.
    pub fn remove_hits<'a>(&mut self, ids: impl IntoIterator<Item = &'a HitId> + Clone) -> Result<(), LayerError> {
        if let Some(&missing) = ids.clone().into_iter().find(|id| !self.layer_of.contains_key(*id)) {
            return Err(LayerError::HitNotPresent { id: missing });
        }

        for id in ids {
            let Some(layer) = self.layer_of.remove(id) else {
                continue;
            };
            if let Some(set) = self.layers.get_mut(&layer) {
                set.remove(id);
                if set.is_empty() {
                    self.layers.remove(&layer);
                }
            }
        }
        Ok(())
    }

    /// Hit ids in `layer`, if the layer is populated.
    #[must_use]
    pub fn layer(&self, layer: PseudoLayer) -> Option<&BTreeSet<HitId>> {
        self.layers.get(&layer)
    }

    /// Pseudolayer holding `id`.
    #[must_use]
    pub fn layer_of(&self, id: HitId) -> Option<PseudoLayer> {
        self.layer_of.get(&id).copied()
    }

    /// Returns true if `id` is present in any layer.
    #[must_use]
    pub fn contains(&self, id: HitId) -> bool {
        self.layer_of.contains_key(&id)
    }

    /// Iterate over populated layers in ascending pseudolayer order.
    pub fn iter(&self) -> impl Iterator<Item = (PseudoLayer, &BTreeSet<HitId>)> {
        self.layers.iter().map(|(&layer, ids)| (layer, ids))
    }

    /// Iterate over every hit id, layer by layer.
    pub fn hit_ids(&self) -> impl Iterator<Item = HitId> + '_ {
        self.layers.values().flat_map(|ids| ids.iter().copied())
    }

    /// Total number of hit ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layer_of.len()
    }

    /// Returns true if no layer is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layer_of.is_empty()
    }
}
