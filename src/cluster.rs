//! Minimal cluster view used to seed hypotheses.

use serde::{Deserialize, Serialize};

use crate::error::LayerError;
use crate::hit::{CaloHit, HitId};
use crate::storage::OrderedHitList;

/// Stable cluster identifier (index assigned by the caller).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

/// A cluster's hits, split into the layered core and loosely attached isolated hits.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    /// Caller-assigned identifier.
    pub id: ClusterId,
    ordered_hits: OrderedHitList,
    isolated_hits: OrderedHitList,
}

impl Cluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new(id: ClusterId) -> Self {
        Self {
            id,
            ordered_hits: OrderedHitList::new(),
            isolated_hits: OrderedHitList::new(),
        }
    }

    /// Add a hit to the layered core.
    pub fn add_hit(&mut self, hit: &CaloHit) -> Result<(), LayerError> {
        self.ensure_absent(hit.id)?;
        self.ordered_hits.add_hit(hit)
    }

    /// Add an isolated hit.
    pub fn add_isolated_hit(&mut self, hit: &CaloHit) -> Result<(), LayerError> {
        self.ensure_absent(hit.id)?;
        self.isolated_hits.add_hit(hit)
    }

    fn ensure_absent(&self, id: HitId) -> Result<(), LayerError> {
        let existing = self
            .ordered_hits
            .layer_of(id)
            .or_else(|| self.isolated_hits.layer_of(id));
        match existing {
            Some(layer) => Err(LayerError::DuplicateHit { id, layer }),
            None => Ok(()),
        }
    }

    /// The layered core hits.
    #[must_use]
    pub const fn ordered_hits(&self) -> &OrderedHitList {
        &self.ordered_hits
    }

    /// The isolated hits.
    #[must_use]
    pub const fn isolated_hits(&self) -> &OrderedHitList {
        &self.isolated_hits
    }

    /// Total hit count (core + isolated).
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.ordered_hits.len() + self.isolated_hits.len()
    }
}

/// Merge the core and isolated hits of every cluster into one ordered list.
///
/// A hit shared between two clusters is reported as a duplicate.
pub fn merge_cluster_hits(clusters: &[Cluster]) -> Result<OrderedHitList, LayerError> {
    let mut merged = OrderedHitList::new();
    for cluster in clusters {
        merged.add_list(cluster.ordered_hits())?;
        merged.add_list(cluster.isolated_hits())?;
    }
    Ok(merged)
}
