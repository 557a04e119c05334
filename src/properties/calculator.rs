//! Per-hit property orchestration over a pseudolayer window.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CaloResult, ValidationError};
use crate::hit::{CaloHit, DetectorRegion, HitId, HitType, PseudoLayer};
use crate::settings::HitSettings;
use crate::storage::{HitStore, OrderedHitList};

use super::neighbourhood::{
    density_weight_contribution, isolation_count_nearby_hits, mip_count_nearby_hits,
    surrounding_energy_contribution,
};

/// Properties computed for one hit, before they are written back.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HitProperties {
    /// Summed density weight over the density window.
    pub density_weight: f32,
    /// Hadronic energy of close neighbours in the hit's own layer.
    pub surrounding_energy: f32,
    /// Isolated under the full (layer-windowed) scheme. Always false when the
    /// simple scheme is configured.
    pub isolated: bool,
    /// Possible minimum-ionizing particle.
    pub possible_mip: bool,
}

/// Inclusive pseudolayer window `[layer - n, layer + n]`, clamped at 0.
fn window(layer: PseudoLayer, n: PseudoLayer) -> (PseudoLayer, PseudoLayer) {
    (layer.saturating_sub(n), layer.saturating_add(n))
}

/// Computes density weights, isolation, surrounding energy and MIP flags.
#[derive(Debug, Clone)]
pub struct PropertyCalculator {
    settings: HitSettings,
}

impl PropertyCalculator {
    /// Create a calculator. Settings are validated first.
    pub fn new(settings: HitSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// The settings in use.
    #[must_use]
    pub const fn settings(&self) -> &HitSettings {
        &self.settings
    }

    /// Compute the properties of hit `id` from its neighbourhood in `layers`.
    ///
    /// The scan covers the union of the density and isolation windows around
    /// the hit's pseudolayer. Surrounding energy and the MIP test only use the
    /// hit's own layer, and only if that layer is present in `layers`.
    pub fn compute(&self, store: &HitStore, id: HitId, layers: &OrderedHitList) -> CaloResult<HitProperties> {
        let settings = &self.settings;
        let hit = store.get(id)?;
        let pseudo_layer = hit.pseudo_layer;

        let (density_min, density_max) = window(pseudo_layer, settings.density_weight_n_layers);
        let (isolation_min, isolation_max) = window(pseudo_layer, settings.isolation_n_layers);
        let use_full_isolation = !settings.use_simple_isolation_scheme;

        let mut properties = HitProperties::default();
        let mut isolation_nearby_hits = 0u32;
        let mut is_isolated = true;

        for layer in density_min.min(isolation_min)..=density_max.max(isolation_max) {
            let Some(ids) = layers.layer(layer) else {
                continue;
            };

            if (density_min..=density_max).contains(&layer) {
                properties.density_weight += density_weight_contribution(hit, ids, store, settings)?;
            }

            if use_full_isolation && is_isolated && (isolation_min..=isolation_max).contains(&layer) {
                isolation_nearby_hits += isolation_count_nearby_hits(hit, ids, store, settings)?;
                is_isolated = isolation_nearby_hits < settings.isolation_max_nearby_hits;
            }

            if layer == pseudo_layer {
                properties.surrounding_energy += surrounding_energy_contribution(hit, ids, store, settings)?;
                properties.possible_mip = self.is_possible_mip(hit, ids, store)?;
            }
        }

        properties.isolated = use_full_isolation && is_isolated;
        Ok(properties)
    }

    fn is_possible_mip(
        &self,
        hit: &CaloHit,
        layer: &BTreeSet<HitId>,
        store: &HitStore,
    ) -> CaloResult<bool> {
        if hit.hit_type == HitType::Muon {
            return Ok(true);
        }

        let position = &hit.position;
        let angular_correction = match hit.region {
            DetectorRegion::Barrel => position.magnitude() / position.transverse_magnitude(),
            DetectorRegion::Endcap => position.magnitude() / position.z.abs(),
        };

        let mip_like = hit.mip_equivalent_energy <= self.settings.mip_like_mip_cut * angular_correction
            || hit.is_digital;
        if !mip_like {
            return Ok(false);
        }
        let nearby = mip_count_nearby_hits(hit, layer, store, &self.settings)?;
        Ok(nearby <= self.settings.mip_max_nearby_hits)
    }

    /// Compute the properties of hit `id` and write them onto the hit.
    ///
    /// The density weight is assigned, surrounding energy is added to the
    /// running total, and the isolated / possible-MIP flags are only ever
    /// raised, never cleared. On error the hit is left untouched.
    pub fn calculate_properties(
        &self,
        store: &mut HitStore,
        id: HitId,
        layers: &OrderedHitList,
    ) -> CaloResult<HitProperties> {
        let properties = self.compute(store, id, layers)?;

        let hit = store.get_mut(id)?;
        hit.set_density_weight(properties.density_weight)?;
        hit.add_surrounding_energy(properties.surrounding_energy);
        if properties.isolated {
            hit.set_isolated(true);
        }
        if properties.possible_mip {
            hit.set_possible_mip(true);
        }

        trace!(
            hit = %id,
            density_weight = properties.density_weight,
            isolated = properties.isolated,
            possible_mip = properties.possible_mip,
            "hit properties calculated"
        );
        Ok(properties)
    }

    /// Flag hits isolated when their density weight is below the type-dependent cut.
    ///
    /// Returns the number of hits flagged by this pass.
    pub fn apply_simple_isolation_scheme(
        &self,
        store: &mut HitStore,
        ids: impl IntoIterator<Item = HitId>,
    ) -> CaloResult<usize> {
        let mut flagged = 0;
        for id in ids {
            let hit = store.get_mut(id)?;
            if hit.density_weight() < self.settings.isolation_density_weight_cut(hit.hit_type) {
                hit.set_isolated(true);
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    /// Calculate properties for every hit in `layers`, then run the simple
    /// isolation pass if that scheme is configured.
    pub fn calculate_all_properties(&self, store: &mut HitStore, layers: &OrderedHitList) -> CaloResult<()> {
        for id in layers.hit_ids() {
            self.calculate_properties(store, id, layers)?;
        }
        if self.settings.use_simple_isolation_scheme {
            let flagged = self.apply_simple_isolation_scheme(store, layers.hit_ids())?;
            trace!(flagged, "simple isolation scheme applied");
        }
        Ok(())
    }
}
