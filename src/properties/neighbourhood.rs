//! Single-layer contribution kernels.
//!
//! Each kernel scans the hits of one pseudolayer around a reference hit,
//! skipping the reference hit itself.

use std::collections::BTreeSet;

use tracing::warn;

use crate::error::{CaloResult, PropertyError};
use crate::hit::{CaloHit, DetectorRegion, HitId};
use crate::settings::HitSettings;
use crate::storage::HitStore;
use crate::vector::CartesianVector;

/// Distance of the displacement `difference` from the line through the origin and `position`.
fn perpendicular_distance(position: &CartesianVector, magnitude: f32, difference: &CartesianVector) -> f32 {
    position.cross(difference).magnitude() / magnitude
}

/// `|p|` of the hit, which perpendicular distances divide by.
fn position_magnitude(hit: &CaloHit) -> CaloResult<f32> {
    let magnitude = hit.position.magnitude();
    if magnitude <= 0.0 {
        return Err(PropertyError::DegeneratePosition { id: hit.id }.into());
    }
    Ok(magnitude)
}

/// Region-dependent proximity test in units of the reference hit's cell sizes.
///
/// Barrel compares |dz| against u and the transverse displacement against v;
/// endcap compares |dx| against u and |dy| against v. Both bounds are strict.
fn within_cells(hit: &CaloHit, difference: &CartesianVector, n_cells: f32) -> bool {
    match hit.region {
        DetectorRegion::Barrel => {
            difference.z.abs() < n_cells * hit.cell_size_u
                && difference.transverse_magnitude() < n_cells * hit.cell_size_v
        }
        DetectorRegion::Endcap => {
            difference.x.abs() < n_cells * hit.cell_size_u
                && difference.y.abs() < n_cells * hit.cell_size_v
        }
    }
}

#[allow(clippy::float_cmp)]
pub(crate) fn density_weight_contribution(
    hit: &CaloHit,
    layer: &BTreeSet<HitId>,
    store: &HitStore,
    settings: &HitSettings,
) -> CaloResult<f32> {
    let max_separation_squared = settings.calo_hit_max_separation * settings.calo_hit_max_separation;
    let magnitude = position_magnitude(hit)?;

    let mut contribution = 0.0f32;
    for &id in layer {
        if id == hit.id {
            continue;
        }
        let other = store.get(id)?;
        let difference = hit.position - other.position;
        if difference.magnitude_squared() > max_separation_squared {
            continue;
        }

        let r = perpendicular_distance(&hit.position, magnitude, &difference);
        let mut r_n = 1.0f32;
        for _ in 0..settings.density_weight_power {
            r_n *= r;
        }

        if r_n == 0.0 {
            warn!(hit = %hit.id, other = %id, "zero perpendicular distance in density weight");
            return Err(PropertyError::ZeroPerpendicularDistance { id: hit.id, other: id }.into());
        }
        contribution += 100.0 / r_n;
    }
    Ok(contribution)
}

pub(crate) fn surrounding_energy_contribution(
    hit: &CaloHit,
    layer: &BTreeSet<HitId>,
    store: &HitStore,
    settings: &HitSettings,
) -> CaloResult<f32> {
    let mut contribution = 0.0f32;
    for &id in layer {
        if id == hit.id {
            continue;
        }
        let other = store.get(id)?;
        let difference = hit.position - other.position;
        if difference.magnitude() > settings.calo_hit_max_separation {
            continue;
        }
        if within_cells(hit, &difference, 1.5) {
            contribution += other.hadronic_energy;
        }
    }
    Ok(contribution)
}

pub(crate) fn isolation_count_nearby_hits(
    hit: &CaloHit,
    layer: &BTreeSet<HitId>,
    store: &HitStore,
    settings: &HitSettings,
) -> CaloResult<u32> {
    let magnitude = position_magnitude(hit)?;
    let cut = settings.isolation_cut_distance(hit.hit_type);
    let max_separation = 10.0 * settings.calo_hit_max_separation;

    let mut nearby = 0u32;
    for &id in layer {
        if id == hit.id {
            continue;
        }
        let other = store.get(id)?;
        let difference = hit.position - other.position;
        if difference.magnitude() > max_separation {
            continue;
        }
        if perpendicular_distance(&hit.position, magnitude, &difference) < cut {
            nearby += 1;
        }
    }
    Ok(nearby)
}

pub(crate) fn mip_count_nearby_hits(
    hit: &CaloHit,
    layer: &BTreeSet<HitId>,
    store: &HitStore,
    settings: &HitSettings,
) -> CaloResult<u32> {
    #[allow(clippy::cast_precision_loss)]
    let n_cells = settings.mip_n_cells_for_nearby_hit as f32 + 0.5;

    let mut nearby = 0u32;
    for &id in layer {
        if id == hit.id {
            continue;
        }
        let other = store.get(id)?;
        let difference = hit.position - other.position;
        if difference.magnitude() > settings.calo_hit_max_separation {
            continue;
        }
        if within_cells(hit, &difference, n_cells) {
            nearby += 1;
        }
    }
    Ok(nearby)
}
