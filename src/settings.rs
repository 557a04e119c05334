//! Reconstruction settings consumed by the property calculator.
//!
//! These scalars normally come from the detector geometry and the
//! reconstruction steering; they are read-only once a context is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::hit::{HitType, PseudoLayer};

/// Scalar configuration for hit property calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitSettings {
    /// Maximum separation (mm) between hits for them to be considered neighbours.
    pub calo_hit_max_separation: f32,
    /// Power `k` in the `100 / r^k` density weight contribution.
    pub density_weight_power: u32,
    /// Half-width of the pseudolayer window for density weights.
    pub density_weight_n_layers: PseudoLayer,
    /// Half-width of the pseudolayer window for the full isolation scheme.
    pub isolation_n_layers: PseudoLayer,
    /// Perpendicular distance cut (mm) for ECAL isolation neighbours.
    pub isolation_cut_distance_ecal: f32,
    /// Perpendicular distance cut (mm) for HCAL and MUON isolation neighbours.
    pub isolation_cut_distance_hcal: f32,
    /// A hit stays isolated while its neighbour count is below this value.
    pub isolation_max_nearby_hits: u32,
    /// Use the density-weight isolation scheme instead of the layer-windowed count.
    pub use_simple_isolation_scheme: bool,
    /// Simple scheme: ECAL hits with density weight below this are isolated.
    pub isolation_density_weight_cut_ecal: f32,
    /// Simple scheme: HCAL and MUON hits with density weight below this are isolated.
    pub isolation_density_weight_cut_hcal: f32,
    /// MIP-equivalent energy cut before angular correction.
    pub mip_like_mip_cut: f32,
    /// Cell multiple defining a nearby hit for the MIP test.
    pub mip_n_cells_for_nearby_hit: u32,
    /// Maximum nearby hits a possible MIP may have.
    pub mip_max_nearby_hits: u32,
}

impl Default for HitSettings {
    fn default() -> Self {
        Self {
            calo_hit_max_separation: 100.0,
            density_weight_power: 2,
            density_weight_n_layers: 2,
            isolation_n_layers: 2,
            isolation_cut_distance_ecal: 25.0,
            isolation_cut_distance_hcal: 200.0,
            isolation_max_nearby_hits: 2,
            use_simple_isolation_scheme: false,
            isolation_density_weight_cut_ecal: 0.5,
            isolation_density_weight_cut_hcal: 0.25,
            mip_like_mip_cut: 5.0,
            mip_n_cells_for_nearby_hit: 2,
            mip_max_nearby_hits: 1,
        }
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidSetting {
            name,
            reason: format!("must be finite and > 0 (got {value})"),
        })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidSetting {
            name,
            reason: format!("must be finite and >= 0 (got {value})"),
        })
    }
}

impl HitSettings {
    /// Validate settings.
    ///
    /// This must be called before constructing a `PropertyCalculator`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("calo_hit_max_separation", self.calo_hit_max_separation)?;
        positive("isolation_cut_distance_ecal", self.isolation_cut_distance_ecal)?;
        positive("isolation_cut_distance_hcal", self.isolation_cut_distance_hcal)?;
        non_negative(
            "isolation_density_weight_cut_ecal",
            self.isolation_density_weight_cut_ecal,
        )?;
        non_negative(
            "isolation_density_weight_cut_hcal",
            self.isolation_density_weight_cut_hcal,
        )?;
        non_negative("mip_like_mip_cut", self.mip_like_mip_cut)?;
        Ok(())
    }

    /// Parse and validate settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ValidationError::SettingsSource {
                message: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ValidationError::SettingsSource {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Perpendicular distance cut for the full isolation scheme.
    #[must_use]
    pub const fn isolation_cut_distance(&self, hit_type: HitType) -> f32 {
        match hit_type {
            HitType::Ecal => self.isolation_cut_distance_ecal,
            HitType::Hcal | HitType::Muon => self.isolation_cut_distance_hcal,
        }
    }

    /// Density weight cut for the simple isolation scheme.
    #[must_use]
    pub const fn isolation_density_weight_cut(&self, hit_type: HitType) -> f32 {
        match hit_type {
            HitType::Ecal => self.isolation_density_weight_cut_ecal,
            HitType::Hcal | HitType::Muon => self.isolation_density_weight_cut_hcal,
        }
    }
}
