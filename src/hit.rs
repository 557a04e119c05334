//! Calorimeter hit types and identity.
//!
//! A `CaloHit` carries its measured quantities (position, cell sizes, energies),
//! its ground-truth availability flag, and the derived properties written by the
//! property calculator. Hits are owned by a `HitStore` and addressed everywhere
//! else by their `HitId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::vector::CartesianVector;

/// Discretized depth index of a hit along its projected path through the detector.
pub type PseudoLayer = u32;

/// Stable hit identifier.
///
/// # Examples
///
/// ```
/// use calohits::HitId;
///
/// let id = HitId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitId(Uuid);

impl HitId {
    /// Creates a new random hit ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil hit ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for HitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for HitId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Calorimeter subsystem a hit was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitType {
    /// Electromagnetic calorimeter.
    Ecal,
    /// Hadronic calorimeter.
    Hcal,
    /// Muon system.
    Muon,
}

impl fmt::Display for HitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ecal => write!(f, "ecal"),
            Self::Hcal => write!(f, "hcal"),
            Self::Muon => write!(f, "muon"),
        }
    }
}

/// Detector geometry region; selects the displacement metric for proximity cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorRegion {
    /// Cylindrical barrel; cells are measured along z (u) and azimuth (v).
    Barrel,
    /// Endcap disks; cells are measured along x (u) and y (v).
    Endcap,
}

/// A calorimeter hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloHit {
    /// Unique identifier.
    pub id: HitId,
    /// Position of the cell centre.
    pub position: CartesianVector,
    /// Cell size along the first measurement axis.
    pub cell_size_u: f32,
    /// Cell size along the second measurement axis.
    pub cell_size_v: f32,
    /// Subsystem tag.
    pub hit_type: HitType,
    /// Geometry region.
    pub region: DetectorRegion,
    /// Pseudolayer index.
    pub pseudo_layer: PseudoLayer,
    /// Energy in units of a minimum-ionizing deposit.
    pub mip_equivalent_energy: f32,
    /// Energy under the hadronic calibration.
    pub hadronic_energy: f32,
    /// Whether the readout is digital (sub-unit energy resolution).
    pub is_digital: bool,

    pub(crate) is_available: bool,
    density_weight: f32,
    surrounding_energy: f32,
    is_isolated: bool,
    is_possible_mip: bool,
}

impl CaloHit {
    /// Creates a new hit builder.
    #[must_use]
    pub fn builder() -> CaloHitBuilder {
        CaloHitBuilder::new()
    }

    /// Ground-truth availability, ignoring any open hypothesis.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_available
    }

    /// Accumulated density weight.
    #[must_use]
    pub const fn density_weight(&self) -> f32 {
        self.density_weight
    }

    /// Accumulated hadronic energy of same-layer neighbours.
    #[must_use]
    pub const fn surrounding_energy(&self) -> f32 {
        self.surrounding_energy
    }

    /// Whether the hit was flagged isolated.
    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        self.is_isolated
    }

    /// Whether the hit was flagged as a possible MIP.
    #[must_use]
    pub const fn is_possible_mip(&self) -> bool {
        self.is_possible_mip
    }

    /// Sets the density weight. Negative or non-finite weights are rejected.
    pub fn set_density_weight(&mut self, weight: f32) -> Result<(), ValidationError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::InvalidDensityWeight { value: weight });
        }
        self.density_weight = weight;
        Ok(())
    }

    /// Adds to the surrounding energy.
    pub fn add_surrounding_energy(&mut self, energy: f32) {
        self.surrounding_energy += energy;
    }

    /// Sets the isolated flag.
    pub fn set_isolated(&mut self, isolated: bool) {
        self.is_isolated = isolated;
    }

    /// Sets the possible-MIP flag.
    pub fn set_possible_mip(&mut self, possible_mip: bool) {
        self.is_possible_mip = possible_mip;
    }

    /// Clears every derived property ahead of a new reconstruction pass.
    pub fn reset_derived_properties(&mut self) {
        self.density_weight = 0.0;
        self.surrounding_energy = 0.0;
        self.is_isolated = false;
        self.is_possible_mip = false;
    }
}

/// Builder for `CaloHit`.
#[derive(Debug, Default)]
pub struct CaloHitBuilder {
    id: Option<HitId>,
    position: Option<CartesianVector>,
    cell_size_u: Option<f32>,
    cell_size_v: Option<f32>,
    hit_type: Option<HitType>,
    region: Option<DetectorRegion>,
    pseudo_layer: Option<PseudoLayer>,
    mip_equivalent_energy: f32,
    hadronic_energy: f32,
    is_digital: bool,
    is_available: Option<bool>,
}

impl CaloHitBuilder {
    /// Creates a new hit builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hit ID (optional, will be generated if not set).
    #[must_use]
    pub fn id(mut self, id: HitId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the position.
    #[must_use]
    pub fn position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Some(CartesianVector::new(x, y, z));
        self
    }

    /// Sets both cell sizes.
    #[must_use]
    pub fn cell_size(mut self, u: f32, v: f32) -> Self {
        self.cell_size_u = Some(u);
        self.cell_size_v = Some(v);
        self
    }

    /// Sets the subsystem tag.
    #[must_use]
    pub fn hit_type(mut self, hit_type: HitType) -> Self {
        self.hit_type = Some(hit_type);
        self
    }

    /// Sets the geometry region.
    #[must_use]
    pub fn region(mut self, region: DetectorRegion) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets the pseudolayer.
    #[must_use]
    pub fn pseudo_layer(mut self, pseudo_layer: PseudoLayer) -> Self {
        self.pseudo_layer = Some(pseudo_layer);
        self
    }

    /// Sets the MIP-equivalent energy (defaults to 0).
    #[must_use]
    pub fn mip_equivalent_energy(mut self, energy: f32) -> Self {
        self.mip_equivalent_energy = energy;
        self
    }

    /// Sets the hadronic energy (defaults to 0).
    #[must_use]
    pub fn hadronic_energy(mut self, energy: f32) -> Self {
        self.hadronic_energy = energy;
        self
    }

    /// Marks the readout as digital.
    #[must_use]
    pub fn digital(mut self, is_digital: bool) -> Self {
        self.is_digital = is_digital;
        self
    }

    /// Sets the initial availability (defaults to available).
    #[must_use]
    pub fn available(mut self, is_available: bool) -> Self {
        self.is_available = Some(is_available);
        self
    }

    /// Builds the hit.
    /// Returns `ValidationError` if required fields are missing or invalid.
    pub fn build(self) -> Result<CaloHit, ValidationError> {
        let position = self.position.ok_or(ValidationError::MissingField {
            field: "position".to_string(),
        })?;
        if !position.is_finite() {
            return Err(ValidationError::NonFiniteHitField { field: "position" });
        }

        let cell_size_u = self.cell_size_u.ok_or(ValidationError::MissingField {
            field: "cell_size".to_string(),
        })?;
        let cell_size_v = self.cell_size_v.unwrap_or(cell_size_u);
        for value in [cell_size_u, cell_size_v] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidCellSize { value });
            }
        }

        let hit_type = self.hit_type.ok_or(ValidationError::MissingField {
            field: "hit_type".to_string(),
        })?;
        let region = self.region.ok_or(ValidationError::MissingField {
            field: "region".to_string(),
        })?;
        let pseudo_layer = self.pseudo_layer.ok_or(ValidationError::MissingField {
            field: "pseudo_layer".to_string(),
        })?;

        if !self.mip_equivalent_energy.is_finite() {
            return Err(ValidationError::NonFiniteHitField {
                field: "mip_equivalent_energy",
            });
        }
        if !self.hadronic_energy.is_finite() {
            return Err(ValidationError::NonFiniteHitField {
                field: "hadronic_energy",
            });
        }

        Ok(CaloHit {
            id: self.id.unwrap_or_else(HitId::new),
            position,
            cell_size_u,
            cell_size_v,
            hit_type,
            region,
            pseudo_layer,
            mip_equivalent_energy: self.mip_equivalent_energy,
            hadronic_energy: self.hadronic_energy,
            is_digital: self.is_digital,
            is_available: self.is_available.unwrap_or(true),
            density_weight: 0.0,
            surrounding_energy: 0.0,
            is_isolated: false,
            is_possible_mip: false,
        })
    }
}
