//! Error types for calohits.
//!
//! All errors are strongly typed using thiserror. Each concern has its own
//! enum; `CaloError` wraps them and maps every variant onto one of the five
//! coarse `ErrorKind`s callers branch on.

use thiserror::Error;

use crate::hit::{HitId, PseudoLayer};

/// Coarse error classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation invalid at the current hypothesis nesting depth.
    NotAllowed,
    /// Referenced name or hit key is absent.
    NotFound,
    /// Name or key collision on creation.
    AlreadyExists,
    /// Structural inconsistency or numerical degeneracy.
    Failure,
    /// Rejected input value.
    InvalidParameter,
}

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Setting '{name}' is invalid: {reason}")]
    InvalidSetting {
        name: &'static str,
        reason: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Density weight {value} is invalid (must be finite and >= 0)")]
    InvalidDensityWeight {
        value: f32,
    },

    #[error("Cell size {value} is invalid (must be finite and > 0)")]
    InvalidCellSize {
        value: f32,
    },

    #[error("Hit field '{field}' is not finite")]
    NonFiniteHitField {
        field: &'static str,
    },

    #[error("Hypothesis name cannot be empty")]
    EmptyHypothesisName,

    #[error("Failed to read settings: {message}")]
    SettingsSource {
        message: String,
    },
}

/// Errors raised by the hit store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Hit not found: {id}")]
    HitNotFound {
        id: HitId,
    },

    #[error("Hit already stored: {id}")]
    DuplicateHit {
        id: HitId,
    },
}

/// Errors raised by the ordered (per-pseudolayer) hit list.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Hit {id} is not present in the ordered hit list")]
    HitNotPresent {
        id: HitId,
    },

    #[error("Hit {id} is already present in pseudolayer {layer}")]
    DuplicateHit {
        id: HitId,
        layer: PseudoLayer,
    },
}

/// Errors raised by the hypothesis manager.
#[derive(Debug, Error)]
pub enum HypothesisError {
    #[error("'{operation}' requires an open hypothesis")]
    NoOpenHypothesis {
        operation: &'static str,
    },

    #[error("Hypothesis scope '{name}' was resolved inside its callback; its writes have landed")]
    ScopeResolvedInCallback {
        name: String,
    },

    #[error("Hypothesis scope '{name}' returned with {extra} nested level(s) still open")]
    ScopeLeftOpen {
        name: String,
        extra: usize,
    },

    #[error("Hypothesis not found: {name}")]
    UnknownHypothesis {
        name: String,
    },

    #[error("Hypothesis already registered: {name}")]
    DuplicateHypothesis {
        name: String,
    },

    #[error("Hit {id} is not tracked by the current hypothesis")]
    HitNotInHypothesis {
        id: HitId,
    },

    #[error("Hit {id} seeded twice into hypothesis '{name}'")]
    DuplicateSeedHit {
        name: String,
        id: HitId,
    },

    #[error("Hypothesis '{name}' tracks hit {id} unknown to its parent")]
    IncompatibleParent {
        name: String,
        id: HitId,
    },
}

/// Errors raised while computing hit properties.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("Hits {id} and {other} give a zero perpendicular distance")]
    ZeroPerpendicularDistance {
        id: HitId,
        other: HitId,
    },

    #[error("Hit {id} sits at the origin; perpendicular distances are undefined")]
    DegeneratePosition {
        id: HitId,
    },
}

/// Top-level error type for calohits.
#[derive(Debug, Error)]
pub enum CaloError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),

    #[error("Hypothesis error: {0}")]
    Hypothesis(#[from] HypothesisError),

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl CaloError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidParameter,
            Self::Store(e) => match e {
                StoreError::HitNotFound { .. } => ErrorKind::NotFound,
                StoreError::DuplicateHit { .. } => ErrorKind::AlreadyExists,
            },
            Self::Layer(e) => match e {
                LayerError::HitNotPresent { .. } => ErrorKind::NotFound,
                LayerError::DuplicateHit { .. } => ErrorKind::AlreadyExists,
            },
            Self::Hypothesis(e) => match e {
                HypothesisError::NoOpenHypothesis { .. }
                | HypothesisError::ScopeResolvedInCallback { .. }
                | HypothesisError::ScopeLeftOpen { .. } => ErrorKind::NotAllowed,
                HypothesisError::UnknownHypothesis { .. }
                | HypothesisError::HitNotInHypothesis { .. } => ErrorKind::NotFound,
                HypothesisError::DuplicateHypothesis { .. } => ErrorKind::AlreadyExists,
                HypothesisError::DuplicateSeedHit { .. }
                | HypothesisError::IncompatibleParent { .. } => ErrorKind::Failure,
            },
            Self::Property(_) | Self::Internal { .. } => ErrorKind::Failure,
        }
    }

    /// Returns true if this error is a scope-discipline violation.
    #[must_use]
    pub const fn is_not_allowed(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotAllowed)
    }

    /// Returns true if a referenced name or hit was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    /// Returns true if this is a name or key collision.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self.kind(), ErrorKind::AlreadyExists)
    }

    /// Returns true if this is a structural failure that should abort the pass.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Failure)
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for calohits operations.
pub type CaloResult<T> = Result<T, CaloError>;
