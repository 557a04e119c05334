//! Hypothesis registry with strict nesting discipline.
//!
//! Key invariants:
//! - At depth 0 the registry, the nesting levels and the parent stack are empty.
//! - At depth d >= 1 exactly one overlay is current and the parent stack holds d - 1 names.
//! - The registry is the only owner of overlays; `current` and `parents` hold names.
//! - A failed call leaves the manager exactly as it was.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CaloError, CaloResult, HypothesisError, StoreError, ValidationError};
use crate::hit::HitId;
use crate::storage::HitStore;

use super::overlay::UsageOverlay;

/// What an `apply` did with the resolved hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The outermost level was resolved; availability was written to the hits.
    Committed {
        /// Number of hits written.
        hits: usize,
    },
    /// An inner level was resolved into the parent hypothesis.
    Merged {
        /// Name of the parent hypothesis, current again after the merge.
        into: String,
        /// Number of hits written into the parent.
        hits: usize,
    },
}

/// Serializable snapshot of the manager's nesting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypothesisSummary {
    /// Number of open nesting levels.
    pub depth: usize,
    /// Name of the current hypothesis, if any.
    pub current: Option<String>,
    /// Hypothesis names per nesting level, outermost first.
    pub levels: Vec<Vec<String>>,
}

/// Owns every open hypothesis of a reconstruction pass.
#[derive(Debug, Default)]
pub struct HypothesisManager {
    overlays: HashMap<String, UsageOverlay>,
    current: Option<String>,
    parents: Vec<String>,
    levels: Vec<Vec<String>>,
}

fn ensure_name(name: &str) -> CaloResult<()> {
    if name.is_empty() {
        return Err(ValidationError::EmptyHypothesisName.into());
    }
    Ok(())
}

impl HypothesisManager {
    /// Create a manager with no open hypothesis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open nesting levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Name of the current hypothesis.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current overlay, if a hypothesis is open.
    #[must_use]
    pub fn current(&self) -> Option<&UsageOverlay> {
        self.current.as_ref().and_then(|name| self.overlays.get(name))
    }

    /// Mutable access to the current overlay.
    pub fn current_mut(&mut self) -> Option<&mut UsageOverlay> {
        let name = self.current.as_ref()?;
        self.overlays.get_mut(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.overlays.contains_key(name)
    }

    /// Number of registered hypotheses.
    #[must_use]
    pub fn registered_len(&self) -> usize {
        self.overlays.len()
    }

    /// Snapshot of the nesting state.
    #[must_use]
    pub fn summary(&self) -> HypothesisSummary {
        HypothesisSummary {
            depth: self.depth(),
            current: self.current.clone(),
            levels: self.levels.clone(),
        }
    }

    /// Open a new nesting level whose first hypothesis tracks `seed`, all unavailable.
    ///
    /// Always increases the depth by one. The previous current hypothesis, if
    /// any, becomes the parent.
    pub fn create_initial(&mut self, name: &str, seed: impl IntoIterator<Item = HitId>) -> CaloResult<()> {
        ensure_name(name)?;
        if self.overlays.contains_key(name) {
            return Err(HypothesisError::DuplicateHypothesis {
                name: name.to_string(),
            }
            .into());
        }

        let overlay = UsageOverlay::seeded(name, seed)?;
        let tracked = overlay.len();

        if let Some(parent) = self.current.take() {
            self.parents.push(parent);
        }
        self.overlays.insert(name.to_string(), overlay);
        self.current = Some(name.to_string());
        self.levels.push(vec![name.to_string()]);

        debug!(name, depth = self.depth(), tracked, "initial hypothesis created");
        Ok(())
    }

    /// Add a sibling hypothesis at the current level and make it current.
    ///
    /// The sibling tracks the current hypothesis's hits, all reset to available.
    pub fn create_additional(&mut self, name: &str) -> CaloResult<()> {
        ensure_name(name)?;
        let Some(current) = self.current() else {
            return Err(HypothesisError::NoOpenHypothesis {
                operation: "create_additional",
            }
            .into());
        };
        if self.overlays.contains_key(name) {
            return Err(HypothesisError::DuplicateHypothesis {
                name: name.to_string(),
            }
            .into());
        }

        let sibling = current.sibling();
        self.overlays.insert(name.to_string(), sibling);
        self.current = Some(name.to_string());
        if let Some(level) = self.levels.last_mut() {
            level.push(name.to_string());
        }

        debug!(name, depth = self.depth(), "additional hypothesis created");
        Ok(())
    }

    /// Resolve the current nesting level using the hypothesis `name`.
    ///
    /// At depth 1 the hypothesis's values are written into the hits' ground
    /// truth and all manager state is discarded. Deeper, the values overwrite
    /// the parent hypothesis, which becomes current again, and every hypothesis
    /// created at the closed level is discarded.
    pub fn apply(&mut self, name: &str, store: &mut HitStore) -> CaloResult<ApplyOutcome> {
        if self.depth() == 0 {
            return Err(HypothesisError::NoOpenHypothesis { operation: "apply" }.into());
        }
        let Some(overlay) = self.overlays.get(name) else {
            return Err(HypothesisError::UnknownHypothesis {
                name: name.to_string(),
            }
            .into());
        };
        let values: Vec<(HitId, bool)> = overlay.iter().collect();

        if self.depth() == 1 {
            if let Some(&(id, _)) = values.iter().find(|(id, _)| !store.contains(*id)) {
                return Err(StoreError::HitNotFound { id }.into());
            }
            for &(id, available) in &values {
                store.set_available(id, available)?;
            }
            self.clear();
            debug!(name, hits = values.len(), "hypothesis committed to ground truth");
            return Ok(ApplyOutcome::Committed { hits: values.len() });
        }

        let Some(parent_name) = self.parents.last().cloned() else {
            return Err(CaloError::internal(
                "parent stack is shorter than the nesting depth",
            ));
        };
        let parent = self
            .overlays
            .get(&parent_name)
            .ok_or_else(|| CaloError::internal("parent hypothesis is not registered"))?;
        if let Some(&(id, _)) = values.iter().find(|(id, _)| !parent.contains(*id)) {
            warn!(name, parent = %parent_name, %id, "hypothesis tracks a hit unknown to its parent");
            return Err(HypothesisError::IncompatibleParent {
                name: name.to_string(),
                id,
            }
            .into());
        }

        self.parents.pop();
        if let Some(parent) = self.overlays.get_mut(&parent_name) {
            for &(id, available) in &values {
                parent.set(id, available)?;
            }
        }
        self.current = Some(parent_name.clone());
        self.close_innermost_level();

        debug!(name, into = %parent_name, depth = self.depth(), hits = values.len(), "hypothesis merged into parent");
        Ok(ApplyOutcome::Merged {
            into: parent_name,
            hits: values.len(),
        })
    }

    /// Close the current nesting level without writing anything.
    ///
    /// Every hypothesis of the level is discarded and the parent hypothesis,
    /// if any, becomes current again with its values untouched.
    pub fn abandon_level(&mut self) -> CaloResult<()> {
        if self.depth() == 0 {
            return Err(HypothesisError::NoOpenHypothesis {
                operation: "abandon_level",
            }
            .into());
        }
        if self.depth() == 1 {
            self.clear();
        } else {
            self.current = self.parents.pop();
            self.close_innermost_level();
        }
        debug!(depth = self.depth(), "hypothesis level abandoned");
        Ok(())
    }

    fn close_innermost_level(&mut self) {
        if let Some(level) = self.levels.pop() {
            for name in level {
                self.overlays.remove(&name);
            }
        }
    }

    fn clear(&mut self) {
        self.overlays.clear();
        self.parents.clear();
        self.levels.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hit::{CaloHit, DetectorRegion, HitType};

    fn store_with(n: usize) -> (HitStore, Vec<HitId>) {
        let mut store = HitStore::new();
        let ids = (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let x = 1000.0 + i as f32;
                let hit = CaloHit::builder()
                    .position(x, 0.0, 0.0)
                    .cell_size(10.0, 10.0)
                    .hit_type(HitType::Ecal)
                    .region(DetectorRegion::Barrel)
                    .pseudo_layer(1)
                    .build()
                    .unwrap();
                store.insert(hit).unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn create_initial_increments_depth_and_seeds_unavailable() {
        let (_, ids) = store_with(2);
        let mut m = HypothesisManager::new();
        m.create_initial("h0", ids.clone()).unwrap();
        assert_eq!(m.depth(), 1);
        assert_eq!(m.current_name(), Some("h0"));
        assert_eq!(m.current().unwrap().get(ids[0]), Some(false));

        m.create_initial("h1", ids.clone()).unwrap();
        assert_eq!(m.depth(), 2);
        assert_eq!(m.summary().levels, vec![vec!["h0".to_string()], vec!["h1".to_string()]]);
    }

    #[test]
    fn duplicate_name_leaves_state_untouched() {
        let (_, ids) = store_with(1);
        let mut m = HypothesisManager::new();
        m.create_initial("h0", ids.clone()).unwrap();
        let before = m.summary();

        let err = m.create_initial("h0", ids.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        let err = m.create_additional("h0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(m.summary(), before);
    }

    #[test]
    fn duplicate_seed_leaves_state_untouched() {
        let (_, ids) = store_with(1);
        let mut m = HypothesisManager::new();
        let err = m.create_initial("h0", [ids[0], ids[0]]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert_eq!(m.depth(), 0);
        assert!(!m.is_registered("h0"));
    }

    #[test]
    fn nested_only_operations_rejected_at_depth_zero() {
        let (mut store, _) = store_with(1);
        let mut m = HypothesisManager::new();
        assert!(m.create_additional("h1").unwrap_err().is_not_allowed());
        assert!(m.apply("h1", &mut store).unwrap_err().is_not_allowed());
        assert!(m.abandon_level().unwrap_err().is_not_allowed());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut m = HypothesisManager::new();
        assert!(m.create_initial("", Vec::<HitId>::new()).unwrap_err().is_validation());
    }

    #[test]
    fn apply_unknown_name_is_not_found() {
        let (mut store, ids) = store_with(1);
        let mut m = HypothesisManager::new();
        m.create_initial("h0", ids).unwrap();
        assert!(m.apply("nope", &mut store).unwrap_err().is_not_found());
        assert_eq!(m.depth(), 1);
    }

    #[test]
    fn sibling_keeps_depth_and_resets_values() {
        let (_, ids) = store_with(2);
        let mut m = HypothesisManager::new();
        m.create_initial("h0", ids.clone()).unwrap();
        m.create_additional("h1").unwrap();
        assert_eq!(m.depth(), 1);
        assert_eq!(m.current_name(), Some("h1"));
        assert_eq!(m.current().unwrap().get(ids[1]), Some(true));
        assert_eq!(m.summary().levels, vec![vec!["h0".to_string(), "h1".to_string()]]);
    }

    #[test]
    fn terminal_apply_commits_and_clears() {
        let (mut store, ids) = store_with(2);
        let mut m = HypothesisManager::new();
        m.create_initial("h0", ids.clone()).unwrap();
        m.current_mut().unwrap().set(ids[0], true).unwrap();

        let outcome = m.apply("h0", &mut store).unwrap();
        assert_eq!(outcome, ApplyOutcome::Committed { hits: 2 });
        assert!(store.is_available(ids[0]).unwrap());
        assert!(!store.is_available(ids[1]).unwrap());
        assert_eq!(m.depth(), 0);
        assert_eq!(m.registered_len(), 0);
        assert!(m.current().is_none());
    }

    #[test]
    fn terminal_apply_with_unknown_hit_leaves_state_untouched() {
        let (mut store, ids) = store_with(1);
        let stray = HitId::new();
        let mut m = HypothesisManager::new();
        m.create_initial("h0", [ids[0], stray]).unwrap();

        let err = m.apply("h0", &mut store).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(m.depth(), 1);
        assert!(store.is_available(ids[0]).unwrap());
    }

    #[test]
    fn incompatible_child_is_failure_and_state_unchanged() {
        let (mut store, ids) = store_with(2);
        let mut m = HypothesisManager::new();
        m.create_initial("root", [ids[0]]).unwrap();
        m.create_initial("child", [ids[0], ids[1]]).unwrap();
        let before = m.summary();

        let err = m.apply("child", &mut store).unwrap_err();
        assert!(err.is_failure());
        assert_eq!(m.summary(), before);
    }

    #[test]
    fn abandon_inner_level_restores_parent_values() {
        let (_, ids) = store_with(1);
        let mut m = HypothesisManager::new();
        m.create_initial("root", ids.clone()).unwrap();
        m.current_mut().unwrap().set(ids[0], true).unwrap();
        m.create_initial("child", ids.clone()).unwrap();
        m.create_additional("child-alt").unwrap();

        m.abandon_level().unwrap();
        assert_eq!(m.depth(), 1);
        assert_eq!(m.current_name(), Some("root"));
        assert_eq!(m.current().unwrap().get(ids[0]), Some(true));
        assert!(!m.is_registered("child"));
        assert!(!m.is_registered("child-alt"));

        m.abandon_level().unwrap();
        assert_eq!(m.depth(), 0);
        assert_eq!(m.registered_len(), 0);
    }
}
