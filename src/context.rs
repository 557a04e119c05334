//! Reconstruction context: ground-truth hits, open hypotheses and the property calculator.
//!
//! Availability reads and writes are routed by nesting depth. At depth 0 they
//! go straight to the hits in the store; at depth >= 1 they go to the current
//! hypothesis overlay, and the hits themselves are untouched until the
//! outermost level is applied.

use tracing::{debug, warn};

use crate::cluster::{merge_cluster_hits, Cluster};
use crate::error::{CaloResult, HypothesisError};
use crate::hit::{CaloHit, HitId};
use crate::hypothesis::{ApplyOutcome, HypothesisManager, HypothesisSummary};
use crate::properties::{HitProperties, PropertyCalculator};
use crate::settings::HitSettings;
use crate::storage::{HitStore, OrderedHitList};

/// Owns the hits of one event and every hypothesis opened over them.
#[derive(Debug)]
pub struct HitContext {
    store: HitStore,
    hypotheses: HypothesisManager,
    calculator: PropertyCalculator,
}

impl HitContext {
    /// Create an empty context with the given settings.
    pub fn new(settings: HitSettings) -> CaloResult<Self> {
        Self::with_store(HitStore::new(), settings)
    }

    /// Create a context over an existing set of hits.
    pub fn with_store(store: HitStore, settings: HitSettings) -> CaloResult<Self> {
        Ok(Self {
            store,
            hypotheses: HypothesisManager::new(),
            calculator: PropertyCalculator::new(settings)?,
        })
    }

    /// Add a hit to the ground truth.
    pub fn add_hit(&mut self, hit: CaloHit) -> CaloResult<HitId> {
        Ok(self.store.insert(hit)?)
    }

    /// The ground-truth hits.
    #[must_use]
    pub const fn store(&self) -> &HitStore {
        &self.store
    }

    /// The property calculator and its settings.
    #[must_use]
    pub const fn calculator(&self) -> &PropertyCalculator {
        &self.calculator
    }

    // -- Availability --------------------------------------------------

    /// Availability of `id` under the current rule.
    ///
    /// Inside a hypothesis, a hit the hypothesis does not track reads as
    /// unavailable.
    pub fn is_available(&self, id: HitId) -> CaloResult<bool> {
        match self.hypotheses.current() {
            Some(overlay) => Ok(overlay.get(id).unwrap_or(false)),
            None => Ok(self.store.is_available(id)?),
        }
    }

    /// Returns true if every hit in `ids` is available. Stops at the first
    /// unavailable hit; an empty collection is vacuously available.
    pub fn are_all_available<'a>(&self, ids: impl IntoIterator<Item = &'a HitId>) -> CaloResult<bool> {
        for &id in ids {
            if !self.is_available(id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Set the availability of `id` under the current rule.
    pub fn set_available(&mut self, id: HitId, available: bool) -> CaloResult<()> {
        match self.hypotheses.current_mut() {
            Some(overlay) => Ok(overlay.set(id, available)?),
            None => Ok(self.store.set_available(id, available)?),
        }
    }

    /// Set the availability of every hit in `ids`.
    ///
    /// Hits are written in order; an error leaves the earlier writes in place
    /// and the hypothesis tree should be abandoned.
    pub fn set_available_many<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a HitId>,
        available: bool,
    ) -> CaloResult<()> {
        for &id in ids {
            self.set_available(id, available)?;
        }
        Ok(())
    }

    /// Keep only the available hits of `ids`, preserving order.
    pub fn remove_unavailable(&self, ids: &mut Vec<HitId>) -> CaloResult<()> {
        let mut kept = Vec::with_capacity(ids.len());
        for &id in ids.iter() {
            if self.is_available(id)? {
                kept.push(id);
            }
        }
        *ids = kept;
        Ok(())
    }

    /// Remove every unavailable hit from `layers`. Emptied layers are dropped.
    pub fn remove_unavailable_from_layers(&self, layers: &mut OrderedHitList) -> CaloResult<()> {
        let mut unavailable = Vec::new();
        for id in layers.hit_ids() {
            if !self.is_available(id)? {
                unavailable.push(id);
            }
        }
        if unavailable.is_empty() {
            return Ok(());
        }
        layers.remove_hits(unavailable.iter())?;
        debug!(removed = unavailable.len(), "unavailable hits removed from layers");
        Ok(())
    }

    // -- Hypotheses ----------------------------------------------------

    /// Open a nesting level seeded with every hit of `layers`, all unavailable.
    pub fn create_initial_hypothesis(&mut self, name: &str, layers: &OrderedHitList) -> CaloResult<()> {
        self.ensure_known(layers)?;
        self.hypotheses.create_initial(name, layers.hit_ids())
    }

    /// Open a nesting level seeded with the core and isolated hits of `clusters`.
    pub fn create_initial_hypothesis_from_clusters(&mut self, name: &str, clusters: &[Cluster]) -> CaloResult<()> {
        let merged = merge_cluster_hits(clusters)?;
        self.create_initial_hypothesis(name, &merged)
    }

    fn ensure_known(&self, layers: &OrderedHitList) -> CaloResult<()> {
        for id in layers.hit_ids() {
            self.store.get(id)?;
        }
        Ok(())
    }

    /// Add a sibling of the current hypothesis with every hit available.
    pub fn create_additional_hypothesis(&mut self, name: &str) -> CaloResult<()> {
        self.hypotheses.create_additional(name)
    }

    /// Resolve the current nesting level with hypothesis `name`.
    pub fn apply_hypothesis(&mut self, name: &str) -> CaloResult<ApplyOutcome> {
        self.hypotheses.apply(name, &mut self.store)
    }

    /// Close the current nesting level without writing anything.
    pub fn abandon_hypothesis_level(&mut self) -> CaloResult<()> {
        self.hypotheses.abandon_level()
    }

    /// Run `f` inside a fresh hypothesis seeded from `seed`.
    ///
    /// `f` returns the name of the hypothesis to apply, which may be `name`
    /// itself or a sibling it created. If `f` or the apply fails, every level
    /// opened from here on is abandoned before the error is returned.
    ///
    /// `f` must not resolve the scope's own level. If it applies or abandons
    /// that level, the call fails with `ScopeResolvedInCallback`, and whatever
    /// that apply wrote (to the parent or to the hits) has already landed.
    /// If `f` returns with deeper levels still open, they are abandoned along
    /// with the scope and the call fails with `ScopeLeftOpen`.
    pub fn with_hypothesis<F>(&mut self, name: &str, seed: &OrderedHitList, f: F) -> CaloResult<ApplyOutcome>
    where
        F: FnOnce(&mut Self) -> CaloResult<String>,
    {
        let outer = self.depth();
        self.create_initial_hypothesis(name, seed)?;
        let level = outer + 1;

        let result = f(self);
        if self.depth() <= outer {
            warn!(name, depth = self.depth(), "hypothesis scope resolved inside its callback");
            return Err(HypothesisError::ScopeResolvedInCallback {
                name: name.to_string(),
            }
            .into());
        }

        let result = result.and_then(|chosen| {
            if self.depth() > level {
                return Err(HypothesisError::ScopeLeftOpen {
                    name: name.to_string(),
                    extra: self.depth() - level,
                }
                .into());
            }
            self.apply_hypothesis(&chosen)
        });

        if result.is_err() {
            while self.depth() > outer {
                self.abandon_hypothesis_level()?;
            }
        }
        result
    }

    /// Number of open nesting levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.hypotheses.depth()
    }

    /// Name of the current hypothesis.
    #[must_use]
    pub fn current_hypothesis(&self) -> Option<&str> {
        self.hypotheses.current_name()
    }

    /// Returns true if `name` is an open hypothesis.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.hypotheses.is_registered(name)
    }

    /// Snapshot of the nesting state.
    #[must_use]
    pub fn summary(&self) -> HypothesisSummary {
        self.hypotheses.summary()
    }

    // -- Properties ----------------------------------------------------

    /// Compute and store the properties of hit `id` from its neighbourhood in `layers`.
    pub fn calculate_properties(&mut self, id: HitId, layers: &OrderedHitList) -> CaloResult<HitProperties> {
        self.calculator.calculate_properties(&mut self.store, id, layers)
    }

    /// Clear the derived properties of every hit before a fresh property pass.
    pub fn reset_derived_properties(&mut self) {
        self.store.reset_derived_properties();
        debug!(hits = self.store.len(), "derived hit properties reset");
    }

    /// Compute and store the properties of every hit in `layers`.
    pub fn calculate_all_properties(&mut self, layers: &OrderedHitList) -> CaloResult<()> {
        self.calculator.calculate_all_properties(&mut self.store, layers)
    }

    /// Flag low-density hits of `ids` as isolated. Returns the number flagged.
    pub fn apply_simple_isolation_scheme<'a>(&mut self, ids: impl IntoIterator<Item = &'a HitId>) -> CaloResult<usize> {
        self.calculator
            .apply_simple_isolation_scheme(&mut self.store, ids.into_iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaloError;
    use crate::hit::{DetectorRegion, HitType, PseudoLayer};

    fn hit(layer: PseudoLayer) -> CaloHit {
        CaloHit::builder()
            .position(1000.0, 0.0, 0.0)
            .cell_size(10.0, 10.0)
            .hit_type(HitType::Ecal)
            .region(DetectorRegion::Barrel)
            .pseudo_layer(layer)
            .build()
            .unwrap()
    }

    fn context_with(n: usize) -> (HitContext, Vec<HitId>, OrderedHitList) {
        let mut ctx = HitContext::new(HitSettings::default()).unwrap();
        let mut layers = OrderedHitList::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let h = hit(PseudoLayer::try_from(i).unwrap());
            layers.add_hit(&h).unwrap();
            ids.push(ctx.add_hit(h).unwrap());
        }
        (ctx, ids, layers)
    }

    #[test]
    fn depth_zero_reads_ground_truth() {
        let (mut ctx, ids, _) = context_with(2);
        assert!(ctx.is_available(ids[0]).unwrap());
        ctx.set_available(ids[0], false).unwrap();
        assert!(!ctx.is_available(ids[0]).unwrap());
        assert!(!ctx.store().get(ids[0]).unwrap().is_available());
    }

    #[test]
    fn unknown_hit_at_depth_zero_is_not_found() {
        let (ctx, _, _) = context_with(1);
        assert!(ctx.is_available(HitId::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn untracked_hit_reads_unavailable_inside_hypothesis() {
        let (mut ctx, ids, mut layers) = context_with(2);
        layers.remove_hits([ids[1]].iter()).unwrap();
        ctx.create_initial_hypothesis("h0", &layers).unwrap();

        assert!(!ctx.is_available(ids[1]).unwrap());
        assert!(ctx.set_available(ids[1], true).unwrap_err().is_not_found());
        // Ground truth is untouched while the hypothesis is open.
        assert!(ctx.store().get(ids[1]).unwrap().is_available());
    }

    #[test]
    fn seeding_unknown_hit_is_not_found() {
        let (mut ctx, _, mut layers) = context_with(1);
        layers.add(HitId::new(), 0).unwrap();
        let err = ctx.create_initial_hypothesis("h0", &layers).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn remove_unavailable_keeps_order() {
        let (mut ctx, ids, _) = context_with(4);
        ctx.set_available(ids[1], false).unwrap();
        let mut list = vec![ids[3], ids[1], ids[0]];
        ctx.remove_unavailable(&mut list).unwrap();
        assert_eq!(list, vec![ids[3], ids[0]]);
    }

    #[test]
    fn with_hypothesis_abandons_on_error() {
        let (mut ctx, ids, layers) = context_with(2);
        let err = ctx
            .with_hypothesis("h0", &layers, |ctx| {
                ctx.set_available(ids[0], true)?;
                ctx.create_additional_hypothesis("h1")?;
                ctx.create_additional_hypothesis("h1")?;
                Ok("h1".to_string())
            })
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(ctx.depth(), 0);
        assert!(!ctx.is_registered("h0"));
        assert!(ctx.is_available(ids[1]).unwrap());
    }

    #[test]
    fn with_hypothesis_applies_chosen_sibling() {
        let (mut ctx, ids, layers) = context_with(2);
        let outcome = ctx
            .with_hypothesis("h0", &layers, |ctx| {
                ctx.create_additional_hypothesis("h1")?;
                ctx.set_available(ids[1], false)?;
                Ok("h1".to_string())
            })
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Committed { hits: 2 });
        assert!(ctx.is_available(ids[0]).unwrap());
        assert!(!ctx.is_available(ids[1]).unwrap());
    }

    #[test]
    fn with_hypothesis_unwinds_nested_levels() {
        let (mut ctx, ids, layers) = context_with(2);
        let mut inner = OrderedHitList::new();
        inner.add(ids[0], 0).unwrap();

        let err = ctx
            .with_hypothesis("outer", &layers, |ctx| {
                ctx.create_initial_hypothesis("inner", &inner)?;
                ctx.apply_hypothesis("missing")?;
                Ok("outer".to_string())
            })
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.summary().levels.len(), 0);
    }

    #[test]
    fn with_hypothesis_reports_scope_resolved_by_callback() {
        let (mut ctx, ids, layers) = context_with(2);
        let err = ctx
            .with_hypothesis("h0", &layers, |ctx| {
                ctx.apply_hypothesis("h0")?;
                Ok("h0".to_string())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CaloError::Hypothesis(HypothesisError::ScopeResolvedInCallback { ref name }) if name == "h0"
        ));
        // The commit made inside the callback stands.
        assert_eq!(ctx.depth(), 0);
        assert!(!ctx.is_available(ids[0]).unwrap());
        assert!(!ctx.store().get(ids[1]).unwrap().is_available());
    }

    #[test]
    fn with_hypothesis_abandoned_by_callback_keeps_outer_level() {
        let (mut ctx, ids, layers) = context_with(2);
        ctx.create_initial_hypothesis("outer", &layers).unwrap();
        ctx.set_available(ids[0], true).unwrap();

        let err = ctx
            .with_hypothesis("scope", &layers, |ctx| {
                ctx.abandon_hypothesis_level()?;
                Ok("scope".to_string())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CaloError::Hypothesis(HypothesisError::ScopeResolvedInCallback { .. })
        ));
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.current_hypothesis(), Some("outer"));
        assert!(ctx.is_available(ids[0]).unwrap());
    }

    #[test]
    fn with_hypothesis_rejects_levels_left_open() {
        let (mut ctx, ids, layers) = context_with(2);
        let mut inner = OrderedHitList::new();
        inner.add(ids[0], 0).unwrap();

        let err = ctx
            .with_hypothesis("outer", &layers, |ctx| {
                ctx.create_initial_hypothesis("inner", &inner)?;
                Ok("outer".to_string())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CaloError::Hypothesis(HypothesisError::ScopeLeftOpen { extra: 1, .. })
        ));
        assert!(err.is_not_allowed());
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.is_available(ids[0]).unwrap());
    }

    #[test]
    fn cluster_seeding_rejects_shared_hits() {
        let (mut ctx, ids, _) = context_with(1);
        let h = ctx.store().get(ids[0]).unwrap().clone();
        let mut c1 = Cluster::new(crate::cluster::ClusterId(1));
        c1.add_hit(&h).unwrap();
        let c2 = c1.clone();

        let err = ctx.create_initial_hypothesis_from_clusters("h0", &[c1, c2]).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(ctx.depth(), 0);
    }
}
