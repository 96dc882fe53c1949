//! The applicable-region snapshot.

use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use ward_region::{Actor, FlagDef, FlagValue, Region, RegionId, State};

use crate::calculator::{FlagValueCalculator, MembershipResult};

/// Immutable snapshot of the regions relevant to one query.
///
/// Holds the regions whose shape matched the query, sorted by priority
/// descending (ties broken by id for determinism), plus an id table covering
/// all of their ancestors so inheritance walks can chase parent links, plus
/// the global region when the world has one. Queries against the set are
/// pure and repeatable.
#[derive(Clone, Debug)]
pub struct ApplicableRegionSet {
    regions: Vec<Arc<Region>>,
    by_id: HashMap<RegionId, Arc<Region>>,
    global: Option<Arc<Region>>,
}

impl ApplicableRegionSet {
    /// Build a snapshot from matched candidate regions.
    ///
    /// `lookup` resolves parent ids against the index the candidates came
    /// from; ancestors are pulled into the snapshot transitively. The parent
    /// graph is validated acyclic at mutation time, so the walk is bounded.
    pub fn new<F>(
        mut candidates: Vec<Arc<Region>>,
        global: Option<Arc<Region>>,
        mut lookup: F,
    ) -> Self
    where
        F: FnMut(&RegionId) -> Option<Arc<Region>>,
    {
        candidates.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id().cmp(b.id()))
        });

        let mut by_id: HashMap<RegionId, Arc<Region>> =
            HashMap::with_capacity(candidates.len() + 1);
        // Inheritance chains are shallow in practice.
        let mut pending: SmallVec<[RegionId; 8]> = SmallVec::new();
        for region in &candidates {
            by_id.insert(region.id().clone(), Arc::clone(region));
            if let Some(parent) = region.parent() {
                pending.push(parent.clone());
            }
        }
        while let Some(id) = pending.pop() {
            if by_id.contains_key(&id) {
                continue;
            }
            if let Some(region) = lookup(&id) {
                if let Some(parent) = region.parent() {
                    pending.push(parent.clone());
                }
                by_id.insert(id, region);
            }
        }
        if let Some(global) = &global {
            by_id.insert(global.id().clone(), Arc::clone(global));
        }

        Self {
            regions: candidates,
            by_id,
            global,
        }
    }

    /// Empty snapshot, optionally carrying the global region.
    #[must_use]
    pub fn empty(global: Option<Arc<Region>>) -> Self {
        Self::new(Vec::new(), global, |_| None)
    }

    /// The matched regions, highest priority first. Ancestors that did not
    /// themselves match are not iterated; they participate through
    /// inheritance only.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Region>> {
        self.regions.iter()
    }

    /// Number of matched regions (the global region not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    #[must_use]
    pub fn global(&self) -> Option<&Arc<Region>> {
        self.global.as_ref()
    }

    /// Any region in the snapshot (matched, ancestor, or global) by id.
    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<&Arc<Region>> {
        self.by_id.get(id)
    }

    /// Resolve a flag to a single value; `None` means unset. Callers apply
    /// the definition's static default after this, never earlier.
    #[must_use]
    pub fn query_value(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> Option<FlagValue> {
        FlagValueCalculator::new(self).query_value(actor, def)
    }

    /// All values from the first priority tier that produced any, as a
    /// multiset. Not a union across tiers.
    #[must_use]
    pub fn query_all_values(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> Vec<FlagValue> {
        FlagValueCalculator::new(self).query_all_values(actor, def)
    }

    /// [`query_value`](Self::query_value) narrowed to state flags.
    #[must_use]
    pub fn query_state(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> Option<State> {
        self.query_value(actor, def).and_then(|v| v.as_state())
    }

    /// Resolve a state flag to a boolean, falling back to the definition's
    /// static default when unset.
    #[must_use]
    pub fn test_state(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> bool {
        match self.query_state(actor, def) {
            Some(state) => state == State::Allow,
            None => def
                .default_value()
                .and_then(FlagValue::as_state)
                .is_some_and(|s| s == State::Allow),
        }
    }

    /// Membership resolution for the build rule.
    #[must_use]
    pub fn membership(&self, actor: Option<&dyn Actor>) -> MembershipResult {
        FlagValueCalculator::new(self).membership(actor).0
    }

    /// The build permission blend of membership and the explicit `build`
    /// flag; `None` means no region constrains the point.
    #[must_use]
    pub fn query_build(&self, actor: Option<&dyn Actor>) -> Option<State> {
        FlagValueCalculator::new(self).query_build(actor)
    }

    /// Whether the actor may build here. Unconstrained points default to
    /// allow.
    #[must_use]
    pub fn test_build(&self, actor: Option<&dyn Actor>) -> bool {
        self.query_build(actor) != Some(State::Deny)
    }
}
