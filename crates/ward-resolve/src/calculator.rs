//! The flag-value calculator.
//!
//! Resolution walks the snapshot's regions in descending priority tiers.
//! Within a tier every region contributes its *effective* value, the
//! explicit value found on the region or inherited from an ancestor, after
//! the group-scope check. The first tier that produces any value answers
//! the query; state flags combine deny-over-allow within the tier. The
//! global region sits in a sentinel tier below every normal region, so it
//! is only consulted when nothing else answered.
//!
//! Build permission is not an ordinary flag: ownership grants an implicit
//! allow/deny that coexists with the explicit `build` flag, and the global
//! region's explicit allow is deliberately inert.

use std::sync::{Arc, LazyLock};

use hashbrown::HashSet;
use ward_region::{
    Actor, Association, BUILD, FlagDef, FlagKind, FlagValue, PASSTHROUGH, Region, RegionId, State,
};

use crate::set::ApplicableRegionSet;

static BUILD_DEF: LazyLock<FlagDef> = LazyLock::new(|| FlagDef::state(BUILD));
static PASSTHROUGH_DEF: LazyLock<FlagDef> = LazyLock::new(|| FlagDef::state(PASSTHROUGH));

/// Terminal state of membership resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipResult {
    /// A tier constrained the point and the actor belongs to every region
    /// in it.
    Success,
    /// A tier constrained the point and the actor is an outsider to at
    /// least one region in it.
    Fail,
    /// No region constrains the point (empty set, or everything was
    /// passthrough-transparent).
    NoRegions,
}

pub(crate) struct FlagValueCalculator<'a> {
    set: &'a ApplicableRegionSet,
}

impl<'a> FlagValueCalculator<'a> {
    pub fn new(set: &'a ApplicableRegionSet) -> Self {
        Self { set }
    }

    /// Matched regions followed by the global region; the sentinel priority
    /// keeps the global region in the last tier.
    fn iter(&self) -> impl Iterator<Item = &Arc<Region>> {
        self.set.iter().chain(self.set.global())
    }

    pub fn query_value(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> Option<FlagValue> {
        // Build blends membership with the explicit flag; everything else
        // is the plain tier walk.
        if def.id().as_str() == BUILD {
            return self.query_build(actor).map(FlagValue::State);
        }
        let values = self.query_all_values(actor, def);
        if def.kind() == FlagKind::State {
            values
                .iter()
                .map(FlagValue::as_state)
                .fold(None, State::combine)
                .map(FlagValue::State)
        } else {
            values.into_iter().next()
        }
    }

    pub fn query_all_values(&self, actor: Option<&dyn Actor>, def: &FlagDef) -> Vec<FlagValue> {
        self.collect_values(actor, def, None)
    }

    /// Effective values from the highest tier that produced any, stopping
    /// before tiers below `floor`.
    fn collect_values(
        &self,
        actor: Option<&dyn Actor>,
        def: &FlagDef,
        floor: Option<i64>,
    ) -> Vec<FlagValue> {
        let mut min_priority: Option<i64> = None;
        let mut ignored: HashSet<RegionId> = HashSet::new();
        let mut values = Vec::new();

        for region in self.iter() {
            let priority = effective_priority(region);
            if floor.is_some_and(|f| priority < f) {
                break;
            }
            if min_priority.is_some_and(|m| priority < m) {
                break;
            }
            // A region whose ancestor already contributed resolves to the
            // same inherited value; counting it again would double-weight
            // one family.
            if ignored.contains(region.id()) {
                continue;
            }
            if let Some(value) = self.effective_flag(region, def, actor) {
                min_priority = Some(priority);
                values.push(value);
            }
            self.add_ancestors(&mut ignored, region);
        }
        values
    }

    /// Effective value of a flag on one region: the region's own value or
    /// the nearest ancestor's, after group scoping. `None` means unset.
    pub fn effective_flag(
        &self,
        region: &Arc<Region>,
        def: &FlagDef,
        actor: Option<&dyn Actor>,
    ) -> Option<FlagValue> {
        if region.is_global() {
            if def.id().as_str() == PASSTHROUGH {
                // The global region is transparent unless it has ownership
                // or passthrough is explicitly denied.
                if region.has_members_or_owners()
                    || region.flag(def.id()).and_then(FlagValue::as_state) == Some(State::Deny)
                {
                    return None;
                }
                return Some(FlagValue::State(State::Allow));
            }
            if def.id().as_str() == BUILD {
                // Explicit allow on the global region must not widen access
                // beyond what ownership grants; only deny is absolute.
                return region
                    .flag(def.id())
                    .cloned()
                    .filter(|v| v.as_state() != Some(State::Allow));
            }
        }

        let association = self.chain_association(region, actor);
        let mut current = Some(Arc::clone(region));
        while let Some(r) = current {
            if let Some(value) = r.flag(def.id()) {
                if r.flag_group(def).contains(association) {
                    return Some(value.clone());
                }
                // Scope-rejected counts as unset here; keep walking up.
            }
            current = r.parent().and_then(|id| self.set.get(id)).cloned();
        }
        None
    }

    /// Membership resolution: the highest tier with a non-transparent
    /// region decides, and the actor must belong to every region in it.
    /// Also reports the deciding tier's priority so the build rule can
    /// bound its explicit-flag walk.
    pub fn membership(&self, actor: Option<&dyn Actor>) -> (MembershipResult, Option<i64>) {
        let mut min_priority: Option<i64> = None;
        let mut ignored: HashSet<RegionId> = HashSet::new();
        let mut result = MembershipResult::NoRegions;

        for region in self.iter() {
            let priority = effective_priority(region);
            if min_priority.is_some_and(|m| priority < m) {
                break;
            }
            // Passthrough regions are transparent for the membership test;
            // their explicit build flag still counts in the flag walk.
            let passthrough = self
                .effective_flag(region, &PASSTHROUGH_DEF, actor)
                .and_then(|v| v.as_state());
            if passthrough == Some(State::Allow) {
                continue;
            }
            if ignored.contains(region.id()) {
                continue;
            }
            min_priority = Some(priority);
            if self.chain_association(region, actor) == Association::NonMember {
                result = MembershipResult::Fail;
            } else if result == MembershipResult::NoRegions {
                result = MembershipResult::Success;
            }
            self.add_ancestors(&mut ignored, region);
        }
        (result, min_priority)
    }

    /// The build decision table over membership and the explicit flag.
    ///
    /// The explicit walk is bounded to the membership-deciding tier and
    /// above: a region with members implicitly sets build at its own tier,
    /// so explicit values below it never apply.
    pub fn query_build(&self, actor: Option<&dyn Actor>) -> Option<State> {
        let (membership, deciding_tier) = self.membership(actor);
        let explicit = self
            .collect_values(actor, &BUILD_DEF, deciding_tier)
            .iter()
            .map(FlagValue::as_state)
            .fold(None, State::combine);

        match (explicit, membership) {
            (Some(State::Deny), _) => Some(State::Deny),
            (Some(State::Allow), _) => Some(State::Allow),
            (None, MembershipResult::Success) => Some(State::Allow),
            (None, MembershipResult::Fail) => Some(State::Deny),
            (None, MembershipResult::NoRegions) => None,
        }
    }

    /// Actor's strongest association over a region and its ancestors.
    /// Owning or belonging anywhere in the chain counts for the whole
    /// chain.
    fn chain_association(&self, region: &Arc<Region>, actor: Option<&dyn Actor>) -> Association {
        let Some(actor) = actor else {
            return Association::NonMember;
        };
        let mut strongest = Association::NonMember;
        let mut current = Some(Arc::clone(region));
        while let Some(r) = current {
            match r.association(Some(actor)) {
                Association::Owner => return Association::Owner,
                Association::Member => strongest = Association::Member,
                Association::NonMember => {}
            }
            current = r.parent().and_then(|id| self.set.get(id)).cloned();
        }
        strongest
    }

    fn add_ancestors(&self, ignored: &mut HashSet<RegionId>, region: &Arc<Region>) {
        let mut parent = region.parent().cloned();
        while let Some(id) = parent {
            if !ignored.insert(id.clone()) {
                break;
            }
            parent = self
                .set
                .get(&id)
                .and_then(|r| r.parent().cloned());
        }
    }
}

fn effective_priority(region: &Region) -> i64 {
    if region.is_global() {
        // Sentinel below every normal region, including i32::MIN.
        i64::MIN
    } else {
        i64::from(region.priority())
    }
}
