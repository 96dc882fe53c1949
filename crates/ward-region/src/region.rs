//! The region entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, Association, Domain};
use crate::flag::{FlagDef, FlagId, FlagValue, RegionGroup};
use crate::id::RegionId;
use crate::shape::RegionShape;

/// A named shaped area with priority, ownership, and flags.
///
/// A region is a plain value: mutating it changes nothing anywhere else.
/// Publishing a mutation (and validating parent links) is the index's
/// job; the parent is stored as an id, never a reference, so the entity
/// itself cannot form ownership cycles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    id: RegionId,
    shape: RegionShape,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    parent: Option<RegionId>,
    #[serde(default)]
    owners: Domain,
    #[serde(default)]
    members: Domain,
    #[serde(default)]
    flags: BTreeMap<FlagId, FlagValue>,
    #[serde(default)]
    flag_groups: BTreeMap<FlagId, RegionGroup>,
    /// Transient regions are never persisted.
    #[serde(skip)]
    transient: bool,
}

impl Region {
    #[must_use]
    pub fn new(id: RegionId, shape: RegionShape) -> Self {
        Self {
            id,
            shape,
            priority: 0,
            parent: None,
            owners: Domain::new(),
            members: Domain::new(),
            flags: BTreeMap::new(),
            flag_groups: BTreeMap::new(),
            transient: false,
        }
    }

    /// The world-covering global region, initially empty of flags and
    /// ownership.
    #[must_use]
    pub fn global() -> Self {
        Self::new(RegionId::global(), RegionShape::Global)
    }

    #[must_use]
    pub fn id(&self) -> &RegionId {
        &self.id
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.id.is_global()
    }

    #[must_use]
    pub fn shape(&self) -> &RegionShape {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: RegionShape) {
        self.shape = shape;
    }

    /// Stored priority. The global region's *effective* priority is a
    /// sentinel below every normal region; that adjustment belongs to the
    /// resolution engine, not the entity.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    #[must_use]
    pub fn parent(&self) -> Option<&RegionId> {
        self.parent.as_ref()
    }

    /// Set the parent link without any cycle or existence validation.
    ///
    /// `RegionIndex::set_parent` is the validated entry point; this exists
    /// so the index (and loaders building an already-validated graph) can
    /// write the field.
    pub fn set_parent_unchecked(&mut self, parent: Option<RegionId>) {
        self.parent = parent;
    }

    #[must_use]
    pub fn owners(&self) -> &Domain {
        &self.owners
    }

    #[must_use]
    pub fn owners_mut(&mut self) -> &mut Domain {
        &mut self.owners
    }

    #[must_use]
    pub fn members(&self) -> &Domain {
        &self.members
    }

    #[must_use]
    pub fn members_mut(&mut self) -> &mut Domain {
        &mut self.members
    }

    /// Strongest association of an actor with this region. `None` (an
    /// environmental cause) is always a non-member.
    #[must_use]
    pub fn association(&self, actor: Option<&dyn Actor>) -> Association {
        let Some(actor) = actor else {
            return Association::NonMember;
        };
        if self.owners.contains(actor) {
            Association::Owner
        } else if self.members.contains(actor) {
            Association::Member
        } else {
            Association::NonMember
        }
    }

    #[must_use]
    pub fn is_member_or_owner(&self, actor: Option<&dyn Actor>) -> bool {
        self.association(actor) != Association::NonMember
    }

    #[must_use]
    pub fn has_members_or_owners(&self) -> bool {
        !self.owners.is_empty() || !self.members.is_empty()
    }

    /// Explicitly set value of a flag; `None` when unset.
    #[must_use]
    pub fn flag(&self, id: &FlagId) -> Option<&FlagValue> {
        self.flags.get(id)
    }

    /// Set or unset a flag value. Unsetting also drops any group override
    /// for the flag.
    pub fn set_flag(&mut self, id: FlagId, value: Option<FlagValue>) {
        match value {
            Some(value) => {
                self.flags.insert(id, value);
            }
            None => {
                self.flags.remove(&id);
                self.flag_groups.remove(&id);
            }
        }
    }

    /// Group scope for a flag on this region: the per-region override if one
    /// is set, otherwise the definition's default group.
    #[must_use]
    pub fn flag_group(&self, def: &FlagDef) -> RegionGroup {
        self.flag_groups
            .get(def.id())
            .copied()
            .unwrap_or_else(|| def.default_group())
    }

    /// Override (or clear) the group scope of a flag on this region.
    pub fn set_flag_group(&mut self, id: FlagId, group: Option<RegionGroup>) {
        match group {
            Some(group) => {
                self.flag_groups.insert(id, group);
            }
            None => {
                self.flag_groups.remove(&id);
            }
        }
    }

    pub fn flags(&self) -> impl Iterator<Item = (&FlagId, &FlagValue)> {
        self.flags.iter()
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Mark this region as excluded from persistence.
    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::TestActor;
    use crate::flag::{FlagKind, State};
    use crate::pos::BlockPos;

    fn region(name: &str) -> Region {
        Region::new(
            RegionId::new(name).unwrap(),
            RegionShape::cuboid(BlockPos::new(0, 0, 0), BlockPos::new(16, 16, 16)),
        )
    }

    #[test]
    fn test_association_levels() {
        let owner = TestActor::new();
        let member = TestActor::new();
        let stranger = TestActor::new();

        let mut r = region("plot");
        r.owners_mut().add_player(owner.id);
        r.members_mut().add_player(member.id);

        assert_eq!(r.association(Some(&owner)), Association::Owner);
        assert_eq!(r.association(Some(&member)), Association::Member);
        assert_eq!(r.association(Some(&stranger)), Association::NonMember);
        assert_eq!(r.association(None), Association::NonMember);

        assert!(r.is_member_or_owner(Some(&owner)));
        assert!(!r.is_member_or_owner(None));
    }

    #[test]
    fn test_flag_set_unset() {
        let mut r = region("plot");
        let pvp = FlagId::new("pvp");

        assert!(r.flag(&pvp).is_none());
        r.set_flag(pvp.clone(), Some(FlagValue::State(State::Deny)));
        assert_eq!(r.flag(&pvp), Some(&FlagValue::State(State::Deny)));

        r.set_flag_group(pvp.clone(), Some(RegionGroup::Members));
        r.set_flag(pvp.clone(), None);
        assert!(r.flag(&pvp).is_none());
        // Group override goes away with the value.
        let def = FlagDef::state("pvp");
        assert_eq!(r.flag_group(&def), RegionGroup::All);
    }

    #[test]
    fn test_flag_group_default_and_override() {
        let mut r = region("plot");
        let def = FlagDef::new("entry", FlagKind::State).with_default_group(RegionGroup::NonMembers);

        assert_eq!(r.flag_group(&def), RegionGroup::NonMembers);
        r.set_flag_group(def.id().clone(), Some(RegionGroup::All));
        assert_eq!(r.flag_group(&def), RegionGroup::All);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut r = region("plot");
        r.set_priority(5);
        r.set_flag(FlagId::new("pvp"), Some(FlagValue::State(State::Deny)));
        r.set_parent_unchecked(Some(RegionId::new("town").unwrap()));

        let json = serde_json::to_string(&r).unwrap();
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), r.id());
        assert_eq!(back.priority(), 5);
        assert_eq!(back.parent(), r.parent());
        assert_eq!(back.flag(&FlagId::new("pvp")), Some(&FlagValue::State(State::Deny)));
    }
}
