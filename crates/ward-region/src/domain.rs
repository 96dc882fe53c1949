//! Ownership domains and actor identity.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity collaborator: an opaque actor that can be tested against a
/// domain. The engine never needs more than a stable id and a
/// group-membership predicate.
pub trait Actor {
    /// Stable unique id of this actor.
    fn unique_id(&self) -> Uuid;

    /// Whether this actor belongs to a named permission group.
    fn in_group(&self, group: &str) -> bool;
}

/// How strongly an actor is associated with a region.
///
/// `Owner` implies `Member` wherever membership is tested; the ordering is
/// strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Association {
    Owner,
    Member,
    NonMember,
}

/// A set of player ids and group names.
///
/// Players and groups are independent: a domain contains an actor if the
/// actor's id is listed or the actor belongs to any listed group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    players: HashSet<Uuid>,
    #[serde(default)]
    groups: HashSet<String>,
}

impl Domain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, id: Uuid) -> bool {
        self.players.insert(id)
    }

    pub fn remove_player(&mut self, id: Uuid) -> bool {
        self.players.remove(&id)
    }

    /// Group names are matched case-insensitively; they are normalized on
    /// insert.
    pub fn add_group(&mut self, group: &str) -> bool {
        self.groups.insert(group.to_ascii_lowercase())
    }

    pub fn remove_group(&mut self, group: &str) -> bool {
        self.groups.remove(&group.to_ascii_lowercase())
    }

    #[must_use]
    pub fn contains(&self, actor: &dyn Actor) -> bool {
        self.players.contains(&actor.unique_id())
            || self.groups.iter().any(|g| actor.in_group(g))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.groups.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len() + self.groups.len()
    }

    pub fn players(&self) -> impl Iterator<Item = &Uuid> {
        self.players.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}
