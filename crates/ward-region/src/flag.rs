//! Typed policy flags and the flag registry.
//!
//! A flag *definition* ([`FlagDef`]) describes a flag's value kind, its
//! static default, and the actor group the value applies to by default.
//! Regions store flag *values* ([`FlagValue`]) keyed by [`FlagId`]; absence
//! of a value means "unset", which is distinct from the definition default;
//! defaults are applied by callers only after resolution returns unset.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::Association;
use crate::error::{RegionError, RegionResult};

/// Allow/deny outcome of a state flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Allow,
    Deny,
}

impl State {
    /// Combine two optional states; deny wins over allow.
    #[must_use]
    pub fn combine(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(Self::Deny), _) | (_, Some(Self::Deny)) => Some(Self::Deny),
            (Some(Self::Allow), _) | (_, Some(Self::Allow)) => Some(Self::Allow),
            (None, None) => None,
        }
    }
}

/// The actor class a flag value applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGroup {
    #[default]
    All,
    Members,
    Owners,
    NonMembers,
    NonOwners,
}

impl RegionGroup {
    /// Whether an actor with the given association falls in this group.
    ///
    /// Membership is strictly ordered: owners count as members, and a `None`
    /// actor (environmental cause) resolves to [`Association::NonMember`]
    /// before this is called.
    #[must_use]
    pub fn contains(self, association: Association) -> bool {
        match self {
            Self::All => true,
            Self::Owners => association == Association::Owner,
            Self::Members => matches!(association, Association::Owner | Association::Member),
            Self::NonOwners => association != Association::Owner,
            Self::NonMembers => association == Association::NonMember,
        }
    }
}

/// The value kind of a flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    State,
    Bool,
    Int,
    Float,
    Str,
    StrSet,
    Location,
}

/// A typed flag value as stored on a region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagValue {
    State(State),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrSet(BTreeSet<String>),
    Location {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
    },
}

impl FlagValue {
    #[must_use]
    pub fn kind(&self) -> FlagKind {
        match self {
            Self::State(_) => FlagKind::State,
            Self::Bool(_) => FlagKind::Bool,
            Self::Int(_) => FlagKind::Int,
            Self::Float(_) => FlagKind::Float,
            Self::Str(_) => FlagKind::Str,
            Self::StrSet(_) => FlagKind::StrSet,
            Self::Location { .. } => FlagKind::Location,
        }
    }

    /// The state inside a `State` value, `None` for other kinds.
    #[must_use]
    pub fn as_state(&self) -> Option<State> {
        match self {
            Self::State(state) => Some(*state),
            _ => None,
        }
    }
}

/// Identifier of a flag definition, e.g. `build` or `greeting`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(String);

impl FlagId {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flag definition: the descriptor handed to the resolution engine.
#[derive(Clone, Debug)]
pub struct FlagDef {
    id: FlagId,
    kind: FlagKind,
    default: Option<FlagValue>,
    default_group: RegionGroup,
}

impl FlagDef {
    #[must_use]
    pub fn new(name: &str, kind: FlagKind) -> Self {
        Self {
            id: FlagId::new(name),
            kind,
            default: None,
            default_group: RegionGroup::All,
        }
    }

    /// State-kind definition shorthand.
    #[must_use]
    pub fn state(name: &str) -> Self {
        Self::new(name, FlagKind::State)
    }

    #[must_use]
    pub fn with_default(mut self, default: FlagValue) -> Self {
        debug_assert_eq!(default.kind(), self.kind);
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_default_group(mut self, group: RegionGroup) -> Self {
        self.default_group = group;
        self
    }

    #[must_use]
    pub fn id(&self) -> &FlagId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    /// Static default, applied by callers only after resolution returns
    /// unset.
    #[must_use]
    pub fn default_value(&self) -> Option<&FlagValue> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn default_group(&self) -> RegionGroup {
        self.default_group
    }

    /// Validate that a value matches this definition's kind.
    pub fn check(&self, value: &FlagValue) -> RegionResult<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(RegionError::WrongFlagType {
                flag: self.id.clone(),
                expected: self.kind,
                got: value.kind(),
            })
        }
    }
}

/// Registry of flag definitions.
///
/// An explicit object, not ambient state: loaders and managers are handed a
/// registry at construction. Registration happens during startup and the
/// registry is then sealed; registering afterwards is a structural error.
pub struct FlagRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    defs: HashMap<FlagId, Arc<FlagDef>>,
    sealed: bool,
}

impl FlagRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                defs: HashMap::new(),
                sealed: false,
            }),
        }
    }

    /// Registry pre-loaded with the builtin flag set.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for def in builtin_flags() {
            // Builtin ids are distinct and the registry is fresh.
            let _ = registry.register(def);
        }
        registry
    }

    /// Register a flag definition. Fails after [`seal`](Self::seal) or on a
    /// duplicate id.
    pub fn register(&self, def: FlagDef) -> RegionResult<()> {
        let mut inner = self.inner.write();
        if inner.sealed {
            return Err(RegionError::RegistrySealed);
        }
        let id = def.id().clone();
        if inner.defs.contains_key(&id) {
            return Err(RegionError::DuplicateFlag(id));
        }
        inner.defs.insert(id, Arc::new(def));
        Ok(())
    }

    /// Stop accepting registrations.
    pub fn seal(&self) {
        self.inner.write().sealed = true;
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.read().sealed
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FlagDef>> {
        self.inner.read().defs.get(&FlagId::new(name)).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().defs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().defs.is_empty()
    }
}

impl Default for FlagRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Names of the two flags the resolution engine treats specially.
pub const BUILD: &str = "build";
pub const PASSTHROUGH: &str = "passthrough";

fn builtin_flags() -> Vec<FlagDef> {
    vec![
        FlagDef::state(BUILD),
        FlagDef::state(PASSTHROUGH),
        FlagDef::state("pvp").with_default(FlagValue::State(State::Allow)),
        FlagDef::state("use").with_default_group(RegionGroup::NonMembers),
        FlagDef::state("chest-access").with_default_group(RegionGroup::NonMembers),
        FlagDef::state("entry")
            .with_default(FlagValue::State(State::Allow))
            .with_default_group(RegionGroup::NonMembers),
        FlagDef::state("exit")
            .with_default(FlagValue::State(State::Allow))
            .with_default_group(RegionGroup::NonMembers),
        FlagDef::new("greeting", FlagKind::Str),
        FlagDef::new("farewell", FlagKind::Str),
        FlagDef::new("deny-message", FlagKind::Str).with_default(FlagValue::Str(
            "You don't have permission here.".to_string(),
        )),
        FlagDef::new("blocked-cmds", FlagKind::StrSet),
        FlagDef::new("allowed-cmds", FlagKind::StrSet),
        FlagDef::new("teleport", FlagKind::Location),
    ]
}
