//! Permission policies
//!
//! A group carries a set of named capability flags; a user belongs to at
//! most one group. A capability that a policy does not mention is
//! **permitted**: policies list what a group may *not* see. A user with no
//! group can see everything.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::views::ResourceKind;

// == Capability ==
/// A named permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewMessages,
    ViewMessageFrom,
    ViewMessageTo,
    ViewMessageBody,
    ViewMessagePrice,
    ViewNumMedia,
    ViewMedia,
    ViewCalls,
    ViewCallFrom,
    ViewCallTo,
    ViewCallPrice,
    ViewCallRecordings,
    PlayCallRecordings,
    ViewAlerts,
}

impl Capability {
    /// Capability required to list or fetch a resource kind at all.
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Messages => Capability::ViewMessages,
            ResourceKind::Calls => Capability::ViewCalls,
            ResourceKind::Alerts => Capability::ViewAlerts,
            ResourceKind::Recordings => Capability::ViewCallRecordings,
        }
    }
}

// == Capabilities ==
/// A capability set. Unset flags default to allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<Capability, bool>);

impl Capabilities {
    /// A set that allows everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Sets one flag, builder style.
    pub fn with(mut self, capability: Capability, allowed: bool) -> Self {
        self.0.insert(capability, allowed);
        self
    }

    /// Whether `capability` is allowed. Unset means allowed.
    pub fn allows(&self, capability: Capability) -> bool {
        self.0.get(&capability).copied().unwrap_or(true)
    }
}

// == Group ==
/// A named policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub capabilities: Capabilities,
}

// == User ==
/// A user as resolved by [`PolicyStore`]: the group's capabilities are
/// attached so request handling needs no further lookups.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    name: String,
    group: Option<String>,
    capabilities: Arc<Capabilities>,
}

impl User {
    /// Creates a user with an explicit capability set, outside any store.
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            group: None,
            capabilities: Arc::new(capabilities),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Shorthand for `self.capabilities().allows(capability)`.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.allows(capability)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Declared membership, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSpec {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("user {user} references unknown group {group}")]
    UnknownGroup { user: String, group: String },

    #[error("duplicate {0}")]
    Duplicate(String),
}

// == Policy Store ==
/// Read-only user and group tables, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    users: HashMap<String, User>,
    groups: HashMap<String, Arc<Capabilities>>,
}

impl PolicyStore {
    /// Builds the tables, rejecting users that reference missing groups.
    pub fn new(groups: Vec<Group>, users: Vec<UserSpec>) -> Result<Self, PolicyError> {
        let mut group_table = HashMap::new();
        for group in groups {
            if group_table.contains_key(&group.name) {
                return Err(PolicyError::Duplicate(format!("group {}", group.name)));
            }
            group_table.insert(group.name, Arc::new(group.capabilities));
        }

        let mut user_table = HashMap::new();
        for spec in users {
            if user_table.contains_key(&spec.name) {
                return Err(PolicyError::Duplicate(format!("user {}", spec.name)));
            }
            let capabilities = match &spec.group {
                Some(group) => group_table.get(group).cloned().ok_or_else(|| {
                    PolicyError::UnknownGroup {
                        user: spec.name.clone(),
                        group: group.clone(),
                    }
                })?,
                None => Arc::new(Capabilities::allow_all()),
            };
            user_table.insert(
                spec.name.clone(),
                User {
                    name: spec.name,
                    group: spec.group,
                    capabilities,
                },
            );
        }

        Ok(Self {
            users: user_table,
            groups: group_table,
        })
    }

    /// Looks up a user by name.
    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    /// Capability set that applies to `user`.
    pub fn capabilities_for<'a>(&self, user: &'a User) -> &'a Capabilities {
        user.capabilities()
    }

    /// Capability set of a group by name.
    pub fn group(&self, name: &str) -> Option<&Capabilities> {
        self.groups.get(name).map(|caps| caps.as_ref())
    }
}
