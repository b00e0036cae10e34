//! Caller identity as supplied by the external identity system.

use serde::{Deserialize, Serialize};

/// An authenticated caller.
///
/// The identity system owns who the caller is and what rank they hold; the
/// workflow only reads `permission_level` and snapshots the rest into audit
/// entries and request records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Actor {
    /// Stable user identifier.
    pub id: String,
    /// Display name at the time of the action.
    pub name: String,
    /// Integer rank used for authorization.
    pub permission_level: u32,
}

impl Actor {
    /// Create a new actor.
    pub fn new(id: impl Into<String>, name: impl Into<String>, permission_level: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permission_level,
        }
    }
}
