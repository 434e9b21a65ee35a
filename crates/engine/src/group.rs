//! Group registry entries
//!
//! A group is a named container of member URIs with its own metadata
//! namespace. Members point at arrays or other groups; the engine does
//! not dereference them.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tessera_core::{Error, MetadataValue, Result};

/// One member of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Member URI, absolute or relative to the group URI
    pub uri: String,
    /// Optional logical name, unique within the group when present
    pub name: Option<String>,
    /// True when `uri` is relative to the group URI
    pub relative: bool,
}

/// One created group known to the engine
pub struct GroupEntry {
    /// Group URI
    pub uri: String,
    /// Members in insertion order
    pub members: RwLock<Vec<GroupMember>>,
    /// Metadata namespace
    pub metadata: RwLock<BTreeMap<String, MetadataValue>>,
}

impl GroupEntry {
    /// Fresh empty group
    pub fn new(uri: String) -> GroupEntry {
        GroupEntry {
            uri,
            members: RwLock::new(Vec::new()),
            metadata: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add a member; a duplicate URI or logical name is rejected
    pub fn add_member(&self, member: GroupMember) -> Result<()> {
        let mut members = self.members.write();
        if members.iter().any(|m| m.uri == member.uri) {
            return Err(Error::Engine(format!(
                "group '{}' already holds member '{}'",
                self.uri, member.uri
            )));
        }
        if let Some(name) = &member.name {
            if members.iter().any(|m| m.name.as_deref() == Some(name)) {
                return Err(Error::Engine(format!(
                    "group '{}' already holds a member named '{name}'",
                    self.uri
                )));
            }
        }
        members.push(member);
        Ok(())
    }

    /// Remove a member by URI or logical name
    pub fn remove_member(&self, name_or_uri: &str) -> Result<()> {
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|m| m.uri != name_or_uri && m.name.as_deref() != Some(name_or_uri));
        if members.len() == before {
            return Err(Error::NotFound(format!(
                "group '{}' has no member '{name_or_uri}'",
                self.uri
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(uri: &str, name: Option<&str>) -> GroupMember {
        GroupMember {
            uri: uri.into(),
            name: name.map(String::from),
            relative: false,
        }
    }

    #[test]
    fn test_add_remove_member() {
        let g = GroupEntry::new("mem://g".into());
        g.add_member(member("mem://a1", Some("first"))).unwrap();
        g.add_member(member("mem://a2", None)).unwrap();
        assert_eq!(g.members.read().len(), 2);

        g.remove_member("first").unwrap();
        assert_eq!(g.members.read().len(), 1);
        assert!(matches!(
            g.remove_member("nope").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let g = GroupEntry::new("mem://g".into());
        g.add_member(member("mem://a1", None)).unwrap();
        assert!(g.add_member(member("mem://a1", None)).is_err());

        g.add_member(member("mem://a2", Some("n"))).unwrap();
        assert!(g.add_member(member("mem://a3", Some("n"))).is_err());
    }
}
