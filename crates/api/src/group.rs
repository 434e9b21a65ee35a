//! Groups
//!
//! A group is a named container of member URIs with its own metadata
//! namespace, following the same open-mode discipline as arrays:
//! membership and metadata mutate through a Write handle and read
//! through a Read handle.

use tessera_core::{Error, MetadataValue, Mode, Result};
use tessera_engine::GroupMember;

use crate::context::Context;

/// A group handle, opened in a mode or closed
pub struct Group {
    context: Context,
    uri: String,
    mode: Option<Mode>,
}

impl Group {
    /// Create an empty group at `uri`
    pub fn create(context: &Context, uri: &str) -> Result<()> {
        context.engine().create_group(uri)
    }

    /// True when a group exists at `uri`
    pub fn exists(context: &Context, uri: &str) -> bool {
        context.engine().group_exists(uri)
    }

    /// Remove the group at `uri`
    pub fn delete(context: &Context, uri: &str) -> Result<()> {
        context.engine().delete_group(uri)
    }

    /// Open the group at `uri`
    ///
    /// Groups open in Read or Write mode only.
    pub fn open(context: &Context, uri: &str, mode: Mode) -> Result<Group> {
        if !matches!(mode, Mode::Read | Mode::Write) {
            return Err(Error::InvalidParameter(format!(
                "groups open in READ or WRITE mode, not {mode}"
            )));
        }
        if !context.engine().group_exists(uri) {
            return Err(Error::NotFound(format!("group '{uri}' does not exist")));
        }
        Ok(Group {
            context: context.clone(),
            uri: uri.to_string(),
            mode: Some(mode),
        })
    }

    /// Close the handle
    pub fn close(&mut self) -> Result<()> {
        self.mode
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::NotOpen(format!("group '{}' is already closed", self.uri)))
    }

    /// Group URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True while the handle is open
    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    fn require_mode(&self, operation: &str, want: Mode) -> Result<()> {
        let mode = self
            .mode
            .ok_or_else(|| Error::NotOpen(format!("group '{}' is not open", self.uri)))?;
        if mode != want {
            return Err(Error::NotOpen(format!(
                "group '{}' is open in {mode} mode, {operation} requires {want}",
                self.uri
            )));
        }
        Ok(())
    }

    /// Add a member by URI, with an optional logical name
    pub fn add_member(&self, uri: &str, relative: bool, name: Option<&str>) -> Result<()> {
        self.require_mode("member addition", Mode::Write)?;
        self.context.engine().group_add_member(
            &self.uri,
            GroupMember {
                uri: uri.to_string(),
                name: name.map(String::from),
                relative,
            },
        )
    }

    /// Remove a member by URI or logical name
    pub fn remove_member(&self, name_or_uri: &str) -> Result<()> {
        self.require_mode("member removal", Mode::Write)?;
        self.context.engine().group_remove_member(&self.uri, name_or_uri)
    }

    /// Number of members
    pub fn member_num(&self) -> Result<u64> {
        self.require_mode("member listing", Mode::Read)?;
        Ok(self.context.engine().group_members(&self.uri)?.len() as u64)
    }

    /// Member at `index`: its URI and optional logical name
    pub fn member(&self, index: u64) -> Result<(String, Option<String>)> {
        self.require_mode("member listing", Mode::Read)?;
        self.context
            .engine()
            .group_members(&self.uri)?
            .get(index as usize)
            .map(|m| (m.uri.clone(), m.name.clone()))
            .ok_or_else(|| {
                Error::InvalidParameter(format!("member index {index} out of bounds"))
            })
    }

    /// Store a metadata value
    pub fn put_metadata(&self, key: &str, value: MetadataValue) -> Result<()> {
        self.require_mode("metadata write", Mode::Write)?;
        self.context.engine().put_group_metadata(&self.uri, key, value)
    }

    /// Fetch a metadata value; a missing key is [`Error::NotFound`]
    pub fn get_metadata(&self, key: &str) -> Result<MetadataValue> {
        self.require_mode("metadata read", Mode::Read)?;
        self.context.engine().get_group_metadata(&self.uri, key)
    }

    /// Remove a metadata value
    pub fn delete_metadata(&self, key: &str) -> Result<()> {
        self.require_mode("metadata delete", Mode::Write)?;
        self.context.engine().delete_group_metadata(&self.uri, key)
    }

    /// All metadata entries in key order
    pub fn metadata(&self) -> Result<Vec<(String, MetadataValue)>> {
        self.require_mode("metadata read", Mode::Read)?;
        self.context.engine().group_metadata_entries(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_membership() {
        let ctx = Context::new().unwrap();
        Group::create(&ctx, "mem://g").unwrap();
        assert!(Group::exists(&ctx, "mem://g"));

        let group = Group::open(&ctx, "mem://g", Mode::Write).unwrap();
        group.add_member("mem://a1", false, Some("first")).unwrap();
        group.add_member("mem://a2", false, None).unwrap();
        // Write handles do not enumerate.
        assert!(matches!(group.member_num().unwrap_err(), Error::NotOpen(_)));

        let reader = Group::open(&ctx, "mem://g", Mode::Read).unwrap();
        assert_eq!(reader.member_num().unwrap(), 2);
        assert_eq!(
            reader.member(0).unwrap(),
            ("mem://a1".to_string(), Some("first".to_string()))
        );
    }

    #[test]
    fn test_group_mode_rules() {
        let ctx = Context::new().unwrap();
        Group::create(&ctx, "mem://g").unwrap();
        assert!(Group::open(&ctx, "mem://g", Mode::Delete).is_err());

        let reader = Group::open(&ctx, "mem://g", Mode::Read).unwrap();
        assert!(matches!(
            reader.add_member("mem://a", false, None).unwrap_err(),
            Error::NotOpen(_)
        ));
    }

    #[test]
    fn test_group_metadata() {
        let ctx = Context::new().unwrap();
        Group::create(&ctx, "mem://g").unwrap();
        let writer = Group::open(&ctx, "mem://g", Mode::Write).unwrap();
        writer
            .put_metadata("created_by", MetadataValue::from_str("ingestd"))
            .unwrap();

        let reader = Group::open(&ctx, "mem://g", Mode::Read).unwrap();
        assert_eq!(
            reader.get_metadata("created_by").unwrap().as_str().unwrap(),
            "ingestd"
        );
        assert!(matches!(
            reader.get_metadata("missing").unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
