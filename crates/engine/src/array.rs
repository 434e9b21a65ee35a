//! Registered arrays and open-handle bookkeeping
//!
//! The engine tracks each created array as an [`ArrayEntry`]: its checked
//! schema, its fragment list, its metadata namespace and the open-handle
//! counts that back the exclusive-modification mode. Opening an array
//! takes an [`ArraySnapshot`] — an immutable view of the schema and the
//! fragments visible in the requested timestamp range. Reopening takes a
//! fresh snapshot; fragments written after an open are invisible to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use tessera_core::{Error, MetadataValue, Mode, Result, SchemaData};

use crate::fragment::Fragment;

/// Open-handle counts for one array
#[derive(Debug, Default)]
pub struct OpenState {
    /// Handles open in any non-exclusive mode
    pub shared: u32,
    /// Whether a modify-exclusive handle is held
    pub exclusive: bool,
}

/// One created array known to the engine
pub struct ArrayEntry {
    /// Array URI
    pub uri: String,
    /// Current checked schema; replaced atomically by enumeration
    /// extension
    pub schema: RwLock<Arc<SchemaData>>,
    /// All fragments ever written, timestamp order
    pub fragments: RwLock<Vec<Arc<Fragment>>>,
    /// Fragment URIs superseded by consolidation, awaiting vacuum
    pub to_vacuum: RwLock<Vec<String>>,
    /// Metadata namespace, separate from cell data
    pub metadata: RwLock<BTreeMap<String, MetadataValue>>,
    /// Open-handle bookkeeping
    pub open: Mutex<OpenState>,
}

impl ArrayEntry {
    /// Fresh entry with no fragments or metadata
    pub fn new(uri: String, schema: SchemaData) -> ArrayEntry {
        ArrayEntry {
            uri,
            schema: RwLock::new(Arc::new(schema)),
            fragments: RwLock::new(Vec::new()),
            to_vacuum: RwLock::new(Vec::new()),
            metadata: RwLock::new(BTreeMap::new()),
            open: Mutex::new(OpenState::default()),
        }
    }

    /// Acquire an open slot in `mode`
    ///
    /// Modify-exclusive demands sole ownership: it fails while any other
    /// handle is open, and while held every other open fails.
    pub fn acquire(&self, mode: Mode) -> Result<()> {
        let mut open = self.open.lock();
        if open.exclusive {
            return Err(Error::Engine(format!(
                "array '{}' is held for exclusive modification",
                self.uri
            )));
        }
        if mode == Mode::ModifyExclusive {
            if open.shared > 0 {
                return Err(Error::Engine(format!(
                    "array '{}' has open handles, exclusive modification refused",
                    self.uri
                )));
            }
            open.exclusive = true;
        } else {
            open.shared += 1;
        }
        Ok(())
    }

    /// Release an open slot taken by [`acquire`](Self::acquire)
    pub fn release(&self, mode: Mode) {
        let mut open = self.open.lock();
        if mode == Mode::ModifyExclusive {
            open.exclusive = false;
        } else {
            open.shared = open.shared.saturating_sub(1);
        }
    }

    /// True while any handle is open
    pub fn is_open(&self) -> bool {
        let open = self.open.lock();
        open.exclusive || open.shared > 0
    }

    /// Immutable view of schema and fragments visible in `range`
    pub fn snapshot(&self, range: (u64, u64)) -> ArraySnapshot {
        let fragments = self
            .fragments
            .read()
            .iter()
            .filter(|f| f.visible_in(range))
            .cloned()
            .collect();
        ArraySnapshot {
            schema: Arc::clone(&self.schema.read()),
            fragments,
            timestamp_range: range,
        }
    }

    /// Append a fragment
    pub fn push_fragment(&self, fragment: Fragment) -> Arc<Fragment> {
        let fragment = Arc::new(fragment);
        self.fragments.write().push(Arc::clone(&fragment));
        fragment
    }
}

/// What an opened handle sees: schema plus visible fragments, frozen at
/// open/reopen time
#[derive(Clone)]
pub struct ArraySnapshot {
    /// Schema at open time
    pub schema: Arc<SchemaData>,
    /// Visible fragments, timestamp order
    pub fragments: Vec<Arc<Fragment>>,
    /// Timestamp range the snapshot was taken over
    pub timestamp_range: (u64, u64),
}

impl ArraySnapshot {
    /// Visible non-tombstone fragments
    pub fn data_fragments(&self) -> impl Iterator<Item = &Arc<Fragment>> {
        self.fragments.iter().filter(|f| !f.is_delete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ArrayType, AttributeData, Datatype};

    fn entry() -> ArrayEntry {
        let mut schema = SchemaData::new(ArrayType::Sparse);
        schema.attributes.push(AttributeData::new("a", Datatype::Int32));
        ArrayEntry::new("mem://test".into(), schema)
    }

    #[test]
    fn test_shared_opens_stack() {
        let e = entry();
        e.acquire(Mode::Read).unwrap();
        e.acquire(Mode::Write).unwrap();
        assert!(e.is_open());
        e.release(Mode::Read);
        e.release(Mode::Write);
        assert!(!e.is_open());
    }

    #[test]
    fn test_exclusive_requires_sole_ownership() {
        let e = entry();
        e.acquire(Mode::Read).unwrap();
        assert!(e.acquire(Mode::ModifyExclusive).is_err());
        e.release(Mode::Read);

        e.acquire(Mode::ModifyExclusive).unwrap();
        assert!(e.acquire(Mode::Read).is_err());
        e.release(Mode::ModifyExclusive);
        e.acquire(Mode::Read).unwrap();
    }
}
