//! Array handles
//!
//! An [`Array`] is a named, opened-or-closed resource bound to one
//! schema. The state machine is Closed → Open(mode) → Closed;
//! [`Array::reopen`] is a same-state transition that refreshes the
//! visible fragment set without changing mode. Operations that require
//! an open handle fail with [`Error::NotOpen`] on a closed one, and with
//! a mode-mismatch message when the handle is open in an incompatible
//! mode — the handle caches its state for fast-fail, and the engine
//! enforces the same rules.
//!
//! A handle is closed exactly once per open: explicitly via
//! [`Array::close`], or implicitly on drop.

mod attribute;
mod dimension;
mod domain;
mod enumeration;
mod schema;

pub use attribute::{Attribute, Builder as AttributeBuilder};
pub use dimension::{Builder as DimensionBuilder, Dimension};
pub use domain::{Builder as DomainBuilder, Domain};
pub use enumeration::Enumeration;
pub use schema::{Builder as SchemaBuilder, Schema};

use tracing::debug;

use tessera_core::{Error, MetadataValue, Mode, PhysicalType, Result};
use tessera_engine::ArraySnapshot;

use crate::context::Context;

struct OpenHandle {
    mode: Mode,
    snapshot: ArraySnapshot,
    /// Explicit open range, kept across reopens; `None` follows "now"
    explicit_range: Option<(u64, u64)>,
}

/// A named array resource, opened in a mode or closed
pub struct Array {
    context: Context,
    uri: String,
    open: Option<OpenHandle>,
}

impl Array {
    /// Create an array at `uri` from a checked schema
    pub fn create(context: &Context, uri: &str, schema: &Schema) -> Result<()> {
        context
            .engine()
            .create_array(uri, schema.data().as_ref().clone())
    }

    /// True when an array exists at `uri`
    pub fn exists(context: &Context, uri: &str) -> bool {
        context.engine().array_exists(uri)
    }

    /// Remove the array at `uri` and all its data
    pub fn delete(context: &Context, uri: &str) -> Result<()> {
        context.engine().delete_array(uri)
    }

    /// Load the current schema of the array at `uri`
    pub fn load_schema(context: &Context, uri: &str) -> Result<Schema> {
        Ok(Schema::from_data(context.engine().load_schema(uri)?))
    }

    /// Merge fragments where the merge is a pure rewrite
    pub fn consolidate(context: &Context, uri: &str) -> Result<()> {
        context.engine().consolidate(uri)
    }

    /// Drop fragments superseded by consolidation
    pub fn vacuum(context: &Context, uri: &str) -> Result<u64> {
        context.engine().vacuum(uri)
    }

    /// Open the array at `uri` in `mode`, seeing everything up to now
    pub fn open(context: &Context, uri: &str, mode: Mode) -> Result<Array> {
        Self::open_impl(context, uri, mode, None)
    }

    /// Open with an explicit timestamp range
    ///
    /// Only fragments whose timestamp range intersects `[t0, t1]` are
    /// visible; the range is kept across reopens.
    pub fn open_at(
        context: &Context,
        uri: &str,
        mode: Mode,
        range: (u64, u64),
    ) -> Result<Array> {
        Self::open_impl(context, uri, mode, Some(range))
    }

    fn open_impl(
        context: &Context,
        uri: &str,
        mode: Mode,
        range: Option<(u64, u64)>,
    ) -> Result<Array> {
        let snapshot = context.engine().open_array(uri, mode, range)?;
        Ok(Array {
            context: context.clone(),
            uri: uri.to_string(),
            open: Some(OpenHandle {
                mode,
                snapshot,
                explicit_range: range,
            }),
        })
    }

    /// Refresh the visible fragment set without changing mode
    pub fn reopen(&mut self) -> Result<()> {
        let range = self.require_open()?.explicit_range;
        let snapshot = self.context.engine().reopen_array(&self.uri, range)?;
        self.require_open_mut()?.snapshot = snapshot;
        debug!(array = %self.uri, "array reopened");
        Ok(())
    }

    /// Close the handle
    ///
    /// A handle is closed exactly once; closing a closed handle is
    /// [`Error::NotOpen`].
    pub fn close(&mut self) -> Result<()> {
        let handle = self
            .open
            .take()
            .ok_or_else(|| Error::NotOpen(format!("array '{}' is already closed", self.uri)))?;
        self.context.engine().close_array(&self.uri, handle.mode)
    }

    /// Array URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True while the handle is open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Mode the handle is open in
    pub fn mode(&self) -> Result<Mode> {
        Ok(self.require_open()?.mode)
    }

    /// Schema as seen by this handle's snapshot
    pub fn schema(&self) -> Result<Schema> {
        Ok(Schema::from_data(self.require_open()?.snapshot.schema.clone()))
    }

    fn require_open(&self) -> Result<&OpenHandle> {
        self.open
            .as_ref()
            .ok_or_else(|| Error::NotOpen(format!("array '{}' is not open", self.uri)))
    }

    fn require_open_mut(&mut self) -> Result<&mut OpenHandle> {
        let uri = self.uri.clone();
        self.open
            .as_mut()
            .ok_or_else(|| Error::NotOpen(format!("array '{uri}' is not open")))
    }

    fn require_mode(&self, operation: &str, want_write: bool) -> Result<&OpenHandle> {
        let handle = self.require_open()?;
        let compatible = if want_write {
            matches!(handle.mode, Mode::Write | Mode::Update | Mode::ModifyExclusive)
        } else {
            handle.mode == Mode::Read
        };
        if !compatible {
            return Err(Error::NotOpen(format!(
                "array '{}' is open in {} mode, {operation} requires {}",
                self.uri,
                handle.mode,
                if want_write { "a write mode" } else { "READ" },
            )));
        }
        Ok(handle)
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn snapshot(&self) -> Result<&ArraySnapshot> {
        Ok(&self.require_open()?.snapshot)
    }

    pub(crate) fn open_mode(&self) -> Result<Mode> {
        Ok(self.require_open()?.mode)
    }

    // ========== Non-empty domain ==========

    /// Typed non-empty bounds of a dimension
    ///
    /// `None` means no written data — an empty domain is a normal
    /// answer, not an error.
    pub fn non_empty_domain<T: PhysicalType>(&self, dimension: &str) -> Result<Option<(T, T)>> {
        let handle = self.require_open()?;
        let schema = &handle.snapshot.schema;
        let dim = schema
            .domain
            .dimension(dimension)
            .ok_or_else(|| Error::NotFound(format!("dimension '{dimension}'")))?;
        if !T::is_compatible(dim.datatype) {
            return Err(Error::type_mismatch(
                dimension,
                dim.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        let index = schema.domain.dimension_index(dimension).expect("checked");
        let bounds = self.context.engine().non_empty_domain(&handle.snapshot)?;
        Ok(bounds[index]
            .as_ref()
            .map(|(lo, hi)| (T::from_le_bytes(lo), T::from_le_bytes(hi))))
    }

    /// Raw non-empty bounds of a variable-length string dimension
    pub fn non_empty_domain_var(&self, dimension: &str) -> Result<Option<(String, String)>> {
        let handle = self.require_open()?;
        let schema = &handle.snapshot.schema;
        let index = schema
            .domain
            .dimension_index(dimension)
            .ok_or_else(|| Error::NotFound(format!("dimension '{dimension}'")))?;
        let bounds = self.context.engine().non_empty_domain(&handle.snapshot)?;
        Ok(bounds[index].as_ref().map(|(lo, hi)| {
            (
                String::from_utf8_lossy(lo).into_owned(),
                String::from_utf8_lossy(hi).into_owned(),
            )
        }))
    }

    /// True when no dimension has any written data
    pub fn domain_is_empty(&self) -> Result<bool> {
        let handle = self.require_open()?;
        let bounds = self.context.engine().non_empty_domain(&handle.snapshot)?;
        Ok(bounds.iter().all(Option::is_none))
    }

    // ========== Metadata ==========

    /// Store a metadata value; requires a write-mode handle
    pub fn put_metadata(&self, key: &str, value: MetadataValue) -> Result<()> {
        self.require_mode("metadata write", true)?;
        self.context.engine().put_metadata(&self.uri, key, value)
    }

    /// Remove a metadata value; requires a write-mode handle
    pub fn delete_metadata(&self, key: &str) -> Result<()> {
        self.require_mode("metadata delete", true)?;
        self.context.engine().delete_metadata(&self.uri, key)
    }

    /// Fetch a metadata value; requires a read-mode handle
    ///
    /// A missing key is [`Error::NotFound`].
    pub fn get_metadata(&self, key: &str) -> Result<MetadataValue> {
        self.require_mode("metadata read", false)?;
        self.context.engine().get_metadata(&self.uri, key)
    }

    /// True when a metadata key exists; requires a read-mode handle
    pub fn has_metadata_key(&self, key: &str) -> Result<bool> {
        self.require_mode("metadata read", false)?;
        self.context.engine().has_metadata(&self.uri, key)
    }

    /// Number of metadata entries; requires a read-mode handle
    pub fn metadata_num(&self) -> Result<u64> {
        self.require_mode("metadata read", false)?;
        self.context.engine().metadata_num(&self.uri)
    }

    /// All metadata entries in key order; requires a read-mode handle
    pub fn metadata(&self) -> Result<Vec<(String, MetadataValue)>> {
        self.require_mode("metadata read", false)?;
        self.context.engine().metadata_entries(&self.uri)
    }

    // ========== Enumerations ==========

    /// Load an enumeration's values from this handle's schema snapshot
    pub fn get_enumeration(&self, name: &str) -> Result<Enumeration> {
        let handle = self.require_open()?;
        handle
            .snapshot
            .schema
            .enumeration(name)
            .cloned()
            .map(Enumeration::from_data)
            .ok_or_else(|| Error::NotFound(format!("enumeration '{name}'")))
    }

    /// Append string entries to a stored enumeration
    ///
    /// Requires a write-mode handle. Existing value-to-index mappings
    /// are preserved; this handle keeps seeing its open-time schema
    /// until [`reopen`](Self::reopen).
    pub fn extend_enumeration_with_strings(&self, name: &str, entries: &[&str]) -> Result<()> {
        self.require_mode("enumeration extension", true)?;
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(entries.len());
        for e in entries {
            offsets.push(data.len() as u64);
            data.extend_from_slice(e.as_bytes());
        }
        self.context
            .engine()
            .extend_enumeration(&self.uri, name, &data, Some(&offsets))
    }

    /// Append typed entries to a stored fixed-size enumeration
    pub fn extend_enumeration_with_values<T: PhysicalType>(
        &self,
        name: &str,
        entries: &[T],
    ) -> Result<()> {
        self.require_mode("enumeration extension", true)?;
        self.context.engine().extend_enumeration(
            &self.uri,
            name,
            &tessera_core::to_le_bytes(entries),
            None,
        )
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Some(handle) = self.open.take() {
            let _ = self.context.engine().close_array(&self.uri, handle.mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Datatype;

    fn test_schema() -> Schema {
        SchemaBuilder::new(tessera_core::ArrayType::Sparse)
            .set_domain(
                DomainBuilder::new()
                    .add_dimension(
                        DimensionBuilder::new::<i32>("d", [0, 99], 10).unwrap().build(),
                    )
                    .unwrap()
                    .build(),
            )
            .add_attribute(AttributeBuilder::new("a", Datatype::Int32).build().unwrap())
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_lifecycle_closed_open_closed() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        assert!(Array::exists(&ctx, "mem://arr"));

        let mut array = Array::open(&ctx, "mem://arr", Mode::Read).unwrap();
        assert!(array.is_open());
        assert_eq!(array.mode().unwrap(), Mode::Read);
        array.close().unwrap();
        assert!(!array.is_open());
        assert!(matches!(array.close().unwrap_err(), Error::NotOpen(_)));
    }

    #[test]
    fn test_read_mode_rejects_metadata_write() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        let array = Array::open(&ctx, "mem://arr", Mode::Read).unwrap();
        let err = array
            .put_metadata("k", MetadataValue::from_slice(&[1i32]))
            .unwrap_err();
        assert!(matches!(err, Error::NotOpen(_)));
        assert!(err.to_string().contains("READ"));
    }

    #[test]
    fn test_write_mode_rejects_metadata_read() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        let array = Array::open(&ctx, "mem://arr", Mode::Write).unwrap();
        array
            .put_metadata("k", MetadataValue::from_slice(&[1i32]))
            .unwrap();
        assert!(matches!(
            array.get_metadata("k").unwrap_err(),
            Error::NotOpen(_)
        ));
    }

    #[test]
    fn test_never_written_domain_is_empty() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        let array = Array::open(&ctx, "mem://arr", Mode::Read).unwrap();
        assert!(array.domain_is_empty().unwrap());
        assert_eq!(array.non_empty_domain::<i32>("d").unwrap(), None);
    }

    #[test]
    fn test_drop_releases_open_slot() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        {
            let _array = Array::open(&ctx, "mem://arr", Mode::ModifyExclusive).unwrap();
            assert!(Array::open(&ctx, "mem://arr", Mode::Read).is_err());
        }
        // The exclusive handle was dropped; opening works again.
        Array::open(&ctx, "mem://arr", Mode::Read).unwrap();
    }

    #[test]
    fn test_closed_handle_fast_fails() {
        let ctx = Context::new().unwrap();
        Array::create(&ctx, "mem://arr", &test_schema()).unwrap();
        let mut array = Array::open(&ctx, "mem://arr", Mode::Read).unwrap();
        array.close().unwrap();
        assert!(matches!(array.schema().unwrap_err(), Error::NotOpen(_)));
        assert!(matches!(
            array.domain_is_empty().unwrap_err(),
            Error::NotOpen(_)
        ));
    }
}
