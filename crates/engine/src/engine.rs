//! The storage engine
//!
//! [`StorageEngine`] is the collaborator every client handle ultimately
//! calls into: a registry of arrays and groups, a monotonic write clock,
//! tuning parameters and operation counters. Each operation is one
//! blocking call returning `Result` with the engine's message packaged —
//! there is no separate last-error state to fetch. The engine provides
//! interior locking so an engine and the handles rooted in it may be
//! shared across threads; it never locks across operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use uuid::Uuid;

use tessera_core::{Error, Layout, MetadataValue, Mode, Result, SchemaData};

use crate::array::{ArrayEntry, ArraySnapshot};
use crate::condition::ConditionData;
use crate::fragment::{wants_compression, FieldBlock, Fragment, FragmentKind, Payload};
use crate::group::{GroupEntry, GroupMember};
use crate::params::EngineParams;
use crate::read::{est_result_size, execute_read, non_empty_domain};
use crate::request::{
    EstimatedSize, FieldCapacity, FragmentMeta, ReadInput, ReadOutput, SubarrayData, WriteInput,
};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::vfs::VfsBackend;
use crate::write::execute_write;

/// The embedded storage engine
pub struct StorageEngine {
    arrays: DashMap<String, Arc<ArrayEntry>>,
    groups: DashMap<String, Arc<GroupEntry>>,
    params: EngineParams,
    stats: EngineStats,
    clock: AtomicU64,
    vfs: VfsBackend,
}

impl StorageEngine {
    /// Engine with explicit tuning parameters
    pub fn new(params: EngineParams) -> StorageEngine {
        StorageEngine {
            arrays: DashMap::new(),
            groups: DashMap::new(),
            params,
            stats: EngineStats::default(),
            clock: AtomicU64::new(0),
            vfs: VfsBackend::new(),
        }
    }

    /// Engine with default parameters
    pub fn with_defaults() -> StorageEngine {
        StorageEngine::new(EngineParams::default())
    }

    /// The engine's tuning parameters
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// The VFS backend
    pub fn vfs(&self) -> &VfsBackend {
        &self.vfs
    }

    /// Operation counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Monotonic write timestamp in milliseconds
    ///
    /// Wall-clock derived, bumped past the previous value so two writes
    /// never share a timestamp.
    pub fn now(&self) -> u64 {
        let wall = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(wall.max(prev + 1))
            })
            .map(|prev| wall.max(prev + 1))
            .unwrap_or(wall)
    }

    fn entry(&self, uri: &str) -> Result<Arc<ArrayEntry>> {
        self.arrays
            .get(uri)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| Error::NotFound(format!("array '{uri}' does not exist")))
    }

    // ========== Array lifecycle ==========

    /// Create an array from a checked schema
    pub fn create_array(&self, uri: &str, schema: SchemaData) -> Result<()> {
        schema.check()?;
        if self.arrays.contains_key(uri) || self.groups.contains_key(uri) {
            return Err(Error::Engine(format!("'{uri}' already exists")));
        }
        self.arrays
            .insert(uri.to_string(), Arc::new(ArrayEntry::new(uri.to_string(), schema)));
        self.stats.on_array_created();
        info!(array = uri, "array created");
        Ok(())
    }

    /// True when an array exists at `uri`
    pub fn array_exists(&self, uri: &str) -> bool {
        self.arrays.contains_key(uri)
    }

    /// Remove an array and all its fragments
    pub fn delete_array(&self, uri: &str) -> Result<()> {
        let entry = self.entry(uri)?;
        if entry.is_open() {
            return Err(Error::Engine(format!(
                "array '{uri}' has open handles and cannot be deleted"
            )));
        }
        self.arrays.remove(uri);
        info!(array = uri, "array deleted");
        Ok(())
    }

    /// Load the current schema of an array
    pub fn load_schema(&self, uri: &str) -> Result<Arc<SchemaData>> {
        Ok(Arc::clone(&self.entry(uri)?.schema.read()))
    }

    /// Open an array, taking a fragment snapshot over `range`
    ///
    /// The default range is everything up to now. Modify-exclusive opens
    /// demand sole ownership.
    pub fn open_array(
        &self,
        uri: &str,
        mode: Mode,
        range: Option<(u64, u64)>,
    ) -> Result<ArraySnapshot> {
        let entry = self.entry(uri)?;
        entry.acquire(mode)?;
        self.stats.on_array_opened();
        let range = range.unwrap_or((0, self.now()));
        debug!(array = uri, mode = %mode, "array opened");
        Ok(entry.snapshot(range))
    }

    /// Refresh an open handle's snapshot without changing its mode
    pub fn reopen_array(&self, uri: &str, range: Option<(u64, u64)>) -> Result<ArraySnapshot> {
        let entry = self.entry(uri)?;
        self.stats.on_array_opened();
        let range = range.unwrap_or((0, self.now()));
        Ok(entry.snapshot(range))
    }

    /// Release an open slot taken by [`open_array`](Self::open_array)
    pub fn close_array(&self, uri: &str, mode: Mode) -> Result<()> {
        self.entry(uri)?.release(mode);
        debug!(array = uri, "array closed");
        Ok(())
    }

    // ========== Cell data ==========

    /// Execute a write submit against the array's current schema
    pub fn write(&self, uri: &str, input: WriteInput) -> Result<FragmentMeta> {
        let entry = self.entry(uri)?;
        let schema = Arc::clone(&entry.schema.read());
        let timestamp = self.now();
        let fragment = execute_write(&entry, &schema, &self.params, input, timestamp)?;
        self.stats.on_fragment_written(fragment.cell_count);
        Ok(fragment_meta(&fragment))
    }

    /// Write a delete tombstone selecting cells to suppress
    ///
    /// Sparse arrays only; the condition applies to every cell written
    /// at or before the tombstone's timestamp.
    pub fn delete_cells(&self, uri: &str, condition: ConditionData) -> Result<FragmentMeta> {
        let entry = self.entry(uri)?;
        let schema = Arc::clone(&entry.schema.read());
        if schema.array_type != tessera_core::ArrayType::Sparse {
            return Err(Error::Engine("delete queries require a sparse array".into()));
        }
        condition.check(&schema)?;
        let timestamp = self.now();
        let id = Uuid::new_v4();
        let fragment = Fragment {
            uri: Fragment::make_uri(uri, timestamp, &id),
            id,
            kind: FragmentKind::Delete { condition },
            timestamp_range: (timestamp, timestamp),
            cell_count: 0,
            fields: FxHashMap::default(),
        };
        let fragment = entry.push_fragment(fragment);
        self.stats.on_fragment_written(0);
        Ok(fragment_meta(&fragment))
    }

    /// Execute a read submit over an open snapshot
    pub fn read(&self, snapshot: &ArraySnapshot, input: &ReadInput) -> Result<ReadOutput> {
        let output = execute_read(&snapshot.schema, &snapshot.fragments, &self.params, input)?;
        self.stats.on_read_submit(output.cells);
        Ok(output)
    }

    /// Estimated result sizes for a read over a snapshot
    pub fn est_result_size(
        &self,
        snapshot: &ArraySnapshot,
        subarray: &SubarrayData,
        fields: &[String],
    ) -> Result<Vec<(String, EstimatedSize)>> {
        est_result_size(&snapshot.schema, &snapshot.fragments, subarray, fields)
    }

    /// Per-dimension non-empty domain of a snapshot
    pub fn non_empty_domain(
        &self,
        snapshot: &ArraySnapshot,
    ) -> Result<Vec<Option<(Vec<u8>, Vec<u8>)>>> {
        non_empty_domain(&snapshot.schema, &snapshot.fragments)
    }

    // ========== Metadata ==========

    /// Store a metadata value under `key`
    pub fn put_metadata(&self, uri: &str, key: &str, value: MetadataValue) -> Result<()> {
        value.check()?;
        self.entry(uri)?.metadata.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Fetch the metadata value under `key`
    pub fn get_metadata(&self, uri: &str, key: &str) -> Result<MetadataValue> {
        self.entry(uri)?
            .metadata
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("metadata key '{key}'")))
    }

    /// Remove the metadata value under `key`
    pub fn delete_metadata(&self, uri: &str, key: &str) -> Result<()> {
        self.entry(uri)?.metadata.write().remove(key);
        Ok(())
    }

    /// True when `key` is present
    pub fn has_metadata(&self, uri: &str, key: &str) -> Result<bool> {
        Ok(self.entry(uri)?.metadata.read().contains_key(key))
    }

    /// Number of metadata entries
    pub fn metadata_num(&self, uri: &str) -> Result<u64> {
        Ok(self.entry(uri)?.metadata.read().len() as u64)
    }

    /// All metadata entries in key order
    pub fn metadata_entries(&self, uri: &str) -> Result<Vec<(String, MetadataValue)>> {
        Ok(self
            .entry(uri)?
            .metadata
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    // ========== Enumerations ==========

    /// Extend a stored enumeration, append-only
    ///
    /// Existing value-to-index mappings are preserved; open snapshots
    /// keep seeing the schema they were opened with.
    pub fn extend_enumeration(
        &self,
        uri: &str,
        name: &str,
        data: &[u8],
        offsets: Option<&[u64]>,
    ) -> Result<()> {
        let entry = self.entry(uri)?;
        let mut guard = entry.schema.write();
        let schema = guard.as_ref();
        let existing = schema
            .enumeration(name)
            .ok_or_else(|| Error::NotFound(format!("enumeration '{name}'")))?;
        let extended = existing.extend(data, offsets)?;
        let mut next = schema.clone();
        if let Some(slot) = next.enumerations.iter_mut().find(|e| e.name == name) {
            *slot = extended;
        }
        *guard = Arc::new(next);
        debug!(array = uri, enumeration = name, "enumeration extended");
        Ok(())
    }

    // ========== Fragment housekeeping ==========

    /// Fragment introspection plus the URIs awaiting vacuum
    pub fn fragment_info(&self, uri: &str) -> Result<(Vec<FragmentMeta>, Vec<String>)> {
        let entry = self.entry(uri)?;
        let metas = entry.fragments.read().iter().map(|f| fragment_meta(f)).collect();
        let to_vacuum = entry.to_vacuum.read().clone();
        Ok((metas, to_vacuum))
    }

    /// Merge fragments where the merge is a pure rewrite
    ///
    /// Sparse arrays merge every visible fragment (tombstones applied,
    /// coordinates deduplicated) into one; dense arrays merge fragments
    /// covering an identical box, newest winning. Superseded fragment
    /// URIs await [`vacuum`](Self::vacuum).
    pub fn consolidate(&self, uri: &str) -> Result<()> {
        let entry = self.entry(uri)?;
        let schema = Arc::clone(&entry.schema.read());
        match schema.array_type {
            tessera_core::ArrayType::Sparse => self.consolidate_sparse(&entry, &schema)?,
            tessera_core::ArrayType::Dense => consolidate_dense(&entry)?,
        }
        self.stats.on_consolidation();
        info!(array = uri, "consolidated");
        Ok(())
    }

    fn consolidate_sparse(&self, entry: &ArrayEntry, schema: &SchemaData) -> Result<()> {
        let fragments: Vec<Arc<Fragment>> = entry.fragments.read().clone();
        if fragments.len() < 2 {
            return Ok(());
        }

        // Field list: all dimensions then all attributes.
        let fields: Vec<String> = schema
            .domain
            .dimensions
            .iter()
            .map(|d| d.name.clone())
            .chain(schema.attributes.iter().map(|a| a.name.clone()))
            .collect();
        let subarray = SubarrayData::full(schema.domain.ndim() as usize);
        let estimates = est_result_size(schema, &fragments, &subarray, &fields)?;
        let capacities: Vec<FieldCapacity> = estimates
            .iter()
            .map(|(name, est)| FieldCapacity {
                name: name.clone(),
                data_bytes: est.data_bytes,
                offsets: schema
                    .field_shape(name)
                    .map(|(_, cvn)| cvn.is_var())
                    .unwrap_or(false)
                    .then_some(est.offsets),
                validity: schema.field_nullable(name).then_some(est.validity),
            })
            .collect();
        let output = execute_read(
            schema,
            &fragments,
            &self.params,
            &ReadInput {
                layout: Layout::GlobalOrder,
                subarray,
                condition: None,
                fields: capacities,
                cursor: 0,
            },
        )?;
        if !output.completed {
            return Err(Error::Engine(
                "consolidation buffer estimate fell short".into(),
            ));
        }

        let lo = fragments.iter().map(|f| f.timestamp_range.0).min().unwrap_or(0);
        let hi = fragments.iter().map(|f| f.timestamp_range.1).max().unwrap_or(0);
        let id = Uuid::new_v4();
        let mut blocks = FxHashMap::default();
        for (name, result) in output.fields {
            let compress = wants_compression(schema, &name);
            blocks.insert(
                name,
                FieldBlock {
                    data: Payload::store(result.data, compress)?,
                    offsets: result.offsets,
                    validity: result.validity,
                },
            );
        }
        let merged = Fragment {
            uri: Fragment::make_uri(&entry.uri, hi, &id),
            id,
            kind: FragmentKind::Sparse,
            timestamp_range: (lo, hi),
            cell_count: output.cells,
            fields: blocks,
        };

        let mut guard = entry.fragments.write();
        let mut vacuum = entry.to_vacuum.write();
        vacuum.extend(guard.iter().map(|f| f.uri.clone()));
        guard.clear();
        guard.push(Arc::new(merged));
        Ok(())
    }

    /// Drop fragments superseded by consolidation
    pub fn vacuum(&self, uri: &str) -> Result<u64> {
        let entry = self.entry(uri)?;
        let mut vacuum = entry.to_vacuum.write();
        let removed = vacuum.len() as u64;
        vacuum.clear();
        debug!(array = uri, removed, "vacuumed");
        Ok(removed)
    }

    // ========== Groups ==========

    fn group_entry(&self, uri: &str) -> Result<Arc<GroupEntry>> {
        self.groups
            .get(uri)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| Error::NotFound(format!("group '{uri}' does not exist")))
    }

    /// Create an empty group
    pub fn create_group(&self, uri: &str) -> Result<()> {
        if self.groups.contains_key(uri) || self.arrays.contains_key(uri) {
            return Err(Error::Engine(format!("'{uri}' already exists")));
        }
        self.groups
            .insert(uri.to_string(), Arc::new(GroupEntry::new(uri.to_string())));
        info!(group = uri, "group created");
        Ok(())
    }

    /// True when a group exists at `uri`
    pub fn group_exists(&self, uri: &str) -> bool {
        self.groups.contains_key(uri)
    }

    /// Remove a group
    pub fn delete_group(&self, uri: &str) -> Result<()> {
        self.group_entry(uri)?;
        self.groups.remove(uri);
        Ok(())
    }

    /// Add a member to a group
    pub fn group_add_member(&self, uri: &str, member: GroupMember) -> Result<()> {
        self.group_entry(uri)?.add_member(member)
    }

    /// Remove a member from a group by URI or logical name
    pub fn group_remove_member(&self, uri: &str, name_or_uri: &str) -> Result<()> {
        self.group_entry(uri)?.remove_member(name_or_uri)
    }

    /// Members of a group in insertion order
    pub fn group_members(&self, uri: &str) -> Result<Vec<GroupMember>> {
        Ok(self.group_entry(uri)?.members.read().clone())
    }

    /// Store group metadata under `key`
    pub fn put_group_metadata(&self, uri: &str, key: &str, value: MetadataValue) -> Result<()> {
        value.check()?;
        self.group_entry(uri)?
            .metadata
            .write()
            .insert(key.to_string(), value);
        Ok(())
    }

    /// Fetch group metadata under `key`
    pub fn get_group_metadata(&self, uri: &str, key: &str) -> Result<MetadataValue> {
        self.group_entry(uri)?
            .metadata
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("metadata key '{key}'")))
    }

    /// Remove group metadata under `key`
    pub fn delete_group_metadata(&self, uri: &str, key: &str) -> Result<()> {
        self.group_entry(uri)?.metadata.write().remove(key);
        Ok(())
    }

    /// Group metadata entries in key order
    pub fn group_metadata_entries(&self, uri: &str) -> Result<Vec<(String, MetadataValue)>> {
        Ok(self
            .group_entry(uri)?
            .metadata
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Merge dense fragments that cover an identical box
fn consolidate_dense(entry: &ArrayEntry) -> Result<()> {
    let mut guard = entry.fragments.write();
    let mut vacuum = entry.to_vacuum.write();
    let mut kept: Vec<Arc<Fragment>> = Vec::with_capacity(guard.len());
    for fragment in guard.iter() {
        let same_box = |other: &Arc<Fragment>| match (&fragment.kind, &other.kind) {
            (FragmentKind::Dense { subarray: a }, FragmentKind::Dense { subarray: b }) => a == b,
            _ => false,
        };
        if let Some(existing) = kept.iter_mut().find(|k| same_box(k)) {
            // Same box: the newer fragment fully covers the older.
            vacuum.push(existing.uri.clone());
            let mut widened = fragment.as_ref().clone();
            widened.timestamp_range.0 = widened.timestamp_range.0.min(existing.timestamp_range.0);
            *existing = Arc::new(widened);
        } else {
            kept.push(Arc::clone(fragment));
        }
    }
    *guard = kept;
    Ok(())
}

fn fragment_meta(fragment: &Fragment) -> FragmentMeta {
    FragmentMeta {
        uri: fragment.uri.clone(),
        sparse: fragment.is_sparse(),
        timestamp_range: fragment.timestamp_range,
        cell_num: fragment.cell_count,
        size_bytes: fragment.size_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ArrayType, AttributeData, CellValNum, Datatype, DimensionData, FilterListData};

    use crate::request::FieldInput;

    fn sparse_schema() -> SchemaData {
        let mut schema = SchemaData::new(ArrayType::Sparse);
        schema.domain.dimensions.push(DimensionData {
            name: "d".into(),
            datatype: Datatype::Int32,
            cell_val_num: CellValNum::single(),
            domain: Some((0i32.to_le_bytes().to_vec(), 99i32.to_le_bytes().to_vec())),
            tile_extent: Some(10i32.to_le_bytes().to_vec()),
            filters: FilterListData::new(),
        });
        schema.attributes.push(AttributeData::new("a", Datatype::Int32));
        schema
    }

    fn le_bytes(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn write_cells(engine: &StorageEngine, uri: &str, coords: &[i32], values: &[i32]) {
        engine
            .write(
                uri,
                WriteInput {
                    layout: Layout::Unordered,
                    subarray: None,
                    fields: vec![
                        (
                            "d".into(),
                            FieldInput {
                                data: le_bytes(coords),
                                offsets: None,
                                validity: None,
                            },
                        ),
                        (
                            "a".into(),
                            FieldInput {
                                data: le_bytes(values),
                                offsets: None,
                                validity: None,
                            },
                        ),
                    ],
                },
            )
            .unwrap();
    }

    #[test]
    fn test_create_open_close_lifecycle() {
        let engine = StorageEngine::with_defaults();
        engine.create_array("mem://a", sparse_schema()).unwrap();
        assert!(engine.array_exists("mem://a"));
        assert!(engine.create_array("mem://a", sparse_schema()).is_err());

        let snap = engine.open_array("mem://a", Mode::Read, None).unwrap();
        assert!(engine.delete_array("mem://a").is_err());
        assert_eq!(snap.fragments.len(), 0);
        engine.close_array("mem://a", Mode::Read).unwrap();
        engine.delete_array("mem://a").unwrap();
        assert!(!engine.array_exists("mem://a"));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let engine = StorageEngine::with_defaults();
        let a = engine.now();
        let b = engine.now();
        let c = engine.now();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_snapshot_isolation_from_later_writes() {
        let engine = StorageEngine::with_defaults();
        engine.create_array("mem://a", sparse_schema()).unwrap();
        write_cells(&engine, "mem://a", &[1, 2], &[10, 20]);

        let snap = engine.open_array("mem://a", Mode::Read, None).unwrap();
        write_cells(&engine, "mem://a", &[3], &[30]);
        assert_eq!(snap.fragments.len(), 1);

        let reopened = engine.reopen_array("mem://a", None).unwrap();
        assert_eq!(reopened.fragments.len(), 2);
        engine.close_array("mem://a", Mode::Read).unwrap();
    }

    #[test]
    fn test_metadata_roundtrip_and_not_found() {
        let engine = StorageEngine::with_defaults();
        engine.create_array("mem://a", sparse_schema()).unwrap();
        engine
            .put_metadata("mem://a", "rows", MetadataValue::from_slice(&[42i64]))
            .unwrap();
        assert!(engine.has_metadata("mem://a", "rows").unwrap());
        assert_eq!(
            engine
                .get_metadata("mem://a", "rows")
                .unwrap()
                .as_slice::<i64>()
                .unwrap(),
            vec![42]
        );
        assert!(matches!(
            engine.get_metadata("mem://a", "missing").unwrap_err(),
            Error::NotFound(_)
        ));
        engine.delete_metadata("mem://a", "rows").unwrap();
        assert_eq!(engine.metadata_num("mem://a").unwrap(), 0);
    }

    #[test]
    fn test_sparse_consolidation_merges_and_tracks_vacuum() {
        let engine = StorageEngine::with_defaults();
        engine.create_array("mem://a", sparse_schema()).unwrap();
        write_cells(&engine, "mem://a", &[1, 2], &[10, 20]);
        write_cells(&engine, "mem://a", &[2, 3], &[21, 30]);

        engine.consolidate("mem://a").unwrap();
        let (metas, to_vacuum) = engine.fragment_info("mem://a").unwrap();
        assert_eq!(metas.len(), 1);
        // Coordinate 2 deduplicated, latest value kept.
        assert_eq!(metas[0].cell_num, 3);
        assert_eq!(to_vacuum.len(), 2);

        assert_eq!(engine.vacuum("mem://a").unwrap(), 2);
        let (_, to_vacuum) = engine.fragment_info("mem://a").unwrap();
        assert!(to_vacuum.is_empty());
    }
}
