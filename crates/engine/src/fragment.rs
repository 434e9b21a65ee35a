//! Immutable write fragments
//!
//! Every successful write produces one fragment: an immutable batch of
//! cells stamped with a timestamp range. Reads overlay fragments by
//! recency; consolidation merges them; vacuum removes superseded ones.
//! Cell payloads are stored as flat little-endian buffers, compressed
//! with zstd when the owning field's filter pipeline asks for
//! compression — the codec internals beyond that belong to the filter
//! pipeline realization and are not modelled here.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tessera_core::{Error, Result, SchemaData};

use crate::condition::ConditionData;

/// Compression level used for fragment payloads
const PAYLOAD_ZSTD_LEVEL: i32 = 3;

/// A cell payload, stored raw or zstd-compressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// Uncompressed bytes
    Raw(Vec<u8>),
    /// Compressed bytes plus the decompressed length
    Zstd {
        /// Length of the decompressed payload
        raw_len: usize,
        /// Compressed bytes
        bytes: Vec<u8>,
    },
}

impl Payload {
    /// Store `data`, compressing when requested
    pub fn store(data: Vec<u8>, compress: bool) -> Result<Payload> {
        if !compress || data.is_empty() {
            return Ok(Payload::Raw(data));
        }
        let raw_len = data.len();
        let bytes = zstd::bulk::compress(&data, PAYLOAD_ZSTD_LEVEL)
            .map_err(|e| Error::Engine(format!("payload compression failed: {e}")))?;
        Ok(Payload::Zstd { raw_len, bytes })
    }

    /// Materialize the stored bytes
    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Raw(data) => Ok(data.clone()),
            Payload::Zstd { raw_len, bytes } => zstd::bulk::decompress(bytes, *raw_len)
                .map_err(|e| Error::Engine(format!("payload decompression failed: {e}"))),
        }
    }

    /// Stored (possibly compressed) length in bytes
    pub fn stored_len(&self) -> usize {
        match self {
            Payload::Raw(data) => data.len(),
            Payload::Zstd { bytes, .. } => bytes.len(),
        }
    }
}

/// One field's cells within a fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBlock {
    /// Packed cell bytes (fixed-size cells) or concatenated var bytes
    pub data: Payload,
    /// Byte offset of each cell into `data`; present iff variable-length
    pub offsets: Option<Vec<u64>>,
    /// One validity byte per cell; present iff nullable
    pub validity: Option<Vec<u8>>,
}

impl FieldBlock {
    /// Decompressed cell bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.data.load()
    }
}

/// What kind of write produced a fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FragmentKind {
    /// Dense write over an inclusive per-dimension box, cells stored
    /// row-major over that box
    Dense {
        /// Inclusive (lower, upper) bounds per dimension, raw elements
        subarray: Vec<(Vec<u8>, Vec<u8>)>,
    },
    /// Sparse write; dimension fields carry the coordinates
    Sparse,
    /// Delete tombstone; suppresses older cells matching the condition
    Delete {
        /// Condition selecting the cells to delete
        condition: ConditionData,
    },
}

/// An immutable batch of written cells within a time range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique fragment identity
    pub id: Uuid,
    /// Fragment URI beneath the array URI
    pub uri: String,
    /// Write kind and dense bounds
    pub kind: FragmentKind,
    /// Inclusive timestamp range covered by this fragment
    pub timestamp_range: (u64, u64),
    /// Number of cells
    pub cell_count: u64,
    /// Field name to cell block, attributes plus sparse dimensions
    pub fields: FxHashMap<String, FieldBlock>,
}

impl Fragment {
    /// Mint a fragment URI for an array at a timestamp
    pub fn make_uri(array_uri: &str, timestamp: u64, id: &Uuid) -> String {
        format!("{array_uri}/__fragments/__{timestamp}_{timestamp}_{id}")
    }

    /// True for delete tombstones
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, FragmentKind::Delete { .. })
    }

    /// True when the fragment holds sparse cells
    pub fn is_sparse(&self) -> bool {
        matches!(self.kind, FragmentKind::Sparse)
    }

    /// True when this fragment is visible within `[t0, t1]`
    pub fn visible_in(&self, range: (u64, u64)) -> bool {
        self.timestamp_range.0 <= range.1 && self.timestamp_range.1 >= range.0
    }

    /// Serialized size estimate in bytes, as reported by fragment
    /// introspection
    pub fn size_bytes(&self) -> u64 {
        bincode::serialized_size(self).unwrap_or(0)
    }

    /// Field block lookup, failing with the engine's message when the
    /// write that produced this fragment did not carry the field
    pub fn field(&self, name: &str) -> Result<&FieldBlock> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::Engine(format!("fragment {} has no field '{name}'", self.id)))
    }
}

/// Decide whether a field's payload should be compressed at rest
pub fn wants_compression(schema: &SchemaData, field: &str) -> bool {
    if let Some(attr) = schema.attribute(field) {
        return attr.filters.has_compression();
    }
    if let Some(dim) = schema.domain.dimension(field) {
        return dim.filters.has_compression();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_raw_roundtrip() {
        let p = Payload::store(vec![1, 2, 3], false).unwrap();
        assert!(matches!(p, Payload::Raw(_)));
        assert_eq!(p.load().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_payload_zstd_roundtrip() {
        let data: Vec<u8> = std::iter::repeat(0xAB).take(4096).collect();
        let p = Payload::store(data.clone(), true).unwrap();
        assert!(matches!(p, Payload::Zstd { .. }));
        assert!(p.stored_len() < data.len());
        assert_eq!(p.load().unwrap(), data);
    }

    #[test]
    fn test_visibility_window() {
        let frag = Fragment {
            id: Uuid::new_v4(),
            uri: "mem://a/__fragments/x".into(),
            kind: FragmentKind::Sparse,
            timestamp_range: (10, 10),
            cell_count: 0,
            fields: FxHashMap::default(),
        };
        assert!(frag.visible_in((0, 10)));
        assert!(frag.visible_in((10, 20)));
        assert!(!frag.visible_in((11, 20)));
        assert!(!frag.visible_in((0, 9)));
    }
}
