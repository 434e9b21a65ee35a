//! Operation contract types
//!
//! The vocabulary the API layer speaks to the engine: subarray ranges,
//! write inputs, read capacities and results. One blocking engine call
//! per operation; the engine returns `Result` with its message packaged,
//! so callers never fetch error state separately.

use smallvec::SmallVec;

use tessera_core::{Layout, MetadataValue};

use crate::condition::ConditionData;

/// One inclusive range along a dimension, raw element bytes
#[derive(Debug, Clone, PartialEq)]
pub struct RangeData {
    /// Inclusive lower bound
    pub start: Vec<u8>,
    /// Inclusive upper bound
    pub end: Vec<u8>,
}

/// Ranges along one dimension; empty means the dimension's full extent
pub type DimensionRanges = SmallVec<[RangeData; 1]>;

/// Per-dimension range constraints on a read or dense write
#[derive(Debug, Clone, Default)]
pub struct SubarrayData {
    /// One entry per dimension, in dimension order
    pub dims: Vec<DimensionRanges>,
}

impl SubarrayData {
    /// Unconstrained subarray over `ndim` dimensions
    pub fn full(ndim: usize) -> SubarrayData {
        SubarrayData {
            dims: vec![DimensionRanges::new(); ndim],
        }
    }

    /// True when no explicit range was added anywhere
    pub fn is_unconstrained(&self) -> bool {
        self.dims.iter().all(|r| r.is_empty())
    }
}

/// One field's buffered cells arriving with a write
#[derive(Debug, Clone)]
pub struct FieldInput {
    /// Packed cell bytes
    pub data: Vec<u8>,
    /// Byte offset of each cell into `data`; present iff variable-length
    pub offsets: Option<Vec<u64>>,
    /// One validity byte per cell; present iff nullable
    pub validity: Option<Vec<u8>>,
}

/// A write submit
#[derive(Debug, Clone)]
pub struct WriteInput {
    /// Cell layout of the buffered data
    pub layout: Layout,
    /// Dense target box; ignored for sparse writes
    pub subarray: Option<SubarrayData>,
    /// Field name to buffered cells
    pub fields: Vec<(String, FieldInput)>,
}

/// Buffer capacities a read submit may fill, per field
#[derive(Debug, Clone)]
pub struct FieldCapacity {
    /// Field name (attribute or dimension)
    pub name: String,
    /// Data buffer capacity in bytes
    pub data_bytes: u64,
    /// Offsets buffer capacity in elements; present iff variable-length
    pub offsets: Option<u64>,
    /// Validity buffer capacity in bytes; present iff nullable
    pub validity: Option<u64>,
}

/// A read submit
#[derive(Debug, Clone)]
pub struct ReadInput {
    /// Requested result layout
    pub layout: Layout,
    /// Range constraints
    pub subarray: SubarrayData,
    /// Optional cell predicate
    pub condition: Option<ConditionData>,
    /// Capacities of the bound buffers
    pub fields: Vec<FieldCapacity>,
    /// Cells already delivered by earlier submits of this query
    pub cursor: u64,
}

/// One field's result cells
#[derive(Debug, Clone, Default)]
pub struct FieldResult {
    /// Packed cell bytes actually produced
    pub data: Vec<u8>,
    /// Byte offsets of produced cells; present iff variable-length
    pub offsets: Option<Vec<u64>>,
    /// Validity bytes of produced cells; present iff nullable
    pub validity: Option<Vec<u8>>,
}

/// Outcome of a read submit
#[derive(Debug, Clone)]
pub struct ReadOutput {
    /// Results per requested field, in request order
    pub fields: Vec<(String, FieldResult)>,
    /// Cells produced by this submit
    pub cells: u64,
    /// Updated cursor for the next submit
    pub cursor: u64,
    /// True when the logical query is exhausted
    pub completed: bool,
}

/// Per-field estimated result sizes for a read
#[derive(Debug, Clone, Default)]
pub struct EstimatedSize {
    /// Estimated data bytes
    pub data_bytes: u64,
    /// Estimated offsets elements, for variable-length fields
    pub offsets: u64,
    /// Estimated validity bytes, for nullable fields
    pub validity: u64,
}

/// Introspection record for one fragment
#[derive(Debug, Clone)]
pub struct FragmentMeta {
    /// Fragment URI
    pub uri: String,
    /// True when the fragment holds sparse cells
    pub sparse: bool,
    /// Inclusive timestamp range
    pub timestamp_range: (u64, u64),
    /// Number of cells
    pub cell_num: u64,
    /// Serialized size estimate in bytes
    pub size_bytes: u64,
}

/// A metadata entry yielded by enumeration
pub type MetadataEntry = (String, MetadataValue);
