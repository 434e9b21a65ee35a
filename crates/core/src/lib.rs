//! Core types for the Tessera array storage client
//!
//! This crate defines the foundational data model shared by the engine
//! and the API surface:
//! - Datatype: cell datatypes and the closed physical primitive set
//! - Enum families: ArrayType, Mode, QueryStatus, Layout, EncryptionType,
//!   Filesystem, FilterType, WebPFormat — each with a stable u32 table
//! - CellValNum: values-per-cell with the variable-length sentinel
//! - Schema descriptors: Dimension, Domain, Attribute, Schema
//! - Enumerations: dictionary-encoded categorical value sets
//! - Filter pipelines: ordered transform chains with typed options
//! - MetadataValue: typed key/value metadata payloads
//! - Error: the error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datatype;
pub mod enumeration;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod schema;
pub mod types;

pub use datatype::{to_le_bytes, Datatype, PhysicalClass, PhysicalType, Scalar, DATATYPES};
pub use enumeration::EnumerationData;
pub use error::{Error, Result};
pub use filter::{
    FilterData, FilterListData, FilterOption, FilterType, WebPFormat, DEFAULT_MAX_CHUNK_SIZE,
};
pub use metadata::MetadataValue;
pub use schema::{
    cell_size, default_fill_value, AttributeData, DimensionData, DomainData, SchemaData,
    DEFAULT_CAPACITY, FORMAT_VERSION,
};
pub use types::{
    ArrayType, CellValNum, EncryptionType, Filesystem, Layout, Mode, QueryStatus,
    CELL_VAL_NUM_VAR,
};
