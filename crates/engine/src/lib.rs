//! Embedded storage engine for Tessera
//!
//! This crate is the collaborator behind the client API: it registers
//! arrays and groups, stores immutable write fragments, executes reads
//! with the cursor-based incomplete protocol, keeps metadata namespaces
//! and answers housekeeping queries. The client layer treats it as a
//! black box reachable only through the operation contracts in
//! [`request`]; the on-disk format, tiling and codec internals of a full
//! storage engine are intentionally not modelled here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod condition;
pub mod engine;
pub mod fragment;
pub mod group;
pub mod params;
pub mod read;
pub mod request;
pub mod stats;
pub mod vfs;
pub mod write;

pub use array::{ArrayEntry, ArraySnapshot, OpenState};
pub use condition::{CellView, CmpOp, CombineOp, ConditionData};
pub use engine::StorageEngine;
pub use fragment::{FieldBlock, Fragment, FragmentKind, Payload};
pub use group::{GroupEntry, GroupMember};
pub use params::{known_params, param_spec, validate_value, EngineParams, ParamKind, ParamSpec};
pub use request::{
    DimensionRanges, EstimatedSize, FieldCapacity, FieldInput, FieldResult, FragmentMeta,
    MetadataEntry, RangeData, ReadInput, ReadOutput, SubarrayData, WriteInput,
};
pub use stats::{EngineStats, StatsSnapshot};
pub use vfs::{is_supported, VfsBackend, SUPPORTED_FILESYSTEMS};
