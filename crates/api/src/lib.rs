//! Client API for the Tessera array storage engine
//!
//! This crate is the client-visible surface: a [`Context`] owning one
//! engine instance, a [`Config`] of tuning parameters, schema
//! view/builder pairs, [`Array`] handles with the
//! Closed → Open(mode) → Closed lifecycle, [`Query`] objects speaking
//! the incomplete-read protocol, filter pipelines, enumerations, groups,
//! fragment introspection and a VFS.
//!
//! Calls are synchronous and blocking; there are no suspension points
//! at this layer. A context and the object graph rooted in it may be
//! shared across threads, but mutation methods on a single handle are
//! not thread-safe — callers must serialize writes to one array handle.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod config;
pub mod context;
pub mod filter;
pub mod fragment_info;
pub mod group;
pub mod query;
pub mod vfs;

pub use array::{
    Array, Attribute, AttributeBuilder, Dimension, DimensionBuilder, Domain, DomainBuilder,
    Enumeration, Schema, SchemaBuilder,
};
pub use config::Config;
pub use context::Context;
pub use filter::{Filter, FilterList};
pub use fragment_info::FragmentInfo;
pub use group::Group;
pub use query::{Query, QueryCondition, Subarray};
pub use vfs::Vfs;

// The data-model vocabulary callers need alongside the handles.
pub use tessera_core::{
    ArrayType, CellValNum, Datatype, EncryptionType, Error, Filesystem, FilterType, Layout,
    MetadataValue, Mode, PhysicalType, QueryStatus, Result, WebPFormat,
};
