//! Tessera - embedded multi-dimensional array storage client library
//!
//! Tessera exposes the client data model and lifecycle contracts of a
//! multi-dimensional array storage engine: contexts, configs, schemas
//! built through builders, array handles with an open/close lifecycle,
//! queries speaking the incomplete-read protocol, filter pipelines,
//! enumerations, groups and a VFS.
//!
//! # Quick Start
//!
//! ```ignore
//! use tessera::{
//!     Array, ArrayType, AttributeBuilder, Context, Datatype, DimensionBuilder,
//!     DomainBuilder, Mode, Query, SchemaBuilder,
//! };
//!
//! let ctx = Context::new()?;
//!
//! let schema = SchemaBuilder::new(ArrayType::Dense)
//!     .set_domain(
//!         DomainBuilder::new()
//!             .add_dimension(DimensionBuilder::new::<i32>("d", [1, 100], 10)?.build())?
//!             .build(),
//!     )
//!     .add_attribute(AttributeBuilder::new("a", Datatype::Int32).build()?)?
//!     .build()?;
//! Array::create(&ctx, "mem://quickstart", &schema)?;
//!
//! let array = Array::open(&ctx, "mem://quickstart", Mode::Write)?;
//! let mut query = Query::new(&array, Mode::Write)?;
//! query.set_data_buffer("a", &(0..100).collect::<Vec<i32>>())?;
//! query.submit()?;
//! ```
//!
//! # Architecture
//!
//! The storage engine itself (fragments, the read/write execution, the
//! registries) lives in `tessera-engine` and is treated by this surface
//! as a black-box collaborator; `tessera-core` holds the shared data
//! model. Only the client API is re-exported here.

// Re-export the public API from tessera-api
pub use tessera_api::*;
