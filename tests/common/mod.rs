//! Shared helpers for the integration suites
#![allow(dead_code)]

use tessera::{
    Array, ArrayType, AttributeBuilder, Context, Datatype, DimensionBuilder, DomainBuilder,
    Schema, SchemaBuilder,
};

/// Install a test subscriber once; later calls are no-ops
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tessera=debug")
        .with_test_writer()
        .try_init();
}

/// Dense 1-D schema: dimension `d` over `[1, 100]`, int32 attribute `a`
pub fn dense_1d_schema() -> Schema {
    SchemaBuilder::new(ArrayType::Dense)
        .set_domain(
            DomainBuilder::new()
                .add_dimension(DimensionBuilder::new::<i32>("d", [1, 100], 10).unwrap().build())
                .unwrap()
                .build(),
        )
        .add_attribute(AttributeBuilder::new("a", Datatype::Int32).build().unwrap())
        .unwrap()
        .build()
        .unwrap()
}

/// Sparse 1-D schema: dimension `d` over `[0, 999]`, int32 attribute `a`
pub fn sparse_1d_schema() -> Schema {
    SchemaBuilder::new(ArrayType::Sparse)
        .set_domain(
            DomainBuilder::new()
                .add_dimension(DimensionBuilder::new::<i32>("d", [0, 999], 100).unwrap().build())
                .unwrap()
                .build(),
        )
        .add_attribute(AttributeBuilder::new("a", Datatype::Int32).build().unwrap())
        .unwrap()
        .build()
        .unwrap()
}

/// Create a dense 1-D array and return its context
pub fn dense_array(uri: &str) -> Context {
    let ctx = Context::new().unwrap();
    Array::create(&ctx, uri, &dense_1d_schema()).unwrap();
    ctx
}

/// Create a sparse 1-D array and return its context
pub fn sparse_array(uri: &str) -> Context {
    let ctx = Context::new().unwrap();
    Array::create(&ctx, uri, &sparse_1d_schema()).unwrap();
    ctx
}
