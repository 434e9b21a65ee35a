//! Variable-length and nullable fields through the query surface

use tessera_api::{
    Array, ArrayType, AttributeBuilder, CellValNum, Context, Datatype, DimensionBuilder,
    DomainBuilder, Layout, Mode, Query, QueryStatus, SchemaBuilder,
};

fn var_schema() -> tessera_api::Schema {
    SchemaBuilder::new(ArrayType::Sparse)
        .set_domain(
            DomainBuilder::new()
                .add_dimension(DimensionBuilder::new::<i32>("d", [0, 99], 10).unwrap().build())
                .unwrap()
                .build(),
        )
        .add_attribute(
            AttributeBuilder::new("s", Datatype::StringUtf8)
                .set_cell_val_num(CellValNum::Var)
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap()
        .add_attribute(
            AttributeBuilder::new("n", Datatype::Float64)
                .set_nullable(true)
                .build()
                .unwrap(),
        )
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn var_length_and_nullable_roundtrip() {
    let ctx = Context::new().unwrap();
    Array::create(&ctx, "mem://var", &var_schema()).unwrap();

    // Three cells: "ab", "", "cdef"; n = [1.0, null, 3.0].
    {
        let array = Array::open(&ctx, "mem://var", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query.set_layout(Layout::Unordered).unwrap();
        query.set_data_buffer("d", &[10i32, 20, 30]).unwrap();
        query.set_data_buffer::<u8>("s", b"abcdef").unwrap();
        query.set_offsets_buffer("s", &[0, 2, 2]).unwrap();
        query.set_data_buffer("n", &[1.0f64, 0.0, 3.0]).unwrap();
        query.set_validity_buffer("n", &[1, 0, 1]).unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    }

    let array = Array::open(&ctx, "mem://var", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    query.set_data_buffer("d", &vec![0i32; 8]).unwrap();
    query.set_data_buffer::<u8>("s", &vec![0u8; 64]).unwrap();
    query.set_offsets_buffer("s", &vec![0u64; 8]).unwrap();
    query.set_data_buffer("n", &vec![0.0f64; 8]).unwrap();
    query.set_validity_buffer("n", &vec![0u8; 8]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(query.result_cell_count(), 3);

    assert_eq!(query.result_data::<i32>("d").unwrap(), vec![10, 20, 30]);
    let bytes = query.result_data::<u8>("s").unwrap();
    let offsets = query.result_offsets("s").unwrap();
    assert_eq!(bytes, b"abcdef");
    assert_eq!(offsets, vec![0, 2, 2]);
    assert_eq!(query.result_validity("n").unwrap(), vec![1, 0, 1]);
    let n = query.result_data::<f64>("n").unwrap();
    assert_eq!(n[0], 1.0);
    assert_eq!(n[2], 3.0);
}

#[test]
fn var_length_incomplete_respects_byte_capacity() {
    let ctx = Context::new().unwrap();
    Array::create(&ctx, "mem://var-inc", &var_schema()).unwrap();
    {
        let array = Array::open(&ctx, "mem://var-inc", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query.set_layout(Layout::Unordered).unwrap();
        query.set_data_buffer("d", &[1i32, 2]).unwrap();
        query.set_data_buffer::<u8>("s", b"shortmuchlongervalue").unwrap();
        query.set_offsets_buffer("s", &[0, 5]).unwrap();
        query.set_data_buffer("n", &[1.0f64, 2.0]).unwrap();
        query.set_validity_buffer("n", &[1, 1]).unwrap();
        query.submit().unwrap();
    }

    let array = Array::open(&ctx, "mem://var-inc", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    query.set_data_buffer("d", &vec![0i32; 4]).unwrap();
    // Room for the first cell's five bytes only.
    query.set_data_buffer::<u8>("s", &vec![0u8; 6]).unwrap();
    query.set_offsets_buffer("s", &vec![0u64; 4]).unwrap();
    query.set_data_buffer("n", &vec![0.0f64; 4]).unwrap();
    query.set_validity_buffer("n", &vec![0u8; 4]).unwrap();

    assert_eq!(query.submit().unwrap(), QueryStatus::Incomplete);
    assert_eq!(query.result_cell_count(), 1);
    assert_eq!(query.result_data::<u8>("s").unwrap(), b"short");

    // Enlarge and continue the same logical query.
    query.set_data_buffer::<u8>("s", &vec![0u8; 32]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(query.result_data::<u8>("s").unwrap(), b"muchlongervalue");
}

#[test]
fn dense_col_major_write_reads_back_row_major() {
    let ctx = Context::new().unwrap();
    let schema = SchemaBuilder::new(ArrayType::Dense)
        .set_domain(
            DomainBuilder::new()
                .add_dimension(DimensionBuilder::new::<i32>("r", [0, 1], 1).unwrap().build())
                .unwrap()
                .add_dimension(DimensionBuilder::new::<i32>("c", [0, 2], 1).unwrap().build())
                .unwrap()
                .build(),
        )
        .add_attribute(AttributeBuilder::new("a", Datatype::Int32).build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    Array::create(&ctx, "mem://2d", &schema).unwrap();

    // Column-major cells of the 2x3 box: (0,0) (1,0) (0,1) (1,1) (0,2) (1,2).
    {
        let array = Array::open(&ctx, "mem://2d", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query.set_layout(Layout::ColMajor).unwrap();
        query.set_data_buffer("a", &[1i32, 2, 3, 4, 5, 6]).unwrap();
        query.submit().unwrap();
    }

    let array = Array::open(&ctx, "mem://2d", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    query.set_data_buffer("a", &vec![0i32; 6]).unwrap();
    query.set_data_buffer("r", &vec![0i32; 6]).unwrap();
    query.set_data_buffer("c", &vec![0i32; 6]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(query.result_data::<i32>("a").unwrap(), vec![1, 3, 5, 2, 4, 6]);
    assert_eq!(query.result_data::<i32>("r").unwrap(), vec![0, 0, 0, 1, 1, 1]);
    assert_eq!(query.result_data::<i32>("c").unwrap(), vec![0, 1, 2, 0, 1, 2]);
}
