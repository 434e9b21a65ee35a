//! The read protocol end to end
//!
//! Write cells through a write query, read them back through chunked
//! read submits, and check that Incomplete is a normal protocol step:
//! undersized buffers yield Incomplete with partial results, enlarging
//! and resubmitting continues the same logical query, and the byte
//! totals add up.

mod common;

use common::{dense_array, init_logging, sparse_array};
use tessera::{Array, Layout, Mode, Query, QueryCondition, QueryStatus, Subarray};

#[test]
fn incomplete_then_completed_accounts_for_all_bytes() {
    init_logging();
    let ctx = dense_array("mem://proto");

    // Write 100 int32 cells.
    {
        let array = Array::open(&ctx, "mem://proto", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query
            .set_data_buffer("a", &(0..100).collect::<Vec<i32>>())
            .unwrap();
        assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    }

    // Read back with a 10-element buffer four times, then a 60-element
    // buffer: four Incompletes, one Completed, 400 bytes in total.
    let array = Array::open(&ctx, "mem://proto", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();

    let mut collected: Vec<i32> = Vec::new();
    let mut total_bytes = 0u64;
    for round in 0..4 {
        query.set_data_buffer("a", &vec![0i32; 10]).unwrap();
        let status = query.submit().unwrap();
        assert_eq!(status, QueryStatus::Incomplete, "round {round}");
        assert_eq!(query.result_cell_count(), 10);
        let chunk = query.result_data::<i32>("a").unwrap();
        total_bytes += (chunk.len() * 4) as u64;
        collected.extend(chunk);
    }
    query.set_data_buffer("a", &vec![0i32; 60]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    let chunk = query.result_data::<i32>("a").unwrap();
    total_bytes += (chunk.len() * 4) as u64;
    collected.extend(chunk);

    assert_eq!(total_bytes, 400);
    assert_eq!(collected, (0..100).collect::<Vec<i32>>());
    assert!(query.has_results());
}

#[test]
fn zero_fit_submit_reports_zero_sizes_not_an_error() {
    init_logging();
    let ctx = dense_array("mem://zero");
    {
        let array = Array::open(&ctx, "mem://zero", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query
            .set_data_buffer("a", &(0..100).collect::<Vec<i32>>())
            .unwrap();
        query.submit().unwrap();
    }

    let array = Array::open(&ctx, "mem://zero", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    // An empty buffer cannot hold any cell; the submit still succeeds.
    query.set_data_buffer::<i32>("a", &[]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Incomplete);
    assert_eq!(query.result_cell_count(), 0);
    assert!(query.result_data::<i32>("a").unwrap().is_empty());
}

#[test]
fn subarray_read_returns_the_requested_box() {
    init_logging();
    let ctx = dense_array("mem://box");
    {
        let array = Array::open(&ctx, "mem://box", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query
            .set_data_buffer("a", &(1..=100).collect::<Vec<i32>>())
            .unwrap();
        query.submit().unwrap();
    }

    let array = Array::open(&ctx, "mem://box", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    let subarray = Subarray::new(&array)
        .unwrap()
        .add_range(0, 11i32, 20i32)
        .unwrap();
    query.set_subarray(subarray).unwrap();
    query.set_data_buffer("a", &vec![0i32; 10]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(
        query.result_data::<i32>("a").unwrap(),
        (11..=20).collect::<Vec<i32>>()
    );

    // The subarray accessor returns a read-only snapshot: mutating it
    // does not disturb the bound subarray.
    let snapshot = query.subarray().unwrap();
    drop(snapshot.add_range(0, 1i32, 100i32).unwrap());
    assert_eq!(query.subarray().unwrap().range_num(0).unwrap(), 1);
}

#[test]
fn est_result_size_covers_the_subarray() {
    init_logging();
    let ctx = dense_array("mem://est");
    let array = Array::open(&ctx, "mem://est", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    let subarray = Subarray::new(&array)
        .unwrap()
        .add_range(0, 1i32, 25i32)
        .unwrap();
    query.set_subarray(subarray).unwrap();
    query.set_data_buffer("a", &vec![0i32; 25]).unwrap();
    let est = query.est_result_size("a").unwrap();
    assert_eq!(est.data_bytes, 100);
}

#[test]
fn sparse_condition_read_drops_cells() {
    init_logging();
    let ctx = sparse_array("mem://cond");
    {
        let array = Array::open(&ctx, "mem://cond", Mode::Write).unwrap();
        let mut query = Query::new(&array, Mode::Write).unwrap();
        query.set_layout(Layout::Unordered).unwrap();
        query.set_data_buffer("d", &[1i32, 2, 3, 4]).unwrap();
        query.set_data_buffer("a", &[5i32, 50, 15, 40]).unwrap();
        query.submit().unwrap();
    }

    let array = Array::open(&ctx, "mem://cond", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    query
        .set_condition(QueryCondition::ge("a", 40i32))
        .unwrap();
    query.set_data_buffer("d", &vec![0i32; 8]).unwrap();
    query.set_data_buffer("a", &vec![0i32; 8]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(query.result_data::<i32>("d").unwrap(), vec![2, 4]);
    assert_eq!(query.result_data::<i32>("a").unwrap(), vec![50, 40]);
}

#[test]
fn global_order_write_requires_finalize() {
    init_logging();
    let ctx = sparse_array("mem://global");
    let array = Array::open(&ctx, "mem://global", Mode::Write).unwrap();
    let mut query = Query::new(&array, Mode::Write).unwrap();
    query.set_layout(Layout::GlobalOrder).unwrap();

    // Two staged submits, one fragment after finalize.
    query.set_data_buffer("d", &[1i32, 2]).unwrap();
    query.set_data_buffer("a", &[10i32, 20]).unwrap();
    assert_eq!(query.submit().unwrap(), QueryStatus::Completed);
    assert_eq!(query.fragment_num().unwrap(), 0);

    query.set_data_buffer("d", &[3i32]).unwrap();
    query.set_data_buffer("a", &[30i32]).unwrap();
    query.submit().unwrap();
    assert_eq!(query.fragment_num().unwrap(), 0);

    query.finalize().unwrap();
    assert_eq!(query.fragment_num().unwrap(), 1);
    let uri = query.fragment_uri(0).unwrap();
    assert!(uri.starts_with("mem://global/"));
    let (t0, t1) = query.fragment_timestamp_range(0).unwrap();
    assert_eq!(t0, t1);
    drop(query);
    drop(array);

    // All three staged cells landed.
    let array = Array::open(&ctx, "mem://global", Mode::Read).unwrap();
    let mut query = Query::new(&array, Mode::Read).unwrap();
    query.set_data_buffer("d", &vec![0i32; 8]).unwrap();
    query.set_data_buffer("a", &vec![0i32; 8]).unwrap();
    query.submit().unwrap();
    assert_eq!(query.result_data::<i32>("d").unwrap(), vec![1, 2, 3]);
    assert_eq!(query.result_data::<i32>("a").unwrap(), vec![10, 20, 30]);
}

#[test]
fn fragment_introspection_requires_a_submit() {
    init_logging();
    let ctx = sparse_array("mem://frag");
    let array = Array::open(&ctx, "mem://frag", Mode::Write).unwrap();
    let mut query = Query::new(&array, Mode::Write).unwrap();
    query.set_data_buffer("d", &[1i32]).unwrap();
    query.set_data_buffer("a", &[1i32]).unwrap();
    assert!(query.fragment_num().is_err());
    query.submit().unwrap();
    assert_eq!(query.fragment_num().unwrap(), 1);
}

#[test]
fn query_type_must_match_open_mode() {
    init_logging();
    let ctx = sparse_array("mem://modes");
    let array = Array::open(&ctx, "mem://modes", Mode::Read).unwrap();
    assert!(Query::new(&array, Mode::Write).is_err());
    drop(array);

    let array = Array::open(&ctx, "mem://modes", Mode::ModifyExclusive).unwrap();
    // An exclusive handle admits write-family queries.
    assert!(Query::new(&array, Mode::Write).is_ok());
    assert!(Query::new(&array, Mode::Read).is_err());
}
