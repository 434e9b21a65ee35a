//! Config and context contracts

mod common;

use common::init_logging;
use tessera::{Config, Context, Error, Filesystem};

#[test]
fn config_set_then_get_roundtrips() {
    init_logging();
    let mut config = Config::new();
    for (key, value) in [
        ("sm.memory_budget", "1048576"),
        ("sm.dedup_coords", "true"),
        ("sm.check_coord_dups", "false"),
        ("vfs.min_parallel_size", "4096"),
    ] {
        config.set(key, value).unwrap();
        assert_eq!(config.get(key).unwrap(), value);
    }
}

#[test]
fn unknown_config_key_is_an_explicit_error() {
    init_logging();
    let mut config = Config::new();
    for result in [
        config.get("sm.not_a_key").map(|_| ()),
        config.set("sm.not_a_key", "1"),
        config.unset("sm.not_a_key"),
    ] {
        assert!(matches!(result.unwrap_err(), Error::InvalidParameter(_)));
    }
}

#[test]
fn config_file_roundtrip() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tessera.cfg");

    let mut config = Config::new();
    config.set("sm.memory_budget", "8192").unwrap();
    config.set("sm.dedup_coords", "true").unwrap();
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn config_effective_iteration_overlays_defaults() {
    init_logging();
    let mut config = Config::new();
    config.set("sm.dedup_coords", "true").unwrap();
    let effective: std::collections::BTreeMap<String, String> = config.iter().collect();
    assert_eq!(effective["sm.dedup_coords"], "true");
    assert_eq!(effective["sm.check_coord_dups"], "true");
    assert!(effective.len() >= 10);
}

#[test]
fn context_carries_config_into_the_engine() {
    init_logging();
    // A sparse write with duplicate coordinates errors under the
    // default parameters but dedups when asked to.
    use tessera::{Array, Layout, Mode, Query};

    let write_dups = |ctx: &Context, uri: &str| -> tessera::Result<()> {
        Array::create(ctx, uri, &common::sparse_1d_schema())?;
        let array = Array::open(ctx, uri, Mode::Write)?;
        let mut query = Query::new(&array, Mode::Write)?;
        query.set_layout(Layout::Unordered)?;
        query.set_data_buffer("d", &[1i32, 1])?;
        query.set_data_buffer("a", &[10i32, 11])?;
        query.submit()?;
        Ok(())
    };

    let strict = Context::new().unwrap();
    assert!(write_dups(&strict, "mem://dups").is_err());

    let mut config = Config::new();
    config.set("sm.dedup_coords", "true").unwrap();
    let lenient = Context::with_config(config).unwrap();
    write_dups(&lenient, "mem://dups").unwrap();
}

#[test]
fn context_stats_and_tags() {
    init_logging();
    let ctx = Context::new().unwrap();
    ctx.set_tag("x-client", "integration-suite");
    let stats = ctx.stats().unwrap();
    assert!(stats.contains("integration-suite"));
    assert!(stats.contains("read_submits"));

    assert!(ctx.is_supported_filesystem(Filesystem::Mem));
    assert!(!ctx.is_supported_filesystem(Filesystem::Azure));
    assert!(!ctx.is_supported_filesystem(Filesystem::Gcs));
}
