//! The context: capability token and engine owner
//!
//! A [`Context`] is created once per session and shared by every object
//! derived from it: arrays, queries, groups and the VFS all hold a
//! cloned context (an `Arc` over the engine), never the reverse.
//! Dropping the last holder releases the engine exactly once. Every
//! engine call returns `Result` with the failure message already
//! packaged, so there is no last-error state for callers to fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use tessera_core::{Error, Filesystem, Result};
use tessera_engine::params::EngineParams;
use tessera_engine::{StatsSnapshot, StorageEngine};

use crate::config::Config;

struct ContextInner {
    engine: Arc<StorageEngine>,
    config: Config,
    tags: RwLock<BTreeMap<String, String>>,
}

/// Shared handle to one storage engine instance
///
/// Cloning is cheap and shares the engine. The context is immutable
/// after construction except for diagnostic tags.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

/// Stats report: engine counters plus diagnostic tags
#[derive(Debug, Serialize)]
struct StatsReport<'a> {
    counters: StatsSnapshot,
    tags: &'a BTreeMap<String, String>,
}

impl Context {
    /// Context over an engine with default configuration
    pub fn new() -> Result<Context> {
        Context::with_config(Config::new())
    }

    /// Context over an engine seeded from `config`
    ///
    /// Configuration is fixed at construction; a failure to resolve the
    /// parameters is [`Error::Allocation`].
    pub fn with_config(config: Config) -> Result<Context> {
        let params = EngineParams::from_map(config.settings())
            .map_err(|e| Error::Allocation(format!("context construction failed: {e}")))?;
        let engine = Arc::new(StorageEngine::new(params));
        info!("context created");
        Ok(Context {
            inner: Arc::new(ContextInner {
                engine,
                config,
                tags: RwLock::new(BTreeMap::new()),
            }),
        })
    }

    /// The engine this context owns
    pub(crate) fn engine(&self) -> &Arc<StorageEngine> {
        &self.inner.engine
    }

    /// The configuration the context was built with
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Attach a diagnostic tag, reported through [`stats`](Self::stats)
    ///
    /// Tags are telemetry only; they never affect engine behavior.
    pub fn set_tag(&self, key: &str, value: &str) {
        self.inner
            .tags
            .write()
            .insert(key.to_string(), value.to_string());
    }

    /// True when the engine can serve the given filesystem kind
    pub fn is_supported_filesystem(&self, fs: Filesystem) -> bool {
        tessera_engine::vfs::is_supported(fs)
    }

    /// Engine counters and tags as a JSON document
    pub fn stats(&self) -> Result<String> {
        let tags = self.inner.tags.read();
        let report = StatsReport {
            counters: self.inner.engine.stats(),
            tags: &tags,
        };
        serde_json::to_string_pretty(&report)
            .map_err(|e| Error::Engine(format!("stats serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_clones_share_engine() {
        let ctx = Context::new().unwrap();
        let other = ctx.clone();
        assert!(Arc::ptr_eq(ctx.engine(), other.engine()));
    }

    #[test]
    fn test_invalid_config_is_allocation_error() {
        let mut config = Config::new();
        config.set("sm.encryption_type", "AES_256_GCM").unwrap();
        // A 32-byte key is required but absent.
        assert!(matches!(
            Context::with_config(config).unwrap_err(),
            Error::Allocation(_)
        ));
    }

    #[test]
    fn test_supported_filesystems() {
        let ctx = Context::new().unwrap();
        assert!(ctx.is_supported_filesystem(Filesystem::Mem));
        assert!(!ctx.is_supported_filesystem(Filesystem::S3));
        assert!(!ctx.is_supported_filesystem(Filesystem::Hdfs));
    }

    #[test]
    fn test_stats_include_tags() {
        let ctx = Context::new().unwrap();
        ctx.set_tag("client", "tessera-test");
        let stats = ctx.stats().unwrap();
        assert!(stats.contains("tessera-test"));
        assert!(stats.contains("arrays_created"));
    }
}
