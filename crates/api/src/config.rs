//! Engine configuration
//!
//! A config is a string key/value map over the engine's table of known
//! tuning parameters. Unknown keys fail `get`, `set` and `unset` alike
//! with an explicit [`Error::InvalidParameter`] — absence is never
//! signalled by a bare missing value. A config is independently
//! constructible, seeds a [`Context`](crate::Context) at creation, and
//! round-trips through a simple `key value` file format.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use tessera_core::{Error, Result};
use tessera_engine::params::{known_params, param_spec, validate_value};

/// Key/value store of engine tuning parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    settings: BTreeMap<String, String>,
}

impl Config {
    /// Config with every parameter at its default
    pub fn new() -> Config {
        Config::default()
    }

    /// Effective value of a known parameter
    ///
    /// Explicit sets shadow the defaults.
    pub fn get(&self, key: &str) -> Result<String> {
        let spec = param_spec(key)?;
        Ok(self
            .settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| spec.default.to_string()))
    }

    /// Set a known parameter, validating the value's shape
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_value(key, value)?;
        self.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Reset a known parameter to its default
    pub fn unset(&mut self, key: &str) -> Result<()> {
        param_spec(key)?;
        self.settings.remove(key);
        Ok(())
    }

    /// Explicitly set parameters, for engine construction
    pub(crate) fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    /// Every effective parameter: defaults overlaid with explicit sets
    pub fn iter(&self) -> impl Iterator<Item = (String, String)> + '_ {
        known_params().iter().map(|(key, spec)| {
            let value = self
                .settings
                .get(*key)
                .cloned()
                .unwrap_or_else(|| spec.default.to_string());
            (key.to_string(), value)
        })
    }

    /// Load parameters from a `key value` file
    ///
    /// Blank lines and `#` comments are skipped. File problems are
    /// [`Error::Io`]; malformed lines and unknown keys are
    /// [`Error::Parse`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        let mut config = Config::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(char::is_whitespace).ok_or_else(|| {
                Error::Parse(format!("line {}: expected 'key value'", lineno + 1))
            })?;
            config
                .set(key, value.trim())
                .map_err(|e| Error::Parse(format!("line {}: {e}", lineno + 1)))?;
        }
        Ok(config)
    }

    /// Save the explicitly-set parameters to a `key value` file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = fs::File::create(path)?;
        for (key, value) in &self.settings {
            writeln!(file, "{key} {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_get_roundtrip() {
        let mut config = Config::new();
        config.set("sm.memory_budget", "1048576").unwrap();
        assert_eq!(config.get("sm.memory_budget").unwrap(), "1048576");
    }

    #[test]
    fn test_defaults_visible_through_get() {
        let config = Config::new();
        assert_eq!(config.get("sm.check_coord_bounds").unwrap(), "true");
    }

    #[test]
    fn test_unknown_key_fails_everywhere() {
        let mut config = Config::new();
        assert!(matches!(
            config.get("sm.bogus").unwrap_err(),
            Error::InvalidParameter(_)
        ));
        assert!(config.set("sm.bogus", "1").is_err());
        assert!(config.unset("sm.bogus").is_err());
    }

    #[test]
    fn test_unset_restores_default() {
        let mut config = Config::new();
        config.set("sm.dedup_coords", "true").unwrap();
        config.unset("sm.dedup_coords").unwrap();
        assert_eq!(config.get("sm.dedup_coords").unwrap(), "false");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.cfg");

        let mut config = Config::new();
        config.set("sm.memory_budget", "2048").unwrap();
        config.set("sm.dedup_coords", "true").unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_file_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.cfg");
        fs::write(&path, "# tuning\n\nsm.memory_budget 4096\n").unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.get("sm.memory_budget").unwrap(), "4096");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.cfg");
        fs::write(&path, "justakeywithoutvalue\n").unwrap();
        assert!(matches!(
            Config::load_from_file(&path).unwrap_err(),
            Error::Parse(_)
        ));

        fs::write(&path, "sm.unknown.key 1\n").unwrap();
        assert!(matches!(
            Config::load_from_file(&path).unwrap_err(),
            Error::Parse(_)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            Config::load_from_file("/no/such/config/file").unwrap_err(),
            Error::Io(_)
        ));
    }

    proptest! {
        // Every known key round-trips its own default through set/get.
        #[test]
        fn prop_known_keys_roundtrip(idx in 0usize..16) {
            let keys: Vec<&str> = known_params().keys().copied().collect();
            let key = keys[idx % keys.len()];
            let default = known_params()[key].default.to_string();
            let mut config = Config::new();
            config.set(key, &default).unwrap();
            prop_assert_eq!(config.get(key).unwrap(), default);
        }
    }
}
