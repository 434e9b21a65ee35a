//! Engine tuning parameters
//!
//! The engine owns the table of known configuration keys, their defaults
//! and their value kinds. The client config layer consults this table so
//! that an unknown key or a malformed value is rejected up front with an
//! explicit error, never conflated with "not found".

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tessera_core::{EncryptionType, Error, Result};

/// Value kind of a parameter, used to validate `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `true` / `false`
    Bool,
    /// Unsigned integer
    U64,
    /// Free-form string
    Str,
    /// One of a fixed set of names
    Enum(&'static [&'static str]),
}

/// Specification of one known parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Default value, always parseable under `kind`
    pub default: &'static str,
    /// Value kind
    pub kind: ParamKind,
}

static KNOWN_PARAMS: Lazy<BTreeMap<&'static str, ParamSpec>> = Lazy::new(|| {
    let mut m = BTreeMap::new();
    let mut p = |key, default, kind| {
        m.insert(key, ParamSpec { default, kind });
    };
    p("sm.memory_budget", "5368709120", ParamKind::U64);
    p("sm.tile_cache_size", "10000000", ParamKind::U64);
    p("sm.check_coord_bounds", "true", ParamKind::Bool);
    p("sm.check_coord_dups", "true", ParamKind::Bool);
    p("sm.dedup_coords", "false", ParamKind::Bool);
    p("sm.check_global_order", "true", ParamKind::Bool);
    p("sm.consolidation.buffer_size", "50000000", ParamKind::U64);
    p("sm.consolidation.step_min_frags", "2", ParamKind::U64);
    p("sm.encryption_type", "NO_ENCRYPTION", ParamKind::Enum(&["NO_ENCRYPTION", "AES_256_GCM"]));
    p("sm.encryption_key", "", ParamKind::Str);
    p("sm.var_offsets.bitsize", "64", ParamKind::U64);
    p("sm.var_offsets.extra_element", "false", ParamKind::Bool);
    p("vfs.min_parallel_size", "10485760", ParamKind::U64);
    p("vfs.file.posix_permissions", "644", ParamKind::Str);
    m
});

/// The full table of known parameters
pub fn known_params() -> &'static BTreeMap<&'static str, ParamSpec> {
    &KNOWN_PARAMS
}

/// Look up one parameter spec; unknown keys are an explicit error
pub fn param_spec(key: &str) -> Result<&'static ParamSpec> {
    KNOWN_PARAMS
        .get(key)
        .ok_or_else(|| Error::InvalidParameter(format!("unknown config parameter '{key}'")))
}

/// Validate a value for a known parameter
pub fn validate_value(key: &str, value: &str) -> Result<()> {
    let spec = param_spec(key)?;
    let ok = match spec.kind {
        ParamKind::Bool => matches!(value, "true" | "false"),
        ParamKind::U64 => value.parse::<u64>().is_ok(),
        ParamKind::Str => true,
        ParamKind::Enum(allowed) => allowed.contains(&value),
    };
    if !ok {
        return Err(Error::InvalidParameter(format!(
            "value '{value}' is not valid for config parameter '{key}'"
        )));
    }
    Ok(())
}

/// Parsed engine parameters, resolved from a key/value map overlaid on
/// the defaults
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Byte budget a single read submit may occupy
    pub memory_budget: u64,
    /// Reject out-of-domain coordinates on sparse writes
    pub check_coord_bounds: bool,
    /// Reject duplicate coordinates within one sparse write
    pub check_coord_dups: bool,
    /// Silently keep only the last cell per duplicated coordinate
    pub dedup_coords: bool,
    /// At-rest encryption selection
    pub encryption_type: EncryptionType,
    /// Key material for encrypted arrays
    pub encryption_key: Vec<u8>,
}

impl EngineParams {
    /// Resolve parameters from explicit settings over the defaults
    pub fn from_map(settings: &BTreeMap<String, String>) -> Result<EngineParams> {
        let get = |key: &str| -> Result<String> {
            if let Some(v) = settings.get(key) {
                validate_value(key, v)?;
                return Ok(v.clone());
            }
            Ok(param_spec(key)?.default.to_string())
        };
        let encryption_type = match get("sm.encryption_type")?.as_str() {
            "AES_256_GCM" => EncryptionType::Aes256Gcm,
            _ => EncryptionType::NoEncryption,
        };
        let params = EngineParams {
            memory_budget: get("sm.memory_budget")?.parse().unwrap_or(u64::MAX),
            check_coord_bounds: get("sm.check_coord_bounds")? == "true",
            check_coord_dups: get("sm.check_coord_dups")? == "true",
            dedup_coords: get("sm.dedup_coords")? == "true",
            encryption_type,
            encryption_key: get("sm.encryption_key")?.into_bytes(),
        };
        if params.encryption_type == EncryptionType::Aes256Gcm
            && params.encryption_key.len() != 32
        {
            return Err(Error::InvalidParameter(
                "AES_256_GCM requires a 32-byte encryption key".into(),
            ));
        }
        Ok(params)
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        EngineParams::from_map(&BTreeMap::new()).expect("defaults always resolve")
    }
}
