//! Fragment introspection
//!
//! A [`FragmentInfo`] is a point-in-time load of an array's fragment
//! listing: per-fragment identity, kind, timestamp range, cell count and
//! size, plus the URIs superseded by consolidation and awaiting vacuum.

use tessera_core::{Error, Result};
use tessera_engine::FragmentMeta;

use crate::context::Context;

/// Loaded fragment listing of one array
pub struct FragmentInfo {
    fragments: Vec<FragmentMeta>,
    to_vacuum: Vec<String>,
}

impl FragmentInfo {
    /// Load the listing for the array at `uri`
    pub fn load(context: &Context, uri: &str) -> Result<FragmentInfo> {
        let (fragments, to_vacuum) = context.engine().fragment_info(uri)?;
        Ok(FragmentInfo {
            fragments,
            to_vacuum,
        })
    }

    /// Number of fragments
    pub fn fragment_num(&self) -> u64 {
        self.fragments.len() as u64
    }

    fn fragment(&self, idx: u64) -> Result<&FragmentMeta> {
        self.fragments.get(idx as usize).ok_or_else(|| {
            Error::InvalidParameter(format!("fragment index {idx} out of bounds"))
        })
    }

    /// URI of the `idx`-th fragment
    pub fn fragment_uri(&self, idx: u64) -> Result<&str> {
        Ok(&self.fragment(idx)?.uri)
    }

    /// True when the `idx`-th fragment holds sparse cells
    pub fn is_sparse(&self, idx: u64) -> Result<bool> {
        Ok(self.fragment(idx)?.sparse)
    }

    /// Timestamp range of the `idx`-th fragment
    pub fn timestamp_range(&self, idx: u64) -> Result<(u64, u64)> {
        Ok(self.fragment(idx)?.timestamp_range)
    }

    /// Cell count of the `idx`-th fragment
    pub fn cell_num(&self, idx: u64) -> Result<u64> {
        Ok(self.fragment(idx)?.cell_num)
    }

    /// Size estimate of the `idx`-th fragment in bytes
    pub fn fragment_size(&self, idx: u64) -> Result<u64> {
        Ok(self.fragment(idx)?.size_bytes)
    }

    /// Total cells across all fragments
    pub fn total_cell_num(&self) -> u64 {
        self.fragments.iter().map(|f| f.cell_num).sum()
    }

    /// Number of fragment URIs awaiting vacuum
    pub fn to_vacuum_num(&self) -> u64 {
        self.to_vacuum.len() as u64
    }

    /// Awaiting-vacuum URI at `idx`
    pub fn to_vacuum_uri(&self, idx: u64) -> Result<&str> {
        self.to_vacuum
            .get(idx as usize)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("vacuum index {idx} out of bounds"))
            })
    }
}
