//! Dictionary-encoded categorical value sets
//!
//! An enumeration is a named, fixed set of values referenced by
//! attributes: the attribute stores integral indices into the set.
//! Extension is append-only — existing value-to-index mappings are never
//! disturbed.

use serde::{Deserialize, Serialize};

use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::types::CellValNum;

/// Packed enumeration values plus ordering metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationData {
    /// Enumeration name, unique within a schema
    pub name: String,
    /// Value datatype
    pub datatype: Datatype,
    /// Values per entry; `Var` for string enumerations
    pub cell_val_num: CellValNum,
    /// Whether entry order is semantically meaningful (admits range
    /// comparisons against the dictionary)
    pub ordered: bool,
    /// Packed value bytes
    pub data: Vec<u8>,
    /// Byte offsets of each entry into `data`; present iff variable-length
    pub offsets: Option<Vec<u64>>,
}

impl EnumerationData {
    /// Build a variable-length string enumeration from entries
    pub fn from_strings(
        name: impl Into<String>,
        ordered: bool,
        entries: &[&str],
    ) -> EnumerationData {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(entries.len());
        for e in entries {
            offsets.push(data.len() as u64);
            data.extend_from_slice(e.as_bytes());
        }
        EnumerationData {
            name: name.into(),
            datatype: Datatype::StringUtf8,
            cell_val_num: CellValNum::Var,
            ordered,
            data,
            offsets: Some(offsets),
        }
    }

    /// Number of entries
    pub fn value_count(&self) -> u64 {
        match (&self.offsets, self.cell_val_num.fixed()) {
            (Some(offsets), _) => offsets.len() as u64,
            (None, Some(n)) => {
                let cell = self.datatype.size() * n as u64;
                if cell == 0 {
                    0
                } else {
                    self.data.len() as u64 / cell
                }
            }
            (None, None) => 0,
        }
    }

    /// Raw bytes of the entry at `index`
    pub fn value_bytes(&self, index: u64) -> Option<&[u8]> {
        match &self.offsets {
            Some(offsets) => {
                let start = *offsets.get(index as usize)? as usize;
                let end = offsets
                    .get(index as usize + 1)
                    .map(|o| *o as usize)
                    .unwrap_or(self.data.len());
                self.data.get(start..end)
            }
            None => {
                let cell = (self.datatype.size() * self.cell_val_num.fixed()? as u64) as usize;
                let start = index as usize * cell;
                self.data.get(start..start + cell)
            }
        }
    }

    /// Index of the entry whose bytes equal `needle`
    pub fn index_of(&self, needle: &[u8]) -> Option<u64> {
        (0..self.value_count()).find(|i| self.value_bytes(*i) == Some(needle))
    }

    /// Validate shape and uniqueness
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Engine("enumeration name must not be empty".into()));
        }
        match (&self.offsets, self.cell_val_num) {
            (Some(offsets), CellValNum::Var) => {
                let mut prev = 0u64;
                for off in offsets {
                    if *off < prev || *off as usize > self.data.len() {
                        return Err(Error::Engine(format!(
                            "enumeration '{}' has malformed offsets",
                            self.name
                        )));
                    }
                    prev = *off;
                }
            }
            (None, CellValNum::Fixed(n)) => {
                let cell = self.datatype.size() * n as u64;
                if cell == 0 || self.data.len() as u64 % cell != 0 {
                    return Err(Error::Engine(format!(
                        "enumeration '{}' data is not a whole number of entries",
                        self.name
                    )));
                }
            }
            _ => {
                return Err(Error::Engine(format!(
                    "enumeration '{}' offsets do not match its cell layout",
                    self.name
                )));
            }
        }
        for i in 0..self.value_count() {
            for j in 0..i {
                if self.value_bytes(i) == self.value_bytes(j) {
                    return Err(Error::Engine(format!(
                        "enumeration '{}' contains a duplicate entry",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Append entries, preserving every existing value-to-index mapping
    ///
    /// The appended data must share this enumeration's datatype layout.
    /// For ordered enumerations the appended entries must sort after the
    /// existing tail, since extension must not disturb the order already
    /// relied upon.
    pub fn extend(&self, data: &[u8], offsets: Option<&[u64]>) -> Result<EnumerationData> {
        let mut extended = self.clone();
        match (&mut extended.offsets, offsets) {
            (Some(existing), Some(added)) => {
                let base = extended.data.len() as u64;
                for off in added {
                    existing.push(base + off);
                }
            }
            (None, None) => {
                let cell = self.datatype.size() * self.cell_val_num.fixed().unwrap_or(1) as u64;
                if data.len() as u64 % cell != 0 {
                    return Err(Error::Engine(format!(
                        "enumeration '{}' extension is not a whole number of entries",
                        self.name
                    )));
                }
            }
            _ => {
                return Err(Error::Engine(format!(
                    "enumeration '{}' extension layout does not match",
                    self.name
                )));
            }
        }
        extended.data.extend_from_slice(data);
        extended.check()?;
        if self.ordered {
            let old_count = self.value_count();
            for i in old_count..extended.value_count() {
                let prev = if i == 0 { None } else { extended.value_bytes(i - 1) };
                if let (Some(prev), Some(cur)) = (prev, extended.value_bytes(i)) {
                    if cur <= prev {
                        return Err(Error::Engine(format!(
                            "ordered enumeration '{}' extension must sort after existing entries",
                            self.name
                        )));
                    }
                }
            }
        }
        Ok(extended)
    }
}
