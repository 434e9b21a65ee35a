//! Typed key/value metadata
//!
//! Arrays and groups carry a metadata namespace separate from cell data:
//! string keys mapped to a small typed value (a datatype tag, a value
//! count and packed bytes). The closed primitive set plus UTF-8 strings
//! covers every representable value.

use serde::{Deserialize, Serialize};

use crate::datatype::{Datatype, PhysicalType};
use crate::error::{Error, Result};

/// One metadata value: tagged, counted, packed bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    /// Element datatype
    pub datatype: Datatype,
    /// Number of elements
    pub num: u32,
    /// Packed little-endian element bytes
    pub value: Vec<u8>,
}

impl MetadataValue {
    /// Pack a slice of primitive elements
    pub fn from_slice<T: PhysicalType>(values: &[T]) -> MetadataValue {
        let mut value = Vec::with_capacity(values.len() * T::SIZE);
        for v in values {
            v.write_le_bytes(&mut value);
        }
        MetadataValue {
            datatype: T::DATATYPE,
            num: values.len() as u32,
            value,
        }
    }

    /// Pack a UTF-8 string
    pub fn from_str(s: &str) -> MetadataValue {
        MetadataValue {
            datatype: Datatype::StringUtf8,
            num: s.len() as u32,
            value: s.as_bytes().to_vec(),
        }
    }

    /// View the value as a slice of primitive elements
    ///
    /// Fails with [`Error::TypeMismatch`] when the requested kind is not
    /// compatible with the stored datatype.
    pub fn as_slice<T: PhysicalType>(&self) -> Result<Vec<T>> {
        if !T::is_compatible(self.datatype) {
            return Err(Error::type_mismatch(
                "metadata",
                self.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self
            .value
            .chunks_exact(T::SIZE)
            .map(T::from_le_bytes)
            .collect())
    }

    /// View the value as a UTF-8 string
    pub fn as_str(&self) -> Result<&str> {
        if !self.datatype.is_string() {
            return Err(Error::type_mismatch(
                "metadata",
                "a string datatype",
                self.datatype.name(),
            ));
        }
        std::str::from_utf8(&self.value)
            .map_err(|e| Error::InvalidParameter(format!("metadata is not valid UTF-8: {e}")))
    }

    /// Validate the packed length against the tag and count
    pub fn check(&self) -> Result<()> {
        let expect = self.datatype.size() * self.num as u64;
        if self.value.len() as u64 != expect {
            return Err(Error::type_mismatch(
                "metadata",
                format!("{expect} bytes"),
                format!("{} bytes", self.value.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_roundtrip() {
        let m = MetadataValue::from_slice(&[1i32, 2, 3]);
        m.check().unwrap();
        assert_eq!(m.datatype, Datatype::Int32);
        assert_eq!(m.num, 3);
        assert_eq!(m.as_slice::<i32>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_string_roundtrip() {
        let m = MetadataValue::from_str("cortado");
        m.check().unwrap();
        assert_eq!(m.as_str().unwrap(), "cortado");
    }

    #[test]
    fn test_type_mismatch() {
        let m = MetadataValue::from_slice(&[1.5f64]);
        assert!(m.as_slice::<i32>().is_err());
        assert!(m.as_str().is_err());
    }

    #[test]
    fn test_length_check() {
        let m = MetadataValue {
            datatype: Datatype::Int32,
            num: 2,
            value: vec![0u8; 7],
        };
        assert!(m.check().is_err());
    }
}
