//! Enumerations: dictionary-encoded categorical value sets

use tessera_core::{to_le_bytes, Datatype, EnumerationData, Error, PhysicalType, Result};

/// An immutable enumeration view
#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    data: EnumerationData,
}

impl Enumeration {
    pub(crate) fn from_data(data: EnumerationData) -> Enumeration {
        Enumeration { data }
    }

    pub(crate) fn data(&self) -> &EnumerationData {
        &self.data
    }

    /// Build a string enumeration from entries
    pub fn from_strings(name: &str, ordered: bool, entries: &[&str]) -> Result<Enumeration> {
        let data = EnumerationData::from_strings(name, ordered, entries);
        data.check()?;
        Ok(Enumeration { data })
    }

    /// Build a fixed-size enumeration from typed entries
    pub fn from_values<T: PhysicalType>(
        name: &str,
        ordered: bool,
        entries: &[T],
    ) -> Result<Enumeration> {
        let data = EnumerationData {
            name: name.to_string(),
            datatype: T::DATATYPE,
            cell_val_num: tessera_core::CellValNum::single(),
            ordered,
            data: to_le_bytes(entries),
            offsets: None,
        };
        data.check()?;
        Ok(Enumeration { data })
    }

    /// Enumeration name
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Entry datatype
    pub fn datatype(&self) -> Datatype {
        self.data.datatype
    }

    /// Whether entry order is semantically meaningful
    pub fn ordered(&self) -> bool {
        self.data.ordered
    }

    /// Number of entries
    pub fn value_count(&self) -> u64 {
        self.data.value_count()
    }

    /// Entries of a string enumeration
    pub fn values_str(&self) -> Result<Vec<String>> {
        if !self.data.datatype.is_string() {
            return Err(Error::type_mismatch(
                &self.data.name,
                "a string datatype",
                self.data.datatype.name(),
            ));
        }
        (0..self.data.value_count())
            .map(|i| {
                let bytes = self
                    .data
                    .value_bytes(i)
                    .ok_or_else(|| Error::Engine("enumeration entry out of bounds".into()))?;
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::InvalidParameter(format!("entry is not valid UTF-8: {e}")))
            })
            .collect()
    }

    /// Typed entries of a fixed-size enumeration
    pub fn values<T: PhysicalType>(&self) -> Result<Vec<T>> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self
            .data
            .data
            .chunks_exact(T::SIZE)
            .map(T::from_le_bytes)
            .collect())
    }

    /// Index of a string entry
    pub fn index_of_str(&self, entry: &str) -> Option<u64> {
        self.data.index_of(entry.as_bytes())
    }

    /// Index of a typed entry
    pub fn index_of<T: PhysicalType>(&self, entry: T) -> Option<u64> {
        self.data.index_of(&to_le_bytes(&[entry]))
    }

    /// Extended copy with string entries appended
    ///
    /// Existing value-to-index mappings are preserved; only the new
    /// entries receive new indices.
    pub fn extend_with_strings(&self, entries: &[&str]) -> Result<Enumeration> {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(entries.len());
        for e in entries {
            offsets.push(data.len() as u64);
            data.extend_from_slice(e.as_bytes());
        }
        Ok(Enumeration {
            data: self.data.extend(&data, Some(&offsets))?,
        })
    }

    /// Extended copy with typed entries appended
    pub fn extend_with_values<T: PhysicalType>(&self, entries: &[T]) -> Result<Enumeration> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(Enumeration {
            data: self.data.extend(&to_le_bytes(entries), None)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enumeration() {
        let e = Enumeration::from_strings("colors", false, &["red", "green"]).unwrap();
        assert_eq!(e.value_count(), 2);
        assert_eq!(e.values_str().unwrap(), vec!["red", "green"]);
        assert_eq!(e.index_of_str("green"), Some(1));
        assert_eq!(e.index_of_str("blue"), None);
    }

    #[test]
    fn test_typed_enumeration() {
        let e = Enumeration::from_values("levels", true, &[10i32, 20, 30]).unwrap();
        assert_eq!(e.values::<i32>().unwrap(), vec![10, 20, 30]);
        assert_eq!(e.index_of(20i32), Some(1));
        assert!(e.values::<f32>().is_err());
    }

    #[test]
    fn test_extension_preserves_indices() {
        let e = Enumeration::from_strings("colors", false, &["red", "green"]).unwrap();
        let extended = e.extend_with_strings(&["blue"]).unwrap();
        assert_eq!(extended.index_of_str("red"), Some(0));
        assert_eq!(extended.index_of_str("green"), Some(1));
        assert_eq!(extended.index_of_str("blue"), Some(2));
        // The original view is untouched.
        assert_eq!(e.value_count(), 2);
    }
}
