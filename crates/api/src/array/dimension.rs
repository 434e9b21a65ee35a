//! Dimensions and their builder

use tessera_core::{CellValNum, Datatype, DimensionData, Error, PhysicalType, Result, to_le_bytes};

use crate::filter::FilterList;

/// An immutable dimension view
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    data: DimensionData,
}

impl Dimension {
    pub(crate) fn from_data(data: DimensionData) -> Dimension {
        Dimension { data }
    }

    pub(crate) fn data(&self) -> &DimensionData {
        &self.data
    }

    /// Dimension name
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Coordinate datatype
    pub fn datatype(&self) -> Datatype {
        self.data.datatype
    }

    /// Values per coordinate
    pub fn cell_val_num(&self) -> CellValNum {
        self.data.cell_val_num
    }

    /// True for variable-length string dimensions
    pub fn is_var(&self) -> bool {
        self.data.is_var()
    }

    /// Typed inclusive domain bounds; `None` for string dimensions
    pub fn domain<T: PhysicalType>(&self) -> Result<Option<(T, T)>> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self
            .data
            .domain
            .as_ref()
            .map(|(lo, hi)| (T::from_le_bytes(lo), T::from_le_bytes(hi))))
    }

    /// Typed tile extent; `None` for string dimensions
    pub fn tile_extent<T: PhysicalType>(&self) -> Result<Option<T>> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self.data.tile_extent.as_ref().map(|e| T::from_le_bytes(e)))
    }

    /// Coordinate filter pipeline
    pub fn filter_list(&self) -> FilterList {
        FilterList::from_data(self.data.filters.clone())
    }
}

/// Builder for a [`Dimension`]
///
/// Construction happens only through the builder; the built dimension
/// is read-only.
#[derive(Debug)]
pub struct Builder {
    data: DimensionData,
}

impl Builder {
    /// Fixed-size dimension with inclusive bounds and a tile extent
    ///
    /// `T` selects the coordinate datatype from the closed primitive
    /// set. Fails fast on an inverted domain or nonpositive extent.
    pub fn new<T: PhysicalType>(name: &str, domain: [T; 2], extent: T) -> Result<Builder> {
        let data = DimensionData {
            name: name.to_string(),
            datatype: T::DATATYPE,
            cell_val_num: CellValNum::single(),
            domain: Some((to_le_bytes(&[domain[0]]), to_le_bytes(&[domain[1]]))),
            tile_extent: Some(to_le_bytes(&[extent])),
            filters: Default::default(),
        };
        data.check()?;
        Ok(Builder { data })
    }

    /// Fixed-size dimension with an explicit non-canonical datatype
    ///
    /// For the datetime and time families, whose physical kind is `i64`
    /// but whose tag is not `Int64`.
    pub fn new_with_datatype<T: PhysicalType>(
        name: &str,
        datatype: Datatype,
        domain: [T; 2],
        extent: T,
    ) -> Result<Builder> {
        if !T::is_compatible(datatype) {
            return Err(Error::type_mismatch(
                name,
                datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        let data = DimensionData {
            name: name.to_string(),
            datatype,
            cell_val_num: CellValNum::single(),
            domain: Some((to_le_bytes(&[domain[0]]), to_le_bytes(&[domain[1]]))),
            tile_extent: Some(to_le_bytes(&[extent])),
            filters: Default::default(),
        };
        data.check()?;
        Ok(Builder { data })
    }

    /// Variable-length ASCII string dimension
    ///
    /// String dimensions take no domain bounds or tile extent.
    pub fn string(name: &str) -> Result<Builder> {
        let data = DimensionData {
            name: name.to_string(),
            datatype: Datatype::StringAscii,
            cell_val_num: CellValNum::Var,
            domain: None,
            tile_extent: None,
            filters: Default::default(),
        };
        data.check()?;
        Ok(Builder { data })
    }

    /// Attach a coordinate filter pipeline
    pub fn set_filter_list(mut self, filters: FilterList) -> Result<Builder> {
        filters
            .data()
            .check_against(self.data.datatype, self.data.cell_val_num)?;
        self.data.filters = filters.data().clone();
        Ok(self)
    }

    /// Finish the dimension
    pub fn build(self) -> Dimension {
        Dimension { data: self.data }
    }
}

impl From<Builder> for Dimension {
    fn from(builder: Builder) -> Dimension {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_roundtrip() {
        let dim = Builder::new::<i32>("rows", [-100, 100], 10).unwrap().build();
        assert_eq!(dim.name(), "rows");
        assert_eq!(dim.datatype(), Datatype::Int32);
        assert_eq!(dim.domain::<i32>().unwrap(), Some((-100, 100)));
        assert_eq!(dim.tile_extent::<i32>().unwrap(), Some(10));
    }

    #[test]
    fn test_inverted_domain_fails_fast() {
        assert!(Builder::new::<i32>("rows", [10, -10], 5).is_err());
    }

    #[test]
    fn test_nonpositive_extent_fails_fast() {
        assert!(Builder::new::<i32>("rows", [0, 10], 0).is_err());
    }

    #[test]
    fn test_typed_accessor_mismatch() {
        let dim = Builder::new::<i32>("rows", [0, 10], 5).unwrap().build();
        assert!(dim.domain::<f64>().is_err());
    }

    #[test]
    fn test_datetime_dimension() {
        let dim = Builder::new_with_datatype::<i64>("ts", Datatype::DateTimeDay, [0, 3650], 30)
            .unwrap()
            .build();
        assert_eq!(dim.datatype(), Datatype::DateTimeDay);
        assert_eq!(dim.domain::<i64>().unwrap(), Some((0, 3650)));
    }

    #[test]
    fn test_string_dimension() {
        let dim = Builder::string("id").unwrap().build();
        assert!(dim.is_var());
        assert_eq!(dim.domain::<u8>().unwrap(), None);
    }
}
