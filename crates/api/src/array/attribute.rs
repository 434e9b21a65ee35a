//! Attributes and their builder

use tessera_core::{
    to_le_bytes, AttributeData, CellValNum, Datatype, Error, PhysicalType, Result,
};

use crate::filter::FilterList;

/// An immutable attribute view
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    data: AttributeData,
}

impl Attribute {
    pub(crate) fn from_data(data: AttributeData) -> Attribute {
        Attribute { data }
    }

    pub(crate) fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Value datatype
    pub fn datatype(&self) -> Datatype {
        self.data.datatype
    }

    /// Values per cell
    pub fn cell_val_num(&self) -> CellValNum {
        self.data.cell_val_num
    }

    /// Whether cells may be null
    pub fn nullable(&self) -> bool {
        self.data.nullable
    }

    /// Name of the bound enumeration
    ///
    /// `None` when no enumeration is bound — never an empty string
    /// standing in for absence.
    pub fn enumeration_name(&self) -> Option<&str> {
        self.data.enumeration.as_deref()
    }

    /// Typed fill value elements
    pub fn fill_value<T: PhysicalType>(&self) -> Result<Vec<T>> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self
            .data
            .fill_value
            .chunks_exact(T::SIZE)
            .map(T::from_le_bytes)
            .collect())
    }

    /// Validity flag accompanying the fill value
    pub fn fill_validity(&self) -> bool {
        self.data.fill_validity
    }

    /// Value filter pipeline
    pub fn filter_list(&self) -> FilterList {
        FilterList::from_data(self.data.filters.clone())
    }
}

/// Builder for an [`Attribute`]
#[derive(Debug)]
pub struct Builder {
    data: AttributeData,
}

impl Builder {
    /// Attribute of `datatype` with a single value per cell and the
    /// engine-default fill value
    pub fn new(name: &str, datatype: Datatype) -> Builder {
        Builder {
            data: AttributeData::new(name, datatype),
        }
    }

    /// Set the values-per-cell count
    ///
    /// The fill value is re-derived for the new cell shape unless a
    /// custom fill was already set; a fixed count of zero is rejected.
    pub fn set_cell_val_num(mut self, cell_val_num: CellValNum) -> Result<Builder> {
        if cell_val_num == CellValNum::Fixed(0) {
            return Err(Error::InvalidParameter(
                "cell value count must be at least 1".into(),
            ));
        }
        let was_default =
            self.data.fill_value == tessera_core::default_fill_value(self.data.datatype, self.data.cell_val_num);
        self.data.cell_val_num = cell_val_num;
        if was_default {
            self.data.fill_value =
                tessera_core::default_fill_value(self.data.datatype, cell_val_num);
        }
        Ok(self)
    }

    /// Mark the attribute nullable
    pub fn set_nullable(mut self, nullable: bool) -> Builder {
        self.data.nullable = nullable;
        self
    }

    /// Set the fill value from typed elements
    ///
    /// The element count must match the cell shape: exactly `n` for a
    /// fixed count of `n`, at least one for variable-length cells.
    pub fn set_fill_value<T: PhysicalType>(mut self, values: &[T]) -> Result<Builder> {
        if !T::is_compatible(self.data.datatype) {
            return Err(Error::type_mismatch(
                &self.data.name,
                self.data.datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        match self.data.cell_val_num {
            CellValNum::Fixed(n) if values.len() as u32 != n => {
                return Err(Error::type_mismatch(
                    &self.data.name,
                    format!("{n} fill elements"),
                    format!("{}", values.len()),
                ));
            }
            CellValNum::Var if values.is_empty() => {
                return Err(Error::InvalidParameter(
                    "variable-length fill value must hold at least one element".into(),
                ));
            }
            _ => {}
        }
        self.data.fill_value = to_le_bytes(values);
        Ok(self)
    }

    /// Set the fill value and its validity flag for a nullable attribute
    pub fn set_fill_value_nullable<T: PhysicalType>(
        mut self,
        values: &[T],
        valid: bool,
    ) -> Result<Builder> {
        if !self.data.nullable {
            return Err(Error::Engine(format!(
                "attribute '{}' is not nullable",
                self.data.name
            )));
        }
        self = self.set_fill_value(values)?;
        self.data.fill_validity = valid;
        Ok(self)
    }

    /// Attach a value filter pipeline, validated against the datatype
    pub fn set_filter_list(mut self, filters: FilterList) -> Result<Builder> {
        filters
            .data()
            .check_against(self.data.datatype, self.data.cell_val_num)?;
        self.data.filters = filters.data().clone();
        Ok(self)
    }

    /// Bind an enumeration by name, resolved at schema build
    pub fn set_enumeration_name(mut self, name: &str) -> Result<Builder> {
        if !self.data.datatype.is_integral() {
            return Err(Error::Engine(format!(
                "attribute '{}' cannot bind an enumeration: index datatype {} is not integral",
                self.data.name, self.data.datatype
            )));
        }
        self.data.enumeration = Some(name.to_string());
        Ok(self)
    }

    /// Finish the attribute, running its validation
    pub fn build(self) -> Result<Attribute> {
        self.data.check()?;
        Ok(Attribute { data: self.data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use tessera_core::FilterType;

    #[test]
    fn test_builder_defaults() {
        let attr = Builder::new("a", Datatype::Int32).build().unwrap();
        assert_eq!(attr.name(), "a");
        assert_eq!(attr.cell_val_num(), CellValNum::Fixed(1));
        assert!(!attr.nullable());
        assert_eq!(attr.enumeration_name(), None);
        assert_eq!(attr.fill_value::<i32>().unwrap(), vec![i32::MIN]);
    }

    #[test]
    fn test_fill_value_shape_enforced() {
        let builder = Builder::new("a", Datatype::Int32)
            .set_cell_val_num(CellValNum::Fixed(3))
            .unwrap();
        assert!(builder.set_fill_value(&[1i32, 2]).is_err());

        let attr = Builder::new("a", Datatype::Int32)
            .set_cell_val_num(CellValNum::Fixed(3))
            .unwrap()
            .set_fill_value(&[7i32, 8, 9])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(attr.fill_value::<i32>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_fill_value_type_mismatch() {
        assert!(Builder::new("a", Datatype::Int32)
            .set_fill_value(&[1.5f64])
            .is_err());
    }

    #[test]
    fn test_nullable_fill() {
        let attr = Builder::new("a", Datatype::Float64)
            .set_nullable(true)
            .set_fill_value_nullable(&[0.0f64], true)
            .unwrap()
            .build()
            .unwrap();
        assert!(attr.nullable());
        assert!(attr.fill_validity());

        assert!(Builder::new("a", Datatype::Float64)
            .set_fill_value_nullable(&[0.0f64], true)
            .is_err());
    }

    #[test]
    fn test_enumeration_binding_requires_integral() {
        assert!(Builder::new("a", Datatype::Float32)
            .set_enumeration_name("colors")
            .is_err());
        let attr = Builder::new("a", Datatype::UInt16)
            .set_enumeration_name("colors")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(attr.enumeration_name(), Some("colors"));
    }

    #[test]
    fn test_filter_compat_checked_on_attach() {
        let filters = crate::filter::FilterList::new()
            .add_filter(Filter::new(FilterType::ScaleFloat));
        assert!(Builder::new("a", Datatype::Int32)
            .set_filter_list(filters)
            .is_err());
    }
}
