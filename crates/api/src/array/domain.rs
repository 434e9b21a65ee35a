//! Domains and their builder

use tessera_core::{DomainData, Error, Result};

use super::dimension::Dimension;

/// An immutable ordered collection of dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    data: DomainData,
}

impl Domain {
    pub(crate) fn from_data(data: DomainData) -> Domain {
        Domain { data }
    }

    pub(crate) fn data(&self) -> &DomainData {
        &self.data
    }

    /// Number of dimensions
    pub fn ndim(&self) -> u32 {
        self.data.ndim()
    }

    /// Dimension at `index`
    pub fn dimension(&self, index: u32) -> Result<Dimension> {
        self.data
            .dimensions
            .get(index as usize)
            .cloned()
            .map(Dimension::from_data)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "dimension index {index} out of bounds ({} dimensions)",
                    self.data.ndim()
                ))
            })
    }

    /// Dimension by name
    pub fn dimension_by_name(&self, name: &str) -> Result<Dimension> {
        self.data
            .dimension(name)
            .cloned()
            .map(Dimension::from_data)
            .ok_or_else(|| Error::NotFound(format!("dimension '{name}'")))
    }

    /// True when a dimension named `name` exists
    pub fn has_dimension(&self, name: &str) -> bool {
        self.data.dimension(name).is_some()
    }
}

/// Builder for a [`Domain`]
#[derive(Debug, Default)]
pub struct Builder {
    data: DomainData,
}

impl Builder {
    /// Empty domain builder
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Append a dimension, failing fast on a duplicate name
    pub fn add_dimension(mut self, dimension: Dimension) -> Result<Builder> {
        if self.data.dimension(dimension.name()).is_some() {
            return Err(Error::Engine(format!(
                "duplicate dimension name '{}'",
                dimension.name()
            )));
        }
        self.data.dimensions.push(dimension.data().clone());
        Ok(self)
    }

    /// Finish the domain
    pub fn build(self) -> Domain {
        Domain { data: self.data }
    }
}

impl From<Builder> for Domain {
    fn from(builder: Builder) -> Domain {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::super::dimension::Builder as DimensionBuilder;
    use super::*;

    #[test]
    fn test_build_and_lookup() {
        let domain = Builder::new()
            .add_dimension(DimensionBuilder::new::<i32>("rows", [0, 9], 2).unwrap().build())
            .unwrap()
            .add_dimension(DimensionBuilder::new::<i32>("cols", [0, 9], 2).unwrap().build())
            .unwrap()
            .build();
        assert_eq!(domain.ndim(), 2);
        assert!(domain.has_dimension("rows"));
        assert_eq!(domain.dimension(1).unwrap().name(), "cols");
        assert!(domain.dimension(2).is_err());
        assert!(matches!(
            domain.dimension_by_name("depth").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_duplicate_dimension_fails_fast() {
        let result = Builder::new()
            .add_dimension(DimensionBuilder::new::<i32>("d", [0, 9], 2).unwrap().build())
            .unwrap()
            .add_dimension(DimensionBuilder::new::<i32>("d", [0, 9], 2).unwrap().build());
        assert!(result.is_err());
    }
}
