//! Array schemas and their builder
//!
//! A schema is built once through [`Builder`], checked at
//! [`Builder::build`], and immutable afterwards — an unchecked schema is
//! never handed out, and array creation re-runs the check inside the
//! engine.

use std::sync::Arc;

use tessera_core::{ArrayType, Error, Layout, Result, SchemaData};

use super::attribute::Attribute;
use super::domain::Domain;
use super::enumeration::Enumeration;

/// An immutable, checked array schema
#[derive(Debug, Clone)]
pub struct Schema {
    data: Arc<SchemaData>,
}

impl Schema {
    pub(crate) fn from_data(data: Arc<SchemaData>) -> Schema {
        Schema { data }
    }

    pub(crate) fn data(&self) -> &Arc<SchemaData> {
        &self.data
    }

    /// Dense or sparse
    pub fn array_type(&self) -> ArrayType {
        self.data.array_type
    }

    /// The coordinate space
    pub fn domain(&self) -> Domain {
        Domain::from_data(self.data.domain.clone())
    }

    /// Number of attributes
    pub fn attribute_num(&self) -> u32 {
        self.data.attributes.len() as u32
    }

    /// Attribute at `index`
    pub fn attribute(&self, index: u32) -> Result<Attribute> {
        self.data
            .attributes
            .get(index as usize)
            .cloned()
            .map(Attribute::from_data)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "attribute index {index} out of bounds ({} attributes)",
                    self.data.attributes.len()
                ))
            })
    }

    /// Attribute by name
    pub fn attribute_by_name(&self, name: &str) -> Result<Attribute> {
        self.data
            .attribute(name)
            .cloned()
            .map(Attribute::from_data)
            .ok_or_else(|| Error::NotFound(format!("attribute '{name}'")))
    }

    /// True when `name` is an attribute
    pub fn has_attribute(&self, name: &str) -> bool {
        self.data.is_attribute(name)
    }

    /// Enumeration by name
    pub fn enumeration(&self, name: &str) -> Result<Enumeration> {
        self.data
            .enumeration(name)
            .cloned()
            .map(Enumeration::from_data)
            .ok_or_else(|| Error::NotFound(format!("enumeration '{name}'")))
    }

    /// Cell order within a tile
    pub fn cell_order(&self) -> Layout {
        self.data.cell_order
    }

    /// Tile order within the array
    pub fn tile_order(&self) -> Layout {
        self.data.tile_order
    }

    /// Sparse tile capacity in cells
    pub fn capacity(&self) -> u64 {
        self.data.capacity
    }

    /// Whether duplicate coordinates are allowed
    pub fn allows_duplicates(&self) -> bool {
        self.data.allows_duplicates
    }

    /// Schema format version
    pub fn version(&self) -> u32 {
        self.data.version
    }
}

/// Builder for a [`Schema`]
#[derive(Debug)]
pub struct Builder {
    data: SchemaData,
}

impl Builder {
    /// Fresh builder for an array of the given type
    pub fn new(array_type: ArrayType) -> Builder {
        Builder {
            data: SchemaData::new(array_type),
        }
    }

    /// Set the coordinate space
    pub fn set_domain(mut self, domain: Domain) -> Builder {
        self.data.domain = domain.data().clone();
        self
    }

    /// Append an attribute, failing fast on a duplicate name
    pub fn add_attribute(mut self, attribute: Attribute) -> Result<Builder> {
        if self.data.attribute(attribute.name()).is_some() {
            return Err(Error::Engine(format!(
                "duplicate attribute name '{}'",
                attribute.name()
            )));
        }
        self.data.attributes.push(attribute.data().clone());
        Ok(self)
    }

    /// Register an enumeration for attributes to bind
    pub fn add_enumeration(mut self, enumeration: Enumeration) -> Result<Builder> {
        if self.data.enumeration(enumeration.name()).is_some() {
            return Err(Error::Engine(format!(
                "duplicate enumeration name '{}'",
                enumeration.name()
            )));
        }
        self.data.enumerations.push(enumeration.data().clone());
        Ok(self)
    }

    /// Set the cell order
    pub fn set_cell_order(mut self, order: Layout) -> Result<Builder> {
        if !order.is_valid_cell_order() {
            return Err(Error::Engine(format!("{order} is not a valid cell order")));
        }
        self.data.cell_order = order;
        Ok(self)
    }

    /// Set the tile order
    pub fn set_tile_order(mut self, order: Layout) -> Result<Builder> {
        if !order.is_valid_tile_order() {
            return Err(Error::Engine(format!("{order} is not a valid tile order")));
        }
        self.data.tile_order = order;
        Ok(self)
    }

    /// Set the sparse tile capacity
    pub fn set_capacity(mut self, capacity: u64) -> Result<Builder> {
        if capacity == 0 {
            return Err(Error::Engine("tile capacity must be nonzero".into()));
        }
        self.data.capacity = capacity;
        Ok(self)
    }

    /// Allow duplicate coordinates (sparse only, checked at build)
    pub fn set_allows_duplicates(mut self, allow: bool) -> Builder {
        self.data.allows_duplicates = allow;
        self
    }

    /// Run the full schema check and finish
    ///
    /// Never returns an unchecked schema.
    pub fn build(self) -> Result<Schema> {
        self.data.check()?;
        Ok(Schema {
            data: Arc::new(self.data),
        })
    }
}
