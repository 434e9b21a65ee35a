//! Array schema descriptors
//!
//! These are the plain data forms of a schema: dimensions, domain,
//! attributes and the schema itself. The API layer wraps them in
//! view/builder pairs; the engine consumes them directly. A schema is
//! only usable after [`SchemaData::check`] passes — builders run the
//! check before handing a schema out, and the engine re-runs it on array
//! creation.

use serde::{Deserialize, Serialize};

use crate::datatype::{Datatype, Scalar};
use crate::enumeration::EnumerationData;
use crate::error::{Error, Result};
use crate::filter::FilterListData;
use crate::types::{ArrayType, CellValNum, Layout};

/// Current schema format version
pub const FORMAT_VERSION: u32 = 1;

/// Default sparse tile capacity, in cells
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Fixed cell size in bytes, `None` when variable-length
pub fn cell_size(datatype: Datatype, cell_val_num: CellValNum) -> Option<u64> {
    cell_val_num.fixed().map(|n| datatype.size() * n as u64)
}

/// Engine default fill value for one cell of the given shape
///
/// Signed integers fill with their minimum, unsigned with their maximum,
/// floats with NaN, everything else with zero bytes. Variable-length
/// cells default to a single element.
pub fn default_fill_value(datatype: Datatype, cell_val_num: CellValNum) -> Vec<u8> {
    let one = match datatype {
        Datatype::Int8 | Datatype::Char => (i8::MIN).to_le_bytes().to_vec(),
        Datatype::Int16 => i16::MIN.to_le_bytes().to_vec(),
        Datatype::Int32 => i32::MIN.to_le_bytes().to_vec(),
        Datatype::Int64 => i64::MIN.to_le_bytes().to_vec(),
        Datatype::UInt8 => u8::MAX.to_le_bytes().to_vec(),
        Datatype::UInt16 => u16::MAX.to_le_bytes().to_vec(),
        Datatype::UInt32 => u32::MAX.to_le_bytes().to_vec(),
        Datatype::UInt64 => u64::MAX.to_le_bytes().to_vec(),
        Datatype::Float32 => f32::NAN.to_le_bytes().to_vec(),
        Datatype::Float64 => f64::NAN.to_le_bytes().to_vec(),
        d if d.is_datetime() || d.is_time() => i64::MIN.to_le_bytes().to_vec(),
        d => vec![0u8; d.size() as usize],
    };
    match cell_val_num {
        CellValNum::Var => one,
        CellValNum::Fixed(n) => one.repeat(n as usize),
    }
}

/// One dimension of the coordinate space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionData {
    /// Dimension name, unique within the domain
    pub name: String,
    /// Coordinate datatype
    pub datatype: Datatype,
    /// Values per coordinate; `Var` only for ASCII string dimensions
    pub cell_val_num: CellValNum,
    /// Inclusive lower/upper bounds as raw little-endian elements;
    /// `None` for string dimensions, whose domain is unbounded
    pub domain: Option<(Vec<u8>, Vec<u8>)>,
    /// Space tile extent as one raw element; `None` for string dimensions
    pub tile_extent: Option<Vec<u8>>,
    /// Coordinate filter pipeline
    pub filters: FilterListData,
}

impl DimensionData {
    /// Decoded inclusive bounds
    pub fn bounds(&self) -> Result<Option<(Scalar, Scalar)>> {
        match &self.domain {
            None => Ok(None),
            Some((lo, hi)) => Ok(Some((
                Scalar::from_le_bytes(self.datatype, lo)?,
                Scalar::from_le_bytes(self.datatype, hi)?,
            ))),
        }
    }

    /// True for variable-length string dimensions
    pub fn is_var(&self) -> bool {
        self.cell_val_num.is_var()
    }

    /// Validate this dimension in isolation
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Engine("dimension name must not be empty".into()));
        }
        if !self.datatype.is_allowed_on_dimension() {
            return Err(Error::Engine(format!(
                "datatype {} is not allowed on a dimension",
                self.datatype
            )));
        }
        if self.datatype == Datatype::StringAscii {
            if !self.cell_val_num.is_var() {
                return Err(Error::Engine(
                    "string dimensions must be variable-length".into(),
                ));
            }
            if self.domain.is_some() || self.tile_extent.is_some() {
                return Err(Error::Engine(
                    "string dimensions take no domain bounds or tile extent".into(),
                ));
            }
        } else {
            if self.cell_val_num != CellValNum::Fixed(1) {
                return Err(Error::Engine(
                    "non-string dimensions must have exactly one value per cell".into(),
                ));
            }
            let (lo, hi) = self
                .domain
                .as_ref()
                .ok_or_else(|| Error::Engine(format!("dimension '{}' has no domain", self.name)))?;
            let lo = Scalar::from_le_bytes(self.datatype, lo)?;
            let hi = Scalar::from_le_bytes(self.datatype, hi)?;
            if lo.cmp_same_class(&hi) == std::cmp::Ordering::Greater {
                return Err(Error::Engine(format!(
                    "dimension '{}' lower bound exceeds upper bound",
                    self.name
                )));
            }
            if let Some(extent) = &self.tile_extent {
                let extent = Scalar::from_le_bytes(self.datatype, extent)?;
                let positive = match extent {
                    Scalar::Int(v) => v > 0,
                    Scalar::UInt(v) => v > 0,
                    Scalar::Float(v) => v > 0.0,
                };
                if !positive {
                    return Err(Error::Engine(format!(
                        "dimension '{}' tile extent must be positive",
                        self.name
                    )));
                }
            }
        }
        self.filters.check_against(self.datatype, self.cell_val_num)
    }
}

/// Ordered collection of dimensions defining the coordinate space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DomainData {
    /// Dimensions in index order
    pub dimensions: Vec<DimensionData>,
}

impl DomainData {
    /// Number of dimensions
    pub fn ndim(&self) -> u32 {
        self.dimensions.len() as u32
    }

    /// Look up a dimension by name
    pub fn dimension(&self, name: &str) -> Option<&DimensionData> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Index of a dimension by name
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    /// Validate the domain in isolation
    pub fn check(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(Error::Engine("domain has no dimensions".into()));
        }
        for dim in &self.dimensions {
            dim.check()?;
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(Error::Engine(format!(
                    "duplicate dimension name '{}'",
                    dim.name
                )));
            }
        }
        Ok(())
    }
}

/// One named attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeData {
    /// Attribute name, unique within the schema
    pub name: String,
    /// Value datatype
    pub datatype: Datatype,
    /// Values per cell
    pub cell_val_num: CellValNum,
    /// Whether cells may be null
    pub nullable: bool,
    /// Fill value bytes for unwritten dense cells
    pub fill_value: Vec<u8>,
    /// Validity flag accompanying the fill value, for nullable attributes
    pub fill_validity: bool,
    /// Name of a bound enumeration, if any
    pub enumeration: Option<String>,
    /// Value filter pipeline
    pub filters: FilterListData,
}

impl AttributeData {
    /// Plain attribute with engine-default fill value
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        AttributeData {
            name: name.into(),
            datatype,
            cell_val_num: CellValNum::single(),
            nullable: false,
            fill_value: default_fill_value(datatype, CellValNum::single()),
            // Unwritten nullable cells read back as null.
            fill_validity: false,
            enumeration: None,
            filters: FilterListData::new(),
        }
    }

    /// Fixed cell size in bytes, `None` when variable-length
    pub fn cell_size(&self) -> Option<u64> {
        cell_size(self.datatype, self.cell_val_num)
    }

    /// Validate this attribute in isolation
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Engine("attribute name must not be empty".into()));
        }
        match self.cell_val_num {
            CellValNum::Fixed(n) => {
                let expect = self.datatype.size() * n as u64;
                if self.fill_value.len() as u64 != expect {
                    return Err(Error::Engine(format!(
                        "attribute '{}' fill value is {} bytes, cell layout requires {}",
                        self.name,
                        self.fill_value.len(),
                        expect
                    )));
                }
            }
            CellValNum::Var => {
                if self.fill_value.is_empty()
                    || self.fill_value.len() as u64 % self.datatype.size() != 0
                {
                    return Err(Error::Engine(format!(
                        "attribute '{}' variable-length fill value must be a whole number of elements",
                        self.name
                    )));
                }
            }
        }
        self.filters.check_against(self.datatype, self.cell_val_num)
    }
}

/// Complete description of an array's shape and typing
///
/// Built once through the schema builder, checked, then immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaData {
    /// Dense or sparse
    pub array_type: ArrayType,
    /// Coordinate space
    pub domain: DomainData,
    /// Attributes in index order
    pub attributes: Vec<AttributeData>,
    /// Enumerations referenced by attributes
    pub enumerations: Vec<EnumerationData>,
    /// Cell order within a tile
    pub cell_order: Layout,
    /// Tile order within the array
    pub tile_order: Layout,
    /// Sparse tile capacity in cells
    pub capacity: u64,
    /// Whether duplicate coordinates are allowed (sparse only)
    pub allows_duplicates: bool,
    /// Schema format version
    pub version: u32,
}

impl SchemaData {
    /// Fresh schema of the given type with empty domain and attributes
    pub fn new(array_type: ArrayType) -> Self {
        SchemaData {
            array_type,
            domain: DomainData::default(),
            attributes: Vec::new(),
            enumerations: Vec::new(),
            cell_order: Layout::RowMajor,
            tile_order: Layout::RowMajor,
            capacity: DEFAULT_CAPACITY,
            allows_duplicates: false,
            version: FORMAT_VERSION,
        }
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up an enumeration by name
    pub fn enumeration(&self, name: &str) -> Option<&EnumerationData> {
        self.enumerations.iter().find(|e| e.name == name)
    }

    /// True when `name` is a dimension
    pub fn is_dimension(&self, name: &str) -> bool {
        self.domain.dimension(name).is_some()
    }

    /// True when `name` is an attribute
    pub fn is_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Datatype and cell count of a field (attribute or dimension)
    pub fn field_shape(&self, name: &str) -> Option<(Datatype, CellValNum)> {
        if let Some(dim) = self.domain.dimension(name) {
            return Some((dim.datatype, dim.cell_val_num));
        }
        self.attribute(name).map(|a| (a.datatype, a.cell_val_num))
    }

    /// True when the named field admits a validity buffer
    pub fn field_nullable(&self, name: &str) -> bool {
        self.attribute(name).map(|a| a.nullable).unwrap_or(false)
    }

    /// Full schema validation
    ///
    /// An unchecked schema is never handed to the engine: builders call
    /// this from `build()` and array creation re-runs it.
    pub fn check(&self) -> Result<()> {
        self.domain.check()?;
        if self.attributes.is_empty() {
            return Err(Error::Engine("schema has no attributes".into()));
        }
        if !self.cell_order.is_valid_cell_order() {
            return Err(Error::Engine(format!(
                "{} is not a valid cell order",
                self.cell_order
            )));
        }
        if !self.tile_order.is_valid_tile_order() {
            return Err(Error::Engine(format!(
                "{} is not a valid tile order",
                self.tile_order
            )));
        }
        if self.capacity == 0 {
            return Err(Error::Engine("tile capacity must be nonzero".into()));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            attr.check()?;
            if self.attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(Error::Engine(format!(
                    "duplicate attribute name '{}'",
                    attr.name
                )));
            }
            if self.domain.dimension(&attr.name).is_some() {
                return Err(Error::Engine(format!(
                    "attribute '{}' collides with a dimension name",
                    attr.name
                )));
            }
            if let Some(enum_name) = &attr.enumeration {
                let found = self
                    .enumeration(enum_name)
                    .ok_or_else(|| {
                        Error::Engine(format!(
                            "attribute '{}' references unknown enumeration '{}'",
                            attr.name, enum_name
                        ))
                    })?;
                if !attr.datatype.is_integral() {
                    return Err(Error::Engine(format!(
                        "attribute '{}' binds an enumeration but its index datatype {} is not integral",
                        attr.name, attr.datatype
                    )));
                }
                found.check()?;
            }
        }
        for (i, e) in self.enumerations.iter().enumerate() {
            e.check()?;
            if self.enumerations[..i].iter().any(|o| o.name == e.name) {
                return Err(Error::Engine(format!(
                    "duplicate enumeration name '{}'",
                    e.name
                )));
            }
        }
        if self.array_type == ArrayType::Dense {
            if self.allows_duplicates {
                return Err(Error::Engine("dense arrays do not allow duplicates".into()));
            }
            if self.cell_order == Layout::Hilbert {
                return Err(Error::Engine(
                    "dense arrays do not support the Hilbert cell order".into(),
                ));
            }
            let first = self.domain.dimensions[0].datatype;
            for dim in &self.domain.dimensions {
                if dim.datatype != first {
                    return Err(Error::Engine(
                        "dense domains require a single datatype across dimensions".into(),
                    ));
                }
                if !(dim.datatype.is_integral()
                    || dim.datatype.is_datetime()
                    || dim.datatype.is_time())
                {
                    return Err(Error::Engine(format!(
                        "dense domains require integral coordinates, got {}",
                        dim.datatype
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::to_le_bytes;

    fn int_dimension(name: &str, lo: i32, hi: i32, extent: i32) -> DimensionData {
        DimensionData {
            name: name.into(),
            datatype: Datatype::Int32,
            cell_val_num: CellValNum::single(),
            domain: Some((lo.to_le_bytes().to_vec(), hi.to_le_bytes().to_vec())),
            tile_extent: Some(extent.to_le_bytes().to_vec()),
            filters: FilterListData::new(),
        }
    }

    fn minimal_schema(array_type: ArrayType) -> SchemaData {
        let mut schema = SchemaData::new(array_type);
        schema.domain.dimensions.push(int_dimension("d", 0, 99, 10));
        schema.attributes.push(AttributeData::new("a", Datatype::Int32));
        schema
    }

    #[test]
    fn test_schema_without_domain_fails_check() {
        let mut schema = SchemaData::new(ArrayType::Dense);
        schema.attributes.push(AttributeData::new("a", Datatype::Int32));
        let err = schema.check().unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn test_schema_without_attributes_fails_check() {
        let mut schema = SchemaData::new(ArrayType::Sparse);
        schema.domain.dimensions.push(int_dimension("d", 0, 9, 2));
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_minimal_schema_checks() {
        minimal_schema(ArrayType::Dense).check().unwrap();
        minimal_schema(ArrayType::Sparse).check().unwrap();
    }

    #[test]
    fn test_dense_rejects_duplicates_and_float_dims() {
        let mut schema = minimal_schema(ArrayType::Dense);
        schema.allows_duplicates = true;
        assert!(schema.check().is_err());

        let mut schema = minimal_schema(ArrayType::Dense);
        schema.domain.dimensions[0].datatype = Datatype::Float64;
        schema.domain.dimensions[0].domain = Some((
            to_le_bytes(&[0.0f64]),
            to_le_bytes(&[1.0f64]),
        ));
        schema.domain.dimensions[0].tile_extent = Some(to_le_bytes(&[0.5f64]));
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_name_collisions() {
        let mut schema = minimal_schema(ArrayType::Sparse);
        schema.attributes.push(AttributeData::new("a", Datatype::Float64));
        assert!(schema.check().is_err());

        let mut schema = minimal_schema(ArrayType::Sparse);
        schema.attributes.push(AttributeData::new("d", Datatype::Float64));
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_inverted_domain_bounds() {
        let mut schema = minimal_schema(ArrayType::Dense);
        schema.domain.dimensions[0] = int_dimension("d", 10, 5, 2);
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_fill_value_length_enforced() {
        let mut schema = minimal_schema(ArrayType::Dense);
        schema.attributes[0].fill_value = vec![0u8; 3];
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_missing_enumeration_reference() {
        let mut schema = minimal_schema(ArrayType::Sparse);
        schema.attributes[0].enumeration = Some("colors".into());
        assert!(schema.check().is_err());
    }

    #[test]
    fn test_default_fill_values() {
        assert_eq!(
            default_fill_value(Datatype::Int32, CellValNum::single()),
            i32::MIN.to_le_bytes().to_vec()
        );
        assert_eq!(
            default_fill_value(Datatype::UInt8, CellValNum::Fixed(3)),
            vec![0xFF, 0xFF, 0xFF]
        );
        let nan = default_fill_value(Datatype::Float32, CellValNum::single());
        assert!(f32::from_le_bytes(nan.try_into().unwrap()).is_nan());
    }

    #[test]
    fn test_string_dimension_rules() {
        let dim = DimensionData {
            name: "s".into(),
            datatype: Datatype::StringAscii,
            cell_val_num: CellValNum::Var,
            domain: None,
            tile_extent: None,
            filters: FilterListData::new(),
        };
        dim.check().unwrap();

        let bad = DimensionData {
            cell_val_num: CellValNum::single(),
            ..dim.clone()
        };
        assert!(bad.check().is_err());
    }
}
