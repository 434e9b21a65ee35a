//! Subarrays: per-dimension range constraints

use tessera_core::{Error, PhysicalType, Result, to_le_bytes};
use tessera_engine::{RangeData, SubarrayData};

use crate::array::Array;

/// Per-dimension inclusive ranges constraining a read or dense write
///
/// With no range added, a dimension spans its full extent.
#[derive(Debug, Clone)]
pub struct Subarray {
    data: SubarrayData,
    shapes: Vec<(tessera_core::Datatype, bool)>,
    names: Vec<String>,
}

impl Subarray {
    /// Empty subarray over the array's dimensions
    pub fn new(array: &Array) -> Result<Subarray> {
        let schema = array.snapshot()?.schema.clone();
        let shapes = schema
            .domain
            .dimensions
            .iter()
            .map(|d| (d.datatype, d.is_var()))
            .collect();
        let names = schema
            .domain
            .dimensions
            .iter()
            .map(|d| d.name.clone())
            .collect();
        Ok(Subarray {
            data: SubarrayData::full(schema.domain.ndim() as usize),
            shapes,
            names,
        })
    }

    pub(crate) fn data(&self) -> &SubarrayData {
        &self.data
    }

    fn dim_index(&self, dimension: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == dimension)
            .ok_or_else(|| Error::NotFound(format!("dimension '{dimension}'")))
    }

    /// Add an inclusive typed range along a dimension by index
    ///
    /// The range datatype must match the dimension's.
    pub fn add_range<T: PhysicalType>(mut self, dim_idx: u32, start: T, end: T) -> Result<Subarray> {
        let (datatype, is_var) = *self
            .shapes
            .get(dim_idx as usize)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("dimension index {dim_idx} out of bounds"))
            })?;
        if is_var {
            return Err(Error::type_mismatch(
                format!("dimension {dim_idx}"),
                "variable-length ranges",
                T::DATATYPE.name(),
            ));
        }
        if !T::is_compatible(datatype) {
            return Err(Error::type_mismatch(
                format!("dimension {dim_idx}"),
                datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        self.data.dims[dim_idx as usize].push(RangeData {
            start: to_le_bytes(&[start]),
            end: to_le_bytes(&[end]),
        });
        Ok(self)
    }

    /// Add an inclusive typed range along a dimension by name
    pub fn add_range_by_name<T: PhysicalType>(
        self,
        dimension: &str,
        start: T,
        end: T,
    ) -> Result<Subarray> {
        let idx = self.dim_index(dimension)? as u32;
        self.add_range(idx, start, end)
    }

    /// Add an inclusive string range along a variable-length dimension
    pub fn add_range_var(mut self, dim_idx: u32, start: &str, end: &str) -> Result<Subarray> {
        let (_, is_var) = *self
            .shapes
            .get(dim_idx as usize)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("dimension index {dim_idx} out of bounds"))
            })?;
        if !is_var {
            return Err(Error::type_mismatch(
                format!("dimension {dim_idx}"),
                "fixed-size ranges",
                "a variable-length range",
            ));
        }
        self.data.dims[dim_idx as usize].push(RangeData {
            start: start.as_bytes().to_vec(),
            end: end.as_bytes().to_vec(),
        });
        Ok(self)
    }

    /// Number of ranges on a dimension
    pub fn range_num(&self, dim_idx: u32) -> Result<u64> {
        self.data
            .dims
            .get(dim_idx as usize)
            .map(|r| r.len() as u64)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("dimension index {dim_idx} out of bounds"))
            })
    }

    /// Typed bounds of one range
    pub fn range<T: PhysicalType>(&self, dim_idx: u32, range_idx: u64) -> Result<(T, T)> {
        let (datatype, _) = *self
            .shapes
            .get(dim_idx as usize)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("dimension index {dim_idx} out of bounds"))
            })?;
        if !T::is_compatible(datatype) {
            return Err(Error::type_mismatch(
                format!("dimension {dim_idx}"),
                datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        let range = self.data.dims[dim_idx as usize]
            .get(range_idx as usize)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("range index {range_idx} out of bounds"))
            })?;
        Ok((T::from_le_bytes(&range.start), T::from_le_bytes(&range.end)))
    }
}
