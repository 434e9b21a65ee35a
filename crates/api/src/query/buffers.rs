//! Owned query buffers
//!
//! Buffer binding transfers an owned, growable buffer into the query:
//! its length at bind time is the capacity a read submit may fill, and
//! for writes its contents are the cells to write. After a submit the
//! per-field result sizes say how much of each buffer is meaningful;
//! typed accessors copy results back out. Raw pointer/length pairs never
//! cross the boundary.

use tessera_core::{CellValNum, Datatype, Error, PhysicalType, Result};

/// One field's bound buffers and result sizes
#[derive(Debug, Default)]
pub struct BufferEntry {
    /// Packed element bytes; length = capacity
    pub(crate) data: Vec<u8>,
    /// Element datatype the data buffer was bound with
    pub(crate) bound_as: Option<Datatype>,
    /// Meaningful prefix of `data` after a submit, in bytes
    pub(crate) result_data_bytes: usize,
    /// Byte offsets of variable-length cells
    pub(crate) offsets: Option<Vec<u64>>,
    /// Meaningful prefix of `offsets` after a submit, in elements
    pub(crate) result_offsets: usize,
    /// One validity byte per cell
    pub(crate) validity: Option<Vec<u8>>,
    /// Meaningful prefix of `validity` after a submit, in bytes
    pub(crate) result_validity: usize,
}

impl BufferEntry {
    /// Bind the data buffer from typed elements
    pub(crate) fn set_data<T: PhysicalType>(&mut self, values: &[T]) {
        self.bound_as = Some(T::DATATYPE);
        self.data.clear();
        self.data.reserve(values.len() * T::SIZE);
        for v in values {
            v.write_le_bytes(&mut self.data);
        }
        self.result_data_bytes = 0;
    }

    /// Validate a typed binding against the schema's field shape
    pub(crate) fn check_binding<T: PhysicalType>(
        field: &str,
        datatype: Datatype,
        _cell_val_num: CellValNum,
    ) -> Result<()> {
        if !T::is_compatible(datatype) {
            return Err(Error::type_mismatch(
                field,
                datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(())
    }

    /// Typed copy of the meaningful result elements
    pub(crate) fn result_data<T: PhysicalType>(&self, field: &str, datatype: Datatype) -> Result<Vec<T>> {
        if !T::is_compatible(datatype) {
            return Err(Error::type_mismatch(
                field,
                datatype.name(),
                T::DATATYPE.name(),
            ));
        }
        Ok(self.data[..self.result_data_bytes]
            .chunks_exact(T::SIZE)
            .map(T::from_le_bytes)
            .collect())
    }

    /// Meaningful result offsets
    pub(crate) fn result_offsets(&self) -> Result<&[u64]> {
        let offsets = self
            .offsets
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("no offsets buffer bound".into()))?;
        Ok(&offsets[..self.result_offsets])
    }

    /// Meaningful result validity bytes
    pub(crate) fn result_validity(&self) -> Result<&[u8]> {
        let validity = self
            .validity
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("no validity buffer bound".into()))?;
        Ok(&validity[..self.result_validity])
    }

    /// Store a submit's results into the bound buffers
    ///
    /// Results never exceed the bound capacities; the engine sized them
    /// against this entry's buffers.
    pub(crate) fn store_results(&mut self, result: tessera_engine::FieldResult) {
        self.result_data_bytes = result.data.len();
        self.data[..result.data.len()].copy_from_slice(&result.data);
        if let (Some(bound), Some(produced)) = (&mut self.offsets, result.offsets) {
            self.result_offsets = produced.len();
            bound[..produced.len()].copy_from_slice(&produced);
        }
        if let (Some(bound), Some(produced)) = (&mut self.validity, result.validity) {
            self.result_validity = produced.len();
            bound[..produced.len()].copy_from_slice(&produced);
        }
    }
}
