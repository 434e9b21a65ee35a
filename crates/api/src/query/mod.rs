//! Queries
//!
//! A [`Query`] is bound to exactly one opened [`Array`] and is
//! single-use per submit cycle: build, bind buffers, submit, inspect
//! status, finalize. The status machine is Uninitialized → Initialized →
//! InProgress → {Completed, Incomplete, Failed}.
//!
//! [`QueryStatus::Incomplete`] is a normal, expected step of the read
//! protocol, not an error: when the bound buffers cannot hold the full
//! result, the caller inspects per-field result sizes, enlarges or
//! re-binds buffers, and resubmits — the engine keeps the read position,
//! so resubmission continues the same logical query.
//!
//! Global-order writes stage cells across submits inside the query and
//! require [`Query::finalize`] to flush the staged state into a single
//! fragment.

mod buffers;
mod condition;
mod subarray;

pub use condition::QueryCondition;
pub use subarray::Subarray;

use std::collections::BTreeMap;

use tracing::debug;

use tessera_core::{Error, Layout, Mode, PhysicalType, QueryStatus, Result};
use tessera_engine::{
    EstimatedSize, FieldCapacity, FieldInput, FragmentMeta, ReadInput, SubarrayData, WriteInput,
};

use crate::array::Array;
use buffers::BufferEntry;

/// A read, write or delete request bound to one opened array
pub struct Query<'a> {
    array: &'a Array,
    query_type: Mode,
    layout: Layout,
    subarray: Option<Subarray>,
    condition: Option<QueryCondition>,
    buffers: BTreeMap<String, BufferEntry>,
    status: QueryStatus,
    cursor: u64,
    total_cells: u64,
    last_cells: u64,
    staged: BTreeMap<String, FieldInput>,
    fragments: Vec<FragmentMeta>,
}

impl<'a> Query<'a> {
    /// New query of `query_type` against an opened array
    ///
    /// The query type must be compatible with the mode the array was
    /// opened in: equal, or a write-family type on a modify-exclusive
    /// handle.
    pub fn new(array: &'a Array, query_type: Mode) -> Result<Query<'a>> {
        if query_type == Mode::ModifyExclusive {
            return Err(Error::InvalidParameter(
                "queries are typed Read, Write, Update or Delete".into(),
            ));
        }
        let open_mode = array.open_mode()?;
        let compatible = query_type == open_mode
            || (open_mode == Mode::ModifyExclusive && query_type.is_write());
        if !compatible {
            return Err(Error::NotOpen(format!(
                "array '{}' is open in {} mode, a {} query requires a matching mode",
                array.uri(),
                open_mode,
                query_type
            )));
        }
        Ok(Query {
            array,
            query_type,
            layout: Layout::RowMajor,
            subarray: None,
            condition: None,
            buffers: BTreeMap::new(),
            status: QueryStatus::Uninitialized,
            cursor: 0,
            total_cells: 0,
            last_cells: 0,
            staged: BTreeMap::new(),
            fragments: Vec::new(),
        })
    }

    /// The query type
    pub fn query_type(&self) -> Mode {
        self.query_type
    }

    /// Current status
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Current layout
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Set the cell layout for buffered input or results
    pub fn set_layout(&mut self, layout: Layout) -> Result<()> {
        if !layout.is_valid_query_layout() {
            return Err(Error::Engine(format!(
                "layout {layout} is not valid for a query"
            )));
        }
        self.layout = layout;
        Ok(())
    }

    /// Bind the subarray
    ///
    /// Rejected once the query is in progress: a running read continues
    /// the same logical query across submits.
    pub fn set_subarray(&mut self, subarray: Subarray) -> Result<()> {
        if !matches!(
            self.status,
            QueryStatus::Uninitialized | QueryStatus::Initialized
        ) {
            return Err(Error::Engine(
                "the subarray cannot change once the query is in progress".into(),
            ));
        }
        self.subarray = Some(subarray);
        Ok(())
    }

    /// Read-only snapshot of the bound subarray
    ///
    /// Returns a clone; mutating the returned value never affects the
    /// query. Rebinding goes through [`set_subarray`](Self::set_subarray)
    /// only.
    pub fn subarray(&self) -> Result<Subarray> {
        match &self.subarray {
            Some(subarray) => Ok(subarray.clone()),
            None => Subarray::new(self.array),
        }
    }

    /// Attach a cell condition, validated eagerly against the schema
    pub fn set_condition(&mut self, condition: QueryCondition) -> Result<()> {
        condition.check(&self.array.snapshot()?.schema)?;
        self.condition = Some(condition);
        Ok(())
    }

    fn field_entry(&mut self, name: &str) -> &mut BufferEntry {
        if self.status == QueryStatus::Uninitialized {
            self.status = QueryStatus::Initialized;
        }
        self.buffers.entry(name.to_string()).or_default()
    }

    /// Bind a field's data buffer from typed elements
    ///
    /// For writes the elements are the cells to write; for reads the
    /// element count is the capacity a submit may fill. The element
    /// kind must be physically compatible with the field's datatype.
    pub fn set_data_buffer<T: PhysicalType>(&mut self, field: &str, values: &[T]) -> Result<()> {
        let schema = self.array.snapshot()?.schema.clone();
        let (datatype, cell_val_num) = schema
            .field_shape(field)
            .ok_or_else(|| Error::NotFound(format!("field '{field}'")))?;
        BufferEntry::check_binding::<T>(field, datatype, cell_val_num)?;
        self.field_entry(field).set_data(values);
        Ok(())
    }

    /// Bind a field's byte offsets buffer (variable-length fields)
    pub fn set_offsets_buffer(&mut self, field: &str, offsets: &[u64]) -> Result<()> {
        let schema = self.array.snapshot()?.schema.clone();
        let (_, cell_val_num) = schema
            .field_shape(field)
            .ok_or_else(|| Error::NotFound(format!("field '{field}'")))?;
        if !cell_val_num.is_var() {
            return Err(Error::type_mismatch(
                field,
                "a fixed-size field takes no offsets buffer",
                "an offsets buffer",
            ));
        }
        let entry = self.field_entry(field);
        entry.offsets = Some(offsets.to_vec());
        entry.result_offsets = 0;
        Ok(())
    }

    /// Bind a field's validity buffer (nullable attributes)
    pub fn set_validity_buffer(&mut self, field: &str, validity: &[u8]) -> Result<()> {
        let schema = self.array.snapshot()?.schema.clone();
        if !schema.field_nullable(field) {
            return Err(Error::type_mismatch(
                field,
                "a non-nullable field takes no validity buffer",
                "a validity buffer",
            ));
        }
        let entry = self.field_entry(field);
        entry.validity = Some(validity.to_vec());
        entry.result_validity = 0;
        Ok(())
    }

    fn subarray_data(&self) -> Result<SubarrayData> {
        Ok(match &self.subarray {
            Some(subarray) => subarray.data().clone(),
            None => {
                let ndim = self.array.snapshot()?.schema.domain.ndim() as usize;
                SubarrayData::full(ndim)
            }
        })
    }

    /// Submit the query
    ///
    /// Reads fill the bound buffers and report `Completed` or
    /// `Incomplete`; writes produce one fragment per submit except in
    /// global order, where cells are staged until
    /// [`finalize`](Self::finalize). Failures set the `Failed` status
    /// and carry the engine's message.
    pub fn submit(&mut self) -> Result<QueryStatus> {
        self.status = QueryStatus::InProgress;
        match self.submit_inner() {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(e) => {
                self.status = QueryStatus::Failed;
                Err(e)
            }
        }
    }

    fn submit_inner(&mut self) -> Result<QueryStatus> {
        if self.buffers.is_empty() && self.query_type != Mode::Delete {
            return Err(Error::Engine("no buffers are bound to the query".into()));
        }
        match self.query_type {
            Mode::Read => self.submit_read(),
            Mode::Write | Mode::Update => self.submit_write(),
            Mode::Delete => self.submit_delete(),
            Mode::ModifyExclusive => Err(Error::Engine(
                "queries are typed Read, Write, Update or Delete".into(),
            )),
        }
    }

    fn submit_read(&mut self) -> Result<QueryStatus> {
        let fields = self
            .buffers
            .iter()
            .map(|(name, entry)| FieldCapacity {
                name: name.clone(),
                data_bytes: entry.data.len() as u64,
                offsets: entry.offsets.as_ref().map(|o| o.len() as u64),
                validity: entry.validity.as_ref().map(|v| v.len() as u64),
            })
            .collect();
        let input = ReadInput {
            layout: self.layout,
            subarray: self.subarray_data()?,
            condition: self.condition.as_ref().map(|c| c.data().clone()),
            fields,
            cursor: self.cursor,
        };
        let snapshot = self.array.snapshot()?;
        let output = self.array.context().engine().read(snapshot, &input)?;
        for (name, result) in output.fields {
            if let Some(entry) = self.buffers.get_mut(&name) {
                entry.store_results(result);
            }
        }
        self.last_cells = output.cells;
        self.total_cells += output.cells;
        self.cursor = output.cursor;
        debug!(array = %self.array.uri(), cells = output.cells, completed = output.completed, "read submitted");
        Ok(if output.completed {
            QueryStatus::Completed
        } else {
            QueryStatus::Incomplete
        })
    }

    fn write_fields(&self) -> Vec<(String, FieldInput)> {
        self.buffers
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    FieldInput {
                        data: entry.data.clone(),
                        offsets: entry.offsets.clone(),
                        validity: entry.validity.clone(),
                    },
                )
            })
            .collect()
    }

    fn submit_write(&mut self) -> Result<QueryStatus> {
        if self.layout == Layout::GlobalOrder {
            // Stage this submit; finalize flushes one fragment.
            for (name, input) in self.write_fields() {
                let slot = self.staged.entry(name).or_insert_with(|| FieldInput {
                    data: Vec::new(),
                    offsets: input.offsets.as_ref().map(|_| Vec::new()),
                    validity: input.validity.as_ref().map(|_| Vec::new()),
                });
                if let (Some(staged), Some(incoming)) = (&mut slot.offsets, input.offsets) {
                    let base = slot.data.len() as u64;
                    staged.extend(incoming.into_iter().map(|o| base + o));
                }
                if let (Some(staged), Some(incoming)) = (&mut slot.validity, input.validity) {
                    staged.extend(incoming);
                }
                slot.data.extend(input.data);
            }
            return Ok(QueryStatus::Completed);
        }

        let input = WriteInput {
            layout: self.layout,
            subarray: Some(self.subarray_data()?),
            fields: self.write_fields(),
        };
        let meta = self
            .array
            .context()
            .engine()
            .write(self.array.uri(), input)?;
        self.fragments.push(meta);
        Ok(QueryStatus::Completed)
    }

    fn submit_delete(&mut self) -> Result<QueryStatus> {
        let condition = self
            .condition
            .clone()
            .ok_or_else(|| Error::Engine("delete queries require a condition".into()))?;
        let meta = self
            .array
            .context()
            .engine()
            .delete_cells(self.array.uri(), condition.into_data())?;
        self.fragments.push(meta);
        Ok(QueryStatus::Completed)
    }

    /// Flush global-order write state
    ///
    /// Required after global-order write submits; a no-op for every
    /// other query shape.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.staged.is_empty() {
            let fields = std::mem::take(&mut self.staged).into_iter().collect();
            let input = WriteInput {
                layout: Layout::GlobalOrder,
                subarray: Some(self.subarray_data()?),
                fields,
            };
            let meta = self
                .array
                .context()
                .engine()
                .write(self.array.uri(), input)?;
            self.fragments.push(meta);
            self.status = QueryStatus::Completed;
        }
        Ok(())
    }

    /// Submit, then flush global-order state
    pub fn submit_and_finalize(&mut self) -> Result<QueryStatus> {
        self.submit()?;
        self.finalize()?;
        Ok(self.status)
    }

    // ========== Results ==========

    /// Cells produced by the most recent submit
    pub fn result_cell_count(&self) -> u64 {
        self.last_cells
    }

    /// True when any read submit has produced cells
    pub fn has_results(&self) -> bool {
        self.total_cells > 0
    }

    /// Typed copy of a field's results from the last submit
    pub fn result_data<T: PhysicalType>(&self, field: &str) -> Result<Vec<T>> {
        let schema = self.array.snapshot()?.schema.clone();
        let (datatype, _) = schema
            .field_shape(field)
            .ok_or_else(|| Error::NotFound(format!("field '{field}'")))?;
        let entry = self
            .buffers
            .get(field)
            .ok_or_else(|| Error::InvalidParameter(format!("no buffer bound for '{field}'")))?;
        entry.result_data::<T>(field, datatype)
    }

    /// A field's result byte offsets from the last submit
    pub fn result_offsets(&self, field: &str) -> Result<Vec<u64>> {
        let entry = self
            .buffers
            .get(field)
            .ok_or_else(|| Error::InvalidParameter(format!("no buffer bound for '{field}'")))?;
        Ok(entry.result_offsets()?.to_vec())
    }

    /// A field's result validity bytes from the last submit
    pub fn result_validity(&self, field: &str) -> Result<Vec<u8>> {
        let entry = self
            .buffers
            .get(field)
            .ok_or_else(|| Error::InvalidParameter(format!("no buffer bound for '{field}'")))?;
        Ok(entry.result_validity()?.to_vec())
    }

    /// Estimated result sizes for a field over the bound subarray
    ///
    /// An estimate only: a condition-filtered read may return less.
    pub fn est_result_size(&self, field: &str) -> Result<EstimatedSize> {
        let snapshot = self.array.snapshot()?;
        let estimates = self.array.context().engine().est_result_size(
            snapshot,
            &self.subarray_data()?,
            &[field.to_string()],
        )?;
        Ok(estimates.into_iter().next().map(|(_, e)| e).unwrap_or_default())
    }

    // ========== Fragment introspection ==========

    fn require_submitted(&self) -> Result<()> {
        if matches!(
            self.status,
            QueryStatus::Uninitialized | QueryStatus::Initialized
        ) {
            return Err(Error::Engine(
                "fragment introspection requires a submitted query".into(),
            ));
        }
        Ok(())
    }

    /// Number of fragments written by this query
    pub fn fragment_num(&self) -> Result<u64> {
        self.require_submitted()?;
        Ok(self.fragments.len() as u64)
    }

    /// URI of the `idx`-th written fragment
    pub fn fragment_uri(&self, idx: u64) -> Result<String> {
        self.require_submitted()?;
        self.fragments
            .get(idx as usize)
            .map(|f| f.uri.clone())
            .ok_or_else(|| {
                Error::InvalidParameter(format!("fragment index {idx} out of bounds"))
            })
    }

    /// Timestamp range of the `idx`-th written fragment
    pub fn fragment_timestamp_range(&self, idx: u64) -> Result<(u64, u64)> {
        self.require_submitted()?;
        self.fragments
            .get(idx as usize)
            .map(|f| f.timestamp_range)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("fragment index {idx} out of bounds"))
            })
    }
}
