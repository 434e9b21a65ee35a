//! Read execution
//!
//! Reads materialize a logical view over the visible fragments: dense
//! reads overlay fragments by recency and fill unwritten cells with the
//! attribute fill value; sparse reads merge fragment cells, apply delete
//! tombstones, deduplicate coordinates and order the survivors. Both
//! paths deliver through a cursor: a submit copies as many cells as the
//! bound buffers hold and reports `completed = false` until the cursor
//! exhausts the result. Undersized buffers are a normal step of the
//! protocol, not a failure; a submit that fits zero cells reports zero
//! result sizes so the caller knows enlargement is required.

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use tessera_core::{
    CellValNum, Datatype, Error, Layout, Result, Scalar, SchemaData,
};

use crate::condition::{CellView, ConditionData};
use crate::fragment::{Fragment, FragmentKind};
use crate::params::EngineParams;
use crate::request::{
    EstimatedSize, FieldCapacity, FieldResult, ReadInput, ReadOutput, SubarrayData,
};

/// One field of a fragment with its payload materialized
struct DecodedField {
    data: Vec<u8>,
    offsets: Option<Vec<u64>>,
    validity: Option<Vec<u8>>,
    cell_size: Option<usize>,
}

impl DecodedField {
    fn cell(&self, idx: usize) -> &[u8] {
        match (&self.offsets, self.cell_size) {
            (Some(offsets), _) => {
                let start = offsets[idx] as usize;
                let end = offsets
                    .get(idx + 1)
                    .map(|o| *o as usize)
                    .unwrap_or(self.data.len());
                &self.data[start..end]
            }
            (None, Some(cell)) => &self.data[idx * cell..(idx + 1) * cell],
            (None, None) => &[],
        }
    }

    fn valid(&self, idx: usize) -> bool {
        self.validity.as_ref().map(|v| v[idx] != 0).unwrap_or(true)
    }
}

/// A fragment with every field payload materialized
struct DecodedFragment {
    timestamp: u64,
    cell_count: usize,
    dense_box: Option<Vec<(i128, i128)>>,
    fields: FxHashMap<String, DecodedField>,
}

fn decode_fragment(schema: &SchemaData, fragment: &Fragment) -> Result<DecodedFragment> {
    let mut fields = FxHashMap::default();
    for (name, block) in &fragment.fields {
        let (datatype, cvn) = schema
            .field_shape(name)
            .ok_or_else(|| Error::Engine(format!("fragment field '{name}' left the schema")))?;
        fields.insert(
            name.clone(),
            DecodedField {
                data: block.bytes()?,
                offsets: block.offsets.clone(),
                validity: block.validity.clone(),
                cell_size: cvn.fixed().map(|n| (datatype.size() * n as u64) as usize),
            },
        );
    }
    let dense_box = match &fragment.kind {
        FragmentKind::Dense { subarray } => {
            let dims = &schema.domain.dimensions;
            let mut decoded = Vec::with_capacity(subarray.len());
            for ((lo, hi), dim) in subarray.iter().zip(dims) {
                let lo = Scalar::from_le_bytes(dim.datatype, lo)?
                    .as_index()
                    .ok_or_else(|| Error::Engine("dense bounds must be integral".into()))?;
                let hi = Scalar::from_le_bytes(dim.datatype, hi)?
                    .as_index()
                    .ok_or_else(|| Error::Engine("dense bounds must be integral".into()))?;
                decoded.push((lo, hi));
            }
            Some(decoded)
        }
        _ => None,
    };
    Ok(DecodedFragment {
        timestamp: fragment.timestamp_range.0,
        cell_count: fragment.cell_count as usize,
        dense_box,
        fields,
    })
}

/// Per-dimension index ranges a read iterates, dense arrays only
struct DenseSpace {
    /// Inclusive index ranges per dimension, request order
    ranges: Vec<Vec<(i128, i128)>>,
    /// Total positions per dimension (sum of range extents)
    extents: Vec<u128>,
    datatypes: Vec<Datatype>,
}

impl DenseSpace {
    fn resolve(schema: &SchemaData, subarray: &SubarrayData) -> Result<DenseSpace> {
        let dims = &schema.domain.dimensions;
        let mut ranges = Vec::with_capacity(dims.len());
        let mut extents = Vec::with_capacity(dims.len());
        let mut datatypes = Vec::with_capacity(dims.len());
        for (idx, dim) in dims.iter().enumerate() {
            let (dom_lo, dom_hi) = dim
                .bounds()?
                .ok_or_else(|| Error::Engine("dense domains are always bounded".into()))?;
            let explicit = subarray.dims.get(idx).filter(|r| !r.is_empty());
            let mut dim_ranges = Vec::new();
            match explicit {
                Some(rs) => {
                    for r in rs.iter() {
                        let lo = Scalar::from_le_bytes(dim.datatype, &r.start)?
                            .as_index()
                            .ok_or_else(|| {
                                Error::Engine("dense coordinates must be integral".into())
                            })?;
                        let hi = Scalar::from_le_bytes(dim.datatype, &r.end)?
                            .as_index()
                            .ok_or_else(|| {
                                Error::Engine("dense coordinates must be integral".into())
                            })?;
                        if lo > hi {
                            return Err(Error::Engine(format!(
                                "dimension '{}' range is inverted",
                                dim.name
                            )));
                        }
                        dim_ranges.push((lo, hi));
                    }
                }
                None => {
                    dim_ranges.push((
                        dom_lo.as_index().expect("dense coordinates are integral"),
                        dom_hi.as_index().expect("dense coordinates are integral"),
                    ));
                }
            }
            let extent: u128 = dim_ranges.iter().map(|(lo, hi)| (hi - lo + 1) as u128).sum();
            ranges.push(dim_ranges);
            extents.push(extent);
            datatypes.push(dim.datatype);
        }
        Ok(DenseSpace {
            ranges,
            extents,
            datatypes,
        })
    }

    fn total_cells(&self) -> u128 {
        self.extents.iter().product()
    }

    /// Coordinate of the `linear`-th cell under `layout`
    fn coord_at(&self, linear: u128, layout: Layout) -> Vec<i128> {
        let ndim = self.extents.len();
        let mut pos = vec![0u128; ndim];
        let mut rem = linear;
        match layout {
            Layout::ColMajor => {
                for k in 0..ndim {
                    pos[k] = rem % self.extents[k];
                    rem /= self.extents[k];
                }
            }
            _ => {
                for k in (0..ndim).rev() {
                    pos[k] = rem % self.extents[k];
                    rem /= self.extents[k];
                }
            }
        }
        pos.iter()
            .enumerate()
            .map(|(k, p)| {
                let mut remaining = *p;
                for (lo, hi) in &self.ranges[k] {
                    let extent = (hi - lo + 1) as u128;
                    if remaining < extent {
                        return lo + remaining as i128;
                    }
                    remaining -= extent;
                }
                unreachable!("position within summed extents")
            })
            .collect()
    }
}

fn encode_index(datatype: Datatype, value: i128) -> Vec<u8> {
    let size = datatype.size() as usize;
    (value as i64).to_le_bytes()[..size].to_vec()
}

/// Row-major ordinal of `coord` within a fragment box, when covered
fn dense_inner_index(bounds: &[(i128, i128)], coord: &[i128]) -> Option<usize> {
    let mut idx: u128 = 0;
    for (k, (lo, hi)) in bounds.iter().enumerate() {
        if coord[k] < *lo || coord[k] > *hi {
            return None;
        }
        let extent = (hi - lo + 1) as u128;
        idx = idx * extent + (coord[k] - lo) as u128;
    }
    Some(idx as usize)
}

/// Running accumulation into one output field
struct FieldAccum {
    name: String,
    capacity: FieldCapacity,
    result: FieldResult,
    is_var: bool,
    nullable: bool,
}

impl FieldAccum {
    fn new(schema: &SchemaData, capacity: &FieldCapacity) -> Result<FieldAccum> {
        let (_, cvn) = schema.field_shape(&capacity.name).ok_or_else(|| {
            Error::Engine(format!("read requests unknown field '{}'", capacity.name))
        })?;
        let is_var = cvn.is_var();
        let nullable = schema.field_nullable(&capacity.name);
        if is_var && capacity.offsets.is_none() {
            return Err(Error::type_mismatch(
                &capacity.name,
                "an offsets buffer for a var-size field",
                "none",
            ));
        }
        if !is_var && capacity.offsets.is_some() {
            return Err(Error::type_mismatch(
                &capacity.name,
                "no offsets buffer for a fixed-size field",
                "an offsets buffer",
            ));
        }
        Ok(FieldAccum {
            name: capacity.name.clone(),
            capacity: capacity.clone(),
            result: FieldResult {
                data: Vec::new(),
                offsets: is_var.then(Vec::new),
                validity: nullable.then(Vec::new),
            },
            is_var,
            nullable,
        })
    }

    /// True when one more cell of `bytes` fits every bound buffer
    fn fits(&self, bytes: usize) -> bool {
        if (self.result.data.len() + bytes) as u64 > self.capacity.data_bytes {
            return false;
        }
        if let (true, Some(cap)) = (self.is_var, self.capacity.offsets) {
            if (self.result.offsets.as_ref().map(Vec::len).unwrap_or(0) + 1) as u64 > cap {
                return false;
            }
        }
        if let (true, Some(cap)) = (self.nullable, self.capacity.validity) {
            if (self.result.validity.as_ref().map(Vec::len).unwrap_or(0) + 1) as u64 > cap {
                return false;
            }
        }
        true
    }

    fn push(&mut self, bytes: &[u8], valid: bool) {
        if let Some(offsets) = &mut self.result.offsets {
            offsets.push(self.result.data.len() as u64);
        }
        self.result.data.extend_from_slice(bytes);
        if let Some(validity) = &mut self.result.validity {
            validity.push(valid as u8);
        }
    }
}

/// The bytes and validity one cell contributes to one field
struct StagedCell {
    bytes: Vec<u8>,
    valid: bool,
}

/// Drive the capacity loop over an iterator of per-cell stagings
///
/// `stage(cell_index)` produces the per-field payloads of one result
/// cell. Cells are committed while every field has room and the total
/// stays inside the memory budget.
fn fill_buffers(
    accums: &mut [FieldAccum],
    total: u64,
    cursor: u64,
    memory_budget: u64,
    mut stage: impl FnMut(u64) -> Result<Vec<StagedCell>>,
) -> Result<(u64, u64)> {
    let mut produced = 0u64;
    let mut budget_used = 0u64;
    let mut position = cursor;
    while position < total {
        let staged = stage(position)?;
        let staged_bytes: u64 = staged.iter().map(|s| s.bytes.len() as u64).sum();
        if budget_used + staged_bytes > memory_budget && produced > 0 {
            break;
        }
        let all_fit = accums
            .iter()
            .zip(&staged)
            .all(|(accum, cell)| accum.fits(cell.bytes.len()));
        if !all_fit {
            break;
        }
        for (accum, cell) in accums.iter_mut().zip(&staged) {
            accum.push(&cell.bytes, cell.valid);
        }
        budget_used += staged_bytes;
        produced += 1;
        position += 1;
    }
    Ok((produced, position))
}

/// Execute one read submit over an open snapshot
pub fn execute_read(
    schema: &SchemaData,
    fragments: &[Arc<Fragment>],
    params: &EngineParams,
    input: &ReadInput,
) -> Result<ReadOutput> {
    if !input.layout.is_valid_query_layout() {
        return Err(Error::Engine(format!(
            "layout {} is not valid for a read",
            input.layout
        )));
    }
    if let Some(condition) = &input.condition {
        condition.check(schema)?;
    }
    let mut accums = input
        .fields
        .iter()
        .map(|c| FieldAccum::new(schema, c))
        .collect::<Result<Vec<_>>>()?;

    let (produced, cursor, completed) = match schema.array_type {
        tessera_core::ArrayType::Dense => {
            read_dense(schema, fragments, params, input, &mut accums)?
        }
        tessera_core::ArrayType::Sparse => {
            read_sparse(schema, fragments, params, input, &mut accums)?
        }
    };
    debug!(cells = produced, completed, "read submit served");
    Ok(ReadOutput {
        fields: accums
            .into_iter()
            .map(|a| (a.name, a.result))
            .collect(),
        cells: produced,
        cursor,
        completed,
    })
}

/// Result layout to iterate for a requested query layout
fn effective_layout(schema: &SchemaData, layout: Layout) -> Layout {
    match layout {
        Layout::GlobalOrder | Layout::Unordered => {
            // The global cell order realizes Hilbert as row-major.
            if schema.cell_order == Layout::ColMajor {
                Layout::ColMajor
            } else {
                Layout::RowMajor
            }
        }
        other => other,
    }
}

fn read_dense(
    schema: &SchemaData,
    fragments: &[Arc<Fragment>],
    params: &EngineParams,
    input: &ReadInput,
    accums: &mut [FieldAccum],
) -> Result<(u64, u64, bool)> {
    let space = DenseSpace::resolve(schema, &input.subarray)?;
    let total = space.total_cells();
    if total > u64::MAX as u128 {
        return Err(Error::Engine("subarray is too large to address".into()));
    }
    let total = total as u64;
    let layout = effective_layout(schema, input.layout);

    // Newest-first for overlay resolution.
    let mut decoded: Vec<DecodedFragment> = fragments
        .iter()
        .filter(|f| !f.is_delete())
        .map(|f| decode_fragment(schema, f))
        .collect::<Result<_>>()?;
    decoded.reverse();

    // (name, datatype, dimension index when the field is a dimension)
    let field_meta: Vec<(String, Datatype, Option<usize>)> = accums
        .iter()
        .map(|a| {
            let (dt, _) = schema.field_shape(&a.name).expect("validated");
            (a.name.clone(), dt, schema.domain.dimension_index(&a.name))
        })
        .collect();

    let stage = |linear: u64| -> Result<Vec<StagedCell>> {
        let coord = space.coord_at(linear as u128, layout);
        let located = decoded.iter().find_map(|frag| {
            let bounds = frag.dense_box.as_ref()?;
            dense_inner_index(bounds, &coord).map(|inner| (frag, inner))
        });

        let matches = match (&input.condition, located) {
            (Some(condition), Some((frag, inner))) => {
                let lookup = |field: &str| -> Result<CellView> {
                    let decoded_field = frag.fields.get(field).ok_or_else(|| {
                        Error::Engine(format!("fragment has no field '{field}'"))
                    })?;
                    Ok(CellView {
                        bytes: decoded_field.cell(inner).to_vec(),
                        valid: decoded_field.valid(inner),
                    })
                };
                condition.eval(schema, &lookup)?
            }
            _ => true,
        };

        let mut staged = Vec::with_capacity(field_meta.len());
        for (name, datatype, dim_idx) in &field_meta {
            if let Some(k) = dim_idx {
                staged.push(StagedCell {
                    bytes: encode_index(*datatype, coord[*k]),
                    valid: true,
                });
                continue;
            }
            let attr = schema.attribute(name).expect("validated");
            match located {
                Some((frag, inner)) if matches => {
                    let decoded_field = frag.fields.get(name).ok_or_else(|| {
                        Error::Engine(format!("fragment has no field '{name}'"))
                    })?;
                    staged.push(StagedCell {
                        bytes: decoded_field.cell(inner).to_vec(),
                        valid: decoded_field.valid(inner),
                    });
                }
                _ => staged.push(StagedCell {
                    bytes: attr.fill_value.clone(),
                    valid: attr.fill_validity,
                }),
            }
        }
        Ok(staged)
    };

    let (produced, cursor) =
        fill_buffers(accums, total, input.cursor, params.memory_budget, stage)?;
    Ok((produced, cursor, cursor >= total))
}

/// Reference to one visible sparse cell
struct SparseCell {
    frag: usize,
    idx: usize,
}

/// One cell of one fragment as the condition evaluator sees it
fn view_cell(frag: &DecodedFragment, idx: usize, field: &str) -> Result<CellView> {
    let decoded_field = frag
        .fields
        .get(field)
        .ok_or_else(|| Error::Engine(format!("fragment has no field '{field}'")))?;
    Ok(CellView {
        bytes: decoded_field.cell(idx).to_vec(),
        valid: decoded_field.valid(idx),
    })
}

/// Materialize the visible, deduplicated, condition-filtered, ordered
/// sparse result for a subarray
fn materialize_sparse(
    schema: &SchemaData,
    decoded: &[DecodedFragment],
    tombstones: &[(u64, ConditionData)],
    input_subarray: &SubarrayData,
    condition: Option<&ConditionData>,
    layout: Layout,
) -> Result<Vec<SparseCell>> {
    let dims = &schema.domain.dimensions;

    // Pre-decode subarray ranges per dimension.
    let mut dim_ranges: Vec<Vec<(Vec<u8>, Vec<u8>)>> = Vec::with_capacity(dims.len());
    for (k, dim) in dims.iter().enumerate() {
        let mut ranges = Vec::new();
        if let Some(rs) = input_subarray.dims.get(k) {
            for r in rs.iter() {
                if !dim.is_var() {
                    let expect = dim.datatype.size() as usize;
                    if r.start.len() != expect || r.end.len() != expect {
                        return Err(Error::type_mismatch(
                            &dim.name,
                            format!("{expect}-byte range bounds"),
                            format!("{}/{} bytes", r.start.len(), r.end.len()),
                        ));
                    }
                }
                ranges.push((r.start.clone(), r.end.clone()));
            }
        }
        dim_ranges.push(ranges);
    }

    let coord_in_range = |frag: &DecodedFragment, idx: usize| -> Result<bool> {
        for (k, dim) in dims.iter().enumerate() {
            if dim_ranges[k].is_empty() {
                continue;
            }
            let field = frag
                .fields
                .get(&dim.name)
                .ok_or_else(|| Error::Engine(format!("fragment lacks dimension '{}'", dim.name)))?;
            let coord = field.cell(idx);
            let mut hit = false;
            for (start, end) in &dim_ranges[k] {
                let inside = if dim.is_var() {
                    coord >= start.as_slice() && coord <= end.as_slice()
                } else {
                    let c = Scalar::from_le_bytes(dim.datatype, coord)?;
                    let lo = Scalar::from_le_bytes(dim.datatype, start)?;
                    let hi = Scalar::from_le_bytes(dim.datatype, end)?;
                    c.cmp_same_class(&lo) != Ordering::Less
                        && c.cmp_same_class(&hi) != Ordering::Greater
                };
                if inside {
                    hit = true;
                    break;
                }
            }
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    };

    let mut cells: Vec<SparseCell> = Vec::new();
    for (frag_idx, frag) in decoded.iter().enumerate() {
        'cells: for idx in 0..frag.cell_count {
            if !coord_in_range(frag, idx)? {
                continue;
            }
            for (delete_ts, delete_cond) in tombstones {
                if *delete_ts >= frag.timestamp
                    && delete_cond.eval(schema, &|field: &str| view_cell(frag, idx, field))?
                {
                    continue 'cells;
                }
            }
            cells.push(SparseCell {
                frag: frag_idx,
                idx,
            });
        }
    }

    // Later fragments supersede earlier cells at the same coordinates.
    if !schema.allows_duplicates {
        let mut latest: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
        let mut keep = vec![true; cells.len()];
        for (pos, cell) in cells.iter().enumerate() {
            let frag = &decoded[cell.frag];
            let mut key = Vec::new();
            for dim in dims {
                let coord = frag.fields[&dim.name].cell(cell.idx);
                key.extend_from_slice(&(coord.len() as u32).to_le_bytes());
                key.extend_from_slice(coord);
            }
            if let Some(prev) = latest.insert(key, pos) {
                keep[prev] = false;
            }
        }
        let mut kept_iter = keep.iter();
        cells.retain(|_| *kept_iter.next().unwrap());
    }

    if let Some(condition) = condition {
        let mut filtered = Vec::with_capacity(cells.len());
        for cell in cells {
            let frag = &decoded[cell.frag];
            if condition.eval(schema, &|field: &str| view_cell(frag, cell.idx, field))? {
                filtered.push(cell);
            }
        }
        cells = filtered;
    }

    if matches!(layout, Layout::RowMajor | Layout::ColMajor) {
        let mut order: Vec<usize> = (0..dims.len()).collect();
        if layout == Layout::ColMajor {
            order.reverse();
        }
        cells.sort_by(|a, b| {
            for &k in &order {
                let dim = &dims[k];
                let ca = decoded[a.frag].fields[&dim.name].cell(a.idx);
                let cb = decoded[b.frag].fields[&dim.name].cell(b.idx);
                let ord = if dim.is_var() {
                    ca.cmp(cb)
                } else {
                    match (
                        Scalar::from_le_bytes(dim.datatype, ca),
                        Scalar::from_le_bytes(dim.datatype, cb),
                    ) {
                        (Ok(sa), Ok(sb)) => sa.cmp_same_class(&sb),
                        _ => ca.cmp(cb),
                    }
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    Ok(cells)
}

fn read_sparse(
    schema: &SchemaData,
    fragments: &[Arc<Fragment>],
    params: &EngineParams,
    input: &ReadInput,
    accums: &mut [FieldAccum],
) -> Result<(u64, u64, bool)> {
    let layout = match input.layout {
        Layout::Unordered => Layout::Unordered,
        other => effective_layout(schema, other),
    };

    let mut decoded = Vec::new();
    let mut tombstones = Vec::new();
    for fragment in fragments {
        match &fragment.kind {
            FragmentKind::Delete { condition } => {
                tombstones.push((fragment.timestamp_range.0, condition.clone()));
            }
            FragmentKind::Sparse => decoded.push(decode_fragment(schema, fragment)?),
            FragmentKind::Dense { .. } => {
                return Err(Error::Engine(
                    "sparse array holds a dense fragment".into(),
                ));
            }
        }
    }

    let cells = materialize_sparse(
        schema,
        &decoded,
        &tombstones,
        &input.subarray,
        input.condition.as_ref(),
        layout,
    )?;
    let total = cells.len() as u64;

    let field_names: Vec<String> = accums.iter().map(|a| a.name.clone()).collect();
    let stage = |linear: u64| -> Result<Vec<StagedCell>> {
        let cell = &cells[linear as usize];
        let frag = &decoded[cell.frag];
        let mut staged = Vec::with_capacity(field_names.len());
        for name in &field_names {
            let field = frag
                .fields
                .get(name)
                .ok_or_else(|| Error::Engine(format!("fragment has no field '{name}'")))?;
            staged.push(StagedCell {
                bytes: field.cell(cell.idx).to_vec(),
                valid: field.valid(cell.idx),
            });
        }
        Ok(staged)
    };

    let (produced, cursor) =
        fill_buffers(accums, total, input.cursor, params.memory_budget, stage)?;
    Ok((produced, cursor, cursor >= total))
}

/// Per-dimension non-empty domain of an open snapshot
///
/// `None` for a dimension means no written data yet — an empty domain is
/// a normal answer, not an error.
pub fn non_empty_domain(
    schema: &SchemaData,
    fragments: &[Arc<Fragment>],
) -> Result<Vec<Option<(Vec<u8>, Vec<u8>)>>> {
    let dims = &schema.domain.dimensions;
    let mut result: Vec<Option<(Vec<u8>, Vec<u8>)>> = vec![None; dims.len()];

    for fragment in fragments.iter().filter(|f| !f.is_delete()) {
        match &fragment.kind {
            FragmentKind::Dense { subarray } => {
                for (k, (lo, hi)) in subarray.iter().enumerate() {
                    merge_bound(schema, k, &mut result[k], lo, hi)?;
                }
            }
            FragmentKind::Sparse => {
                let decoded = decode_fragment(schema, fragment)?;
                for (k, dim) in dims.iter().enumerate() {
                    let field = decoded.fields.get(&dim.name).ok_or_else(|| {
                        Error::Engine(format!("fragment lacks dimension '{}'", dim.name))
                    })?;
                    for idx in 0..decoded.cell_count {
                        let coord = field.cell(idx);
                        merge_bound(schema, k, &mut result[k], coord, coord)?;
                    }
                }
            }
            FragmentKind::Delete { .. } => {}
        }
    }
    Ok(result)
}

fn merge_bound(
    schema: &SchemaData,
    dim_idx: usize,
    current: &mut Option<(Vec<u8>, Vec<u8>)>,
    lo: &[u8],
    hi: &[u8],
) -> Result<()> {
    let dim = &schema.domain.dimensions[dim_idx];
    let less = |a: &[u8], b: &[u8]| -> Result<bool> {
        if dim.is_var() {
            return Ok(a < b);
        }
        let sa = Scalar::from_le_bytes(dim.datatype, a)?;
        let sb = Scalar::from_le_bytes(dim.datatype, b)?;
        Ok(sa.cmp_same_class(&sb) == Ordering::Less)
    };
    match current {
        None => *current = Some((lo.to_vec(), hi.to_vec())),
        Some((cur_lo, cur_hi)) => {
            if less(lo, cur_lo)? {
                *cur_lo = lo.to_vec();
            }
            if less(cur_hi, hi)? {
                *cur_hi = hi.to_vec();
            }
        }
    }
    Ok(())
}

/// Estimated result sizes for the requested fields over a subarray
///
/// Dense estimates assume a fill-complete result; sparse estimates count
/// the cells the subarray currently holds, ignoring any condition, and
/// may exceed what a condition-filtered read returns.
pub fn est_result_size(
    schema: &SchemaData,
    fragments: &[Arc<Fragment>],
    subarray: &SubarrayData,
    fields: &[String],
) -> Result<Vec<(String, EstimatedSize)>> {
    let (cell_count, var_bytes_for): (u64, Box<dyn Fn(&str) -> u64>) = match schema.array_type {
        tessera_core::ArrayType::Dense => {
            let space = DenseSpace::resolve(schema, subarray)?;
            let cells = space.total_cells().min(u64::MAX as u128) as u64;
            (cells, Box::new(move |_| 0))
        }
        tessera_core::ArrayType::Sparse => {
            let mut decoded = Vec::new();
            let mut tombstones = Vec::new();
            for fragment in fragments {
                match &fragment.kind {
                    FragmentKind::Delete { condition } => {
                        tombstones.push((fragment.timestamp_range.0, condition.clone()));
                    }
                    _ => decoded.push(decode_fragment(schema, fragment)?),
                }
            }
            let cells = materialize_sparse(
                schema,
                &decoded,
                &tombstones,
                subarray,
                None,
                Layout::Unordered,
            )?;
            let count = cells.len() as u64;
            let mut var_totals: FxHashMap<String, u64> = FxHashMap::default();
            for field in fields {
                let mut bytes = 0u64;
                for cell in &cells {
                    if let Some(f) = decoded[cell.frag].fields.get(field) {
                        bytes += f.cell(cell.idx).len() as u64;
                    }
                }
                var_totals.insert(field.clone(), bytes);
            }
            (
                count,
                Box::new(move |name: &str| var_totals.get(name).copied().unwrap_or(0)),
            )
        }
    };

    let mut out = Vec::with_capacity(fields.len());
    for name in fields {
        let (datatype, cvn) = schema
            .field_shape(name)
            .ok_or_else(|| Error::Engine(format!("unknown field '{name}'")))?;
        let est = match cvn {
            CellValNum::Fixed(n) => EstimatedSize {
                data_bytes: cell_count * datatype.size() * n as u64,
                offsets: 0,
                validity: if schema.field_nullable(name) { cell_count } else { 0 },
            },
            CellValNum::Var => {
                let measured = var_bytes_for(name);
                EstimatedSize {
                    // Fill-complete dense estimates assume one element
                    // per cell.
                    data_bytes: if measured > 0 {
                        measured
                    } else {
                        cell_count * datatype.size()
                    },
                    offsets: cell_count,
                    validity: if schema.field_nullable(name) { cell_count } else { 0 },
                }
            }
        };
        out.push((name.clone(), est));
    }
    Ok(out)
}
