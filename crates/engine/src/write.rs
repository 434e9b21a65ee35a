//! Write execution
//!
//! Validates buffered cells against the schema, normalizes the cell
//! order, and builds one immutable fragment per submit. Dense writes
//! target an inclusive per-dimension box and must supply exactly the
//! box's cell count; sparse writes carry coordinates in the dimension
//! buffers.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use uuid::Uuid;

use tessera_core::{CellValNum, Datatype, Error, Layout, Result, Scalar, SchemaData};

use crate::array::ArrayEntry;
use crate::fragment::{wants_compression, FieldBlock, Fragment, FragmentKind, Payload};
use crate::params::EngineParams;
use crate::request::{FieldInput, SubarrayData, WriteInput};

/// Validate one field's buffers and return its cell count
fn field_cell_count(
    name: &str,
    input: &FieldInput,
    datatype: Datatype,
    cell_val_num: CellValNum,
    nullable: bool,
) -> Result<u64> {
    let cells = match cell_val_num {
        CellValNum::Fixed(n) => {
            if input.offsets.is_some() {
                return Err(Error::type_mismatch(
                    name,
                    "no offsets buffer for a fixed-size field",
                    "an offsets buffer",
                ));
            }
            let cell = datatype.size() * n as u64;
            if input.data.len() as u64 % cell != 0 {
                return Err(Error::type_mismatch(
                    name,
                    format!("a multiple of {cell} bytes"),
                    format!("{} bytes", input.data.len()),
                ));
            }
            input.data.len() as u64 / cell
        }
        CellValNum::Var => {
            let offsets = input.offsets.as_ref().ok_or_else(|| {
                Error::type_mismatch(name, "an offsets buffer for a var-size field", "none")
            })?;
            let mut prev = 0u64;
            for (i, off) in offsets.iter().enumerate() {
                if (i == 0 && *off != 0) || *off < prev || *off > input.data.len() as u64 {
                    return Err(Error::type_mismatch(
                        name,
                        "monotone byte offsets starting at 0",
                        format!("offset {off} at position {i}"),
                    ));
                }
                prev = *off;
            }
            offsets.len() as u64
        }
    };
    match (&input.validity, nullable) {
        (Some(validity), true) => {
            if validity.len() as u64 != cells {
                return Err(Error::type_mismatch(
                    name,
                    format!("{cells} validity bytes"),
                    format!("{}", validity.len()),
                ));
            }
        }
        (None, true) => {
            return Err(Error::type_mismatch(
                name,
                "a validity buffer for a nullable attribute",
                "none",
            ));
        }
        (Some(_), false) => {
            return Err(Error::type_mismatch(
                name,
                "no validity buffer for a non-nullable field",
                "a validity buffer",
            ));
        }
        (None, false) => {}
    }
    Ok(cells)
}

/// Cell bytes of `idx` within a var-size input
fn var_cell<'a>(data: &'a [u8], offsets: &[u64], idx: usize) -> &'a [u8] {
    let start = offsets[idx] as usize;
    let end = offsets
        .get(idx + 1)
        .map(|o| *o as usize)
        .unwrap_or(data.len());
    &data[start..end]
}

/// Reorder a field's cells by `perm`, where output cell `i` takes input
/// cell `perm[i]`
fn permute_field(input: &FieldInput, cell_size: Option<u64>, perm: &[usize]) -> FieldInput {
    match cell_size {
        Some(cell) => {
            let cell = cell as usize;
            let mut data = Vec::with_capacity(input.data.len());
            for &src in perm {
                data.extend_from_slice(&input.data[src * cell..(src + 1) * cell]);
            }
            FieldInput {
                data,
                offsets: None,
                validity: input
                    .validity
                    .as_ref()
                    .map(|v| perm.iter().map(|&src| v[src]).collect()),
            }
        }
        None => {
            let offsets_in = input.offsets.as_ref().expect("validated var field");
            let mut data = Vec::with_capacity(input.data.len());
            let mut offsets = Vec::with_capacity(perm.len());
            for &src in perm {
                offsets.push(data.len() as u64);
                data.extend_from_slice(var_cell(&input.data, offsets_in, src));
            }
            FieldInput {
                data,
                offsets: Some(offsets),
                validity: input
                    .validity
                    .as_ref()
                    .map(|v| perm.iter().map(|&src| v[src]).collect()),
            }
        }
    }
}

/// Column-major to row-major permutation over a box with `extents`
fn col_to_row_perm(extents: &[u64]) -> Vec<usize> {
    let total: u64 = extents.iter().product();
    let ndim = extents.len();
    let mut perm = Vec::with_capacity(total as usize);
    for i in 0..total {
        // Row-major multi-index of output position i.
        let mut rem = i;
        let mut pos = vec![0u64; ndim];
        for k in (0..ndim).rev() {
            pos[k] = rem % extents[k];
            rem /= extents[k];
        }
        // Column-major source ordinal of that multi-index.
        let mut src = 0u64;
        let mut stride = 1u64;
        for k in 0..ndim {
            src += pos[k] * stride;
            stride *= extents[k];
        }
        perm.push(src as usize);
    }
    perm
}

/// Resolve a dense write target box to per-dimension index bounds
fn resolve_dense_box(
    schema: &SchemaData,
    subarray: Option<&SubarrayData>,
    check_bounds: bool,
) -> Result<Vec<(i128, i128)>> {
    let dims = &schema.domain.dimensions;
    let mut bounds = Vec::with_capacity(dims.len());
    for (idx, dim) in dims.iter().enumerate() {
        let (dom_lo, dom_hi) = dim
            .bounds()?
            .ok_or_else(|| Error::Engine("dense domains are always bounded".into()))?;
        let (dom_lo, dom_hi) = (
            dom_lo.as_index().expect("dense coordinates are integral"),
            dom_hi.as_index().expect("dense coordinates are integral"),
        );
        let ranges = subarray.map(|s| &s.dims[idx]);
        let (lo, hi) = match ranges {
            Some(ranges) if !ranges.is_empty() => {
                if ranges.len() > 1 {
                    return Err(Error::Engine(
                        "dense writes take exactly one range per dimension".into(),
                    ));
                }
                let lo = Scalar::from_le_bytes(dim.datatype, &ranges[0].start)?;
                let hi = Scalar::from_le_bytes(dim.datatype, &ranges[0].end)?;
                (
                    lo.as_index().ok_or_else(|| {
                        Error::Engine("dense coordinates must be integral".into())
                    })?,
                    hi.as_index().ok_or_else(|| {
                        Error::Engine("dense coordinates must be integral".into())
                    })?,
                )
            }
            _ => (dom_lo, dom_hi),
        };
        if lo > hi {
            return Err(Error::Engine(format!(
                "dimension '{}' range is inverted",
                dim.name
            )));
        }
        if check_bounds && (lo < dom_lo || hi > dom_hi) {
            return Err(Error::Engine(format!(
                "dimension '{}' range [{lo}, {hi}] exceeds the domain [{dom_lo}, {dom_hi}]",
                dim.name
            )));
        }
        bounds.push((lo, hi));
    }
    Ok(bounds)
}

fn encode_index(datatype: Datatype, value: i128) -> Vec<u8> {
    let size = datatype.size() as usize;
    let wide = (value as i64).to_le_bytes();
    wide[..size].to_vec()
}

/// Execute one write submit, appending a fragment to the array
pub fn execute_write(
    entry: &ArrayEntry,
    schema: &SchemaData,
    params: &EngineParams,
    input: WriteInput,
    timestamp: u64,
) -> Result<std::sync::Arc<Fragment>> {
    match schema.array_type {
        tessera_core::ArrayType::Dense => {
            write_dense(entry, schema, params, input, timestamp)
        }
        tessera_core::ArrayType::Sparse => {
            write_sparse(entry, schema, params, input, timestamp)
        }
    }
}

fn check_field_cover(
    schema: &SchemaData,
    input: &WriteInput,
    want_dims: bool,
) -> Result<()> {
    let mut seen = FxHashSet::default();
    for (name, _) in &input.fields {
        if !seen.insert(name.as_str()) {
            return Err(Error::Engine(format!("field '{name}' buffered twice")));
        }
        let is_dim = schema.is_dimension(name);
        if is_dim && !want_dims {
            return Err(Error::Engine(format!(
                "dense writes do not buffer dimension '{name}'"
            )));
        }
        if !is_dim && !schema.is_attribute(name) {
            return Err(Error::Engine(format!("unknown field '{name}'")));
        }
    }
    for attr in &schema.attributes {
        if !seen.contains(attr.name.as_str()) {
            return Err(Error::Engine(format!(
                "write is missing a buffer for attribute '{}'",
                attr.name
            )));
        }
    }
    if want_dims {
        for dim in &schema.domain.dimensions {
            if !seen.contains(dim.name.as_str()) {
                return Err(Error::Engine(format!(
                    "sparse write is missing coordinates for dimension '{}'",
                    dim.name
                )));
            }
        }
    }
    Ok(())
}

/// Cell counts of every buffered field, which must all agree
fn uniform_cell_count(schema: &SchemaData, input: &WriteInput) -> Result<u64> {
    let mut agreed: Option<u64> = None;
    for (name, field) in &input.fields {
        let (datatype, cvn) = schema
            .field_shape(name)
            .ok_or_else(|| Error::Engine(format!("unknown field '{name}'")))?;
        let nullable = schema.field_nullable(name);
        let cells = field_cell_count(name, field, datatype, cvn, nullable)?;
        match agreed {
            None => agreed = Some(cells),
            Some(prev) if prev != cells => {
                return Err(Error::Engine(format!(
                    "field '{name}' buffers {cells} cells, other fields buffer {prev}"
                )));
            }
            _ => {}
        }
    }
    agreed.ok_or_else(|| Error::Engine("write has no buffered fields".into()))
}

fn build_fragment(
    entry: &ArrayEntry,
    schema: &SchemaData,
    kind: FragmentKind,
    fields: Vec<(String, FieldInput)>,
    cell_count: u64,
    timestamp: u64,
) -> Result<std::sync::Arc<Fragment>> {
    let id = Uuid::new_v4();
    let mut blocks = FxHashMap::default();
    for (name, field) in fields {
        let compress = wants_compression(schema, &name);
        blocks.insert(
            name,
            FieldBlock {
                data: Payload::store(field.data, compress)?,
                offsets: field.offsets,
                validity: field.validity,
            },
        );
    }
    let fragment = Fragment {
        uri: Fragment::make_uri(&entry.uri, timestamp, &id),
        id,
        kind,
        timestamp_range: (timestamp, timestamp),
        cell_count,
        fields: blocks,
    };
    debug!(array = %entry.uri, fragment = %fragment.uri, cells = cell_count, "fragment written");
    Ok(entry.push_fragment(fragment))
}

fn write_dense(
    entry: &ArrayEntry,
    schema: &SchemaData,
    params: &EngineParams,
    input: WriteInput,
    timestamp: u64,
) -> Result<std::sync::Arc<Fragment>> {
    if !matches!(
        input.layout,
        Layout::RowMajor | Layout::ColMajor | Layout::GlobalOrder
    ) {
        return Err(Error::Engine(format!(
            "layout {} is not valid for a dense write",
            input.layout
        )));
    }
    check_field_cover(schema, &input, false)?;
    let cells = uniform_cell_count(schema, &input)?;

    let bounds = resolve_dense_box(schema, input.subarray.as_ref(), params.check_coord_bounds)?;
    let extents: Vec<u64> = bounds.iter().map(|(lo, hi)| (hi - lo + 1) as u64).collect();
    let expected: u128 = extents.iter().map(|e| *e as u128).product();
    if cells as u128 != expected {
        return Err(Error::Engine(format!(
            "dense write buffers {cells} cells, the target box holds {expected}"
        )));
    }

    let fields = if input.layout == Layout::ColMajor {
        let perm = col_to_row_perm(&extents);
        input
            .fields
            .into_iter()
            .map(|(name, field)| {
                let (datatype, cvn) = schema.field_shape(&name).expect("covered");
                let cell_size = cvn.fixed().map(|n| datatype.size() * n as u64);
                let permuted = permute_field(&field, cell_size, &perm);
                (name, permuted)
            })
            .collect()
    } else {
        input.fields
    };

    let dims = &schema.domain.dimensions;
    let subarray = bounds
        .iter()
        .zip(dims)
        .map(|((lo, hi), dim)| (encode_index(dim.datatype, *lo), encode_index(dim.datatype, *hi)))
        .collect();
    build_fragment(
        entry,
        schema,
        FragmentKind::Dense { subarray },
        fields,
        cells,
        timestamp,
    )
}

fn write_sparse(
    entry: &ArrayEntry,
    schema: &SchemaData,
    params: &EngineParams,
    input: WriteInput,
    timestamp: u64,
) -> Result<std::sync::Arc<Fragment>> {
    if !matches!(input.layout, Layout::Unordered | Layout::GlobalOrder) {
        return Err(Error::Engine(format!(
            "layout {} is not valid for a sparse write",
            input.layout
        )));
    }
    if input.subarray.as_ref().is_some_and(|s| !s.is_unconstrained()) {
        return Err(Error::Engine("sparse writes take no subarray".into()));
    }
    check_field_cover(schema, &input, true)?;
    let cells = uniform_cell_count(schema, &input)?;

    let by_name: FxHashMap<&str, &FieldInput> = input
        .fields
        .iter()
        .map(|(n, f)| (n.as_str(), f))
        .collect();

    // Coordinate keys per cell, for bounds and duplicate handling.
    let mut keys: Vec<Vec<u8>> = vec![Vec::new(); cells as usize];
    for dim in &schema.domain.dimensions {
        let field = by_name[dim.name.as_str()];
        for (i, key) in keys.iter_mut().enumerate() {
            let coord = match &field.offsets {
                Some(offsets) => var_cell(&field.data, offsets, i),
                None => {
                    let cell = dim.datatype.size() as usize;
                    &field.data[i * cell..(i + 1) * cell]
                }
            };
            if params.check_coord_bounds {
                if let Some((lo, hi)) = dim.bounds()? {
                    let value = Scalar::from_le_bytes(dim.datatype, coord)?;
                    use std::cmp::Ordering::{Greater, Less};
                    if value.cmp_same_class(&lo) == Less || value.cmp_same_class(&hi) == Greater {
                        return Err(Error::Engine(format!(
                            "coordinate outside the domain of dimension '{}'",
                            dim.name
                        )));
                    }
                }
            }
            key.extend_from_slice(&(coord.len() as u32).to_le_bytes());
            key.extend_from_slice(coord);
        }
    }

    let mut kept: Vec<usize> = (0..cells as usize).collect();
    if params.check_coord_dups || params.dedup_coords {
        let mut last_for: FxHashMap<&[u8], usize> = FxHashMap::default();
        for (i, key) in keys.iter().enumerate() {
            if let Some(_prev) = last_for.insert(key.as_slice(), i) {
                if params.check_coord_dups && !params.dedup_coords {
                    return Err(Error::Engine(
                        "duplicate coordinates in a sparse write".into(),
                    ));
                }
            }
        }
        if params.dedup_coords && last_for.len() != keys.len() {
            kept = (0..cells as usize)
                .filter(|i| last_for[keys[*i].as_slice()] == *i)
                .collect();
        }
    }

    let (fields, cell_count) = if kept.len() == cells as usize {
        (input.fields, cells)
    } else {
        let count = kept.len() as u64;
        let fields = input
            .fields
            .into_iter()
            .map(|(name, field)| {
                let (datatype, cvn) = schema.field_shape(&name).expect("covered");
                let cell_size = cvn.fixed().map(|n| datatype.size() * n as u64);
                let filtered = permute_field(&field, cell_size, &kept);
                (name, filtered)
            })
            .collect();
        (fields, count)
    };

    build_fragment(
        entry,
        schema,
        FragmentKind::Sparse,
        fields,
        cell_count,
        timestamp,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_to_row_perm_2x3() {
        // Column-major cells of a 2x3 box arrive as (0,0) (1,0) (0,1)
        // (1,1) (0,2) (1,2); row-major order visits (0,0) (0,1) (0,2)
        // (1,0) (1,1) (1,2).
        assert_eq!(col_to_row_perm(&[2, 3]), vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_perm_identity_1d() {
        assert_eq!(col_to_row_perm(&[4]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_field_cell_count_fixed() {
        let input = FieldInput {
            data: vec![0u8; 12],
            offsets: None,
            validity: None,
        };
        let cells =
            field_cell_count("a", &input, Datatype::Int32, CellValNum::single(), false).unwrap();
        assert_eq!(cells, 3);
    }

    #[test]
    fn test_field_cell_count_rejects_misaligned() {
        let input = FieldInput {
            data: vec![0u8; 10],
            offsets: None,
            validity: None,
        };
        assert!(
            field_cell_count("a", &input, Datatype::Int32, CellValNum::single(), false).is_err()
        );
    }

    #[test]
    fn test_var_offsets_must_start_at_zero() {
        let input = FieldInput {
            data: vec![0u8; 8],
            offsets: Some(vec![2, 4]),
            validity: None,
        };
        assert!(
            field_cell_count("a", &input, Datatype::StringUtf8, CellValNum::Var, false).is_err()
        );
    }

    #[test]
    fn test_nullable_requires_validity() {
        let input = FieldInput {
            data: vec![0u8; 8],
            offsets: None,
            validity: None,
        };
        assert!(
            field_cell_count("a", &input, Datatype::Int32, CellValNum::single(), true).is_err()
        );
    }
}
