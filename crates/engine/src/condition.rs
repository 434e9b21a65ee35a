//! Read-time cell predicates
//!
//! A condition tree filters the cells a read returns: sparse cells that
//! fail are dropped, dense cells that fail read back as fill values.
//! Delete tombstones reuse the same tree to select cells to suppress.

use serde::{Deserialize, Serialize};

use tessera_core::{Datatype, Error, Result, Scalar, SchemaData};

/// Comparison operator for a single-field predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// Strictly less than
    Lt,
    /// Less than or equal
    Le,
    /// Strictly greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Equal
    Eq,
    /// Not equal
    Ne,
}

/// Combinator over condition subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineOp {
    /// Both subtrees must hold
    And,
    /// Either subtree must hold
    Or,
    /// Negate the single subtree
    Not,
}

/// A condition tree over attribute values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionData {
    /// Compare a field's cell against a constant
    Cmp {
        /// Attribute name
        field: String,
        /// Comparison operator
        op: CmpOp,
        /// Constant, encoded as the field's raw cell bytes
        value: Vec<u8>,
    },
    /// Test a nullable field's validity
    NullTest {
        /// Attribute name
        field: String,
        /// True tests for null, false for non-null
        is_null: bool,
    },
    /// Set membership over constants
    InSet {
        /// Attribute name
        field: String,
        /// Member constants, each encoded as raw cell bytes
        members: Vec<Vec<u8>>,
        /// True inverts the test
        negate: bool,
    },
    /// Combined subtrees
    Combine {
        /// Combinator
        op: CombineOp,
        /// Left (or only, for `Not`) subtree
        lhs: Box<ConditionData>,
        /// Right subtree; absent for `Not`
        rhs: Option<Box<ConditionData>>,
    },
}

/// One cell's value as seen by the evaluator
#[derive(Debug, Clone)]
pub struct CellView {
    /// Raw cell bytes
    pub bytes: Vec<u8>,
    /// False when the cell is null
    pub valid: bool,
}

impl ConditionData {
    /// Every attribute a condition tree references must exist and must
    /// not be a dimension
    pub fn check(&self, schema: &SchemaData) -> Result<()> {
        match self {
            ConditionData::Cmp { field, .. }
            | ConditionData::NullTest { field, .. }
            | ConditionData::InSet { field, .. } => {
                if schema.is_dimension(field) {
                    return Err(Error::Engine(format!(
                        "conditions apply to attributes, '{field}' is a dimension"
                    )));
                }
                if schema.attribute(field).is_none() {
                    return Err(Error::Engine(format!(
                        "condition references unknown attribute '{field}'"
                    )));
                }
                if let ConditionData::NullTest { field, .. } = self {
                    if !schema.field_nullable(field) {
                        return Err(Error::Engine(format!(
                            "null test on non-nullable attribute '{field}'"
                        )));
                    }
                }
                Ok(())
            }
            ConditionData::Combine { op, lhs, rhs } => {
                lhs.check(schema)?;
                match (op, rhs) {
                    (CombineOp::Not, None) => Ok(()),
                    (CombineOp::Not, Some(_)) => {
                        Err(Error::Engine("negation combines a single condition".into()))
                    }
                    (_, Some(rhs)) => rhs.check(schema),
                    (_, None) => Err(Error::Engine(
                        "binary combination requires two conditions".into(),
                    )),
                }
            }
        }
    }

    /// Evaluate against one cell, looking fields up through `cell`
    pub fn eval(
        &self,
        schema: &SchemaData,
        cell: &dyn Fn(&str) -> Result<CellView>,
    ) -> Result<bool> {
        match self {
            ConditionData::Cmp { field, op, value } => {
                let view = cell(field)?;
                if !view.valid {
                    return Ok(false);
                }
                let datatype = schema
                    .field_shape(field)
                    .map(|(dt, _)| dt)
                    .unwrap_or(Datatype::Blob);
                Ok(apply_cmp(datatype, &view.bytes, *op, value))
            }
            ConditionData::NullTest { field, is_null } => {
                let view = cell(field)?;
                Ok(view.valid != *is_null)
            }
            ConditionData::InSet {
                field,
                members,
                negate,
            } => {
                let view = cell(field)?;
                if !view.valid {
                    return Ok(false);
                }
                let found = members.iter().any(|m| *m == view.bytes);
                Ok(found != *negate)
            }
            ConditionData::Combine { op, lhs, rhs } => {
                let left = lhs.eval(schema, cell)?;
                match op {
                    CombineOp::Not => Ok(!left),
                    CombineOp::And => {
                        if !left {
                            return Ok(false);
                        }
                        rhs.as_ref().expect("checked").eval(schema, cell)
                    }
                    CombineOp::Or => {
                        if left {
                            return Ok(true);
                        }
                        rhs.as_ref().expect("checked").eval(schema, cell)
                    }
                }
            }
        }
    }
}

/// Ordered comparison of a cell against a constant
///
/// Single-element fixed cells compare as decoded scalars; everything
/// else (strings, multi-value cells) compares lexicographically by
/// bytes, which matches the ASCII ordering for string attributes.
fn apply_cmp(datatype: Datatype, cell: &[u8], op: CmpOp, constant: &[u8]) -> bool {
    use std::cmp::Ordering;
    let ordering = if cell.len() == datatype.size() as usize && constant.len() == cell.len() {
        match (
            Scalar::from_le_bytes(datatype, cell),
            Scalar::from_le_bytes(datatype, constant),
        ) {
            (Ok(a), Ok(b)) => a.cmp_same_class(&b),
            _ => cell.cmp(constant),
        }
    } else {
        cell.cmp(constant)
    };
    match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ArrayType, AttributeData, CellValNum, DimensionData, FilterListData};

    fn schema() -> SchemaData {
        let mut s = SchemaData::new(ArrayType::Sparse);
        s.domain.dimensions.push(DimensionData {
            name: "d".into(),
            datatype: Datatype::Int32,
            cell_val_num: CellValNum::single(),
            domain: Some((0i32.to_le_bytes().to_vec(), 9i32.to_le_bytes().to_vec())),
            tile_extent: Some(2i32.to_le_bytes().to_vec()),
            filters: FilterListData::new(),
        });
        let mut a = AttributeData::new("a", Datatype::Int32);
        a.nullable = true;
        s.attributes.push(a);
        s
    }

    fn int_cell(v: i32) -> CellView {
        CellView {
            bytes: v.to_le_bytes().to_vec(),
            valid: true,
        }
    }

    #[test]
    fn test_cmp_ops() {
        let schema = schema();
        let cond = ConditionData::Cmp {
            field: "a".into(),
            op: CmpOp::Lt,
            value: 5i32.to_le_bytes().to_vec(),
        };
        cond.check(&schema).unwrap();
        assert!(cond.eval(&schema, &|_| Ok(int_cell(4))).unwrap());
        assert!(!cond.eval(&schema, &|_| Ok(int_cell(5))).unwrap());
    }

    #[test]
    fn test_negative_values_compare_signed() {
        let schema = schema();
        let cond = ConditionData::Cmp {
            field: "a".into(),
            op: CmpOp::Lt,
            value: 1i32.to_le_bytes().to_vec(),
        };
        // Byte-wise comparison would order -1 above 1; scalar decoding
        // must not.
        assert!(cond.eval(&schema, &|_| Ok(int_cell(-1))).unwrap());
    }

    #[test]
    fn test_null_cells_fail_comparisons() {
        let schema = schema();
        let cond = ConditionData::Cmp {
            field: "a".into(),
            op: CmpOp::Eq,
            value: 0i32.to_le_bytes().to_vec(),
        };
        let null = CellView {
            bytes: vec![0; 4],
            valid: false,
        };
        assert!(!cond.eval(&schema, &|_| Ok(null.clone())).unwrap());

        let is_null = ConditionData::NullTest {
            field: "a".into(),
            is_null: true,
        };
        is_null.check(&schema).unwrap();
        assert!(is_null.eval(&schema, &|_| Ok(null.clone())).unwrap());
        assert!(!is_null.eval(&schema, &|_| Ok(int_cell(1))).unwrap());
    }

    #[test]
    fn test_combinators() {
        let schema = schema();
        let lt5 = ConditionData::Cmp {
            field: "a".into(),
            op: CmpOp::Lt,
            value: 5i32.to_le_bytes().to_vec(),
        };
        let gt2 = ConditionData::Cmp {
            field: "a".into(),
            op: CmpOp::Gt,
            value: 2i32.to_le_bytes().to_vec(),
        };
        let both = ConditionData::Combine {
            op: CombineOp::And,
            lhs: Box::new(lt5.clone()),
            rhs: Some(Box::new(gt2)),
        };
        both.check(&schema).unwrap();
        assert!(both.eval(&schema, &|_| Ok(int_cell(3))).unwrap());
        assert!(!both.eval(&schema, &|_| Ok(int_cell(7))).unwrap());

        let not = ConditionData::Combine {
            op: CombineOp::Not,
            lhs: Box::new(lt5),
            rhs: None,
        };
        assert!(not.eval(&schema, &|_| Ok(int_cell(7))).unwrap());
    }

    #[test]
    fn test_check_rejects_dimensions_and_unknowns() {
        let schema = schema();
        let on_dim = ConditionData::Cmp {
            field: "d".into(),
            op: CmpOp::Eq,
            value: vec![0; 4],
        };
        assert!(on_dim.check(&schema).is_err());

        let unknown = ConditionData::Cmp {
            field: "zzz".into(),
            op: CmpOp::Eq,
            value: vec![0; 4],
        };
        assert!(unknown.check(&schema).is_err());
    }

    #[test]
    fn test_in_set() {
        let schema = schema();
        let cond = ConditionData::InSet {
            field: "a".into(),
            members: vec![1i32.to_le_bytes().to_vec(), 3i32.to_le_bytes().to_vec()],
            negate: false,
        };
        assert!(cond.eval(&schema, &|_| Ok(int_cell(3))).unwrap());
        assert!(!cond.eval(&schema, &|_| Ok(int_cell(2))).unwrap());
    }
}
