//! Query conditions
//!
//! A condition filters the cells a read returns: attribute comparisons,
//! null tests and set membership, combinable with and/or/not. Sparse
//! cells failing the condition are dropped; dense cells read back as
//! fill values.

use tessera_core::{PhysicalType, Result, to_le_bytes};
use tessera_engine::{CmpOp, CombineOp, ConditionData};

/// A cell predicate over attribute values
#[derive(Debug, Clone)]
pub struct QueryCondition {
    data: ConditionData,
}

macro_rules! cmp_constructor {
    ($(#[$meta:meta])* $name:ident, $op:expr) => {
        $(#[$meta])*
        pub fn $name<T: PhysicalType>(field: &str, value: T) -> QueryCondition {
            QueryCondition {
                data: ConditionData::Cmp {
                    field: field.to_string(),
                    op: $op,
                    value: to_le_bytes(&[value]),
                },
            }
        }
    };
}

impl QueryCondition {
    pub(crate) fn data(&self) -> &ConditionData {
        &self.data
    }

    pub(crate) fn into_data(self) -> ConditionData {
        self.data
    }

    cmp_constructor!(
        /// Cells where `field < value`
        lt,
        CmpOp::Lt
    );
    cmp_constructor!(
        /// Cells where `field <= value`
        le,
        CmpOp::Le
    );
    cmp_constructor!(
        /// Cells where `field > value`
        gt,
        CmpOp::Gt
    );
    cmp_constructor!(
        /// Cells where `field >= value`
        ge,
        CmpOp::Ge
    );
    cmp_constructor!(
        /// Cells where `field == value`
        eq,
        CmpOp::Eq
    );
    cmp_constructor!(
        /// Cells where `field != value`
        ne,
        CmpOp::Ne
    );

    /// Cells where a string attribute equals `value`
    pub fn eq_str(field: &str, value: &str) -> QueryCondition {
        QueryCondition {
            data: ConditionData::Cmp {
                field: field.to_string(),
                op: CmpOp::Eq,
                value: value.as_bytes().to_vec(),
            },
        }
    }

    /// Cells where a nullable attribute is null
    pub fn is_null(field: &str) -> QueryCondition {
        QueryCondition {
            data: ConditionData::NullTest {
                field: field.to_string(),
                is_null: true,
            },
        }
    }

    /// Cells where a nullable attribute is not null
    pub fn not_null(field: &str) -> QueryCondition {
        QueryCondition {
            data: ConditionData::NullTest {
                field: field.to_string(),
                is_null: false,
            },
        }
    }

    /// Cells whose value is one of `members`
    pub fn in_set<T: PhysicalType>(field: &str, members: &[T]) -> QueryCondition {
        QueryCondition {
            data: ConditionData::InSet {
                field: field.to_string(),
                members: members.iter().map(|m| to_le_bytes(&[*m])).collect(),
                negate: false,
            },
        }
    }

    /// Cells whose value is none of `members`
    pub fn not_in_set<T: PhysicalType>(field: &str, members: &[T]) -> QueryCondition {
        QueryCondition {
            data: ConditionData::InSet {
                field: field.to_string(),
                members: members.iter().map(|m| to_le_bytes(&[*m])).collect(),
                negate: true,
            },
        }
    }

    /// Both this and `other` must hold
    pub fn and(self, other: QueryCondition) -> QueryCondition {
        QueryCondition {
            data: ConditionData::Combine {
                op: CombineOp::And,
                lhs: Box::new(self.data),
                rhs: Some(Box::new(other.data)),
            },
        }
    }

    /// Either this or `other` must hold
    pub fn or(self, other: QueryCondition) -> QueryCondition {
        QueryCondition {
            data: ConditionData::Combine {
                op: CombineOp::Or,
                lhs: Box::new(self.data),
                rhs: Some(Box::new(other.data)),
            },
        }
    }

    /// This must not hold
    pub fn negate(self) -> QueryCondition {
        QueryCondition {
            data: ConditionData::Combine {
                op: CombineOp::Not,
                lhs: Box::new(self.data),
                rhs: None,
            },
        }
    }

    /// A condition can always be validated eagerly against a schema
    pub(crate) fn check(&self, schema: &tessera_core::SchemaData) -> Result<()> {
        self.data.check(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinators_build_trees() {
        let cond = QueryCondition::ge("a", 10i32)
            .and(QueryCondition::lt("a", 20i32))
            .or(QueryCondition::eq("b", 0i64).negate());
        // Shape check only; evaluation is covered by the engine tests.
        match cond.data() {
            ConditionData::Combine { op, .. } => assert_eq!(*op, CombineOp::Or),
            _ => panic!("expected a combined condition"),
        }
    }
}
