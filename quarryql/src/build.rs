//! Programmatic predicate constructors. Queries are built with these rather
//! than parsed from text:
//!
//! ```
//! use quarryql::build::Q;
//!
//! let q = Q::and_([
//!     Q::eq("active", true),
//!     Q::or_([Q::gt("score", 70.0), Q::lt("num", 3)]),
//! ]);
//! assert_eq!(q.to_string(), "(active = true AND (score > 70 OR num < 3))");
//! ```

use crate::ast::{ComparisonOperator, PathExpr, Predicate, Value};

pub struct Q;

impl Q {
    fn cmp(path: impl Into<PathExpr>, operator: ComparisonOperator, operands: Vec<Value>) -> Predicate {
        Predicate::Comparison { path: path.into(), operator, operands }
    }

    pub fn eq(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::Equal, vec![value.into()])
    }

    pub fn ne(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::NotEqual, vec![value.into()])
    }

    pub fn lt(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::LessThan, vec![value.into()])
    }

    pub fn le(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::LessThanOrEqual, vec![value.into()])
    }

    pub fn gt(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::GreaterThan, vec![value.into()])
    }

    pub fn ge(path: impl Into<PathExpr>, value: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::GreaterThanOrEqual, vec![value.into()])
    }

    /// Closed interval: `lo <= path <= hi`.
    pub fn bt(path: impl Into<PathExpr>, lo: impl Into<Value>, hi: impl Into<Value>) -> Predicate {
        Self::cmp(path, ComparisonOperator::Between, vec![lo.into(), hi.into()])
    }

    pub fn in_<V: Into<Value>>(path: impl Into<PathExpr>, values: impl IntoIterator<Item = V>) -> Predicate {
        Self::cmp(path, ComparisonOperator::In, values.into_iter().map(Into::into).collect())
    }

    pub fn and_(children: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::And(children.into_iter().collect())
    }

    pub fn or_(children: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::Or(children.into_iter().collect())
    }
}
