//! Quarryql is the query half of the quarry index engine: the `Value` model
//! shared between index keys and query operands, dotted attribute paths,
//! predicate expressions with programmatic builders, and predicate
//! evaluation against last-indexed snapshots.
//!
//! There is deliberately no textual query language here; expressions are
//! assembled with [`build::Q`] and stay inspectable as plain data.

pub mod ast;
pub mod build;
pub mod collation;
pub mod selection;

pub use ast::{ComparisonOperator, PathExpr, Predicate, Value};
pub use build::Q;
