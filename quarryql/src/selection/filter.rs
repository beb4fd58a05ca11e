//! Filter items based on a predicate. This is how derived views decide
//! membership when an object changes: the index search pre-filters
//! candidates, and this module re-evaluates the full predicate against the
//! object's last-indexed terminals.

use crate::ast::{ComparisonOperator, PathExpr, Predicate, Value};
use crate::collation::order_cmp;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("operator {operator} expects {expected} operand(s), got {got}")]
    InvalidOperands { operator: ComparisonOperator, expected: usize, got: usize },
}

/// Anything a predicate can be evaluated against: a snapshot of the terminal
/// values each registered path currently produces for the item.
///
/// `None` means the path was never registered on the item (distinct from a
/// dangling path, which resolves to `Value::Missing` terminals).
pub trait Filterable {
    fn terminals(&self, path: &PathExpr) -> Option<Vec<Value>>;
}

fn operand<'a>(operator: ComparisonOperator, operands: &'a [Value], i: usize) -> Result<&'a Value, Error> {
    operands.get(i).ok_or(Error::InvalidOperands {
        operator,
        expected: operator.arity().unwrap_or(1),
        got: operands.len(),
    })
}

/// Does a single terminal satisfy the comparison? Cross-family comparisons
/// are false, never an error.
fn satisfies(terminal: &Value, operator: ComparisonOperator, operands: &[Value]) -> Result<bool, Error> {
    Ok(match operator {
        ComparisonOperator::Equal => terminal.matches(operand(operator, operands, 0)?),
        // NotEqual is handled at the predicate level; as a per-terminal test
        // (used by change routing) it is the plain negation
        ComparisonOperator::NotEqual => !terminal.matches(operand(operator, operands, 0)?),
        ComparisonOperator::In => operands.iter().any(|v| terminal.matches(v)),
        ComparisonOperator::LessThan => order_cmp(terminal, operand(operator, operands, 0)?) == Some(Ordering::Less),
        ComparisonOperator::LessThanOrEqual => {
            matches!(order_cmp(terminal, operand(operator, operands, 0)?), Some(Ordering::Less | Ordering::Equal))
        }
        ComparisonOperator::GreaterThan => order_cmp(terminal, operand(operator, operands, 0)?) == Some(Ordering::Greater),
        ComparisonOperator::GreaterThanOrEqual => {
            matches!(order_cmp(terminal, operand(operator, operands, 0)?), Some(Ordering::Greater | Ordering::Equal))
        }
        ComparisonOperator::Between => {
            let lo = operand(operator, operands, 0)?;
            let hi = operand(operator, operands, 1)?;
            matches!(order_cmp(terminal, lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(order_cmp(terminal, hi), Some(Ordering::Less | Ordering::Equal))
        }
    })
}

/// Per-terminal satisfaction test, exposed for change routing: a watcher
/// fires when an old or new terminal satisfies its comparison.
pub fn terminal_satisfies(terminal: &Value, operator: ComparisonOperator, operands: &[Value]) -> bool {
    satisfies(terminal, operator, operands).unwrap_or(false)
}

pub fn evaluate_predicate<I: Filterable>(item: &I, predicate: &Predicate) -> Result<bool, Error> {
    match predicate {
        Predicate::Comparison { path, operator, operands } => {
            let Some(terminals) = item.terminals(path) else {
                return Ok(false);
            };
            match operator {
                // "no terminal equals v", over at least one resolved terminal.
                // A dangling path (all Missing) fails the predicate.
                ComparisonOperator::NotEqual => {
                    let v = operand(*operator, operands, 0)?;
                    Ok(terminals.iter().any(|t| !t.is_missing()) && !terminals.iter().any(|t| t.matches(v)))
                }
                // everything else is existential over the fan-out
                _ => {
                    for t in &terminals {
                        if satisfies(t, *operator, operands)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        }
        Predicate::And(children) => {
            for child in children {
                if !evaluate_predicate(item, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(children) => {
            for child in children {
                if evaluate_predicate(item, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum FilterResult<R> {
    Pass(R),
    Skip(R),
    Error(R, Error),
}

pub struct FilterIterator<I> {
    iter: I,
    predicate: Predicate,
}

impl<I, R> FilterIterator<I>
where
    I: Iterator<Item = R>,
    R: Filterable,
{
    pub fn new(iter: I, predicate: Predicate) -> Self { Self { iter, predicate } }
}

impl<I, R> Iterator for FilterIterator<I>
where
    I: Iterator<Item = R>,
    R: Filterable,
{
    type Item = FilterResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|item| match evaluate_predicate(&item, &self.predicate) {
            Ok(true) => FilterResult::Pass(item),
            Ok(false) => FilterResult::Skip(item),
            Err(e) => FilterResult::Error(item, e),
        })
    }
}
