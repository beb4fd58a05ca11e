//! Ordering for range queries. Numbers form one family (ints and floats
//! interleave by exact numeric value), strings another; everything else is
//! unordered and fails range predicates rather than the query.

use crate::ast::Value;
use std::cmp::Ordering;

/// Compare two values in collation order. `None` for cross-family pairs,
/// NaN, and kinds that have no ordering (bool, null, refs, lists).
pub fn order_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => cmp_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => cmp_int_float(*y, *x).map(Ordering::reverse),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Exact comparison of an i64 against an f64, without rounding the int
/// through f64 (which would misorder values beyond 2^53).
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f == f64::INFINITY {
        return Some(Ordering::Less);
    }
    if f == f64::NEG_INFINITY {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    // Every float with |f| >= 2^63 is outside i64 range; integral floats
    // inside the range convert exactly.
    if floor < -9_223_372_036_854_775_808.0 {
        return Some(Ordering::Greater);
    }
    if floor >= 9_223_372_036_854_775_808.0 {
        return Some(Ordering::Less);
    }
    let floor_int = floor as i64;
    match i.cmp(&floor_int) {
        Ordering::Equal if f > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}

/// Key for the numeric side of an ordered attribute index. Holds `Int` or a
/// non-NaN `Float` (`-0.0` is normalized to `0.0` so numerically equal
/// floats collapse to one key). The order is numeric; an `Int` and a `Float`
/// that are numerically equal stay distinct keys, with the `Int` first.
#[derive(Debug, Clone)]
pub struct NumKey(Value);

impl NumKey {
    pub fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(Self(value.clone())),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) if *f == 0.0 => Some(Self(Value::Float(0.0))),
            Value::Float(_) => Some(Self(value.clone())),
            _ => None,
        }
    }

    pub fn value(&self) -> &Value { &self.0 }

    /// The smallest key numerically equal to `value`.
    pub fn lower(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Self::new(value),
            Value::Float(f) => {
                let floor = f.floor();
                if floor == *f && cmp_int_float(floor as i64, *f) == Some(Ordering::Equal) {
                    Some(Self(Value::Int(floor as i64)))
                } else {
                    Self::new(value)
                }
            }
            _ => None,
        }
    }

    /// The largest key numerically equal to `value`.
    pub fn upper(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => {
                let f = *i as f64;
                if cmp_int_float(*i, f) == Some(Ordering::Equal) {
                    Self::new(&Value::Float(f))
                } else {
                    Self::new(value)
                }
            }
            Value::Float(_) => Self::new(value),
            _ => None,
        }
    }
}

impl Ord for NumKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match order_cmp(&self.0, &other.0) {
            Some(Ordering::Equal) => match (&self.0, &other.0) {
                (Value::Int(_), Value::Float(_)) => Ordering::Less,
                (Value::Float(_), Value::Int(_)) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            Some(ord) => ord,
            // unreachable by construction: NumKey never holds NaN
            None => Ordering::Equal,
        }
    }
}
impl PartialOrd for NumKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl PartialEq for NumKey {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}
impl Eq for NumKey {}
