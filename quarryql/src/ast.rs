use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use ulid::Ulid;

/// A dynamically typed value, used both as a query operand and as an index key.
///
/// Key equality (the `Eq`/`Hash` impls) is structural: floats compare by bit
/// pattern so that `Value` is usable as a hash-map key, and `Int(k)` is a
/// distinct key from `Float(k as f64)`. Query-level equality goes through
/// [`Value::matches`], which additionally excludes NaN from ever comparing
/// equal. Ordering lives in [`crate::collation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    /// Sentinel for a path whose terminal could not be resolved (an
    /// intermediate attribute is absent, or a link was replaced by a
    /// non-traversable scalar). Objects dangling on a path are filed under
    /// this key, so it is queryable and shows up in group-by maps.
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Reference to a tracked object, keyed by its registry id.
    Ref(Ulid),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Missing => "missing",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Ref(_) => "ref",
            Value::List(_) => "list",
        }
    }

    pub fn is_missing(&self) -> bool { matches!(self, Value::Missing) }

    pub fn is_nan(&self) -> bool { matches!(self, Value::Float(f) if f.is_nan()) }

    /// Query-level equality: structural, except that NaN never matches
    /// anything (including itself).
    pub fn matches(&self, other: &Self) -> bool { !self.is_nan() && !other.is_nan() && self == other }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Missing, Value::Missing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_u8(0),
            Value::Missing => state.write_u8(1),
            Value::Bool(b) => {
                state.write_u8(2);
                b.hash(state);
            }
            Value::Int(i) => {
                state.write_u8(3);
                i.hash(state);
            }
            Value::Float(f) => {
                state.write_u8(4);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                state.write_u8(5);
                s.hash(state);
            }
            Value::Ref(id) => {
                state.write_u8(6);
                id.hash(state);
            }
            Value::List(items) => {
                state.write_u8(7);
                items.hash(state);
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Value::Bool(value) }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self { Value::Int(value as i64) }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self { Value::Int(value) }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self { Value::Float(value) }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::Str(value.to_string()) }
}
impl From<String> for Value {
    fn from(value: String) -> Self { Value::Str(value) }
}
impl From<Ulid> for Value {
    fn from(value: Ulid) -> Self { Value::Ref(value) }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self { Value::List(value.into_iter().map(Into::into).collect()) }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Missing => write!(f, "<missing>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Ref(id) => write!(f, "ref:{}", id),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A dotted attribute path: `"employer.name"` resolves `employer` on the
/// root object and `name` on whatever that link points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathExpr {
    steps: Vec<String>,
}

impl PathExpr {
    pub fn new(steps: Vec<String>) -> Self { Self { steps } }

    /// Split a dotted path string into steps. Empty segments are dropped, so
    /// `""` yields a path with no steps (which no object ever satisfies).
    pub fn parse(path: &str) -> Self {
        Self { steps: path.split('.').filter(|s| !s.is_empty()).map(str::to_string).collect() }
    }

    pub fn steps(&self) -> &[String] { &self.steps }

    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    /// The first attribute name on the path.
    pub fn root(&self) -> Option<&str> { self.steps.first().map(String::as_str) }

    pub fn is_simple(&self) -> bool { self.steps.len() == 1 }

    pub fn join(&self, step: &str) -> PathExpr {
        let mut steps = self.steps.clone();
        steps.push(step.to_string());
        PathExpr { steps }
    }
}

impl From<&str> for PathExpr {
    fn from(value: &str) -> Self { PathExpr::parse(value) }
}
impl From<String> for PathExpr {
    fn from(value: String) -> Self { PathExpr::parse(&value) }
}

impl std::fmt::Display for PathExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.steps.join(".")) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Equal,              // =
    NotEqual,           // <> or !=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    LessThan,           // <
    LessThanOrEqual,    // <=
    In,                 // IN
    Between,            // BETWEEN (closed interval)
}

impl ComparisonOperator {
    /// How many operands a well-formed comparison carries. `None` means any
    /// number (IN lists).
    pub fn arity(&self) -> Option<usize> {
        match self {
            ComparisonOperator::Between => Some(2),
            ComparisonOperator::In => None,
            _ => Some(1),
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::In => "IN",
            ComparisonOperator::Between => "BETWEEN",
        };
        write!(f, "{}", s)
    }
}

/// A boolean expression over attribute paths. Leaves always compare a path
/// against literal operands; `And`/`Or` take any number of children so the
/// planner can reorder them by selectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison { path: PathExpr, operator: ComparisonOperator, operands: Vec<Value> },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Comparison { path, operator, operands } => {
                write!(f, "{} {}", path, operator)?;
                match operands.as_slice() {
                    [single] => write!(f, " {}", single),
                    many => {
                        write!(f, " (")?;
                        for (i, v) in many.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", v)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Predicate::And(children) => {
                write!(f, "(")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Predicate::Or(children) => {
                write!(f, "(")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}
