use crate::entity::Entity;
use quarryql::ast::Value;

/// What an attribute on an observable object can hold: a scalar value, a
/// link to another observable, or a list that fans out over its elements.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Value(Value),
    Entity(Entity),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// A scalar that cannot be traversed further. Replacing a link with one
    /// of these leaves suffix paths dangling.
    pub fn is_scalar(&self) -> bool { matches!(self, PropertyValue::Value(_)) }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            PropertyValue::Entity(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self { PropertyValue::Value(value) }
}
impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self { PropertyValue::Value(value.into()) }
}
impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self { PropertyValue::Value(value.into()) }
}
impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self { PropertyValue::Value(value.into()) }
}
impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self { PropertyValue::Value(value.into()) }
}
impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self { PropertyValue::Value(value.into()) }
}
impl From<String> for PropertyValue {
    fn from(value: String) -> Self { PropertyValue::Value(value.into()) }
}
impl From<Entity> for PropertyValue {
    fn from(value: Entity) -> Self { PropertyValue::Entity(value) }
}
impl From<&Entity> for PropertyValue {
    fn from(value: &Entity) -> Self { PropertyValue::Entity(value.clone()) }
}
impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(value: Vec<T>) -> Self { PropertyValue::List(value.into_iter().map(Into::into).collect()) }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Value(v) => write!(f, "{}", v),
            PropertyValue::Entity(e) => write!(f, "{}", e.id()),
            PropertyValue::List(items) => {
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
