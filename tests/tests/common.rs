#[allow(unused)]
pub use quarry_core::{Entity, FilteredIndex, Index, PropertyValue, Value};
#[allow(unused)]
pub use quarryql::Q;

use std::str::FromStr;
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

/// Build an entity with initial properties of mixed kinds.
#[macro_export]
macro_rules! obj {
    ($($name:literal : $value:expr),* $(,)?) => {{
        let entity = quarry_core::Entity::new();
        $( entity.set($name, $value); )*
        entity
    }};
}

#[allow(unused)]
pub fn int_prop(entity: &Entity, name: &str) -> Option<i64> {
    match entity.get(name) {
        Some(PropertyValue::Value(Value::Int(i))) => Some(i),
        _ => None,
    }
}

#[allow(unused)]
pub fn float_prop(entity: &Entity, name: &str) -> Option<f64> {
    match entity.get(name) {
        Some(PropertyValue::Value(Value::Float(f))) => Some(f),
        _ => None,
    }
}

#[allow(unused)]
pub fn bool_prop(entity: &Entity, name: &str) -> Option<bool> {
    match entity.get(name) {
        Some(PropertyValue::Value(Value::Bool(b))) => Some(b),
        _ => None,
    }
}

#[allow(unused)]
pub fn str_prop(entity: &Entity, name: &str) -> Option<String> {
    match entity.get(name) {
        Some(PropertyValue::Value(Value::Str(s))) => Some(s),
        _ => None,
    }
}
