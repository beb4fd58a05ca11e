use crate::index::IndexInner;
use crate::property::PropertyValue;
use quarryql::ast::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use ulid::Ulid;

/// Stable identifier assigned when the entity is constructed. Identity is by
/// id, never by attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(Ulid);

impl EntityId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self { Self(Ulid::new()) }
}

impl From<EntityId> for Ulid {
    fn from(id: EntityId) -> Self { id.0 }
}
impl From<Ulid> for EntityId {
    fn from(ulid: Ulid) -> Self { Self(ulid) }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self { Value::Ref(entity.id().into()) }
}

/// Reference implementation of the indexable contract: a bag of named
/// properties that announces every write to its subscribed indexes, after
/// the write has landed. User code holds `Entity` clones (all sharing one
/// inner); indexes hold only [`WeakEntity`] so they never extend an
/// entity's lifetime.
#[derive(Clone)]
pub struct Entity(Arc<EntityInner>);

pub struct WeakEntity(Weak<EntityInner>);

struct EntityInner {
    id: EntityId,
    props: RwLock<BTreeMap<String, PropertyValue>>,
    subscribers: Mutex<Vec<SubscriberEntry>>,
}

/// One subscribed index, refcounted by how many traversal routes reach this
/// entity (as a root or as an intermediate link).
struct SubscriberEntry {
    index_id: usize,
    index: Weak<IndexInner>,
    refs: u32,
}

impl Entity {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Arc::new(EntityInner {
            id: EntityId::new(),
            props: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }))
    }

    /// Construct with initial properties, without notifications (there are
    /// no subscribers yet).
    pub fn with<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let entity = Self::new();
        {
            let mut map = entity.0.props.write().unwrap();
            for (k, v) in props {
                map.insert(k.into(), v.into());
            }
        }
        entity
    }

    pub fn id(&self) -> EntityId { self.0.id }

    pub fn get(&self, name: &str) -> Option<PropertyValue> { self.0.props.read().unwrap().get(name).cloned() }

    /// Snapshot of all properties in name order, including
    /// underscore-prefixed ones (index discovery skips those).
    pub fn attributes(&self) -> Vec<(String, PropertyValue)> {
        self.0.props.read().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Store `value` under `name`, then announce `(self, name, old, new)` to
    /// every subscribed index. The announcement happens synchronously on the
    /// writer's thread; when this returns, every index reflects the write.
    pub fn set(&self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();
        let old = { self.0.props.write().unwrap().insert(name.clone(), value.clone()) };
        self.announce(&name, old.as_ref(), Some(&value));
    }

    /// Remove the property entirely. Subscribed indexes file this entity
    /// under the missing sentinel for the attribute.
    pub fn unset(&self, name: &str) {
        let old = { self.0.props.write().unwrap().remove(name) };
        if let Some(old) = old {
            self.announce(name, Some(&old), None);
        }
    }

    fn announce(&self, name: &str, old: Option<&PropertyValue>, new: Option<&PropertyValue>) {
        // snapshot the subscriber list so an index can adjust its own
        // subscription (e.g. tear down a replaced link) while we iterate
        let subscribers: Vec<Weak<IndexInner>> = {
            let mut entries = self.0.subscribers.lock().unwrap();
            entries.retain(|s| s.index.strong_count() > 0);
            entries.iter().map(|s| s.index.clone()).collect()
        };
        for weak in subscribers {
            if let Some(index) = weak.upgrade() {
                index.apply_change(self, name, old, new);
            }
        }
    }

    pub(crate) fn subscribe(&self, index_id: usize, index: &Weak<IndexInner>) {
        let mut entries = self.0.subscribers.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|s| s.index_id == index_id) {
            entry.refs += 1;
        } else {
            entries.push(SubscriberEntry { index_id, index: index.clone(), refs: 1 });
        }
    }

    pub(crate) fn unsubscribe(&self, index_id: usize) {
        let mut entries = self.0.subscribers.lock().unwrap();
        if let Some(pos) = entries.iter().position(|s| s.index_id == index_id) {
            let entry = &mut entries[pos];
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(pos);
            }
        }
    }

    pub fn downgrade(&self) -> WeakEntity { WeakEntity(Arc::downgrade(&self.0)) }
}

impl WeakEntity {
    pub fn upgrade(&self) -> Option<Entity> { self.0.upgrade().map(Entity) }
}

impl Clone for WeakEntity {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool { self.0.id == other.0.id }
}
impl Eq for Entity {}
impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.0.id.hash(state) }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity").field("id", &self.0.id).finish_non_exhaustive()
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0.id)?;
        let props = self.0.props.read().unwrap();
        write!(f, " {{ ")?;
        for (i, (k, v)) in props.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, " }}")
    }
}
