use crate::value::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

///
/// EntryState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryState {
    Detached,
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Detached => "detached",
            Self::Unchanged => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

///
/// ChangeEntry
///
/// One pending change as tracked by the host ORM. Properties are addressed
/// by property name; unknown properties read as `Value::Null`.
///

pub trait ChangeEntry {
    /// Entity type name, as registered in the `Schema`.
    fn entity(&self) -> &str;

    fn state(&self) -> EntryState;

    fn current_value(&self, property: &str) -> Value;

    /// Value as last loaded from, or written to, the remote store.
    fn original_value(&self, property: &str) -> Value;

    fn is_modified(&self, property: &str) -> bool;

    /// Store-generated property still holding a client-side placeholder.
    fn has_temporary_value(&self, property: &str) -> bool;

    /// Accept a store-generated value from a response. Must not mark the
    /// property modified.
    fn set_store_generated_value(&mut self, property: &str, value: Value);

    /// Repoint a foreign-key property at the key the store assigned to its
    /// principal. Trackers that fix up relationships on their own keep the
    /// default, which leaves the entry untouched.
    fn fix_up_foreign_key(&mut self, property: &str, value: Value) {
        let _ = (property, value);
    }
}

impl<E: ChangeEntry + ?Sized> ChangeEntry for &mut E {
    fn entity(&self) -> &str {
        (**self).entity()
    }

    fn state(&self) -> EntryState {
        (**self).state()
    }

    fn current_value(&self, property: &str) -> Value {
        (**self).current_value(property)
    }

    fn original_value(&self, property: &str) -> Value {
        (**self).original_value(property)
    }

    fn is_modified(&self, property: &str) -> bool {
        (**self).is_modified(property)
    }

    fn has_temporary_value(&self, property: &str) -> bool {
        (**self).has_temporary_value(property)
    }

    fn set_store_generated_value(&mut self, property: &str, value: Value) {
        (**self).set_store_generated_value(property, value);
    }

    fn fix_up_foreign_key(&mut self, property: &str, value: Value) {
        (**self).fix_up_foreign_key(property, value);
    }
}

///
/// TrackedEntry
/// In-memory `ChangeEntry` for hosts without their own tracker.
///

#[derive(Clone, Debug, PartialEq)]
pub struct TrackedEntry {
    entity: String,
    state: EntryState,
    current: BTreeMap<String, Value>,
    original: BTreeMap<String, Value>,
    modified: BTreeSet<String>,
    temporary: BTreeSet<String>,
}

impl TrackedEntry {
    pub fn new(entity: impl Into<String>, state: EntryState) -> Self {
        Self {
            entity: entity.into(),
            state,
            current: BTreeMap::new(),
            original: BTreeMap::new(),
            modified: BTreeSet::new(),
            temporary: BTreeSet::new(),
        }
    }

    pub fn added(entity: impl Into<String>) -> Self {
        Self::new(entity, EntryState::Added)
    }

    pub fn modified(entity: impl Into<String>) -> Self {
        Self::new(entity, EntryState::Modified)
    }

    pub fn deleted(entity: impl Into<String>) -> Self {
        Self::new(entity, EntryState::Deleted)
    }

    /// Set a property's current and original value.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        let property = property.into();
        let value = value.into();
        self.original.insert(property.clone(), value.clone());
        self.current.insert(property, value);
        self
    }

    /// Store-generated property holding a client placeholder.
    #[must_use]
    pub fn with_temporary(mut self, property: impl Into<String>, placeholder: impl Into<Value>) -> Self {
        let property = property.into();
        self.temporary.insert(property.clone());
        self.current.insert(property, placeholder.into());
        self
    }

    /// Change a property's current value and mark it modified.
    #[must_use]
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        let property = property.into();
        self.modified.insert(property.clone());
        self.current.insert(property, value.into());
        self
    }

    #[must_use]
    pub fn modified_properties(&self) -> Vec<&str> {
        self.modified.iter().map(String::as_str).collect()
    }
}

impl ChangeEntry for TrackedEntry {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn state(&self) -> EntryState {
        self.state
    }

    fn current_value(&self, property: &str) -> Value {
        self.current.get(property).cloned().unwrap_or(Value::Null)
    }

    fn original_value(&self, property: &str) -> Value {
        self.original.get(property).cloned().unwrap_or(Value::Null)
    }

    fn is_modified(&self, property: &str) -> bool {
        self.modified.contains(property)
    }

    fn has_temporary_value(&self, property: &str) -> bool {
        self.temporary.contains(property)
    }

    fn set_store_generated_value(&mut self, property: &str, value: Value) {
        self.temporary.remove(property);
        self.original.insert(property.to_string(), value.clone());
        self.current.insert(property.to_string(), value);
    }

    // A pending update must send the repointed key.
    fn fix_up_foreign_key(&mut self, property: &str, value: Value) {
        if self.state == EntryState::Modified {
            self.modified.insert(property.to_string());
        }
        self.current.insert(property.to_string(), value);
    }
}
