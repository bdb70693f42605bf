use crate::{
    error::{ErrorOrigin, InternalError},
    model::entity::EntityModel,
};
use std::collections::BTreeMap;

///
/// Schema
/// Registry of entity models keyed by entity type name.
///

#[derive(Clone, Debug, Default)]
pub struct Schema {
    entities: BTreeMap<String, EntityModel>,
}

impl Schema {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Register a model, replacing any previous model of the same name.
    #[must_use]
    pub fn with(mut self, model: EntityModel) -> Self {
        self.register(model);
        self
    }

    pub fn register(&mut self, model: EntityModel) {
        self.entities.insert(model.name.clone(), model);
    }

    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&EntityModel> {
        self.entities.get(entity)
    }

    /// Resolve a model or fail with the origin that asked for it.
    pub fn try_get(&self, entity: &str, origin: ErrorOrigin) -> Result<&EntityModel, InternalError> {
        self.get(entity).ok_or_else(|| {
            InternalError::invalid_state(origin, format!("entity '{entity}' is not registered"))
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityModel> {
        self.entities.values()
    }
}
