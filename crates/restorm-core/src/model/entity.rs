use crate::model::field::FieldModel;

///
/// EntityModel
/// Runtime model for one entity type: its table, fields, keys and relations.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityModel {
    /// Entity type name; change entries refer to their type by this name.
    pub name: String,
    /// Remote table (endpoint) name.
    pub table: String,
    /// Ordered field list; authoritative for insert bodies and full loads.
    pub fields: Vec<FieldModel>,
    /// Primary key property names. Empty for keyless entities.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyModel>,
}

impl EntityModel {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn key(mut self, properties: &[&str]) -> Self {
        self.primary_key = properties.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKeyModel) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Look up a field by property name.
    #[must_use]
    pub fn find_field(&self, property: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name == property)
    }

    /// Remote column for a property, if mapped.
    #[must_use]
    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.find_field(property).map(|field| field.column.as_str())
    }

    #[must_use]
    pub const fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn store_generated_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|field| field.store_generated)
    }
}

///
/// DeleteBehavior
/// What the remote database does to dependents when a principal row goes away.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeleteBehavior {
    Cascade,
    #[default]
    NoAction,
    Restrict,
    SetNull,
}

///
/// ForeignKeyModel
///
/// Dependent-side foreign key. `principal_key` names the referenced
/// properties on the principal; empty means its primary key.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForeignKeyModel {
    pub properties: Vec<String>,
    pub principal: String,
    pub principal_key: Vec<String>,
    pub on_delete: DeleteBehavior,
}

impl ForeignKeyModel {
    pub fn new(properties: &[&str], principal: impl Into<String>) -> Self {
        Self {
            properties: properties.iter().map(ToString::to_string).collect(),
            principal: principal.into(),
            principal_key: Vec::new(),
            on_delete: DeleteBehavior::default(),
        }
    }

    #[must_use]
    pub fn principal_key(mut self, properties: &[&str]) -> Self {
        self.principal_key = properties.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub const fn on_delete(mut self, behavior: DeleteBehavior) -> Self {
        self.on_delete = behavior;
        self
    }

    #[must_use]
    pub const fn is_cascade(&self) -> bool {
        matches!(self.on_delete, DeleteBehavior::Cascade)
    }

    /// Referenced principal properties, resolved against the principal model.
    #[must_use]
    pub fn resolved_principal_key<'a>(&'a self, principal: &'a EntityModel) -> &'a [String] {
        if self.principal_key.is_empty() {
            &principal.primary_key
        } else {
            &self.principal_key
        }
    }
}
