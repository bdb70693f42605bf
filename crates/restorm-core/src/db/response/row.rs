use crate::{
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, FieldModel},
    value::{
        Value,
        codec::{from_json, to_json},
    },
};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// One JSON object from a response body.
pub(crate) type JsonObject = Map<String, JsonValue>;

///
/// Row
///
/// Decoded values of one response object, keyed by property name.
/// Only the properties a query asked for are present; reading any other
/// property yields `Value::Null`.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    /// Owned value of `property`, `Null` when the row does not carry it.
    #[must_use]
    pub fn value(&self, property: &str) -> Value {
        self.values.get(property).cloned().unwrap_or(Value::Null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object keyed by property name, values in body form.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(
            self.values
                .into_iter()
                .map(|(property, value)| (property, to_json(&value)))
                .collect(),
        )
    }

    /// Decode `fields` out of one response object.
    pub(crate) fn decode(
        model: &EntityModel,
        fields: &[&FieldModel],
        object: &JsonObject,
    ) -> Result<Self, InternalError> {
        let mut row = Self::new();

        for field in fields {
            let value = match lookup(object, field) {
                Some(json) => from_json(json, &field.kind).map_err(|err| {
                    InternalError::decode(
                        ErrorOrigin::Load,
                        format!("{}.{}: {err}", model.name, field.name),
                    )
                })?,
                None => Value::Null,
            };
            row.values.insert(field.name.clone(), value);
        }

        Ok(row)
    }
}

// Exact column key first, then a case-insensitive match on column or property.
pub(crate) fn lookup<'a>(object: &'a JsonObject, field: &FieldModel) -> Option<&'a JsonValue> {
    object.get(&field.column).or_else(|| {
        object.iter().find_map(|(key, value)| {
            (key.eq_ignore_ascii_case(&field.column) || key.eq_ignore_ascii_case(&field.name))
                .then_some(value)
        })
    })
}

/// Split a response body into row objects.
/// An array yields its elements, a bare object yields itself.
pub(crate) fn parse_body(body: &[u8]) -> Result<Vec<JsonObject>, InternalError> {
    let json: JsonValue = serde_json::from_slice(body).map_err(|err| {
        InternalError::decode(ErrorOrigin::Load, format!("response is not valid JSON: {err}"))
    })?;

    match json {
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                JsonValue::Object(object) => Ok(object),
                other => Err(InternalError::decode(
                    ErrorOrigin::Load,
                    format!("response element {i} is not an object: {other}"),
                )),
            })
            .collect(),
        JsonValue::Object(object) => Ok(vec![object]),
        other => Err(InternalError::decode(
            ErrorOrigin::Load,
            format!("response must be an array or an object, got {other}"),
        )),
    }
}
