//! Projection compilation: vertical filtering plus a row → output shaper.
//!
//! The shaper never invents a row layout of its own. Every output shape is
//! built from `Shaped` and lowered through `Shaped::into_json`, so full
//! entities and projected DTOs go through the same serde conversion.

use crate::{
    db::{
        query::{expr::Projection, predicate::Untranslatable, url::Params},
        response::Row,
    },
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, FieldModel},
    value::{Value, codec::to_json},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::{fmt, sync::Arc};

///
/// Shaped
/// Output of the shaper for one row.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Shaped {
    Value(Value),
    Tuple(Vec<Self>),
    Record {
        type_name: Option<String>,
        fields: Vec<(String, Self)>,
    },
    Construct {
        type_name: String,
        args: Vec<Self>,
    },
    /// The whole subject entity.
    Entity(Row),
}

impl Shaped {
    /// Structural JSON form; records become objects, tuples and
    /// constructor arguments become arrays.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Value(value) => to_json(&value),
            Self::Tuple(items) | Self::Construct { args: items, .. } => {
                JsonValue::Array(items.into_iter().map(Self::into_json).collect())
            }
            Self::Record { fields, .. } => JsonValue::Object(
                fields
                    .into_iter()
                    .map(|(name, shaped)| (name, shaped.into_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Entity(row) => row.into_json(),
        }
    }

    /// Convert into any serde-deserializable output type.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, InternalError> {
        serde_json::from_value(self.into_json()).map_err(|err| {
            InternalError::decode(
                ErrorOrigin::Load,
                format!(
                    "cannot shape row into {}: {err}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

type ShapeFn = dyn Fn(&Row, &Params) -> Result<Shaped, InternalError> + Send + Sync;

///
/// Shaper
///

#[derive(Clone)]
pub struct Shaper(Arc<ShapeFn>);

impl Shaper {
    fn new(f: impl Fn(&Row, &Params) -> Result<Shaped, InternalError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn shape(&self, row: &Row, params: &Params) -> Result<Shaped, InternalError> {
        (self.0)(row, params)
    }
}

impl fmt::Debug for Shaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Shaper(..)")
    }
}

///
/// CompiledProjection
///

#[derive(Clone, Debug)]
pub struct CompiledProjection {
    /// Columns to request; empty when the whole entity is needed.
    pub columns: Vec<String>,
    /// Properties the shaper reads, in first-seen order.
    pub properties: Vec<String>,
    pub shaper: Shaper,
}

impl CompiledProjection {
    /// The identity projection over `model`.
    #[must_use]
    pub fn entity(model: &EntityModel) -> Self {
        Self {
            columns: Vec::new(),
            properties: model.fields.iter().map(|f| f.name.clone()).collect(),
            shaper: Shaper::new(|row, _| Ok(Shaped::Entity(row.clone()))),
        }
    }

    /// Field metadata for every property the shaper reads.
    #[must_use]
    pub fn fields<'m>(&self, model: &'m EntityModel) -> Vec<&'m FieldModel> {
        self.properties
            .iter()
            .filter_map(|property| model.find_field(property))
            .collect()
    }
}

/// Compile a projection over `model`.
pub fn compile(model: &EntityModel, projection: &Projection) -> Result<CompiledProjection, Untranslatable> {
    let mut collector = Collector {
        model,
        subject: false,
        properties: Vec::new(),
    };
    let shaper = collector.build(projection)?;

    if collector.subject {
        return Ok(CompiledProjection {
            shaper,
            ..CompiledProjection::entity(model)
        });
    }

    let columns = collector
        .properties
        .iter()
        .filter_map(|property| model.column_for(property))
        .fold(Vec::<String>::new(), |mut acc, column| {
            if !acc.iter().any(|c| c == column) {
                acc.push(column.to_string());
            }
            acc
        });

    Ok(CompiledProjection {
        columns,
        properties: collector.properties,
        shaper,
    })
}

///
/// Collector
/// Walks the projection once, recording columns and composing the shaper.
///

struct Collector<'m> {
    model: &'m EntityModel,
    subject: bool,
    properties: Vec<String>,
}

impl Collector<'_> {
    fn build(&mut self, projection: &Projection) -> Result<Shaper, Untranslatable> {
        let shaper = match projection {
            Projection::Subject => {
                self.subject = true;
                Shaper::new(|row, _| Ok(Shaped::Entity(row.clone())))
            }
            Projection::Column(property) => {
                let field = self
                    .model
                    .find_field(property)
                    .ok_or_else(|| Untranslatable::UnknownProperty(property.clone()))?;
                if !self.properties.contains(&field.name) {
                    self.properties.push(field.name.clone());
                }
                let property = field.name.clone();
                Shaper::new(move |row, _| Ok(Shaped::Value(row.value(&property))))
            }
            Projection::Constant(value) => {
                let value = value.clone();
                Shaper::new(move |_, _| Ok(Shaped::Value(value.clone())))
            }
            Projection::Param(name) => {
                let name = name.clone();
                Shaper::new(move |_, params| {
                    params.get(&name).cloned().map(Shaped::Value).ok_or_else(|| {
                        InternalError::unsupported(
                            ErrorOrigin::Query,
                            format!("parameter '{name}' has no value"),
                        )
                    })
                })
            }
            Projection::Tuple(items) => {
                let items = self.build_all(items)?;
                Shaper::new(move |row, params| shape_all(&items, row, params).map(Shaped::Tuple))
            }
            Projection::Record { type_name, fields } => {
                let names: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
                let values = fields
                    .iter()
                    .map(|(_, field)| self.build(field))
                    .collect::<Result<Vec<_>, _>>()?;
                let type_name = type_name.clone();
                Shaper::new(move |row, params| {
                    let shaped = shape_all(&values, row, params)?;
                    Ok(Shaped::Record {
                        type_name: type_name.clone(),
                        fields: names.iter().cloned().zip(shaped).collect(),
                    })
                })
            }
            Projection::Construct { type_name, args } => {
                let args = self.build_all(args)?;
                let type_name = type_name.clone();
                Shaper::new(move |row, params| {
                    Ok(Shaped::Construct {
                        type_name: type_name.clone(),
                        args: shape_all(&args, row, params)?,
                    })
                })
            }
        };

        Ok(shaper)
    }

    fn build_all(&mut self, items: &[Projection]) -> Result<Vec<Shaper>, Untranslatable> {
        items.iter().map(|item| self.build(item)).collect()
    }
}

fn shape_all(shapers: &[Shaper], row: &Row, params: &Params) -> Result<Vec<Shaped>, InternalError> {
    shapers.iter().map(|s| s.shape(row, params)).collect()
}

///
/// TESTS
///
