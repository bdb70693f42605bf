///
/// FieldModel
/// Runtime metadata for one mapped property.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldModel {
    /// Property name as the host ORM spells it.
    pub name: String,
    /// Remote column name; lower-cased property name unless overridden.
    pub column: String,
    pub kind: FieldKind,
    /// Value is assigned by the remote store (identity, defaults).
    pub store_generated: bool,
    pub nullable: bool,
}

impl FieldModel {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let column = name.to_lowercase();

        Self {
            name,
            column,
            kind,
            store_generated: false,
            nullable: false,
        }
    }

    /// Override the conventional column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    #[must_use]
    pub const fn store_generated(mut self) -> Self {
        self.store_generated = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

///
/// FieldKind
///
/// Declared target type used when decoding JSON back into values.
/// `Other` keeps the raw JSON structure for types the engine does not model.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldKind {
    // Scalar primitives
    Blob,
    Bool,
    Date,
    Decimal,
    Float32,
    Float64,
    Int16,
    Int32,
    Int64,
    Json,
    Text,
    Time,
    Timestamp,
    TimestampLocal,
    Uuid,

    // Collections
    List(Box<Self>),

    /// Fallback: structural passthrough of the raw JSON value.
    Other(String),
}

impl FieldKind {
    /// Short label for diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Blob => "blob",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Decimal => "decimal",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Json => "json",
            Self::Text => "text",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampLocal => "timestamp_local",
            Self::Uuid => "uuid",
            Self::List(_) => "list",
            Self::Other(name) => name,
        }
    }
}
