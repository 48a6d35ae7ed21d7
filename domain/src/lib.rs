use serde::{Deserialize, Serialize}; // For record and schema (de)serialization
use serde_json::{Map, Value}; // To represent arbitrary record fields
use std::fmt;
use thiserror::Error; // For domain-specific errors

pub mod defaults;
pub mod validation;

pub use validation::{Violation, validate};

/// Path segment reserved for the schema endpoints; never a resource name.
pub const SCHEMAS_SEGMENT: &str = "schemas";

/// JSON Schema type names understood by the validator.
pub const KNOWN_TYPES: [&str; 7] = [
    "string", "number", "integer", "boolean", "object", "array", "null",
];

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error(
        "Invalid resource name '{0}': must be non-empty and contain only ASCII alphanumeric characters, '_' or '-'"
    )]
    InvalidResourceName(String),
    #[error("Resource name '{0}' is reserved")]
    ReservedResourceName(String),
    #[error("Invalid record id '{0}': must be a positive integer")]
    InvalidRecordId(String),
}

// --- Resource Names ---

/// Checks that `name` can address a resource collection.
///
/// The name doubles as a storage key (and a file name for the file backend),
/// so only ASCII alphanumerics, underscores and hyphens are accepted.
pub fn validate_resource_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DomainError::InvalidResourceName(name.to_string()));
    }
    if name == SCHEMAS_SEGMENT {
        return Err(DomainError::ReservedResourceName(name.to_string()));
    }
    Ok(())
}

// --- Record ID ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// The first id handed out in an empty collection.
    pub const FIRST: RecordId = RecordId(1);

    pub fn new(id: u64) -> Result<Self, DomainError> {
        if id == 0 {
            return Err(DomainError::InvalidRecordId(id.to_string()));
        }
        Ok(Self(id))
    }

    /// Parses a path segment such as `"42"`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        raw.trim()
            .parse::<u64>()
            .map_err(|_| DomainError::InvalidRecordId(raw.to_string()))
            .and_then(Self::new)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Record ---

/// A JSON object stored under a resource, identified by a server-assigned id.
///
/// Serializes flat: `{"id": 1, "name": ...}`. The `id` key never lives in
/// `fields`, so a client-supplied id cannot shadow the assigned one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self { id, fields }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Replaces every non-id field, keeping the id.
    pub fn replace_fields(&self, fields: Map<String, Value>) -> Self {
        Self::new(self.id, fields)
    }
}

// --- Schema Document ---

/// A JSON Schema document attached to a resource name.
///
/// Only the outer shape is checked on construction (an object with a usable
/// `type`); the keywords themselves are interpreted by [`validation`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Value", into = "Value")]
pub struct SchemaDocument(Map<String, Value>);

impl SchemaDocument {
    pub fn parse(value: Value) -> Result<Self, DomainError> {
        let Value::Object(map) = value else {
            return Err(DomainError::InvalidSchema(
                "schema document must be a JSON object".to_string(),
            ));
        };
        match map.get("type") {
            None => {
                return Err(DomainError::InvalidSchema(
                    "schema document must declare a 'type'".to_string(),
                ));
            }
            Some(Value::String(name)) => check_type_name(name)?,
            Some(Value::Array(names)) if !names.is_empty() => {
                for name in names {
                    match name.as_str() {
                        Some(name) => check_type_name(name)?,
                        None => {
                            return Err(DomainError::InvalidSchema(
                                "'type' array must contain only type names".to_string(),
                            ));
                        }
                    }
                }
            }
            Some(other) => {
                return Err(DomainError::InvalidSchema(format!(
                    "'type' must be a type name or a non-empty array of type names, got {}",
                    other
                )));
            }
        }
        Ok(Self(map))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Validates `candidate`, collecting every violation.
    pub fn validate(&self, candidate: &Value) -> Result<(), Vec<Violation>> {
        let violations = validation::validate_object_schema(&self.0, candidate);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_type_name(name: &str) -> Result<(), DomainError> {
    if KNOWN_TYPES.contains(&name) {
        Ok(())
    } else {
        Err(DomainError::InvalidSchema(format!(
            "unknown type '{}'",
            name
        )))
    }
}

impl TryFrom<Value> for SchemaDocument {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SchemaDocument> for Value {
    fn from(schema: SchemaDocument) -> Self {
        Value::Object(schema.0)
    }
}
