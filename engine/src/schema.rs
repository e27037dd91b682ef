//! Shape validation for raw progress documents.
//!
//! A decoded JSON value must look like a progress document before it is
//! deserialized: this is what separates a genuine backup from arbitrary
//! pasted text that happens to be valid JSON.

use crate::error::DecodeError;
use serde_json::Value;

/// Field types a document schema can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    /// Integer that is zero or greater
    Count,
    Float,
    Bool,
    /// Milliseconds since epoch
    Timestamp,
    Array,
    Object,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Count => write!(f, "Count"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Array => write!(f, "Array"),
            FieldType::Object => write!(f, "Object"),
        }
    }
}

/// Definition of a top-level document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldDef {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), DecodeError> {
        match value {
            None | Some(Value::Null) if self.required => Err(DecodeError::SchemaMismatch(
                format!("missing required field: {}", self.name),
            )),
            None | Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<(), DecodeError> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Count | FieldType::Timestamp => value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        };

        if valid {
            Ok(())
        } else {
            Err(DecodeError::SchemaMismatch(format!(
                "type mismatch for field '{}': expected {}, got {}",
                self.name,
                self.field_type,
                json_type_name(value)
            )))
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_u64() => "Count",
        Value::Number(n) if n.is_i64() => "NegativeInt",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Top-level fields of the progress document.
///
/// Only the experience counter and the item-state mapping are required;
/// everything else may be absent in documents from older releases.
pub const AGGREGATE_FIELDS: &[FieldDef] = &[
    FieldDef::required("xp", FieldType::Count),
    FieldDef::required("wordProgress", FieldType::Object),
    FieldDef::optional("streak", FieldType::Count),
    FieldDef::optional("lastLoginDate", FieldType::String),
    FieldDef::optional("wordsLearnedToday", FieldType::Count),
    FieldDef::optional("aiGenerationsToday", FieldType::Count),
    FieldDef::optional("dailyProgressByLevel", FieldType::Object),
    FieldDef::optional("nextSessionUnlockTime", FieldType::Timestamp),
    FieldDef::optional("wordComments", FieldType::Object),
    FieldDef::optional("customWords", FieldType::Array),
    FieldDef::optional("usedPromoCodes", FieldType::Array),
    FieldDef::optional("premiumStatus", FieldType::Bool),
    FieldDef::optional("premiumExpiration", FieldType::Timestamp),
    FieldDef::optional("wallet", FieldType::Object),
    FieldDef::optional("inventory", FieldType::Object),
    FieldDef::optional("blitzHighScores", FieldType::Object),
    FieldDef::optional("userName", FieldType::String),
    FieldDef::optional("photoUrl", FieldType::String),
    FieldDef::optional("hasSeenOnboarding", FieldType::Bool),
    FieldDef::optional("darkMode", FieldType::Bool),
    FieldDef::optional("lastLocalUpdate", FieldType::Timestamp),
    FieldDef::optional("lastCloudSync", FieldType::Timestamp),
    FieldDef::optional("lastAutoBackup", FieldType::Timestamp),
];

/// Check that `doc` has the shape of a progress document.
pub fn validate_document(doc: &Value) -> Result<(), DecodeError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| DecodeError::SchemaMismatch("document must be an object".into()))?;

    for field in AGGREGATE_FIELDS {
        field.validate(obj.get(field.name))?;
    }

    Ok(())
}
