//! Schema - Define type schemas for provider blocks and resources
//!
//! A schema describes each attribute's type plus the hooks the provider
//! attaches to it: environment defaults, a validator, and a diff suppressor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::env::Env;
use crate::resource::{ResourceData, Value};

/// Decides whether a difference between `old` and `new` should be ignored
///
/// `data` holds the desired attributes of the resource being diffed.
pub type DiffSuppressFn = fn(key: &str, old: &str, new: &str, data: &ResourceData) -> bool;

/// Attribute-level validation hook
///
/// Receives the value and the attribute name, and returns a user-facing
/// message on failure.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Value, &str) -> Result<(), String> + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&Value, &str) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value, key: &str) -> Result<(), String> {
        (self.0)(value, key)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block, written as a map or a list of maps
    Block(Box<ResourceSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(schema), Value::Map(map)) => schema
                .validate(map)
                .map_err(|errors| TypeError::BlockError { index: 0, errors }),

            (AttributeType::Block(schema), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Map(map) => schema
                            .validate(map)
                            .map_err(|errors| TypeError::BlockError { index: i, errors })?,
                        other => {
                            return Err(TypeError::ListItemError {
                                index: i,
                                inner: Box::new(TypeError::TypeMismatch {
                                    expected: "Map".to_string(),
                                    got: other.type_name(),
                                }),
                            });
                        }
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    /// Parse a raw environment value into a value of this type
    fn parse_env(&self, raw: &str) -> Option<Value> {
        match self {
            AttributeType::String | AttributeType::Enum(_) => Some(Value::String(raw.to_string())),
            AttributeType::Int => raw.trim().parse().ok().map(Value::Int),
            AttributeType::Bool => parse_bool(raw.trim()).map(Value::Bool),
            _ => None,
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(schema) => format!("Block({})", schema.resource_type),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("{message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Block at index {index}: {}", errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    BlockError { index: usize, errors: Vec<TypeError> },

    #[error("Environment variable {variable} has invalid value '{value}' for attribute '{name}'")]
    InvalidEnvDefault {
        name: String,
        variable: String,
        value: String,
    },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub default: Option<Value>,
    /// Environment variables consulted, in order, when the attribute is unset
    pub env_default: Vec<String>,
    pub description: Option<String>,
    /// Value must not be printed
    pub sensitive: bool,
    pub validator: Option<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            default: None,
            env_default: Vec::new(),
            description: None,
            sensitive: false,
            validator: None,
            diff_suppress: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_env_default(mut self, variables: &[&str]) -> Self {
        self.env_default = variables.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    /// Type check the value, then run the attribute validator
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        self.attr_type.validate(value)?;
        if let Some(validator) = &self.validator {
            validator
                .check(value, &self.name)
                .map_err(|message| TypeError::ValidationFailed { message })?;
        }
        Ok(())
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            if let Some(schema) = self.attributes.get(name)
                && let Err(e) = schema.validate(value)
            {
                errors.push(e);
            }
            // Unknown attributes are allowed (for flexibility)
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill unset attributes from their environment variables, then from static defaults
    pub fn apply_defaults(
        &self,
        attributes: &mut HashMap<String, Value>,
        env: &Env,
    ) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.attributes {
            if attributes.contains_key(name) {
                continue;
            }

            let from_env = schema
                .env_default
                .iter()
                .find_map(|var| env.get_non_empty(var).map(|raw| (var, raw)));

            match from_env {
                Some((var, raw)) => match schema.attr_type.parse_env(&raw) {
                    Some(value) => {
                        attributes.insert(name.clone(), value);
                    }
                    None => errors.push(TypeError::InvalidEnvDefault {
                        name: name.clone(),
                        variable: var.clone(),
                        value: raw,
                    }),
                },
                None => {
                    if let Some(default) = &schema.default {
                        attributes.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
