//! Declarative JSON schema checking
//!
//! Supports a small vocabulary: `type`, `enum`, `required`, `properties`,
//! `items`, `minLength` and `pattern`. A type mismatch stops the descent into
//! that value; its siblings are still checked. Unknown keywords are ignored.

use super::Violation;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Built-in file doc schema
pub const FILE_DOC_SCHEMA: &str = include_str!("../../schemas/file-doc.schema.json");

/// Built-in OpenAPI document schema
pub const OPENAPI_SCHEMA: &str = include_str!("../../schemas/openapi.schema.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Object,
    Array,
    Boolean,
    #[serde(other)]
    Other,
}

impl SchemaType {
    fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Boolean => "boolean",
            SchemaType::Other => "other",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Object => value.is_object(),
            SchemaType::Array => value.is_array(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Other => true,
        }
    }
}

/// One schema node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Schema {
    #[serde(rename = "type")]
    pub ty: Option<SchemaType>,
    #[serde(rename = "enum")]
    pub allowed: Option<Vec<Value>>,
    pub required: Vec<String>,
    pub properties: BTreeMap<String, Schema>,
    pub items: Option<Box<Schema>>,
    #[serde(rename = "minLength")]
    pub min_length: Option<usize>,
    pub pattern: Option<String>,
}

/// A parsed schema with its patterns compiled
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Schema,
    patterns: HashMap<String, Regex>,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Result<Self> {
        let mut patterns = HashMap::new();
        collect_patterns(&schema, &mut patterns)?;
        Ok(Self { schema, patterns })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(text).context("Invalid schema JSON")?;
        Self::new(schema)
    }

    /// Validate `value` with the root trace `doc`
    pub fn validate(&self, value: &Value) -> Vec<Violation> {
        let mut out = Vec::new();
        self.validate_at(value, "doc", &mut out);
        out
    }

    /// Validate `value`, appending violations traced from `trace`
    pub fn validate_at(&self, value: &Value, trace: &str, out: &mut Vec<Violation>) {
        self.check(&self.schema, value, trace, out);
    }

    fn check(&self, schema: &Schema, value: &Value, trace: &str, out: &mut Vec<Violation>) {
        if let Some(ty) = schema.ty {
            if !ty.matches(value) {
                out.push(Violation::new(trace, format!("expected {}", ty.as_str())));
                return;
            }
        }

        if let Some(allowed) = &schema.allowed {
            if !allowed.contains(value) {
                let listed: Vec<String> = allowed.iter().map(display_value).collect();
                out.push(Violation::new(
                    trace,
                    format!("expected one of {}", listed.join(", ")),
                ));
            }
        }

        match value {
            Value::String(s) => {
                if let Some(min) = schema.min_length {
                    if s.chars().count() < min {
                        out.push(Violation::new(trace, format!("expected minLength {}", min)));
                    }
                }
                if let Some(pattern) = &schema.pattern {
                    if let Some(re) = self.patterns.get(pattern) {
                        if !re.is_match(s) {
                            out.push(Violation::new(
                                trace,
                                format!("pattern mismatch {}", pattern),
                            ));
                        }
                    }
                }
            }
            Value::Object(map) => {
                for key in &schema.required {
                    if !map.contains_key(key) {
                        out.push(Violation::new(trace, format!("missing required key {}", key)));
                    }
                }
                for (key, child) in &schema.properties {
                    if let Some(v) = map.get(key) {
                        self.check(child, v, &format!("{}.{}", trace, key), out);
                    }
                }
            }
            Value::Array(entries) => {
                if let Some(items) = &schema.items {
                    for (i, entry) in entries.iter().enumerate() {
                        self.check(items, entry, &format!("{}[{}]", trace, i), out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_patterns(schema: &Schema, patterns: &mut HashMap<String, Regex>) -> Result<()> {
    if let Some(pattern) = &schema.pattern {
        if !patterns.contains_key(pattern) {
            let re = Regex::new(pattern)
                .with_context(|| format!("Invalid schema pattern: {}", pattern))?;
            patterns.insert(pattern.clone(), re);
        }
    }
    for child in schema.properties.values() {
        collect_patterns(child, patterns)?;
    }
    if let Some(items) = &schema.items {
        collect_patterns(items, patterns)?;
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
