//! Output schema representation and validation
//!
//! Agent responses are untyped JSON; every step declares the shape it expects
//! back as a [`Schema`] value. Validation is a pure function that collects
//! every violation found rather than stopping at the first, so a failed step
//! can surface complete diagnostics to the operator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declarative schema for a step's expected output.
///
/// A small sum type over the JSON shapes the workflows actually use: object
/// shapes with required keys, arrays with item schemas, string enumerations,
/// numeric ranges, and additional-properties maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schema {
    Object {
        #[serde(default)]
        properties: BTreeMap<String, Schema>,
        #[serde(default)]
        required: Vec<String>,
        /// Schema applied to keys not listed in `properties` (map shapes).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional: Option<Box<Schema>>,
    },
    Array {
        items: Box<Schema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enumeration: Option<Vec<String>>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        integer: bool,
    },
    Boolean,
    Any,
}

impl Schema {
    /// Object shape from (key, schema) pairs plus the required key list.
    pub fn object<const N: usize>(props: [(&str, Schema); N], required: &[&str]) -> Self {
        Schema::Object {
            properties: props
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
            additional: None,
        }
    }

    /// Map shape: arbitrary keys, every value validated against `values`.
    pub fn map_of(values: Schema) -> Self {
        Schema::Object {
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional: Some(Box::new(values)),
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn array_min(items: Schema, min_items: usize) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: Some(min_items),
            max_items: None,
        }
    }

    pub fn string() -> Self {
        Schema::String { enumeration: None }
    }

    pub fn enumeration(options: &[&str]) -> Self {
        Schema::String {
            enumeration: Some(options.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn number() -> Self {
        Schema::Number {
            min: None,
            max: None,
            integer: false,
        }
    }

    pub fn number_range(min: f64, max: f64) -> Self {
        Schema::Number {
            min: Some(min),
            max: Some(max),
            integer: false,
        }
    }

    pub fn integer_min(min: f64) -> Self {
        Schema::Number {
            min: Some(min),
            max: None,
            integer: true,
        }
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn any() -> Self {
        Schema::Any
    }
}

/// One schema violation, addressed by a JSON-path-like location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a JSON value against a schema, collecting every violation.
pub fn validate(value: &Value, schema: &Schema) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check(value, schema, "$", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Parse a text payload as JSON and validate it.
///
/// Fails closed: a payload that cannot be parsed as JSON is reported as a
/// single violation at the document root, never a panic.
pub fn validate_text(text: &str, schema: &Schema) -> Result<Value, Vec<Violation>> {
    let value: Value = match serde_json::from_str(text.trim()) {
        Ok(v) => v,
        Err(e) => {
            return Err(vec![Violation::new(
                "$",
                format!("response is not valid JSON: {}", e),
            )])
        }
    };
    validate(&value, schema)?;
    Ok(value)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check(value: &Value, schema: &Schema, path: &str, out: &mut Vec<Violation>) {
    match schema {
        Schema::Any => {}

        Schema::Boolean => {
            if !value.is_boolean() {
                out.push(Violation::new(
                    path,
                    format!("expected boolean, got {}", type_name(value)),
                ));
            }
        }

        Schema::String { enumeration } => match value.as_str() {
            Some(s) => {
                if let Some(options) = enumeration {
                    if !options.iter().any(|o| o == s) {
                        out.push(Violation::new(
                            path,
                            format!("'{}' is not one of [{}]", s, options.join(", ")),
                        ));
                    }
                }
            }
            None => out.push(Violation::new(
                path,
                format!("expected string, got {}", type_name(value)),
            )),
        },

        Schema::Number { min, max, integer } => match value.as_f64() {
            Some(n) => {
                if *integer && n.fract() != 0.0 {
                    out.push(Violation::new(path, format!("expected integer, got {}", n)));
                }
                if let Some(min) = min {
                    if n < *min {
                        out.push(Violation::new(path, format!("{} is below minimum {}", n, min)));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        out.push(Violation::new(path, format!("{} is above maximum {}", n, max)));
                    }
                }
            }
            None => out.push(Violation::new(
                path,
                format!("expected number, got {}", type_name(value)),
            )),
        },

        Schema::Array {
            items,
            min_items,
            max_items,
        } => match value.as_array() {
            Some(arr) => {
                if let Some(min) = min_items {
                    if arr.len() < *min {
                        out.push(Violation::new(
                            path,
                            format!("expected at least {} item(s), got {}", min, arr.len()),
                        ));
                    }
                }
                if let Some(max) = max_items {
                    if arr.len() > *max {
                        out.push(Violation::new(
                            path,
                            format!("expected at most {} item(s), got {}", max, arr.len()),
                        ));
                    }
                }
                for (i, item) in arr.iter().enumerate() {
                    check(item, items, &format!("{}[{}]", path, i), out);
                }
            }
            None => out.push(Violation::new(
                path,
                format!("expected array, got {}", type_name(value)),
            )),
        },

        Schema::Object {
            properties,
            required,
            additional,
        } => match value.as_object() {
            Some(map) => {
                for key in required {
                    if !map.contains_key(key) {
                        out.push(Violation::new(
                            format!("{}.{}", path, key),
                            "missing required key",
                        ));
                    }
                }
                for (key, item) in map {
                    if let Some(prop_schema) = properties.get(key) {
                        check(item, prop_schema, &format!("{}.{}", path, key), out);
                    } else if let Some(extra) = additional {
                        check(item, extra, &format!("{}.{}", path, key), out);
                    }
                    // Keys outside the declared shape with no additional
                    // schema are tolerated; agents often add commentary keys.
                }
            }
            None => out.push(Violation::new(
                path,
                format!("expected object, got {}", type_name(value)),
            )),
        },
    }
}
