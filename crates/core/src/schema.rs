// Tool parameter schemas and validated argument records

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Primitive type a tool parameter is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Mapping from parameter name to its declared type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: BTreeMap<String, ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required parameter.
    pub fn required(mut self, name: impl Into<String>, param_type: ParamType, description: &str) -> Self {
        self.params.insert(
            name.into(),
            ParamSpec {
                param_type,
                description: Some(description.to_string()),
                required: true,
            },
        );
        self
    }

    /// Declare an optional parameter.
    pub fn optional(mut self, name: impl Into<String>, param_type: ParamType, description: &str) -> Self {
        self.params.insert(
            name.into(),
            ParamSpec {
                param_type,
                description: Some(description.to_string()),
                required: false,
            },
        );
        self
    }

    /// Build a schema where every listed parameter is required and undocumented.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = (S, ParamType)>,
        S: Into<String>,
    {
        let params = types
            .into_iter()
            .map(|(name, param_type)| {
                (
                    name.into(),
                    ParamSpec {
                        param_type,
                        description: None,
                        required: true,
                    },
                )
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as a JSON Schema object for MCP `inputSchema`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.params {
            let property = match &spec.description {
                Some(description) => json_schema_typed(spec.param_type, description),
                None => serde_json::json!({ "type": spec.param_type.as_str() }),
            };
            properties.insert(name.clone(), property);
            if spec.required {
                required.push(name.as_str());
            }
        }
        json_schema_object(Value::Object(properties), required)
    }

    /// Check raw arguments against the schema and convert them into a typed record.
    pub fn validate(&self, arguments: &Value) -> AgentResult<Arguments> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(AgentError::SchemaValidation(format!(
                    "arguments must be an object, got {}",
                    json_type_name(other)
                )))
            }
        };

        let mut problems = Vec::new();

        for name in object.keys() {
            if !self.params.contains_key(name) {
                problems.push(format!("unknown parameter '{}'", name));
            }
        }

        let mut values = BTreeMap::new();
        for (name, spec) in &self.params {
            match object.get(name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        problems.push(format!("missing required parameter '{}'", name));
                    }
                }
                Some(raw) => match ArgValue::coerce(raw, spec.param_type) {
                    Some(value) => {
                        values.insert(name.clone(), value);
                    }
                    None => problems.push(format!(
                        "parameter '{}' must be {}, got {}",
                        name,
                        spec.param_type.as_str(),
                        json_type_name(raw)
                    )),
                },
            }
        }

        if problems.is_empty() {
            Ok(Arguments { values })
        } else {
            Err(AgentError::SchemaValidation(problems.join("; ")))
        }
    }
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl ArgValue {
    fn coerce(raw: &Value, param_type: ParamType) -> Option<Self> {
        match (param_type, raw) {
            (ParamType::String, Value::String(s)) => Some(Self::String(s.clone())),
            (ParamType::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self::Integer(i));
                }
                // 3.0 is an integer, 3.5 is not
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(Self::Integer(f as i64))
                } else {
                    None
                }
            }
            (ParamType::Number, Value::Number(n)) => n.as_f64().map(Self::Number),
            (ParamType::Boolean, Value::Bool(b)) => Some(Self::Boolean(*b)),
            (ParamType::Array, Value::Array(items)) => Some(Self::Array(items.clone())),
            (ParamType::Object, Value::Object(map)) => Some(Self::Object(map.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Number(f) => Value::from(*f),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            ArgValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers widen to `f64`.
    pub fn f64(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            ArgValue::Number(f) => Some(*f),
            ArgValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_value()))
                .collect(),
        )
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Helper functions for creating JSON schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_typed(param_type: ParamType, description: &str) -> Value {
    serde_json::json!({
        "type": param_type.as_str(),
        "description": description
    })
}

pub fn json_schema_string(description: &str) -> Value {
    json_schema_typed(ParamType::String, description)
}

pub fn json_schema_array(items: Value, description: &str) -> Value {
    serde_json::json!({
        "type": "array",
        "items": items,
        "description": description
    })
}
