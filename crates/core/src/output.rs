//! Structured output: JSON Schema constraints on the final agent response.

use crate::error::{AgentError, AgentResult};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requested format of the final response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputFormat {
    /// The response must validate against the given JSON Schema.
    JsonSchema { schema: Value },
}

impl OutputFormat {
    pub fn json_schema(schema: Value) -> Self {
        Self::JsonSchema { schema }
    }

    pub fn schema(&self) -> &Value {
        match self {
            Self::JsonSchema { schema } => schema,
        }
    }

    /// Compile the schema into a reusable validator.
    pub fn validator(&self) -> AgentResult<OutputValidator> {
        OutputValidator::new(self.schema())
    }
}

/// Compiled output schema.
pub struct OutputValidator {
    compiled: JSONSchema,
}

impl OutputValidator {
    pub fn new(schema: &Value) -> AgentResult<Self> {
        let compiled = JSONSchema::compile(schema)
            .map_err(|e| AgentError::Configuration(format!("invalid output schema: {}", e)))?;
        Ok(Self { compiled })
    }

    /// Validate an already-parsed response value.
    pub fn validate(&self, instance: &Value) -> AgentResult<()> {
        if let Err(errors) = self.compiled.validate(instance) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            return Err(AgentError::OutputSchemaViolation(messages.join("; ")));
        }
        Ok(())
    }

    /// Parse a textual response as JSON and validate it.
    pub fn validate_text(&self, text: &str) -> AgentResult<Value> {
        let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
            AgentError::OutputSchemaViolation(format!("response is not valid JSON: {}", e))
        })?;
        self.validate(&value)?;
        Ok(value)
    }
}

impl std::fmt::Debug for OutputValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis_format() -> OutputFormat {
        OutputFormat::json_schema(json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string"},
                "complexity_score": {"type": "integer", "minimum": 1, "maximum": 10}
            },
            "required": ["file_name", "complexity_score"]
        }))
    }

    #[test]
    fn test_output_format_wire_shape() {
        let format = analysis_format();
        let value = serde_json::to_value(&format).unwrap();
        assert_eq!(value["type"], "json_schema");
        assert_eq!(value["schema"]["type"], "object");

        let parsed: OutputFormat = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, format);
    }

    #[test]
    fn test_valid_output_passes() {
        let validator = analysis_format().validator().unwrap();
        let value = validator
            .validate_text(r#"{"file_name": "main.rs", "complexity_score": 3}"#)
            .unwrap();
        assert_eq!(value["file_name"], "main.rs");
    }

    #[test]
    fn test_invalid_output_is_a_violation() {
        let validator = analysis_format().validator().unwrap();

        let err = validator
            .validate(&json!({"file_name": "main.rs", "complexity_score": 42}))
            .unwrap_err();
        assert!(matches!(err, AgentError::OutputSchemaViolation(_)));

        let err = validator.validate(&json!({"file_name": "main.rs"})).unwrap_err();
        assert!(matches!(err, AgentError::OutputSchemaViolation(_)));
    }

    #[test]
    fn test_non_json_text_is_a_violation() {
        let validator = analysis_format().validator().unwrap();
        let err = validator.validate_text("Here is my analysis...").unwrap_err();
        assert!(matches!(err, AgentError::OutputSchemaViolation(ref m) if m.contains("not valid JSON")));
    }

    #[test]
    fn test_invalid_schema_is_a_configuration_error() {
        let format = OutputFormat::json_schema(json!({"type": 12}));
        assert!(matches!(format.validator(), Err(AgentError::Configuration(_))));
    }
}
