// Calculator tools: add, multiply, power

use crate::server::ToolServer;
use crate::tools::{ToolDefinition, ToolRegistry, ToolResult};
use agentkit_core::{AgentResult, Arguments, ParamType, ParameterSchema};
use anyhow::{anyhow, Result};

fn operands(args: &Arguments, left: &str, right: &str) -> Result<(f64, f64)> {
    let a = args.f64(left).ok_or_else(|| anyhow!("missing '{}'", left))?;
    let b = args.f64(right).ok_or_else(|| anyhow!("missing '{}'", right))?;
    Ok((a, b))
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("result is not a finite number"))
    }
}

pub fn add_tool() -> ToolDefinition {
    ToolDefinition::new(
        "add",
        "Add two numbers together",
        ParameterSchema::new()
            .required("a", ParamType::Number, "First addend")
            .required("b", ParamType::Number, "Second addend"),
        |args| async move {
            let (a, b) = operands(&args, "a", "b")?;
            Ok(ToolResult::text(format!("The sum is: {}", finite(a + b)?)))
        },
    )
}

pub fn multiply_tool() -> ToolDefinition {
    ToolDefinition::new(
        "multiply",
        "Multiply two numbers together",
        ParameterSchema::new()
            .required("a", ParamType::Number, "First factor")
            .required("b", ParamType::Number, "Second factor"),
        |args| async move {
            let (a, b) = operands(&args, "a", "b")?;
            Ok(ToolResult::text(format!("The product is: {}", finite(a * b)?)))
        },
    )
}

pub fn power_tool() -> ToolDefinition {
    ToolDefinition::new(
        "power",
        "Raise a number to a power",
        ParameterSchema::new()
            .required("base", ParamType::Number, "The base")
            .required("exponent", ParamType::Number, "The exponent"),
        |args| async move {
            let (base, exponent) = operands(&args, "base", "exponent")?;
            Ok(ToolResult::text(format!(
                "The result is: {}",
                finite(base.powf(exponent))?
            )))
        },
    )
}

/// Registry holding the three calculator tools.
pub fn calculator_registry() -> AgentResult<ToolRegistry> {
    ToolRegistry::new()
        .with(add_tool())?
        .with(multiply_tool())?
        .with(power_tool())
}

/// A `calculator` tool server.
pub fn calculator_server() -> AgentResult<ToolServer> {
    Ok(ToolServer::new("calculator", calculator_registry()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::AgentError;
    use serde_json::json;

    #[tokio::test]
    async fn test_calculator_tools() {
        let server = calculator_server().unwrap();

        let sum = server.invoke("add", &json!({"a": 42, "b": 58})).await.unwrap();
        assert_eq!(sum.first_text(), Some("The sum is: 100"));

        let product = server.invoke("multiply", &json!({"a": 100, "b": 7})).await.unwrap();
        assert_eq!(product.first_text(), Some("The product is: 700"));

        let power = server
            .invoke("power", &json!({"base": 2, "exponent": 10}))
            .await
            .unwrap();
        assert_eq!(power.first_text(), Some("The result is: 1024"));

        let fractional = server.invoke("add", &json!({"a": 0.5, "b": 0.25})).await.unwrap();
        assert_eq!(fractional.first_text(), Some("The sum is: 0.75"));
    }

    #[tokio::test]
    async fn test_overflow_is_an_execution_error() {
        let server = calculator_server().unwrap();
        let err = server
            .invoke("power", &json!({"base": 10, "exponent": 400}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { .. }));
    }

    #[test]
    fn test_calculator_lists_three_tools() {
        let names: Vec<String> = calculator_server()
            .unwrap()
            .list_tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["add", "multiply", "power"]);
    }
}
