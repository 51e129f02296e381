//! Built-in arithmetic tool (§4.8: "the registry composes built-in tools
//! (e.g. a deterministic arithmetic evaluator...)"), registered at startup so
//! `query_type=calculation`/`strategy=invoke_tools` (§4.9.1, §4.9.3) has at
//! least one tool to hand the LLM. Four fixed operations rather than a
//! general expression evaluator, carried over from the teacher's
//! `calculator_tools.rs` example (`add`/`subtract`/`multiply`/`divide`, each
//! taking numeric `a`/`b`).

use super::tool::Tool;
use serde_json::json;

fn binary_op_schema() -> serde_json::Value {
    json!({"a": "number", "b": "number"})
}

/// The four arithmetic tools, ready to `register_local` under
/// `ToolCategory::Calculation`.
pub fn builtin_tools() -> Vec<Tool> {
    vec![
        Tool::new("add", "Add two numbers", binary_op_schema(), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        }),
        Tool::new("subtract", "Subtract the second number from the first", binary_op_schema(), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a - b}))
        }),
        Tool::new("multiply", "Multiply two numbers", binary_op_schema(), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a * b}))
        }),
        Tool::new("divide", "Divide the first number by the second", binary_op_schema(), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Ok(json!({"error": "cannot divide by zero"}));
            }
            Ok(json!({"result": a / b}))
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_returns_sum() {
        let tool = builtin_tools().into_iter().find(|t| t.name() == "add").unwrap();
        let result = tool.execute(json!({"a": 2.0, "b": 3.0})).await.unwrap();
        assert_eq!(result["result"], 5.0);
    }

    #[tokio::test]
    async fn divide_by_zero_is_reported_not_panicked() {
        let tool = builtin_tools().into_iter().find(|t| t.name() == "divide").unwrap();
        let result = tool.execute(json!({"a": 1.0, "b": 0.0})).await.unwrap();
        assert_eq!(result["error"], "cannot divide by zero");
    }

    #[test]
    fn four_builtin_tools_are_registered() {
        let names: Vec<&str> = builtin_tools().iter().map(Tool::name).collect();
        assert_eq!(names, vec!["add", "subtract", "multiply", "divide"]);
    }
}
