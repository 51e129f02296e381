//! Callable tool value, carried over from the teacher's `tools.rs` (§4.8):
//! the `Arc<dyn Fn(Value) -> Pin<Box<dyn Future<...>>>>` handler type and
//! the three-tier schema normalizer are unchanged.

use crate::error::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ToolHandler = Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl Tool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, input_schema: Value, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema: convert_schema_to_openai(input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub async fn execute(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }

    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Normalize simple type notation or extended property schemas into full
/// JSON Schema; a schema already carrying `type`+`properties` passes
/// through unchanged.
pub fn convert_schema_to_openai(schema: Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return serde_json::json!({ "type": "object", "properties": {}, "required": [] });
    };

    if obj.contains_key("type") && obj.contains_key("properties") {
        return schema;
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        if let Some(type_str) = param_type.as_str() {
            properties.insert(param_name.clone(), type_to_json_schema(type_str));
            required.push(param_name.clone());
        } else if param_type.is_object() {
            let mut prop = param_type.clone();
            let prop_obj = prop.as_object_mut().expect("checked is_object above");

            let is_optional = prop_obj.remove("optional").and_then(|v| v.as_bool()).unwrap_or(false);
            let is_required = prop_obj.remove("required").and_then(|v| v.as_bool());
            let has_default = prop_obj.contains_key("default");

            properties.insert(param_name.clone(), prop);

            if is_required == Some(true) {
                required.push(param_name.clone());
            } else if is_optional || is_required == Some(false) {
                // explicitly optional
            } else if !has_default {
                required.push(param_name.clone());
            }
        }
    }

    serde_json::json!({ "type": "object", "properties": properties, "required": required })
}

fn type_to_json_schema(type_str: &str) -> Value {
    match type_str {
        "number" | "integer" | "string" | "boolean" | "array" | "object" => {
            serde_json::json!({ "type": type_str })
        }
        other => serde_json::json!({ "type": "string", "description": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn simple_notation_marks_all_fields_required() {
        let tool = Tool::new("add", "add two numbers", json!({"a": "number", "b": "number"}), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        });

        let schema = tool.input_schema();
        let required: Vec<&str> = schema["required"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(required.len(), 2);

        let result = tool.execute(json!({"a": 2.0, "b": 3.0})).await.unwrap();
        assert_eq!(result["result"], 5.0);
    }

    #[test]
    fn optional_flag_is_excluded_from_required() {
        let schema = convert_schema_to_openai(json!({
            "query": {"type": "string"},
            "limit": {"type": "integer", "optional": true}
        }));
        let required: Vec<&str> = schema["required"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(required, vec!["query"]);
    }

    #[test]
    fn full_json_schema_passes_through_unchanged() {
        let input = json!({"type": "object", "properties": {"x": {"type": "string"}}, "required": ["x"]});
        let output = convert_schema_to_openai(input.clone());
        assert_eq!(output, input);
    }
}
