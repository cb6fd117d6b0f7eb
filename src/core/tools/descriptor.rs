use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The type of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolParameterType {
    String,
    Integer,
    Float,
    Boolean,
    Enum { entries: Vec<String> },
    List { item: Box<ToolParameterType> },
    Object { properties: Vec<ToolParameterDescriptor> },
}

impl ToolParameterType {
    fn to_json_schema(&self) -> Value {
        match self {
            ToolParameterType::String => json!({ "type": "string" }),
            ToolParameterType::Integer => json!({ "type": "integer" }),
            ToolParameterType::Float => json!({ "type": "number" }),
            ToolParameterType::Boolean => json!({ "type": "boolean" }),
            ToolParameterType::Enum { entries } => json!({ "type": "string", "enum": entries }),
            ToolParameterType::List { item } => {
                json!({ "type": "array", "items": item.to_json_schema() })
            }
            ToolParameterType::Object { properties } => object_schema(properties, &[]),
        }
    }
}

/// A named, described parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
}

impl ToolParameterDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ToolParameterType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type,
        }
    }
}

/// How a tool presents itself to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required_parameters: Vec<ToolParameterDescriptor>,
    #[serde(default)]
    pub optional_parameters: Vec<ToolParameterDescriptor>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required_parameters: Vec::new(),
            optional_parameters: Vec::new(),
        }
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ToolParameterType,
    ) -> Self {
        self.required_parameters
            .push(ToolParameterDescriptor::new(name, description, param_type));
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ToolParameterType,
    ) -> Self {
        self.optional_parameters
            .push(ToolParameterDescriptor::new(name, description, param_type));
        self
    }

    /// JSON schema of the argument object, as expected by most providers.
    pub fn to_json_schema(&self) -> Value {
        let all: Vec<ToolParameterDescriptor> = self
            .required_parameters
            .iter()
            .chain(self.optional_parameters.iter())
            .cloned()
            .collect();
        let required: Vec<&str> = self
            .required_parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        object_schema(&all, &required)
    }

    /// Names of required parameters missing from `args`.
    pub fn missing_required<'a>(&'a self, args: &Value) -> Vec<&'a str> {
        self.required_parameters
            .iter()
            .filter(|p| args.get(&p.name).is_none_or(Value::is_null))
            .map(|p| p.name.as_str())
            .collect()
    }
}

fn object_schema(properties: &[ToolParameterDescriptor], required: &[&str]) -> Value {
    let mut props = Map::new();
    for param in properties {
        let mut schema = param.param_type.to_json_schema();
        if let Value::Object(ref mut obj) = schema {
            obj.insert("description".into(), Value::String(param.description.clone()));
        }
        props.insert(param.name.clone(), schema);
    }
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus() -> ToolDescriptor {
        ToolDescriptor::new("plus", "Adds two numbers")
            .required("a", "left operand", ToolParameterType::Integer)
            .required("b", "right operand", ToolParameterType::Integer)
            .optional("note", "free text", ToolParameterType::String)
    }

    #[test]
    fn test_schema_lists_required_and_optional() {
        let schema = plus().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["properties"]["note"]["description"], "free text");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_missing_required() {
        let descriptor = plus();
        assert!(descriptor.missing_required(&json!({"a": 1, "b": 2})).is_empty());
        assert_eq!(descriptor.missing_required(&json!({"a": 1, "b": null})), vec!["b"]);
    }
}
