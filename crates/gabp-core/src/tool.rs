//! Tool descriptors advertised via `tools/list`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One formal parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolParameter {
    pub name: String,
    /// JSON type name: string, number, integer, boolean, array, object
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// Required parameter of the given JSON type
    pub fn required(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: None,
            required: true,
            default: None,
        }
    }

    /// Optional parameter with a default substituted when absent
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: None,
            required: false,
            default: Some(default),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tool metadata advertised via `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Conventionally `namespace/verb`, e.g. `inventory/get`
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Advertised metadata; the session layer requires auth for every
    /// post-handshake method regardless of this flag
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

fn default_requires_auth() -> bool {
    true
}

impl ToolDescriptor {
    /// Descriptor with only the name populated
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            requires_auth: true,
            parameters: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ToolParameter>) -> Self {
        self.parameters = parameters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_wire_names() {
        let desc = ToolDescriptor::named("math/add")
            .with_description("Add two numbers")
            .with_parameters(vec![
                ToolParameter::required("a", "integer"),
                ToolParameter::optional("b", "integer", json!(0)),
            ]);

        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"requiresAuth\":true"));
        assert!(json.contains("\"type\":\"integer\""));
        assert!(json.contains("\"required\":false"));
        assert!(json.contains("\"default\":0"));

        let back: ToolDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_descriptor_defaults() {
        let json = r#"{"name":"world/ping"}"#;
        let desc: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert!(desc.requires_auth);
        assert!(desc.parameters.is_empty());
        assert!(desc.description.is_none());
    }
}
