use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemma-2-9b-it";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A JSON Schema node. Objects carry `properties`, arrays carry `items`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<Box<AdditionalProperties>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
}

/// `additionalProperties` is either a flag or a schema for the values of a map.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(JsonSchema),
}

impl JsonSchema {
    pub fn string(description: &str) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    pub fn string_array(description: &str) -> Self {
        Self {
            schema_type: "array".to_string(),
            description: Some(description.to_string()),
            items: Some(Box::new(JsonSchema {
                schema_type: "string".to_string(),
                ..Self::default()
            })),
            ..Self::default()
        }
    }

    pub fn string_enum(description: &str, values: &[&str]) -> Self {
        Self {
            r#enum: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::string(description)
        }
    }

    /// A closed object whose listed properties are all required.
    pub fn object(description: &str, properties: Vec<(String, JsonSchema)>) -> Self {
        let required = properties.iter().map(|(name, _)| name.clone()).collect();
        Self {
            schema_type: "object".to_string(),
            description: Some(description.to_string()),
            properties: Some(properties.into_iter().collect()),
            additional_properties: Some(Box::new(AdditionalProperties::Allowed(false))),
            required,
            ..Self::default()
        }
    }

    /// True when every object in the tree lists its properties and forbids
    /// any others.
    pub fn is_closed(&self) -> bool {
        let own = match self.schema_type.as_str() {
            "object" => {
                self.properties.is_some()
                    && matches!(
                        self.additional_properties.as_deref(),
                        Some(AdditionalProperties::Allowed(false))
                    )
            }
            _ => true,
        };
        own && self
            .properties
            .iter()
            .flat_map(|properties| properties.values())
            .chain(self.items.as_deref())
            .all(JsonSchema::is_closed)
    }

    /// An object used as a map from free-form keys to string values.
    pub fn string_map(description: &str) -> Self {
        Self {
            schema_type: "object".to_string(),
            description: Some(description.to_string()),
            additional_properties: Some(Box::new(AdditionalProperties::Schema(JsonSchema {
                schema_type: "string".to_string(),
                ..Self::default()
            }))),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JsonSchemaDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    pub schema: JsonSchema,
}

impl JsonSchemaDefinition {
    /// Requests strict mode only when the schema allows it: strict providers
    /// reject any object that is not closed with `additionalProperties: false`.
    pub fn new(name: &str, schema: JsonSchema) -> Self {
        Self {
            name: name.to_string(),
            strict: Some(schema.is_closed()),
            schema,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaDefinition>,
}

impl ResponseFormat {
    pub fn json_schema(definition: JsonSchemaDefinition) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: Some(definition),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionResponseMessage,
}

/// Only the fields this crate reads; the rest of the envelope is ignored.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}
