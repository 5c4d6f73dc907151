//! The structured-extraction boundary and its Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use apiscout_shared::{ApiScoutError, ExtractionConfig, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The three record kinds a model may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Endpoint,
    SecurityScheme,
    ApiMetadata,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Endpoint, Self::SecurityScheme, Self::ApiMetadata];

    /// Tool name the model calls for this kind.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Endpoint => "record_endpoint",
            Self::SecurityScheme => "record_security_scheme",
            Self::ApiMetadata => "record_api_metadata",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tool_name() == name)
    }
}

/// One structured call returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    pub kind: RecordKind,
    pub input: Value,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Prompt plus the fixed record schemas.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub prompt: &'a str,
    pub tools: &'a [ToolSpec],
}

/// Anything that turns a prompt into structured records.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<StructuredRecord>>;
}

/// Tool definitions for endpoint, security-scheme and metadata records.
pub fn extraction_tools() -> Vec<ToolSpec> {
    let schema_properties = json!({
        "type": "object",
        "description": "JSON object describing the schema properties"
    });

    vec![
        ToolSpec {
            name: RecordKind::Endpoint.tool_name(),
            description: "Record an API endpoint with its complete information",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Endpoint path (e.g., /users/{id})"},
                    "method": {
                        "type": "string",
                        "enum": ["get", "post", "put", "delete", "patch", "head", "options"],
                        "description": "HTTP method"
                    },
                    "summary": {"type": "string", "description": "Short summary of what the endpoint does"},
                    "description": {"type": "string", "description": "Detailed description"},
                    "parameters": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "location": {"type": "string", "enum": ["query", "header", "path", "cookie"]},
                                "description": {"type": "string"},
                                "required": {"type": "boolean"},
                                "type": {
                                    "type": "string",
                                    "enum": ["string", "number", "integer", "boolean", "array", "object"]
                                },
                                "example": {"type": "string"}
                            },
                            "required": ["name", "location", "type"]
                        }
                    },
                    "request_body": {
                        "type": "object",
                        "properties": {
                            "description": {"type": "string"},
                            "required": {"type": "boolean"},
                            "content_type": {"type": "string"},
                            "example": {"type": "string"},
                            "schema_properties": schema_properties.clone()
                        }
                    },
                    "responses": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "status_code": {"type": "string"},
                                "description": {"type": "string"},
                                "content_type": {"type": "string"},
                                "example": {"type": "string"},
                                "schema_properties": schema_properties
                            },
                            "required": ["status_code", "description"]
                        }
                    },
                    "tags": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Categories or tags for this endpoint"
                    },
                    "confidence": {
                        "type": "string",
                        "enum": ["high", "medium", "low"],
                        "description": "Confidence level in the extracted information"
                    }
                },
                "required": ["path", "method", "summary"]
            }),
        },
        ToolSpec {
            name: RecordKind::SecurityScheme.tool_name(),
            description: "Record an authentication/security scheme used by the API",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": {"type": "string", "enum": ["apiKey", "http", "oauth2", "openIdConnect"]},
                    "description": {"type": "string"},
                    "name": {"type": "string"},
                    "location": {"type": "string", "enum": ["query", "header", "cookie"]},
                    "scheme": {"type": "string"},
                    "bearer_format": {"type": "string"}
                },
                "required": ["type"]
            }),
        },
        ToolSpec {
            name: RecordKind::ApiMetadata.tool_name(),
            description: "Record general API metadata",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "base_url": {"type": "string"},
                    "version": {"type": "string"}
                }
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// Anthropic client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

/// Messages API client with tool use.
#[derive(Debug, Clone)]
pub struct AnthropicExtractor {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
}

impl AnthropicExtractor {
    pub fn new(config: &ExtractionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl StructuredExtractor for AnthropicExtractor {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<StructuredRecord>> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "tools": request.tools,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiScoutError::Extraction(format!("model request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiScoutError::Extraction(format!(
                "model returned {status}: {text}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ApiScoutError::Extraction(format!("unreadable model response: {e}")))?;

        let mut records = Vec::new();
        for block in parsed.content {
            let ContentBlock::ToolUse { name, input } = block else {
                continue;
            };
            match RecordKind::from_tool_name(&name) {
                Some(kind) => records.push(StructuredRecord { kind, input }),
                None => debug!(tool = %name, "ignoring unknown tool call"),
            }
        }

        debug!(records = records.len(), "model returned records");
        Ok(records)
    }
}
