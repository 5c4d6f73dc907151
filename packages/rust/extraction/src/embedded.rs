//! Embedded structured specs: OpenAPI/Swagger JSON found verbatim in a page.
//!
//! A document that carries its own spec needs no model call. Each operation
//! is converted independently; a malformed entry is logged and skipped.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use apiscout_shared::{
    Confidence, DEFAULT_CONTENT_TYPE, DataType, DocumentContent, Endpoint, ExtractionResult,
    HttpMethod, Parameter, ParameterLocation, Response,
};

const SPEC_MARKERS: &[&str] = &["\"openapi\"", "\"swagger\""];
const PATHS_MARKER: &str = "\"paths\"";

/// Object starts tried when scanning free text for an embedded spec.
const MAX_SCAN_STARTS: usize = 512;

/// Whether `text` carries both a spec marker and a paths marker.
pub fn has_spec_markers(text: &str) -> bool {
    text.contains(PATHS_MARKER) && SPEC_MARKERS.iter().any(|m| text.contains(m))
}

/// Locate an embedded spec: whole text, then an object inside the text, then code samples.
pub fn find_embedded_spec(content: &DocumentContent) -> Option<Value> {
    if has_spec_markers(&content.text) {
        match serde_json::from_str::<Value>(content.text.trim()) {
            Ok(value) if is_spec(&value) => return Some(value),
            Ok(_) => debug!(url = %content.url, "document is JSON but not a spec"),
            Err(e) => debug!(url = %content.url, error = %e, "document is not pure JSON"),
        }
        if let Some(value) = scan_for_spec(&content.text) {
            return Some(value);
        }
    }

    content
        .code_samples
        .iter()
        .filter(|sample| has_spec_markers(sample))
        .find_map(|sample| match serde_json::from_str::<Value>(sample.trim()) {
            Ok(value) if is_spec(&value) => Some(value),
            Ok(_) => None,
            Err(_) => scan_for_spec(sample),
        })
}

/// Try every `{` as the start of a JSON object, tolerating trailing text.
fn scan_for_spec(text: &str) -> Option<Value> {
    let mut from = 0;
    let mut attempts = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        attempts += 1;
        if attempts > MAX_SCAN_STARTS {
            debug!("embedded spec scan gave up");
            return None;
        }

        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if is_spec(&value) => return Some(value),
            // A complete non-spec object: its nested objects are not candidates either.
            Some(Ok(_)) => from = start + stream.byte_offset().max(1),
            _ => from = start + 1,
        }
    }
    None
}

fn is_spec(value: &Value) -> bool {
    value.get("paths").is_some_and(Value::is_object)
}

/// Convert a parsed spec into high-confidence endpoints plus metadata.
pub fn convert_spec(spec: &Value, source_url: &str) -> ExtractionResult {
    let mut result = ExtractionResult::empty();
    result.confidence = Confidence::High;

    if let Some(info) = spec.get("info") {
        result.api_title = non_empty_str(info.get("title"));
        result.api_description = non_empty_str(info.get("description"));
    }
    result.base_url = spec
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| non_empty_str(server.get("url")));

    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return result;
    };

    for (path, item) in paths {
        let Some(operations) = item.as_object() else {
            warn!(path, "skipping path entry that is not an object");
            continue;
        };
        for (key, operation) in operations {
            let Ok(method) = key.parse::<HttpMethod>() else {
                // `parameters`, `$ref`, `summary` and friends.
                continue;
            };
            let Some(operation) = operation.as_object() else {
                debug!(path, method = %method, "skipping non-object operation");
                continue;
            };
            match convert_operation(path, method, operation, source_url) {
                Some(endpoint) => result.endpoints.push(endpoint),
                None => warn!(path, method = %method, "skipping malformed operation"),
            }
        }
    }

    info!(
        url = source_url,
        endpoints = result.endpoints.len(),
        "converted embedded spec"
    );
    result
}

fn convert_operation(
    path: &str,
    method: HttpMethod,
    operation: &Map<String, Value>,
    source_url: &str,
) -> Option<Endpoint> {
    let mut endpoint = Endpoint::new(path, method, Confidence::High).ok()?;

    endpoint.summary = Some(
        operation
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    );
    endpoint.description = non_empty_str(operation.get("description"));
    endpoint.operation_id = non_empty_str(operation.get("operationId"));
    endpoint.tags = string_list(operation.get("tags"));
    endpoint.deprecated = operation
        .get("deprecated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    endpoint.source_url = Some(source_url.to_string());

    if let Some(params) = operation.get("parameters").and_then(Value::as_array) {
        for param in params {
            match convert_parameter(param) {
                Some(p) => endpoint.parameters.push(p),
                None => warn!(path, method = %method, "skipping invalid parameter"),
            }
        }
    }

    if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
        for (status, info) in responses {
            let Some(info) = info.as_object() else {
                continue;
            };
            endpoint.responses.push(Response {
                status_code: status.clone(),
                description: Some(
                    info.get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                schema: None,
                example: None,
            });
        }
    }

    Some(endpoint)
}

/// Type comes from a nested `schema.type`, then a sibling `type`, else string.
fn convert_parameter(param: &Value) -> Option<Parameter> {
    let param = param.as_object()?;
    if param.contains_key("$ref") {
        return None;
    }

    let type_name = param
        .get("schema")
        .and_then(Value::as_object)
        .map(|schema| schema.get("type").and_then(Value::as_str).unwrap_or("string"))
        .or_else(|| param.get("type").and_then(Value::as_str))
        .unwrap_or("string");
    let data_type: DataType = type_name.parse().ok()?;

    let location: ParameterLocation = param
        .get("in")
        .and_then(Value::as_str)
        .unwrap_or("query")
        .parse()
        .ok()?;

    Some(Parameter {
        name: param
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        location,
        description: non_empty_str(param.get("description")),
        required: param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        data_type,
        example: param.get("example").cloned(),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Embedded-spec tier: `Some` only when at least one endpoint came out.
pub fn extract_embedded(content: &DocumentContent) -> Option<ExtractionResult> {
    let spec = find_embedded_spec(content)?;
    let result = convert_spec(&spec, &content.url);
    if result.endpoints.is_empty() {
        debug!(url = %content.url, "embedded spec has no usable operations");
        return None;
    }
    Some(result)
}
