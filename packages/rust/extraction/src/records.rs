//! Conversion of model records into domain types.
//!
//! Each record is parsed on its own; a malformed one is logged and skipped.

use serde_json::{Map, Value};
use tracing::warn;

use apiscout_shared::{
    ApiScoutError, Confidence, DEFAULT_CONTENT_TYPE, DataType, Endpoint, ExtractionResult,
    HttpMethod, Parameter, ParameterLocation, RequestBody, Response, Result, SchemeKind, Schema,
    SecurityScheme,
};

use crate::model::{RecordKind, StructuredRecord};

/// Assemble one document's result from model records.
///
/// Metadata fields all come from the last metadata record.
pub fn result_from_records(records: &[StructuredRecord], source_url: &str) -> ExtractionResult {
    let mut result = ExtractionResult::empty();

    for record in records {
        match record.kind {
            RecordKind::Endpoint => match parse_endpoint(&record.input, source_url) {
                Ok(endpoint) => result.endpoints.push(endpoint),
                Err(e) => warn!(url = source_url, error = %e, "skipping endpoint record"),
            },
            RecordKind::SecurityScheme => match parse_security_scheme(&record.input) {
                Ok(scheme) => result.security_schemes.push(scheme),
                Err(e) => warn!(url = source_url, error = %e, "skipping security scheme record"),
            },
            RecordKind::ApiMetadata => {
                result.api_title = opt_str(&record.input, "title");
                result.api_description = opt_str(&record.input, "description");
                result.base_url = opt_str(&record.input, "base_url");
            }
        }
    }

    result.confidence = ExtractionResult::confidence_for(&result.endpoints);
    result
}

fn parse_endpoint(input: &Value, source_url: &str) -> Result<Endpoint> {
    let data = as_object(input, "endpoint")?;
    let path = required_str(data, "path")?;
    let method: HttpMethod = required_str(data, "method")?.parse()?;
    let confidence = match data.get("confidence").and_then(Value::as_str) {
        Some(raw) => raw.parse::<Confidence>().unwrap_or(Confidence::Medium),
        None => Confidence::Medium,
    };

    let mut endpoint = Endpoint::new(path, method, confidence)?;
    endpoint.summary = opt_str(input, "summary");
    endpoint.description = opt_str(input, "description");
    endpoint.tags = data
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    endpoint.source_url = Some(source_url.to_string());

    for param in array(data, "parameters") {
        match parse_parameter(param) {
            Ok(p) => endpoint.parameters.push(p),
            Err(e) => warn!(path, error = %e, "skipping parameter"),
        }
    }

    endpoint.request_body = data
        .get("request_body")
        .and_then(Value::as_object)
        .map(parse_request_body);

    for response in array(data, "responses") {
        match parse_response(response) {
            Ok(r) => endpoint.responses.push(r),
            Err(e) => warn!(path, error = %e, "skipping response"),
        }
    }

    Ok(endpoint)
}

fn parse_parameter(value: &Value) -> Result<Parameter> {
    let data = as_object(value, "parameter")?;
    Ok(Parameter {
        name: required_str(data, "name")?.to_string(),
        location: required_str(data, "location")?.parse::<ParameterLocation>()?,
        description: opt_str(value, "description"),
        required: data.get("required").and_then(Value::as_bool).unwrap_or(false),
        data_type: match data.get("type").and_then(Value::as_str) {
            Some(raw) => raw.parse::<DataType>()?,
            None => DataType::String,
        },
        example: example(data),
    })
}

fn parse_request_body(data: &Map<String, Value>) -> RequestBody {
    let description = data
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    RequestBody {
        description: description.clone(),
        required: data.get("required").and_then(Value::as_bool).unwrap_or(false),
        content_type: content_type(data),
        schema: schema(data, description),
        example: example(data),
    }
}

fn parse_response(value: &Value) -> Result<Response> {
    let data = as_object(value, "response")?;
    let status_code = match data.get("status_code") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ApiScoutError::parse("response has no status_code")),
    };
    let description = data
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Response {
        status_code,
        description: description.clone(),
        content_type: content_type(data),
        schema: schema(data, description),
        example: example(data),
    })
}

fn parse_security_scheme(input: &Value) -> Result<SecurityScheme> {
    let data = as_object(input, "security scheme")?;
    let kind: SchemeKind = required_str(data, "type")?.parse()?;
    let mut scheme = SecurityScheme::new(kind);
    scheme.description = opt_str(input, "description");
    scheme.name = opt_str(input, "name");
    scheme.location = opt_str(input, "location");
    scheme.scheme = opt_str(input, "scheme");
    scheme.bearer_format = opt_str(input, "bearer_format");
    Ok(scheme)
}

/// `schema_properties` becomes an object schema.
fn schema(data: &Map<String, Value>, description: Option<String>) -> Option<Schema> {
    let properties = data.get("schema_properties")?.as_object()?.clone();
    let mut schema = Schema::object(properties);
    schema.description = description;
    Some(schema)
}

fn content_type(data: &Map<String, Value>) -> String {
    data.get("content_type")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn example(data: &Map<String, Value>) -> Option<Value> {
    data.get("example").filter(|v| !v.is_null()).cloned()
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ApiScoutError::parse(format!("{what} record is not an object")))
}

fn required_str<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiScoutError::parse(format!("missing '{field}'")))
}

fn opt_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array<'a>(data: &'a Map<String, Value>, field: &str) -> &'a [Value] {
    data.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
