//! Core domain types: documents, endpoints, security schemes, extraction results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiScoutError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DocumentContent
// ---------------------------------------------------------------------------

/// Normalized content of one fetched page. Built once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub url: String,
    pub title: String,
    pub text: String,
    pub code_samples: Vec<String>,
}

impl DocumentContent {
    /// Rough token count (one token per four characters).
    pub fn token_estimate(&self) -> usize {
        let code: usize = self.code_samples.iter().map(|c| c.chars().count()).sum();
        (self.text.chars().count() + code) / 4
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// HTTP verbs an endpoint can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// All verbs, in the order structured specs list them.
    pub const ALL: [HttpMethod; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Head => "head",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| ApiScoutError::parse(format!("unknown HTTP method '{s}'")))
    }
}

/// How sure the extractor is about a fact. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Bucket the share of high-confidence endpoints into a level.
    pub fn from_high_fraction(fraction: f64) -> Self {
        if fraction > 0.7 {
            Self::High
        } else if fraction > 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(ApiScoutError::parse(format!("unknown confidence '{other}'"))),
        }
    }
}

/// Where a parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl FromStr for ParameterLocation {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "header" => Ok(Self::Header),
            "path" => Ok(Self::Path),
            "cookie" => Ok(Self::Cookie),
            other => Err(ApiScoutError::parse(format!(
                "unknown parameter location '{other}'"
            ))),
        }
    }
}

/// Primitive schema types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FromStr for DataType {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(ApiScoutError::parse(format!("unknown data type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint and friends
// ---------------------------------------------------------------------------

/// One request parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

/// Structural description of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

impl Schema {
    /// An object schema with the given properties.
    pub fn object(properties: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data_type: DataType::Object,
            properties: Some(properties),
            items: None,
            required: Vec::new(),
            description: None,
            example: None,
        }
    }
}

/// Request body of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

/// One documented response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

/// Content type assumed when documentation does not say.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// A single operation, identified by `(path, method)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub deprecated: bool,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Endpoint {
    /// Create an endpoint with a normalized path and no detail.
    ///
    /// Fails when `path` is blank: the `(path, method)` key must be usable.
    pub fn new(path: &str, method: HttpMethod, confidence: Confidence) -> Result<Self> {
        let path = normalize_path(path)
            .ok_or_else(|| ApiScoutError::parse("endpoint path is empty"))?;
        Ok(Self {
            path,
            method,
            summary: None,
            description: None,
            operation_id: None,
            tags: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            responses: Vec::new(),
            deprecated: false,
            confidence,
            source_url: None,
        })
    }

    /// Deduplication identity.
    pub fn key(&self) -> (&str, HttpMethod) {
        (&self.path, self.method)
    }

    /// Whether any parameter, body or response carries an example value.
    pub fn has_examples(&self) -> bool {
        self.parameters.iter().any(|p| p.example.is_some())
            || self
                .request_body
                .as_ref()
                .is_some_and(|b| b.example.is_some())
            || self.responses.iter().any(|r| r.example.is_some())
    }
}

/// Trim a path and make sure it starts with `/`. `None` for blank input.
pub fn normalize_path(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

// ---------------------------------------------------------------------------
// Security schemes
// ---------------------------------------------------------------------------

/// Security scheme family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeKind {
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "openIdConnect")]
    OpenIdConnect,
}

impl FromStr for SchemeKind {
    type Err = ApiScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apikey" | "api_key" => Ok(Self::ApiKey),
            "http" => Ok(Self::Http),
            "oauth2" => Ok(Self::OAuth2),
            "openidconnect" => Ok(Self::OpenIdConnect),
            other => Err(ApiScoutError::parse(format!("unknown security scheme type '{other}'"))),
        }
    }
}

/// An authentication mechanism described by the documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: SchemeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

impl SecurityScheme {
    /// A scheme of the given family with no detail.
    pub fn new(kind: SchemeKind) -> Self {
        Self {
            kind,
            description: None,
            name: None,
            location: None,
            scheme: None,
            bearer_format: None,
        }
    }
}

/// Whether two schemes describe the same mechanism.
///
/// - `apiKey` vs `apiKey`: same `location` (header/query/cookie).
/// - `http` vs `http`: same `scheme`, compared case-insensitively.
/// - `oauth2`/`openIdConnect`: same family is enough.
/// - Different families are never equivalent.
pub fn schemes_equivalent(a: &SecurityScheme, b: &SecurityScheme) -> bool {
    match (a.kind, b.kind) {
        (SchemeKind::ApiKey, SchemeKind::ApiKey) => {
            lower(a.location.as_deref()) == lower(b.location.as_deref())
        }
        (SchemeKind::Http, SchemeKind::Http) => {
            lower(a.scheme.as_deref()) == lower(b.scheme.as_deref())
        }
        (SchemeKind::OAuth2, SchemeKind::OAuth2) => true,
        (SchemeKind::OpenIdConnect, SchemeKind::OpenIdConnect) => true,
        _ => false,
    }
}

fn lower(value: Option<&str>) -> Option<String> {
    value.map(|v| v.trim().to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// ExtractionResult
// ---------------------------------------------------------------------------

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub security_schemes: Vec<SecurityScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_description: Option<String>,
    #[serde(default = "low")]
    pub confidence: Confidence,
}

fn low() -> Confidence {
    Confidence::Low
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExtractionResult {
    /// The placeholder returned when a document yields nothing.
    pub fn empty() -> Self {
        Self {
            endpoints: Vec::new(),
            security_schemes: Vec::new(),
            base_url: None,
            api_title: None,
            api_description: None,
            confidence: Confidence::Low,
        }
    }

    /// Overall confidence from the share of high-confidence endpoints.
    pub fn confidence_for(endpoints: &[Endpoint]) -> Confidence {
        if endpoints.is_empty() {
            return Confidence::Low;
        }
        let high = endpoints
            .iter()
            .filter(|e| e.confidence == Confidence::High)
            .count();
        Confidence::from_high_fraction(high as f64 / endpoints.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn token_estimate_counts_text_and_code() {
        let doc = DocumentContent {
            url: "https://example.com/docs".into(),
            title: "Docs".into(),
            text: "a".repeat(40),
            code_samples: vec!["b".repeat(8)],
        };
        assert_eq!(doc.token_estimate(), 12);
    }

    #[test]
    fn confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert_eq!(Confidence::default(), Confidence::Medium);
    }

    #[test]
    fn confidence_buckets() {
        assert_eq!(Confidence::from_high_fraction(0.8), Confidence::High);
        assert_eq!(Confidence::from_high_fraction(0.7), Confidence::Medium);
        assert_eq!(Confidence::from_high_fraction(0.31), Confidence::Medium);
        assert_eq!(Confidence::from_high_fraction(0.3), Confidence::Low);
        assert_eq!(ExtractionResult::confidence_for(&[]), Confidence::Low);
    }

    #[test]
    fn endpoint_path_is_normalized() {
        let ep = Endpoint::new("users/{id}", HttpMethod::Get, Confidence::Medium).unwrap();
        assert_eq!(ep.path, "/users/{id}");
        assert!(Endpoint::new("   ", HttpMethod::Get, Confidence::Medium).is_err());
    }

    #[test]
    fn method_parsing() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("trace".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn endpoint_serializes_lowercase_enums() {
        let ep = Endpoint::new("/fact", HttpMethod::Get, Confidence::High).unwrap();
        let json = serde_json::to_value(&ep).unwrap();
        assert_eq!(json["method"], "get");
        assert_eq!(json["confidence"], "high");
    }

    #[test]
    fn api_key_schemes_compare_by_location() {
        let mut header = SecurityScheme::new(SchemeKind::ApiKey);
        header.location = Some("header".into());
        header.name = Some("X-API-Key".into());
        let mut other_header = SecurityScheme::new(SchemeKind::ApiKey);
        other_header.location = Some("Header".into());
        other_header.name = Some("Authorization".into());
        let mut query = SecurityScheme::new(SchemeKind::ApiKey);
        query.location = Some("query".into());

        assert!(schemes_equivalent(&header, &other_header));
        assert!(!schemes_equivalent(&header, &query));
    }

    #[test]
    fn http_schemes_compare_by_scheme() {
        let mut bearer = SecurityScheme::new(SchemeKind::Http);
        bearer.scheme = Some("bearer".into());
        let mut jwt = SecurityScheme::new(SchemeKind::Http);
        jwt.scheme = Some("Bearer".into());
        jwt.bearer_format = Some("JWT".into());
        let mut basic = SecurityScheme::new(SchemeKind::Http);
        basic.scheme = Some("basic".into());

        assert!(schemes_equivalent(&bearer, &jwt));
        assert!(!schemes_equivalent(&bearer, &basic));
    }

    #[test]
    fn oauth_schemes_always_match_same_family() {
        let mut a = SecurityScheme::new(SchemeKind::OAuth2);
        a.description = Some("OAuth 2.0 (client_credentials)".into());
        let b = SecurityScheme::new(SchemeKind::OAuth2);
        let oidc = SecurityScheme::new(SchemeKind::OpenIdConnect);

        assert!(schemes_equivalent(&a, &b));
        assert!(!schemes_equivalent(&a, &oidc));
        assert!(schemes_equivalent(&oidc, &oidc.clone()));
    }

    #[test]
    fn extraction_result_cache_roundtrip() {
        let mut result = ExtractionResult::empty();
        result
            .endpoints
            .push(Endpoint::new("/widgets", HttpMethod::Get, Confidence::Medium).unwrap());
        result.api_title = Some("Widgets".into());
        let json = serde_json::to_string(&result).unwrap();
        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
