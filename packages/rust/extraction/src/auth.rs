//! Pattern-based authentication detection.
//!
//! Complements model output: a detected scheme is appended only when no
//! equivalent scheme is already present.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use tracing::info;

use apiscout_shared::{SchemeKind, SecurityScheme, schemes_equivalent};

const API_KEY_HEADER: &[&str] = &[
    r"api[_\s-]?key.{0,50}header",
    r"x-api-key",
    r"authorization.{0,30}api[_\s-]?key",
    r"include.{0,30}api[_\s-]?key.{0,30}header",
];

const API_KEY_QUERY: &[&str] = &[
    r"api[_\s-]?key.{0,50}query.{0,20}parameter",
    r"api[_\s-]?key.{0,50}url",
    r"\?api[_\s-]?key=",
];

const BEARER: &[&str] = &[
    r"bearer\s+token",
    r"authorization:\s*bearer",
    r"bearer.{0,30}authentication",
    r"jwt.{0,30}bearer",
];

const BASIC: &[&str] = &[
    r"basic\s+auth",
    r"authorization:\s*basic",
    r"username.{0,30}password.{0,30}base64",
];

const OAUTH2: &[&str] = &[
    r"oauth\s*2\.0",
    r"oauth2",
    r"authorization.{0,30}code.{0,30}flow",
    r"client.{0,30}credentials.{0,30}flow",
    r"access.{0,30}token.{0,30}endpoint",
];

/// OAuth2 flow names and the phrases that suggest them, in report order.
const OAUTH2_FLOWS: &[(&str, &[&str])] = &[
    (
        "authorization_code",
        &[
            r"authorization.{0,20}code",
            r"three.{0,10}legged",
            r"redirect.{0,20}uri",
        ],
    ),
    (
        "client_credentials",
        &[
            r"client.{0,20}credentials",
            r"machine.{0,20}to.{0,20}machine",
            r"two.{0,10}legged",
        ],
    ),
    (
        "password",
        &[
            r"resource.{0,20}owner.{0,20}password",
            r"password.{0,20}flow",
            r"username.{0,20}password.{0,20}grant",
        ],
    ),
    ("implicit", &[r"implicit.{0,20}flow", r"implicit.{0,20}grant"]),
];

/// Header-name capture patterns, tried in order.
const HEADER_NAME_PATTERNS: &[&str] = &[
    r#"(?:header|include).{0,30}['"`](x-api-key)['"`]"#,
    r#"(?:header|include).{0,30}['"`](authorization)['"`]"#,
    r#"(?:header|include).{0,30}['"`](x-auth-token)['"`]"#,
    r#"['"`](x-[^'"` ]+)['"`].{0,30}header"#,
];

const DEFAULT_HEADER_NAME: &str = "X-API-Key";
const QUERY_PARAM_NAME: &str = "api_key";

fn case_insensitive_set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns.iter().map(|p| format!("(?i){p}"))).expect("valid auth regex set")
}

static API_KEY_HEADER_SET: LazyLock<RegexSet> =
    LazyLock::new(|| case_insensitive_set(API_KEY_HEADER));
static API_KEY_QUERY_SET: LazyLock<RegexSet> =
    LazyLock::new(|| case_insensitive_set(API_KEY_QUERY));
static BEARER_SET: LazyLock<RegexSet> = LazyLock::new(|| case_insensitive_set(BEARER));
static BASIC_SET: LazyLock<RegexSet> = LazyLock::new(|| case_insensitive_set(BASIC));
static OAUTH2_SET: LazyLock<RegexSet> = LazyLock::new(|| case_insensitive_set(OAUTH2));

static OAUTH2_FLOW_SETS: LazyLock<Vec<(&'static str, RegexSet)>> = LazyLock::new(|| {
    OAUTH2_FLOWS
        .iter()
        .map(|(flow, patterns)| (*flow, case_insensitive_set(patterns)))
        .collect()
});

static HEADER_NAME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    HEADER_NAME_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid header-name regex"))
        .collect()
});

/// Every scheme family the text suggests, in a fixed order.
pub fn detect_auth_schemes(text: &str) -> Vec<SecurityScheme> {
    let mut schemes = Vec::new();

    if API_KEY_HEADER_SET.is_match(text) {
        let mut scheme = SecurityScheme::new(SchemeKind::ApiKey);
        scheme.name = Some(header_name(text).unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string()));
        scheme.location = Some("header".to_string());
        scheme.description = Some("API key authentication via header".to_string());
        schemes.push(scheme);
    }

    if API_KEY_QUERY_SET.is_match(text) {
        let mut scheme = SecurityScheme::new(SchemeKind::ApiKey);
        scheme.name = Some(QUERY_PARAM_NAME.to_string());
        scheme.location = Some("query".to_string());
        scheme.description = Some("API key authentication via query parameter".to_string());
        schemes.push(scheme);
    }

    if BEARER_SET.is_match(text) {
        let lower = text.to_lowercase();
        let is_jwt = lower.contains("jwt") || lower.contains("json web token");
        let mut scheme = SecurityScheme::new(SchemeKind::Http);
        scheme.scheme = Some("bearer".to_string());
        scheme.bearer_format = is_jwt.then(|| "JWT".to_string());
        scheme.description = Some(if is_jwt {
            "Bearer token authentication (JWT)".to_string()
        } else {
            "Bearer token authentication".to_string()
        });
        schemes.push(scheme);
    }

    if BASIC_SET.is_match(text) {
        let mut scheme = SecurityScheme::new(SchemeKind::Http);
        scheme.scheme = Some("basic".to_string());
        scheme.description = Some("HTTP Basic authentication".to_string());
        schemes.push(scheme);
    }

    if OAUTH2_SET.is_match(text) {
        let flows = oauth2_flows(text);
        let mut scheme = SecurityScheme::new(SchemeKind::OAuth2);
        scheme.description = Some(if flows.is_empty() {
            "OAuth 2.0".to_string()
        } else {
            format!("OAuth 2.0 ({})", flows.join(", "))
        });
        schemes.push(scheme);
    }

    schemes
}

/// Append pattern-detected schemes that have no equivalent in `existing`.
pub fn enhance_schemes(existing: Vec<SecurityScheme>, text: &str) -> Vec<SecurityScheme> {
    let mut merged = existing;
    for detected in detect_auth_schemes(text) {
        if !merged.iter().any(|s| schemes_equivalent(s, &detected)) {
            info!(kind = ?detected.kind, "adding pattern-detected auth scheme");
            merged.push(detected);
        }
    }
    merged
}

fn header_name(text: &str) -> Option<String> {
    HEADER_NAME_RES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn oauth2_flows(text: &str) -> Vec<&'static str> {
    OAUTH2_FLOW_SETS
        .iter()
        .filter(|(_, set)| set.is_match(text))
        .map(|(flow, _)| *flow)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(schemes: &[SecurityScheme]) -> Vec<(SchemeKind, Option<&str>)> {
        schemes
            .iter()
            .map(|s| {
                let detail = s.location.as_deref().or(s.scheme.as_deref());
                (s.kind, detail)
            })
            .collect()
    }

    #[test]
    fn header_key_with_quoted_name() {
        let text = "Your API key goes in a header: send 'X-Widget-Key' as the header value.";
        let schemes = detect_auth_schemes(text);
        assert_eq!(kinds(&schemes), vec![(SchemeKind::ApiKey, Some("header"))]);
        assert_eq!(schemes[0].name.as_deref(), Some("X-Widget-Key"));
    }

    #[test]
    fn header_key_defaults_name() {
        let schemes = detect_auth_schemes("Send X-API-KEY with each request.");
        assert_eq!(schemes[0].name.as_deref(), Some(DEFAULT_HEADER_NAME));
    }

    #[test]
    fn query_key() {
        let schemes = detect_auth_schemes("GET /widgets?api_key=abc123");
        assert_eq!(kinds(&schemes), vec![(SchemeKind::ApiKey, Some("query"))]);
        assert_eq!(schemes[0].name.as_deref(), Some("api_key"));
    }

    #[test]
    fn bearer_detects_jwt() {
        let schemes = detect_auth_schemes("Authorization: Bearer <your JWT>");
        assert_eq!(kinds(&schemes), vec![(SchemeKind::Http, Some("bearer"))]);
        assert_eq!(schemes[0].bearer_format.as_deref(), Some("JWT"));

        let plain = detect_auth_schemes("Use a bearer token.");
        assert_eq!(plain[0].bearer_format, None);
    }

    #[test]
    fn basic_auth() {
        let schemes = detect_auth_schemes("This API uses Basic Auth over TLS.");
        assert_eq!(kinds(&schemes), vec![(SchemeKind::Http, Some("basic"))]);
    }

    #[test]
    fn oauth2_flows_in_description() {
        let text = "We support OAuth 2.0. Use the client credentials grant for machine-to-machine calls, or the authorization code flow with a redirect URI.";
        let schemes = detect_auth_schemes(text);
        let oauth = schemes
            .iter()
            .find(|s| s.kind == SchemeKind::OAuth2)
            .unwrap();
        assert_eq!(
            oauth.description.as_deref(),
            Some("OAuth 2.0 (authorization_code, client_credentials)")
        );
    }

    #[test]
    fn nothing_detected_in_plain_text() {
        assert!(detect_auth_schemes("Widgets come in three sizes.").is_empty());
    }

    #[test]
    fn enhance_skips_equivalent_schemes() {
        let mut existing = SecurityScheme::new(SchemeKind::ApiKey);
        existing.location = Some("header".to_string());
        existing.name = Some("X-Token".to_string());

        let text = "Put the api key in a header. Also accepts a bearer token.";
        let merged = enhance_schemes(vec![existing.clone()], text);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], existing);
        assert_eq!(merged[1].scheme.as_deref(), Some("bearer"));
    }
}
