//! Merge per-document extraction results into one canonical API description.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use apiscout_shared::{Endpoint, ExtractionResult, HttpMethod, SecurityScheme};

/// API-level metadata, each field from the first result that provides it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// The canonical triple handed to downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalApi {
    pub endpoints: Vec<Endpoint>,
    pub security_schemes: Vec<SecurityScheme>,
    pub metadata: ApiMetadata,
}

/// Merge results in iteration order.
///
/// - Endpoints are unique by `(path, method)`. A later duplicate replaces the
///   kept entry only with strictly higher confidence, in the kept entry's position.
/// - Security schemes are concatenated without cross-document dedup.
/// - Metadata fields are chosen independently: first non-empty value wins.
pub fn merge(results: &[ExtractionResult]) -> CanonicalApi {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut index: HashMap<(String, HttpMethod), usize> = HashMap::new();
    let mut security_schemes = Vec::new();
    let mut metadata = ApiMetadata::default();

    for result in results {
        for endpoint in &result.endpoints {
            let key = (endpoint.path.clone(), endpoint.method);
            match index.get(&key) {
                Some(&pos) => {
                    if endpoint.confidence > endpoints[pos].confidence {
                        debug!(
                            path = %endpoint.path,
                            method = %endpoint.method,
                            from = %endpoints[pos].confidence,
                            to = %endpoint.confidence,
                            "replacing duplicate endpoint"
                        );
                        endpoints[pos] = endpoint.clone();
                    }
                }
                None => {
                    index.insert(key, endpoints.len());
                    endpoints.push(endpoint.clone());
                }
            }
        }

        security_schemes.extend(result.security_schemes.iter().cloned());

        fill(&mut metadata.title, &result.api_title);
        fill(&mut metadata.description, &result.api_description);
        fill(&mut metadata.base_url, &result.base_url);
    }

    CanonicalApi {
        endpoints,
        security_schemes,
        metadata,
    }
}

fn fill(slot: &mut Option<String>, candidate: &Option<String>) {
    if slot.is_none() {
        if let Some(value) = candidate.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiscout_shared::{Confidence, SchemeKind};
    use std::collections::HashSet;

    fn endpoint(path: &str, method: HttpMethod, confidence: Confidence, summary: &str) -> Endpoint {
        let mut e = Endpoint::new(path, method, confidence).unwrap();
        e.summary = Some(summary.to_string());
        e
    }

    fn result(endpoints: Vec<Endpoint>) -> ExtractionResult {
        ExtractionResult {
            endpoints,
            ..ExtractionResult::empty()
        }
    }

    #[test]
    fn higher_confidence_wins() {
        let merged = merge(&[
            result(vec![endpoint("/users", HttpMethod::Get, Confidence::Medium, "a")]),
            result(vec![endpoint("/users", HttpMethod::Get, Confidence::High, "b")]),
        ]);
        assert_eq!(merged.endpoints.len(), 1);
        assert_eq!(merged.endpoints[0].confidence, Confidence::High);
        assert_eq!(merged.endpoints[0].summary.as_deref(), Some("b"));
    }

    #[test]
    fn ties_keep_the_first() {
        let merged = merge(&[
            result(vec![endpoint("/users", HttpMethod::Get, Confidence::Medium, "first")]),
            result(vec![
                endpoint("/users", HttpMethod::Get, Confidence::Medium, "second"),
                endpoint("/users", HttpMethod::Get, Confidence::Low, "third"),
            ]),
        ]);
        assert_eq!(merged.endpoints.len(), 1);
        assert_eq!(merged.endpoints[0].summary.as_deref(), Some("first"));
    }

    #[test]
    fn replacement_keeps_position() {
        let merged = merge(&[
            result(vec![
                endpoint("/a", HttpMethod::Get, Confidence::Low, "a-low"),
                endpoint("/b", HttpMethod::Get, Confidence::Low, "b"),
            ]),
            result(vec![endpoint("/a", HttpMethod::Get, Confidence::High, "a-high")]),
        ]);
        let summaries: Vec<_> = merged
            .endpoints
            .iter()
            .map(|e| e.summary.as_deref().unwrap())
            .collect();
        assert_eq!(summaries, vec!["a-high", "b"]);
    }

    #[test]
    fn method_is_part_of_the_key() {
        let merged = merge(&[result(vec![
            endpoint("/users", HttpMethod::Get, Confidence::Low, "list"),
            endpoint("/users", HttpMethod::Post, Confidence::Low, "create"),
        ])]);
        assert_eq!(merged.endpoints.len(), 2);
    }

    #[test]
    fn dedup_never_adds_keys() {
        let levels = [Confidence::Low, Confidence::Medium, Confidence::High];
        let mut input = Vec::new();
        for i in 0..30 {
            let path = format!("/r{}", i % 7);
            let method = HttpMethod::ALL[i % 3];
            input.push(result(vec![endpoint(&path, method, levels[i % 3], "x")]));
        }
        let distinct: HashSet<(String, HttpMethod)> = input
            .iter()
            .flat_map(|r| r.endpoints.iter().map(|e| (e.path.clone(), e.method)))
            .collect();

        let merged = merge(&input);
        assert_eq!(merged.endpoints.len(), distinct.len());
        for e in &merged.endpoints {
            let best = input
                .iter()
                .flat_map(|r| &r.endpoints)
                .filter(|o| o.key() == e.key())
                .map(|o| o.confidence)
                .max()
                .unwrap();
            assert_eq!(e.confidence, best);
        }
    }

    #[test]
    fn metadata_fields_are_independent() {
        let first = ExtractionResult {
            api_title: Some("Widgets".into()),
            ..ExtractionResult::empty()
        };
        let second = ExtractionResult {
            api_title: Some("Ignored".into()),
            api_description: Some("  ".into()),
            base_url: Some("https://api.widgets.test".into()),
            ..ExtractionResult::empty()
        };
        let third = ExtractionResult {
            api_description: Some("All about widgets".into()),
            ..ExtractionResult::empty()
        };

        let merged = merge(&[first, second, third]);
        assert_eq!(
            merged.metadata,
            ApiMetadata {
                title: Some("Widgets".into()),
                description: Some("All about widgets".into()),
                base_url: Some("https://api.widgets.test".into()),
            }
        );
    }

    #[test]
    fn schemes_are_concatenated() {
        let scheme = SecurityScheme::new(SchemeKind::OAuth2);
        let a = ExtractionResult {
            security_schemes: vec![scheme.clone()],
            ..ExtractionResult::empty()
        };
        let merged = merge(&[a.clone(), a]);
        assert_eq!(merged.security_schemes, vec![scheme.clone(), scheme]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(merge(&[]), CanonicalApi::default());
    }
}
