//! Prompt construction for the model tier.

use tracing::warn;

use apiscout_shared::DocumentContent;

const DOCUMENTATION_PLACEHOLDER: &str = "{documentation}";
const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Instruction template. The document is substituted by plain replacement,
/// so braces inside documentation are never interpreted.
pub const EXTRACTION_PROMPT: &str = r#"You are an API documentation analyzer. Your task is to extract ALL API endpoints from the documentation.

TASK: For EVERY endpoint you find, call the record_endpoint tool.

What is an endpoint?
- A URL path that accepts HTTP requests (GET, POST, PUT, DELETE, PATCH, etc.)
- Examples: /users, /api/v1/data, /facts, /breeds/{id}

How to find endpoints:
1. Look for HTTP methods (GET, POST, PUT, DELETE, PATCH) followed by paths
2. Look for URL paths in code examples (curl commands, request examples)
3. In OpenAPI/Swagger JSON: look for the "paths" object, each key is an endpoint
4. Look for endpoint tables or lists in the documentation

Example extractions:
- See "GET /fact" -> call record_endpoint(path="/fact", method="get", summary="...")
- See '"paths": {"/breeds": {"get": ...}}' -> call record_endpoint(path="/breeds", method="get", ...)
- See "curl https://api.example.com/users" -> call record_endpoint(path="/users", method="get", ...)

For each endpoint, extract:
- path: The URL path (required)
- method: The HTTP method (required)
- summary: Brief description of what it does (required)
- parameters: Query params, path params, headers (optional)
- responses: Status codes and descriptions (optional)
- confidence: "high" if you're certain, "medium" if some info missing, "low" if unclear

If the documentation names an authentication mechanism, call record_security_scheme.
If it states the API title, description or base URL, call record_api_metadata.

Documentation:
{documentation}

Now extract ALL endpoints by calling record_endpoint for each one."#;

/// URL, title, text, then up to `max_code_samples` fenced samples, cut at `max_chars`.
pub fn document_text(content: &DocumentContent, max_code_samples: usize, max_chars: usize) -> String {
    let mut text = format!(
        "URL: {}\nTitle: {}\n\n{}",
        content.url, content.title, content.text
    );

    if !content.code_samples.is_empty() && max_code_samples > 0 {
        text.push_str("\n\nCode Samples:\n");
        for (i, sample) in content.code_samples.iter().take(max_code_samples).enumerate() {
            text.push_str(&format!("\nSample {}:\n```\n{sample}\n```\n", i + 1));
        }
    }

    truncate_chars(text, max_chars)
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            warn!(
                chars = text.chars().count(),
                max_chars, "documentation too long, truncating"
            );
            let mut truncated = text[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text,
    }
}

/// The full prompt for one document.
pub fn render_prompt(document_text: &str) -> String {
    EXTRACTION_PROMPT.replace(DOCUMENTATION_PLACEHOLDER, document_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(samples: usize) -> DocumentContent {
        DocumentContent {
            url: "https://example.test/docs".to_string(),
            title: "Widgets".to_string(),
            text: "Returns a list of widgets".to_string(),
            code_samples: (1..=samples).map(|i| format!("GET /widgets/{i}")).collect(),
        }
    }

    #[test]
    fn layout() {
        let text = document_text(&content(1), 10, 600_000);
        assert_eq!(
            text,
            "URL: https://example.test/docs\nTitle: Widgets\n\nReturns a list of widgets\n\nCode Samples:\n\nSample 1:\n```\nGET /widgets/1\n```\n"
        );
    }

    #[test]
    fn samples_are_capped() {
        let text = document_text(&content(12), 10, 600_000);
        assert!(text.contains("Sample 10:"));
        assert!(!text.contains("Sample 11:"));
    }

    #[test]
    fn truncation_is_char_safe() {
        let mut doc = content(0);
        doc.text = "é".repeat(100);
        let text = document_text(&doc, 10, 50);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            text.strip_suffix(TRUNCATION_MARKER).unwrap().chars().count(),
            50
        );
    }

    #[test]
    fn braces_in_documentation_survive() {
        let prompt = render_prompt(r#"{"paths": {"/fact": {}}} and {documentation}"#);
        assert!(prompt.contains(r#"{"paths": {"/fact": {}}}"#));
        assert!(!prompt.contains("Documentation:\n{documentation}\n"));
    }
}
