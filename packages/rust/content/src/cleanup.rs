//! Text cleanup passes applied to extracted visible text.
//!
//! Each pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Lines at or below this many characters are treated as navigation debris.
const MAX_ARTIFACT_LINE_CHARS: usize = 3;

/// Run the full cleanup pipeline on raw extracted text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = collapse_blank_lines(text);
    result = collapse_spaces(&result);
    result = drop_short_lines(&result);
    result.trim().to_string()
}

/// Any run of blank (or whitespace-only) lines becomes a single blank line.
fn collapse_blank_lines(text: &str) -> String {
    static BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

    BLANK_RE.replace_all(text, "\n\n").into_owned()
}

fn collapse_spaces(text: &str) -> String {
    static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid regex"));

    SPACES_RE.replace_all(text, " ").into_owned()
}

/// Drop lines of 1 to 3 visible characters; blank lines stay.
fn drop_short_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| {
            let len = line.trim().chars().count();
            len == 0 || len > MAX_ARTIFACT_LINE_CHARS
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(collapse_blank_lines("one\n\n\n  \n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn spaces_collapse() {
        assert_eq!(collapse_spaces("GET    /widgets  now"), "GET /widgets now");
    }

    #[test]
    fn short_lines_are_dropped() {
        let text = "Widgets\nok\n\nGET /widgets\n»\nNext";
        assert_eq!(drop_short_lines(text), "Widgets\n\nGET /widgets\nNext");
    }

    #[test]
    fn pipeline_trims() {
        assert_eq!(run_pipeline("\n\n  Returns a list  \n\n\n"), "Returns a list");
    }
}
