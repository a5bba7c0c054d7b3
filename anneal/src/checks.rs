//! Reusable predicate requirements for common output constraints.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::requirement::Requirement;

static MARKDOWN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\*{1,2}[^*]+\*{1,2}",      // *italic* or **bold**
        r"_{1,2}[^_]+_{1,2}",        // _italic_ or __bold__
        r"`[^`]+`",                  // `inline code`
        r"~~[^~]+~~",                // ~~strikethrough~~
        r"(?m)^#+\s",                // # heading
        r"(?m)^>\s",                 // > blockquote
        r"!\[[^\]]*\]\([^)]+\)",     // ![alt](url) image
        r"\[[^\]]+\]\([^)]+\)",      // [text](url) link
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid markdown pattern"))
    .collect()
});

static COMMA_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[^,]+(\s*,\s*[^,]+)*\s*$").expect("valid comma list pattern"));

/// Output must contain at most `limit` whitespace-separated words.
pub fn max_word_count(limit: usize) -> Requirement {
    Requirement::predicate(
        format!("max-words-{limit}"),
        format!("Use at most {limit} words."),
        move |output| Ok(output.split_whitespace().count() <= limit),
    )
}

/// Output must not use markdown or other plain-text markup.
pub fn plain_text() -> Requirement {
    Requirement::predicate(
        "plain-text",
        "Do not use markdown or any other plain-text markup format.",
        |output| Ok(!MARKDOWN_PATTERNS.iter().any(|p| p.is_match(output))),
    )
}

/// The last non-empty line must be a comma-separated list.
pub fn comma_separated_last_line() -> Requirement {
    Requirement::predicate(
        "comma-list-last-line",
        "Format the last line as a comma separated list.",
        |output| {
            let Some(last) = output.trim_end().lines().last() else {
                return Ok(false);
            };
            let last = last.trim();
            Ok(!last.is_empty() && COMMA_LIST_RE.is_match(last))
        },
    )
}
