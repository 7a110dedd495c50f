//! Whitespace and markup compaction for serialized documents.
//!
//! The output is denser markup, not canonical HTML: rules run in a fixed
//! order because later rules assume earlier collapses already happened.

use regex::{Captures, Regex};
use std::sync::LazyLock;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalization pattern is valid")
}

static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| re(r"\n{2,}"));
static EMPTY_COMMENT: LazyLock<Regex> = LazyLock::new(|| re(r"<!--\s*-->"));
static EMPTY_CLASS: LazyLock<Regex> = LazyLock::new(|| re(r#"\s+class\s*=\s*(?:""|'')"#));
static STYLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| re(r#"\s+style\s*=\s*(?:"[^"]*"|'[^']*')"#));
static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| re(r">\s+<"));
static LINE_EDGES: LazyLock<Regex> = LazyLock::new(|| re(r"(?m)^[^\S\n]+|[^\S\n]+$"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| re(r"\s+"));
static SPACE_BEFORE_CLOSE: LazyLock<Regex> = LazyLock::new(|| re(r"\s+>"));
static SPACE_AFTER_OPEN: LazyLock<Regex> = LazyLock::new(|| re(r"<\s+"));
/// `name = "value"` with the value matched whole, or a bare quoted run; quoted
/// text is never rewritten.
static ATTR_EQUALS: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"([^\s="'<>/]+)\s*=\s*("[^"]*"|'[^']*')|"[^"]*"|'[^']*'"#)
});
static AFTER_QUOTED_VALUE: LazyLock<Regex> = LazyLock::new(|| re(r#"("[^"]*"|'[^']*')\s+"#));
static SELF_CLOSING: LazyLock<Regex> = LazyLock::new(|| re(r"\s*/>\s*"));
static TAG: LazyLock<Regex> = LazyLock::new(|| re(r"<[^<>]*>"));

/// Compact a serialized document.
///
/// The ordered rule set is repeated until the text stops changing, so the
/// result is a fixed point: `normalize(&normalize(x)) == normalize(x)`.
/// Every rule only deletes characters or replaces whitespace with a single
/// space, which bounds the number of rounds.
///
/// ```
/// use openscrape_web::normalize::normalize;
///
/// let raw = "<div  class=\"\" >\n\n   <p style=\"color:red\" >Hi   there</p>\n</div>";
/// assert_eq!(normalize(raw), "<div><p>Hi there</p></div>");
/// ```
pub fn normalize(input: &str) -> String {
    let mut current = normalize_once(input);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(input: &str) -> String {
    let s = NEWLINE_RUNS.replace_all(input, "\n");
    let s = EMPTY_COMMENT.replace_all(&s, "");
    let s = within_tags(&s, |tag| EMPTY_CLASS.replace_all(tag, "").into_owned());
    let s = within_tags(&s, |tag| STYLE_ATTR.replace_all(tag, "").into_owned());
    let s = BETWEEN_TAGS.replace_all(&s, "><");
    let s = LINE_EDGES.replace_all(&s, "");
    let s = WHITESPACE_RUN.replace_all(&s, " ");
    let s = SPACE_BEFORE_CLOSE.replace_all(&s, ">");
    let s = SPACE_AFTER_OPEN.replace_all(&s, "<");
    let s = within_tags(&s, tighten_assignments);
    let s = within_tags(&s, |tag| AFTER_QUOTED_VALUE.replace_all(tag, "$1 ").into_owned());
    let s = SELF_CLOSING.replace_all(&s, "/>");
    s.trim().to_string()
}

fn tighten_assignments(tag: &str) -> String {
    ATTR_EQUALS
        .replace_all(tag, |caps: &Captures| match (caps.get(1), caps.get(2)) {
            (Some(name), Some(value)) => format!("{}={}", name.as_str(), value.as_str()),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Rewrite only the `<…>` spans, leaving text content alone.
fn within_tags(input: &str, rewrite: impl Fn(&str) -> String) -> String {
    TAG.replace_all(input, |caps: &Captures| rewrite(&caps[0]))
        .into_owned()
}
