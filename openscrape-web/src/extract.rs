//! Sanitization pipeline: turns a loaded page into compact, LLM-ready markup.
//!
//! [`extract_text`] runs four stages over a private deep copy of the
//! snapshot, so the caller's snapshot is never modified:
//!
//! 1. [`remove_noise`]: drop executable, presentational and embedded-media
//!    nodes and all comments; embedded video players become `[Video: …]` links.
//! 2. [`scrub_attributes`]: apply the class policy and drop every inline `style`.
//! 3. Serialize what is left ([`DocumentSnapshot::to_html`]).
//! 4. Compact whitespace ([`normalize`](crate::normalize::normalize)).

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::normalize::normalize;
use crate::snapshot::{DocumentSnapshot, Element, Node, SnapshotError};

/// Elements removed together with their whole subtree.
const NOISE_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "frame", "object", "embed", "applet", "svg", "canvas",
    "audio", "video", "noembed", "noframes",
];

/// `<link rel=…>` tokens that only matter to a renderer.
const NOISE_LINK_RELS: &[&str] = &["stylesheet", "icon", "preload"];

/// Substrings identifying embedded players of well-known video hosts.
///
/// Best effort: this decides whether a player survives as a `[Video: …]`
/// link, it is not a security boundary.
pub const VIDEO_HOST_MARKERS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "dai.ly",
    "twitch.tv",
    "wistia.com",
    "wistia.net",
    "loom.com",
];

/// Which `class` attributes survive sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RemoveClassNames {
    /// Strip the `class` attribute from every element.
    AllClasses,
    /// Leave classes untouched.
    #[default]
    NoClasses,
    /// Remove only these class names; other classes on the element stay.
    SpecificClasses(BTreeSet<String>),
}

impl RemoveClassNames {
    pub fn specific<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RemoveClassNames::SpecificClasses(names.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub remove_class_names: RemoveClassNames,
}

/// Output of the pipeline. An empty value means the page itself was empty;
/// failures are reported as [`ExtractError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedDocument(String);

impl CleanedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CleanedDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CleanedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document snapshot contains no nodes")]
    EmptySnapshot,

    #[error("malformed document snapshot: {0}")]
    MalformedSnapshot(#[from] SnapshotError),
}

/// Run the full pipeline on a private copy of `snapshot`.
///
/// ```
/// use openscrape_web::extract::{extract_text, ExtractionConfig};
/// use openscrape_web::snapshot::DocumentSnapshot;
///
/// let page = DocumentSnapshot::parse_html(
///     "<body><script>track()</script>\n\n  <p style='color:red'>Hello</p></body>",
/// )
/// .unwrap();
/// let cleaned = extract_text(&page, &ExtractionConfig::default()).unwrap();
/// assert_eq!(cleaned.as_str(), "<html><head></head><body><p>Hello</p></body></html>");
/// ```
pub fn extract_text(
    snapshot: &DocumentSnapshot,
    config: &ExtractionConfig,
) -> Result<CleanedDocument, ExtractError> {
    if snapshot.is_empty() {
        return Err(ExtractError::EmptySnapshot);
    }
    snapshot.validate()?;

    let mut working = snapshot.clone();
    remove_noise(&mut working);
    scrub_attributes(&mut working, &config.remove_class_names);

    let serialized = working.to_html();
    let cleaned = normalize(&serialized);
    debug!(
        target: "extract",
        serialized_len = serialized.len(),
        cleaned_len = cleaned.len(),
        "sanitized document"
    );
    Ok(CleanedDocument(cleaned))
}

/// Stage A: drop noise elements and comments, keep video players as links.
pub fn remove_noise(doc: &mut DocumentSnapshot) {
    strip_nodes(doc.nodes_mut());
}

fn strip_nodes(nodes: &mut Vec<Node>) {
    for node in std::mem::take(nodes) {
        match node {
            Node::Comment(_) => {}
            Node::Element(el) if el.name() == "iframe" => {
                if let Some(src) = video_source(&el) {
                    nodes.push(video_link(src));
                }
            }
            Node::Element(el) if is_noise(&el) => {}
            Node::Element(mut el) => {
                strip_nodes(el.children_mut());
                nodes.push(Node::Element(el));
            }
            other => nodes.push(other),
        }
    }
}

fn is_noise(el: &Element) -> bool {
    if NOISE_ELEMENTS.contains(&el.name()) {
        return true;
    }
    el.name() == "link"
        && el.attr("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| NOISE_LINK_RELS.iter().any(|r| token.eq_ignore_ascii_case(r)))
        })
}

fn video_source(el: &Element) -> Option<&str> {
    let src = el.attr("src")?.trim();
    let lower = src.to_ascii_lowercase();
    VIDEO_HOST_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        .then_some(src)
}

fn video_link(src: &str) -> Node {
    Element::new("a")
        .with_attr("href", src)
        .with_text(format!("[Video: {src}]"))
        .into()
}

/// Stage B: apply the class policy, then drop inline styles everywhere.
pub fn scrub_attributes(doc: &mut DocumentSnapshot, policy: &RemoveClassNames) {
    scrub_nodes(doc.nodes_mut(), policy);
}

fn scrub_nodes(nodes: &mut [Node], policy: &RemoveClassNames) {
    for node in nodes {
        if let Node::Element(el) = node {
            apply_class_policy(el, policy);
            el.remove_attr("style");
            scrub_nodes(el.children_mut(), policy);
        }
    }
}

fn apply_class_policy(el: &mut Element, policy: &RemoveClassNames) {
    match policy {
        RemoveClassNames::NoClasses => {}
        RemoveClassNames::AllClasses => {
            el.remove_attr("class");
        }
        RemoveClassNames::SpecificClasses(names) => {
            let Some(classes) = el.attr("class") else {
                return;
            };
            let kept: Vec<&str> = classes
                .split_ascii_whitespace()
                .filter(|c| !names.contains(*c))
                .collect();
            if kept.is_empty() {
                el.remove_attr("class");
            } else {
                let kept = kept.join(" ");
                el.set_attr("class", kept);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(html: &str) -> DocumentSnapshot {
        DocumentSnapshot::parse_html(html).expect("parse")
    }

    fn find_all<'a>(nodes: &'a [Node], name: &str, out: &mut Vec<&'a Element>) {
        for node in nodes {
            if let Node::Element(el) = node {
                if el.name() == name {
                    out.push(el);
                }
                find_all(el.children(), name, out);
            }
        }
    }

    fn elements<'a>(doc: &'a DocumentSnapshot, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        find_all(doc.nodes(), name, &mut out);
        out
    }

    #[test]
    fn removes_noise_elements_and_comments() {
        let mut doc = parse(
            r#"<html><head>
                <link rel="stylesheet" href="a.css"><link rel="Shortcut Icon" href="f.ico">
                <link rel="preload" href="x.js"><link rel="canonical" href="https://example.com/">
                <style>p{}</style></head>
            <body><!-- tracking --><script>evil()</script><noscript>enable js</noscript>
                <svg><circle/></svg><canvas></canvas><audio src="a.mp3"></audio>
                <video src="v.mp4"></video><object data="x.swf"></object><embed src="y.swf">
                <iframe src="https://ads.example.net/frame"></iframe><p>kept</p></body></html>"#,
        );
        remove_noise(&mut doc);
        let html = doc.to_html();

        for gone in [
            "stylesheet", "icon", "preload", "<style", "tracking", "<script", "noscript", "<svg",
            "<canvas", "<audio", "<video", "<object", "<embed", "<iframe",
        ] {
            assert!(!html.to_lowercase().contains(&gone.to_lowercase()), "{gone} survived: {html}");
        }
        assert!(html.contains(r#"rel="canonical""#));
        assert!(html.contains("<p>kept</p>"));
    }

    #[test]
    fn video_iframe_becomes_labelled_link() {
        let src = "https://www.youtube.com/embed/dQw4w9WgXcQ";
        let mut doc = parse(&format!(r#"<body><iframe src="{src}" width="560"></iframe></body>"#));
        remove_noise(&mut doc);

        assert!(elements(&doc, "iframe").is_empty());
        let anchors = elements(&doc, "a");
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].attr("href"), Some(src));
        assert_eq!(anchors[0].inner_text(), format!("[Video: {src}]"));
    }

    #[test]
    fn video_marker_match_is_case_insensitive() {
        let mut doc = parse(r#"<body><iframe src="https://PLAYER.VIMEO.COM/video/1"></iframe></body>"#);
        remove_noise(&mut doc);
        assert_eq!(elements(&doc, "a").len(), 1);
    }

    #[test]
    fn iframe_without_src_is_dropped() {
        let mut doc = parse("<body><iframe></iframe><p>x</p></body>");
        remove_noise(&mut doc);
        assert!(elements(&doc, "iframe").is_empty());
        assert!(elements(&doc, "a").is_empty());
    }

    #[test]
    fn all_classes_strips_every_class_attribute() {
        let mut doc = parse(r#"<body class="page"><div class="a b"><p class="c">x</p></div></body>"#);
        scrub_attributes(&mut doc, &RemoveClassNames::AllClasses);
        assert!(!doc.to_html().contains("class="));
    }

    #[test]
    fn no_classes_keeps_classes_but_still_drops_styles() {
        let mut doc = parse(r#"<body><p class="lead" style="color:red">x</p></body>"#);
        scrub_attributes(&mut doc, &RemoveClassNames::NoClasses);
        let p = elements(&doc, "p")[0];
        assert_eq!(p.attr("class"), Some("lead"));
        assert_eq!(p.attr("style"), None);
    }

    #[test]
    fn specific_classes_remove_only_named_entries() {
        let mut doc = parse(r#"<body><div class="ad promo">x</div><span class="ad">y</span></body>"#);
        scrub_attributes(&mut doc, &RemoveClassNames::specific(["ad"]));

        assert_eq!(elements(&doc, "div")[0].attr("class"), Some("promo"));
        assert_eq!(elements(&doc, "span")[0].attr("class"), None);
    }

    #[test]
    fn original_snapshot_is_left_untouched() {
        let original = parse(r#"<body><script>x()</script><p class="ad" style="a:b">Hi</p></body>"#);
        let before = original.clone();
        let config = ExtractionConfig {
            remove_class_names: RemoveClassNames::AllClasses,
        };
        extract_text(&original, &config).unwrap();
        assert_eq!(original, before);
    }

    #[test]
    fn end_to_end_keeps_paragraph_drops_script_and_comment() {
        let doc = DocumentSnapshot::new(vec![Element::new("body")
            .with_child(Element::new("script").with_text("alert('x')"))
            .with_child(Node::comment(" author: jane "))
            .with_child(Element::new("p").with_text("Hello"))
            .into()]);
        let cleaned = extract_text(&doc, &ExtractionConfig::default()).unwrap();

        assert_eq!(cleaned.as_str(), "<body><p>Hello</p></body>");
        assert!(!cleaned.as_str().contains("script"));
        assert!(!cleaned.as_str().contains("author"));
    }

    #[test]
    fn empty_snapshot_is_an_error_not_an_empty_string() {
        assert_eq!(
            extract_text(&DocumentSnapshot::default(), &ExtractionConfig::default()),
            Err(ExtractError::EmptySnapshot)
        );
    }

    #[test]
    fn page_without_content_yields_empty_output() {
        let doc = DocumentSnapshot::new(vec![Node::comment("nothing"), Node::text("  \n ")]);
        let cleaned = extract_text(&doc, &ExtractionConfig::default()).unwrap();
        assert!(cleaned.is_empty());
    }

    #[test]
    fn malformed_snapshot_fails_loudly() {
        let doc = DocumentSnapshot::new(vec![Element::new("").into()]);
        assert!(matches!(
            extract_text(&doc, &ExtractionConfig::default()),
            Err(ExtractError::MalformedSnapshot(SnapshotError::InvalidElementName(_)))
        ));
    }

    const FRAGMENTS: &[&str] = &[
        "<div class=\"ad promo\">",
        "</div>",
        "<p style=\"color: red\" class='lead'>",
        "</p>",
        "<span class=\"\" style=''>",
        "</span>",
        "<script>track('class=x style=y')</script>",
        "<style>p { color: red }</style>",
        "<!-- class=\"c\" -->",
        "<iframe src=\"https://player.vimeo.com/video/1\" class=\"v\"></iframe>",
        "<iframe src=\"https://ads.example.com/\"></iframe>",
        "<link rel=\"stylesheet\" href=\"/a.css\">",
        "<img src=\"/a.png\" class=\"hero\" style=\"width:1px\">",
        "<a href=\"/x\" class=\"nav\">",
        "</a>",
        "<svg><style>.a{}</style></svg>",
        "<noscript><p class=\"n\">js</p></noscript>",
        "\n\n   ",
    ];

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(FRAGMENTS).prop_map(String::from),
            "[a-z ]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn sanitized_pages_carry_no_classes_styles_or_scripts(
            pieces in prop::collection::vec(fragment(), 0..40)
        ) {
            let html = pieces.concat();
            let snapshot = DocumentSnapshot::parse_html(&html).expect("parse");
            let config = ExtractionConfig {
                remove_class_names: RemoveClassNames::AllClasses,
            };

            let cleaned = extract_text(&snapshot, &config).expect("extract");
            let out = cleaned.as_str();
            prop_assert!(!out.contains("class="), "{}", out);
            prop_assert!(!out.contains("style="), "{}", out);
            prop_assert!(!out.contains("<script"), "{}", out);
            prop_assert!(!out.contains("<!--"), "{}", out);
            prop_assert_eq!(normalize(out), out);
        }
    }
}
