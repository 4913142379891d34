//! Bionic annotation and its inverse
//!
//! `annotate` rebuilds a markup tree with the leading letters of every word
//! wrapped in an emphasis element; `strip` unwraps those elements again.
//! Both are pure tree-to-tree transforms over borrowed input.
//!
//! Annotation is not idempotent: feeding annotated output back into
//! `annotate` emphasizes the unbolded remainders a second time. Callers keep
//! the pristine document and re-annotate from it whenever the percentage or
//! the enabled flag changes.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::markup::{text_content, Element, MarkupNode};
use crate::word::split_token;

/// Tag of the emphasis wrapper inserted by `annotate`.
pub const EMPHASIS_TAG: &str = "b";

/// Class marking an emphasis wrapper as produced by this crate.
///
/// `strip` only unwraps elements carrying it, so bold text authored in the
/// source document survives a strip.
pub const EMPHASIS_CLASS: &str = "bionic";

/// Elements whose content is never annotated.
const SKIP_TAGS: &[&str] = &["script", "style"];

/// Number of leading core characters to emphasize.
///
/// Cores of up to two characters get one, three to five get two, longer
/// cores get `floor(len * percentage)` with a floor of one. The result
/// never exceeds `core_len` for a non-empty core.
///
/// `percentage` is expected in `(0, 1)`; range clamping is the caller's job
/// (see [`crate::preferences::ReadingPreferences::effective_percentage`]).
pub fn emphasis_boundary(core_len: usize, percentage: f64) -> usize {
    let count = match core_len {
        0..=2 => 1,
        3..=5 => 2,
        // Truncation is floor for the non-negative product
        _ => (core_len as f64 * percentage) as usize,
    };
    count.max(1).min(core_len.max(1))
}

/// Build a fresh emphasis wrapper around `text`.
pub fn emphasis_element(text: impl Into<String>) -> MarkupNode {
    MarkupNode::Element(
        Element::new(EMPHASIS_TAG)
            .with_attribute("class", EMPHASIS_CLASS)
            .with_children(alloc::vec![MarkupNode::Text(text.into())]),
    )
}

/// True for emphasis wrappers produced by `annotate`.
pub fn is_emphasis(element: &Element) -> bool {
    element.has_tag(EMPHASIS_TAG)
        && element
            .attribute("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c == EMPHASIS_CLASS))
}

fn is_skipped(element: &Element) -> bool {
    SKIP_TAGS.iter().any(|tag| element.has_tag(tag)) || is_emphasis(element)
}

/// Annotate a tree rooted at `root`.
pub fn annotate(root: &Element, percentage: f64) -> Element {
    if is_skipped(root) {
        return root.clone();
    }
    Element {
        tag: root.tag.clone(),
        attributes: root.attributes.clone(),
        children: annotate_document(&root.children, percentage),
    }
}

/// Annotate a document given as its top-level nodes.
///
/// # Example
/// ```
/// use bionic_reader::{annotate_document, to_markup, MarkupNode};
///
/// let doc = vec![MarkupNode::text("I am reading")];
/// assert_eq!(
///     to_markup(&annotate_document(&doc, 0.5)),
///     r#"<b class="bionic">I</b> <b class="bionic">a</b>m <b class="bionic">rea</b>ding"#
/// );
/// ```
pub fn annotate_document(nodes: &[MarkupNode], percentage: f64) -> Vec<MarkupNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MarkupNode::Text(text) => annotate_text(text, percentage, &mut out),
            MarkupNode::Element(element) => {
                out.push(MarkupNode::Element(annotate(element, percentage)));
            }
        }
    }
    out
}

/// Expand one text node into text and emphasis nodes.
fn annotate_text(text: &str, percentage: f64, out: &mut Vec<MarkupNode>) {
    let mut pending = String::new();
    let mut emphasized = false;
    let start = out.len();

    for (is_space, segment) in Segments::new(text) {
        if is_space {
            pending.push_str(segment);
            continue;
        }
        let Some(word) = split_token(segment) else {
            pending.push_str(segment);
            continue;
        };
        let split_at = char_offset(word.core, emphasis_boundary(word.core_len(), percentage));
        pending.push_str(word.prefix);
        if !pending.is_empty() {
            out.push(MarkupNode::Text(core::mem::take(&mut pending)));
        }
        out.push(emphasis_element(&word.core[..split_at]));
        pending.push_str(&word.core[split_at..]);
        pending.push_str(word.suffix);
        emphasized = true;
    }

    if !emphasized {
        out.truncate(start);
        out.push(MarkupNode::Text(text.to_string()));
        return;
    }
    if !pending.is_empty() {
        out.push(MarkupNode::Text(pending));
    }
}

/// Byte offset of the `count`-th character (or the end of `s`).
fn char_offset(s: &str, count: usize) -> usize {
    s.char_indices().nth(count).map_or(s.len(), |(idx, _)| idx)
}

/// Remove emphasis wrappers from a tree rooted at `root`.
///
/// Each wrapper is replaced by its text content and merged with adjacent
/// text, so `strip(annotate(t))` has the same text as `t`.
pub fn strip(root: &Element) -> Element {
    if SKIP_TAGS.iter().any(|tag| root.has_tag(tag)) {
        return root.clone();
    }
    Element {
        tag: root.tag.clone(),
        attributes: root.attributes.clone(),
        children: strip_document(&root.children),
    }
}

/// Remove emphasis wrappers from a document given as its top-level nodes.
pub fn strip_document(nodes: &[MarkupNode]) -> Vec<MarkupNode> {
    let mut out: Vec<MarkupNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MarkupNode::Text(text) => push_text_merged(&mut out, text),
            MarkupNode::Element(element) if is_emphasis(element) => {
                push_text_merged(&mut out, &text_content(node));
            }
            MarkupNode::Element(element) => out.push(MarkupNode::Element(strip(element))),
        }
    }
    out
}

fn push_text_merged(out: &mut Vec<MarkupNode>, text: &str) {
    if let Some(MarkupNode::Text(last)) = out.last_mut() {
        last.push_str(text);
        return;
    }
    out.push(MarkupNode::Text(text.to_string()));
}

/// One word of plain text split at its emphasis boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct BionicSpan {
    /// Leading punctuation plus the emphasized letters.
    pub bold: String,
    /// Remaining letters, trailing punctuation and following whitespace.
    pub regular: String,
}

/// Split plain text into bold/regular span pairs.
///
/// Concatenating `bold + regular` over all spans reproduces `text` exactly.
/// Tokens without a word core become a span with an empty `regular` part.
///
/// # Example
/// ```
/// use bionic_reader::format_text;
///
/// let spans = format_text("The quick fox", 0.5);
/// assert_eq!(spans[1].bold, "qu");
/// assert_eq!(spans[1].regular, "ick ");
/// ```
pub fn format_text(text: &str, percentage: f64) -> Vec<BionicSpan> {
    let mut spans: Vec<BionicSpan> = Vec::new();
    for (is_space, segment) in Segments::new(text) {
        if is_space {
            match spans.last_mut() {
                Some(last) => last.regular.push_str(segment),
                None => spans.push(BionicSpan {
                    bold: String::new(),
                    regular: segment.to_string(),
                }),
            }
            continue;
        }
        let span = match split_token(segment) {
            Some(word) => {
                let split_at =
                    char_offset(word.core, emphasis_boundary(word.core_len(), percentage));
                let mut bold = String::from(word.prefix);
                bold.push_str(&word.core[..split_at]);
                let mut regular = String::from(&word.core[split_at..]);
                regular.push_str(word.suffix);
                BionicSpan { bold, regular }
            }
            None => BionicSpan {
                bold: segment.to_string(),
                regular: String::new(),
            },
        };
        spans.push(span);
    }
    spans
}

/// Alternating whitespace / non-whitespace runs of a string.
struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = (bool, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let is_space = first.is_whitespace();
        let end = self
            .rest
            .find(|ch: char| ch.is_whitespace() != is_space)
            .unwrap_or(self.rest.len());
        let (segment, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some((is_space, segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{document_text, parse_markup, to_markup};
    use alloc::vec;
    use proptest::prelude::*;

    fn b(text: &str) -> MarkupNode {
        emphasis_element(text)
    }

    #[test]
    fn test_emphasis_boundary_short_cores() {
        assert_eq!(emphasis_boundary(1, 0.5), 1);
        assert_eq!(emphasis_boundary(2, 0.5), 1);
        for len in 3..=5 {
            assert_eq!(emphasis_boundary(len, 0.5), 2);
            assert_eq!(emphasis_boundary(len, 0.3), 2);
        }
    }

    #[test]
    fn test_emphasis_boundary_long_cores() {
        for len in 6..40 {
            assert_eq!(emphasis_boundary(len, 0.5), (len / 2).max(1));
        }
        assert_eq!(emphasis_boundary(10, 0.7), 7);
        assert_eq!(emphasis_boundary(10, 0.3), 3);
        assert_eq!(emphasis_boundary(6, 0.01), 1);
    }

    #[test]
    fn test_annotate_sentence() {
        let doc = parse_markup("<p>The quick brown fox</p>").unwrap();
        let out = annotate_document(&doc, 0.5);
        assert_eq!(
            out,
            vec![MarkupNode::element(
                "p",
                vec![
                    b("Th"),
                    MarkupNode::text("e "),
                    b("qu"),
                    MarkupNode::text("ick "),
                    b("br"),
                    MarkupNode::text("own "),
                    b("fo"),
                    MarkupNode::text("x"),
                ]
            )]
        );
    }

    #[test]
    fn test_annotate_keeps_punctuation_outside_emphasis() {
        let doc = vec![MarkupNode::text("\u{201c}Hello,\u{201d} (test)")];
        let out = annotate_document(&doc, 0.5);
        assert_eq!(
            to_markup(&out),
            "\u{201c}<b class=\"bionic\">He</b>llo,\u{201d} (<b class=\"bionic\">te</b>st)"
        );
    }

    #[test]
    fn test_annotate_preserves_whitespace_runs() {
        let doc = vec![MarkupNode::text("  a\n\tbc  ")];
        let out = annotate_document(&doc, 0.5);
        assert_eq!(
            out,
            vec![
                MarkupNode::text("  "),
                b("a"),
                MarkupNode::text("\n\t"),
                b("b"),
                MarkupNode::text("c  "),
            ]
        );
    }

    #[test]
    fn test_annotate_passes_through_punctuation_only_text() {
        let doc = vec![MarkupNode::text(" -- ... ")];
        assert_eq!(annotate_document(&doc, 0.5), doc);
        assert!(annotate_document(&[], 0.5).is_empty());
    }

    #[test]
    fn test_annotate_skips_script_style_and_emphasis() {
        let html = "<div><script>var longname = 1;</script><style>p { color: red }</style>\
                    <b class=\"bionic\">already</b></div>";
        let doc = parse_markup(html).unwrap();
        assert_eq!(annotate_document(&doc, 0.5), doc);
    }

    #[test]
    fn test_annotate_descends_into_authored_bold() {
        let doc = parse_markup("<b>Bold</b>").unwrap();
        let out = annotate_document(&doc, 0.5);
        assert_eq!(to_markup(&out), "<b><b class=\"bionic\">Bo</b>ld</b>");
    }

    #[test]
    fn test_annotate_keeps_attributes_and_nesting() {
        let html = r#"<p class="x">See <a href="n.xhtml#c2">chapter two</a>.</p>"#;
        let out = annotate_document(&parse_markup(html).unwrap(), 0.5);
        assert_eq!(
            to_markup(&out),
            "<p class=\"x\"><b class=\"bionic\">Se</b>e <a href=\"n.xhtml#c2\">\
             <b class=\"bionic\">cha</b>pter <b class=\"bionic\">tw</b>o</a>.</p>"
        );
    }

    #[test]
    fn test_annotate_multibyte_core() {
        let doc = vec![MarkupNode::text("\u{00e9}l\u{00e8}ve")];
        let out = annotate_document(&doc, 0.5);
        assert_eq!(out, vec![b("\u{00e9}l"), MarkupNode::text("\u{00e8}ve")]);
    }

    #[test]
    fn test_annotate_root_element() {
        let root = Element::new("body").with_children(vec![MarkupNode::text("word")]);
        let out = annotate(&root, 0.5);
        assert_eq!(out.tag, "body");
        assert_eq!(out.children, vec![b("wo"), MarkupNode::text("rd")]);

        let style = Element::new("style").with_children(vec![MarkupNode::text("word")]);
        assert_eq!(annotate(&style, 0.5), style);
    }

    #[test]
    fn test_strip_restores_parsed_document() {
        let html = "<body><h1>Title</h1><p>It was a <em>dark</em> night, said \u{201c}he\u{201d}.</p></body>";
        let doc = parse_markup(html).unwrap();
        let annotated = annotate_document(&doc, 0.6);
        assert_ne!(annotated, doc);
        assert_eq!(strip_document(&annotated), doc);
    }

    #[test]
    fn test_strip_leaves_authored_bold() {
        let doc = parse_markup("<p><b>keep</b> me</p>").unwrap();
        let stripped = strip_document(&annotate_document(&doc, 0.5));
        assert_eq!(to_markup(&stripped), "<p><b>keep</b> me</p>");
    }

    #[test]
    fn test_strip_root_element() {
        let root = Element::new("p").with_children(vec![b("Re"), MarkupNode::text("ad")]);
        assert_eq!(strip(&root).children, vec![MarkupNode::text("Read")]);
    }

    #[test]
    fn test_format_text_pairs() {
        let spans = format_text("I am reading this document", 0.5);
        let pairs: Vec<(&str, &str)> = spans
            .iter()
            .map(|s| (s.bold.as_str(), s.regular.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("I", " "),
                ("a", "m "),
                ("rea", "ding "),
                ("th", "is "),
                ("docu", "ment"),
            ]
        );
    }

    #[test]
    fn test_format_text_punctuation_and_leading_space() {
        let spans = format_text(" hello! ...", 0.5);
        assert_eq!(spans[0], BionicSpan { bold: String::new(), regular: " ".into() });
        assert_eq!(spans[1], BionicSpan { bold: "he".into(), regular: "llo! ".into() });
        assert_eq!(spans[2], BionicSpan { bold: "...".into(), regular: String::new() });
    }

    proptest! {
        #[test]
        fn prop_strip_annotate_preserves_text(text in "\\PC{0,64}", p in 0.01f64..0.99) {
            let doc = vec![MarkupNode::element("p", vec![MarkupNode::text(text.clone())])];
            let round = strip_document(&annotate_document(&doc, p));
            prop_assert_eq!(document_text(&round), text);
        }

        #[test]
        fn prop_format_text_concatenates_to_input(text in "\\PC{0,64}", p in 0.01f64..0.99) {
            let joined: String = format_text(&text, p)
                .iter()
                .flat_map(|s| [s.bold.as_str(), s.regular.as_str()])
                .collect();
            prop_assert_eq!(joined, text);
        }

        #[test]
        fn prop_boundary_within_core(len in 1usize..200, p in 0.01f64..0.99) {
            let n = emphasis_boundary(len, p);
            prop_assert!(n >= 1 && n <= len);
        }
    }
}
