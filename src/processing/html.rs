//! HTML to plain text helpers for web archives.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

lazy_static! {
    static ref SCRIPT_STYLE: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TITLE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref BLOCKS: Selector =
        Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td, th, dt, dd, figcaption").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Layout elements that end the current run of loose text.
const CONTAINERS: [&str; 22] = [
    "div", "section", "article", "header", "footer", "main", "nav", "aside", "form", "fieldset",
    "table", "thead", "tbody", "tfoot", "tr", "ul", "ol", "dl", "figure", "details", "address", "hr",
];

/// Visible text of a document, whitespace collapsed to single spaces.
///
/// Falls back to [`strip_tags`] when the parsed tree yields nothing.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = visible_text(document.root_element());
    if text.is_empty() {
        strip_tags(html)
    } else {
        text
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut pieces: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        }) {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Regex tag stripper: drop scripts, styles and tags, unescape entities.
pub fn strip_tags(html: &str) -> String {
    let without_code = SCRIPT_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_code, "");
    collapse_whitespace(&unescape_entities(&without_tags))
}

/// The document `<title>`, unescaped, if present and non-blank.
pub fn extract_title(html: &str) -> Option<String> {
    let captures = TITLE.captures(html)?;
    let title = collapse_whitespace(&unescape_entities(captures.get(1)?.as_str()));
    (!title.is_empty()).then_some(title)
}

/// Text of each top-level block element (headings, paragraphs, list items,
/// table cells...) in document order.
///
/// Blocks nested in another block are folded into their outer block. Loose
/// text outside any block (inside `div`, `section` or the body itself) becomes
/// its own element, split wherever a layout container starts or ends.
pub fn extract_elements(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut elements = Vec::new();
    let mut run = Vec::new();
    collect_elements(root, &mut run, &mut elements);
    flush_run(&mut run, &mut elements);

    if elements.is_empty() {
        let text = html_to_text(html);
        if text.is_empty() {
            return Vec::new();
        }
        return vec![text];
    }
    elements
}

fn collect_elements(element: ElementRef<'_>, run: &mut Vec<String>, elements: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                run.push(trimmed.to_string());
            }
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();

        if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        }
        if BLOCKS.matches(&child) {
            flush_run(run, elements);
            let text = visible_text(child);
            if !text.is_empty() {
                elements.push(text);
            }
        } else if CONTAINERS.contains(&name) {
            flush_run(run, elements);
            collect_elements(child, run, elements);
            flush_run(run, elements);
        } else {
            collect_elements(child, run, elements);
        }
    }
}

fn flush_run(run: &mut Vec<String>, elements: &mut Vec<String>) {
    let text = collapse_whitespace(&run.join(" "));
    run.clear();
    if !text.is_empty() {
        elements.push(text);
    }
}

/// Replace character references with the characters they name.
///
/// Decoding goes through the HTML parser, so every named reference is known.
/// Unknown references are kept as written.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(&text.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}
