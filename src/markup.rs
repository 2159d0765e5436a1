//! Small tag scanner for the handful of server-rendered pages we read.
//!
//! This is not an HTML parser. It understands opening/closing tags, quoted
//! attribute values, void elements and nesting of same-named elements, which
//! is all the extraction code needs. Comments and `<script>`/`<style>` blocks
//! are matched as opaque tokens so markup inside them never counts as tags.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Tags capture (1) the closing slash, (2) the name and (3) raw attributes.
/// The opaque alternatives capture nothing; see [`is_tag`].
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<!--(?s:.*?)-->",
        r"|(?is:<script\b[^>]*>.*?</script\s*>)",
        r"|(?is:<style\b[^>]*>.*?</style\s*>)",
        r#"|<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    ))
    .expect("tag pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").expect("entity pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// An element together with its raw inner markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    pub name: String,
    attrs: Vec<(String, String)>,
    pub inner: &'a str,
}

impl Element<'_> {
    /// Attribute value by (case-insensitive) name. Valueless attributes are `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Visible text with every text run trimmed and concatenated.
    pub fn stripped_text(&self) -> String {
        stripped_text(self.inner)
    }
}

/// A top-level piece of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<'a> {
    /// Entity-decoded text, untrimmed.
    Text(String),
    Element(Element<'a>),
}

/// Every element named `name` in document order, including nested ones.
pub fn elements<'a>(html: &'a str, name: &str) -> Vec<Element<'a>> {
    TAG_RE
        .captures_iter(html)
        .filter(is_tag)
        .filter(|caps| caps[1].is_empty() && caps[2].eq_ignore_ascii_case(name))
        .filter_map(|caps| element_at(html, &caps))
        .collect()
}

/// The first element whose `id` attribute equals `id`.
pub fn find_by_id<'a>(html: &'a str, id: &str) -> Option<Element<'a>> {
    TAG_RE
        .captures_iter(html)
        .filter(|caps| is_tag(caps) && caps[1].is_empty())
        .filter(|caps| parse_attrs(&caps[3]).iter().any(|(k, v)| k == "id" && v == id))
        .find_map(|caps| element_at(html, &caps))
}

/// Splits a fragment into its direct children.
pub fn children(fragment: &str) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut pos = 0;

    while pos < fragment.len() {
        let Some(caps) = TAG_RE.captures_at(fragment, pos) else {
            nodes.push(Node::Text(decode_entities(&fragment[pos..])));
            break;
        };
        let Some(tag) = caps.get(0) else { break };

        if tag.start() > pos {
            nodes.push(Node::Text(decode_entities(&fragment[pos..tag.start()])));
        }
        pos = tag.end();

        // Comment, script or style, or a stray closing tag at this level.
        if !is_tag(&caps) || !caps[1].is_empty() {
            continue;
        }

        let name = caps[2].to_ascii_lowercase();
        let attrs = parse_attrs(&caps[3]);
        if is_void(&name, &caps[3]) {
            nodes.push(Node::Element(Element {
                name,
                attrs,
                inner: "",
            }));
            continue;
        }

        let (end, after) = closing_tag(fragment, &name, tag.end());
        nodes.push(Node::Element(Element {
            name,
            attrs,
            inner: &fragment[tag.end()..end],
        }));
        pos = after;
    }

    nodes
}

/// Text runs trimmed and joined without separators.
pub fn stripped_text(fragment: &str) -> String {
    TAG_RE
        .split(fragment)
        .map(decode_entities)
        .map(|text| text.trim().to_string())
        .collect()
}

/// Text with each tag replaced by a single space, so adjacent runs stay apart.
pub fn spaced_text(fragment: &str) -> String {
    decode_entities(&TAG_RE.replace_all(fragment, " "))
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn element_at<'a>(html: &'a str, caps: &Captures<'_>) -> Option<Element<'a>> {
    let tag = caps.get(0)?;
    let name = caps[2].to_ascii_lowercase();
    let inner = if is_void(&name, &caps[3]) {
        ""
    } else {
        let (end, _) = closing_tag(html, &name, tag.end());
        &html[tag.end()..end]
    };

    Some(Element {
        attrs: parse_attrs(&caps[3]),
        name,
        inner,
    })
}

/// Finds the tag closing an element opened just before `from`.
///
/// Returns the offset where the closing tag starts and the offset right after
/// it. An unclosed element runs to the end of the input.
fn closing_tag(html: &str, name: &str, from: usize) -> (usize, usize) {
    let mut depth = 0usize;
    for caps in TAG_RE.captures_iter(&html[from..]) {
        let Some(tag) = caps.get(0) else { continue };
        if !is_tag(&caps) || !caps[2].eq_ignore_ascii_case(name) {
            continue;
        }
        if caps[1].is_empty() {
            if !is_void(name, &caps[3]) {
                depth += 1;
            }
        } else if depth == 0 {
            return (from + tag.start(), from + tag.end());
        } else {
            depth -= 1;
        }
    }
    (html.len(), html.len())
}

fn is_tag(caps: &Captures<'_>) -> bool {
    caps.get(2).is_some()
}

fn is_void(name: &str, raw_attrs: &str) -> bool {
    VOID_ELEMENTS.contains(&name) || raw_attrs.trim_end().ends_with('/')
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (caps[1].to_ascii_lowercase(), value)
        })
        .collect()
}
