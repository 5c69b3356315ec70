// src/sources/html.rs
//! Minimal tag scanning for the two HTML sources. Only what the HIP and NSSD
//! pages need: attribute lookup, tag stripping and entity decoding.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());
static ID_ATTR_RE: Lazy<Regex> = Lazy::new(|| attribute_regex("id"));
static HREF_ATTR_RE: Lazy<Regex> = Lazy::new(|| attribute_regex("href"));
static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| attribute_regex("src"));

fn attribute_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)(?:^|\s){}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#,
        name
    ))
    .unwrap()
}

/// Drops comments, scripts and styles so they never leak into text.
pub fn strip_non_content(html: &str) -> String {
    let without_comments = COMMENT_RE.replace_all(html, "");
    SCRIPT_RE.replace_all(&without_comments, "").into_owned()
}

/// Value of attribute `name` inside the raw attribute text of a tag. Only
/// `id`, `href` and `src` are looked up; any other name yields `None`.
pub fn attribute(attrs: &str, name: &str) -> Option<String> {
    let re: &Regex = match name {
        "id" => &ID_ATTR_RE,
        "href" => &HREF_ATTR_RE,
        "src" => &SRC_ATTR_RE,
        _ => return None,
    };
    let caps = re.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| decode_entities(m.as_str()))
}

/// Text nodes of a fragment, decoded and trimmed, empty ones dropped.
pub fn text_fragments(fragment: &str) -> Vec<String> {
    TAG_RE
        .split(fragment)
        .map(|t| decode_entities(t).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// All text of a fragment joined without separators, like a DOM `textContent`
/// with surrounding whitespace trimmed.
pub fn inner_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    decode_entities(&text).trim().to_string()
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let numeric = NUMERIC_ENTITY_RE.replace_all(s, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x').or_else(|| raw.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&nbsp;", "\u{a0}")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&ndash;", "–")
        .replace("&amp;", "&")
}
