//! Cell text sanitization
//!
//! Values rendered for the grid may carry markup, inline scripts, and HTML
//! entities. Before a value lands in a spreadsheet cell it goes through a
//! fixed pipeline:
//!
//! 1. empty input short-circuits to an empty string
//! 2. `<script>` and `<template>` blocks are removed with their content
//! 3. all other tags are stripped, keeping their text
//! 4. a denylist of entity-like tokens is removed literally
//! 5. surrounding whitespace is trimmed
//! 6. remaining character references are decoded
//!
//! Step 4 runs before step 6, so `&amp;` written verbatim disappears while
//! `&#38;` decodes to `&`.

mod entities;

pub use entities::decode_html_entities;

use regex::Regex;
use std::sync::LazyLock;

/// Script and template blocks, matched lazily across lines
static EXECUTABLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script.*?>.*?</script>|<template.*?>.*?</template>")
        .expect("Invalid script block regex")
});

/// Tokens removed verbatim before entity decoding.
///
/// `&lt` has no trailing semicolon, so it also eats the prefix of `&lt;`.
pub const ENTITY_DENYLIST: &[&str] = &[
    "&nbsp;", "&lt", "&gt;", "&amp;", "&quot;", "&cent;", "&pound;", "&yen;", "&euro;",
    "&sect;", "&copy;", "&reg;", "&trade;", "&times;", "&divide;",
];

const TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Sanitize a raw cell value. Total: every input maps to a string.
///
/// # Examples
///
/// ```
/// use gridexport::sanitize::sanitize;
///
/// assert_eq!(sanitize(None), "");
/// assert_eq!(sanitize(Some("<p>caf&eacute;</p><script>x()</script>")), "café");
/// ```
pub fn sanitize(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return String::new(),
    };

    let without_blocks = EXECUTABLE_BLOCK.replace_all(raw, "");
    let text = strip_tags(&without_blocks);
    let text = ENTITY_DENYLIST
        .iter()
        .fold(text, |acc, token| acc.replace(token, ""));

    decode_html_entities(text.trim_matches(TRIM_CHARS))
}

/// Strip markup tags and HTML comments, keeping text content.
///
/// A `<` followed by whitespace is literal text. Quoted attribute values may
/// contain `>`. An unterminated tag swallows the rest of the input.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];

        match after.chars().next() {
            Some(c) if c.is_whitespace() => {
                out.push('<');
                rest = after;
            }
            _ if after.starts_with("!--") => {
                rest = match after[3..].find("-->") {
                    Some(end) => &after[3 + end + 3..],
                    None => "",
                };
            }
            _ => rest = skip_tag(after),
        }
    }

    out.push_str(rest);
    out
}

fn skip_tag(s: &str) -> &str {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return &s[i + 1..],
            None => {}
        }
    }
    ""
}
