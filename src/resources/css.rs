//! `url(...)` handling inside stylesheet text.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::{append_fragment, normalize_reference};

/// File extensions treated as font files.
pub const FONT_EXTENSIONS: &[&str] = &["woff2", "woff", "ttf", "eot", "otf"];

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).unwrap()
});

static FONT_FACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)@font-face\s*\{[^}]*\}").unwrap());

fn captured_reference<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

/// Every `url(...)` reference in the stylesheet, as written.
pub fn css_url_references(css: &str) -> Vec<&str> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| captured_reference(&caps))
        .collect()
}

/// References inside `@font-face` blocks.
pub fn font_face_references(css: &str) -> Vec<&str> {
    FONT_FACE
        .find_iter(css)
        .flat_map(|block| css_url_references(block.as_str()))
        .collect()
}

/// Whether a URL path ends in a known font extension.
pub fn is_font_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('.')
        .next()
        .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replace every `url(...)` whose reference `replace` maps to a new value,
/// wrapping it in `quote`. References mapped to `None` are left untouched.
pub fn rewrite_css_urls<F>(css: &str, quote: char, mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    CSS_URL
        .replace_all(css, |caps: &Captures<'_>| {
            let original = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            match captured_reference(caps).and_then(&mut replace) {
                Some(value) => format!("url({q}{}{q})", value, q = quote),
                None => original.to_string(),
            }
        })
        .into_owned()
}

/// Rewrite relative `url(...)` references to absolute ones resolved against
/// the stylesheet's own URL. Inline and unparseable references are kept.
///
/// A fetched stylesheet is spliced into the page, so its relative references
/// would otherwise resolve against the page instead of the stylesheet.
pub fn absolutize_css_urls(css: &str, base: &Url) -> String {
    rewrite_css_urls(css, '"', |reference| {
        normalize_reference(reference, base).map(|url| append_fragment(url.into(), reference))
    })
}
