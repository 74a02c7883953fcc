//! Splice fetched and inline content back into one self-contained document.
//!
//! Assembly is pure string substitution over the serialized page:
//!
//! 1. strip every stylesheet `<link>`, `<style>` block and `<script>` block;
//! 2. build one CSS bundle (fetched stylesheets, then page styles);
//! 3. build one JS bundle (fetched scripts, then inline scripts);
//! 4. put the CSS bundle in the head and the JS bundle at the end of the body;
//! 5. add charset/viewport meta tags when the page declares no charset;
//! 6. replace references to fetched images and fonts with `data:` URIs.

mod inline;

pub use inline::Embedder;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::fetch::{FetchedResource, FetchedResources};
use crate::resources::absolutize_css_urls;

pub const CSS_FILES_BANNER: &str = "/* ========== External CSS Files ========== */";
pub const PAGE_STYLES_BANNER: &str = "/* ========== Page Styles ========== */";
pub const JS_FILES_BANNER: &str = "// ========== External JS Files ==========";
pub const INLINE_SCRIPTS_BANNER: &str = "// ========== Inline Scripts ==========";

const META_TAGS: &str = "<meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n<meta http-equiv=\"X-UA-Compatible\" content=\"IE=edge\">\n";

static STYLESHEET_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<link\b[^>]*(?:rel\s*=\s*["']?[^"'>]*\bstylesheet\b|href\s*=\s*["'][^"']*\.css)[^>]*>"#,
    )
    .unwrap()
});
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").unwrap());
static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());
static STYLE_END_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(style)").unwrap());
static SCRIPT_END_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

/// Inputs to [`assemble`].
#[derive(Debug, Clone, Copy)]
pub struct Assembly<'a> {
    /// Final page URL; relative references in the page resolve against it.
    pub base: &'a Url,
    pub styles: &'a FetchedResources,
    pub scripts: &'a FetchedResources,
    pub page_css: &'a str,
    pub inline_js: &'a str,
    /// Images, SVGs and fonts to embed as `data:` URIs.
    pub embeds: &'a FetchedResources,
}

/// The finished document plus bundle sizes for the summary.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub html: String,
    pub css_len: usize,
    pub js_len: usize,
    /// References replaced by `data:` URIs.
    pub embedded: usize,
}

/// Remove stylesheet links, style blocks and script blocks.
pub fn strip_references(html: &str) -> String {
    let html = STYLESHEET_LINK.replace_all(html, "");
    let html = STYLE_BLOCK.replace_all(&html, "");
    SCRIPT_BLOCK.replace_all(&html, "").into_owned()
}

fn stylesheet_text(resource: &FetchedResource) -> String {
    let text = resource.text();
    match Url::parse(&resource.final_url) {
        Ok(base) => absolutize_css_urls(&text, &base),
        Err(_) => text.into_owned(),
    }
}

/// Concatenate fetched stylesheets and page CSS under banner comments.
pub fn build_css(styles: &FetchedResources, page_css: &str) -> String {
    let mut css = format!("{}\n\n", CSS_FILES_BANNER);
    for (i, resource) in styles.iter().enumerate() {
        css.push_str(&format!(
            "/* File {}: {} */\n{}\n\n",
            i + 1,
            resource.url,
            stylesheet_text(resource)
        ));
    }
    css.push_str(&format!("\n{}\n\n{}", PAGE_STYLES_BANNER, page_css));
    css
}

/// Concatenate fetched scripts and inline scripts under banner comments.
pub fn build_js(scripts: &FetchedResources, inline_js: &str) -> String {
    let mut js = format!("{}\n\n", JS_FILES_BANNER);
    for (i, resource) in scripts.iter().enumerate() {
        js.push_str(&format!(
            "// File {}: {}\n{}\n\n",
            i + 1,
            resource.url,
            resource.text()
        ));
    }
    js.push_str(&format!("\n{}\n\n{}", INLINE_SCRIPTS_BANNER, inline_js));
    js
}

/// Put the CSS block in the head, prepending a head when there is none.
pub fn insert_style_block(html: &str, css: &str) -> String {
    let css = STYLE_END_TAG.replace_all(css, r"<\/$1");
    let block = format!("<style>\n{}\n</style>", css);
    match HEAD_CLOSE.find(html) {
        Some(m) => {
            let mut out = html.to_string();
            out.insert_str(m.start(), &format!("\n{}\n", block));
            out
        }
        None => format!("<head>\n{}\n</head>\n{}", block, html),
    }
}

/// Put the JS block at the end of the body, appending it when there is no body.
pub fn insert_script_block(html: &str, js: &str) -> String {
    let js = SCRIPT_END_TAG.replace_all(js, r"<\/$1");
    let block = format!("<script>\n{}\n</script>", js);
    let mut out = html.to_string();
    match BODY_CLOSE.find(html) {
        Some(m) => out.insert_str(m.start(), &format!("\n{}\n", block)),
        None => {
            out.push('\n');
            out.push_str(&block);
        }
    }
    out
}

/// Insert charset, viewport and compatibility meta tags right after `<head>`.
pub fn insert_meta_tags(html: &str) -> String {
    match HEAD_OPEN.find(html) {
        Some(m) => {
            let mut out = html.to_string();
            out.insert_str(m.end(), &format!("\n{}", META_TAGS));
            out
        }
        None => format!("{}{}", META_TAGS, html),
    }
}

/// Build the self-contained document.
pub fn assemble(html: &str, parts: &Assembly<'_>) -> Assembled {
    let stripped = strip_references(html);
    let declares_charset = stripped.to_ascii_lowercase().contains("charset");

    let mut embedder = Embedder::new(parts.base, parts.embeds);
    let body = embedder.html(&stripped);

    let page_css = absolutize_css_urls(parts.page_css, parts.base);
    let css = embedder.css(&build_css(parts.styles, &page_css));
    let js = build_js(parts.scripts, parts.inline_js);

    let mut out = insert_style_block(&body, &css);
    out = insert_script_block(&out, &js);
    if !declares_charset {
        out = insert_meta_tags(&out);
    }

    Assembled {
        html: out,
        css_len: css.len(),
        js_len: js.len(),
        embedded: embedder.replaced(),
    }
}
