//! Resource collection from raw HTML, without running any page scripts.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::css::{css_url_references, font_face_references};
use super::{srcset_urls, ResourceKind, ResourceSet};

/// Script bodies containing any of these are tracking snippets and are dropped.
pub const ANALYTICS_MARKERS: &[&str] = &[
    "google-analytics",
    "gtag",
    "googletagmanager",
    "facebook.com/tr",
];

/// Attributes that lazy loaders use to hold the real image URL.
pub const LAZY_IMAGE_ATTRS: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-lazy-load",
    "data-data-src",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static STYLESHEET_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"link[rel~="stylesheet"], link[rel="preload"][as="style"], link[href*=".css"]"#)
});
static STYLE_DATA_HREF: LazyLock<Selector> = LazyLock::new(|| selector("style[data-href]"));
static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static IMAGE_CARRIERS: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "img, picture source, video, [data-src], [data-lazy-src], [data-original], [data-lazy], [data-lazy-load], [srcset]",
    )
});
static STYLED: LazyLock<Selector> = LazyLock::new(|| selector("[style]"));
static STYLE_BLOCKS: LazyLock<Selector> = LazyLock::new(|| selector("style"));
static SVG_REFS: LazyLock<Selector> = LazyLock::new(|| selector("use, image"));

/// What the static collector found on a page.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    pub resources: ResourceSet,
    /// Bodies of `<style>` blocks, each under a banner comment.
    pub page_css: String,
    /// Bodies of inline scripts, minus analytics snippets.
    pub inline_js: String,
}

/// Whether a `<script type=...>` value denotes executable JavaScript.
pub fn is_javascript_type(script_type: Option<&str>) -> bool {
    match script_type.map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(t) => matches!(
            t.as_str(),
            "" | "text/javascript" | "application/javascript" | "module" | "text/ecmascript"
        ),
    }
}

/// Whether an inline script body is a tracking snippet.
pub fn is_analytics(body: &str) -> bool {
    ANALYTICS_MARKERS.iter().any(|m| body.contains(m))
}

/// Banner placed in front of every `<style>` block copied into the page CSS.
pub fn style_block_banner() -> &'static str {
    "\n/* ========== Style Block ========== */\n"
}

/// Walk raw HTML for the same resource categories the live-DOM collector finds.
pub fn static_collect(html: &str, base: &Url) -> StaticPage {
    let document = Html::parse_document(html);
    let mut page = StaticPage::default();
    let set = &mut page.resources;

    for link in document.select(&STYLESHEET_LINKS) {
        if let Some(href) = link.value().attr("href") {
            set.insert(ResourceKind::Style, href, base);
        }
    }
    for style in document.select(&STYLE_DATA_HREF) {
        if let Some(href) = style.value().attr("data-href") {
            set.insert(ResourceKind::Style, href, base);
        }
    }

    for script in document.select(&SCRIPTS) {
        let el = script.value();
        match el.attr("src").or_else(|| el.attr("data-src")) {
            Some(src) => {
                set.insert(ResourceKind::Script, src, base);
            }
            None if is_javascript_type(el.attr("type")) => {
                let body = text_of(&script);
                if !body.trim().is_empty() && !is_analytics(&body) {
                    page.inline_js.push('\n');
                    page.inline_js.push_str(&body);
                    page.inline_js.push('\n');
                }
            }
            None => {}
        }
    }

    for el in document.select(&IMAGE_CARRIERS) {
        let value = el.value();
        if value.name() == "script" {
            continue;
        }
        for attr in ["src", "poster"].iter().chain(LAZY_IMAGE_ATTRS) {
            if let Some(v) = value.attr(attr) {
                set.insert(ResourceKind::Image, v, base);
            }
        }
        if let Some(srcset) = value.attr("srcset") {
            for candidate in srcset_urls(srcset) {
                set.insert(ResourceKind::Image, candidate, base);
            }
        }
    }

    for el in document.select(&STYLED) {
        if let Some(style) = el.value().attr("style") {
            for reference in css_url_references(style) {
                set.insert(ResourceKind::Image, reference, base);
            }
        }
    }

    for el in document.select(&SVG_REFS) {
        // `xlink:href` lives in the xlink namespace with local name `href`,
        // which `attr()` would miss.
        let href = el
            .value()
            .attrs()
            .find(|(name, _)| *name == "href")
            .map(|(_, value)| value);
        if let Some(href) = href {
            set.insert(ResourceKind::Svg, href, base);
        }
    }

    for style in document.select(&STYLE_BLOCKS) {
        let css = text_of(&style);
        if css.trim().is_empty() {
            continue;
        }
        for reference in font_face_references(&css) {
            set.insert(ResourceKind::Font, reference, base);
        }
        page.page_css.push_str(style_block_banner());
        page.page_css.push_str(&css);
        page.page_css.push('\n');
    }

    page
}

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!doctype html>
<html><head>
  <link rel="stylesheet" href="/css/site.css">
  <link rel="preload" as="style" href="/css/late.css">
  <link rel="icon" href="/favicon.ico">
  <style>@font-face { font-family: X; src: url(/fonts/x.woff2); } body { color: red }</style>
  <script src="/js/app.js"></script>
  <script>window.ready = true;</script>
  <script>gtag('config', 'UA-1');</script>
  <script type="application/ld+json">{"@type":"Thing"}</script>
</head><body>
  <img src="/img/a.png" srcset="/img/a.png 1x, /img/a@2x.png 2x">
  <img data-src="/img/lazy.jpg" src="data:image/gif;base64,R0lG">
  <div style="background-image: url('/img/bg.jpg')"></div>
  <video poster="/img/poster.jpg"></video>
  <svg><use xlink:href="/icons.svg#star"></use><use href="#local"></use></svg>
</body></html>"##;

    fn collect() -> StaticPage {
        let base = Url::parse("https://site.test/index.html").unwrap();
        static_collect(PAGE, &base)
    }

    #[test]
    fn test_collects_stylesheets() {
        let page = collect();
        assert_eq!(
            page.resources.urls(ResourceKind::Style),
            &["https://site.test/css/site.css", "https://site.test/css/late.css"]
        );
    }

    #[test]
    fn test_collects_scripts_and_inline_js() {
        let page = collect();
        assert_eq!(
            page.resources.urls(ResourceKind::Script),
            &["https://site.test/js/app.js"]
        );
        assert!(page.inline_js.contains("window.ready = true;"));
        assert!(!page.inline_js.contains("gtag"));
        assert!(!page.inline_js.contains("@type"));
    }

    #[test]
    fn test_collects_images_from_every_carrier() {
        let page = collect();
        let images = page.resources.urls(ResourceKind::Image);
        for expected in [
            "https://site.test/img/a.png",
            "https://site.test/img/a@2x.png",
            "https://site.test/img/lazy.jpg",
            "https://site.test/img/bg.jpg",
            "https://site.test/img/poster.jpg",
        ] {
            assert!(images.iter().any(|u| u == expected), "missing {expected}");
        }
        assert!(images.iter().all(|u| !u.starts_with("data:")));
    }

    #[test]
    fn test_collects_svg_and_fonts() {
        let page = collect();
        assert_eq!(
            page.resources.urls(ResourceKind::Svg),
            &["https://site.test/icons.svg"]
        );
        assert_eq!(
            page.resources.urls(ResourceKind::Font),
            &["https://site.test/fonts/x.woff2"]
        );
    }

    #[test]
    fn test_page_css_has_banner() {
        let page = collect();
        assert!(page.page_css.contains("Style Block"));
        assert!(page.page_css.contains("body { color: red }"));
    }

    #[test]
    fn test_is_javascript_type() {
        assert!(is_javascript_type(None));
        assert!(is_javascript_type(Some("module")));
        assert!(is_javascript_type(Some("Text/JavaScript")));
        assert!(!is_javascript_type(Some("application/ld+json")));
        assert!(!is_javascript_type(Some("text/template")));
    }
}
