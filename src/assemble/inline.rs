//! Replace references to fetched binaries with `data:` URIs.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::fetch::FetchedResources;
use crate::resources::{append_fragment, normalize_reference, rewrite_css_urls, srcset_url_spans};
use crate::utils::{data_uri, decode_entities, escape_attr, resolve_mime};

static URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\s(?:src|poster|xlink:href|data-src|data-lazy-src|data-original|data-lazy|data-lazy-load|data-data-src)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
    )
    .unwrap()
});

/// Plain `href` only points at an image on SVG `<use>` and `<image>`.
static SVG_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<(?:use|image)\s(?:[^>]*?\s)?href\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .unwrap()
});

static STYLE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\sstyle\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static SRCSET_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s(?:srcset|data-srcset)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Attribute value and the quote that delimits it.
fn quoted_value<'h>(caps: &Captures<'h>) -> (&'h str, char) {
    match caps.get(2) {
        Some(m) => (m.as_str(), '"'),
        None => (caps.get(3).map(|m| m.as_str()).unwrap_or_default(), '\''),
    }
}

/// Lookup from reference to data URI, encoding each resource at most once.
pub struct Embedder<'a> {
    base: &'a Url,
    resources: &'a FetchedResources,
    encoded: HashMap<String, String>,
    replaced: usize,
}

impl<'a> Embedder<'a> {
    pub fn new(base: &'a Url, resources: &'a FetchedResources) -> Self {
        Self {
            base,
            resources,
            encoded: HashMap::new(),
            replaced: 0,
        }
    }

    /// Number of references rewritten so far.
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Data URI for `reference`, carrying over its fragment.
    fn lookup(&mut self, reference: &str) -> Option<String> {
        let url = normalize_reference(reference, self.base)?.to_string();
        let uri = match self.encoded.get(&url) {
            Some(uri) => uri.clone(),
            None => {
                let resource = self.resources.get(&url)?;
                let mime = resolve_mime(resource.content_type.as_deref(), &resource.body, &url);
                let uri = data_uri(&mime, &resource.body);
                self.encoded.insert(url, uri.clone());
                uri
            }
        };
        self.replaced += 1;
        Some(append_fragment(uri, reference))
    }

    /// Lookup for a raw attribute value, which may hold character references.
    fn lookup_attr(&mut self, value: &str) -> Option<String> {
        self.lookup(&decode_entities(value))
    }

    /// Rewrite `url(...)` references inside CSS text.
    pub fn css(&mut self, css: &str) -> String {
        if self.resources.is_empty() {
            return css.to_string();
        }
        rewrite_css_urls(css, '"', |reference| self.lookup(reference))
    }

    /// Rewrite image-bearing attributes and `url(...)` values in markup.
    ///
    /// Attributes with nothing to substitute are left byte for byte.
    pub fn html(&mut self, html: &str) -> String {
        if self.resources.is_empty() {
            return html.to_string();
        }

        let mut html = html.to_string();
        for pattern in [&URL_ATTR, &SVG_HREF] {
            html = pattern
                .replace_all(&html, |caps: &Captures<'_>| {
                    let (value, _) = quoted_value(caps);
                    match self.lookup_attr(value) {
                        Some(uri) => format!("{}\"{}\"", &caps[1], uri),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned();
        }

        let html = SRCSET_ATTR
            .replace_all(&html, |caps: &Captures<'_>| {
                let (value, quote) = quoted_value(caps);
                match self.srcset(value) {
                    Some(srcset) => format!("{}{q}{}{q}", &caps[1], srcset, q = quote),
                    None => caps[0].to_string(),
                }
            })
            .into_owned();

        STYLE_ATTR
            .replace_all(&html, |caps: &Captures<'_>| {
                let (value, outer) = quoted_value(caps);
                // Quote url() with whichever quote the attribute does not use.
                let inner = if outer == '"' { '\'' } else { '"' };
                let before = self.replaced;
                let style = rewrite_css_urls(&decode_entities(value), inner, |reference| {
                    self.lookup(reference)
                });
                if self.replaced == before {
                    return caps[0].to_string();
                }
                format!("{}{q}{}{q}", &caps[1], escape_attr(&style, outer), q = outer)
            })
            .into_owned()
    }

    /// Substitute fetched candidates; `None` when nothing matched.
    fn srcset(&mut self, srcset: &str) -> Option<String> {
        let mut out = String::with_capacity(srcset.len());
        let mut last = 0;
        for span in srcset_url_spans(srcset) {
            if let Some(uri) = self.lookup_attr(&srcset[span.clone()]) {
                out.push_str(&srcset[last..span.start]);
                out.push_str(&uri);
                last = span.end;
            }
        }
        if last == 0 {
            return None;
        }
        out.push_str(&srcset[last..]);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedResource;

    fn resources() -> FetchedResources {
        let mut map = FetchedResources::new();
        map.insert(FetchedResource {
            url: "https://site.test/img/a.png".into(),
            final_url: "https://site.test/img/a.png".into(),
            content_type: Some("image/png".into()),
            body: b"png".to_vec(),
        });
        map.insert(FetchedResource {
            url: "https://site.test/f/icons.woff2".into(),
            final_url: "https://site.test/f/icons.woff2".into(),
            content_type: None,
            body: b"wof".to_vec(),
        });
        map.insert(FetchedResource {
            url: "https://site.test/icons.svg".into(),
            final_url: "https://site.test/icons.svg".into(),
            content_type: Some("image/svg+xml".into()),
            body: b"<svg/>".to_vec(),
        });
        map.insert(FetchedResource {
            url: "https://site.test/img/a.png?w=100&h=50".into(),
            final_url: "https://site.test/img/a.png?w=100&h=50".into(),
            content_type: Some("image/png".into()),
            body: b"png".to_vec(),
        });
        map
    }

    fn base() -> Url {
        Url::parse("https://site.test/page/").unwrap()
    }

    #[test]
    fn test_relative_img_src_is_embedded() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(r#"<img alt="a" src="../img/a.png"><img src='/missing.png'>"#);
        assert_eq!(
            out,
            r#"<img alt="a" src="data:image/png;base64,cG5n"><img src='/missing.png'>"#
        );
        assert_eq!(embedder.replaced(), 1);
    }

    #[test]
    fn test_srcset_keeps_descriptors() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(r#"<img srcset="/img/a.png 1x, /img/b.png 2x">"#);
        assert_eq!(
            out,
            r#"<img srcset="data:image/png;base64,cG5n 1x, /img/b.png 2x">"#
        );
    }

    #[test]
    fn test_css_fonts_use_extension_mime() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.css(r#"@font-face{src:url("https://site.test/f/icons.woff2")}"#);
        assert_eq!(out, r#"@font-face{src:url("data:font/woff2;base64,d29m")}"#);
    }

    #[test]
    fn test_inline_style_attribute() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(r#"<div style="background:url(/img/a.png)"></div>"#);
        assert_eq!(
            out,
            r#"<div style="background:url('data:image/png;base64,cG5n')"></div>"#
        );
    }

    #[test]
    fn test_srcset_comma_url_and_data_candidate_untouched() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let page = r#"<img srcset="/cdn/w_300,h_200/x.png 1x,data:image/gif;base64,R0lGOD 2x ,  /img/a.png 3x">"#;
        let out = embedder.html(page);
        assert_eq!(
            out,
            r#"<img srcset="/cdn/w_300,h_200/x.png 1x,data:image/gif;base64,R0lGOD 2x ,  data:image/png;base64,cG5n 3x">"#
        );
        assert_eq!(embedder.replaced(), 1);

        let untouched = r#"<img srcset='/cdn/w_300,h_200/x.png 1x,data:image/gif;base64,R0lGOD 2x'>"#;
        assert_eq!(embedder.html(untouched), untouched);
    }

    #[test]
    fn test_entity_encoded_query_is_embedded() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(r#"<img src="/img/a.png?w=100&amp;h=50">"#);
        assert_eq!(out, r#"<img src="data:image/png;base64,cG5n">"#);
    }

    #[test]
    fn test_entity_quoted_style_url_is_embedded() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(
            r#"<div style="font-family:&quot;A&amp;B&quot;;background:url(&quot;/img/a.png&quot;)"></div>"#,
        );
        assert_eq!(
            out,
            r#"<div style="font-family:&quot;A&amp;B&quot;;background:url('data:image/png;base64,cG5n')"></div>"#
        );

        let untouched = r#"<p style="background:url(&quot;/nope.png&quot;)"></p>"#;
        assert_eq!(embedder.html(untouched), untouched);
    }

    #[test]
    fn test_svg_use_keeps_fragment() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let out = embedder.html(
            r##"<svg><use xlink:href="/icons.svg#star"></use><use class="i" href='/icons.svg#moon'></use></svg>"##,
        );
        assert_eq!(
            out,
            r##"<svg><use xlink:href="data:image/svg+xml;base64,PHN2Zy8+#star"></use><use class="i" href="data:image/svg+xml;base64,PHN2Zy8+#moon"></use></svg>"##
        );
        assert_eq!(embedder.replaced(), 2);
    }

    #[test]
    fn test_anchor_href_left_alone() {
        let res = resources();
        let base = base();
        let mut embedder = Embedder::new(&base, &res);
        let page = r#"<a href="/img/a.png">full size</a>"#;
        assert_eq!(embedder.html(page), page);
    }
}
