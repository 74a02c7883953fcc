//! Collected resource references, grouped by kind.
//!
//! URLs come either from the live DOM (see `browser::extract`) or from raw
//! HTML (see [`static_collect`]). Both paths funnel through [`ResourceSet`],
//! which resolves relative references against the page URL, drops inline
//! schemes, and deduplicates while keeping discovery order.

mod css;
mod static_collect;

pub use css::{
    absolutize_css_urls, css_url_references, font_face_references, is_font_url, rewrite_css_urls,
    FONT_EXTENSIONS,
};
pub use static_collect::{static_collect, StaticPage, ANALYTICS_MARKERS, LAZY_IMAGE_ATTRS};

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use url::Url;

/// Category of an external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Style,
    Script,
    Image,
    Font,
    Svg,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Style,
        ResourceKind::Script,
        ResourceKind::Image,
        ResourceKind::Font,
        ResourceKind::Svg,
    ];

    /// Human-readable plural label used in logs and the summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Style => "CSS files",
            Self::Script => "JS files",
            Self::Image => "Images",
            Self::Font => "Fonts",
            Self::Svg => "SVGs",
        }
    }

    /// Whether the body should be treated as text when assembling.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Style | Self::Script)
    }
}

/// Raw URL lists as reported by the page, before normalisation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawResources {
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default)]
    pub svgs: Vec<String>,
}

/// Deduplicated absolute URLs per resource kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceSet {
    #[serde(rename = "css")]
    styles: Vec<String>,
    #[serde(rename = "js")]
    scripts: Vec<String>,
    images: Vec<String>,
    fonts: Vec<String>,
    svgs: Vec<String>,
    #[serde(skip)]
    seen: HashSet<(ResourceKind, String)>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw page-reported lists.
    pub fn from_collected(base: &Url, raw: RawResources) -> Self {
        let mut set = Self::new();
        let groups = [
            (ResourceKind::Style, raw.css),
            (ResourceKind::Script, raw.js),
            (ResourceKind::Image, raw.images),
            (ResourceKind::Font, raw.fonts),
            (ResourceKind::Svg, raw.svgs),
        ];
        for (kind, urls) in groups {
            for reference in urls {
                set.insert(kind, &reference, base);
            }
        }
        set
    }

    /// Add a reference. Returns true when it was new and acceptable.
    pub fn insert(&mut self, kind: ResourceKind, reference: &str, base: &Url) -> bool {
        let Some(url) = normalize_reference(reference, base) else {
            return false;
        };
        let url = url.to_string();
        if !self.seen.insert((kind, url.clone())) {
            return false;
        }
        self.bucket_mut(kind).push(url);
        true
    }

    /// URLs of one kind, in discovery order.
    pub fn urls(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Style => &self.styles,
            ResourceKind::Script => &self.scripts,
            ResourceKind::Image => &self.images,
            ResourceKind::Font => &self.fonts,
            ResourceKind::Svg => &self.svgs,
        }
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.urls(kind).len()
    }

    pub fn total(&self) -> usize {
        ResourceKind::ALL.iter().map(|k| self.len(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn bucket_mut(&mut self, kind: ResourceKind) -> &mut Vec<String> {
        match kind {
            ResourceKind::Style => &mut self.styles,
            ResourceKind::Script => &mut self.scripts,
            ResourceKind::Image => &mut self.images,
            ResourceKind::Font => &mut self.fonts,
            ResourceKind::Svg => &mut self.svgs,
        }
    }
}

/// Schemes that already carry their content or cannot be fetched.
const SKIPPED_PREFIXES: &[&str] = &["data:", "blob:", "javascript:", "about:", "mailto:", "#"];

/// Resolve a reference against `base`, rejecting inline and non-HTTP URLs.
/// The fragment is dropped so `sprite.svg#a` and `sprite.svg#b` collapse.
pub fn normalize_reference(reference: &str, base: &Url) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let lower = reference.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Append the `#fragment` of `reference`, if any, to `target`.
///
/// Lookups key on the fragment-less URL; the fragment still selects a symbol
/// inside an SVG sprite and has to survive substitution.
pub fn append_fragment(mut target: String, reference: &str) -> String {
    if let Some(i) = reference.trim().find('#') {
        let fragment = &reference.trim()[i..];
        if fragment.len() > 1 {
            target.push_str(fragment);
        }
    }
    target
}

/// Byte ranges of the URL in each `srcset` candidate.
///
/// Follows the HTML parsing rules: a URL runs to the next whitespace and may
/// itself contain commas, trailing commas end a candidate without
/// descriptors, and descriptors run to the next comma outside parentheses.
pub fn srcset_url_spans(srcset: &str) -> Vec<Range<usize>> {
    let bytes = srcset.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut end = i;
        if end > start && bytes[end - 1] == b',' {
            while end > start && bytes[end - 1] == b',' {
                end -= 1;
            }
        } else {
            let mut depth = 0usize;
            while i < bytes.len() {
                match bytes[i] {
                    b'(' => depth += 1,
                    b')' => depth = depth.saturating_sub(1),
                    b',' if depth == 0 => break,
                    _ => {}
                }
                i += 1;
            }
        }

        if end > start {
            spans.push(start..end);
        }
    }
    spans
}

/// Take the URL part of every `srcset` candidate ("a.png 1x, b.png 2x").
pub fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset_url_spans(srcset).into_iter().map(move |span| &srcset[span])
}
