//! Downloaded resources.

use std::borrow::Cow;
use std::collections::HashMap;

/// One successfully downloaded resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// URL as collected (before redirects).
    pub url: String,
    /// URL the body was actually served from.
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Content-Type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type.as_deref().and_then(|ct| {
            let essence = ct.split(';').next()?.trim().to_ascii_lowercase();
            (!essence.is_empty()).then_some(essence)
        })
    }
}

/// URL -> resource map that keeps insertion order.
#[derive(Debug, Clone, Default)]
pub struct FetchedResources {
    entries: Vec<FetchedResource>,
    index: HashMap<String, usize>,
    failed: usize,
}

impl FetchedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource. A URL already present is replaced in place.
    pub fn insert(&mut self, resource: FetchedResource) {
        match self.index.get(&resource.url) {
            Some(&i) => self.entries[i] = resource,
            None => {
                self.index.insert(resource.url.clone(), self.entries.len());
                self.entries.push(resource);
            }
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn get(&self, url: &str) -> Option<&FetchedResource> {
        self.index.get(url).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FetchedResource> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of URLs that could not be downloaded.
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(FetchedResource::len).sum()
    }

    /// Merge another map into this one, keeping this map's order first.
    pub fn extend(&mut self, other: FetchedResources) {
        self.failed += other.failed;
        for resource in other.entries {
            self.insert(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(url: &str, body: &str) -> FetchedResource {
        FetchedResource {
            url: url.to_string(),
            final_url: url.to_string(),
            content_type: Some("text/css; charset=utf-8".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut map = FetchedResources::new();
        map.insert(resource("https://a.test/1.css", "one"));
        map.insert(resource("https://a.test/2.css", "two"));
        map.insert(resource("https://a.test/1.css", "uno"));

        let urls: Vec<&str> = map.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/1.css", "https://a.test/2.css"]);
        assert_eq!(map.get("https://a.test/1.css").unwrap().text(), "uno");
        assert_eq!(map.total_bytes(), 6);
    }

    #[test]
    fn test_mime_strips_parameters() {
        assert_eq!(resource("u", "x").mime().as_deref(), Some("text/css"));
        let mut r = resource("u", "x");
        r.content_type = Some(" ; ".into());
        assert_eq!(r.mime(), None);
    }

    #[test]
    fn test_text_is_lossy() {
        let mut r = resource("u", "");
        r.body = vec![b'a', 0xff, b'b'];
        assert_eq!(r.text(), "a\u{fffd}b");
    }
}
