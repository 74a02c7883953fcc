//! Read resource URLs, page CSS, inline JS and markup from the live DOM.

use chromiumoxide::Page;
use tracing::{info, warn};
use url::Url;

use super::scripts;
use crate::error::PackError;
use crate::resources::{RawResources, ResourceKind, ResourceSet};
use crate::utils::format_count;

/// Computed-style rules emitted at most.
pub const MAX_COMPUTED_RULES: usize = 600;

async fn evaluate_string(page: &Page, step: &'static str, script: String) -> Result<String, PackError> {
    let result = page
        .evaluate(script)
        .await
        .map_err(|e| PackError::Script {
            step,
            message: e.to_string(),
        })?;
    result.into_value::<String>().map_err(|e| PackError::Script {
        step,
        message: e.to_string(),
    })
}

/// Enumerate external resources, resolved against `base`.
pub async fn collect_resources(page: &Page, base: &Url) -> Result<ResourceSet, PackError> {
    let json = evaluate_string(page, "collect resources", scripts::COLLECT_RESOURCES.to_string()).await?;
    let raw: RawResources = serde_json::from_str(&json).map_err(|e| PackError::Script {
        step: "collect resources",
        message: e.to_string(),
    })?;

    let set = ResourceSet::from_collected(base, raw);
    for kind in ResourceKind::ALL {
        info!("   {}: {}", kind.label(), set.len(kind));
    }
    Ok(set)
}

/// Style blocks, inline styles, computed rules and stylesheet rules.
///
/// Elements without an id or class are tagged with `data-inline-s` /
/// `data-computed-s` so the generated selectors match them in the saved markup.
/// An empty string is returned when the script fails.
pub async fn extract_page_css(page: &Page) -> String {
    match evaluate_string(page, "page css", scripts::extract_page_css(MAX_COMPUTED_RULES)).await {
        Ok(css) => {
            info!("   Extracted {} characters of page CSS", format_count(css.len()));
            css
        }
        Err(e) => {
            warn!("{}", e);
            String::new()
        }
    }
}

/// Inline script bodies, minus analytics snippets. Empty on failure.
pub async fn extract_inline_js(page: &Page) -> String {
    match evaluate_string(page, "inline js", scripts::EXTRACT_INLINE_JS.to_string()).await {
        Ok(js) => {
            info!("   Extracted {} characters of inline JS", format_count(js.len()));
            js
        }
        Err(e) => {
            warn!("{}", e);
            String::new()
        }
    }
}

/// Serialized document, falling back to CDP `content()` when the script fails.
pub async fn page_html(page: &Page) -> Result<String, PackError> {
    match evaluate_string(page, "serialize", scripts::OUTER_HTML.to_string()).await {
        Ok(html) => Ok(html),
        Err(_) => Ok(page.content().await?),
    }
}
