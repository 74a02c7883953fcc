//! MIME type resolution for embedded resources.

use base64::Engine;

/// Content types that say nothing useful about the payload.
const GENERIC_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/unknown",
    "text/plain",
];

/// Pick a MIME type for a downloaded body.
///
/// Order: a specific declared Content-Type, then SVG detection and
/// magic-byte sniffing, then the URL's extension, then `application/octet-stream`.
pub fn resolve_mime(declared: Option<&str>, body: &[u8], url: &str) -> String {
    if let Some(declared) = declared {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let xml_svg = matches!(essence.as_str(), "text/xml" | "application/xml") && looks_like_svg(body);
        if !essence.is_empty() && !GENERIC_TYPES.contains(&essence.as_str()) && !xml_svg {
            return essence;
        }
    }

    // infer reports SVG as text/xml
    if looks_like_svg(body) {
        return "image/svg+xml".to_string();
    }

    if let Some(kind) = infer::get(body) {
        return kind.mime_type().to_string();
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn looks_like_svg(body: &[u8]) -> bool {
    let head = &body[..body.len().min(512)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Build a base64 `data:` URI.
pub fn data_uri(mime: &str, body: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(body)
    )
}
