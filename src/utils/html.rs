//! HTML attribute text helpers.

use std::borrow::Cow;

/// Decode the character references that appear in serialized attribute values.
///
/// `&amp;` is decoded last so `&amp;quot;` yields `&quot;`, not `"`.
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .replace("&quot;", "\"")
            .replace("&#34;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// Escape `value` for an attribute delimited by `quote`.
pub fn escape_attr(value: &str, quote: char) -> String {
    let escaped = value.replace('&', "&amp;");
    match quote {
        '"' => escaped.replace('"', "&quot;"),
        _ => escaped.replace('\'', "&#39;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("/img.png?w=100&amp;h=50"), "/img.png?w=100&h=50");
        assert_eq!(
            decode_entities("url(&quot;/a.png&quot;) url(&#39;/b.png&#39;)"),
            r#"url("/a.png") url('/b.png')"#
        );
        assert_eq!(decode_entities("&amp;quot;"), "&quot;");
        assert!(matches!(decode_entities("/plain.png"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(
            escape_attr(r#"font-family:"A&B""#, '"'),
            "font-family:&quot;A&amp;B&quot;"
        );
        assert_eq!(escape_attr("a'b\"c", '\''), "a&#39;b\"c");
    }
}
