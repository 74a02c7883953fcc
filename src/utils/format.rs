//! Formatting helpers for log lines and the run summary.

/// Format a byte count as a human-readable size.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a count with thousands separators ("1,234,567").
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Last `max` characters of a URL, prefixed with an ellipsis when cut.
pub fn url_tail(url: &str, max: usize) -> String {
    let count = url.chars().count();
    if count <= max {
        return url.to_string();
    }
    let tail: String = url.chars().skip(count - max).collect();
    format!("…{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_url_tail() {
        assert_eq!(url_tail("https://a.test/x", 60), "https://a.test/x");
        assert_eq!(url_tail("https://a.test/abcdef", 3), "…def");
        assert_eq!(url_tail("https://a.test/ééé", 2), "…éé");
    }
}
