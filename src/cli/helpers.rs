//! Shared helper functions for the CLI.

use std::path::{Path, PathBuf};

use console::style;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::error::PackError;
use crate::pipeline::{KindCount, PackSummary};
use crate::utils::{format_count, format_size};

const MAX_FILE_STEM: usize = 200;

/// Trim the argument and add `https://` when it has no http(s) scheme.
pub fn normalize_url(input: &str) -> Result<Url, PackError> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| PackError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(PackError::InvalidUrl {
            url: trimmed.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// File name for `--output-dir`: host and path segments joined by `_`.
///
/// `https://example.com/docs/` becomes `example.com_docs.html`.
pub fn output_file_name(url: &Url) -> String {
    let mut parts: Vec<String> = vec![url.host_str().unwrap_or("page").to_string()];
    if let Some(segments) = url.path_segments() {
        parts.extend(segments.filter(|s| !s.is_empty()).map(str::to_string));
    }

    let mut stem: String = parts
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    for ext in [".html", ".htm"] {
        if stem.len() > ext.len() && stem.to_ascii_lowercase().ends_with(ext) {
            stem.truncate(stem.len() - ext.len());
            break;
        }
    }
    stem.truncate(MAX_FILE_STEM);

    format!("{}.html", stem)
}

/// Write the document to `output`, into `output_dir`, or to stdout.
///
/// Returns the path written, if any.
pub async fn write_output(
    html: &str,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    url: &Url,
) -> std::io::Result<Option<PathBuf>> {
    let path = match (output, output_dir) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(dir)) => {
            tokio::fs::create_dir_all(dir).await?;
            dir.join(output_file_name(url))
        }
        (None, None) => {
            write_stdout(html).await?;
            return Ok(None);
        }
    };

    tokio::fs::write(&path, html).await?;
    Ok(Some(path))
}

/// Print `contents` and a newline to stdout.
pub async fn write_stdout(contents: &str) -> std::io::Result<()> {
    write_line(&mut tokio::io::stdout(), contents).await
}

/// A reader that went away (`pagepack url | head`) is not an error.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, contents: &str) -> std::io::Result<()> {
    let written = async {
        writer.write_all(contents.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    };
    match written.await {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn downloaded(count: &KindCount) -> String {
    let mut line = format!("{} downloaded / {} found", count.fetched, count.found);
    if count.failed > 0 {
        line.push_str(&format!(" ({})", style(format!("{} failed", count.failed)).yellow()));
    }
    line
}

/// Final run summary, on stderr.
pub fn print_summary(summary: &PackSummary, written: Option<&Path>) {
    eprintln!("\n{}", style("Pack complete").green().bold());
    eprintln!("{}", "-".repeat(40));
    eprintln!("{:<16} {}", "CSS files:", downloaded(&summary.styles));
    eprintln!("{:<16} {}", "JS files:", downloaded(&summary.scripts));
    eprintln!("{:<16} {}", "Fonts:", downloaded(&summary.fonts));
    if summary.images.fetched > 0 || summary.svgs.fetched > 0 {
        eprintln!("{:<16} {}", "Images:", downloaded(&summary.images));
        eprintln!("{:<16} {}", "SVGs:", downloaded(&summary.svgs));
        eprintln!("{:<16} {}", "Embedded:", summary.embedded);
    } else {
        eprintln!("{:<16} {} found", "Images:", summary.images.found);
    }
    eprintln!("{:<16} {} chars", "Total CSS:", format_count(summary.css_len));
    eprintln!("{:<16} {} chars", "Total JS:", format_count(summary.js_len));
    eprintln!(
        "{:<16} {} chars ({})",
        "Final HTML:",
        format_count(summary.html_len),
        format_size(summary.html_len)
    );
    eprintln!("{:<16} {}", "Strategy used:", style(&summary.strategy).cyan());
    if let Some(path) = written {
        eprintln!("{:<16} {}", "Written to:", path.display());
    }
}
