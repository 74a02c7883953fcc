//! Full pack runs without a browser against a local site.

use std::time::Duration;

use pagepack::fetch::{ResourceFetcher, RetryPolicy};
use pagepack::pipeline::{self, PackOptions, StaticSource};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Fixture</title>
<link rel="stylesheet" href="/style.css">
<link rel="stylesheet" href="/missing.css">
<style>.lead{color:blue}</style>
</head>
<body>
<p class="lead">Hello</p>
<img src="/logo.png" alt="logo">
<script src="/app.js"></script>
<script>window.inlineMarker = 1;</script>
</body>
</html>"#;

const STYLESHEET: &str = r#"@font-face { font-family: Fixture; src: url(fonts/fixture.woff2) format("woff2"); }
body { font-family: Fixture; }"#;

const ATTRIBUTES: &str = r##"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Attributes</title></head>
<body>
<img src="/thumb.png?w=100&amp;h=50" alt="thumb">
<img src="/hero.png" srcset="/cdn/w_300,h_200/hero.png 1x, data:image/gif;base64,R0lGODlh 2x">
<div style="background:url(&quot;/bg.png&quot;)"></div>
<svg><use href="/icons.svg#moon"></use></svg>
</body>
</html>"##;

const ICONS: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><symbol id="moon"/></svg>"#;

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn fixture_site() -> MockServer {
    let server = MockServer::start().await;
    serve(&server, "/", ResponseTemplate::new(200).set_body_raw(INDEX, "text/html")).await;
    serve(
        &server,
        "/style.css",
        ResponseTemplate::new(200).set_body_raw(STYLESHEET, "text/css"),
    )
    .await;
    serve(&server, "/missing.css", ResponseTemplate::new(404)).await;
    serve(
        &server,
        "/app.js",
        ResponseTemplate::new(200).set_body_raw("console.log('external');", "application/javascript"),
    )
    .await;
    serve(
        &server,
        "/fonts/fixture.woff2",
        ResponseTemplate::new(200).set_body_raw(b"wOF2fake".to_vec(), "font/woff2"),
    )
    .await;
    serve(
        &server,
        "/logo.png",
        ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"),
    )
    .await;
    server
}

fn fetcher(referer: &str) -> ResourceFetcher {
    ResourceFetcher::builder()
        .referer(referer)
        .retry(RetryPolicy::new(2, Duration::from_millis(10)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_static_pack_embeds_everything() {
    let server = fixture_site().await;
    let url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let fetcher = fetcher(url.as_str());
    let mut source = StaticSource::new(fetcher.clone());

    let options = PackOptions {
        inline_images: true,
        ..Default::default()
    };
    let result = pipeline::run(&mut source, &fetcher, &url, &options)
        .await
        .unwrap();
    let html = &result.html;

    // one style block and one script block
    assert_eq!(html.matches("<style>").count(), 1);
    assert_eq!(html.matches("<script>").count(), 1);
    assert!(!html.contains(r#"rel="stylesheet""#));
    assert!(!html.contains(r#"src="/app.js""#));

    let style_css = format!("/* File 1: {}/style.css */", server.uri());
    assert_eq!(html.matches(&style_css).count(), 1);
    assert!(!html.contains("File 2:"), "failed stylesheet must be omitted");
    assert!(!html.contains("missing.css"));

    assert_eq!(html.matches(".lead{color:blue}").count(), 1);
    assert!(html.find(&style_css).unwrap() < html.find(".lead{color:blue}").unwrap());

    assert!(html.contains(&format!("// File 1: {}/app.js", server.uri())));
    assert!(html.contains("window.inlineMarker = 1;"));

    assert!(html.contains(r#"src="data:image/png;base64,"#));
    assert!(html.contains(r#"url("data:font/woff2;base64,"#));

    // the fixture declares no charset
    assert!(html.contains(r#"<meta charset="UTF-8">"#));

    let summary = &result.summary;
    assert_eq!(summary.strategy, "static");
    assert_eq!(summary.styles.found, 2);
    assert_eq!(summary.styles.fetched, 1);
    assert_eq!(summary.styles.failed, 1);
    assert_eq!(summary.scripts.fetched, 1);
    assert_eq!(summary.fonts.fetched, 1);
    assert_eq!(summary.images.fetched, 1);
    assert_eq!(summary.html_len, html.len());
}

#[tokio::test]
async fn test_images_left_alone_without_inline_images() {
    let server = fixture_site().await;
    let url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let fetcher = fetcher(url.as_str());
    let mut source = StaticSource::new(fetcher.clone());

    let result = pipeline::run(&mut source, &fetcher, &url, &PackOptions::default())
        .await
        .unwrap();

    assert!(result.html.contains(r#"src="/logo.png""#));
    assert_eq!(result.summary.images.found, 1);
    assert_eq!(result.summary.images.fetched, 0);
    // fonts are embedded regardless
    assert!(result.html.contains("data:font/woff2;base64,"));
}

#[tokio::test]
async fn test_page_fetch_failure_is_fatal() {
    let server = MockServer::start().await;
    serve(&server, "/gone", ResponseTemplate::new(404)).await;

    let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
    let fetcher = fetcher(url.as_str());
    let mut source = StaticSource::new(fetcher.clone());

    let err = pipeline::run(&mut source, &fetcher, &url, &PackOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, pagepack::PackError::PageFetch { .. }));
}

#[tokio::test]
async fn test_attribute_references_embedded_from_raw_markup() {
    let server = MockServer::start().await;
    serve(&server, "/", ResponseTemplate::new(200).set_body_raw(ATTRIBUTES, "text/html")).await;
    for route in ["/thumb.png", "/hero.png", "/cdn/w_300,h_200/hero.png", "/bg.png"] {
        serve(&server, route, ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png")).await;
    }
    serve(
        &server,
        "/icons.svg",
        ResponseTemplate::new(200).set_body_raw(ICONS, "image/svg+xml"),
    )
    .await;

    let url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let fetcher = fetcher(url.as_str());
    let mut source = StaticSource::new(fetcher.clone());
    let options = PackOptions {
        inline_images: true,
        ..Default::default()
    };
    let result = pipeline::run(&mut source, &fetcher, &url, &options)
        .await
        .unwrap();
    let html = &result.html;

    // entity-encoded query
    assert!(!html.contains("/thumb.png"));
    assert!(html.contains(r#"<img src="data:image/png;base64,"#));

    // comma URL replaced, data: candidate and descriptors kept as written
    assert!(!html.contains("w_300,h_200"));
    assert!(html.contains(" 1x, data:image/gif;base64,R0lGODlh 2x\""));

    // url(&quot;...&quot;) inside a style attribute
    assert!(!html.contains("/bg.png"));
    assert!(html.contains(r#"style="background:url('data:image/png;base64,"#));

    // <use href> keeps its symbol fragment
    assert!(!html.contains("/icons.svg"));
    assert!(html.contains(r#"<use href="data:image/svg+xml;base64,"#));
    assert!(html.contains("#moon\"></use>"));

    assert_eq!(result.summary.images.found, 4);
    assert_eq!(result.summary.images.fetched, 4);
    assert_eq!(result.summary.svgs.fetched, 1);
    assert_eq!(result.summary.embedded, 5);
}
