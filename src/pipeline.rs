//! The five-step pack run: load, reveal, collect, fetch, assemble.
//!
//! Steps run once each, in order. Only [`PageSource`] differs between the
//! browser and static modes; fetching and assembly are shared.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::assemble::{assemble, Assembly};
use crate::browser::{BrowserEngineConfig, BrowserSession, LoadStrategy, RevealPlan};
use crate::error::PackError;
use crate::fetch::{FetchedResources, ResourceFetcher};
use crate::resources::{font_face_references, static_collect, ResourceKind, ResourceSet};

/// Everything read from the page before any resource is downloaded.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub html: String,
    /// Location after redirects; relative references resolve against it.
    pub final_url: Url,
    pub resources: ResourceSet,
    pub page_css: String,
    pub inline_js: String,
    /// How the page was loaded (load strategy name or "static").
    pub strategy: String,
}

/// Where page markup and resource lists come from.
#[async_trait]
pub trait PageSource: Send {
    /// Load `url` and read its markup, resources and inline content.
    async fn snapshot(&mut self, url: &Url) -> Result<PageSnapshot, PackError>;

    /// Release anything the source holds. Called on success and failure.
    async fn close(&mut self) {}
}

/// Renders the page in Chrome.
pub struct BrowserSource {
    config: BrowserEngineConfig,
    strategies: Vec<LoadStrategy>,
    reveal: Option<RevealPlan>,
    session: Option<BrowserSession>,
}

impl BrowserSource {
    pub fn new(
        config: BrowserEngineConfig,
        strategies: Vec<LoadStrategy>,
        reveal: Option<RevealPlan>,
    ) -> Self {
        Self {
            config,
            strategies,
            reveal,
            session: None,
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSource for BrowserSource {
    async fn snapshot(&mut self, url: &Url) -> Result<PageSnapshot, PackError> {
        use crate::browser::{
            collect_resources, extract_inline_js, extract_page_css, load_page, page_html, reveal,
        };

        if self.session.is_none() {
            self.session = Some(BrowserSession::start(self.config.clone()).await?);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(PackError::BrowserUnavailable("no browser session".to_string()));
        };
        let page = session.new_page().await?;

        info!("Loading page with full resource waiting...");
        let outcome = load_page(&page, url.as_str(), &self.strategies).await?;
        let final_url = Url::parse(&outcome.final_url).unwrap_or_else(|_| url.clone());

        match self.reveal {
            Some(ref plan) => reveal(&page, plan).await,
            None => info!("Skipping content reveal"),
        }

        info!("Step 1: Extracting resource URLs...");
        let resources = collect_resources(&page, &final_url).await?;
        info!("Extracting page CSS (inline + computed)...");
        let page_css = extract_page_css(&page).await;
        info!("Extracting inline JavaScript...");
        let inline_js = extract_inline_js(&page).await;
        let html = page_html(&page).await?;

        let _ = page.close().await;

        Ok(PageSnapshot {
            html,
            final_url,
            resources,
            page_css,
            inline_js,
            strategy: outcome.strategy.wait_until.describe().to_string(),
        })
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSource for BrowserSource {
    async fn snapshot(&mut self, _url: &Url) -> Result<PageSnapshot, PackError> {
        let _ = (&self.strategies, &self.reveal);
        self.session = Some(BrowserSession::start(self.config.clone()).await?);
        Err(PackError::BrowserUnavailable("no browser session".to_string()))
    }
}

/// Fetches the raw page over HTTP. No JavaScript runs.
pub struct StaticSource {
    fetcher: ResourceFetcher,
}

impl StaticSource {
    pub fn new(fetcher: ResourceFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn snapshot(&mut self, url: &Url) -> Result<PageSnapshot, PackError> {
        info!("Fetching page without a browser...");
        let page = self.fetcher.get_page(url.as_str()).await?;
        let final_url = Url::parse(&page.final_url).unwrap_or_else(|_| url.clone());
        let html = page.text().into_owned();

        info!("Step 1: Extracting resource URLs...");
        let collected = static_collect(&html, &final_url);
        for kind in ResourceKind::ALL {
            info!("   {}: {}", kind.label(), collected.resources.len(kind));
        }

        Ok(PageSnapshot {
            html,
            final_url,
            resources: collected.resources,
            page_css: collected.page_css,
            inline_js: collected.inline_js,
            strategy: "static".to_string(),
        })
    }
}

/// Knobs for the fetch and assemble steps.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Fetch images and SVGs and embed them as `data:` URIs.
    pub inline_images: bool,
    /// Cap on image (and, separately, SVG) downloads.
    pub max_images: usize,
    pub show_progress: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            inline_images: false,
            max_images: 200,
            show_progress: false,
        }
    }
}

/// Found/downloaded count for one resource kind.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct KindCount {
    pub found: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl KindCount {
    fn new(found: usize, fetched: &FetchedResources) -> Self {
        Self {
            found,
            fetched: fetched.len(),
            failed: fetched.failed(),
        }
    }
}

/// Figures reported after a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackSummary {
    pub strategy: String,
    pub styles: KindCount,
    pub scripts: KindCount,
    pub fonts: KindCount,
    pub images: KindCount,
    pub svgs: KindCount,
    /// References replaced by `data:` URIs.
    pub embedded: usize,
    pub css_len: usize,
    pub js_len: usize,
    pub html_len: usize,
}

/// The finished document plus what went into it.
#[derive(Debug, Clone)]
pub struct PackResult {
    pub html: String,
    pub final_url: Url,
    pub resources: ResourceSet,
    pub summary: PackSummary,
}

/// Load and read the page, closing the source either way.
pub async fn snapshot(source: &mut dyn PageSource, url: &Url) -> Result<PageSnapshot, PackError> {
    let result = source.snapshot(url).await;
    source.close().await;
    result
}

/// Font URLs referenced from `@font-face` rules in downloaded stylesheets.
fn discover_stylesheet_fonts(styles: &FetchedResources, resources: &mut ResourceSet) -> usize {
    let mut added = 0;
    for sheet in styles.iter() {
        let Ok(base) = Url::parse(&sheet.final_url) else {
            continue;
        };
        let text = sheet.text();
        for reference in font_face_references(&text) {
            if resources.insert(ResourceKind::Font, reference, &base) {
                added += 1;
            }
        }
    }
    added
}

/// Run the whole pipeline against `url`.
pub async fn run(
    source: &mut dyn PageSource,
    fetcher: &ResourceFetcher,
    url: &Url,
    options: &PackOptions,
) -> Result<PackResult, PackError> {
    let PageSnapshot {
        html,
        final_url,
        mut resources,
        page_css,
        inline_js,
        strategy,
    } = snapshot(source, url).await?;

    let progress = options.show_progress;

    info!("Step 2: Downloading CSS files...");
    let styles = fetcher
        .fetch_all(ResourceKind::Style, resources.urls(ResourceKind::Style), None, progress)
        .await;

    let added = discover_stylesheet_fonts(&styles, &mut resources);
    if added > 0 {
        info!("   Found {} more fonts in downloaded stylesheets", added);
    }

    info!("Step 3: Downloading font files...");
    let fonts = fetcher
        .fetch_all(ResourceKind::Font, resources.urls(ResourceKind::Font), None, progress)
        .await;

    info!("Step 4: Downloading JavaScript files...");
    let scripts = fetcher
        .fetch_all(ResourceKind::Script, resources.urls(ResourceKind::Script), None, progress)
        .await;

    let (images, svgs) = if options.inline_images {
        info!("Step 5: Downloading images...");
        let images = fetcher
            .fetch_all(
                ResourceKind::Image,
                resources.urls(ResourceKind::Image),
                Some(options.max_images),
                progress,
            )
            .await;
        let svgs = fetcher
            .fetch_all(
                ResourceKind::Svg,
                resources.urls(ResourceKind::Svg),
                Some(options.max_images),
                progress,
            )
            .await;
        (images, svgs)
    } else {
        (FetchedResources::new(), FetchedResources::new())
    };

    let summary_counts = (
        KindCount::new(resources.len(ResourceKind::Style), &styles),
        KindCount::new(resources.len(ResourceKind::Script), &scripts),
        KindCount::new(resources.len(ResourceKind::Font), &fonts),
        KindCount::new(resources.len(ResourceKind::Image), &images),
        KindCount::new(resources.len(ResourceKind::Svg), &svgs),
    );

    let mut embeds = fonts;
    embeds.extend(images);
    embeds.extend(svgs);

    info!("Building final HTML...");
    let assembled = assemble(
        &html,
        &Assembly {
            base: &final_url,
            styles: &styles,
            scripts: &scripts,
            page_css: &page_css,
            inline_js: &inline_js,
            embeds: &embeds,
        },
    );

    let (styles_count, scripts_count, fonts_count, images_count, svgs_count) = summary_counts;
    let summary = PackSummary {
        strategy,
        styles: styles_count,
        scripts: scripts_count,
        fonts: fonts_count,
        images: images_count,
        svgs: svgs_count,
        embedded: assembled.embedded,
        css_len: assembled.css_len,
        js_len: assembled.js_len,
        html_len: assembled.html.len(),
    };

    Ok(PackResult {
        html: assembled.html,
        final_url,
        resources,
        summary,
    })
}
