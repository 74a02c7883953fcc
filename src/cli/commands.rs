//! CLI definition and the pack command.

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use console::{style, Term};

use crate::browser::RevealPlan;
use crate::config::{load_settings, Settings};
use crate::pipeline::{self, BrowserSource, PackOptions, PageSource, StaticSource};

use super::helpers::{normalize_url, print_summary, write_output, write_stdout};

#[derive(Parser, Debug)]
#[command(name = "pagepack")]
#[command(about = "Render a web page and pack it into one self-contained HTML file")]
#[command(version)]
pub struct Cli {
    /// Page to pack; `https://` is assumed when no scheme is given
    pub url: Option<String>,

    /// Write the HTML to FILE instead of stdout
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Write the HTML into DIR, named after the page's host and path
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Download images and SVGs and embed them as data URIs
    #[arg(long)]
    pub inline_images: bool,

    /// Maximum images to download (default: 200)
    #[arg(long, value_name = "N")]
    pub max_images: Option<usize>,

    /// Skip resources larger than this many bytes (default: 10 MiB)
    #[arg(long, value_name = "BYTES")]
    pub max_resource_bytes: Option<u64>,

    /// Seconds to wait for dynamic content after load (default: 20)
    #[arg(long, value_name = "SECS")]
    pub settle: Option<u64>,

    /// Scroll and reveal without pausing
    #[arg(long)]
    pub fast: bool,

    /// Skip scrolling and revealing hidden content
    #[arg(long)]
    pub no_reveal: bool,

    /// Fetch the raw HTML over HTTP without running a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Connect to a running Chrome (e.g., ws://localhost:9222)
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Extra Chrome argument (repeatable)
    #[arg(long = "chrome-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub chrome_args: Vec<String>,

    /// Proxy for the browser and downloads (e.g., socks5://127.0.0.1:1080)
    #[arg(long)]
    pub proxy: Option<String>,

    /// User agent, or "impersonate" for a real browser agent
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Per-request download timeout in seconds (default: 60)
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Attempts per resource download (default: 5)
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Print the collected resource URLs as JSON instead of HTML
    #[arg(long, conflicts_with_all = ["output", "output_dir"])]
    pub list_resources: bool,

    /// Config file (TOML, YAML or JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

impl Cli {
    /// Flags take precedence over config and environment.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(secs) = self.request_timeout {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            settings.retry.max_attempts = retries.max(1);
        }
        if let Some(max) = self.max_images {
            settings.max_images = max;
        }
        if let Some(max) = self.max_resource_bytes {
            settings.max_resource_bytes = max;
        }
        if let Some(secs) = self.settle {
            settings.settle = Duration::from_secs(secs);
        }
        if self.inline_images {
            settings.inline_images = true;
        }
        if self.headed {
            settings.headless = false;
        }
        if let Some(ref remote) = self.remote_url {
            settings.remote_url = Some(remote.clone());
        }
        if let Some(ref proxy) = self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        settings.chrome_args.extend(self.chrome_args.iter().cloned());
    }

    /// Reveal sequence for this run, or `None` with `--no-reveal`.
    pub fn reveal_plan(&self, settings: &Settings) -> Option<RevealPlan> {
        if self.no_reveal {
            return None;
        }
        let plan = if self.fast {
            RevealPlan::fast()
        } else {
            RevealPlan::default().with_settle(settings.settle)
        };
        Some(match self.settle {
            Some(secs) => plan.with_settle(Duration::from_secs(secs)),
            None => plan,
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(raw_url) = cli.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        eprintln!("{} No URL provided", style("✗").red());
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(1);
    };
    let url = normalize_url(raw_url)?;

    let mut settings = load_settings(cli.config.as_deref()).await?;
    cli.apply_to_settings(&mut settings);

    let fetcher = settings.fetcher(url.as_str())?;
    let mut source: Box<dyn PageSource> = if cli.no_browser {
        Box::new(StaticSource::new(fetcher.clone()))
    } else {
        Box::new(BrowserSource::new(
            settings.browser_config(),
            settings.strategies.clone(),
            cli.reveal_plan(&settings),
        ))
    };

    eprintln!("{} {}", style("Packing").cyan().bold(), url);

    if cli.list_resources {
        let snapshot = pipeline::snapshot(source.as_mut(), &url).await?;
        write_stdout(&serde_json::to_string_pretty(&snapshot.resources)?).await?;
        return Ok(());
    }

    let options = PackOptions {
        inline_images: settings.inline_images,
        max_images: settings.max_images,
        show_progress: !cli.verbose && Term::stderr().is_term(),
    };
    let result = pipeline::run(source.as_mut(), &fetcher, &url, &options).await?;

    let written = write_output(
        &result.html,
        cli.output.as_deref(),
        cli.output_dir.as_deref(),
        &result.final_url,
    )
    .await?;
    print_summary(&result.summary, written.as_deref());

    Ok(())
}
