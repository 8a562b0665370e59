use anyhow::{Context, Result};
use browser_textview::{Config, MergedView, PageSession};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const LINK_LIST_LIMIT: usize = 50;

/// Fetch a page and print it as a numbered, text-only interactive view.
#[derive(Parser, Debug)]
#[command(name = "browser-textview", version, about)]
struct Args {
    /// Page to open; a bare host gets https://
    url: String,

    /// TOML configuration file
    #[arg(short, long, default_value = "textview.toml")]
    config: PathBuf,

    /// Skip the LLM placement advisor
    #[arg(long)]
    no_llm: bool,

    /// Print the merged view as JSON
    #[arg(long, conflicts_with = "links")]
    json: bool,

    /// Print only the numbered links
    #[arg(long)]
    links: bool,

    /// Log filter, e.g. `info` or `browser_textview=debug`
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if args.no_llm {
        config.llm.enabled = false;
    }

    let url = normalize_url(&args.url)?;
    let session = PageSession::from_config(&config);
    info!(url = %url, advisor = session.advisor_name().unwrap_or("none"), "starting");

    let view = session.navigate(url.as_str()).await;
    for warning in &view.warnings {
        warn!(%warning, "degraded");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else if args.links {
        print_links(&view);
    } else {
        print_view(&view);
    }

    if let Some(err) = &view.error {
        anyhow::bail!("{}", err);
    }
    Ok(())
}

fn normalize_url(input: &str) -> Result<Url> {
    let input = input.trim();
    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Url::parse(&candidate).with_context(|| format!("invalid URL: {}", input))
}

fn print_view(view: &MergedView) {
    println!("{}", view.text);
    println!();
    println!("[{} interactive elements]", view.mapping.len());
}

fn print_links(view: &MergedView) {
    let links: Vec<_> = view.links().collect();
    if links.is_empty() {
        println!("No links found");
        return;
    }

    for link in links.iter().take(LINK_LIST_LIMIT) {
        println!("[{}] {}", link.number, link.label);
        if let Some(url) = &link.url {
            println!("    {}", url);
        }
    }
    if links.len() > LINK_LIST_LIMIT {
        println!("... and {} more", links.len() - LINK_LIST_LIMIT);
    }
}
