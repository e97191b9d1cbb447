use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use eoka::{Browser, StealthConfig};
use eoka_locator::{EokaHost, LocatorConfig, PageSession, Resolution};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-locator")]
#[command(about = "Index a page and resolve element targets")]
#[command(version)]
struct Cli {
    /// Page to open
    url: String,

    /// Target to resolve, e.g. '{"type":"button","text":"submit"}' or '[3][link]Pricing'
    /// (can be used multiple times)
    #[arg(short, long = "target", value_name = "SPEC")]
    targets: Vec<String>,

    /// Search for this before indexing the page
    #[arg(short, long, value_name = "QUERY")]
    search: Option<String>,

    /// Keys or text to send after the targets, e.g. 'enter' or 'tab, tab'
    /// (can be used multiple times)
    #[arg(short, long = "keys", value_name = "INPUT")]
    keys: Vec<String>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in headless mode
    #[arg(long)]
    headless: bool,

    /// Resolve targets without clicking
    #[arg(long)]
    dry_run: bool,

    /// Print the element list and resolutions as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let config = match cli.config {
        Some(ref path) => LocatorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LocatorConfig::default(),
    };

    let browser = Browser::launch_with_config(StealthConfig {
        headless: cli.headless,
        ..Default::default()
    })
    .await?;
    let page = browser.new_page(&cli.url).await?;

    let mut session = PageSession::with_config(EokaHost::new(page), config);

    if let Some(query) = &cli.search {
        let message = session
            .search_for(query)
            .await
            .with_context(|| format!("searching for '{}'", query))?;
        println!("{}", message);
    }

    let report = session.analyze_page().await;
    if cli.json {
        let elements = session.index().map(|i| &i.elements);
        println!("{}", serde_json::to_string_pretty(&elements)?);
    } else {
        println!("{}", report);
    }

    let mut failed = false;
    for target in &cli.targets {
        if cli.dry_run {
            match session.resolve(target).await {
                Ok(resolution) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&resolution)?);
                    } else {
                        print_resolution(target, &resolution);
                    }
                    failed |= resolution.found().is_none();
                }
                Err(e) => {
                    println!("✗ {}: {}", target, e);
                    failed = true;
                }
            }
        } else {
            let outcome = session.resolve_and_act(target).await;
            let mark = if outcome.is_success() { "✓" } else { "✗" };
            println!("{} {}", mark, outcome);
            failed |= !outcome.is_success();
        }
    }

    for input in &cli.keys {
        match session.keyboard_action(input).await {
            Ok(message) => println!("✓ {}", message),
            Err(e) => {
                println!("✗ {}: {}", input, e);
                failed = true;
            }
        }
    }

    browser.close().await?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_resolution(target: &str, resolution: &Resolution) {
    match resolution.found() {
        Some(found) => {
            let el = &found.element;
            let (x, y) = el.geometry.center();
            let score = found
                .score()
                .map(|s| format!(" score={}", s))
                .unwrap_or_default();
            println!(
                "✓ {} -> {} ({:.0}, {:.0}){}{}",
                target,
                el.marker(),
                x,
                y,
                score,
                if found.scrolled { " after scroll" } else { "" }
            );
        }
        None => println!("✗ {}: no match", target),
    }
}
