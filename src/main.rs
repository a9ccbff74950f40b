use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

use feedscan::config::Config;
use feedscan::feed::{DatePolicy, Feed, FeedParser};
use feedscan::fetch::fetch_feed;
use feedscan::util::strip_control_chars;

/// Unix `date` layout, with a numeric offset where `date` prints a zone name.
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %z %Y";

#[derive(Parser, Debug)]
#[command(
    name = "feedscan",
    version,
    about = "Fetch an RSS or Atom feed and print its items"
)]
struct Args {
    /// Feed URL, or `-` to read the document from stdin
    url: String,

    /// Config file (defaults to ~/.config/feedscan/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the parsed feed as JSON
    #[arg(long)]
    json: bool,

    /// What to do with unparseable dates: abort or fallback
    #[arg(long, value_name = "POLICY")]
    date_policy: Option<DatePolicy>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load(&path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => Config::default(),
        },
    };

    if let Some(policy) = args.date_policy {
        config.date_policy = policy;
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }
    Ok(config)
}

async fn read_feed(args: &Args, config: &Config) -> Result<Feed> {
    let parser = FeedParser::new(config.parser_options());

    if args.url == "-" {
        return tokio::task::spawn_blocking(move || parser.parse(io::stdin().lock()))
            .await
            .context("Parser task failed")?
            .context("Failed to parse feed from stdin");
    }

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;

    tracing::info!(url = %args.url, "Fetching feed");
    let bytes = fetch_feed(&client, &args.url, &config.fetch_options())
        .await
        .with_context(|| format!("Failed to fetch {}", args.url))?;

    parser
        .parse_bytes(&bytes)
        .with_context(|| format!("Failed to parse feed from {}", args.url))
}

fn print_feed(out: &mut impl Write, feed: &Feed) -> io::Result<()> {
    writeln!(out, "{}", strip_control_chars(&feed.title))?;
    writeln!(out, "{}", strip_control_chars(&feed.subtitle))?;
    writeln!(out, "{}", strip_control_chars(&feed.link))?;

    for item in &feed.items {
        writeln!(out)?;
        writeln!(out, "{}", strip_control_chars(&item.id))?;
        writeln!(out, "{}", strip_control_chars(&item.title))?;
        writeln!(out, "{}", strip_control_chars(&item.link))?;
        writeln!(out, "{}", item.when.with_timezone(&Local).format(TIME_FORMAT))?;
        writeln!(out, "{}", strip_control_chars(&item.description))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let feed = read_feed(&args, &config).await?;
    tracing::info!(items = feed.items.len(), "Feed parsed");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &feed).context("Failed to serialize feed")?;
        writeln!(out)?;
    } else {
        print_feed(&mut out, &feed)?;
    }
    out.flush()?;
    Ok(())
}
