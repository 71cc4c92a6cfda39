//! Bot of the Day CLI
//!
//! Streams the activity around one account into its event log and reports
//! the account that interacted with it most.

use anyhow::{anyhow, Context};
use botoftheday::{
    config::Config,
    core::{EventStore, TimelineSummary},
    ingest::{echo_line, ConsumeOutcome, StreamConsumer},
    platform::{PlatformApi, PlatformError, ReplayPlatform, AUTH_REMEDIATION},
    report::{PrerenderedArtifacts, PublishOutcome, Report, ReportDriver, ReportError},
    stats::{load_persisted, IngestStats, SharedStats},
    VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "botoftheday")]
#[command(version = VERSION)]
#[command(about = "Spot the account interacting most with a monitored account", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory for the event log and report artifacts
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Credentials document
    #[arg(long, global = true)]
    conf: Option<PathBuf>,

    /// Monitored account handle
    #[arg(long, global = true)]
    user: Option<String>,

    /// Replay recorded platform payloads from this directory instead of the network
    #[arg(long, global = true)]
    replay: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the live activity around the account until interrupted
    Stream,

    /// Find the top interactor and export the report series
    List,

    /// Build the report and publish it with the rendered charts
    Post {
        /// Directory holding the rendered charts (defaults to the output directory)
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show the event log and ingestion statistics
    Status,

    /// Show configuration
    Config,
}

/// Which credential set a command authenticates with.
#[derive(Debug, Clone, Copy)]
enum Tokens {
    Stream,
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        if is_auth_failure(&e) {
            eprintln!("{AUTH_REMEDIATION}");
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Stream => {
            let account = config.require_account()?;
            let api = platform(cli.replay.as_deref(), &config, Tokens::Stream)?;
            cmd_stream(&config, account, api.as_ref())
        }
        Commands::List => {
            let account = config.require_account()?;
            let api = platform(cli.replay.as_deref(), &config, Tokens::List)?;
            cmd_list(&config, account, api.as_ref())
        }
        Commands::Post { ref artifacts } => {
            let account = config.require_account()?;
            let api = platform(cli.replay.as_deref(), &config, Tokens::Stream)?;
            let dir = artifacts.clone().unwrap_or_else(|| config.output_path.clone());
            cmd_post(&config, account, api.as_ref(), &dir)
        }
        Commands::Status => cmd_status(&config),
        Commands::Config => cmd_config(&config, cli.config.as_deref()),
    }
}

/// Load the configuration file and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config =
        Config::load_from(&path).with_context(|| format!("loading configuration {path:?}"))?;

    if let Some(ref dir) = cli.path {
        config.output_path = dir.clone();
    }
    if let Some(ref conf) = cli.conf {
        config.credentials_path = conf.clone();
    }
    if let Some(ref user) = cli.user {
        config.account = Some(user.clone());
    }
    Ok(config)
}

/// Pick the platform backend for this run.
fn platform(
    replay: Option<&Path>,
    config: &Config,
    tokens: Tokens,
) -> anyhow::Result<Box<dyn PlatformApi>> {
    if let Some(dir) = replay {
        tracing::info!(dir = ?dir, "using replay platform");
        return Ok(Box::new(ReplayPlatform::new(dir)));
    }

    #[cfg(feature = "http")]
    {
        let credentials = botoftheday::config::Credentials::load(&config.credentials_path)?;
        let set = match tokens {
            Tokens::Stream => &credentials.stream,
            Tokens::List => &credentials.list,
        };
        let api = botoftheday::platform::HttpPlatform::new(config.api.clone(), set)?;
        Ok(Box::new(api))
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = (config, tokens);
        anyhow::bail!("no platform backend available: pass --replay DIR or build with the `http` feature")
    }
}

fn is_auth_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<PlatformError>(),
            Some(PlatformError::Auth(_))
        ) || matches!(
            cause.downcast_ref::<ReportError>(),
            Some(ReportError::Platform(PlatformError::Auth(_)))
        )
    })
}

fn cmd_stream(config: &Config, account: &str, api: &dyn PlatformApi) -> anyhow::Result<()> {
    println!("Bot of the Day v{VERSION}");
    println!();

    api.verify_credentials()?;
    let user = api
        .lookup_user(account)
        .with_context(|| format!("looking up @{account}"))?;

    config.ensure_directories()?;
    let store = EventStore::for_account(&config.output_path, account);
    let writer = store.open_writer()?;
    let receiver = api.open_stream(&user.id_str)?;

    let stats: SharedStats = Arc::new(IngestStats::with_persistence(
        config.output_path.join(format!("{account}.stats.json")),
    ));

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    println!("Following @{} (id {})", user.screen_name, user.id_str);
    println!("  Event log: {:?}", store.path());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let handle = StreamConsumer::new(writer, stats.clone(), running)
        .spawn(receiver, |record| println!("{}", echo_line(record)))
        .context("starting stream consumer")?;

    let report = handle
        .join()
        .map_err(|_| anyhow!("stream consumer panicked"))??;

    println!();
    match report.outcome {
        ConsumeOutcome::Cancelled => println!("Stopping stream..."),
        ConsumeOutcome::ChannelClosed => println!("Stream ended."),
    }
    println!("Recorded {} events this session", report.appended);

    if let Err(e) = stats.save() {
        tracing::warn!("could not save ingestion stats: {e}");
    }
    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_list(config: &Config, account: &str, api: &dyn PlatformApi) -> anyhow::Result<()> {
    let driver = ReportDriver::new(config, account, api)?;
    let (report, exports) = driver.list(Utc::now())?;

    print_report(&report);

    println!();
    for export in &exports {
        println!("Wrote {:?}", export.activity);
        println!("Wrote {:?}", export.mentions);
    }
    Ok(())
}

fn cmd_post(
    config: &Config,
    account: &str,
    api: &dyn PlatformApi,
    artifacts: &Path,
) -> anyhow::Result<()> {
    let driver = ReportDriver::new(config, account, api)?;
    let renderer = PrerenderedArtifacts::new(artifacts);
    let (report, outcome) = driver.post(&renderer, Utc::now())?;

    print_report(&report);
    println!();
    match outcome {
        PublishOutcome::Published { caption, media } => {
            println!("Posted: {caption}");
            println!("  Media attached: {}", media.len());
        }
        PublishOutcome::NothingToPublish => println!("Nothing to publish."),
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("Report for @{} ({})", report.account, report.date);
    println!("==========");
    match report.top_interactor {
        Some(ref top) => println!("Top interactor: @{top}"),
        None => println!("No account interacted in the window."),
    }
    println!();
    print_summary(&report.source);
    if let Some(ref target) = report.target {
        println!();
        print_summary(target);
    }
}

fn print_summary(summary: &TimelineSummary) {
    println!("@{}", summary.account);
    println!("  Posts in window: {}", summary.activity_total());
    println!("  Retweets: {}", summary.totals.retweets);
    println!("  Replies: {}", summary.totals.replies);
    println!("  Quotes: {}", summary.totals.quotes);

    let mentions = summary.top_mentions(2);
    if !mentions.is_empty() {
        println!("  Most mentioned:");
        for (name, count) in mentions {
            println!("    @{name}: {count}");
        }
    }
}

fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let account = config.require_account()?;
    let store = EventStore::for_account(&config.output_path, account);

    println!("Bot of the Day Status");
    println!("=====================");
    println!();
    println!("Account: @{account}");
    println!("Event log: {:?}", store.path());

    if store.exists() {
        let mut records = 0u64;
        let mut bad_lines = 0u64;
        for item in store.scan()? {
            match item {
                Ok(_) => records += 1,
                Err(_) => bad_lines += 1,
            }
        }
        println!("  Records: {records}");
        if bad_lines > 0 {
            println!("  Unreadable lines: {bad_lines}");
        }
    } else {
        println!("  (not created yet; run `botoftheday stream`)");
    }

    let stats_path = config.output_path.join(format!("{account}.stats.json"));
    println!();
    match load_persisted(&stats_path) {
        Ok(stats) => {
            println!("Ingestion totals (as of {}):", stats.last_updated);
            println!("  Original posts: {}", stats.originals);
            println!("  Retweets: {}", stats.retweets);
            println!("  Quotes: {}", stats.quotes);
            println!("  Replies: {}", stats.replies);
            println!("  Other stream messages: {}", stats.ignored);
        }
        Err(_) => println!("No previous stream session found."),
    }
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    match path {
        Some(path) => println!("Config file: {path:?}"),
        None => println!("Config file: {:?}", Config::config_path()),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up the Ctrl+C / SIGTERM handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("installing signal handler")
}
