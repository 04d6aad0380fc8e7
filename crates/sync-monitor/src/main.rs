//! sync-monitor: Replay SyncDaemon queue events and show the resulting tree.
//!
//! Reads a JSON-lines recording of queue additions/removals, feeds it through
//! a monitoring session exactly as live backend signals would be, and prints
//! the queue tree.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use queue_content::clock::now_ms;
use queue_content::{InternalOp, RootSnapshot};
use sync_monitor::replay::{open_events, read_events};
use sync_monitor::summary::render_tree;
use sync_monitor::{Config, QueueSession, ReplayBackend};

#[derive(Parser, Debug)]
#[command(name = "sync-monitor")]
#[command(about = "Replay SyncDaemon queue events and show the queue tree")]
struct Args {
    /// JSON-lines file of queue events ("-" for stdin)
    #[arg(short, long)]
    events: PathBuf,

    /// Home directory (defaults to SYNC_MONITOR_HOME, then the user's home)
    #[arg(long)]
    home: Option<String>,

    /// Directory where shares are shown
    #[arg(long, requires = "share_real")]
    share_link: Option<String>,

    /// Directory where shares live on disk
    #[arg(long, requires = "share_link")]
    share_real: Option<String>,

    /// Remove finished operations before printing
    #[arg(long)]
    clear: bool,

    /// Print a JSON snapshot instead of the text tree
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// JSON output of a replay.
#[derive(Serialize)]
struct Report {
    node_ops: Vec<RootSnapshot>,
    internal_ops: Vec<InternalOp>,
    transferring: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,sync_monitor=debug,queue_content=debug"
    } else {
        "info,sync_monitor=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match args.home {
        Some(home) => Config::for_home(home),
        None => Config::from_env()?,
    };
    if let (Some(link), Some(real)) = (args.share_link, args.share_real) {
        config.share_link = link;
        config.share_real = real;
    }
    info!("Home: {:?}", config.home);

    let events = read_events(open_events(&args.events)?)?;
    info!("Replaying {} queue event(s) from {}", events.len(), args.events.display());

    let backend = Arc::new(ReplayBackend::new(&config.share_link, &config.share_real));
    let mut session = QueueSession::new(config.home.clone(), backend, config.poll_interval);

    let notified = Arc::new(AtomicUsize::new(0));
    let notified_clone = Arc::clone(&notified);
    let _sub = session.events().subscribe(move |event| {
        notified_clone.fetch_add(1, Ordering::Relaxed);
        debug!("Session event: {:?}", event);
    });

    session.load_initial().await?;
    for event in events {
        session.handle(event);
    }
    if args.clear {
        session.clear();
    }
    session.shutdown();
    info!("Replay done, {} notification(s)", notified.load(Ordering::Relaxed));

    let content = session.content();
    if args.json {
        let report = Report {
            node_ops: content.node_ops(),
            internal_ops: content.internal_ops().to_vec(),
            transferring: content.transferring(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_tree(&content.node_ops(), now_ms()));
        println!(
            "{} internal operation event(s), transferring: {}",
            content.internal_ops().len(),
            content.transferring()
        );
    }

    Ok(())
}
