mod table;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commentwatch_core::constants::now_ms;
use commentwatch_core::{
    CommentTracker, CountStore, MetadataClient, NewCommentAlert, Notifier, SubscriptionSort,
    TrackerConfig,
};

#[derive(Parser)]
#[command(name = "commentwatch")]
#[command(about = "Track thread comment counts and subscriptions")]
struct Cli {
    /// Data directory for the persisted count store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Title,
    Updated,
    Expires,
}

impl From<SortArg> for SubscriptionSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Title => SubscriptionSort::Title,
            SortArg::Updated => SubscriptionSort::Updated,
            SortArg::Expires => SubscriptionSort::Expires,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the subscription management table
    List {
        #[arg(long, value_enum, default_value_t = SortArg::Title)]
        sort: SortArg,

        /// Reverse the sort order
        #[arg(long, short = 'd')]
        descending: bool,
    },

    /// Subscribe to new-comment notifications for a thread
    Subscribe { thread_id: String },

    /// Stop notifications but keep watching the thread's count
    Unsubscribe { thread_id: String },

    /// Restart the subscription clock for a thread
    Renew { thread_id: String },

    /// Stop tracking a thread and delete its record
    Forget {
        thread_id: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Record a visit to a thread's comments page
    Visited {
        thread_id: String,

        #[arg(long)]
        url: String,

        #[arg(long)]
        title: String,

        /// Comment count shown on the page
        #[arg(long)]
        count: u64,

        /// The visit happened in a private browsing context
        #[arg(long)]
        incognito: bool,
    },

    /// Run one reconciliation pass against the metadata endpoint
    Check {
        /// Base URL of the thread metadata endpoint
        #[arg(long)]
        base_url: String,
    },

    /// Force the retention sweep
    Clean,
}

/// Prints alerts to stdout, with the unsubscribe action spelled out.
struct PrintNotifier;

impl Notifier for PrintNotifier {
    fn new_comments(&mut self, alert: NewCommentAlert) {
        println!(
            "New comments on \"{}\"\n  {}\n  unsubscribe: commentwatch unsubscribe {}",
            alert.title, alert.url, alert.thread_id
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };

    let mut tracker = CommentTracker::new(CountStore::open(&data_dir), config);
    let now = now_ms();

    match cli.command {
        Commands::List { sort, descending } => {
            let rows = tracker.subscriptions(sort.into(), descending);
            print!("{}", table::render(&rows, now));
        }
        Commands::Subscribe { thread_id } => {
            if tracker.subscribe(&thread_id, now) {
                println!(
                    "Subscribed to {} for {} days.",
                    thread_id,
                    tracker.config().subscription_length
                );
            } else {
                println!(
                    "{thread_id} is not tracked; record a visit first (commentwatch visited)."
                );
            }
        }
        Commands::Unsubscribe { thread_id } => {
            tracker.unsubscribe(&thread_id);
            println!("Unsubscribed from {thread_id}.");
        }
        Commands::Renew { thread_id } => {
            if tracker.renew(&thread_id, now) {
                println!(
                    "Subscription renewed for {} days.",
                    tracker.config().subscription_length
                );
            } else {
                println!("{thread_id} is not tracked.");
            }
        }
        Commands::Forget { thread_id, yes } => {
            if !yes && !confirm_forget(&tracker, &thread_id)? {
                println!("Aborted.");
                return Ok(());
            }
            if tracker.stop_tracking(&thread_id) {
                println!("Stopped tracking {thread_id}.");
            } else {
                println!("{thread_id} was not tracked.");
            }
        }
        Commands::Visited {
            thread_id,
            url,
            title,
            count,
            incognito,
        } => {
            if tracker.record_visit(&thread_id, &url, &title, count, now, incognito) {
                println!("Recorded visit to {thread_id} ({count} comments).");
            } else {
                println!("Visit not recorded (monitoring disabled).");
            }
        }
        Commands::Check { base_url } => {
            let fetcher = MetadataClient::new(base_url);
            let mut notifier = PrintNotifier;
            let issued = tracker.check_subscriptions(&fetcher, &mut notifier, now).await;
            tracker.maybe_clean(now);
            println!("Checked {issued} subscribed thread(s).");
        }
        Commands::Clean => {
            tracker.clean_old_counts(now);
            println!(
                "Retention sweep done; {} record(s) kept.",
                tracker.store().len()
            );
        }
    }

    Ok(())
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Could not determine a data directory; pass --data-dir")?;
    Ok(base.join("commentwatch"))
}

/// Deleting a record is destructive, so it needs an explicit yes.
fn confirm_forget(tracker: &CommentTracker, thread_id: &str) -> Result<bool> {
    let title = tracker
        .store()
        .get(thread_id)
        .map(|r| r.title.clone())
        .unwrap_or_else(|| thread_id.to_string());

    print!("Stop tracking new comments on \"{title}\"? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
