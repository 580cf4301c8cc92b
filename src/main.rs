use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use feedstate::config::Config;
use feedstate::model::{CategoryGroup, FilterMode};
use feedstate::reactive::{Atom, Runtime};
use feedstate::storage::{Database, StorageError};
use feedstate::FeedStore;

/// Get the config directory path (~/.config/feedstate/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedstate"))
}

#[derive(Parser, Debug)]
#[command(name = "feedstate", about = "Inspect the derived feed view of a feed database")]
struct Args {
    /// Config file (defaults to ~/.config/feedstate/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides `database_path`
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Filter to apply: all, unread or starred
    #[arg(long)]
    filter: Option<FilterMode>,

    /// Include feeds marked hidden
    #[arg(long)]
    show_hidden: bool,

    /// Print JSON instead of a listing
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load feeds and print them grouped by category (default)
    Show,

    /// Subscribe to a feed, then show the result
    Add {
        title: String,
        url: String,
        /// Category name, created if missing
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    filter: FilterMode,
    total_unread: u64,
    total_starred: u64,
    categories: &'a [CategoryGroup],
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match args.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            config_dir.join("feeds.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StorageError::InstanceLocked) => {
            eprintln!("Error: Another instance appears to be using {}.", db_path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    if let Some(Command::Add { title, url, category }) = &args.command {
        db.init().await.context("Failed to initialize database")?;
        let feed_id = db
            .insert_feed(url, title, None)
            .await
            .context("Failed to add feed")?;
        if let Some(name) = category {
            let category_id = db
                .create_category(name)
                .await
                .context("Failed to create category")?;
            db.move_feed_to_category(feed_id, Some(category_id))
                .await
                .context("Failed to categorize feed")?;
        }
        tracing::info!(feed_id, url = %url, "Feed added");
    }

    let runtime = Runtime::new();
    let settings = Atom::new(&runtime, config.settings_with_overrides(args.show_hidden));
    let filter = Atom::new(&runtime, args.filter.unwrap_or_else(|| config.filter_mode()));
    let store = FeedStore::new(&runtime, settings, filter);

    store
        .load_feeds(&db)
        .await
        .context("Failed to load feeds")?;

    let groups: Arc<Vec<CategoryGroup>> = store.feeds_by_category.get();
    let report = Report {
        filter: store.filter.get(),
        total_unread: store.total_unread_count.get(),
        total_starred: store.total_starred_count.get(),
        categories: &groups,
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", out);
    } else {
        print_report(&report);
    }

    db.close().await;
    Ok(())
}

fn print_report(report: &Report<'_>) {
    println!(
        "{} unread, {} starred (filter: {})",
        report.total_unread, report.total_starred, report.filter
    );
    if report.categories.is_empty() {
        println!("No feeds to show.");
        return;
    }
    for group in report.categories {
        println!();
        println!("{}", group.title);
        for feed in &group.feeds {
            println!(
                "  {:<40} {:>5} unread {:>4} starred  {}",
                feed.title, feed.unread_count, feed.starred_count, feed.url
            );
        }
    }
}
