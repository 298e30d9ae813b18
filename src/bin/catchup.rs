use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use url::Url;

use rs_catchup::config;
use rs_catchup::fetch::{build_client, FallbackController, PageSource};
use rs_catchup::monitor::{SiteChecker, SiteRegistry, SiteStatus};
use rs_catchup::notify::{aggregate_badge, badge_text, SourceCounts};
use rs_catchup::schedule::{self, CheckTime};
use rs_catchup::store::{JsonFileStore, KeyValueStore};
use rs_catchup::worker::SharedParseWorker;
use rs_catchup::{feeds, Options};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "catchup.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect the post selector of a page
    Detect { url: String },
    /// Extract posts from a page
    Extract {
        url: String,
        /// Post selector; auto-detected when omitted
        #[arg(long)]
        selector: Option<String>,
    },
    /// Watch a page
    Add {
        url: String,
        /// Post selector; detected now when omitted
        #[arg(long)]
        selector: Option<String>,
    },
    /// Stop watching a page
    Remove { url: String },
    /// Change the selector of a watched page; omit it to auto-detect
    SetSelector { url: String, selector: Option<String> },
    /// List watched pages with their state
    List,
    /// Check all pages, or one by list index
    Check {
        #[arg(long)]
        index: Option<usize>,
    },
    /// Clear unread posts of one page, or of all pages
    MarkRead { url: Option<String> },
    /// Set the daily check time, e.g. `set-time 7:30 PM`
    SetTime { clock: String, period: String },
    /// Show sync storage usage
    Usage,
    /// Show the badge count
    Badge,
    /// Check daily at the configured time until Ctrl-C
    Run,
    /// Print an example config file
    ExampleConfig,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).with_context(|| format!("invalid url {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if matches!(args.command, Command::ExampleConfig) {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(cfg.data_dir()).await?);
    let registry = SiteRegistry::new(store.clone());
    let migrated = registry.migrate_local_sites().await?;
    if migrated > 0 {
        info!(migrated, "moved legacy sites to sync storage");
    }

    let options = Options::default();
    let client = build_client(&cfg.fetch_config())?;
    let worker = Arc::new(SharedParseWorker::new(options.clone()));
    let controller = Arc::new(FallbackController::new(client, worker, Arc::new(cfg.browser()), options.clone()));
    let checker = SiteChecker::new(registry.clone(), controller.clone(), options);

    match args.command {
        Command::Detect { url } => print_json(&controller.detect(&parse_url(&url)?).await?)?,
        Command::Extract { url, selector } => {
            print_json(&controller.extract(&parse_url(&url)?, selector.as_deref()).await?)?;
        }
        Command::Add { url, selector } => {
            let selector = match selector {
                Some(selector) => Some(selector),
                None => {
                    let found = controller.detect(&parse_url(&url)?).await?;
                    if found.is_none() {
                        info!(%url, "no selector detected; will retry at check time");
                    }
                    found.map(|c| c.selector)
                }
            };
            print_json(&registry.register_site(&url, selector.as_deref()).await?)?;
        }
        Command::Remove { url } => print_json(&registry.remove_site(&url).await?)?,
        Command::SetSelector { url, selector } => registry.update_selector(&url, selector.as_deref()).await?,
        Command::List => {
            let states = registry.states().await?;
            let listing: Vec<_> = registry
                .list_sites()
                .await?
                .into_iter()
                .enumerate()
                .map(|(index, site)| {
                    let state = states.get(&site.url).cloned().unwrap_or_default();
                    serde_json::json!({ "index": index, "site": site, "state": state })
                })
                .collect();
            print_json(&listing)?;
        }
        Command::Check { index: Some(index) } => print_json(&checker.check_site(index).await?)?,
        Command::Check { index: None } => print_json(&checker.check_all().await?)?,
        Command::MarkRead { url: Some(url) } => registry.mark_read(&url).await?,
        Command::MarkRead { url: None } => registry.mark_all_read().await?,
        Command::SetTime { clock, period } => {
            let check_time = CheckTime::parse(&clock, &period)?;
            let mut settings = registry.settings().await?;
            settings.check_time = check_time;
            registry.save_settings(&settings).await?;
            println!("daily check at {check_time}");
        }
        Command::Usage => print_json(&registry.usage().await?)?,
        Command::Badge => {
            let settings = registry.settings().await?;
            let states = registry.states().await?;
            let counts = SourceCounts {
                sites: states.values().map(|s| s.new_count).sum(),
                feeds: feeds::total_new_count(store.as_ref()).await?,
                platforms: Vec::new(),
            };
            let login = states.values().any(|s| s.status == SiteStatus::LoginRequired);
            let total = aggregate_badge(&counts, &settings);
            print_json(&serde_json::json!({ "total": total, "text": badge_text(total, login) }))?;
        }
        Command::Run => {
            let settings = registry.settings().await?;
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(true);
                }
            });
            schedule::run_daily(&checker, settings.check_time, rx).await;
        }
        Command::ExampleConfig => print!("{}", config::example()),
    }

    Ok(())
}
