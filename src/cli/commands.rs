use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::SearchConfig;
use crate::models::{Filters, SearchPhase, Session, SessionSource};
use crate::query::{day_end, day_start};
use crate::search::{DefaultMatcher, SearchCoordinator, SearchRequest, SearchState, partition_by_size};
use crate::store::{JsonlSessionStore, discover_sessions};
use crate::utils::{format_path_with_tilde, get_home_dir, sanitize_line};

const TITLE_WIDTH: usize = 72;

#[derive(Parser)]
#[command(name = "agent-session-search")]
#[command(version = "0.1.0")]
#[command(about = "Search transcripts of AI coding-agent sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics about discovered sessions
    Stats {
        /// Directory containing the agent folders (defaults to $HOME)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Size in bytes separating small from large sessions
        #[arg(long)]
        threshold: Option<u64>,
        /// Config file to load instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Search session transcripts
    Search(SearchArgs),
}

#[derive(Args)]
pub struct SearchArgs {
    /// Free text, may embed repo:, path:, model:, since: and until: operators
    pub query: String,
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Restrict to an agent source (repeatable)
    #[arg(long = "source")]
    pub sources: Vec<SessionSource>,
    #[arg(long)]
    pub repo: Option<String>,
    #[arg(long)]
    pub path: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Only sessions modified on or after this day (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,
    /// Only sessions modified on or before this day (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,
    #[arg(long)]
    pub threshold: Option<u64>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print hits as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a str,
    source: &'a str,
    title: Option<&'a str>,
    repo: Option<&'a str>,
    cwd: Option<&'a str>,
    model: Option<&'a str>,
    modified_at: String,
    path: String,
}

impl<'a> From<&'a Session> for SearchHit<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            id: &session.id,
            source: session.source.as_str(),
            title: session.title.as_deref(),
            repo: session.repo_name.as_deref(),
            cwd: session.effective_cwd(),
            model: session.model.as_deref(),
            modified_at: session.modified_at.to_rfc3339(),
            path: session.file_path.display().to_string(),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Stats { root, threshold, config }) => {
            show_stats(root, threshold, config.as_deref())?;
        }
        Some(Commands::Search(args)) => {
            run_search(args)?;
        }
        None => {
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, threshold: Option<u64>) -> Result<SearchConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            SearchConfig::load_from(path)?
        }
        None => SearchConfig::load()?,
    };
    if let Some(threshold) = threshold {
        config.large_session_threshold_bytes = threshold;
    }
    Ok(config)
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => get_home_dir(),
    }
}

fn show_stats(root: Option<PathBuf>, threshold: Option<u64>, config: Option<&Path>) -> Result<()> {
    let config = load_config(config, threshold)?;
    let root = resolve_root(root)?;
    let sessions: Vec<Arc<Session>> = discover_sessions(&root)?.into_iter().map(Arc::new).collect();
    let tiers = partition_by_size(&sessions, config.large_session_threshold_bytes);

    println!("Agent Session Statistics");
    println!("========================");
    println!("Total sessions: {}", sessions.len());
    for source in SessionSource::ALL {
        let count = sessions.iter().filter(|s| s.source == source).count();
        if count > 0 {
            println!("  {}: {}", source, count);
        }
    }
    println!("Small sessions: {}", tiers.small.len());
    println!("Large sessions: {} (>= {} bytes)", tiers.large.len(), config.large_session_threshold_bytes);
    println!();
    println!("Root directory: {}", format_path_with_tilde(&root));

    if let Some(newest) = sessions.iter().map(|s| s.modified_at).max() {
        println!("Newest session: {}", newest.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(oldest) = sessions.iter().map(|s| s.modified_at).min() {
        println!("Oldest session: {}", oldest.format("%Y-%m-%d %H:%M:%S"));
    }

    Ok(())
}

fn build_filters(args: &SearchArgs) -> Result<Filters> {
    let date_from = match args.since.as_deref() {
        Some(value) => Some(day_start(value).with_context(|| format!("Invalid --since date: {value}"))?),
        None => None,
    };
    let date_to = match args.until.as_deref() {
        Some(value) => Some(day_end(value).with_context(|| format!("Invalid --until date: {value}"))?),
        None => None,
    };

    Ok(Filters {
        query: args.query.clone(),
        model: args.model.clone(),
        date_from,
        date_to,
        repo: args.repo.clone(),
        path: args.path.clone(),
    })
}

fn run_search(args: SearchArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.threshold)?;
    let filters = build_filters(&args)?;
    let root = resolve_root(args.root.clone())?;
    let candidates: Vec<Arc<Session>> = discover_sessions(&root)?.into_iter().map(Arc::new).collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let state = runtime.block_on(search(config, filters, args.sources.clone(), candidates));

    if args.json {
        let hits: Vec<SearchHit> = state.results.iter().map(|s| SearchHit::from(s.as_ref())).collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for session in &state.results {
            print_hit(session);
        }
    }

    let progress = state.progress;
    eprintln!(
        "{} matches; scanned {}/{} small and {}/{} large sessions",
        state.results.len(),
        progress.scanned_small,
        progress.total_small,
        progress.scanned_large,
        progress.total_large
    );

    Ok(())
}

/// Run one search to completion, reporting phase changes on stderr
async fn search(
    config: SearchConfig,
    filters: Filters,
    sources: Vec<SessionSource>,
    candidates: Vec<Arc<Session>>,
) -> SearchState {
    let store = Arc::new(JsonlSessionStore::new());
    let matcher = Arc::new(DefaultMatcher::new(config.document));
    let coordinator = SearchCoordinator::new(config, store, None, matcher);

    let mut updates = coordinator.subscribe();
    let mut handle = coordinator.start(SearchRequest::new(filters, candidates).with_sources(sources));
    let mut phase = SearchPhase::Idle;

    loop {
        tokio::select! {
            finished = &mut handle => {
                if let Err(e) = finished {
                    tracing::warn!(error = %e, "search task failed");
                }
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    let _ = (&mut handle).await;
                    break;
                }
                let current = updates.borrow_and_update().progress.phase;
                if current != phase && current != SearchPhase::Idle {
                    eprintln!("{}...", current.label());
                }
                phase = current;
            }
        }
    }

    coordinator.snapshot()
}

fn print_hit(session: &Session) {
    let title = session.title.as_deref().unwrap_or("(untitled)");
    println!(
        "{}  {:<8} {}",
        session.modified_at.format("%Y-%m-%d %H:%M"),
        session.source.as_str(),
        sanitize_line(title, TITLE_WIDTH)
    );
    println!("    {}", format_path_with_tilde(&session.file_path));
}
