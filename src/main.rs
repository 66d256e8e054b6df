use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use val_tracker::api::state::AppState;
use val_tracker::cache::ResponseCache;
use val_tracker::calculate::{aggregate, format_ratio};
use val_tracker::config::AppConfig;
use val_tracker::fetch::{HttpMatchSource, UpstreamClient};
use val_tracker::models::{Region, RiotId};
use val_tracker::parse_duration;
use val_tracker::profile::{ProfileAssembler, UpstreamRankSource};
use val_tracker::storage::{JsonlStore, MemoryStore, StorageConfig, Store};

#[derive(Parser)]
#[command(name = "val-tracker")]
#[command(about = "Player statistics tracker backed by a third-party match-data API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Response cache TTL (e.g., "300s", "5m")
    #[arg(long)]
    cache_ttl: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Keep everything in memory instead of under the data directory
        #[arg(long)]
        memory: bool,
    },

    /// Build and print a player profile
    Profile {
        /// Game name
        name: String,

        /// Tag line
        tag: String,

        /// Region (eu, na, ap, kr, latam, br)
        #[arg(long)]
        region: Option<String>,

        /// Don't persist the result
        #[arg(long)]
        no_store: bool,
    },

    /// List a player's recent matches with a summary
    Matches {
        name: String,

        tag: String,

        #[arg(long)]
        region: Option<String>,

        /// Number of matches to fetch
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Show the top of a regional leaderboard
    Leaderboard {
        #[arg(long)]
        region: Option<String>,

        /// Rows to print
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(Path::new(&cli.config))
        .with_context(|| format!("Failed to load {}", cli.config))?;

    if let Some(ref data_dir) = cli.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(ref ttl) = cli.cache_ttl {
        let ttl = parse_duration(ttl)
            .with_context(|| format!("Invalid --cache-ttl (expected e.g. 300s, 5m): {}", ttl))?;
        config.cache.ttl_seconds = ttl.as_secs();
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_client(config: &AppConfig) -> Result<Arc<UpstreamClient>> {
    let api_key = config.upstream.api_key();
    if api_key.is_none() {
        tracing::warn!(
            "{} is not set; upstream requests will be unauthenticated",
            config.upstream.api_key_env
        );
    }

    let source = HttpMatchSource::new(&config.upstream, api_key)?;
    let cache = ResponseCache::from_config(&config.cache);
    Ok(Arc::new(UpstreamClient::from_config(
        Arc::new(source),
        cache,
        &config.upstream,
    )))
}

fn build_assembler(
    config: &AppConfig,
    client: Arc<UpstreamClient>,
    store: Option<Arc<dyn Store>>,
) -> ProfileAssembler {
    let assembler = ProfileAssembler::new(client.clone())
        .with_rank_source(Arc::new(UpstreamRankSource::new(client)))
        .with_recent_window(config.profile.recent_window);
    match store {
        Some(store) => assembler.with_store(store),
        None => assembler,
    }
}

fn parse_region(region: Option<&str>, default: Region) -> Result<Region> {
    match region {
        Some(r) => Ok(r.parse()?),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting val-tracker v{}", env!("CARGO_PKG_VERSION"));

    let storage = StorageConfig::new(config.data_dir.clone());
    let default_region = config.profile.default_region;

    match cli.command {
        Commands::Serve { host, port, memory } => {
            let client = build_client(&config)?;
            let store: Arc<dyn Store> = if memory {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(JsonlStore::new(storage))
            };
            let assembler = build_assembler(&config, client.clone(), Some(store.clone()));

            let state = AppState {
                client,
                assembler: Arc::new(assembler),
                store,
                default_region,
                cors_origin: config.server.cors_origin.clone(),
            };
            let app = val_tracker::api::build_router(state);

            let addr = format!(
                "{}:{}",
                host.unwrap_or_else(|| config.server.host.clone()),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!("Listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await?;
        }
        Commands::Profile {
            name,
            tag,
            region,
            no_store,
        } => {
            let riot_id = RiotId::from_parts(&name, &tag)?;
            let region = parse_region(region.as_deref(), default_region)?;
            let client = build_client(&config)?;
            let store: Option<Arc<dyn Store>> = if no_store {
                None
            } else {
                Some(Arc::new(JsonlStore::new(storage)))
            };

            let profile = build_assembler(&config, client, store)
                .build_profile(&riot_id.game_name, &riot_id.tag_line, region)
                .await?;

            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Matches {
            name,
            tag,
            region,
            count,
        } => {
            let riot_id = RiotId::from_parts(&name, &tag)?;
            let region = parse_region(region.as_deref(), default_region)?;
            let client = build_client(&config)?;

            let identity = client
                .resolve_account(&riot_id.game_name, &riot_id.tag_line, region)
                .await?;
            let recent = client
                .fetch_recent_matches_with_details(&identity.puuid, identity.region, count)
                .await?;
            let stats = aggregate(&recent.matches, &identity.puuid);

            println!("\n=== {} ({}) ===", identity.riot_id, identity.region);
            for summary in &stats.recent_matches {
                println!(
                    "{}  {:<12} {:<10} {:<5} {:>2}/{:>2}/{:>2}  {}-{}",
                    summary.started_at.format("%Y-%m-%d %H:%M"),
                    summary.map,
                    summary.agent,
                    summary.outcome,
                    summary.kills,
                    summary.deaths,
                    summary.assists,
                    summary.rounds_won,
                    summary.rounds_lost
                );
            }
            println!();
            println!("Matches:       {}", stats.total_matches);
            println!(
                "Record:        {}W {}L {}D",
                stats.wins, stats.losses, stats.draws
            );
            println!("K/D:           {}", format_ratio(stats.kd, 2));
            println!("Win rate:      {}%", format_ratio(stats.win_rate, 1));
            println!("Headshot %:    {}", format_ratio(stats.headshot_percentage, 1));
            if recent.is_partial() {
                println!(
                    "\n{} of {} matches could not be fetched",
                    recent.dropped, recent.requested
                );
            }
        }
        Commands::Leaderboard { region, limit } => {
            let region = parse_region(region.as_deref(), default_region)?;
            let client = build_client(&config)?;
            let board = client.leaderboard(region).await?;

            let rows = board.as_array().cloned().unwrap_or_default();
            println!("\n=== Leaderboard ({}) ===", region);
            for row in rows.iter().take(limit) {
                println!(
                    "{:>5}  {}#{}  {}",
                    row["leaderboardRank"].as_u64().unwrap_or(0),
                    row["gameName"].as_str().unwrap_or("?"),
                    row["tagLine"].as_str().unwrap_or("?"),
                    row["rankedRating"].as_u64().unwrap_or(0)
                );
            }
            if rows.is_empty() {
                println!("No entries");
            }
        }
    }

    Ok(())
}
