//! catalog-cache - maintenance CLI for the catalog cache.
//!
//! Runs against the backend configured in the environment (or `.env`).

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_cache::cache::{EntityKind, KeyPattern, MutationEvent, MutationKind};
use catalog_cache::{AppContext, Config};

#[derive(Debug, Parser)]
#[command(name = "catalog-cache", version, about = "Inspect and invalidate the catalog cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Purge every key a mutation could have staled
    Invalidate {
        /// song, album, playlist or user
        entity: EntityKind,
        /// create, update or delete
        mutation: MutationKind,
        id: String,
    },
    /// Delete every key matching a glob, e.g. `album:song_count:*`
    Purge { pattern: String },
    /// Print the cached value stored under a key
    Inspect { key: String },
    /// Show the TTL policy and live key counts per namespace
    Stats,
}

/// Namespaces reported by `stats`.
const STATS_NAMESPACES: &[&str] = &[
    "song",
    "album",
    "playlist",
    "user",
    "list",
    "aggregation",
    "artists",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_cache=info,mongodb=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    info!(address = %config.redis.address, enabled = config.cache_enabled, "Configuration loaded");

    let ctx = AppContext::start(config).await?;
    let result = run(&ctx, cli.command).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Invalidate { entity, mutation, id } => {
            let event = MutationEvent::new(entity, mutation, id);
            let report = ctx.cache.invalidate(&event).await?;
            println!("{event}");
            for target in &report.targets {
                let status = if target.ok { "ok" } else { "FAILED" };
                println!(
                    "  {:<40} {:>6} deleted  {status}",
                    target.target.to_string(),
                    target.deleted
                );
            }
            println!("total deleted: {}", report.deleted_total());
        }
        Command::Purge { pattern } => {
            let pattern = KeyPattern::parse(&pattern)?;
            let report = ctx.cache.purge(&pattern).await;
            println!(
                "{}: {} deleted in {} batches ({})",
                report.pattern, report.deleted, report.batches, report.outcome
            );
        }
        Command::Inspect { key } => match ctx.cache.peek(&key).await {
            Some(bytes) => match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", String::from_utf8_lossy(&bytes)),
            },
            None => println!("{key}: not cached"),
        },
        Command::Stats => {
            let policy = ctx.cache.config();
            println!("backend:      {} ({})", ctx.cache.backend_name(), ctx.config.redis.address);
            println!("single ttl:   {}", policy.single_item_ttl);
            println!("list ttl:     {}", policy.list_ttl);
            println!("aggregation:  {}", policy.aggregation_ttl);
            for namespace in STATS_NAMESPACES {
                let pattern = KeyPattern::new(namespace, "*")?;
                match ctx.cache.count(&pattern).await {
                    Some(count) => println!("  {:<16} {count}", pattern.as_str()),
                    None => println!("  {:<16} unavailable", pattern.as_str()),
                }
            }
            println!("counters:     {:?}", ctx.cache.stats());
        }
    }
    Ok(())
}
