use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use diesel::SqliteConnection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use funding_history::{
    catalog::{config::load_catalog_path, sync::{SyncOptions, sync_catalog}},
    config::ServiceConfig,
    db::{connection::connect_sqlite, migrate},
    enriched::{get_multiplier, rebuild_enriched_view},
    multiplier::Horizon,
    range::TimeRange,
    resolution::Resolution,
    rollup::{RollupManager, store},
    scheduler::{self, SchedulerConfig},
    search::search_contracts,
    series::get_series,
    tz,
};

#[derive(Parser)]
#[command(version, about = "Funding-rate history CLI")]
struct Cli {
    /// Service config (TOML). Defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Overrides `database_url` from the config and `$DATABASE_URL`.
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply embedded migrations.
    Migrate,
    /// Catalog maintenance.
    Catalog(CatalogCmd),
    /// Rollup administration.
    Rollups(RollupsCmd),
    /// Enriched view maintenance.
    Enriched(EnrichedCmd),
    /// Print the composited series of one contract.
    Series {
        #[arg(long)]
        contract: uuid::Uuid,
        /// RFC-3339 start (inclusive); default 30 days ago.
        #[arg(long)]
        start: Option<String>,
        /// RFC-3339 end (exclusive); default now.
        #[arg(long)]
        end: Option<String>,
    },
    /// Print one materialized multiplier.
    Multiplier {
        #[arg(long)]
        contract: uuid::Uuid,
        #[arg(long, default_value = "1d")]
        horizon: Horizon,
    },
    /// Rank contracts for a free-text query.
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Run the refresh and retention scheduler until Ctrl-C.
    Serve,
}

#[derive(Args)]
struct CatalogCmd {
    #[command(subcommand)]
    sub: CatalogSub,
}

#[derive(Subcommand)]
enum CatalogSub {
    Sync {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        prune: bool,
    },
}

#[derive(Args)]
struct RollupsCmd {
    #[command(subcommand)]
    sub: RollupsSub,
}

#[derive(Subcommand)]
enum RollupsSub {
    /// Define, backfill, schedule and retain every tier from the configured policies.
    Install,
    /// Recompute whole buckets in `[start, end)`.
    Backfill {
        #[arg(long)]
        resolution: Resolution,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Run one refresh tick now.
    Tick {
        #[arg(long)]
        resolution: Resolution,
    },
    /// Run one retention sweep now.
    Sweep {
        #[arg(long)]
        resolution: Resolution,
    },
    /// Show stored policies and their last runs.
    Status,
}

#[derive(Args)]
struct EnrichedCmd {
    #[command(subcommand)]
    sub: EnrichedSub,
}

#[derive(Subcommand)]
enum EnrichedSub {
    Rebuild,
}

fn open(url: &str) -> Result<SqliteConnection> {
    connect_sqlite(url).with_context(|| format!("open {url}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => ServiceConfig::load_path(path)?,
        None => ServiceConfig::default(),
    };
    let db_url = match cli.database_url {
        Some(url) => url,
        None => cfg.database_url()?,
    };
    let manager = RollupManager::new();

    match cli.cmd {
        Cmd::Migrate => {
            migrate::run_all(&db_url)?;
            info!(database = %db_url, "migrations applied");
        }
        Cmd::Catalog(CatalogCmd {
            sub: CatalogSub::Sync { file, dry_run, prune },
        }) => {
            let cat = load_catalog_path(&file)?;
            let mut conn = open(&db_url)?;
            let diff = sync_catalog(&mut conn, cat, SyncOptions { dry_run, prune })?;
            print!("{diff}");
        }
        Cmd::Rollups(RollupsCmd { sub }) => {
            let mut conn = open(&db_url)?;
            match sub {
                RollupsSub::Install => {
                    let policies = cfg.policies()?;
                    for r in manager.install(&mut conn, &policies, Utc::now())? {
                        println!("{}: {} buckets from {} points", r.resolution, r.buckets_written, r.points_read);
                    }
                }
                RollupsSub::Backfill { resolution, start, end } => {
                    let range = TimeRange::new(tz::parse_ts_to_utc(&start)?, tz::parse_ts_to_utc(&end)?)?;
                    let r = manager.backfill_range(&mut conn, resolution, range)?;
                    println!("{}: replaced {} with {} buckets", r.resolution, r.buckets_replaced, r.buckets_written);
                }
                RollupsSub::Tick { resolution } => {
                    let r = manager.run_refresh_tick(&mut conn, resolution, Utc::now())?;
                    println!("{resolution}: {} buckets refreshed", r.backfill.buckets_written);
                }
                RollupsSub::Sweep { resolution } => {
                    let r = manager.run_retention_sweep(&mut conn, resolution, Utc::now())?;
                    println!("{resolution}: {} buckets older than {} deleted", r.deleted, tz::to_rfc3339_millis(r.cutoff));
                }
                RollupsSub::Status => {
                    for p in store::refresh_policy_rows(&mut conn)? {
                        println!(
                            "refresh   {:>3}  window {}s..{}s every {}s  last_run={} last_error={}",
                            p.resolution,
                            p.start_offset_secs,
                            p.end_offset_secs,
                            p.schedule_interval_secs,
                            p.last_run_at.as_deref().unwrap_or("-"),
                            p.last_error.as_deref().unwrap_or("-"),
                        );
                    }
                    for p in store::retention_policy_rows(&mut conn)? {
                        println!(
                            "retention {:>3}  horizon {}s  last_run={}",
                            p.resolution,
                            p.horizon_secs,
                            p.last_run_at.as_deref().unwrap_or("-"),
                        );
                    }
                }
            }
        }
        Cmd::Enriched(EnrichedCmd { sub: EnrichedSub::Rebuild }) => {
            let mut conn = open(&db_url)?;
            let r = rebuild_enriched_view(&mut conn)?;
            println!("upserted {} removed {}", r.upserted, r.removed);
        }
        Cmd::Series { contract, start, end } => {
            let now = Utc::now();
            let start = start.map(|s| tz::parse_ts_to_utc(&s)).transpose()?.unwrap_or(now - Duration::days(30));
            let end = end
                .map(|s| tz::parse_ts_to_utc(&s))
                .transpose()?
                .unwrap_or(now + Duration::milliseconds(1));
            let mut conn = open(&db_url)?;
            for p in get_series(&mut conn, contract, TimeRange::new(start, end)?)? {
                println!("{}\t{}\t{}", tz::to_rfc3339_millis(p.timestamp), p.avg_funding_rate, p.tier);
            }
        }
        Cmd::Multiplier { contract, horizon } => {
            let mut conn = open(&db_url)?;
            match get_multiplier(&mut conn, contract, horizon)? {
                Some(m) => println!("{m}"),
                None => anyhow::bail!("contract {contract} is not in the enriched view"),
            }
        }
        Cmd::Search { query, limit } => {
            let mut conn = open(&db_url)?;
            for hit in search_contracts(&mut conn, &query, limit)? {
                let c = &hit.contract;
                println!("{:>6}  {}/{}/{}  {}", hit.score, c.asset_name, c.section_name, c.quote_name, c.id);
            }
        }
        Cmd::Serve => {
            let policies = cfg.policies()?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async move {
                let handle = scheduler::spawn(
                    Arc::new(manager),
                    SchedulerConfig {
                        database_url: db_url,
                        policies,
                        retention_sweep_interval: cfg.retention_sweep_interval,
                    },
                )?;
                tokio::signal::ctrl_c().await?;
                info!("shutting down");
                handle.shutdown().await;
                anyhow::Ok(())
            })?;
        }
    }

    Ok(())
}
