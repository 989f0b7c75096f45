use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use suntally::config::parse_offset;
use suntally::dates::format_ts;
use suntally::error::{LedgerError, Result};
use suntally::export::{ExportGenerator, ExportOutcome};
use suntally::interfaces::directory::EchoResolver;
use suntally::ledger::EventLedger;
use suntally::stats::StatsAggregator;
use time::UtcOffset;

#[derive(Parser, Debug)]
#[command(name = "suntally")]
#[command(about = "Sales-activity ledger operator CLI")]
struct Cli {
    #[arg(long, env = "SUNTALLY_DB", default_value = "./data/suntally.db")]
    db: String,

    /// Civil-day boundary offset, e.g. "-05:00"; defaults to local time.
    #[arg(long)]
    utc_offset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the newest ledger rows.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Show the daily/weekly/monthly rollups and the setter leaderboard.
    Stats,
    /// Write the full ledger as CSV.
    Export {
        #[arg(long)]
        out: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,suntally=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let offset = cli
        .utc_offset
        .as_deref()
        .and_then(parse_offset)
        .unwrap_or_else(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC));
    let ledger = Arc::new(EventLedger::open(&cli.db).await?);

    match cli.command {
        Commands::Recent { limit } => {
            let rows = ledger.list_recent(limit).await?;
            if rows.is_empty() {
                println!("ledger is empty");
                return Ok(());
            }
            for event in rows {
                let business = event
                    .set_at
                    .map(|ts| format!("  set for {}", format_ts(ts, offset)))
                    .unwrap_or_default();
                println!(
                    "{}  {}  {}  by {}{}",
                    style(format!("#{}", event.id)).bold(),
                    event.kind,
                    event.customer_name,
                    event.actor_id,
                    business,
                );
            }
        }
        Commands::Stats => {
            let stats = StatsAggregator::new(ledger, offset);
            let snapshot = stats.snapshot().await?;
            println!("{}", style("suntally rollups").bold());
            println!("daily sets:       {}", snapshot.daily_sets);
            println!("weekly closes:    {}", snapshot.weekly_closes);
            println!("monthly closes:   {}", snapshot.monthly_closes);
            println!("monthly installs: {}", snapshot.monthly_installs);
            if !snapshot.leaderboard.is_empty() {
                println!("{}", style("today's setters").bold());
                for (actor_id, count) in snapshot.leaderboard {
                    println!("  {actor_id}: {count}");
                }
            }
        }
        Commands::Export { out } => {
            let exporter = ExportGenerator::new(ledger, Arc::new(EchoResolver), offset);
            match exporter.generate().await? {
                ExportOutcome::Empty => println!("ledger is empty, nothing to export"),
                ExportOutcome::Ready(export) => {
                    let path = out.unwrap_or_else(|| export.filename.clone());
                    std::fs::write(&path, export.csv)
                        .map_err(|e| LedgerError::Store(e.to_string()))?;
                    println!("wrote {} rows to {}", export.rows, path);
                }
            }
        }
    }
    Ok(())
}
