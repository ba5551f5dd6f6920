use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use scriptdock::catalog::{self, Script, Warehouse};
use scriptdock::cron;
use scriptdock::logs::LogReader;
use scriptdock::notify::NotificationCenter;
use scriptdock::registry::JobRegistry;
use scriptdock::store::{HttpJobStore, LogEntry, LogQuery};

#[derive(Parser)]
#[command(
    name = "scriptdock",
    about = "Operator console for warehouse data-processing scripts",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the remote job store API
    #[arg(long, default_value = "http://127.0.0.1:8080/api")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the warehouses in the catalog
    Warehouses,

    /// Show a warehouse's scripts reconciled against the job store
    Scripts {
        /// Warehouse id
        #[arg(long)]
        warehouse: String,
    },

    /// Run a script immediately
    RunNow {
        /// Warehouse id
        #[arg(long)]
        warehouse: String,

        /// Script id
        #[arg(long)]
        script: String,
    },

    /// Pause or resume a script's recurring schedule
    Toggle {
        /// Script id
        #[arg(long)]
        script: String,
    },

    /// Update a script's cron schedule
    Reschedule {
        /// Script id
        #[arg(long)]
        script: String,

        /// Five-field cron expression. Common choices: "0 0 * * *" (daily at
        /// midnight), "0 * * * *" (hourly), "0 2 * * 0" (Sunday 2am),
        /// "0 9 * * 1" (Monday 9am)
        #[arg(long)]
        cron: String,
    },

    /// Show a script's recent execution logs
    Logs {
        /// Script id
        #[arg(long)]
        script: String,

        /// Only entries from the last N hours
        #[arg(long)]
        hours: Option<u32>,

        /// Only entries at this level
        #[arg(long)]
        level: Option<String>,

        /// Keep polling for new entries every 5 seconds
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = Arc::new(HttpJobStore::new(cli.api_url.clone()));
    let notices = NotificationCenter::new();
    let registry = JobRegistry::new(store.clone(), notices.clone());

    let outcome = run_command(cli.command, &registry, store).await;

    // Surface every queued outcome before the session ends.
    for notice in notices.snapshot() {
        println!("[{}] {}", notice.severity, notice.message);
    }
    notices.shutdown();

    outcome
}

async fn run_command(
    command: Commands,
    registry: &JobRegistry<HttpJobStore>,
    store: Arc<HttpJobStore>,
) -> Result<()> {
    match command {
        Commands::Warehouses => {
            println!("{:<5} | {:<20} | Scripts", "Id", "Name");
            println!("{:-<5}-|-{:-<20}-|-{:-<7}", "", "", "");
            for w in catalog::warehouses() {
                println!("{:<5} | {:<20} | {}", w.id, w.name, w.scripts.len());
            }
        }

        Commands::Scripts { warehouse } => {
            let warehouse = lookup_warehouse(&warehouse)?;
            // A failed load is already notified; render the last-known
            // snapshot (catalog defaults on a cold start) either way.
            let _ = registry.load_jobs().await;
            let view = registry.view(&warehouse);
            render_contained(&warehouse, &view);
        }

        Commands::RunNow { warehouse, script } => {
            let warehouse = lookup_warehouse(&warehouse)?;
            registry.run_now(&warehouse, &script).await?;
        }

        Commands::Toggle { script } => {
            registry.load_jobs().await?;
            registry.toggle(&script).await?;
        }

        Commands::Reschedule { script, cron } => {
            // Validation failures are shown inline, before any network call
            // and without touching the notification queue.
            if let Err(reason) = cron::validate(&cron) {
                eprintln!("invalid cron expression '{}': {}", cron, reason);
                eprintln!("format: minute hour day month day_of_week");
                eprintln!("  minute 0-59, hour 0-23, day 1-31, month 1-12, day of week 0-6 (Sunday=0)");
                std::process::exit(2);
            }

            registry.load_jobs().await?;
            registry.reschedule(&script, &cron).await?;
        }

        Commands::Logs {
            script,
            hours,
            level,
            follow,
        } => {
            let query = LogQuery { hours, level };
            let mut reader = LogReader::new(store, script, query);

            let entries = reader.fetch().await?;
            render_log_entries(&entries);

            if follow {
                let (tx, mut rx) = mpsc::unbounded_channel();
                reader.start_auto_refresh(tx);
                println!("-- following (Ctrl-C to stop) --");

                let mut last = entries;
                loop {
                    tokio::select! {
                        batch = rx.recv() => match batch {
                            Some(batch) => {
                                if batch != last {
                                    println!("-- refreshed --");
                                    render_log_entries(&batch);
                                    last = batch;
                                }
                            }
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
                reader.stop_auto_refresh();
            }
        }
    }

    Ok(())
}

fn lookup_warehouse(id: &str) -> Result<Warehouse> {
    catalog::find(id).ok_or_else(|| anyhow::anyhow!("unknown warehouse '{}'", id))
}

/// Render the script table, contained: a rendering failure prints a
/// fallback line instead of taking the whole console down.
fn render_contained(warehouse: &Warehouse, view: &[Script]) {
    if let Err(err) = render_script_table(warehouse, view) {
        eprintln!("something went wrong rendering the script list: {err}");
    }
}

fn render_script_table(warehouse: &Warehouse, view: &[Script]) -> std::io::Result<()> {
    use std::io::Write;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Scripts for {} (warehouse {})", warehouse.name, warehouse.id)?;
    writeln!(out, "{:<5} | {:<35} | {:<8} | Schedule", "Id", "Name", "Status")?;
    writeln!(out, "{:-<5}-|-{:-<35}-|-{:-<8}-|-{:-<15}", "", "", "", "")?;
    for script in view {
        writeln!(
            out,
            "{:<5} | {:<35} | {:<8} | {}",
            script.id,
            script.name,
            script.status,
            script.cron_expression.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn render_log_entries(entries: &[LogEntry]) {
    if entries.is_empty() {
        println!("No log entries.");
        return;
    }
    for entry in entries {
        println!("{} [{}] {}", entry.timestamp, entry.level, entry.message);
    }
}
