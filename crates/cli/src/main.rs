//! `preorder`: run dashboard operations from a terminal against the same
//! settings and snapshot as the server.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use preorder_admin::dashboard::RefreshResult;
use preorder_admin::domain::{dates::parse_date, ApprovalStatus, SalesPeriod, TitleId};
use preorder_admin::report::read_overrides_csv;
use preorder_admin::Dashboard;
use preorder_kernel::Settings;
use serde::Serialize;
use time::Date;

/// Preorder admin: reconcile titles, record approvals, export reports
#[derive(Parser)]
#[command(name = "preorder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Use fixture data instead of the live services
    #[arg(long, global = true, conflicts_with = "live")]
    test_mode: bool,

    /// Use the live services; fails when their credentials are missing
    #[arg(long, global = true)]
    live: bool,

    /// Directory holding the title store snapshot
    #[arg(long, global = true, env = "PREORDER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull titles and sales from the catalog and merge them
    Refresh,

    /// Print the dashboard summary as JSON
    Summary {
        /// Refresh before summarizing
        #[arg(long)]
        refresh: bool,
    },

    /// Export every title as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Record an approval decision for one title
    Approve {
        /// Title ISBN
        id: String,
        #[arg(long, value_enum, default_value_t = StatusArg::Approved)]
        status: StatusArg,
        /// Who made the decision
        #[arg(long)]
        actor: String,
    },

    /// Set or clear one publication date override
    Override(OverrideArgs),

    /// Bulk import or export publication date overrides
    Overrides(OverridesArgs),

    /// Email a report to the configured recipients
    Email {
        #[arg(value_enum)]
        report: ReportArg,
        /// First day of the weekly report (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Last day of the weekly report (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<String>,
    },
}

#[derive(Args)]
struct OverrideArgs {
    #[command(subcommand)]
    action: OverrideAction,
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Correct a title's publication date
    Set {
        id: String,
        /// Corrected date (YYYY-MM-DD)
        date: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        actor: String,
    },
    /// Fall back to the platform's publication date
    Clear { id: String },
}

#[derive(Args)]
struct OverridesArgs {
    #[command(subcommand)]
    action: OverridesAction,
}

#[derive(Subcommand)]
enum OverridesAction {
    /// Apply an ISBN,Corrected_Pub_Date,Notes CSV file
    Import {
        file: PathBuf,
        #[arg(long)]
        actor: String,
    },
    /// Write every override as CSV
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Rejected,
}

impl From<StatusArg> for ApprovalStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ApprovalStatus::Pending,
            StatusArg::Approved => ApprovalStatus::Approved,
            StatusArg::Rejected => ApprovalStatus::Rejected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportArg {
    Summary,
    Weekly,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load().context("failed to load preorder settings")?;
    preorder_telemetry::init_stderr(&settings.telemetry)?;

    if cli.test_mode {
        settings.dashboard.test_mode = true;
    }
    if cli.live {
        settings.dashboard.test_mode = false;
    }
    if let Some(dir) = cli.data_dir {
        settings.storage.data_dir = dir;
        settings.storage.persist = true;
    }

    let dashboard = Dashboard::from_settings(&settings)?;
    tracing::debug!(test_mode = dashboard.is_test_mode(), "dashboard ready");

    match cli.command {
        Command::Refresh => refresh(&dashboard).await,
        Command::Summary { refresh: first } => {
            if first {
                refresh(&dashboard).await?;
            }
            print_json(&dashboard.summary().await)
        }
        Command::Export { output } => write_text(output, &dashboard.titles_csv().await?),
        Command::Approve { id, status, actor } => {
            let outcome = dashboard
                .approve(&TitleId::new(id), status.into(), &actor)
                .await?;
            print_json(&outcome)
        }
        Command::Override(args) => match args.action {
            OverrideAction::Set {
                id,
                date,
                note,
                actor,
            } => {
                let date = date_arg("date", &date)?;
                let view = dashboard
                    .set_override(&TitleId::new(id), date, note, &actor)
                    .await?;
                print_json(&view)
            }
            OverrideAction::Clear { id } => {
                print_json(&dashboard.clear_override(&TitleId::new(id)).await?)
            }
        },
        Command::Overrides(args) => match args.action {
            OverridesAction::Import { file, actor } => {
                let reader = File::open(&file)
                    .with_context(|| format!("failed to open {}", file.display()))?;
                let entries = read_overrides_csv(reader)?;
                print_json(&dashboard.import_overrides(&entries, &actor).await?)
            }
            OverridesAction::Export { output } => {
                write_text(output, &dashboard.overrides_csv().await?)
            }
        },
        Command::Email { report, start, end } => {
            let receipt = match report {
                ReportArg::Summary => dashboard.email_summary().await?,
                ReportArg::Weekly => {
                    let period = match (start, end) {
                        (Some(start), Some(end)) => {
                            Some(period_arg(date_arg("--start", &start)?, date_arg("--end", &end)?)?)
                        }
                        _ => None,
                    };
                    dashboard.email_weekly(period).await?
                }
            };
            print_json(&receipt)
        }
    }
}

/// A stale refresh is reported and turned into a failing exit code.
async fn refresh(dashboard: &Dashboard) -> anyhow::Result<()> {
    let result = dashboard.refresh().await;
    print_json(&result)?;
    match result {
        RefreshResult::Refreshed { .. } => Ok(()),
        RefreshResult::Stale { warning } => Err(anyhow!(warning.message)),
    }
}

fn date_arg(name: &str, raw: &str) -> anyhow::Result<Date> {
    parse_date(raw).ok_or_else(|| anyhow!("{name}: '{raw}' is not a YYYY-MM-DD date"))
}

fn period_arg(start: Date, end: Date) -> anyhow::Result<SalesPeriod> {
    if start > end {
        bail!("--start must not be after --end");
    }
    Ok(SalesPeriod::new(start, end))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_text(output: Option<PathBuf>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
