use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vitals",
    version,
    about = "Health metrics for open-source projects"
)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "vitals.yaml", env = "VITALS_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Incrementally scrape records since the latest stored ones
    Scrape(ScrapeArgs),
    /// Scrape a year of history and backfill weekly metric results
    Backfill,
    /// Recompute one metric and append the result
    Recompute(RecomputeArgs),
    /// Print the latest result for every active metric, as JSON
    Report,
    /// Drop builds older than the 90-day analysis window
    Prune,
    /// Print CI workflow aggregates for the last 90 days, as JSON
    WorkflowStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Commits,
    Builds,
    Releases,
    Cherrypicks,
    CherrypickIssues,
    All,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Record type to scrape.
    #[arg(value_enum, default_value_t = TargetArg::All)]
    pub target: TargetArg,

    /// Scrape history back to this time (RFC 3339) instead of running
    /// incrementally.
    #[arg(long)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RecomputeArgs {
    /// Metric name, e.g. BuildGreennessMetric.
    pub metric: String,

    /// Anchor the computation at this time (RFC 3339) instead of now.
    #[arg(long)]
    pub at: Option<chrono::DateTime<chrono::Utc>>,
}
