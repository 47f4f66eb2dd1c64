use super::args::{Cli, Command, RecomputeArgs, ScrapeArgs, TargetArg};
use chrono::Utc;
use std::sync::Arc;
use vitals_core::config::VitalsConfig;
use vitals_core::metrics_api::{MetricContext, UnknownMetric, ANALYSIS_WINDOW_DAYS};
use vitals_core::providers::circleci::ReportingWindow;
use vitals_core::providers::Providers;
use vitals_core::scrapers::{self, ScrapeTarget};
use vitals_core::storage::store::Store;
use vitals_metrics::backfill;
use vitals_metrics::registry::MetricRegistry;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let cfg = vitals_core::config::load_config(&cli.config)?;
    let store = Store::open(&cfg.database)?;
    store.init_schema()?;

    match cli.cmd {
        Command::Scrape(args) => scrape(&cfg, &store, args).await,
        Command::Backfill => run_backfill(&cfg, &store).await,
        Command::Recompute(args) => recompute(&cfg, &store, args).await,
        Command::Report => report(&store),
        Command::Prune => prune(&store),
        Command::WorkflowStats => workflow_stats(&cfg).await,
    }
}

fn targets(arg: TargetArg) -> Vec<ScrapeTarget> {
    match arg {
        TargetArg::Commits => vec![ScrapeTarget::Commits],
        TargetArg::Builds => vec![ScrapeTarget::Builds],
        TargetArg::Releases => vec![ScrapeTarget::Releases],
        TargetArg::Cherrypicks => vec![ScrapeTarget::Cherrypicks],
        TargetArg::CherrypickIssues => vec![ScrapeTarget::CherrypickIssues],
        TargetArg::All => ScrapeTarget::ALL.to_vec(),
    }
}

fn metric_context(providers: &Providers, store: &Store) -> MetricContext {
    MetricContext {
        store: store.clone(),
        coverage: Arc::new(providers.codecov.clone()),
    }
}

async fn scrape(cfg: &VitalsConfig, store: &Store, args: ScrapeArgs) -> anyhow::Result<i32> {
    let providers = Providers::from_config(cfg)?;
    for target in targets(args.target) {
        match args.since {
            Some(since) => scrapers::scrape_historical(target, &providers, store, since).await?,
            None => scrapers::scrape_since_latest(target, &providers, store).await?,
        }
    }
    Ok(0)
}

async fn run_backfill(cfg: &VitalsConfig, store: &Store) -> anyhow::Result<i32> {
    let providers = Providers::from_config(cfg)?;
    let registry = MetricRegistry::with_default_metrics();
    let ctx = metric_context(&providers, store);
    backfill::run(&providers, &registry, &ctx).await?;
    Ok(0)
}

async fn recompute(cfg: &VitalsConfig, store: &Store, args: RecomputeArgs) -> anyhow::Result<i32> {
    let providers = Providers::from_config(cfg)?;
    let registry = MetricRegistry::with_default_metrics();
    let ctx = metric_context(&providers, store);
    match registry.recompute(&args.metric, &ctx, args.at).await {
        Ok(result) => {
            println!("recomputed {}: {:.4}", result.name, result.value);
            Ok(0)
        }
        Err(e) if e.downcast_ref::<UnknownMetric>().is_some() => {
            eprintln!("{e}");
            Ok(1)
        }
        Err(e) => Err(e),
    }
}

fn report(store: &Store) -> anyhow::Result<i32> {
    let registry = MetricRegistry::with_default_metrics();
    let latest = registry.get_latest(store)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "metrics": latest }))?
    );
    Ok(0)
}

fn prune(store: &Store) -> anyhow::Result<i32> {
    let cutoff = Utc::now() - chrono::Duration::days(ANALYSIS_WINDOW_DAYS);
    let deleted = store.prune_builds_before(cutoff)?;
    println!("removed {deleted} old builds");
    Ok(0)
}

async fn workflow_stats(cfg: &VitalsConfig) -> anyhow::Result<i32> {
    let providers = Providers::from_config(cfg)?;
    let stats = providers
        .circleci
        .get_workflow_stats(ReportingWindow::Last90Days)
        .await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(0)
}
