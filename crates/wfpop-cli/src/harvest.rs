//! `wfpop-cli harvest`: one sequential pass per source.
//!
//! Each platform gets its own orchestrator and its own `harvest_runs` ledger
//! row. Ledger writes are best-effort; a harvest never aborts because the
//! ledger could not be updated.

use std::path::Path;

use clap::ValueEnum;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use wfpop_core::{AppConfig, Platform};
use wfpop_db::{HarvestTotals, PgWorkflowStore};
use wfpop_harvest::{plan_units, BackoffPolicy, HarvestUnit, Orchestrator, RunSummary, TokioSleeper};
use wfpop_sources::{ForumAdapter, HttpSettings, SourceAdapter, TrendsAdapter, YoutubeAdapter};

const TRIGGER_SOURCE: &str = "cli";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum HarvestTarget {
    Youtube,
    Forum,
    Trends,
    All,
}

impl HarvestTarget {
    pub(crate) fn platforms(self) -> Vec<Platform> {
        match self {
            HarvestTarget::Youtube => vec![Platform::Youtube],
            HarvestTarget::Forum => vec![Platform::Forum],
            HarvestTarget::Trends => vec![Platform::Google],
            HarvestTarget::All => Platform::ALL.to_vec(),
        }
    }
}

/// Keyword seed, falling back to the built-in list when the file is missing,
/// unreadable or empty.
pub(crate) fn load_keywords(path: &Path) -> Vec<String> {
    match wfpop_core::load_keyword_seed(path) {
        Ok(keywords) if !keywords.is_empty() => keywords,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "keyword seed is empty; using defaults");
            wfpop_core::default_keywords()
        }
        Err(e) => {
            tracing::warn!(error = %e, "keyword seed unavailable; using defaults");
            wfpop_core::default_keywords()
        }
    }
}

pub(crate) async fn run_harvest(
    config: &AppConfig,
    target: HarvestTarget,
    dry_run: bool,
) -> anyhow::Result<()> {
    let keywords = load_keywords(&config.keywords_path);

    if dry_run {
        for platform in target.platforms() {
            let units = plan_units(platform, &keywords, &config.regions);
            println!("[dry-run] {platform}: {} unit(s)", units.len());
            for unit in &units {
                println!("  {} / {}", unit.keyword, unit.region);
            }
        }
        return Ok(());
    }

    let pool = wfpop_db::connect_pool_from_config(config).await?;
    wfpop_db::run_migrations(&pool).await?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let results = match target {
        HarvestTarget::All => {
            let (youtube, forum, trends) = tokio::join!(
                run_platform(&pool, config, Platform::Youtube, &keywords, &cancel),
                run_platform(&pool, config, Platform::Forum, &keywords, &cancel),
                run_platform(&pool, config, Platform::Google, &keywords, &cancel),
            );
            vec![youtube, forum, trends]
        }
        single => {
            let mut results = Vec::new();
            for platform in single.platforms() {
                results.push(run_platform(&pool, config, platform, &keywords, &cancel).await);
            }
            results
        }
    };

    let mut first_error = None;
    for result in results {
        match result {
            Ok(Some(summary)) => print_summary(&summary),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "harvest failed");
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("ctrl-c received; stopping after the current unit");
            cancel.cancel();
        }
    });
}

fn print_summary(summary: &PlatformSummary) {
    let s = &summary.run;
    println!(
        "{}: {}/{} unit(s) committed, {} failed, {} throttled, {} inserted, {} updated{}",
        summary.platform,
        s.units_committed,
        s.units_total,
        s.units_failed,
        s.units_throttled,
        s.inserted,
        s.updated,
        if s.cancelled { " (cancelled)" } else { "" }
    );
}

#[derive(Debug)]
struct PlatformSummary {
    platform: Platform,
    run: RunSummary,
}

/// Build the adapter for `platform` and drive one pass. `Ok(None)` means the
/// platform was skipped for lack of credentials.
async fn run_platform(
    pool: &PgPool,
    config: &AppConfig,
    platform: Platform,
    keywords: &[String],
    cancel: &CancellationToken,
) -> anyhow::Result<Option<PlatformSummary>> {
    let settings = HttpSettings::from_app_config(config);
    let units = plan_units(platform, keywords, &config.regions);

    let run = match platform {
        Platform::Youtube => {
            let Some(api_key) = config.youtube_api_key.as_deref() else {
                tracing::warn!("YOUTUBE_API_KEY not set; skipping youtube harvest");
                return Ok(None);
            };
            let adapter = YoutubeAdapter::new(api_key, &settings)?;
            drive(pool, adapter, &units, cancel).await
        }
        Platform::Forum => {
            let adapter = ForumAdapter::new(&config.forum_base_url, &settings)?;
            drive(pool, adapter, &units, cancel).await
        }
        Platform::Google => {
            let adapter = TrendsAdapter::new(&settings)?;
            drive(pool, adapter, &units, cancel).await
        }
    };

    Ok(Some(PlatformSummary { platform, run }))
}

async fn drive<A: SourceAdapter>(
    pool: &PgPool,
    adapter: A,
    units: &[HarvestUnit],
    cancel: &CancellationToken,
) -> RunSummary {
    let platform = adapter.platform();
    let run_id = open_run(pool, platform).await;

    let orchestrator = Orchestrator::new(
        adapter,
        PgWorkflowStore::new(pool.clone()),
        BackoffPolicy::for_platform(platform),
        TokioSleeper,
    );
    let summary = orchestrator.run(units, cancel).await;

    if let Some(run_id) = run_id {
        close_run(pool, run_id, platform, &summary).await;
    }
    summary
}

async fn open_run(pool: &PgPool, platform: Platform) -> Option<i64> {
    let run = match wfpop_db::create_harvest_run(pool, platform.as_str(), TRIGGER_SOURCE).await {
        Ok(run) => run,
        Err(e) => {
            tracing::warn!(platform = %platform, error = %e, "could not record harvest run");
            return None;
        }
    };

    if let Err(e) = wfpop_db::start_harvest_run(pool, run.id).await {
        tracing::warn!(run_id = run.id, error = %e, "could not mark harvest run as running");
        return None;
    }
    Some(run.id)
}

async fn close_run(pool: &PgPool, run_id: i64, platform: Platform, summary: &RunSummary) {
    let totals = totals_for(summary);
    let result = if summary.cancelled {
        wfpop_db::cancel_harvest_run(pool, run_id, totals).await
    } else if summary.units_total > 0 && summary.units_failed == summary.units_total {
        let message = format!("all {} {platform} unit(s) failed", summary.units_total);
        wfpop_db::fail_harvest_run(pool, run_id, totals, &message).await
    } else {
        wfpop_db::complete_harvest_run(pool, run_id, totals).await
    };

    if let Err(e) = result {
        tracing::error!(run_id, platform = %platform, error = %e, "failed to close harvest run");
    }
}

pub(crate) fn totals_for(summary: &RunSummary) -> HarvestTotals {
    let clamp = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
    HarvestTotals {
        records_inserted: clamp(summary.inserted),
        records_updated: clamp(summary.updated),
        units_failed: clamp(summary.units_failed),
    }
}
