//! Sequential harvest pass over a unit plan.
//!
//! Each unit is one `(keyword, region)` lookup. The orchestrator fetches the
//! unit from its adapter, writes the records in a single transaction, then
//! cools down before the next unit. A failing unit is rolled back alone;
//! everything committed before it stays.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wfpop_core::{CanonicalRecord, Platform, GLOBAL_COUNTRY};
use wfpop_db::{DbError, UnitOfWork, UpsertOutcome, WorkflowStore};
use wfpop_sources::SourceAdapter;

use crate::backoff::{BackoffPolicy, Sleeper};

/// One `(keyword, region)` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestUnit {
    pub keyword: String,
    pub region: String,
}

/// Build the unit plan for a platform.
///
/// Region-aware platforms get `keywords x regions`; the forum has no region
/// and gets one `GLOBAL` unit per keyword.
#[must_use]
pub fn plan_units(platform: Platform, keywords: &[String], regions: &[String]) -> Vec<HarvestUnit> {
    let global = [GLOBAL_COUNTRY.to_string()];
    let regions: &[String] = if platform.is_region_aware() {
        regions
    } else {
        &global
    };

    keywords
        .iter()
        .flat_map(|keyword| {
            regions.iter().map(move |region| HarvestUnit {
                keyword: keyword.clone(),
                region: region.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { keyword: String, region: String },
    Committing,
    Cooldown(Duration),
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running { keyword, region } => write!(f, "running({keyword}, {region})"),
            RunState::Committing => write!(f, "committing"),
            RunState::Cooldown(d) => write!(f, "cooldown({}ms)", d.as_millis()),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// Totals for one pass. Reporting only; nothing reads it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub units_total: usize,
    pub units_committed: usize,
    pub units_failed: usize,
    pub units_throttled: usize,
    pub inserted: usize,
    pub updated: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Committed,
    Failed,
    Throttled,
}

pub struct Orchestrator<A, S, Z> {
    adapter: A,
    store: S,
    policy: BackoffPolicy,
    sleeper: Z,
}

impl<A, S, Z> Orchestrator<A, S, Z>
where
    A: SourceAdapter,
    S: WorkflowStore,
    Z: Sleeper,
{
    pub fn new(adapter: A, store: S, policy: BackoffPolicy, sleeper: Z) -> Self {
        Self {
            adapter,
            store,
            policy,
            sleeper,
        }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.platform()
    }

    /// Run every unit in order, stopping early when `cancel` fires.
    ///
    /// Cancellation is observed between units and during cooldowns. A unit
    /// that has started writing always finishes its commit or rollback first.
    pub async fn run(&self, units: &[HarvestUnit], cancel: &CancellationToken) -> RunSummary {
        let platform = self.platform();
        let mut summary = RunSummary {
            units_total: units.len(),
            ..RunSummary::default()
        };
        let mut consecutive_failures = 0u32;
        self.transition(&RunState::Idle);

        for (index, unit) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let Some(outcome) = self.harvest_unit(unit, cancel, &mut summary).await else {
                summary.cancelled = true;
                break;
            };

            let cooldown = match outcome {
                UnitOutcome::Committed => {
                    consecutive_failures = 0;
                    self.policy.pacing_delay()
                }
                UnitOutcome::Failed => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.policy.failure_delay(consecutive_failures)
                }
                UnitOutcome::Throttled => self.policy.rate_limit_delay(),
            };

            if index + 1 == units.len() {
                break;
            }
            if self.cool_down(cooldown, cancel).await {
                summary.cancelled = true;
                break;
            }
        }

        self.transition(&RunState::Done);
        tracing::info!(
            platform = %platform,
            units_total = summary.units_total,
            units_committed = summary.units_committed,
            units_failed = summary.units_failed,
            units_throttled = summary.units_throttled,
            inserted = summary.inserted,
            updated = summary.updated,
            cancelled = summary.cancelled,
            "harvest pass finished"
        );
        summary
    }

    /// Fetch and persist one unit, re-fetching throttled batches while the
    /// policy allows. `None` means cancellation interrupted a retry wait.
    async fn harvest_unit(
        &self,
        unit: &HarvestUnit,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Option<UnitOutcome> {
        let mut attempt = 0u32;
        let mut was_throttled = false;

        loop {
            self.transition(&RunState::Running {
                keyword: unit.keyword.clone(),
                region: unit.region.clone(),
            });
            let batch = self.adapter.fetch(&unit.keyword, &unit.region).await;

            if batch.throttled {
                if !was_throttled {
                    summary.units_throttled += 1;
                    was_throttled = true;
                }
                if attempt < self.policy.max_retries {
                    attempt += 1;
                    tracing::warn!(
                        platform = %self.platform(),
                        keyword = %unit.keyword,
                        region = %unit.region,
                        attempt,
                        "upstream throttled unit, retrying after cooldown"
                    );
                    if self.cool_down(self.policy.rate_limit_delay(), cancel).await {
                        return None;
                    }
                    continue;
                }
            }

            self.transition(&RunState::Committing);
            return Some(match self.persist(&batch.records).await {
                Ok((inserted, updated)) => {
                    summary.units_committed += 1;
                    summary.inserted += inserted;
                    summary.updated += updated;
                    tracing::debug!(
                        platform = %self.platform(),
                        keyword = %unit.keyword,
                        region = %unit.region,
                        inserted,
                        updated,
                        "unit committed"
                    );
                    if batch.throttled {
                        UnitOutcome::Throttled
                    } else {
                        UnitOutcome::Committed
                    }
                }
                Err(e) => {
                    summary.units_failed += 1;
                    tracing::warn!(
                        platform = %self.platform(),
                        keyword = %unit.keyword,
                        region = %unit.region,
                        error = %e,
                        "unit rolled back"
                    );
                    UnitOutcome::Failed
                }
            });
        }
    }

    /// Write `records` in one transaction. Returns `(inserted, updated)`.
    async fn persist(&self, records: &[CanonicalRecord]) -> Result<(usize, usize), DbError> {
        if records.is_empty() {
            return Ok((0, 0));
        }

        let mut unit = self.store.begin_unit().await?;
        let mut inserted = 0;
        let mut updated = 0;

        for record in records {
            match unit.upsert(record).await {
                Ok(UpsertOutcome::Inserted) => inserted += 1,
                Ok(UpsertOutcome::Updated) => updated += 1,
                Err(e) => {
                    if let Err(rollback_err) = unit.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback failed");
                    }
                    return Err(e);
                }
            }
        }

        unit.commit().await?;
        Ok((inserted, updated))
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` on cancel.
    async fn cool_down(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        self.transition(&RunState::Cooldown(duration));
        tokio::select! {
            biased;
            () = cancel.cancelled() => true,
            () = self.sleeper.sleep(duration) => false,
        }
    }

    fn transition(&self, state: &RunState) {
        tracing::debug!(platform = %self.platform(), state = %state, "harvest state");
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
