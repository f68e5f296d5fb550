use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wfpop_core::{ForumMetrics, TrendsMetrics, VideoMetrics};
use wfpop_sources::SourceBatch;

use super::*;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

fn record(platform: Platform, name: &str, region: &str) -> CanonicalRecord {
    match platform {
        Platform::Youtube => CanonicalRecord::video(
            name,
            region,
            VideoMetrics {
                views: 100,
                likes: 5,
                comments: 1,
            },
        ),
        Platform::Forum => CanonicalRecord::forum(name, ForumMetrics::default()),
        Platform::Google => CanonicalRecord::trends(name, region, TrendsMetrics::default()),
    }
}

struct FakeAdapter {
    platform: Platform,
    scripted: Mutex<HashMap<String, VecDeque<SourceBatch>>>,
    calls: Arc<Mutex<Vec<HarvestUnit>>>,
}

impl FakeAdapter {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            scripted: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a batch for `keyword`; unscripted calls return one record
    /// named after the keyword.
    fn script(self, keyword: &str, batch: SourceBatch) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(keyword.to_string())
            .or_default()
            .push_back(batch);
        self
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, keyword: &str, region: &str) -> SourceBatch {
        self.calls.lock().unwrap().push(HarvestUnit {
            keyword: keyword.to_string(),
            region: region.to_string(),
        });
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(keyword)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| SourceBatch {
            records: vec![record(self.platform, keyword, region)],
            throttled: false,
        })
    }
}

type Key = (String, Platform, String);

fn key(r: &CanonicalRecord) -> Key {
    (r.workflow_name.clone(), r.platform(), r.country.clone())
}

#[derive(Clone, Default)]
struct MemoryStore {
    rows: Arc<Mutex<HashMap<Key, CanonicalRecord>>>,
    units_begun: Arc<AtomicUsize>,
    /// Indexes of begun units whose second upsert fails.
    failing_units: HashSet<usize>,
}

impl MemoryStore {
    fn failing(units: &[usize]) -> Self {
        Self {
            failing_units: units.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn names(&self) -> HashSet<String> {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .map(|(name, _, _)| name.clone())
            .collect()
    }
}

struct MemoryUnit {
    rows: Arc<Mutex<HashMap<Key, CanonicalRecord>>>,
    staged: Vec<CanonicalRecord>,
    fail_after_first: bool,
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin_unit(&self) -> Result<MemoryUnit, DbError> {
        let index = self.units_begun.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryUnit {
            rows: Arc::clone(&self.rows),
            staged: Vec::new(),
            fail_after_first: self.failing_units.contains(&index),
        })
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn upsert(&mut self, record: &CanonicalRecord) -> Result<UpsertOutcome, DbError> {
        if self.fail_after_first && !self.staged.is_empty() {
            return Err(DbError::NotFound);
        }
        let k = key(record);
        let exists = self.rows.lock().unwrap().contains_key(&k)
            || self.staged.iter().any(|s| key(s) == k);
        self.staged.push(record.clone());
        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn commit(self) -> Result<(), DbError> {
        let mut rows = self.rows.lock().unwrap();
        for record in self.staged {
            rows.insert(key(&record), record);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
    cancel_on_sleep: Option<CancellationToken>,
}

impl RecordingSleeper {
    fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        if let Some(token) = &self.cancel_on_sleep {
            token.cancel();
        }
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn test_policy() -> BackoffPolicy {
    BackoffPolicy {
        pacing: ms(1),
        jitter: Duration::ZERO,
        failure_cooldown: ms(10),
        escalation_multiplier: 2.0,
        max_cooldown: ms(40),
        rate_limit_cooldown: ms(100),
        max_retries: 1,
    }
}

fn units(keywords: &[&str]) -> Vec<HarvestUnit> {
    keywords
        .iter()
        .map(|k| HarvestUnit {
            keyword: (*k).to_string(),
            region: "US".to_string(),
        })
        .collect()
}

fn two_records(name: &str) -> SourceBatch {
    SourceBatch {
        records: vec![
            record(Platform::Youtube, &format!("{name}-a"), "US"),
            record(Platform::Youtube, &format!("{name}-b"), "US"),
        ],
        throttled: false,
    }
}

// ---------------------------------------------------------------------------
// Unit planning
// ---------------------------------------------------------------------------

#[test]
fn region_aware_plan_is_keywords_by_regions() {
    let keywords = vec!["a".to_string(), "b".to_string()];
    let regions = vec!["US".to_string(), "IN".to_string()];
    let plan = plan_units(Platform::Youtube, &keywords, &regions);
    let pairs: Vec<_> = plan
        .iter()
        .map(|u| (u.keyword.as_str(), u.region.as_str()))
        .collect();
    assert_eq!(pairs, vec![("a", "US"), ("a", "IN"), ("b", "US"), ("b", "IN")]);
}

#[test]
fn forum_plan_is_one_global_unit_per_keyword() {
    let keywords = vec!["a".to_string(), "b".to_string()];
    let regions = vec!["US".to_string(), "IN".to_string()];
    let plan = plan_units(Platform::Forum, &keywords, &regions);
    assert_eq!(plan.len(), 2);
    assert!(plan.iter().all(|u| u.region == GLOBAL_COUNTRY));
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paces_between_units_but_not_after_the_last() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::default();
    let orchestrator = Orchestrator::new(
        FakeAdapter::new(Platform::Youtube),
        store.clone(),
        test_policy(),
        sleeper.clone(),
    );

    let summary = orchestrator
        .run(&units(&["a", "b", "c"]), &CancellationToken::new())
        .await;

    assert_eq!(summary.units_total, 3);
    assert_eq!(summary.units_committed, 3);
    assert_eq!(summary.inserted, 3);
    assert!(!summary.cancelled);
    assert_eq!(sleeper.slept(), vec![ms(1), ms(1)]);
    assert_eq!(store.names().len(), 3);
}

#[tokio::test]
async fn rerunning_updates_instead_of_inserting() {
    let store = MemoryStore::default();
    let plan = units(&["a", "b"]);

    for _ in 0..2 {
        Orchestrator::new(
            FakeAdapter::new(Platform::Google),
            store.clone(),
            test_policy(),
            RecordingSleeper::default(),
        )
        .run(&plan, &CancellationToken::new())
        .await;
    }

    let third = Orchestrator::new(
        FakeAdapter::new(Platform::Google),
        store.clone(),
        test_policy(),
        RecordingSleeper::default(),
    )
    .run(&plan, &CancellationToken::new())
    .await;

    assert_eq!(third.inserted, 0);
    assert_eq!(third.updated, 2);
    assert_eq!(store.rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_unit_rolls_back_alone() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::failing(&[1]);
    let adapter = FakeAdapter::new(Platform::Youtube).script("b", two_records("b"));
    let orchestrator = Orchestrator::new(adapter, store.clone(), test_policy(), sleeper.clone());

    let summary = orchestrator
        .run(&units(&["a", "b", "c"]), &CancellationToken::new())
        .await;

    assert_eq!(summary.units_committed, 2);
    assert_eq!(summary.units_failed, 1);
    let names = store.names();
    assert!(names.contains("a"));
    assert!(names.contains("c"));
    assert!(!names.contains("b-a"), "staged record of failed unit leaked");
    assert!(!names.contains("b-b"));
    assert_eq!(sleeper.slept(), vec![ms(1), ms(10)]);
}

#[tokio::test]
async fn consecutive_failures_escalate_up_to_the_cap() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::failing(&[0, 1, 2, 3]);
    let mut adapter = FakeAdapter::new(Platform::Youtube);
    for k in ["a", "b", "c", "d"] {
        adapter = adapter.script(k, two_records(k));
    }
    let orchestrator = Orchestrator::new(adapter, store.clone(), test_policy(), sleeper.clone());

    let summary = orchestrator
        .run(&units(&["a", "b", "c", "d", "e"]), &CancellationToken::new())
        .await;

    assert_eq!(summary.units_failed, 4);
    assert_eq!(summary.units_committed, 1);
    assert_eq!(sleeper.slept(), vec![ms(10), ms(20), ms(40), ms(40)]);
}

#[tokio::test]
async fn success_resets_failure_escalation() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::failing(&[0, 2]);
    let adapter = FakeAdapter::new(Platform::Youtube)
        .script("a", two_records("a"))
        .script("c", two_records("c"));
    let orchestrator = Orchestrator::new(adapter, store, test_policy(), sleeper.clone());

    orchestrator
        .run(&units(&["a", "b", "c", "d"]), &CancellationToken::new())
        .await;

    assert_eq!(sleeper.slept(), vec![ms(10), ms(1), ms(10)]);
}

#[tokio::test]
async fn throttled_unit_is_retried_after_rate_limit_cooldown() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::default();
    let adapter = FakeAdapter::new(Platform::Youtube).script("a", SourceBatch::failed(true));
    let calls = Arc::clone(&adapter.calls);
    let orchestrator = Orchestrator::new(adapter, store.clone(), test_policy(), sleeper.clone());

    let summary = orchestrator
        .run(&units(&["a", "b"]), &CancellationToken::new())
        .await;

    assert_eq!(calls.lock().unwrap().len(), 3);
    assert_eq!(summary.units_throttled, 1);
    assert_eq!(summary.units_committed, 2);
    assert_eq!(sleeper.slept(), vec![ms(100), ms(1)]);
    assert!(store.names().contains("a"));
}

#[tokio::test]
async fn exhausted_retries_keep_partial_records_and_escalate_cooldown() {
    let sleeper = RecordingSleeper::default();
    let store = MemoryStore::default();
    let partial = SourceBatch {
        records: vec![record(Platform::Youtube, "partial", "US")],
        throttled: true,
    };
    let adapter = FakeAdapter::new(Platform::Youtube)
        .script("a", SourceBatch::failed(true))
        .script("a", partial);
    let orchestrator = Orchestrator::new(adapter, store.clone(), test_policy(), sleeper.clone());

    let summary = orchestrator
        .run(&units(&["a", "b"]), &CancellationToken::new())
        .await;

    assert_eq!(summary.units_throttled, 1);
    assert_eq!(summary.units_committed, 2);
    assert!(store.names().contains("partial"));
    assert_eq!(sleeper.slept(), vec![ms(100), ms(100)]);
}

#[tokio::test]
async fn cancellation_during_cooldown_stops_before_next_unit() {
    let token = CancellationToken::new();
    let sleeper = RecordingSleeper {
        cancel_on_sleep: Some(token.clone()),
        ..RecordingSleeper::default()
    };
    let store = MemoryStore::default();
    let adapter = FakeAdapter::new(Platform::Forum);
    let calls = Arc::clone(&adapter.calls);
    let orchestrator = Orchestrator::new(adapter, store.clone(), test_policy(), sleeper);

    let summary = orchestrator.run(&units(&["a", "b", "c"]), &token).await;

    assert!(summary.cancelled);
    assert_eq!(summary.units_committed, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(store.names().len(), 1);
}

#[tokio::test]
async fn cancelled_token_runs_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let adapter = FakeAdapter::new(Platform::Youtube);
    let calls = Arc::clone(&adapter.calls);
    let orchestrator = Orchestrator::new(
        adapter,
        MemoryStore::default(),
        test_policy(),
        RecordingSleeper::default(),
    );

    let summary = orchestrator.run(&units(&["a", "b"]), &token).await;

    assert!(summary.cancelled);
    assert_eq!(summary.units_total, 2);
    assert_eq!(summary.units_committed, 0);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_batch_opens_no_transaction() {
    let store = MemoryStore::default();
    let adapter = FakeAdapter::new(Platform::Youtube).script("a", SourceBatch::default());
    let orchestrator = Orchestrator::new(
        adapter,
        store.clone(),
        test_policy(),
        RecordingSleeper::default(),
    );

    let summary = orchestrator
        .run(&units(&["a"]), &CancellationToken::new())
        .await;

    assert_eq!(summary.units_committed, 1);
    assert_eq!(summary.inserted, 0);
    assert_eq!(store.units_begun.load(Ordering::SeqCst), 0);
}

#[test]
fn run_state_renders_for_logs() {
    let state = RunState::Running {
        keyword: "crm".to_string(),
        region: "US".to_string(),
    };
    assert_eq!(state.to_string(), "running(crm, US)");
    assert_eq!(RunState::Cooldown(ms(250)).to_string(), "cooldown(250ms)");
}
