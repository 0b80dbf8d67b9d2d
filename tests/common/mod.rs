#![allow(dead_code)]

use speed_sweep::{
    config::Config,
    fetch::MetricSource,
    host::{Host, ManualClock},
    metrics::{MetricKind, MetricRecord, MetricValue, Strategy},
    notify::LogNotifier,
    scheduler::MemoryScheduler,
    secrets::MapSecrets,
    sheet::MemorySheet,
    state::JobStateRepository,
    store::{KeyValueStore, MemoryStore},
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const T0: u64 = 1_700_000_000_000;
pub const RESTARTED_JOB: &str = "restarted-job";

pub fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://site{i}.example")).collect()
}

/// Two title rows, then the URL row starting at column 3.
pub fn sheet_rows(urls: &[String]) -> Vec<Vec<String>> {
    let mut url_row = vec!["".to_string(), "URL".to_string()];
    url_row.extend(urls.iter().cloned());
    vec![
        vec!["Page Speed".to_string()],
        vec!["".to_string(), "Site".to_string()],
        url_row,
    ]
}

/// Returns a record derived from the URL so tests can check alignment.
pub struct FakeMetrics {
    pub clock: Arc<ManualClock>,
    pub advance_per_fetch_ms: AtomicU64,
    pub calls: Mutex<Vec<(String, Strategy)>>,
    /// Clears the store after this many fetches, imitating a concurrent cancel.
    pub cancel_after: Mutex<Option<(usize, Arc<MemoryStore>)>>,
    /// Cancels and starts `RESTARTED_JOB` after this many fetches.
    pub restart_after: Mutex<Option<(usize, Arc<MemoryStore>)>>,
    fetches: AtomicUsize,
}

impl FakeMetrics {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            advance_per_fetch_ms: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
            cancel_after: Mutex::new(None),
            restart_after: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<(String, Strategy)> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn expected_record(url: &str, strategy: Strategy) -> MetricRecord {
    let mut record = MetricRecord::placeholder()
        .with(MetricKind::Performance, MetricValue::Score(url.len() as u32));
    for kind in MetricKind::ALL.into_iter().skip(1) {
        record.set(
            kind,
            MetricValue::Display(format!("{strategy}:{}:{url}", kind.key())),
        );
    }
    record
}

impl MetricSource for FakeMetrics {
    fn fetch(&self, url: &str, strategy: Strategy, _api_key: &str) -> MetricRecord {
        self.calls.lock().unwrap().push((url.to_string(), strategy));
        self.clock
            .advance(self.advance_per_fetch_ms.load(Ordering::SeqCst));
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, store)) = self.cancel_after.lock().unwrap().as_ref() {
            if n == *after {
                JobStateRepository::new(store.as_ref()).clear().unwrap();
            }
        }
        if let Some((after, store)) = self.restart_after.lock().unwrap().as_ref() {
            if n == *after {
                let repo = JobStateRepository::new(store.as_ref());
                repo.cancel().unwrap();
                repo.reset(RESTARTED_JOB, "restarted-fingerprint", 4).unwrap();
            }
        }
        expected_record(url, strategy)
    }
}

pub struct Fixture {
    pub cfg: Config,
    pub store: Arc<MemoryStore>,
    pub sheet: MemorySheet,
    pub scheduler: MemoryScheduler,
    pub metrics: FakeMetrics,
    pub secrets: MapSecrets,
    pub notifier: LogNotifier,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new(n: usize) -> Self {
        Self::with_urls(urls(n))
    }

    pub fn with_urls(urls: Vec<String>) -> Self {
        let clock = Arc::new(ManualClock::at(T0));
        let mut cfg = Config::default();
        cfg.notify.email = "ops@example.org".into();
        Self {
            cfg,
            store: Arc::new(MemoryStore::new()),
            sheet: MemorySheet::from_rows(sheet_rows(&urls)),
            scheduler: MemoryScheduler::new(),
            metrics: FakeMetrics::new(clock.clone()),
            secrets: MapSecrets::default().with("PAGESPEED_API_KEY", "test-key"),
            notifier: LogNotifier::default(),
            clock,
        }
    }

    pub fn host(&self) -> Host<'_> {
        Host {
            cfg: &self.cfg,
            store: self.store.as_ref(),
            sheet: &self.sheet,
            scheduler: &self.scheduler,
            metrics: &self.metrics,
            secrets: &self.secrets,
            notifier: &self.notifier,
            clock: self.clock.as_ref(),
        }
    }

    pub fn state(&self) -> JobStateRepository<'_> {
        JobStateRepository::new(self.store.as_ref())
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys().unwrap()
    }
}
