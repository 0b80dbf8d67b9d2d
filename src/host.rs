//! The collaborators an activation runs against.

use crate::{
    config::Config, fetch::MetricSource, notify::Notifier, scheduler::Scheduler,
    secrets::SecretSource, sheet::Sheet, state::JobStateRepository, store::KeyValueStore,
};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn at(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub struct Host<'a> {
    pub cfg: &'a Config,
    pub store: &'a dyn KeyValueStore,
    pub sheet: &'a dyn Sheet,
    pub scheduler: &'a dyn Scheduler,
    pub metrics: &'a dyn MetricSource,
    pub secrets: &'a dyn SecretSource,
    pub notifier: &'a dyn Notifier,
    pub clock: &'a dyn Clock,
}

impl<'a> Host<'a> {
    pub fn state(&self) -> JobStateRepository<'a> {
        JobStateRepository::new(self.store)
    }

    /// Reads the URL row as configured. Trailing blank cells are kept so the
    /// list length matches the sheet's used width.
    pub fn read_urls(&self) -> Result<Vec<String>> {
        let row = self.cfg.input.url_row;
        let col = self.cfg.input.url_col;
        let last = self.sheet.last_column()?;
        if last < col {
            return Ok(Vec::new());
        }
        let grid = self.sheet.read_range(row, col, 1, last - col + 1)?;
        Ok(grid.into_iter().next().unwrap_or_default())
    }
}
