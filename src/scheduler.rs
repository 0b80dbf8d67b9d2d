//! "Run this later" facility. Activations are data, not closures, so a
//! pending queue can live on disk between processes.

use crate::util::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    RunChunk,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledActivation {
    pub handle: ScheduleHandle,
    pub activation: Activation,
    pub due_at_ms: u64,
}

pub trait Scheduler {
    fn schedule_after(&self, now_ms: u64, delay: Duration, activation: Activation)
        -> Result<ScheduleHandle>;
    fn list_scheduled(&self) -> Result<Vec<ScheduledActivation>>;
    fn cancel(&self, handle: &ScheduleHandle) -> Result<()>;

    /// Earliest pending activation, if any.
    fn next_due(&self) -> Result<Option<ScheduledActivation>> {
        Ok(self
            .list_scheduled()?
            .into_iter()
            .min_by_key(|s| (s.due_at_ms, s.handle.clone())))
    }

    fn cancel_all(&self) -> Result<usize> {
        let pending = self.list_scheduled()?;
        for s in &pending {
            self.cancel(&s.handle)?;
        }
        Ok(pending.len())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Queue {
    next_seq: u64,
    entries: Vec<ScheduledActivation>,
}

impl Queue {
    fn push(&mut self, now_ms: u64, delay: Duration, activation: Activation) -> ScheduleHandle {
        self.next_seq += 1;
        let handle = ScheduleHandle(format!("{}-{}", activation_name(activation), self.next_seq));
        self.entries.push(ScheduledActivation {
            handle: handle.clone(),
            activation,
            due_at_ms: now_ms.saturating_add(delay.as_millis() as u64),
        });
        handle
    }
}

fn activation_name(a: Activation) -> &'static str {
    match a {
        Activation::RunChunk => "run_chunk",
    }
}

/// Pending activations persisted as JSON; `speed-sweep worker` drains it.
pub struct FileScheduler {
    path: PathBuf,
}

impl FileScheduler {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn load(&self) -> Result<Queue> {
        if !self.path.exists() {
            return Ok(Queue::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading schedule: {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Queue::default());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing schedule: {}", self.path.display()))
    }

    fn save(&self, q: &Queue) -> Result<()> {
        write_atomic(&self.path, &serde_json::to_vec_pretty(q)?)
    }
}

impl Scheduler for FileScheduler {
    fn schedule_after(
        &self,
        now_ms: u64,
        delay: Duration,
        activation: Activation,
    ) -> Result<ScheduleHandle> {
        let mut q = self.load()?;
        let handle = q.push(now_ms, delay, activation);
        self.save(&q)?;
        Ok(handle)
    }

    fn list_scheduled(&self) -> Result<Vec<ScheduledActivation>> {
        Ok(self.load()?.entries)
    }

    fn cancel(&self, handle: &ScheduleHandle) -> Result<()> {
        let mut q = self.load()?;
        let before = q.entries.len();
        q.entries.retain(|e| &e.handle != handle);
        if q.entries.len() != before {
            self.save(&q)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryScheduler {
    queue: Mutex<Queue>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Scheduler for MemoryScheduler {
    fn schedule_after(
        &self,
        now_ms: u64,
        delay: Duration,
        activation: Activation,
    ) -> Result<ScheduleHandle> {
        Ok(self.lock().push(now_ms, delay, activation))
    }

    fn list_scheduled(&self) -> Result<Vec<ScheduledActivation>> {
        Ok(self.lock().entries.clone())
    }

    fn cancel(&self, handle: &ScheduleHandle) -> Result<()> {
        self.lock().entries.retain(|e| &e.handle != handle);
        Ok(())
    }
}
