//! Typed view of the job state held in a [`KeyValueStore`].
//!
//! This module is the only place that knows the key layout and the series
//! encoding. Every write that would extend a job first checks the job still
//! exists, so an activation that outlives a `cancel` cannot resurrect keys.

use crate::metrics::{MetricKind, MetricRecord, MetricValue, Strategy};
use crate::store::KeyValueStore;
use crate::util::mint_token;
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

const CURSOR: &str = "cursor";
const PHASE: &str = "phase";
const JOB_ID: &str = "job_id";
const URL_FINGERPRINT: &str = "url_fingerprint";
const URL_COUNT: &str = "url_count";
const LEASE: &str = "lease";

const PHASE_RUNNING: &str = "running";
const PHASE_FINALIZING: &str = "finalizing";

pub fn series_key(strategy: Strategy, metric: MetricKind) -> String {
    format!("{}_{}_scores", strategy.as_str(), metric.key())
}

pub fn all_series_keys() -> Vec<String> {
    Strategy::ALL
        .iter()
        .flat_map(|&s| MetricKind::ALL.iter().map(move |&m| series_key(s, m)))
        .collect()
}

pub type Series = Vec<MetricValue>;

pub fn encode_series(series: &[MetricValue]) -> Result<String> {
    serde_json::to_string(series).with_context(|| "encoding series")
}

pub fn decode_series(raw: &str) -> Result<Series> {
    serde_json::from_str(raw).with_context(|| "decoding series")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobPhase {
    Running { cursor: usize },
    Finalizing,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Start,
    ChunkCommitted { cursor: usize, total: usize },
    Finalized,
    Cancel,
}

impl JobPhase {
    /// The single transition function for the job lifecycle.
    pub fn on(self, event: JobEvent) -> Result<JobPhase> {
        match (self, event) {
            (_, JobEvent::Start) => Ok(JobPhase::Running { cursor: 0 }),
            (_, JobEvent::Cancel) => Ok(JobPhase::Idle),
            (JobPhase::Running { cursor: from }, JobEvent::ChunkCommitted { cursor, total }) => {
                if cursor < from || cursor > total {
                    bail!("cursor moved from {from} to {cursor} with total {total}");
                }
                if cursor == total {
                    Ok(JobPhase::Finalizing)
                } else {
                    Ok(JobPhase::Running { cursor })
                }
            }
            (JobPhase::Finalizing, JobEvent::Finalized) => Ok(JobPhase::Idle),
            (phase, event) => Err(anyhow!("invalid transition: {phase:?} on {event:?}")),
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobPhase::Running { .. } | JobPhase::Finalizing)
    }
}

/// Result of a write that requires the job to still exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Applied,
    JobGone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub token: String,
    pub acquired_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseGrant {
    Acquired(Lease),
    /// Another activation holds a live lease.
    Held(Lease),
}

pub struct JobStateRepository<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> JobStateRepository<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Fresh job: cursor 0, all fourteen series empty.
    pub fn reset(&self, job_id: &str, fingerprint: &str, url_count: usize) -> Result<()> {
        let next = self.phase()?.on(JobEvent::Start)?;
        let empty = encode_series(&[])?;
        for key in all_series_keys() {
            self.store.set(&key, &empty)?;
        }
        self.store.set(JOB_ID, job_id)?;
        self.store.set(URL_FINGERPRINT, fingerprint)?;
        self.store.set(URL_COUNT, &url_count.to_string())?;
        // cursor last: its presence is what marks the job as live
        self.persist(next, JobEvent::Start)
    }

    /// Applies `event` to the stored phase and writes the resulting phase.
    /// Only the live job may advance; a stale `job_id` gets `JobGone`.
    pub fn commit(&self, job_id: &str, event: JobEvent) -> Result<Write> {
        if !self.is_live(job_id)? {
            return Ok(Write::JobGone);
        }
        let next = self.phase()?.on(event)?;
        self.persist(next, event)?;
        Ok(Write::Applied)
    }

    /// Cancels whatever job is stored and returns the phase it was in.
    pub fn cancel(&self) -> Result<JobPhase> {
        let prev = self.phase()?;
        let next = prev.on(JobEvent::Cancel)?;
        self.persist(next, JobEvent::Cancel)?;
        Ok(prev)
    }

    fn persist(&self, next: JobPhase, event: JobEvent) -> Result<()> {
        match next {
            JobPhase::Running { cursor } => {
                self.store.set(PHASE, PHASE_RUNNING)?;
                self.store.set(CURSOR, &cursor.to_string())
            }
            JobPhase::Finalizing => {
                if let JobEvent::ChunkCommitted { cursor, .. } = event {
                    self.store.set(CURSOR, &cursor.to_string())?;
                }
                self.store.set(PHASE, PHASE_FINALIZING)
            }
            JobPhase::Idle => self.clear(),
        }
    }

    fn is_live(&self, job_id: &str) -> Result<bool> {
        Ok(self.job_id()?.as_deref() == Some(job_id) && self.cursor()?.is_some())
    }

    /// Removes every job key. Safe to call repeatedly.
    pub fn clear(&self) -> Result<()> {
        // cursor first so concurrent readers see "no job" before partial state
        self.store.delete(CURSOR)?;
        for key in all_series_keys() {
            self.store.delete(&key)?;
        }
        for key in [PHASE, JOB_ID, URL_FINGERPRINT, URL_COUNT, LEASE] {
            self.store.delete(key)?;
        }
        Ok(())
    }

    pub fn cursor(&self) -> Result<Option<usize>> {
        match self.store.get(CURSOR)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map(Some)
                .with_context(|| format!("cursor is not an integer: {raw:?}")),
        }
    }

    pub fn job_id(&self) -> Result<Option<String>> {
        self.store.get(JOB_ID)
    }

    pub fn url_fingerprint(&self) -> Result<Option<String>> {
        self.store.get(URL_FINGERPRINT)
    }

    pub fn url_count(&self) -> Result<Option<usize>> {
        match self.store.get(URL_COUNT)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map(Some)
                .with_context(|| format!("url_count is not an integer: {raw:?}")),
        }
    }

    pub fn phase(&self) -> Result<JobPhase> {
        let Some(cursor) = self.cursor()? else {
            return Ok(JobPhase::Idle);
        };
        match self.store.get(PHASE)?.as_deref() {
            Some(PHASE_FINALIZING) => Ok(JobPhase::Finalizing),
            _ => Ok(JobPhase::Running { cursor }),
        }
    }

    pub fn series(&self, strategy: Strategy, metric: MetricKind) -> Result<Option<Series>> {
        match self.store.get(&series_key(strategy, metric))? {
            None => Ok(None),
            Some(raw) => decode_series(&raw).map(Some),
        }
    }

    /// Appends one value to each of the strategy's seven series. A different
    /// live job or a missing series means this one was cancelled underneath us.
    pub fn append_record(
        &self,
        job_id: &str,
        strategy: Strategy,
        record: &MetricRecord,
    ) -> Result<Write> {
        if !self.is_live(job_id)? {
            return Ok(Write::JobGone);
        }
        for (metric, value) in record.iter() {
            let key = series_key(strategy, metric);
            let Some(raw) = self.store.get(&key)? else {
                return Ok(Write::JobGone);
            };
            let mut series = decode_series(&raw).with_context(|| format!("series {key}"))?;
            series.push(value.clone());
            self.store.set(&key, &encode_series(&series)?)?;
        }
        Ok(Write::Applied)
    }

    /// All fourteen series; `None` if any one is missing.
    pub fn all_series(&self) -> Result<Option<BTreeMap<(Strategy, MetricKind), Series>>> {
        let mut out = BTreeMap::new();
        for strategy in Strategy::ALL {
            for metric in MetricKind::ALL {
                let Some(series) = self.series(strategy, metric)? else {
                    return Ok(None);
                };
                out.insert((strategy, metric), series);
            }
        }
        Ok(Some(out))
    }

    pub fn lease(&self) -> Result<Option<Lease>> {
        match self.store.get(LEASE)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .with_context(|| "decoding lease"),
        }
    }

    /// Claims the single-activation lease. A lease older than `timeout_ms`
    /// belongs to an activation that died and is taken over.
    pub fn acquire_lease(&self, now_ms: u64, timeout_ms: u64) -> Result<LeaseGrant> {
        if let Some(held) = self.lease()? {
            let age = now_ms.saturating_sub(held.acquired_at_ms);
            if age <= timeout_ms {
                return Ok(LeaseGrant::Held(held));
            }
            warn!(
                "taking over stale lease token={} age_ms={}",
                held.token,
                age
            );
        }
        let lease = Lease {
            token: mint_token("lease", now_ms),
            acquired_at_ms: now_ms,
        };
        self.store.set(LEASE, &serde_json::to_string(&lease)?)?;
        Ok(LeaseGrant::Acquired(lease))
    }

    /// Drops the lease if it is still ours.
    pub fn release_lease(&self, token: &str) -> Result<()> {
        if let Some(held) = self.lease()? {
            if held.token == token {
                self.store.delete(LEASE)?;
            }
        }
        Ok(())
    }
}
