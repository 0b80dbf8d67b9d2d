use crate::{
    finalize::Finalizer,
    host::Host,
    metrics::Strategy,
    report::ChunkReport,
    scheduler::Activation,
    state::{JobEvent, JobPhase, LeaseGrant, Write},
    util::fingerprint_urls,
};
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Continue,
    Finalize,
}

/// Continue while URLs remain, otherwise hand off to the finalizer.
pub fn decide_next(cursor: usize, total: usize) -> NextStep {
    if cursor < total {
        NextStep::Continue
    } else {
        NextStep::Finalize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BatchFull,
    TimeBudget,
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    /// Another activation holds the lease; this one did nothing.
    Busy { holder: String },
    /// No live job (cancelled before or during this activation).
    Abandoned,
    Progressed(ChunkReport),
}

pub struct BatchProcessor<'h, 'a> {
    host: &'h Host<'a>,
}

impl<'h, 'a> BatchProcessor<'h, 'a> {
    pub fn new(host: &'h Host<'a>) -> Self {
        Self { host }
    }

    /// One scheduled activation: process at most one chunk, persist the
    /// cursor, then either schedule the next activation or finalize.
    pub fn run_chunk(&self) -> Result<ChunkOutcome> {
        let state = self.host.state();
        if !state.phase()?.is_active() {
            info!("no job in progress; activation exits");
            return Ok(ChunkOutcome::Abandoned);
        }

        let now = self.host.clock.now_ms();
        let lease = match state.acquire_lease(now, self.host.cfg.batch.lease_timeout_ms)? {
            LeaseGrant::Held(held) => {
                warn!(
                    "another activation holds the lease (token={}); skipping",
                    held.token
                );
                return Ok(ChunkOutcome::Busy { holder: held.token });
            }
            LeaseGrant::Acquired(lease) => lease,
        };

        let result = self.run_leased();
        if let Err(err) = state.release_lease(&lease.token) {
            warn!("failed to release lease {}: {err:#}", lease.token);
        }
        result
    }

    fn run_leased(&self) -> Result<ChunkOutcome> {
        let host = self.host;
        let cfg = &host.cfg.batch;
        let state = host.state();

        let phase = state.phase()?;
        let Some(job_id) = state.job_id()? else {
            return Ok(ChunkOutcome::Abandoned);
        };

        let start_cursor = match phase {
            JobPhase::Running { cursor } => cursor,
            JobPhase::Finalizing => {
                // a previous activation committed the last chunk but never
                // finished writing the report
                let cursor = state.cursor()?.unwrap_or(0);
                let total = state
                    .url_count()?
                    .ok_or_else(|| anyhow!("job {job_id} has no stored URL count"))?;
                info!("job_id={job_id} resuming finalization at cursor={cursor}");
                let finalized = Finalizer::new(host).finalize()?;
                return Ok(ChunkOutcome::Progressed(ChunkReport {
                    job_id,
                    started_cursor: cursor,
                    cursor,
                    total,
                    processed: 0,
                    stop: StopReason::Exhausted,
                    next: NextStep::Finalize,
                    finalized: Some(finalized),
                }));
            }
            JobPhase::Idle => return Ok(ChunkOutcome::Abandoned),
        };

        let api_key = host
            .secrets
            .secret(&host.cfg.api.api_key_secret)
            .unwrap_or_else(|| {
                warn!(
                    "secret {} is not set; calling the API without a key",
                    host.cfg.api.api_key_secret
                );
                String::new()
            });

        let urls = host.read_urls()?;
        let fingerprint = fingerprint_urls(&urls);
        if state.url_fingerprint()?.as_deref() != Some(fingerprint.as_str()) {
            bail!(
                "URL list changed since job {job_id} started ({} URLs now); cancel and start again",
                urls.len()
            );
        }
        let total = urls.len();
        if start_cursor > total {
            return Err(anyhow!("cursor {start_cursor} is past the end of {total} URLs"));
        }

        let started = host.clock.now_ms();
        let budget = cfg.time_budget_ms;
        let mut cursor = start_cursor;
        let mut processed = 0usize;
        let mut out_of_time = false;

        while processed < cfg.batch_size && cursor < total {
            if state.job_id()?.as_deref() != Some(job_id.as_str()) {
                info!("job {job_id} was cancelled mid-chunk; abandoning");
                return Ok(ChunkOutcome::Abandoned);
            }

            let url = &urls[cursor];
            info!("processing URL {}/{}: {}", cursor + 1, total, url);

            let mobile = host.metrics.fetch(url, Strategy::Mobile, &api_key);
            let desktop = host.metrics.fetch(url, Strategy::Desktop, &api_key);

            for (strategy, record) in [(Strategy::Mobile, &mobile), (Strategy::Desktop, &desktop)] {
                if state.append_record(&job_id, strategy, record)? == Write::JobGone {
                    info!("job {job_id} was cancelled mid-chunk; abandoning");
                    return Ok(ChunkOutcome::Abandoned);
                }
            }

            cursor += 1;
            processed += 1;

            let elapsed = host.clock.now_ms().saturating_sub(started);
            if elapsed > budget {
                warn!("time budget exhausted after {processed} URLs ({elapsed}ms > {budget}ms)");
                out_of_time = true;
                break;
            }
        }

        let committed = state.commit(&job_id, JobEvent::ChunkCommitted { cursor, total })?;
        if committed == Write::JobGone {
            info!("job {job_id} was cancelled before its cursor was saved; abandoning");
            return Ok(ChunkOutcome::Abandoned);
        }

        let stop = if out_of_time {
            StopReason::TimeBudget
        } else if cursor >= total {
            StopReason::Exhausted
        } else {
            StopReason::BatchFull
        };
        debug!("job_id={job_id} phase={:?} stop={stop:?}", state.phase()?);

        let next = decide_next(cursor, total);
        let finalized = match next {
            NextStep::Continue => {
                let delay = Duration::from_millis(cfg.continuation_delay_ms);
                let handle = host.scheduler.schedule_after(
                    host.clock.now_ms(),
                    delay,
                    Activation::RunChunk,
                )?;
                info!(
                    "job_id={job_id} cursor={cursor}/{total}; next chunk {} in {:?}",
                    handle.0, delay
                );
                None
            }
            NextStep::Finalize => Some(Finalizer::new(host).finalize()?),
        };

        Ok(ChunkOutcome::Progressed(ChunkReport {
            job_id,
            started_cursor: start_cursor,
            cursor,
            total,
            processed,
            stop,
            next,
            finalized,
        }))
    }
}
