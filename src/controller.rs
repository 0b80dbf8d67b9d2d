use crate::{
    host::Host,
    processor::{BatchProcessor, ChunkOutcome},
    scheduler::{Activation, ScheduleHandle, ScheduledActivation},
    state::JobPhase,
    util::{fingerprint_urls, mint_token},
};
use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct StartReceipt {
    pub job_id: String,
    pub url_count: usize,
    pub first_activation: ScheduleHandle,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelReceipt {
    pub had_job: bool,
    pub cancelled_activations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub job_id: Option<String>,
    pub cursor: Option<usize>,
    pub total: Option<usize>,
    pub pending: Vec<ScheduledActivation>,
}

pub struct JobController<'h, 'a> {
    host: &'h Host<'a>,
}

impl<'h, 'a> JobController<'h, 'a> {
    pub fn new(host: &'h Host<'a>) -> Self {
        Self { host }
    }

    /// Discards any previous job and schedules the first chunk.
    pub fn start(&self) -> Result<StartReceipt> {
        let host = self.host;
        self.cancel()?;

        let urls = host.read_urls()?;
        let now = host.clock.now_ms();
        let job_id = mint_token(&host.cfg.global.job_name, now);
        let state = host.state();
        state.reset(&job_id, &fingerprint_urls(&urls), urls.len())?;

        let handle = host.scheduler.schedule_after(
            now,
            Duration::from_millis(host.cfg.batch.initial_delay_ms),
            Activation::RunChunk,
        )?;
        info!(
            "job_id={job_id} started with {} URLs; phase={:?} first activation {}",
            urls.len(),
            state.phase()?,
            handle.0
        );

        Ok(StartReceipt {
            job_id,
            url_count: urls.len(),
            first_activation: handle,
        })
    }

    /// Stops future activations and wipes job state. An activation already
    /// running notices the missing state on its next write and exits.
    pub fn cancel(&self) -> Result<CancelReceipt> {
        let host = self.host;
        let cancelled_activations = host.scheduler.cancel_all()?;
        let prev = host.state().cancel()?;
        debug!("cancel: {prev:?} -> Idle, {cancelled_activations} activations removed");
        Ok(CancelReceipt {
            had_job: prev.is_active(),
            cancelled_activations,
        })
    }

    pub fn activate(&self, activation: Activation) -> Result<ChunkOutcome> {
        match activation {
            Activation::RunChunk => BatchProcessor::new(self.host).run_chunk(),
        }
    }

    /// Runs the earliest pending activation if it is due now.
    pub fn run_due(&self) -> Result<Option<ChunkOutcome>> {
        let host = self.host;
        let Some(next) = host.scheduler.next_due()? else {
            return Ok(None);
        };
        if next.due_at_ms > host.clock.now_ms() {
            return Ok(None);
        }
        host.scheduler.cancel(&next.handle)?;
        debug!("dispatching {}", next.handle.0);
        self.activate(next.activation).map(Some)
    }

    /// Drives the scheduler until nothing is pending, sleeping between
    /// activations with `sleep`.
    pub fn drain(&self, sleep: &mut dyn FnMut(Duration)) -> Result<Vec<ChunkOutcome>> {
        let host = self.host;
        let mut outcomes = Vec::new();
        while let Some(next) = host.scheduler.next_due()? {
            let now = host.clock.now_ms();
            if next.due_at_ms > now {
                sleep(Duration::from_millis(next.due_at_ms - now));
                continue;
            }
            if let Some(outcome) = self.run_due()? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    pub fn status(&self) -> Result<JobStatus> {
        let state = self.host.state();
        Ok(JobStatus {
            phase: state.phase()?,
            job_id: state.job_id()?,
            cursor: state.cursor()?,
            total: state.url_count()?,
            pending: self.host.scheduler.list_scheduled()?,
        })
    }
}
