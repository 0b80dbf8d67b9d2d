use crate::{
    host::Host,
    report::{HEADER_ROWS, ReportBlock},
    sheet::CellRange,
    state::{JobEvent, Write, series_key},
    util::format_date,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Nothing to write: the job had already been cleared.
    NoJob,
    Written {
        start_row: usize,
        rows: usize,
        cols: usize,
        notified: bool,
    },
}

pub struct Finalizer<'h, 'a> {
    host: &'h Host<'a>,
}

impl<'h, 'a> Finalizer<'h, 'a> {
    pub fn new(host: &'h Host<'a>) -> Self {
        Self { host }
    }

    /// Writes the report block, notifies, and clears all job state.
    pub fn finalize(&self) -> Result<FinalizeOutcome> {
        let host = self.host;
        let state = host.state();

        let Some(cursor) = state.cursor()? else {
            info!("finalize found no job state; nothing to write");
            return Ok(FinalizeOutcome::NoJob);
        };
        let job_id = state.job_id()?.context("job state has a cursor but no job id")?;
        // only a job that committed its last chunk may be finalized
        state.phase()?.on(JobEvent::Finalized)?;

        let url_count = state.url_count()?.context("job state has no URL count")?;
        if cursor != url_count {
            bail!("cursor {cursor} does not match the {url_count} URLs of job {job_id}");
        }
        let Some(series) = state.all_series()? else {
            bail!("job state is incomplete: a metric series is missing");
        };
        for ((strategy, metric), values) in &series {
            if values.len() != cursor {
                bail!(
                    "series {} has {} values but cursor is {cursor}",
                    series_key(*strategy, *metric),
                    values.len()
                );
            }
        }

        let report_cfg = &host.cfg.report;
        let date = format_date(
            host.clock.now_ms(),
            report_cfg.utc_offset_minutes,
            &report_cfg.date_format,
        )?;
        let block = ReportBlock::build(&series, &date, report_cfg.legacy_inp_rows);

        let start_row = host.sheet.last_row()? + 2;
        host.sheet.write_range(start_row, 1, &block.rows)?;
        for offset in HEADER_ROWS {
            host.sheet.set_bold(CellRange {
                row: start_row + offset,
                col: 1,
                rows: 1,
                cols: 2,
            })?;
        }
        info!(
            "report written at row {start_row}: {} rows x {} cols",
            block.rows.len(),
            block.width()
        );

        let notify = &host.cfg.notify;
        let notified = if notify.enabled() {
            match host.notifier.send(&notify.email, &notify.subject, &notify.body) {
                Ok(()) => true,
                Err(err) => {
                    warn!("completion notice to {} failed: {err:#}", notify.email);
                    false
                }
            }
        } else {
            false
        };

        host.scheduler.cancel_all()?;
        if state.commit(&job_id, JobEvent::Finalized)? == Write::JobGone {
            info!("job {job_id} was cancelled while its report was written");
        }

        Ok(FinalizeOutcome::Written {
            start_row,
            rows: block.rows.len(),
            cols: block.width(),
            notified,
        })
    }
}
