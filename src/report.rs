use crate::{
    finalize::FinalizeOutcome,
    metrics::{MetricKind, Strategy},
    processor::{NextStep, StopReason},
    state::Series,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one activation did, for logs and `--print-summary` style output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub job_id: String,
    pub started_cursor: usize,
    pub cursor: usize,
    pub total: usize,
    pub processed: usize,
    pub stop: StopReason,
    pub next: NextStep,
    pub finalized: Option<FinalizeOutcome>,
}

/// Rows per strategy: one header row plus six labelled metric rows.
pub const ROWS_PER_STRATEGY: usize = MetricKind::ALL.len();

/// Block offsets of the date-stamped header rows.
pub const HEADER_ROWS: [usize; 2] = [0, ROWS_PER_STRATEGY];

/// The 14 x (2 + N) grid appended to the sheet on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    pub rows: Vec<Vec<String>>,
}

impl ReportBlock {
    /// `legacy_inp_rows` reproduces the historic layout in which both
    /// "Interaction to Next Paint" rows were filled from the mobile CLS series.
    pub fn build(
        series: &BTreeMap<(Strategy, MetricKind), Series>,
        date: &str,
        legacy_inp_rows: bool,
    ) -> Self {
        let mut rows = Vec::with_capacity(Strategy::ALL.len() * ROWS_PER_STRATEGY);
        for strategy in Strategy::ALL {
            for metric in MetricKind::ALL {
                let (first, label) = match metric {
                    MetricKind::Performance => (
                        date.to_string(),
                        format!("{} {}", strategy.title(), metric.label()),
                    ),
                    _ => (String::new(), metric.label().to_string()),
                };
                let source = if legacy_inp_rows && metric == MetricKind::Inp {
                    (Strategy::Mobile, MetricKind::Cls)
                } else {
                    (strategy, metric)
                };
                let mut row = vec![first, label];
                if let Some(values) = series.get(&source) {
                    row.extend(values.iter().map(|v| v.to_cell()));
                }
                rows.push(row);
            }
        }
        Self { rows }
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}
