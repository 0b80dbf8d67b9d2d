pub mod pagespeed;
pub mod types;

use crate::metrics::{MetricRecord, Strategy};
use anyhow::Result;

pub use pagespeed::{PageSpeedClient, ReqwestTransport};
pub use types::HttpResponse;

/// Produces a metric record for one URL under one strategy. Infallible by
/// contract: every failure is folded into placeholders so the batch loop
/// always appends exactly one record per strategy.
pub trait MetricSource {
    fn fetch(&self, url: &str, strategy: Strategy, api_key: &str) -> MetricRecord;
}

pub trait HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse>;
}
