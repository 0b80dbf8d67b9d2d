use super::{HttpTransport, MetricSource, types::*};
use crate::config::Config;
use crate::metrics::{MetricKind, MetricRecord, MetricValue, Strategy};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.api.timeout_seconds))
            .user_agent(cfg.api.user_agent.clone())
            .danger_accept_invalid_certs(cfg.api.accept_invalid_certs)
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .with_context(|| format!("reading response body from {url}"))?;
        Ok(HttpResponse { status, body })
    }
}

pub struct PageSpeedClient<T: HttpTransport> {
    transport: T,
    endpoint: String,
    category: String,
}

impl<T: HttpTransport> PageSpeedClient<T> {
    pub fn new(cfg: &Config, transport: T) -> Self {
        Self {
            transport,
            endpoint: cfg.api.endpoint.clone(),
            category: cfg.api.category.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&self, url: &str, strategy: Strategy, api_key: &str) -> Result<MetricRecord> {
        let mut query = vec![
            ("url", url),
            ("strategy", strategy.as_str()),
            ("category", self.category.as_str()),
        ];
        if !api_key.is_empty() {
            query.push(("key", api_key));
        }

        let response = self.transport.get(&self.endpoint, &query)?;
        if response.status != 200 {
            error!(
                "HTTP error for {url} ({strategy}): response code {}",
                response.status
            );
            return Ok(MetricRecord::placeholder());
        }

        let parsed: PageSpeedResponse =
            serde_json::from_str(&response.body).with_context(|| "parsing PageSpeed JSON")?;
        Ok(record_from_response(url, strategy, &parsed))
    }
}

impl<T: HttpTransport> MetricSource for PageSpeedClient<T> {
    fn fetch(&self, url: &str, strategy: Strategy, api_key: &str) -> MetricRecord {
        let url = url.trim();
        if !url.starts_with("http") {
            debug!("skipping non-http cell {url:?} ({strategy})");
            return MetricRecord::placeholder();
        }
        match self.request(url, strategy, api_key) {
            Ok(record) => record,
            Err(err) => {
                warn!("fetch failed for {url} ({strategy}): {err:#}");
                MetricRecord::placeholder()
            }
        }
    }
}

/// Maps a 200 response body onto a record. An API error or a missing audit
/// map yields the all-placeholder record; otherwise each absent field is a
/// placeholder on its own.
pub fn record_from_response(url: &str, strategy: Strategy, resp: &PageSpeedResponse) -> MetricRecord {
    if let Some(err) = &resp.error {
        error!(
            "API error {} for {url} ({strategy}): {}",
            err.code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
            err.message.as_deref().unwrap_or("unknown error")
        );
        return MetricRecord::placeholder();
    }

    let Some(lighthouse) = &resp.lighthouse_result else {
        return MetricRecord::placeholder();
    };
    let Some(audits) = &lighthouse.audits else {
        return MetricRecord::placeholder();
    };

    let score = lighthouse
        .categories
        .as_ref()
        .and_then(|c| c.performance.as_ref())
        .and_then(|p| p.score)
        .map(|s| MetricValue::Score((s * 100.0).round().clamp(0.0, 100.0) as u32))
        .unwrap_or(MetricValue::Placeholder);

    let mut record = MetricRecord::placeholder().with(MetricKind::Performance, score);
    for kind in MetricKind::ALL {
        let Some(id) = kind.audit_id() else { continue };
        let value = audits
            .get(id)
            .and_then(|a| a.display_value.as_deref())
            .filter(|v| !v.trim().is_empty())
            .map(|v| MetricValue::Display(v.to_string()))
            .unwrap_or(MetricValue::Placeholder);
        record.set(kind, value);
    }
    record
}
