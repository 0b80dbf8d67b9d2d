use anyhow::{Result, anyhow};
use speed_sweep::{
    config::Config,
    fetch::{HttpResponse, HttpTransport, MetricSource, PageSpeedClient},
    metrics::{MetricKind, MetricRecord, MetricValue, Strategy},
};
use std::sync::Mutex;

struct StubTransport {
    reply: std::result::Result<HttpResponse, String>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StubTransport {
    fn status(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            reply: Err(msg.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpTransport for StubTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push((
            url.to_string(),
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

fn client(transport: StubTransport) -> PageSpeedClient<StubTransport> {
    PageSpeedClient::new(&Config::default(), transport)
}

const FULL_BODY: &str = r#"{
  "lighthouseResult": {
    "categories": { "performance": { "score": 0.876 } },
    "audits": {
      "first-contentful-paint": { "displayValue": "1.2 s" },
      "speed-index": { "displayValue": "2.9 s" },
      "total-blocking-time": { "displayValue": "140 ms" },
      "largest-contentful-paint": { "displayValue": "2.4 s" },
      "cumulative-layout-shift": { "displayValue": "0.05" },
      "interaction-to-next-paint": { "displayValue": "180 ms" }
    }
  }
}"#;

#[test]
fn non_http_input_skips_the_network() {
    let c = client(StubTransport::status(200, FULL_BODY));
    for input in ["not-a-url", "", "   ", "ftp://example.com"] {
        assert_eq!(
            c.fetch(input, Strategy::Mobile, "k"),
            MetricRecord::placeholder(),
            "{input:?}"
        );
    }
    assert!(c.transport().calls().is_empty());
}

#[test]
fn server_error_yields_placeholder_record() {
    let c = client(StubTransport::status(500, "internal error"));
    let record = c.fetch("http://x", Strategy::Mobile, "k");
    assert!(record.is_placeholder());
    assert_eq!(c.transport().calls().len(), 1);
}

#[test]
fn api_error_body_yields_placeholder_record() {
    let body = r#"{"error": {"code": 400, "message": "Lighthouse returned error: NO_FCP"}}"#;
    let c = client(StubTransport::status(200, body));
    assert!(c.fetch("https://x", Strategy::Desktop, "k").is_placeholder());
}

#[test]
fn transport_failure_yields_placeholder_record() {
    let c = client(StubTransport::failing("connection reset"));
    assert!(c.fetch("https://x", Strategy::Mobile, "k").is_placeholder());
}

#[test]
fn malformed_json_yields_placeholder_record() {
    let c = client(StubTransport::status(200, "<html>not json</html>"));
    assert!(c.fetch("https://x", Strategy::Mobile, "k").is_placeholder());
}

#[test]
fn full_response_maps_every_metric() {
    let c = client(StubTransport::status(200, FULL_BODY));
    let record = c.fetch("https://x", Strategy::Mobile, "k");
    assert_eq!(record.get(MetricKind::Performance), &MetricValue::Score(88));
    assert_eq!(
        record.get(MetricKind::Fcp),
        &MetricValue::Display("1.2 s".into())
    );
    assert_eq!(
        record.get(MetricKind::Cls),
        &MetricValue::Display("0.05".into())
    );
    assert_eq!(
        record.get(MetricKind::Inp),
        &MetricValue::Display("180 ms".into())
    );
}

#[test]
fn missing_audits_are_placeholders_individually() {
    let body = r#"{
      "lighthouseResult": {
        "categories": { "performance": { "score": 0.5 } },
        "audits": {
          "speed-index": { "displayValue": "3.0 s" },
          "total-blocking-time": {}
        }
      }
    }"#;
    let c = client(StubTransport::status(200, body));
    let record = c.fetch("https://x", Strategy::Mobile, "k");
    assert_eq!(record.get(MetricKind::Performance), &MetricValue::Score(50));
    assert_eq!(
        record.get(MetricKind::Si),
        &MetricValue::Display("3.0 s".into())
    );
    for kind in [
        MetricKind::Fcp,
        MetricKind::Tbt,
        MetricKind::Lcp,
        MetricKind::Cls,
        MetricKind::Inp,
    ] {
        assert!(record.get(kind).is_placeholder(), "{kind:?}");
    }
}

#[test]
fn null_score_is_a_placeholder() {
    let body = r#"{
      "lighthouseResult": {
        "categories": { "performance": { "score": null } },
        "audits": { "speed-index": { "displayValue": "3.0 s" } }
      }
    }"#;
    let c = client(StubTransport::status(200, body));
    let record = c.fetch("https://x", Strategy::Mobile, "k");
    assert!(record.get(MetricKind::Performance).is_placeholder());
    assert!(!record.get(MetricKind::Si).is_placeholder());
}

#[test]
fn response_without_audits_is_all_placeholders() {
    let body = r#"{"lighthouseResult": {"categories": {"performance": {"score": 0.9}}}}"#;
    let c = client(StubTransport::status(200, body));
    assert!(c.fetch("https://x", Strategy::Mobile, "k").is_placeholder());
}

#[test]
fn request_carries_strategy_category_and_key() {
    let c = client(StubTransport::status(200, FULL_BODY));
    c.fetch("  https://example.com/a?b=c  ", Strategy::Desktop, "secret");

    let calls = c.transport().calls();
    assert_eq!(calls.len(), 1);
    let (endpoint, query) = &calls[0];
    assert_eq!(endpoint, &Config::default().api.endpoint);
    let get = |k: &str| {
        query
            .iter()
            .find(|(name, _)| name == k)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(get("url").as_deref(), Some("https://example.com/a?b=c"));
    assert_eq!(get("strategy").as_deref(), Some("desktop"));
    assert_eq!(get("category").as_deref(), Some("PERFORMANCE"));
    assert_eq!(get("key").as_deref(), Some("secret"));
}

#[test]
fn empty_api_key_is_not_sent() {
    let c = client(StubTransport::status(200, FULL_BODY));
    c.fetch("https://x", Strategy::Mobile, "");
    let calls = c.transport().calls();
    assert!(calls[0].1.iter().all(|(k, _)| k != "key"));
}
