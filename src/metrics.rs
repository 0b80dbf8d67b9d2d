use serde::{Deserialize, Serialize};
use std::fmt;

pub const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Mobile, Strategy::Desktop];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Strategy::Mobile => "Mobile",
            Strategy::Desktop => "Desktop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Performance,
    Fcp,
    Si,
    Tbt,
    Lcp,
    Cls,
    Inp,
}

impl MetricKind {
    /// Record and report order.
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Performance,
        MetricKind::Fcp,
        MetricKind::Si,
        MetricKind::Tbt,
        MetricKind::Lcp,
        MetricKind::Cls,
        MetricKind::Inp,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MetricKind::Performance => "performance",
            MetricKind::Fcp => "fcp",
            MetricKind::Si => "si",
            MetricKind::Tbt => "tbt",
            MetricKind::Lcp => "lcp",
            MetricKind::Cls => "cls",
            MetricKind::Inp => "inp",
        }
    }

    /// Lighthouse audit id; the performance score is a category, not an audit.
    pub fn audit_id(self) -> Option<&'static str> {
        match self {
            MetricKind::Performance => None,
            MetricKind::Fcp => Some("first-contentful-paint"),
            MetricKind::Si => Some("speed-index"),
            MetricKind::Tbt => Some("total-blocking-time"),
            MetricKind::Lcp => Some("largest-contentful-paint"),
            MetricKind::Cls => Some("cumulative-layout-shift"),
            MetricKind::Inp => Some("interaction-to-next-paint"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Performance => "Performance",
            MetricKind::Fcp => "First Contentful Paint",
            MetricKind::Si => "Speed Index",
            MetricKind::Tbt => "Total Blocking Time",
            MetricKind::Lcp => "Largest Contentful Paint",
            MetricKind::Cls => "Cumulative Layout Shift",
            MetricKind::Inp => "Interaction to Next Paint",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One measured value. `Placeholder` covers every flavour of "no data" and
/// is stored as the bare string `"-"`, so it cannot be told apart from a
/// series cell that was written as `"-"` for any other reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMetric", into = "RawMetric")]
pub enum MetricValue {
    Score(u32),
    Display(String),
    Placeholder,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMetric {
    Number(u32),
    Text(String),
}

impl From<RawMetric> for MetricValue {
    fn from(raw: RawMetric) -> Self {
        match raw {
            RawMetric::Number(n) => MetricValue::Score(n),
            RawMetric::Text(s) if s == PLACEHOLDER => MetricValue::Placeholder,
            RawMetric::Text(s) => MetricValue::Display(s),
        }
    }
}

impl From<MetricValue> for RawMetric {
    fn from(v: MetricValue) -> Self {
        match v {
            MetricValue::Score(n) => RawMetric::Number(n),
            MetricValue::Display(s) => RawMetric::Text(s),
            MetricValue::Placeholder => RawMetric::Text(PLACEHOLDER.to_string()),
        }
    }
}

impl MetricValue {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, MetricValue::Placeholder)
    }

    /// Sheet cell text.
    pub fn to_cell(&self) -> String {
        match self {
            MetricValue::Score(n) => n.to_string(),
            MetricValue::Display(s) => s.clone(),
            MetricValue::Placeholder => PLACEHOLDER.to_string(),
        }
    }
}

/// One value per [`MetricKind`], always fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    values: [MetricValue; 7],
}

impl MetricRecord {
    pub fn placeholder() -> Self {
        Self {
            values: std::array::from_fn(|_| MetricValue::Placeholder),
        }
    }

    pub fn get(&self, kind: MetricKind) -> &MetricValue {
        &self.values[kind.index()]
    }

    pub fn set(&mut self, kind: MetricKind, value: MetricValue) {
        self.values[kind.index()] = value;
    }

    pub fn with(mut self, kind: MetricKind, value: MetricValue) -> Self {
        self.set(kind, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &MetricValue)> {
        MetricKind::ALL.iter().map(move |&k| (k, self.get(k)))
    }

    pub fn is_placeholder(&self) -> bool {
        self.values.iter().all(MetricValue::is_placeholder)
    }
}
