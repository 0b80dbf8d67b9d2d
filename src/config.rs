use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub batch: Batch,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub notify: Notify,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub job_name: String,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            job_name: "page-speed".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub state_file: String,
    pub schedule_file: String,
    pub sheet_file: String,
    pub outbox_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            state_file: ".speed-sweep/state.json".into(),
            schedule_file: ".speed-sweep/schedule.json".into(),
            sheet_file: "page-speed.csv".into(),
            outbox_dir: ".speed-sweep/outbox".into(),
        }
    }
}

/// Where the URL row lives in the sheet. Both coordinates are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    pub url_row: usize,
    pub url_col: usize,
}
impl Default for Input {
    fn default() -> Self {
        Self {
            url_row: 3,
            url_col: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_size: usize,
    pub time_budget_ms: u64,
    pub initial_delay_ms: u64,
    pub continuation_delay_ms: u64,
    pub lease_timeout_ms: u64,
}
impl Default for Batch {
    fn default() -> Self {
        Self {
            batch_size: 5,
            time_budget_ms: 270_000,
            initial_delay_ms: 1_000,
            continuation_delay_ms: 60_000,
            lease_timeout_ms: 360_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    pub endpoint: String,
    pub api_key_secret: String,
    pub category: String,
    pub timeout_seconds: u64,
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}
impl Default for Api {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/pagespeedonline/v5/runPagespeed".into(),
            api_key_secret: "PAGESPEED_API_KEY".into(),
            category: "PERFORMANCE".into(),
            timeout_seconds: 120,
            accept_invalid_certs: false,
            user_agent: concat!("speed-sweep/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub date_format: String,
    pub utc_offset_minutes: i32,
    pub legacy_inp_rows: bool,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            date_format: "[day]/[month]/[year]".into(),
            utc_offset_minutes: 0,
            legacy_inp_rows: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notify {
    pub email: String,
    pub subject: String,
    pub body: String,
}
impl Default for Notify {
    fn default() -> Self {
        Self {
            email: "".into(),
            subject: "PageSpeed sweep complete".into(),
            body: "The automated PageSpeed analysis has finished successfully.".into(),
        }
    }
}

impl Notify {
    /// Blank and the example address both mean "don't send".
    pub fn enabled(&self) -> bool {
        let email = self.email.trim();
        !email.is_empty() && email != "your.email@example.com"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: ".speed-sweep/speed-sweep.log".into(),
        }
    }
}
