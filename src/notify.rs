use crate::util::{ensure_dir, now_rfc3339, sha256_hex};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Best-effort completion notice. Failures are the caller's to log.
pub trait Notifier {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<()>;
}

/// Drops each message as an RFC 822 file in a directory for a mail relay or
/// a human to pick up.
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<()> {
        ensure_dir(&self.dir)?;
        let date = now_rfc3339();
        let id = &sha256_hex(format!("{date}:{address}:{subject}").as_bytes())[..12];
        let path = self.dir.join(format!("{id}.eml"));
        let msg = format!("To: {address}\r\nSubject: {subject}\r\nDate: {date}\r\n\r\n{body}\r\n");
        std::fs::write(&path, msg).with_context(|| format!("write {}", path.display()))?;
        info!("notification queued to={address} file={}", path.display());
        Ok(())
    }
}

/// Records messages in memory and in the log.
#[derive(Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl LogNotifier {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for LogNotifier {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<()> {
        info!("notification to={address} subject={subject:?}");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((address.to_string(), subject.to_string(), body.to_string()));
        }
        Ok(())
    }
}
