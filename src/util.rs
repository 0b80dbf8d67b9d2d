use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn ensure_parent(p: &Path) -> Result<()> {
    match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

/// Order-sensitive digest of a URL list. Cells are length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn fingerprint_urls(urls: &[String]) -> String {
    let mut h = Sha256::new();
    h.update((urls.len() as u64).to_le_bytes());
    for url in urls {
        h.update((url.len() as u64).to_le_bytes());
        h.update(url.as_bytes());
    }
    format!("{:x}", h.finalize())
}

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Short random-enough token for job ids and leases.
pub fn mint_token(seed: &str, now_ms: u64) -> String {
    let seq = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed);
    let raw = format!("{seed}:{now_ms}:{}:{seq}", std::process::id());
    sha256_hex(raw.as_bytes())[..16].to_string()
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn format_date(unix_ms: u64, offset_minutes: i32, pattern: &str) -> Result<String> {
    let offset = UtcOffset::from_whole_seconds(offset_minutes * 60)
        .map_err(|e| anyhow!("invalid utc offset {offset_minutes}m: {e}"))?;
    let at = OffsetDateTime::from_unix_timestamp_nanos(unix_ms as i128 * 1_000_000)
        .map_err(|e| anyhow!("timestamp out of range: {e}"))?
        .to_offset(offset);
    let fmt = time::format_description::parse(pattern)
        .map_err(|e| anyhow!("invalid date format {pattern:?}: {e}"))?;
    at.format(&fmt)
        .map_err(|e| anyhow!("formatting date: {e}"))
}

/// Write through a sibling temp file and rename, so readers only ever see a
/// complete file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.sync_all().ok();
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
}
