use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static DEBUG_FROM_ENV: OnceLock<bool> = OnceLock::new();
static DEBUG_FORCED: AtomicBool = AtomicBool::new(false);

fn parse_flag(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}

fn debug_enabled() -> bool {
    DEBUG_FORCED.load(Ordering::Relaxed)
        || *DEBUG_FROM_ENV.get_or_init(|| {
            std::env::var("JIRA_DUMP_DEBUG")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(false)
        })
}

/// Turns on debug output regardless of `JIRA_DUMP_DEBUG`.
pub fn enable_debug() {
    DEBUG_FORCED.store(true, Ordering::Relaxed);
}

fn ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn debug(message: impl AsRef<str>) {
    if debug_enabled() {
        eprintln!("[{}][DEBUG] {}", ts(), message.as_ref());
    }
}

pub fn info(message: impl AsRef<str>) {
    eprintln!("[{}][INFO] {}", ts(), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("[{}][WARN] {}", ts(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("[{}][ERROR] {}", ts(), message.as_ref());
}
