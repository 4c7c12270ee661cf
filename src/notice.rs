//! Fire-and-forget user-facing notices. Not required for correctness; the UI
//! may surface them as toasts or drop them entirely.

use crate::log_debug;

pub trait NoticeSink {
    fn notice(&self, title: &str, detail: &str);
}

/// Routes notices into the debug log; the default for headless runs.
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn notice(&self, title: &str, detail: &str) {
        log_debug(&format!("notice|{title}|{detail}"));
    }
}

/// Drops every notice.
pub struct NullNotices;

impl NoticeSink for NullNotices {
    fn notice(&self, _title: &str, _detail: &str) {}
}
