//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::time::Duration;

pub use defaults::{
    DEFAULT_DEDUP_WINDOW_MS, DEFAULT_IDLE_REMINDER_MS, DEFAULT_QUIET_PERIOD_MS,
    DEFAULT_RELEASE_GRACE_MS, DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_STREAM_BASE, DEFAULT_TICK_MS,
};

/// CLI options for the turn-taking controller. Every product tuning constant is a
/// flag so deployments can adjust pacing without a rebuild.
#[derive(Debug, Parser, Clone)]
#[command(about = "Voiceturn session controller", author, version)]
pub struct AppConfig {
    /// Quiet period after the last recognized word before an utterance is finalized (milliseconds)
    #[arg(long = "quiet-period-ms", default_value_t = DEFAULT_QUIET_PERIOD_MS)]
    pub quiet_period_ms: u64,

    /// Window in which an identical finalized utterance is treated as a recognizer echo (milliseconds)
    #[arg(long = "dedup-window-ms", default_value_t = DEFAULT_DEDUP_WINDOW_MS)]
    pub dedup_window_ms: u64,

    /// How long to wait for assistant audio after a voice-originated send (milliseconds)
    #[arg(long = "response-timeout-ms", default_value_t = DEFAULT_RESPONSE_TIMEOUT_MS)]
    pub response_timeout_ms: u64,

    /// Grace delay after the last snippet so the playback device releases cleanly (milliseconds)
    #[arg(long = "release-grace-ms", default_value_t = DEFAULT_RELEASE_GRACE_MS)]
    pub release_grace_ms: u64,

    /// Idle time in voice mode before a gentle "still listening" reminder (milliseconds)
    #[arg(long = "idle-reminder-ms", default_value_t = DEFAULT_IDLE_REMINDER_MS)]
    pub idle_reminder_ms: u64,

    /// Base URL of the snippet streaming endpoint
    #[arg(long = "stream-base", env = "VOICETURN_STREAM_BASE", default_value = DEFAULT_STREAM_BASE)]
    pub stream_base: String,

    /// Event-loop tick interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Input surface active when the session opens
    #[arg(long = "mode", value_enum, default_value_t = StartMode::Voice)]
    pub start_mode: StartMode,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOICETURN_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOICETURN_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging utterance/message snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "VOICETURN_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

/// Input surface the session starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StartMode {
    Voice,
    Text,
}

impl StartMode {
    pub fn label(self) -> &'static str {
        match self {
            StartMode::Voice => "voice",
            StartMode::Text => "text",
        }
    }
}

/// Validated pacing constants handed to the coordinator and its components.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub quiet_period: Duration,
    pub dedup_window: Duration,
    pub response_timeout: Duration,
    pub release_grace: Duration,
    pub idle_reminder: Duration,
    pub stream_base: String,
    pub tick: Duration,
}

impl AppConfig {
    /// Snapshot the current CLI-controlled pacing values for downstream consumers.
    pub fn session_tuning(&self) -> SessionTuning {
        SessionTuning {
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            dedup_window: Duration::from_millis(self.dedup_window_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            release_grace: Duration::from_millis(self.release_grace_ms),
            idle_reminder: Duration::from_millis(self.idle_reminder_ms),
            stream_base: self.stream_base.clone(),
            tick: Duration::from_millis(self.tick_ms),
        }
    }
}
