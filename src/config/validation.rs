use super::defaults::{
    MAX_DEDUP_WINDOW_MS, MAX_IDLE_REMINDER_MS, MAX_QUIET_PERIOD_MS, MAX_RELEASE_GRACE_MS,
    MAX_RESPONSE_TIMEOUT_MS, MAX_STREAM_BASE_LEN, MAX_TICK_MS, MIN_IDLE_REMINDER_MS,
    MIN_QUIET_PERIOD_MS, MIN_RELEASE_GRACE_MS, MIN_RESPONSE_TIMEOUT_MS, MIN_TICK_MS,
};
use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the stream base.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_QUIET_PERIOD_MS..=MAX_QUIET_PERIOD_MS).contains(&self.quiet_period_ms) {
            bail!(
                "--quiet-period-ms must be between {MIN_QUIET_PERIOD_MS} and {MAX_QUIET_PERIOD_MS}, got {}",
                self.quiet_period_ms
            );
        }
        if self.dedup_window_ms < self.quiet_period_ms || self.dedup_window_ms > MAX_DEDUP_WINDOW_MS
        {
            bail!(
                "--dedup-window-ms must be >= --quiet-period-ms ({}) and <= {MAX_DEDUP_WINDOW_MS}, got {}",
                self.quiet_period_ms,
                self.dedup_window_ms
            );
        }
        if !(MIN_RESPONSE_TIMEOUT_MS..=MAX_RESPONSE_TIMEOUT_MS).contains(&self.response_timeout_ms)
        {
            bail!(
                "--response-timeout-ms must be between {MIN_RESPONSE_TIMEOUT_MS} and {MAX_RESPONSE_TIMEOUT_MS}, got {}",
                self.response_timeout_ms
            );
        }
        if !(MIN_RELEASE_GRACE_MS..=MAX_RELEASE_GRACE_MS).contains(&self.release_grace_ms) {
            bail!(
                "--release-grace-ms must be between {MIN_RELEASE_GRACE_MS} and {MAX_RELEASE_GRACE_MS}, got {}",
                self.release_grace_ms
            );
        }
        if !(MIN_IDLE_REMINDER_MS..=MAX_IDLE_REMINDER_MS).contains(&self.idle_reminder_ms) {
            bail!(
                "--idle-reminder-ms must be between {MIN_IDLE_REMINDER_MS} and {MAX_IDLE_REMINDER_MS}, got {}",
                self.idle_reminder_ms
            );
        }
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.tick_ms) {
            bail!(
                "--tick-ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.tick_ms
            );
        }

        let trimmed = self.stream_base.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            bail!("--stream-base cannot be empty");
        }
        if trimmed.len() > MAX_STREAM_BASE_LEN {
            bail!("--stream-base must be <= {MAX_STREAM_BASE_LEN} characters");
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            bail!("--stream-base must start with http:// or https://, got '{trimmed}'");
        }
        if trimmed.chars().any(char::is_whitespace) {
            bail!("--stream-base must not contain whitespace");
        }
        self.stream_base = trimmed;

        Ok(())
    }
}
