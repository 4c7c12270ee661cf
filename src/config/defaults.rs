/// Quiet period before a partial transcript is finalized.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 2_000;
/// Window in which an identical finalized utterance counts as a recognizer echo.
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 3_000;
/// Wait for assistant audio before degrading to text mode.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 60_000;
/// Device-release grace after the final snippet of a message.
pub const DEFAULT_RELEASE_GRACE_MS: u64 = 250;
/// Idle delay before the "still listening" reminder.
pub const DEFAULT_IDLE_REMINDER_MS: u64 = 10_000;
/// Default snippet streaming endpoint.
pub const DEFAULT_STREAM_BASE: &str = "http://localhost:8000";
/// Event-loop tick interval.
pub const DEFAULT_TICK_MS: u64 = 50;

pub(super) const MIN_QUIET_PERIOD_MS: u64 = 200;
pub(super) const MAX_QUIET_PERIOD_MS: u64 = 10_000;
pub(super) const MAX_DEDUP_WINDOW_MS: u64 = 15_000;
pub(super) const MIN_RESPONSE_TIMEOUT_MS: u64 = 5_000;
pub(super) const MAX_RESPONSE_TIMEOUT_MS: u64 = 300_000;
pub(super) const MIN_RELEASE_GRACE_MS: u64 = 50;
pub(super) const MAX_RELEASE_GRACE_MS: u64 = 5_000;
pub(super) const MIN_IDLE_REMINDER_MS: u64 = 1_000;
pub(super) const MAX_IDLE_REMINDER_MS: u64 = 120_000;
pub(super) const MIN_TICK_MS: u64 = 10;
pub(super) const MAX_TICK_MS: u64 = 1_000;
pub(super) const MAX_STREAM_BASE_LEN: usize = 512;
