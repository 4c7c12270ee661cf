pub mod capture;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod events;
pub mod listener;
mod logging;
pub mod notice;
pub mod player;
pub mod snippets;
mod telemetry;

pub use coordinator::{InputMode, TurnCoordinator, TurnSnapshot};
pub use events::{PlaybackEvent, RecognizerEvent, SessionEvent, SnippetNotice};
pub use logging::{init_logging, log_debug, log_debug_content};
pub use telemetry::init_tracing;
