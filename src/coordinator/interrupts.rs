//! Interrupt surface: edits, mode switches, timeouts, and session teardown.
//! Each one must cut off in-flight audio or recognition within a single event
//! and leave no armed deadline behind.

use std::time::Instant;

use crate::conversation::{ConversationStore, MessageId};
use crate::log_debug;

use super::{InputMode, TimerKind, TurnCoordinator};

impl<S: ConversationStore> TurnCoordinator<S> {
    /// Stop playback immediately and hand control to the edit surface for one
    /// message. Recognition stays force-paused until the edit resolves.
    pub fn begin_edit(&mut self, id: &MessageId, now: Instant) {
        if self.ended {
            return;
        }
        self.player.stop(&mut self.timers);
        self.editing = Some(id.clone());
        self.waiting_for_response = false;
        self.timers.clear(TimerKind::ResponseTimeout);
        self.timers.clear(TimerKind::IdleReminder);
        self.sync_microphone(now);
        log_debug(&format!("editing {id}; playback cut off"));
    }

    /// Commit an edit: rewrite the message, drop everything downstream, and
    /// queue a fresh response from that point.
    pub fn submit_edit(&mut self, id: &MessageId, text: &str, now: Instant) {
        if self.ended {
            return;
        }
        if self.editing.as_ref() != Some(id) {
            log_debug(&format!("submit_edit for {id} without an active edit"));
            return;
        }
        let result = self
            .store
            .edit_message(id, text)
            .and_then(|_| self.store.invalidate_from(id))
            .and_then(|_| self.store.regenerate_after(id));
        if let Err(err) = result {
            log_debug(&format!("edit of {id} failed: {err:#}"));
            self.notices.notice(
                "Edit failed",
                "Your change could not be saved. Please try again.",
            );
            // Stay in the edit so the user can retry or cancel.
            return;
        }
        self.editing = None;
        self.reminder_sent = false;
        self.prune_departed();
        self.sync_microphone(now);
        self.schedule(now);
    }

    pub fn cancel_edit(&mut self, now: Instant) {
        if self.ended || self.editing.take().is_none() {
            return;
        }
        self.sync_microphone(now);
        self.schedule(now);
    }

    /// Flip between the recognizer and the text box. Playback stops; messages
    /// are untouched, so an unfinished reply resumes on the way back to voice.
    pub fn set_mode(&mut self, mode: InputMode, now: Instant) {
        if self.ended || self.mode == mode {
            return;
        }
        self.player.stop(&mut self.timers);
        self.mode = mode;
        self.reminder_sent = false;
        self.timers.clear(TimerKind::IdleReminder);
        log_debug(&format!("input mode switched to {}", mode.label()));
        match mode {
            InputMode::Voice => {
                self.open_microphone();
                self.schedule(now);
            }
            InputMode::Text => {
                self.capture.stop(&mut self.timers);
                self.waiting_for_response = false;
                self.timers.clear(TimerKind::ResponseTimeout);
            }
        }
    }

    /// Cut off the active message. The skipped message counts as consumed so
    /// the scheduler does not immediately resurrect it.
    pub fn interrupt_playback(&mut self, now: Instant) {
        if self.ended {
            return;
        }
        if let Some(current) = self.player.currently_playing().cloned() {
            self.player.mark_played(&current);
            log_debug(&format!("playback of {current} interrupted"));
        }
        self.player.stop(&mut self.timers);
        self.sync_microphone(now);
    }

    /// No assistant audio arrived in time: degrade to text and stop waiting.
    /// The next successful audible start clears the flag again.
    pub(super) fn on_response_timeout(&mut self) {
        if !self.waiting_for_response {
            return;
        }
        log_debug("response timeout: no assistant audio arrived");
        self.waiting_for_response = false;
        self.voice_unavailable = true;
        self.notices.notice(
            "Voice is unavailable",
            "No reply audio arrived. Switch to text to continue.",
        );
    }

    /// Release every device and timer unconditionally, whatever the state.
    pub fn end_session(&mut self) {
        if self.ended {
            return;
        }
        self.player.stop(&mut self.timers);
        self.capture.stop(&mut self.timers);
        self.timers.clear_all();
        self.editing = None;
        self.waiting_for_response = false;
        self.voice_unavailable = false;
        self.ended = true;
        log_debug("session ended; audio and recognition released");
    }
}
