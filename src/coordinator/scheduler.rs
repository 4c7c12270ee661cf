//! Scheduling pass: decide which assistant message speaks next. Runs whenever
//! the message list changes, a snippet becomes available, or a message
//! finishes playing.

use std::time::Instant;

use crate::conversation::{snippet_count, ConversationStore, Message};
use crate::log_debug;

use super::{InputMode, TurnCoordinator};

impl<S: ConversationStore> TurnCoordinator<S> {
    /// Walk the conversation in arrival order and start the first eligible
    /// assistant message. Strictly one at a time: an unready message blocks
    /// everything behind it rather than being skipped.
    pub(super) fn schedule(&mut self, now: Instant) {
        if self.ended || self.mode != InputMode::Voice || self.editing.is_some() {
            return;
        }
        if self.player.currently_playing().is_some() {
            return;
        }
        let messages = self.store.messages();
        if let Some(greeting) = self.pending_greeting(&messages) {
            let greeting = greeting.clone();
            self.greeting_played = true;
            self.begin_playback(&greeting, now);
            return;
        }
        let watermark = self.watermark.unwrap_or(0);
        let mut assistant_seen = 0usize;
        for message in &messages {
            if !message.is_assistant() {
                continue;
            }
            assistant_seen += 1;
            // History at or below the watermark never auto-plays.
            if assistant_seen <= watermark {
                continue;
            }
            if self.player.is_played(&message.id) {
                continue;
            }
            if !self.playback_expected(message) {
                return;
            }
            self.begin_playback(message, now);
            if self.player.currently_playing().is_some() {
                return;
            }
            if self.player.is_played(&message.id) {
                // Consumed silently (no snippets); keep scanning.
                continue;
            }
            return;
        }
    }

    /// The sole greeting, auto-played exactly once, tracked independently of
    /// the watermark.
    fn pending_greeting<'a>(&self, messages: &'a [Message]) -> Option<&'a Message> {
        if self.greeting_played {
            return None;
        }
        match messages {
            [only] if only.is_assistant() && only.is_greeting && !self.player.is_played(&only.id) => {
                Some(only)
            }
            _ => None,
        }
    }

    /// A message is schedulable once its text finished generating or the
    /// backend confirmed a URL for its next snippet. The optimistic derived
    /// URL alone is not enough for a message still streaming in.
    fn playback_expected(&self, message: &Message) -> bool {
        message.complete
            || self
                .cache
                .has_confirmed(&message.id, self.player.next_unplayed(&message.id))
    }

    /// Lock the mic and hand one message to the player.
    pub(super) fn begin_playback(&mut self, message: &Message, now: Instant) {
        let count = *self
            .snippet_counts
            .entry(message.id.clone())
            .or_insert_with(|| snippet_count(&message.content));
        // Mic goes quiet before any audio can start.
        self.capture.pause(&mut self.timers);
        match self
            .player
            .play(&message.id, count, &self.cache, &mut self.timers)
        {
            Ok(()) => {
                if self.player.currently_playing().is_some() {
                    log_debug(&format!(
                        "playback queued for {} ({count} snippets)",
                        message.id
                    ));
                } else {
                    // Nothing to play after all; free the mic again.
                    self.sync_microphone(now);
                }
            }
            Err(err) => {
                log_debug(&format!(
                    "failed to start playback for {}: {err:#}",
                    message.id
                ));
                self.notices
                    .notice("Audio error", "Could not start that reply's audio.");
                self.sync_microphone(now);
            }
        }
    }
}
