//! Snippet playback: one assistant message's speech as an ordered chain of
//! sentence-scoped audio fragments, preloaded before each audible start and
//! advanced strictly in ascending index order.

use crate::config::SessionTuning;
use crate::conversation::{MessageId, PlaybackState};
use crate::coordinator::{DeadlineSet, TimerKind};
use crate::events::PlaybackEvent;
use crate::log_debug;
use crate::snippets::SnippetCache;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Command surface onto the audio-output collaborator. Buffering, completion,
/// and failure arrive separately as [`PlaybackEvent`]s on the session queue.
pub trait AudioOutput {
    /// Begin fetching and buffering one snippet; audible playback must not start yet.
    fn load(&mut self, message_id: &MessageId, index: u32, url: &str) -> Result<()>;
    /// Start audible playback of the buffered snippet.
    fn start(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Halt the in-flight snippet, seeking it to end-of-stream, and release the device.
    fn stop(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chain {
    Idle,
    /// Fetching and buffering a snippet, waiting for the buffered signal.
    Loading { id: MessageId, index: u32 },
    Audible { id: MessageId, index: u32 },
    Paused { id: MessageId, index: u32 },
    /// All snippets played; waiting out the device-release grace.
    Draining { id: MessageId },
}

impl Chain {
    fn message_id(&self) -> Option<&MessageId> {
        match self {
            Chain::Idle => None,
            Chain::Loading { id, .. }
            | Chain::Audible { id, .. }
            | Chain::Paused { id, .. }
            | Chain::Draining { id } => Some(id),
        }
    }
}

/// What the coordinator needs to know about a chain transition.
#[derive(Debug, PartialEq)]
pub enum PlayerSignal {
    /// Audible playback actually began for this message.
    Started { message_id: MessageId },
    /// Every snippet of the message played and the device released.
    FullyPlayed { message_id: MessageId },
    /// The chain aborted on a playback error; the message stays replayable.
    Failed { message_id: MessageId, detail: String },
    /// The snippet is not synthesized yet; the chain unwound quietly and a
    /// later availability notice re-arms it.
    Stalled { message_id: MessageId },
}

pub struct SnippetPlayer {
    output: Box<dyn AudioOutput>,
    chain: Chain,
    counts: HashMap<MessageId, u32>,
    /// Next snippet index not yet finished, per message.
    progress: HashMap<MessageId, u32>,
    played: HashSet<MessageId>,
    release_grace: Duration,
}

impl SnippetPlayer {
    pub fn new(output: Box<dyn AudioOutput>, tuning: &SessionTuning) -> Self {
        Self {
            output,
            chain: Chain::Idle,
            counts: HashMap::new(),
            progress: HashMap::new(),
            played: HashSet::new(),
            release_grace: tuning.release_grace,
        }
    }

    pub fn is_played(&self, id: &MessageId) -> bool {
        self.played.contains(id)
    }

    /// Mark a message consumed without producing audio (history pre-mark, skip).
    pub fn mark_played(&mut self, id: &MessageId) {
        self.played.insert(id.clone());
    }

    /// Message currently owning the playback device, if any. A draining
    /// message still owns it until the grace delay elapses.
    pub fn currently_playing(&self) -> Option<&MessageId> {
        self.chain.message_id()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.chain, Chain::Paused { .. })
    }

    pub fn current_index(&self) -> Option<u32> {
        match &self.chain {
            Chain::Loading { index, .. }
            | Chain::Audible { index, .. }
            | Chain::Paused { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Next snippet index not yet finished for a message.
    pub fn next_unplayed(&self, id: &MessageId) -> u32 {
        self.progress.get(id).copied().unwrap_or(0)
    }

    pub fn playback_state(&self, id: &MessageId) -> PlaybackState {
        if self.played.contains(id) && self.chain.message_id() != Some(id) {
            return PlaybackState::FullyPlayed;
        }
        match &self.chain {
            Chain::Loading { id: current, .. } if current == id => PlaybackState::Queued,
            Chain::Audible { id: current, .. }
            | Chain::Paused { id: current, .. }
            | Chain::Draining { id: current }
                if current == id =>
            {
                PlaybackState::Playing
            }
            _ => PlaybackState::Unseen,
        }
    }

    /// Drop bookkeeping for messages that left the conversation, cutting off
    /// the active chain if its message vanished.
    pub fn retain(&mut self, keep: impl Fn(&MessageId) -> bool, timers: &mut DeadlineSet) {
        self.counts.retain(|id, _| keep(id));
        self.progress.retain(|id, _| keep(id));
        self.played.retain(|id| keep(id));
        let departed = self
            .chain
            .message_id()
            .map(|id| !keep(id))
            .unwrap_or(false);
        if departed {
            self.stop(timers);
        }
    }

    /// Begin (or toggle) playback of a message. A fully-played message is a
    /// no-op; the message currently loaded toggles pause instead of
    /// restarting. Any other active chain is cut off first.
    pub fn play(
        &mut self,
        id: &MessageId,
        snippet_count: u32,
        cache: &SnippetCache,
        timers: &mut DeadlineSet,
    ) -> Result<()> {
        if self.played.contains(id) {
            log_debug(&format!("play ignored for fully-played message {id}"));
            return Ok(());
        }
        if self.chain.message_id() == Some(id) {
            return self.toggle_pause(id);
        }
        self.stop(timers);
        if snippet_count == 0 {
            // Nothing to synthesize; consume the message silently.
            self.played.insert(id.clone());
            return Ok(());
        }
        self.counts.insert(id.clone(), snippet_count);
        let index = self.next_unplayed(id).min(snippet_count.saturating_sub(1));
        self.load_snippet(id.clone(), index, cache)
    }

    /// Pause the audible snippet or resume a paused one.
    pub fn toggle_pause(&mut self, id: &MessageId) -> Result<()> {
        match &self.chain {
            Chain::Audible { id: current, index } if current == id => {
                let (id, index) = (current.clone(), *index);
                self.output.pause()?;
                self.chain = Chain::Paused { id, index };
                Ok(())
            }
            Chain::Paused { id: current, index } if current == id => {
                let (id, index) = (current.clone(), *index);
                self.output.resume()?;
                self.chain = Chain::Audible { id, index };
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Cut off any in-flight snippet and clear chain state. Idempotent.
    pub fn stop(&mut self, timers: &mut DeadlineSet) {
        if self.chain != Chain::Idle {
            if let Err(err) = self.output.stop() {
                log_debug(&format!("audio output stop failed: {err:#}"));
            }
        }
        self.chain = Chain::Idle;
        timers.clear(TimerKind::ReleaseGrace);
    }

    pub fn handle_event(
        &mut self,
        event: PlaybackEvent,
        now: Instant,
        cache: &SnippetCache,
        timers: &mut DeadlineSet,
    ) -> Option<PlayerSignal> {
        match event {
            PlaybackEvent::Buffered { message_id, index } => {
                let matches = matches!(
                    &self.chain,
                    Chain::Loading { id, index: loading } if *id == message_id && *loading == index
                );
                if !matches {
                    log_debug(&format!(
                        "ignoring stale buffered signal for {message_id} snippet {index}"
                    ));
                    return None;
                }
                match self.output.start() {
                    Ok(()) => {
                        self.chain = Chain::Audible {
                            id: message_id.clone(),
                            index,
                        };
                        Some(PlayerSignal::Started { message_id })
                    }
                    Err(err) => self.abort_chain(message_id, format!("start failed: {err:#}")),
                }
            }
            PlaybackEvent::Finished { message_id, index } => {
                let matches = match &self.chain {
                    Chain::Audible { id, index: current } | Chain::Paused { id, index: current } => {
                        *id == message_id && *current == index
                    }
                    _ => false,
                };
                if !matches {
                    log_debug(&format!(
                        "ignoring stale finished signal for {message_id} snippet {index}"
                    ));
                    return None;
                }
                self.progress.insert(message_id.clone(), index + 1);
                let count = self.counts.get(&message_id).copied().unwrap_or(index + 1);
                if index + 1 < count {
                    // Chain straight into the next sentence of the same message.
                    match self.load_snippet(message_id.clone(), index + 1, cache) {
                        Ok(()) => None,
                        Err(err) => self
                            .abort_chain(message_id, format!("next snippet load failed: {err:#}")),
                    }
                } else {
                    self.played.insert(message_id.clone());
                    self.chain = Chain::Draining { id: message_id };
                    timers.set(TimerKind::ReleaseGrace, now + self.release_grace);
                    None
                }
            }
            PlaybackEvent::Failed {
                message_id,
                index,
                transient,
                detail,
            } => {
                if self.chain.message_id() != Some(&message_id) {
                    log_debug(&format!(
                        "ignoring stale failure for {message_id} snippet {index}"
                    ));
                    return None;
                }
                if let Err(err) = self.output.stop() {
                    log_debug(&format!("audio output stop after failure failed: {err:#}"));
                }
                self.chain = Chain::Idle;
                timers.clear(TimerKind::ReleaseGrace);
                if transient {
                    log_debug(&format!(
                        "snippet {index} of {message_id} not available yet; waiting for a notice"
                    ));
                    Some(PlayerSignal::Stalled { message_id })
                } else {
                    Some(PlayerSignal::Failed { message_id, detail })
                }
            }
        }
    }

    /// Called when the release-grace deadline fires: clear the playing pointer
    /// and tell the coordinator the message is done.
    pub fn finish_drain(&mut self) -> Option<PlayerSignal> {
        let Chain::Draining { id } = self.chain.clone() else {
            return None;
        };
        self.chain = Chain::Idle;
        Some(PlayerSignal::FullyPlayed { message_id: id })
    }

    fn load_snippet(&mut self, id: MessageId, index: u32, cache: &SnippetCache) -> Result<()> {
        let url = cache.resolve(&id, index);
        self.output.load(&id, index, &url)?;
        self.chain = Chain::Loading { id, index };
        Ok(())
    }

    fn abort_chain(&mut self, message_id: MessageId, detail: String) -> Option<PlayerSignal> {
        if let Err(err) = self.output.stop() {
            log_debug(&format!("audio output stop after abort failed: {err:#}"));
        }
        self.chain = Chain::Idle;
        Some(PlayerSignal::Failed { message_id, detail })
    }
}
