//! Root state machine. Owns the mic-lock, the history watermark, the playback
//! ledger, and the interrupt surface; everything the UI observes funnels
//! through the snapshot it publishes.

mod interrupts;
mod scheduler;
mod timers;

pub use timers::{DeadlineSet, TimerKind};

use crate::capture::{CaptureSignal, CaptureState, SpeechRecognizer, TranscriptCapture};
use crate::config::{SessionTuning, StartMode};
use crate::conversation::{ConversationStore, MessageId, PlaybackState};
use crate::events::{SessionEvent, UiAction};
use crate::listener;
use crate::notice::NoticeSink;
use crate::player::{AudioOutput, PlayerSignal, SnippetPlayer};
use crate::snippets::SnippetCache;
use crate::{log_debug, log_debug_content};
use crossbeam_channel::{select, Receiver};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Which input surface is live: the recognizer or the text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Voice,
    Text,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            InputMode::Voice => "voice",
            InputMode::Text => "text",
        }
    }
}

impl From<StartMode> for InputMode {
    fn from(mode: StartMode) -> Self {
        match mode {
            StartMode::Voice => InputMode::Voice,
            StartMode::Text => InputMode::Text,
        }
    }
}

/// State the surrounding UI can observe. Mutated only by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSnapshot {
    pub mic_locked: bool,
    pub currently_playing_message_id: Option<MessageId>,
    pub is_paused: bool,
    pub recognition_paused: bool,
    pub voice_unavailable: bool,
    pub waiting_for_response: bool,
}

pub struct TurnCoordinator<S: ConversationStore> {
    store: S,
    capture: TranscriptCapture,
    player: SnippetPlayer,
    cache: SnippetCache,
    notices: Box<dyn NoticeSink>,
    timers: DeadlineSet,
    tuning: SessionTuning,
    mode: InputMode,
    /// Count of assistant messages that predate this session going live.
    /// Fixed once per mount, never decremented.
    watermark: Option<usize>,
    greeting_played: bool,
    editing: Option<MessageId>,
    waiting_for_response: bool,
    voice_unavailable: bool,
    reminder_sent: bool,
    snippet_counts: HashMap<MessageId, u32>,
    ended: bool,
}

impl<S: ConversationStore> TurnCoordinator<S> {
    pub fn new(
        store: S,
        recognizer: Box<dyn SpeechRecognizer>,
        output: Box<dyn AudioOutput>,
        notices: Box<dyn NoticeSink>,
        tuning: SessionTuning,
        mode: StartMode,
    ) -> Self {
        let capture = TranscriptCapture::new(recognizer, &tuning);
        let player = SnippetPlayer::new(output, &tuning);
        let cache = SnippetCache::new(tuning.stream_base.clone());
        Self {
            store,
            capture,
            player,
            cache,
            notices,
            timers: DeadlineSet::new(),
            tuning,
            mode: mode.into(),
            watermark: None,
            greeting_played: false,
            editing: None,
            waiting_for_response: false,
            voice_unavailable: false,
            reminder_sent: false,
            snippet_counts: HashMap::new(),
            ended: false,
        }
    }

    /// Bring the session live. Call once the initial conversation history has
    /// loaded: the watermark is fixed here and pre-existing assistant messages
    /// stay silent from then on.
    pub fn mount(&mut self, now: Instant) {
        self.ensure_watermark();
        if self.mode == InputMode::Voice {
            self.open_microphone();
        }
        self.schedule(now);
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn playback_state(&self, id: &MessageId) -> PlaybackState {
        self.player.playback_state(id)
    }

    pub fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            mic_locked: self.player.currently_playing().is_some(),
            currently_playing_message_id: self.player.currently_playing().cloned(),
            is_paused: self.player.is_paused(),
            recognition_paused: !self.capture.is_listening(),
            voice_unavailable: self.voice_unavailable,
            waiting_for_response: self.waiting_for_response,
        }
    }

    pub fn handle(&mut self, event: SessionEvent, now: Instant) {
        if self.ended {
            return;
        }
        match event {
            SessionEvent::Recognizer(event) => {
                if let Some(signal) = self.capture.handle_event(event, now, &mut self.timers) {
                    self.on_capture_signal(signal, now);
                }
            }
            SessionEvent::Playback(event) => {
                let signal = self
                    .player
                    .handle_event(event, now, &self.cache, &mut self.timers);
                if let Some(signal) = signal {
                    self.on_player_signal(signal, now);
                }
            }
            SessionEvent::Push(notice) => {
                if listener::apply_notice(&notice, &self.player, &mut self.cache) {
                    self.schedule(now);
                }
            }
            SessionEvent::MessagesChanged => self.on_messages_changed(now),
            SessionEvent::Ui(action) => self.on_ui(action, now),
        }
    }

    /// Fire any due deadlines, then re-arm the idle reminder if the session is
    /// quietly listening.
    pub fn tick(&mut self, now: Instant) {
        if self.ended {
            return;
        }
        for kind in self.timers.drain_due(now) {
            match kind {
                TimerKind::UtteranceFinalize => {
                    if let Some(signal) = self.capture.finalize(now) {
                        self.on_capture_signal(signal, now);
                    }
                }
                TimerKind::ResponseTimeout => self.on_response_timeout(),
                TimerKind::ReleaseGrace => {
                    if let Some(signal) = self.player.finish_drain() {
                        self.on_player_signal(signal, now);
                    }
                }
                TimerKind::IdleReminder => self.on_idle_reminder(),
            }
        }
        self.arm_idle_reminder(now);
    }

    /// Drive the controller with the real clock until the session ends or
    /// every event producer hangs up.
    pub fn run(&mut self, events: &Receiver<SessionEvent>) {
        let tick_interval = self.tuning.tick;
        while !self.ended {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        let now = Instant::now();
                        self.handle(event, now);
                        self.tick(now);
                    }
                    Err(_) => break,
                },
                default(tick_interval) => self.tick(Instant::now()),
            }
        }
    }

    /// Toggle the microphone on or off by hand.
    pub fn toggle_recording(&mut self, _now: Instant) {
        if self.ended {
            return;
        }
        match self.capture.state() {
            CaptureState::Listening => {
                self.capture.stop(&mut self.timers);
                self.notices.notice(
                    "Recording stopped",
                    "The microphone stays off until you start it again.",
                );
            }
            CaptureState::Stopped | CaptureState::Paused => {
                if self.mode != InputMode::Voice {
                    self.notices
                        .notice("Voice is off", "Switch to voice mode to use the microphone.");
                    return;
                }
                if self.player.currently_playing().is_some() || self.editing.is_some() {
                    self.notices.notice(
                        "Microphone is busy",
                        "Wait for playback to finish or stop it first.",
                    );
                    return;
                }
                self.open_microphone();
            }
        }
    }

    /// Manual replay of one assistant message. Bypasses the watermark; a
    /// fully-played message still no-ops and the loaded message toggles pause.
    pub fn play(&mut self, id: &MessageId, now: Instant) {
        if self.ended || self.editing.is_some() {
            return;
        }
        let Some(message) = self.store.messages().into_iter().find(|m| &m.id == id) else {
            log_debug(&format!("play requested for unknown message {id}"));
            return;
        };
        if !message.is_assistant() {
            log_debug(&format!("play ignored for user message {id}"));
            return;
        }
        self.begin_playback(&message, now);
        self.sync_microphone(now);
    }

    fn on_ui(&mut self, action: UiAction, now: Instant) {
        match action {
            UiAction::ToggleRecording => self.toggle_recording(now),
            UiAction::Play(id) => self.play(&id, now),
            UiAction::InterruptPlayback => self.interrupt_playback(now),
            UiAction::SetMode(mode) => self.set_mode(mode, now),
            UiAction::BeginEdit(id) => self.begin_edit(&id, now),
            UiAction::SubmitEdit(id, text) => self.submit_edit(&id, &text, now),
            UiAction::CancelEdit => self.cancel_edit(now),
            UiAction::EndSession => self.end_session(),
        }
    }

    fn on_capture_signal(&mut self, signal: CaptureSignal, now: Instant) {
        match signal {
            CaptureSignal::Utterance(text) => {
                self.reminder_sent = false;
                self.timers.clear(TimerKind::IdleReminder);
                log_debug_content(&format!("finalized utterance: {text}"));
                match self.store.send_message(&text) {
                    Ok(id) => {
                        log_debug(&format!("voice message {id} sent"));
                        self.waiting_for_response = true;
                        self.timers.set(
                            TimerKind::ResponseTimeout,
                            now + self.tuning.response_timeout,
                        );
                    }
                    Err(err) => {
                        log_debug(&format!("send_message failed: {err:#}"));
                        self.notices.notice(
                            "Message not sent",
                            "Your words could not be delivered. Please try again.",
                        );
                    }
                }
            }
            CaptureSignal::Fault(err) => {
                log_debug(&format!(
                    "recognition fault ({}): {}",
                    err.kind.label(),
                    err.detail
                ));
                self.notices.notice(
                    "Recording error",
                    "There was an error with the voice recording.",
                );
            }
        }
    }

    fn on_player_signal(&mut self, signal: PlayerSignal, now: Instant) {
        match signal {
            PlayerSignal::Started { message_id } => {
                log_debug(&format!("audible playback started for {message_id}"));
                self.reminder_sent = false;
                self.waiting_for_response = false;
                self.voice_unavailable = false;
                self.timers.clear(TimerKind::ResponseTimeout);
                self.timers.clear(TimerKind::IdleReminder);
            }
            PlayerSignal::FullyPlayed { message_id } => {
                log_debug(&format!("{message_id} fully played"));
                self.sync_microphone(now);
                self.schedule(now);
            }
            PlayerSignal::Failed { message_id, detail } => {
                log_debug(&format!("playback failed for {message_id}: {detail}"));
                self.notices.notice(
                    "Audio error",
                    "Could not stream that reply. Tap play to fetch the full audio instead.",
                );
                self.sync_microphone(now);
            }
            PlayerSignal::Stalled { message_id } => {
                log_debug(&format!("playback for {message_id} waiting on synthesis"));
                self.sync_microphone(now);
            }
        }
    }

    fn on_messages_changed(&mut self, now: Instant) {
        self.ensure_watermark();
        self.prune_departed();
        self.sync_microphone(now);
        self.schedule(now);
    }

    /// Fix the watermark on first sight of the conversation. Everything at or
    /// below it is marked fully-played without producing audio, so a reconnect
    /// or refresh never replays history. A lone greeting is the fresh-session
    /// opener, not history, and stays eligible.
    fn ensure_watermark(&mut self) {
        if self.watermark.is_some() {
            return;
        }
        let messages = self.store.messages();
        let lone_greeting =
            matches!(&messages[..], [only] if only.is_assistant() && only.is_greeting);
        if lone_greeting {
            self.watermark = Some(0);
            return;
        }
        let mut count = 0usize;
        for message in &messages {
            if message.is_assistant() {
                count += 1;
                self.player.mark_played(&message.id);
            }
        }
        self.watermark = Some(count);
        if count > 0 {
            log_debug(&format!(
                "history watermark fixed at {count} assistant messages; history stays silent"
            ));
        }
    }

    /// Drop bookkeeping for messages the store no longer has (edits invalidate
    /// downstream turns). Cuts off playback of a message that vanished.
    fn prune_departed(&mut self) {
        let present: HashSet<MessageId> =
            self.store.messages().into_iter().map(|m| m.id).collect();
        self.snippet_counts.retain(|id, _| present.contains(id));
        self.cache.retain(|id| present.contains(id));
        let playing_departed = self
            .player
            .currently_playing()
            .map(|id| !present.contains(id))
            .unwrap_or(false);
        if playing_departed {
            log_debug("current playback invalidated; cutting it off");
        }
        self.player.retain(|id| present.contains(id), &mut self.timers);
    }

    /// Enforce the mic-lock invariant: capture never runs while the playback
    /// device is held or an edit is in flight.
    fn sync_microphone(&mut self, _now: Instant) {
        let must_lock = self.player.currently_playing().is_some() || self.editing.is_some();
        if must_lock {
            self.capture.pause(&mut self.timers);
        } else if self.mode == InputMode::Voice {
            if let Err(err) = self.capture.resume(&mut self.timers) {
                log_debug(&format!("capture resume failed: {err:#}"));
                self.notices
                    .notice("Recording error", "The microphone could not be resumed.");
            }
        }
    }

    fn open_microphone(&mut self) {
        match self.capture.start(&mut self.timers) {
            Ok(()) => self.notices.notice(
                "Recording started",
                "Speak naturally. Your message sends after a short pause.",
            ),
            Err(err) => {
                log_debug(&format!("capture start failed: {err:#}"));
                self.notices
                    .notice("Recording error", "The microphone could not be started.");
            }
        }
    }

    fn arm_idle_reminder(&mut self, now: Instant) {
        let idle = self.mode == InputMode::Voice
            && !self.reminder_sent
            && !self.waiting_for_response
            && self.editing.is_none()
            && self.player.currently_playing().is_none()
            && self.capture.is_listening();
        if idle {
            if !self.timers.is_set(TimerKind::IdleReminder) {
                self.timers
                    .set(TimerKind::IdleReminder, now + self.tuning.idle_reminder);
            }
        } else {
            self.timers.clear(TimerKind::IdleReminder);
        }
    }

    fn on_idle_reminder(&mut self) {
        // Mid-utterance silence is not idleness; let the finalize timer win.
        if self.capture.has_pending_speech() {
            return;
        }
        self.reminder_sent = true;
        self.notices
            .notice("Still listening", "Take your time. Speak whenever you're ready.");
    }
}
