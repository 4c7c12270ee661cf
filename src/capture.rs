//! Transcript capture: wraps continuous speech recognition, finalizes an
//! utterance after a quiet period, and guards against the recognizer
//! re-emitting a stale result right after resuming.

use crate::config::SessionTuning;
use crate::coordinator::{DeadlineSet, TimerKind};
use crate::events::{RecognitionError, RecognitionErrorKind, RecognizerEvent};
use crate::log_debug;
use anyhow::Result;
use std::time::{Duration, Instant};

/// Start/stop handle onto the speech-recognition collaborator. Recognition
/// results arrive separately as [`RecognizerEvent`]s on the session queue.
pub trait SpeechRecognizer {
    /// Begin (or restart) a continuous recognition session.
    fn start(&mut self) -> Result<()>;
    /// Tear down the active recognition session, releasing the capture device.
    fn stop(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not capturing; requires an explicit start.
    Stopped,
    Listening,
    /// Suspended by the coordinator (playback or edit); resumable.
    Paused,
}

/// Outcome of feeding one recognizer event (or a finalize firing) through capture.
#[derive(Debug, PartialEq)]
pub enum CaptureSignal {
    /// A finalized utterance ready to send.
    Utterance(String),
    /// Recognition failed; capture stopped and needs a manual start.
    Fault(RecognitionError),
}

pub struct TranscriptCapture {
    recognizer: Box<dyn SpeechRecognizer>,
    state: CaptureState,
    buffer: String,
    has_speech: bool,
    last_final: Option<(String, Instant)>,
    quiet_period: Duration,
    dedup_window: Duration,
}

impl TranscriptCapture {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>, tuning: &SessionTuning) -> Self {
        Self {
            recognizer,
            state: CaptureState::Stopped,
            buffer: String::new(),
            has_speech: false,
            last_final: None,
            quiet_period: tuning.quiet_period,
            dedup_window: tuning.dedup_window,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// Words have been heard but not yet finalized.
    pub fn has_pending_speech(&self) -> bool {
        self.has_speech
    }

    /// Begin capturing. Idempotent while already listening.
    pub fn start(&mut self, timers: &mut DeadlineSet) -> Result<()> {
        if self.state == CaptureState::Listening {
            return Ok(());
        }
        self.reset_buffer(timers);
        self.recognizer.start()?;
        self.state = CaptureState::Listening;
        Ok(())
    }

    /// Suspend capture, tearing the recognition session down so the capture
    /// device is actually released. Idempotent.
    pub fn pause(&mut self, timers: &mut DeadlineSet) {
        if self.state != CaptureState::Listening {
            return;
        }
        if let Err(err) = self.recognizer.stop() {
            log_debug(&format!("recognizer stop during pause failed: {err:#}"));
        }
        self.reset_buffer(timers);
        self.state = CaptureState::Paused;
    }

    /// Undo a pause. Does nothing when stopped: a fault or explicit stop
    /// requires a fresh `start`.
    pub fn resume(&mut self, timers: &mut DeadlineSet) -> Result<()> {
        if self.state != CaptureState::Paused {
            return Ok(());
        }
        self.reset_buffer(timers);
        self.recognizer.start()?;
        self.state = CaptureState::Listening;
        Ok(())
    }

    /// Stop capturing entirely. Idempotent.
    pub fn stop(&mut self, timers: &mut DeadlineSet) {
        if self.state == CaptureState::Listening {
            if let Err(err) = self.recognizer.stop() {
                log_debug(&format!("recognizer stop failed: {err:#}"));
            }
        }
        self.reset_buffer(timers);
        self.state = CaptureState::Stopped;
    }

    pub fn handle_event(
        &mut self,
        event: RecognizerEvent,
        now: Instant,
        timers: &mut DeadlineSet,
    ) -> Option<CaptureSignal> {
        match event {
            RecognizerEvent::Partial { text } => {
                // Results racing a teardown are dropped.
                if self.state != CaptureState::Listening {
                    return None;
                }
                if !text.trim().is_empty() {
                    self.buffer = text;
                    self.has_speech = true;
                    timers.set(TimerKind::UtteranceFinalize, now + self.quiet_period);
                }
                None
            }
            RecognizerEvent::Ended => {
                if self.state != CaptureState::Listening {
                    return None;
                }
                // Benign end-of-stream: restart so capture stays continuous.
                match self.recognizer.start() {
                    Ok(()) => None,
                    Err(err) => {
                        self.reset_buffer(timers);
                        self.state = CaptureState::Stopped;
                        Some(CaptureSignal::Fault(RecognitionError::new(
                            RecognitionErrorKind::Device,
                            format!("restart after end-of-stream failed: {err:#}"),
                        )))
                    }
                }
            }
            RecognizerEvent::Error(err) => {
                if err.is_transient() {
                    log_debug("recognizer reported no speech; capture continues");
                    return None;
                }
                if let Err(stop_err) = self.recognizer.stop() {
                    log_debug(&format!("recognizer stop after error failed: {stop_err:#}"));
                }
                self.reset_buffer(timers);
                self.state = CaptureState::Stopped;
                Some(CaptureSignal::Fault(err))
            }
        }
    }

    /// Called when the finalize deadline fires: emit the buffered utterance
    /// unless it is empty or a duplicate inside the dedup window.
    pub fn finalize(&mut self, now: Instant) -> Option<CaptureSignal> {
        if !self.has_speech {
            return None;
        }
        let text = collapse_whitespace(&self.buffer);
        self.buffer.clear();
        self.has_speech = false;
        if text.is_empty() {
            return None;
        }
        if let Some((previous, at)) = &self.last_final {
            if *previous == text && now.duration_since(*at) <= self.dedup_window {
                log_debug("discarding duplicate utterance inside dedup window");
                return None;
            }
        }
        self.last_final = Some((text.clone(), now));
        Some(CaptureSignal::Utterance(text))
    }

    fn reset_buffer(&mut self, timers: &mut DeadlineSet) {
        self.buffer.clear();
        self.has_speech = false;
        timers.clear(TimerKind::UtteranceFinalize);
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
