//! Events bridged from collaborators into the single session queue. All three
//! external streams (recognition, playback, push notices) plus UI actions
//! arrive here so the coordinator sees one ordered timeline.

use crate::conversation::MessageId;
use crate::coordinator::InputMode;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Everything the coordinator can observe, as one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Recognizer(RecognizerEvent),
    Playback(PlaybackEvent),
    Push(SnippetNotice),
    /// The conversation store changed (message added, edited, or invalidated).
    MessagesChanged,
    Ui(UiAction),
}

/// Raw events from the speech-recognition collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// Cumulative transcript of the in-flight utterance.
    Partial { text: String },
    /// Benign end-of-stream; capture restarts itself unless paused.
    Ended,
    Error(RecognitionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    pub detail: String,
}

impl RecognitionError {
    pub fn new(kind: RecognitionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// "No speech" is not an error; capture silently continues.
    pub fn is_transient(&self) -> bool {
        self.kind == RecognitionErrorKind::NoSpeech
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    NoSpeech,
    Device,
    Network,
}

impl RecognitionErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            RecognitionErrorKind::NoSpeech => "no-speech",
            RecognitionErrorKind::Device => "device",
            RecognitionErrorKind::Network => "network",
        }
    }
}

/// Progress events from the audio-output collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Enough of the snippet is buffered to start without stutter.
    Buffered { message_id: MessageId, index: u32 },
    /// The snippet reached its natural end.
    Finished { message_id: MessageId, index: u32 },
    /// The snippet could not be fetched or decoded. `transient` marks audio
    /// that is simply not synthesized yet (e.g. an upstream 404).
    Failed {
        message_id: MessageId,
        index: u32,
        transient: bool,
        detail: String,
    },
}

/// Imperative actions from the surrounding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    ToggleRecording,
    Play(MessageId),
    InterruptPlayback,
    SetMode(InputMode),
    BeginEdit(MessageId),
    SubmitEdit(MessageId, String),
    CancelEdit,
    EndSession,
}

/// Push-channel payload announcing that a snippet's audio became available.
/// Notices without an explicit index apply to the message's next unplayed
/// snippet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnippetNotice {
    pub message_id: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<u32>,
}

impl SnippetNotice {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("malformed snippet notice payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_notice_decodes_with_and_without_index() {
        let notice =
            SnippetNotice::from_json(r#"{"message_id":"m1","url":"https://cdn/a.mp3","snippet":2}"#)
                .expect("indexed notice");
        assert_eq!(notice.snippet, Some(2));

        let notice = SnippetNotice::from_json(r#"{"message_id":"m1","url":"https://cdn/a.mp3"}"#)
            .expect("bare notice");
        assert_eq!(notice.snippet, None);
        assert_eq!(notice.message_id, "m1");
    }

    #[test]
    fn snippet_notice_rejects_garbage() {
        assert!(SnippetNotice::from_json("not json").is_err());
        assert!(SnippetNotice::from_json(r#"{"url":"x"}"#).is_err());
    }

    #[test]
    fn transient_recognition_errors_are_only_no_speech() {
        let err = RecognitionError::new(RecognitionErrorKind::NoSpeech, "");
        assert!(err.is_transient());
        let err = RecognitionError::new(RecognitionErrorKind::Device, "mic vanished");
        assert!(!err.is_transient());
    }
}
