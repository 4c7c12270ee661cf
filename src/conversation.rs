//! Conversation data model. Messages are owned by the surrounding store; this
//! crate only reads snapshots and requests mutations through the trait below.

use anyhow::Result;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Opaque identifier for one turn in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One turn in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub speaker: Speaker,
    /// True only for the synthetic opening line shown before any user input exists.
    pub is_greeting: bool,
    /// Text generation has finished, so synthesized audio is expected to follow.
    pub complete: bool,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.speaker == Speaker::Assistant
    }
}

/// Lifecycle of a message's audio within the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Unseen,
    Queued,
    Playing,
    FullyPlayed,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::Unseen => "unseen",
            PlaybackState::Queued => "queued",
            PlaybackState::Playing => "playing",
            PlaybackState::FullyPlayed => "fully-played",
        }
    }
}

/// Ordered view of the conversation plus the mutations the controller may request.
pub trait ConversationStore {
    fn messages(&self) -> Vec<Message>;
    fn send_message(&mut self, text: &str) -> Result<MessageId>;
    fn edit_message(&mut self, id: &MessageId, text: &str) -> Result<()>;
    /// Drop every message downstream of `id`.
    fn invalidate_from(&mut self, id: &MessageId) -> Result<()>;
    /// Queue `id` for a fresh assistant response.
    fn regenerate_after(&mut self, id: &MessageId) -> Result<()>;
}

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex should compile"))
}

/// Split message text into the sentence-scoped pieces the synthesis backend
/// streams one snippet each. Terminators stay attached to their sentence.
pub fn split_sentences(content: &str) -> Vec<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for boundary in sentence_boundary().find_iter(trimmed) {
        let piece = trimmed[start..boundary.start() + 1].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        start = boundary.end();
    }
    let tail = trimmed[start..].trim();
    if !tail.is_empty() {
        pieces.push(tail);
    }
    pieces
}

/// Number of snippets a message synthesizes into.
pub fn snippet_count(content: &str) -> u32 {
    split_sentences(content).len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminator_followed_by_whitespace() {
        let pieces = split_sentences("Tell me more. How did that feel?");
        assert_eq!(pieces, vec!["Tell me more.", "How did that feel?"]);
        assert_eq!(snippet_count("Tell me more. How did that feel?"), 2);
    }

    #[test]
    fn single_sentence_without_terminator_counts_once() {
        assert_eq!(split_sentences("take a breath"), vec!["take a breath"]);
        assert_eq!(snippet_count("take a breath"), 1);
    }

    #[test]
    fn empty_content_has_no_snippets() {
        assert_eq!(snippet_count(""), 0);
        assert_eq!(snippet_count("   "), 0);
    }

    #[test]
    fn stacked_terminators_stay_with_their_sentence() {
        let pieces = split_sentences("Really?! That sounds hard. I'm here.");
        assert_eq!(pieces, vec!["Really?!", "That sounds hard.", "I'm here."]);
    }

    #[test]
    fn terminator_without_trailing_space_does_not_split() {
        // Decimal points and inline dots are not sentence boundaries.
        assert_eq!(snippet_count("rated 3.5 out of five"), 1);
    }
}
