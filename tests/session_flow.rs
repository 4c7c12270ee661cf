//! End-to-end walks of the turn coordinator against stub collaborators and a
//! manual clock.

use anyhow::Result;
use clap::Parser;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use voiceturn::capture::SpeechRecognizer;
use voiceturn::config::{AppConfig, StartMode};
use voiceturn::conversation::{ConversationStore, Message, MessageId, PlaybackState, Speaker};
use voiceturn::events::{PlaybackEvent, RecognizerEvent, SessionEvent, SnippetNotice, UiAction};
use voiceturn::notice::NoticeSink;
use voiceturn::player::AudioOutput;
use voiceturn::{InputMode, TurnCoordinator};

#[derive(Clone, Default)]
struct TestStore {
    inner: Rc<RefCell<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    messages: Vec<Message>,
    next_id: usize,
    sent: Vec<String>,
    edited: Vec<(String, String)>,
    regenerated: Vec<String>,
}

impl TestStore {
    fn push(&self, speaker: Speaker, content: &str, is_greeting: bool, complete: bool) -> MessageId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = MessageId::new(format!("m{}", inner.next_id));
        inner.messages.push(Message {
            id: id.clone(),
            content: content.to_string(),
            speaker,
            is_greeting,
            complete,
        });
        id
    }

    fn add_assistant(&self, content: &str) -> MessageId {
        self.push(Speaker::Assistant, content, false, true)
    }

    fn add_user(&self, content: &str) -> MessageId {
        self.push(Speaker::User, content, false, true)
    }

    fn add_greeting(&self, content: &str) -> MessageId {
        self.push(Speaker::Assistant, content, true, true)
    }

    fn sent(&self) -> Vec<String> {
        self.inner.borrow().sent.clone()
    }

    fn message_count(&self) -> usize {
        self.inner.borrow().messages.len()
    }

    fn regenerated(&self) -> Vec<String> {
        self.inner.borrow().regenerated.clone()
    }
}

impl ConversationStore for TestStore {
    fn messages(&self) -> Vec<Message> {
        self.inner.borrow().messages.clone()
    }

    fn send_message(&mut self, text: &str) -> Result<MessageId> {
        let id = self.push(Speaker::User, text, false, true);
        self.inner.borrow_mut().sent.push(text.to_string());
        Ok(id)
    }

    fn edit_message(&mut self, id: &MessageId, text: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if let Some(message) = inner.messages.iter_mut().find(|m| &m.id == id) {
            message.content = text.to_string();
        }
        inner
            .edited
            .push((id.as_str().to_string(), text.to_string()));
        Ok(())
    }

    fn invalidate_from(&mut self, id: &MessageId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if let Some(position) = inner.messages.iter().position(|m| &m.id == id) {
            inner.messages.truncate(position + 1);
        }
        Ok(())
    }

    fn regenerate_after(&mut self, id: &MessageId) -> Result<()> {
        self.inner
            .borrow_mut()
            .regenerated
            .push(id.as_str().to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecognizerLog {
    calls: Rc<RefCell<Vec<&'static str>>>,
}

struct StubRecognizer {
    log: RecognizerLog,
}

impl SpeechRecognizer for StubRecognizer {
    fn start(&mut self) -> Result<()> {
        self.log.calls.borrow_mut().push("start");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.calls.borrow_mut().push("stop");
        Ok(())
    }
}

#[derive(Clone, Default)]
struct OutputLog {
    loads: Rc<RefCell<Vec<(String, u32, String)>>>,
    stops: Rc<RefCell<usize>>,
}

struct StubOutput {
    log: OutputLog,
}

impl AudioOutput for StubOutput {
    fn load(&mut self, message_id: &MessageId, index: u32, url: &str) -> Result<()> {
        self.log.loads.borrow_mut().push((
            message_id.as_str().to_string(),
            index,
            url.to_string(),
        ));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        *self.log.stops.borrow_mut() += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct NoticeLog {
    titles: Rc<RefCell<Vec<String>>>,
}

impl NoticeSink for NoticeLog {
    fn notice(&self, title: &str, _detail: &str) {
        self.titles.borrow_mut().push(title.to_string());
    }
}

struct Harness {
    coordinator: TurnCoordinator<TestStore>,
    store: TestStore,
    output: OutputLog,
    recognizer: RecognizerLog,
    notices: NoticeLog,
    now: Instant,
}

impl Harness {
    fn new(store: TestStore) -> Self {
        let mut cfg = AppConfig::parse_from(["session-flow"]);
        cfg.validate().expect("defaults should be valid");
        let output = OutputLog::default();
        let recognizer = RecognizerLog::default();
        let notices = NoticeLog::default();
        let coordinator = TurnCoordinator::new(
            store.clone(),
            Box::new(StubRecognizer {
                log: recognizer.clone(),
            }),
            Box::new(StubOutput { log: output.clone() }),
            Box::new(notices.clone()),
            cfg.session_tuning(),
            StartMode::Voice,
        );
        Self {
            coordinator,
            store,
            output,
            recognizer,
            notices,
            now: Instant::now(),
        }
    }

    fn mounted(store: TestStore) -> Self {
        let mut harness = Self::new(store);
        harness.coordinator.mount(harness.now);
        harness
    }

    fn advance(&mut self, duration: Duration) {
        self.now += duration;
        self.coordinator.tick(self.now);
    }

    fn handle(&mut self, event: SessionEvent) {
        self.coordinator.handle(event, self.now);
    }

    fn messages_changed(&mut self) {
        self.handle(SessionEvent::MessagesChanged);
    }

    fn speak(&mut self, text: &str) {
        self.handle(SessionEvent::Recognizer(RecognizerEvent::Partial {
            text: text.to_string(),
        }));
    }

    fn buffered(&mut self, id: &MessageId, index: u32) {
        self.handle(SessionEvent::Playback(PlaybackEvent::Buffered {
            message_id: id.clone(),
            index,
        }));
    }

    fn finished(&mut self, id: &MessageId, index: u32) {
        self.handle(SessionEvent::Playback(PlaybackEvent::Finished {
            message_id: id.clone(),
            index,
        }));
    }

    /// Play every snippet of a message and wait out the release grace.
    fn drive_chain(&mut self, id: &MessageId, count: u32) {
        for index in 0..count {
            self.buffered(id, index);
            self.finished(id, index);
        }
        self.advance(Duration::from_secs(1));
    }

    fn loads(&self) -> Vec<(String, u32, String)> {
        self.output.loads.borrow().clone()
    }

    fn load_indices_for(&self, id: &MessageId) -> Vec<u32> {
        self.output
            .loads
            .borrow()
            .iter()
            .filter(|(loaded, _, _)| loaded == id.as_str())
            .map(|(_, index, _)| *index)
            .collect()
    }
}

#[test]
fn two_sentence_reply_plays_snippets_in_order() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("Tell me more. How did that feel?");
    harness.messages_changed();

    // Preload starts with snippet 0 and the mic is already locked.
    assert_eq!(harness.load_indices_for(&reply), vec![0]);
    let snapshot = harness.coordinator.snapshot();
    assert!(snapshot.mic_locked);
    assert!(snapshot.recognition_paused);

    harness.buffered(&reply, 0);
    assert_eq!(
        harness.coordinator.playback_state(&reply),
        PlaybackState::Playing
    );
    harness.finished(&reply, 0);
    assert_eq!(harness.load_indices_for(&reply), vec![0, 1]);
    harness.buffered(&reply, 1);
    harness.finished(&reply, 1);

    // Exactly two snippet loads, indices 0 then 1, no repeats, no gaps.
    assert_eq!(harness.load_indices_for(&reply), vec![0, 1]);
    assert_eq!(
        harness.coordinator.playback_state(&reply),
        PlaybackState::Playing
    );

    // The pointer clears and the mic unlocks only after the grace delay.
    harness.advance(Duration::from_secs(1));
    assert_eq!(
        harness.coordinator.playback_state(&reply),
        PlaybackState::FullyPlayed
    );
    let snapshot = harness.coordinator.snapshot();
    assert!(!snapshot.mic_locked);
    assert!(!snapshot.recognition_paused);
}

#[test]
fn at_most_one_message_plays_at_a_time() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let first = store.add_assistant("First thing. Second thought.");
    let second = store.add_assistant("And another reply.");
    harness.messages_changed();

    // Only the first message is loaded; the second waits its turn.
    assert_eq!(harness.loads().len(), 1);
    assert_eq!(
        harness.coordinator.playback_state(&second),
        PlaybackState::Unseen
    );

    harness.buffered(&first, 0);
    let snapshot = harness.coordinator.snapshot();
    assert_eq!(snapshot.currently_playing_message_id, Some(first.clone()));
    assert!(snapshot.recognition_paused);

    harness.finished(&first, 0);
    harness.buffered(&first, 1);
    harness.finished(&first, 1);
    harness.advance(Duration::from_secs(1));

    // Now, and only now, the second message takes the device.
    assert_eq!(harness.load_indices_for(&second), vec![0]);
    let snapshot = harness.coordinator.snapshot();
    assert_eq!(snapshot.currently_playing_message_id, Some(second.clone()));
    assert!(snapshot.recognition_paused);
}

#[test]
fn history_below_watermark_never_replays() {
    let store = TestStore::default();
    store.add_user("how was my week");
    let old_one = store.add_assistant("You mentioned feeling tired.");
    let old_two = store.add_assistant("Rest matters. Be kind to yourself.");

    let mut harness = Harness::mounted(store.clone());
    assert!(harness.loads().is_empty());
    assert_eq!(
        harness.coordinator.playback_state(&old_one),
        PlaybackState::FullyPlayed
    );
    assert_eq!(
        harness.coordinator.playback_state(&old_two),
        PlaybackState::FullyPlayed
    );

    // A second load of the same conversation stays silent too.
    harness.messages_changed();
    assert!(harness.loads().is_empty());

    let mut remounted = Harness::mounted(store.clone());
    remounted.messages_changed();
    assert!(remounted.loads().is_empty());

    // New messages after the watermark still play.
    let fresh = store.add_assistant("A brand new reply.");
    harness.messages_changed();
    assert_eq!(harness.load_indices_for(&fresh), vec![0]);
}

#[test]
fn greeting_plays_exactly_once() {
    let store = TestStore::default();
    let greeting = store.add_greeting("Hi there, I'm glad you came.");
    let mut harness = Harness::mounted(store.clone());

    assert_eq!(harness.load_indices_for(&greeting), vec![0]);
    harness.drive_chain(&greeting, 1);
    assert_eq!(
        harness.coordinator.playback_state(&greeting),
        PlaybackState::FullyPlayed
    );

    // Intervening state updates never replay it.
    harness.messages_changed();
    harness.messages_changed();
    assert_eq!(harness.load_indices_for(&greeting), vec![0]);
}

#[test]
fn duplicate_utterance_sends_exactly_one_message() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    harness.speak("I feel anxious");
    harness.advance(Duration::from_secs(2));
    assert_eq!(harness.store.sent(), vec!["I feel anxious"]);

    // The recognizer re-emits the same final right after; discarded.
    harness.speak("I feel anxious");
    harness.advance(Duration::from_secs(2));
    assert_eq!(harness.store.sent().len(), 1);

    // Well outside the window the same words are a new message.
    harness.advance(Duration::from_secs(10));
    harness.speak("I feel anxious");
    harness.advance(Duration::from_secs(2));
    assert_eq!(harness.store.sent().len(), 2);
}

#[test]
fn edit_stops_playback_and_requeues_from_that_point() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let user = store.add_user("I slept badly");
    let reply = store.add_assistant("That sounds rough. Want to talk about it?");
    harness.messages_changed();
    harness.buffered(&reply, 0);
    assert!(harness.coordinator.snapshot().mic_locked);

    harness.handle(SessionEvent::Ui(UiAction::BeginEdit(user.clone())));
    let snapshot = harness.coordinator.snapshot();
    // Playback cut off within one event; recognition stays force-paused.
    assert!(!snapshot.mic_locked);
    assert!(snapshot.currently_playing_message_id.is_none());
    assert!(snapshot.recognition_paused);
    assert_eq!(*harness.output.stops.borrow(), 1);

    harness.handle(SessionEvent::Ui(UiAction::SubmitEdit(
        user.clone(),
        "I slept terribly".to_string(),
    )));
    // Downstream turns are gone and the edited turn queued for a new reply.
    assert_eq!(harness.store.message_count(), 1);
    assert_eq!(harness.store.regenerated(), vec![user.as_str().to_string()]);
    assert!(!harness.coordinator.snapshot().recognition_paused);

    // The regenerated reply plays like any fresh message.
    let regenerated = store.add_assistant("Let's start there. What kept you up?");
    harness.messages_changed();
    assert_eq!(harness.load_indices_for(&regenerated), vec![0]);
}

#[test]
fn response_timeout_degrades_to_text_and_recovers() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    harness.speak("are you there");
    harness.advance(Duration::from_secs(2));
    let snapshot = harness.coordinator.snapshot();
    assert!(snapshot.waiting_for_response);
    assert!(!snapshot.voice_unavailable);

    harness.advance(Duration::from_secs(61));
    let snapshot = harness.coordinator.snapshot();
    assert!(!snapshot.waiting_for_response);
    assert!(snapshot.voice_unavailable);
    assert!(harness
        .notices
        .titles
        .borrow()
        .iter()
        .any(|title| title == "Voice is unavailable"));

    // The next successful audible start clears the degradation.
    let late = store.add_assistant("Sorry for the wait.");
    harness.messages_changed();
    harness.buffered(&late, 0);
    assert!(!harness.coordinator.snapshot().voice_unavailable);
}

#[test]
fn early_notice_for_later_snippet_is_cached_not_acted_on() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("One moment. Here is a thought.");
    harness.messages_changed();
    assert_eq!(harness.load_indices_for(&reply), vec![0]);

    // Snippet 1 is announced before snippet 0 even buffered.
    harness.handle(SessionEvent::Push(SnippetNotice {
        message_id: reply.as_str().to_string(),
        url: "https://cdn.example/one.mp3".to_string(),
        snippet: Some(1),
    }));
    // Still only the original load; the chain did not jump ahead.
    assert_eq!(harness.load_indices_for(&reply), vec![0]);

    harness.buffered(&reply, 0);
    harness.finished(&reply, 0);
    let loads = harness.loads();
    let last = loads.last().expect("snippet 1 load");
    assert_eq!(last.1, 1);
    assert_eq!(last.2, "https://cdn.example/one.mp3");
}

#[test]
fn stale_notice_for_played_message_is_dropped() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("All done here.");
    harness.messages_changed();
    harness.drive_chain(&reply, 1);
    let loads_before = harness.loads().len();

    harness.handle(SessionEvent::Push(SnippetNotice {
        message_id: reply.as_str().to_string(),
        url: "https://cdn.example/late.mp3".to_string(),
        snippet: Some(0),
    }));
    assert_eq!(harness.loads().len(), loads_before);
    assert_eq!(
        harness.coordinator.playback_state(&reply),
        PlaybackState::FullyPlayed
    );
}

#[test]
fn mode_switch_stops_audio_and_flips_the_input_surface() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("Let me read this to you. It is two sentences.");
    harness.messages_changed();
    harness.buffered(&reply, 0);

    harness.handle(SessionEvent::Ui(UiAction::SetMode(InputMode::Text)));
    let snapshot = harness.coordinator.snapshot();
    assert!(!snapshot.mic_locked);
    assert!(snapshot.recognition_paused);
    assert_eq!(harness.coordinator.mode(), InputMode::Text);
    // Messages survive the switch untouched.
    assert_eq!(harness.store.message_count(), 1);
    assert!(harness.recognizer.calls.borrow().contains(&"stop"));

    // Back to voice: the unfinished reply resumes where it stalled.
    harness.handle(SessionEvent::Ui(UiAction::SetMode(InputMode::Voice)));
    let indices = harness.load_indices_for(&reply);
    assert_eq!(indices.first(), Some(&0));
    assert!(indices.len() >= 2);
}

#[test]
fn interrupt_skips_the_current_message_for_good() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("A long reply. With many sentences. Truly many.");
    harness.messages_changed();
    harness.buffered(&reply, 0);

    harness.handle(SessionEvent::Ui(UiAction::InterruptPlayback));
    let snapshot = harness.coordinator.snapshot();
    assert!(!snapshot.mic_locked);
    assert!(!snapshot.recognition_paused);

    // The skipped message does not come back on the next scheduling pass.
    harness.messages_changed();
    assert_eq!(harness.load_indices_for(&reply), vec![0]);
    assert_eq!(
        harness.coordinator.playback_state(&reply),
        PlaybackState::FullyPlayed
    );
}

#[test]
fn end_session_releases_everything_whatever_the_state() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let reply = store.add_assistant("Still talking here.");
    harness.messages_changed();
    harness.buffered(&reply, 0);
    harness.speak("wait");

    harness.handle(SessionEvent::Ui(UiAction::EndSession));
    assert!(harness.coordinator.is_ended());
    let snapshot = harness.coordinator.snapshot();
    assert!(!snapshot.mic_locked);
    assert!(snapshot.recognition_paused);
    assert!(!snapshot.waiting_for_response);
    assert!(harness.recognizer.calls.borrow().contains(&"stop"));
    assert!(*harness.output.stops.borrow() >= 1);

    // Events after the end are ignored.
    let loads_before = harness.loads().len();
    harness.messages_changed();
    assert_eq!(harness.loads().len(), loads_before);
}

#[test]
fn incomplete_message_waits_for_a_confirmed_snippet() {
    let store = TestStore::default();
    let mut harness = Harness::mounted(store.clone());

    let streaming = store.push(Speaker::Assistant, "Still being written", false, false);
    harness.messages_changed();
    // Text generation has not finished and nothing is confirmed: hold off.
    assert!(harness.loads().is_empty());

    harness.handle(SessionEvent::Push(SnippetNotice {
        message_id: streaming.as_str().to_string(),
        url: "https://cdn.example/early.mp3".to_string(),
        snippet: Some(0),
    }));
    // A confirmed snippet unblocks playback even before the text settles.
    assert_eq!(harness.load_indices_for(&streaming), vec![0]);
    assert_eq!(
        harness.loads()[0].2,
        "https://cdn.example/early.mp3"
    );
}
