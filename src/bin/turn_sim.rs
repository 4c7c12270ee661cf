//! Synthetic session harness: drives the turn coordinator end-to-end against
//! scripted collaborators and prints the resulting turn-taking timeline.

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use voiceturn::capture::SpeechRecognizer;
use voiceturn::config::{AppConfig, SessionTuning, StartMode};
use voiceturn::conversation::{ConversationStore, Message, MessageId, Speaker};
use voiceturn::notice::NoticeSink;
use voiceturn::player::AudioOutput;
use voiceturn::{PlaybackEvent, RecognizerEvent, SessionEvent, SnippetNotice, TurnCoordinator};

/// Scripted run of the session controller with synthetic speech and audio.
#[derive(Debug, Parser)]
#[command(about = "Simulate a voice session through the turn coordinator")]
struct Args {
    /// Human-friendly label recorded in the output lines
    #[arg(long, default_value = "session")]
    label: String,

    /// Number of scripted user turns
    #[arg(long, default_value_t = 2)]
    turns: usize,

    /// Quiet period before an utterance finalizes (milliseconds)
    #[arg(long = "quiet-period-ms", default_value_t = 80)]
    quiet_period_ms: u64,

    /// Device-release grace after the last snippet (milliseconds)
    #[arg(long = "release-grace-ms", default_value_t = 30)]
    release_grace_ms: u64,

    /// Event-loop tick interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = 10)]
    tick_ms: u64,

    /// Enable file logging (debug)
    #[arg(long = "logs", default_value_t = false)]
    logs: bool,
}

const SCRIPTED_UTTERANCES: [&str; 4] = [
    "hello there",
    "I have been feeling anxious lately",
    "mostly about work I think",
    "thank you this helps",
];

/// Canned assistant lines so the player has multi-sentence material to chain.
fn scripted_reply(utterance: &str) -> &'static str {
    let lowered = utterance.to_lowercase();
    if lowered.contains("hello") || lowered.contains("hi") {
        "Hello there. How are you feeling today?"
    } else if lowered.contains("anxious") || lowered.contains("anxiety") {
        "I understand anxiety can be difficult. Take a deep breath in for four counts. Exhale slowly for six."
    } else if lowered.contains("thank") {
        "You're welcome. I'm here whenever you need to talk."
    } else {
        "I appreciate you sharing that. How does that make you feel?"
    }
}

#[derive(Clone, Default)]
struct SharedStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    messages: Vec<Message>,
    next_id: usize,
    outbox: Vec<String>,
}

impl SharedStore {
    fn push(&self, speaker: Speaker, content: &str, is_greeting: bool) -> MessageId {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let id = MessageId::new(format!("m{}", inner.next_id));
        inner.messages.push(Message {
            id: id.clone(),
            content: content.to_string(),
            speaker,
            is_greeting,
            complete: true,
        });
        id
    }

    /// Drain user messages the coordinator sent since the last call.
    fn take_outbox(&self) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut inner.outbox)
    }
}

impl ConversationStore for SharedStore {
    fn messages(&self) -> Vec<Message> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .clone()
    }

    fn send_message(&mut self, text: &str) -> Result<MessageId> {
        let id = self.push(Speaker::User, text, false);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.outbox.push(text.to_string());
        Ok(id)
    }

    fn edit_message(&mut self, id: &MessageId, text: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(message) = inner.messages.iter_mut().find(|m| &m.id == id) {
            message.content = text.to_string();
        }
        Ok(())
    }

    fn invalidate_from(&mut self, id: &MessageId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(position) = inner.messages.iter().position(|m| &m.id == id) {
            inner.messages.truncate(position + 1);
        }
        Ok(())
    }

    fn regenerate_after(&mut self, _id: &MessageId) -> Result<()> {
        Ok(())
    }
}

struct SimRecognizer {
    timeline: Timeline,
}

impl SpeechRecognizer for SimRecognizer {
    fn start(&mut self) -> Result<()> {
        self.timeline.emit("recognizer|start");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.timeline.emit("recognizer|stop");
        Ok(())
    }
}

/// Audio output that buffers instantly and finishes each snippet as soon as it
/// starts, so the chain advances at event speed.
struct SimOutput {
    events: Sender<SessionEvent>,
    timeline: Timeline,
    loaded: Option<(MessageId, u32)>,
}

impl AudioOutput for SimOutput {
    fn load(&mut self, message_id: &MessageId, index: u32, url: &str) -> Result<()> {
        self.timeline
            .emit(&format!("player|load|{message_id}|{index}|{url}"));
        self.loaded = Some((message_id.clone(), index));
        let _ = self.events.send(SessionEvent::Playback(PlaybackEvent::Buffered {
            message_id: message_id.clone(),
            index,
        }));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if let Some((message_id, index)) = self.loaded.clone() {
            self.timeline
                .emit(&format!("player|audible|{message_id}|{index}"));
            let _ = self.events.send(SessionEvent::Playback(PlaybackEvent::Finished {
                message_id,
                index,
            }));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.timeline.emit("player|pause");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.timeline.emit("player|resume");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.timeline.emit("player|stop");
        self.loaded = None;
        Ok(())
    }
}

struct PrintNotices {
    timeline: Timeline,
}

impl NoticeSink for PrintNotices {
    fn notice(&self, title: &str, detail: &str) {
        self.timeline.emit(&format!("notice|{title}|{detail}"));
    }
}

/// Pipe-delimited timeline lines stamped with elapsed milliseconds.
#[derive(Clone)]
struct Timeline {
    label: String,
    started: Instant,
}

impl Timeline {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            started: Instant::now(),
        }
    }

    fn emit(&self, line: &str) {
        let elapsed = self.started.elapsed().as_millis();
        println!("timeline|{}|{elapsed}|{line}", self.label);
    }
}

fn pump<S: ConversationStore>(
    coordinator: &mut TurnCoordinator<S>,
    events: &Receiver<SessionEvent>,
) {
    while let Ok(event) = events.try_recv() {
        let now = Instant::now();
        coordinator.handle(event, now);
        coordinator.tick(now);
    }
    coordinator.tick(Instant::now());
}

fn settle<S: ConversationStore>(
    coordinator: &mut TurnCoordinator<S>,
    events: &Receiver<SessionEvent>,
    wait: Duration,
) {
    thread::sleep(wait);
    pump(coordinator, events);
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Base config from defaults; the sim only forwards the logging switch.
    let mut app = AppConfig::parse_from(Vec::<String>::new());
    app.validate()?;
    app.logs = args.logs;
    voiceturn::init_logging(&app);

    let tuning = SessionTuning {
        quiet_period: Duration::from_millis(args.quiet_period_ms),
        dedup_window: Duration::from_millis(args.quiet_period_ms * 2),
        response_timeout: Duration::from_secs(5),
        release_grace: Duration::from_millis(args.release_grace_ms),
        idle_reminder: Duration::from_secs(30),
        stream_base: "http://localhost:8000".to_string(),
        tick: Duration::from_millis(args.tick_ms),
    };
    let tick = tuning.tick;
    let grace = tuning.release_grace;
    let quiet = tuning.quiet_period;

    let timeline = Timeline::new(&args.label);
    let (tx, rx) = unbounded::<SessionEvent>();
    let store = SharedStore::default();
    let greeting_id = store.push(
        Speaker::Assistant,
        "Hi there, I'm glad you came. What's on your mind today?",
        true,
    );
    timeline.emit(&format!("store|greeting|{greeting_id}"));

    let mut coordinator = TurnCoordinator::new(
        store.clone(),
        Box::new(SimRecognizer {
            timeline: timeline.clone(),
        }),
        Box::new(SimOutput {
            events: tx.clone(),
            timeline: timeline.clone(),
            loaded: None,
        }),
        Box::new(PrintNotices {
            timeline: timeline.clone(),
        }),
        tuning,
        StartMode::Voice,
    );

    coordinator.mount(Instant::now());
    // Let the greeting chain through its snippets and release the device.
    for _ in 0..4 {
        settle(&mut coordinator, &rx, grace + tick);
    }

    for turn in 0..args.turns {
        let utterance = SCRIPTED_UTTERANCES[turn % SCRIPTED_UTTERANCES.len()];
        timeline.emit(&format!("script|speak|{utterance}"));
        tx.send(SessionEvent::Recognizer(RecognizerEvent::Partial {
            text: utterance.to_string(),
        }))?;
        pump(&mut coordinator, &rx);
        // Wait out the quiet period so the utterance finalizes.
        settle(&mut coordinator, &rx, quiet + tick + tick);

        for sent in store.take_outbox() {
            let reply = scripted_reply(&sent);
            let reply_id = store.push(Speaker::Assistant, reply, false);
            timeline.emit(&format!("store|assistant|{reply_id}"));
            tx.send(SessionEvent::MessagesChanged)?;
            tx.send(SessionEvent::Push(SnippetNotice {
                message_id: reply_id.as_str().to_string(),
                url: format!("https://cdn.example/{reply_id}-0.mp3"),
                snippet: Some(0),
            }))?;
        }
        pump(&mut coordinator, &rx);
        // Reply snippets chain instantly; wait out the release grace.
        for _ in 0..4 {
            settle(&mut coordinator, &rx, grace + tick);
        }

        let snapshot = coordinator.snapshot();
        timeline.emit(&format!(
            "snapshot|mic_locked={}|recognition_paused={}|waiting={}",
            snapshot.mic_locked, snapshot.recognition_paused, snapshot.waiting_for_response
        ));
    }

    coordinator.end_session();
    let snapshot = coordinator.snapshot();
    println!(
        "sim_summary|label={}|turns={}|mic_locked={}|voice_unavailable={}",
        args.label, args.turns, snapshot.mic_locked, snapshot.voice_unavailable
    );
    Ok(())
}
