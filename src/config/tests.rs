use super::AppConfig;
use clap::Parser;

fn parse(args: &[&str]) -> AppConfig {
    let mut full = vec!["test-app"];
    full.extend_from_slice(args);
    AppConfig::parse_from(full)
}

#[test]
fn defaults_are_valid() {
    let mut cfg = parse(&[]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_quiet_period_out_of_bounds() {
    let mut cfg = parse(&["--quiet-period-ms", "100"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--quiet-period-ms", "20000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_dedup_window_shorter_than_quiet_period() {
    let mut cfg = parse(&["--quiet-period-ms", "3000", "--dedup-window-ms", "2000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_response_timeout_out_of_bounds() {
    let mut cfg = parse(&["--response-timeout-ms", "1000"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--response-timeout-ms", "600000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_stream_base_without_scheme() {
    let mut cfg = parse(&["--stream-base", "localhost:8000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn normalizes_stream_base_trailing_slash() {
    let mut cfg = parse(&["--stream-base", "https://tts.example.com/"]);
    cfg.validate().expect("valid stream base");
    assert_eq!(cfg.stream_base, "https://tts.example.com");
}

#[test]
fn session_tuning_mirrors_flags() {
    let mut cfg = parse(&["--quiet-period-ms", "1500", "--release-grace-ms", "300"]);
    cfg.validate().expect("valid config");
    let tuning = cfg.session_tuning();
    assert_eq!(tuning.quiet_period.as_millis(), 1500);
    assert_eq!(tuning.release_grace.as_millis(), 300);
    assert_eq!(tuning.stream_base, cfg.stream_base);
}

#[test]
fn start_mode_labels_are_stable() {
    assert_eq!(super::StartMode::Voice.label(), "voice");
    assert_eq!(super::StartMode::Text.label(), "text");
}
