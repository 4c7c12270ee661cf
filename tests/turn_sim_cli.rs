use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn turn_sim_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_turn_sim").expect("turn_sim test binary not built")
}

#[test]
fn turn_sim_help_mentions_the_coordinator() {
    let output = Command::new(turn_sim_bin())
        .arg("--help")
        .output()
        .expect("run turn_sim --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("turn coordinator"));
}

#[test]
fn turn_sim_single_turn_prints_a_clean_summary() {
    let output = Command::new(turn_sim_bin())
        .args(["--turns", "1", "--label", "smoke"])
        .output()
        .expect("run turn_sim --turns 1");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("timeline|smoke|"));
    assert!(combined.contains("sim_summary|label=smoke|turns=1"));
    // The session must end with the device released.
    assert!(combined.contains("mic_locked=false"));
}
