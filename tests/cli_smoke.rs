use std::process::Command;

#[test]
fn help_displays_overview() {
    let binary = env!("CARGO_BIN_EXE_b3-quote-monitor");
    let output = Command::new(binary)
        .arg("--help")
        .output()
        .expect("invoke b3-quote-monitor --help");

    assert!(output.status.success(), "help command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Brazilian equities quote monitor"),
        "expected overview text in help output"
    );
    assert!(stdout.contains("snapshot"), "expected snapshot subcommand");
}

#[test]
fn simulated_snapshot_prints_json() {
    let binary = env!("CARGO_BIN_EXE_b3-quote-monitor");
    let output = Command::new(binary)
        .args([
            "--provider",
            "simulated",
            "--seed",
            "3",
            "--pause-ms",
            "0",
            "--log-level",
            "error",
            "snapshot",
            "--json",
        ])
        .output()
        .expect("invoke b3-quote-monitor snapshot");

    assert!(output.status.success(), "snapshot should succeed");
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON document");
    let series = payload["series"].as_array().expect("series array");
    assert!(!series.is_empty(), "expected stored series");
    for entry in series {
        let bars = entry["bars"].as_array().expect("bars array");
        assert!(bars.len() >= 2 && bars.len() <= 50);
    }
    assert!(payload["last_refresh"].is_string());
}
