//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

/// Runs the binary against an empty config directory so a user's own
/// settings never leak into the results.
fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("langfilter");
    cmd.env("XDG_CONFIG_HOME", std::env::temp_dir().join("langfilter-cli-tests-no-config"));
    cmd
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn json_report(args: &[&str]) -> serde_json::Value {
    let output = cmd().args(["-f", "json"]).args(args).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn hidden_ids(report: &serde_json::Value) -> Vec<String> {
    report["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["action"] == "hidden")
        .map(|item| item["identifier"]["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_cli_file_input() {
    cmd()
        .arg(get_fixture_path("feed.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"data-langfilter="hidden""#))
        .stdout(predicate::str::contains("Top 10 Gadgets of 2024!"));
}

#[test]
fn test_cli_stdin_input() {
    let html = std::fs::read_to_string(get_fixture_path("feed.html")).unwrap();
    cmd()
        .arg("-")
        .write_stdin(html)
        .assert()
        .success()
        .stdout(predicate::str::contains("display: none"));
}

#[test]
fn test_cli_json_format() {
    let report = json_report(&[&get_fixture_path("feed.html")]);

    assert_eq!(report["counters"]["videosHidden"], 4);
    assert_eq!(report["counters"]["channelsHidden"], 1);
    assert_eq!(hidden_ids(&report), vec!["def456", "ghi789", "jkl012", "vwx234", "@kanal_ru"]);
}

#[test]
fn test_cli_text_format() {
    cmd()
        .args(["-f", "text", &get_fixture_path("feed.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Videos hidden: 4"))
        .stdout(predicate::str::contains("Channels hidden: 1"))
        .stdout(predicate::str::contains("video:def456"));
}

#[test]
fn test_cli_languages() {
    let report = json_report(&["-l", "en,es", &get_fixture_path("feed.html")]);
    assert_eq!(hidden_ids(&report), vec!["def456", "ghi789", "vwx234", "@kanal_ru"]);
}

#[test]
fn test_cli_lenient() {
    let report = json_report(&["--lenient", "-l", "en,fr", &get_fixture_path("feed.html")]);
    let hidden = hidden_ids(&report);

    assert!(!hidden.contains(&"vwx234".to_string()));
    assert!(hidden.contains(&"def456".to_string()));
    assert_eq!(report["settings"]["strictMode"], false);
}

#[test]
fn test_cli_disabled() {
    cmd()
        .args(["--disabled", &get_fixture_path("feed.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("data-langfilter").not());

    let report = json_report(&["--disabled", &get_fixture_path("feed.html")]);
    assert_eq!(report["counters"]["videosHidden"], 0);
    assert!(report["items"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_no_channels() {
    let report = json_report(&["--no-channels", &get_fixture_path("feed.html")]);
    assert_eq!(report["counters"]["videosHidden"], 4);
    assert_eq!(report["counters"]["channelsHidden"], 0);
}

#[test]
fn test_cli_no_videos() {
    let report = json_report(&["--no-videos", &get_fixture_path("feed.html")]);
    assert_eq!(report["counters"]["videosHidden"], 0);
    assert_eq!(report["counters"]["channelsHidden"], 1);
}

#[test]
fn test_cli_append_batches() {
    let report = json_report(&[
        "--append",
        &get_fixture_path("batch_1.html"),
        "--append",
        &get_fixture_path("batch_2.html"),
        &get_fixture_path("feed.html"),
    ]);

    assert_eq!(report["counters"]["videosHidden"], 6);
    let hidden = hidden_ids(&report);
    assert!(hidden.contains(&"yz0002".to_string()));
    assert!(hidden.contains(&"yz0003".to_string()));
    let abc = report["items"].as_array().unwrap().iter().filter(|i| i["identifier"]["id"] == "abc123").count();
    assert_eq!(abc, 1);
}

#[test]
fn test_cli_append_missing_fragment() {
    cmd()
        .args(["--append", "nonexistent.html", &get_fixture_path("feed.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read fragment"));
}

#[test]
fn test_cli_settings_file() {
    let report = json_report(&["--settings", &get_fixture_path("settings.json"), &get_fixture_path("feed.html")]);

    assert_eq!(hidden_ids(&report), vec!["def456", "ghi789", "vwx234"]);
    assert_eq!(report["settings"]["hideChannels"], false);
}

#[cfg(target_os = "linux")]
#[test]
fn test_cli_default_settings_location() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("langfilter");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(get_fixture_path("settings.json"), dir.join("settings.json")).unwrap();

    let output = cmd()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["-f", "json", &get_fixture_path("feed.html")])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(hidden_ids(&report), vec!["def456", "ghi789", "vwx234"]);
    assert_eq!(report["settings"]["hideChannels"], false);
}

#[cfg(target_os = "linux")]
#[test]
fn test_cli_invalid_default_settings_disables_filtering() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("langfilter");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(get_fixture_path("invalid_settings.json"), dir.join("settings.json")).unwrap();

    cmd()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["-f", "json", "-l", "en", &get_fixture_path("feed.html")])
        .assert()
        .success()
        .stderr(predicate::str::contains("filtering disabled"))
        .stdout(predicate::str::contains(r#""videosHidden": 0"#));
}

#[test]
fn test_cli_flags_override_settings_file() {
    let report = json_report(&[
        "--settings",
        &get_fixture_path("settings.json"),
        "-l",
        "en",
        &get_fixture_path("feed.html"),
    ]);
    assert!(hidden_ids(&report).contains(&"jkl012".to_string()));
}

#[test]
fn test_cli_invalid_settings_disables_filtering() {
    cmd()
        .args(["-f", "json", "--settings", &get_fixture_path("invalid_settings.json"), &get_fixture_path("feed.html")])
        .assert()
        .success()
        .stderr(predicate::str::contains("filtering disabled"))
        .stdout(predicate::str::contains(r#""videosHidden": 0"#));
}

#[test]
fn test_cli_output_file() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("filtered.html");

    cmd()
        .args(["-o", output.to_str().unwrap()])
        .arg(get_fixture_path("feed.html"))
        .assert()
        .success();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains(r#"data-langfilter="hidden""#));
}

#[test]
fn test_cli_invalid_file() {
    cmd().arg("nonexistent.html").assert().failure();
}

#[test]
fn test_cli_invalid_format() {
    cmd()
        .args(["-f", "markdown", &get_fixture_path("feed.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_cli_verbose() {
    cmd()
        .args(["-v", &get_fixture_path("feed.html")])
        .assert()
        .success()
        .stderr(predicate::str::contains("langfilter"))
        .stderr(predicate::str::contains("Decisions"));
}
