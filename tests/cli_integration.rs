use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tdfetch-cli-{}-{name}", std::process::id()))
}

fn tdfetch(args: &[&str], data_dir: &PathBuf, stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tdfetch"))
        .args(args)
        .env("TDFETCH_DATA_DIR", data_dir)
        .env_remove("TDFETCH_SECRETS_PATH")
        .env_remove("TDFETCH_API_ID")
        .env_remove("TDFETCH_API_HASH")
        .env_remove("TDFETCH_PHONE")
        // Nothing listens here; tests must finish before connecting.
        .env("TDFETCH_BRIDGE_URL", "ws://127.0.0.1:9/tdjson")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute tdfetch binary");

    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for tdfetch")
}

#[test]
fn empty_group_list_aborts_before_connecting() {
    let dir = scratch_dir("empty-groups");
    let output = tdfetch(&["fetch"], &dir, "\n   \ndone\n");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("Type 'done' when you're finished adding groups."));
    assert!(stderr.contains("You must specify at least one group!"), "stderr: {stderr}");
    assert!(!stdout.contains("Connecting to Telegram"));
    assert!(!stdout.contains("SUMMARY"));
}

#[test]
fn invalid_since_expression_is_rejected() {
    let dir = scratch_dir("bad-since");
    let output = tdfetch(&["fetch", "--group", "family", "--since", "next tuesday"], &dir, "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid time expression"), "stderr: {stderr}");
}

#[test]
fn missing_credentials_stop_the_fetch() {
    let dir = scratch_dir("no-credentials");
    let output = tdfetch(&["fetch", "--group", "family"], &dir, "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("API ID must be a valid positive integer"), "stderr: {stderr}");
}

#[test]
fn credentials_can_be_saved_shown_and_cleared() {
    let dir = scratch_dir("credentials");

    let saved = tdfetch(
        &[
            "credentials",
            "save",
            "--api-id",
            "21156764",
            "--api-hash",
            "510953159b9f7d3359fe7a70a5cbf566",
            "--phone",
            "+15550100",
        ],
        &dir,
        "",
    );
    assert!(saved.status.success(), "{}", String::from_utf8_lossy(&saved.stderr));

    let shown = tdfetch(&["credentials", "show"], &dir, "");
    assert!(shown.status.success());
    let stdout = String::from_utf8_lossy(&shown.stdout);
    assert!(stdout.contains("API ID: 21156764"));
    assert!(stdout.contains("API Hash: 51095315************************"));
    assert!(stdout.contains("Phone: +15******"));
    assert!(!stdout.contains("510953159b9f7d3359fe7a70a5cbf566"));

    let cleared = tdfetch(&["credentials", "clear"], &dir, "");
    assert!(cleared.status.success());
    assert!(!dir.join("credentials.json").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn fetch_help_explains_the_auth_timeout() {
    let dir = scratch_dir("help");
    let output = tdfetch(&["fetch", "--help"], &dir, "");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--auth-timeout"));
    assert!(stdout.contains("not while one waits for input"));
}
