//! CLI contract tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;

const POLICIES: &str = r#"
{"name":"ops","users":["alice"],"actions":["container_.*"],"readonly":false}
{"name":"viewers","users":["carol"],"actions":[".*"],"readonly":true}
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    policy: PathBuf,
    audit_log: PathBuf,
    config: PathBuf,
}

fn fixture(policies: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let policy = dir.path().join("policy.json");
    std::fs::write(&policy, policies).expect("should write policies");
    Fixture {
        policy,
        audit_log: dir.path().join("audit.log"),
        config: dir.path().join("absent.toml"),
        _dir: dir,
    }
}

fn authgate(fx: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("authgate").expect("binary should build");
    cmd.env_remove("RUST_LOG")
        .env("AUTHGATE_CONFIG", &fx.config)
        .env("AUTHGATE_POLICY_FILE", &fx.policy)
        .env("AUTHGATE_AUDITOR_HOOK", "file")
        .env("AUTHGATE_AUDIT_LOG", &fx.audit_log);
    cmd
}

fn audit_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("audit line is JSON"))
        .collect()
}

#[test]
fn validate_lists_policies() {
    let fx = fixture(POLICIES);
    let output = authgate(&fx)
        .arg("validate")
        .output()
        .expect("should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ops"));
    assert!(stdout.contains("viewers"));
}

#[test]
fn validate_rejects_bad_regex() {
    let fx = fixture(r#"{"name":"bad","users":["alice"],"actions":["(oops"]}"#);
    authgate(&fx).arg("validate").assert().failure();
}

#[test]
fn validate_strict_rejects_duplicate_users() {
    let fx = fixture(
        r#"
{"name":"a","users":["alice"],"actions":[".*"]}
{"name":"b","users":["alice"],"actions":[".*"]}
"#,
    );
    authgate(&fx).arg("validate").assert().success();
    authgate(&fx)
        .env("AUTHGATE_POLICY_STRICT", "true")
        .arg("validate")
        .assert()
        .failure();
}

#[test]
fn check_allows_and_audits() {
    let fx = fixture(POLICIES);
    let output = authgate(&fx)
        .args(["check", "--user", "alice", "--method", "POST", "--uri", "/v1.41/containers/create"])
        .output()
        .expect("should run");
    assert!(output.status.success());

    let decision: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decision JSON on stdout");
    assert_eq!(decision["Allow"], true);

    let records = audit_lines(&fx.audit_log);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["user"], "alice");
    assert_eq!(records[0]["allow"], true);
}

#[test]
fn check_denies_unknown_user_with_failure_exit() {
    let fx = fixture(POLICIES);
    let output = authgate(&fx)
        .args(["check", "--user", "bob", "--method", "POST", "--uri", "/containers/create"])
        .output()
        .expect("should run");
    assert!(!output.status.success());

    let decision: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decision JSON on stdout");
    assert_eq!(decision["Allow"], false);
    assert!(decision["Msg"]
        .as_str()
        .unwrap_or_default()
        .contains("no policy found"));
}

#[test]
fn decide_reads_wire_request_from_stdin() {
    let fx = fixture(POLICIES);
    let request = r#"{"User":"carol","RequestMethod":"GET","RequestURI":"/containers/json"}"#;
    let output = authgate(&fx)
        .arg("decide")
        .write_stdin(request)
        .output()
        .expect("should run");
    assert!(output.status.success());

    let decision: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decision JSON on stdout");
    assert_eq!(decision["Allow"], true);
    assert_eq!(audit_lines(&fx.audit_log).len(), 1);
}

#[test]
fn decide_response_allows_without_audit() {
    let fx = fixture(POLICIES);
    let request = r#"{"User":"mallory","RequestMethod":"POST","RequestURI":"/containers/create"}"#;
    let output = authgate(&fx)
        .args(["decide", "--response"])
        .write_stdin(request)
        .output()
        .expect("should run");
    assert!(output.status.success());

    let decision: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decision JSON on stdout");
    assert_eq!(decision["Allow"], true);
    assert!(audit_lines(&fx.audit_log).is_empty());
}

#[test]
fn unknown_auditor_hook_is_rejected() {
    let fx = fixture(POLICIES);
    authgate(&fx)
        .env("AUTHGATE_AUDITOR_HOOK", "kafka")
        .arg("validate")
        .assert()
        .failure();
}

#[test]
fn stdout_audit_keeps_decision_alone_on_stdout() {
    let fx = fixture(POLICIES);
    let output = authgate(&fx)
        .env_remove("AUTHGATE_AUDITOR_HOOK")
        .args(["check", "--user", "alice", "--method", "POST", "--uri", "/containers/create"])
        .output()
        .expect("should run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    let decision: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("only the decision on stdout");
    assert_eq!(decision["Allow"], true);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(r#""method":"POST""#));
    assert!(stderr.contains(r#""user":"alice""#));
}

#[test]
fn decide_reports_malformed_input_as_failure_decision() {
    let fx = fixture(POLICIES);
    let output = authgate(&fx)
        .arg("decide")
        .write_stdin(r#"{"User":"carol","RequestMethod":"#)
        .output()
        .expect("should run");
    assert!(!output.status.success());

    let decision: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decision JSON on stdout");
    assert_eq!(decision["Allow"], false);
    assert!(!decision["Err"].as_str().unwrap_or_default().is_empty());
    assert!(audit_lines(&fx.audit_log).is_empty());
}
