//! Policy store loading and lookup tests.

use authgate::authz::{ConfigError, PolicyStore};

const TWO_POLICIES: &str = r#"
{"name":"ops","users":["alice","dave"],"actions":["container_.*","image_.*"],"readonly":false}
{"name":"auditors","users":["carol"],"actions":[".*"],"readonly":true}
"#;

#[test]
fn loads_line_delimited_policies_in_order() {
    let store = PolicyStore::load(TWO_POLICIES, false).expect("should load");
    assert_eq!(store.len(), 2);
    let names: Vec<&str> = store.policies().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["ops", "auditors"]);
}

#[test]
fn loads_json_array() {
    let src = r#"[
        {"name":"ops","users":["alice"],"actions":["container_.*"]},
        {"name":"ro","users":["carol"],"actions":[".*"],"readonly":true}
    ]"#;
    let store = PolicyStore::load(src, false).expect("should load");
    assert_eq!(store.len(), 2);
    let ro = store.find_policy("carol").expect("carol has a policy");
    assert!(ro.is_readonly());
}

#[test]
fn find_policy_returns_matching_policy() {
    let store = PolicyStore::load(TWO_POLICIES, false).expect("should load");
    assert_eq!(store.find_policy("dave").map(|p| p.name()), Some("ops"));
    assert_eq!(store.find_policy("carol").map(|p| p.name()), Some("auditors"));
    assert!(store.find_policy("bob").is_none());
}

#[test]
fn empty_user_never_matches() {
    let src = r#"{"name":"weird","users":[""],"actions":[".*"]}"#;
    let store = PolicyStore::load(src, false).expect("should load");
    assert!(store.find_policy("").is_none());
}

#[test]
fn first_policy_wins_for_duplicate_user() {
    let src = r#"
{"name":"first","users":["alice"],"actions":["image_list"]}
{"name":"second","users":["alice"],"actions":[".*"]}
"#;
    let store = PolicyStore::load(src, false).expect("non-strict load tolerates overlap");
    assert_eq!(store.len(), 2);
    assert_eq!(store.find_policy("alice").map(|p| p.name()), Some("first"));
}

#[test]
fn strict_mode_rejects_duplicate_user() {
    let src = r#"
{"name":"first","users":["alice"],"actions":["image_list"]}
{"name":"second","users":["bob","alice"],"actions":[".*"]}
"#;
    let err = PolicyStore::load(src, true).expect_err("strict load must fail");
    match err {
        ConfigError::DuplicateUser {
            user,
            first,
            second,
        } => {
            assert_eq!(user, "alice");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn strict_mode_rejects_duplicate_name() {
    let src = r#"
{"name":"ops","users":["alice"],"actions":[".*"]}
{"name":"ops","users":["bob"],"actions":[".*"]}
"#;
    assert!(matches!(
        PolicyStore::load(src, true),
        Err(ConfigError::DuplicateName(name)) if name == "ops"
    ));
    assert!(PolicyStore::load(src, false).is_ok());
}

#[test]
fn invalid_regex_fails_whole_load() {
    let src = r#"
{"name":"good","users":["alice"],"actions":[".*"]}
{"name":"bad","users":["bob"],"actions":["container_(create"]}
"#;
    match PolicyStore::load(src, false) {
        Err(ConfigError::InvalidPattern { policy, index, .. }) => {
            assert_eq!(policy, "bad");
            assert_eq!(index, 0);
        }
        other => panic!("expected InvalidPattern, got {other:?}"),
    }
}

#[test]
fn malformed_line_reports_line_number() {
    let src = "{\"name\":\"good\",\"users\":[\"alice\"],\"actions\":[]}\n{not json}\n";
    match PolicyStore::load(src, false) {
        Err(ConfigError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn missing_name_is_rejected() {
    let src = r#"{"users":["alice"],"actions":[".*"]}"#;
    assert!(matches!(
        PolicyStore::load(src, false),
        Err(ConfigError::Parse { .. })
    ));

    let src = r#"{"name":"  ","users":["alice"],"actions":[".*"]}"#;
    assert!(matches!(
        PolicyStore::load(src, false),
        Err(ConfigError::EmptyName { line: 1 })
    ));
}

#[test]
fn empty_source_yields_empty_store() {
    let store = PolicyStore::load("\n# nothing here\n", false).expect("should load");
    assert!(store.is_empty());
}

#[test]
fn load_file_reads_from_disk() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("policy.json");
    std::fs::write(&path, TWO_POLICIES).expect("should write policy file");

    let store = PolicyStore::load_file(&path, false).expect("should load");
    assert_eq!(store.len(), 2);
}

#[test]
fn load_file_missing_is_io_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let result = PolicyStore::load_file(dir.path().join("absent.json"), false);
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn permits_is_full_match() {
    let store = PolicyStore::load(TWO_POLICIES, false).expect("should load");
    let ops = store.find_policy("alice").expect("alice has a policy");
    assert!(ops.permits("container_create"));
    assert!(ops.permits("image_list"));
    assert!(!ops.permits("network_create"));
    assert!(!ops.permits("my_container_create"));
}

#[test]
fn unbalanced_group_cannot_escape_anchoring() {
    let src = r#"{"name":"viewers","users":["eve"],"actions":["image_list)|(?:"]}"#;
    match PolicyStore::load(src, false) {
        Err(ConfigError::InvalidPattern { policy, index, .. }) => {
            assert_eq!(policy, "viewers");
            assert_eq!(index, 0);
        }
        other => panic!("expected InvalidPattern, got {other:?}"),
    }
}
