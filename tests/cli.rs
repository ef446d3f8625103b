//! CLI integration tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ngni() -> Command {
    let mut cmd = Command::cargo_bin("ngni-agent").unwrap_or_else(|_| unreachable!());
    cmd.env_remove("RUST_LOG").env_remove("NGNI_PROMPT_DIR");
    cmd
}

#[test]
fn test_help_lists_commands() {
    ngni()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn test_classify_text() {
    ngni()
        .args(["classify", "What is our strategy for Pankow?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Branch:      strategy_only"))
        .stdout(predicate::str::contains("rag_agent -> search_agent"));
}

#[test]
fn test_classify_json() {
    let output = ngni()
        .args(["--format", "json", "classify", "Strategic view on network performance"])
        .output()
        .unwrap_or_else(|_| unreachable!());
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap_or_default();
    assert_eq!(value["branch"], "strategy_and_performance");
    assert_eq!(
        value["steps"],
        serde_json::json!(["rag_agent", "db_agent", "search_agent"])
    );
}

#[test]
fn test_init_prompts_into_directory() {
    let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let dir = temp_dir.path().join("prompts");

    ngni()
        .arg("init-prompts")
        .arg("--dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 prompt template(s)"));

    assert!(dir.join("root.md").exists());
    assert!(dir.join("synthesizer.md").exists());

    ngni()
        .arg("init-prompts")
        .arg("--dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}

#[test]
fn test_query_without_credentials_fails() {
    ngni()
        .args(["query", "What is our strategy?"])
        .env_remove("GOOGLE_ACCESS_TOKEN")
        .env_remove("NGNI_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_CLOUD_PROJECT")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("API key").or(predicate::str::contains("missing configuration")),
        );
}
