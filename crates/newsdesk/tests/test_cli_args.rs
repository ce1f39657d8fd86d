//! CLI argument parsing tests for newsdesk

mod common;

use assert_cmd::Command;
use common::TestEnv;
use predicates::prelude::*;

fn newsdesk() -> Command {
    Command::new(env!("CARGO_BIN_EXE_newsdesk"))
}

#[test]
fn test_help_flag() {
    let mut cmd = newsdesk();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("AWS news assistant"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_version_flag() {
    let mut cmd = newsdesk();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_no_args_shows_help() {
    let mut cmd = newsdesk();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand() {
    let mut cmd = newsdesk();
    cmd.arg("deploy");
    cmd.assert().failure();
}

// ============================================================================
// Chat command tests
// ============================================================================

#[test]
fn test_chat_command_help() {
    let mut cmd = newsdesk();
    cmd.args(["chat", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Chat with the assistant"))
        .stdout(predicate::str::contains("-m, --message"));
}

#[test]
fn test_chat_without_api_key_fails() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["chat", "-m", "what's new in S3?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_chat_exits_on_sentinel() {
    let server = mockito::Server::new();
    let env = TestEnv::new().unwrap();
    env.create_config(&server.url()).unwrap();

    env.command()
        .arg("chat")
        .write_stdin("\nX\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("AWS News Assistant (x to exit): "));
}

// ============================================================================
// Init, tools and status
// ============================================================================

#[test]
fn test_init_writes_config() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("newsdesk initialized"));

    assert!(env.config_file().exists());
    assert!(env.data_dir.join("llm-logs").is_dir());
}

#[test]
fn test_tools_prints_descriptors() {
    let env = TestEnv::new().unwrap();
    let output = env.command().arg("tools").output().unwrap();
    assert!(output.status.success());

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = schema
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "get_current_date_time",
            "get_aws_news_articles",
            "lookup_aws_news_article_details",
        ]
    );
}

#[test]
fn test_status_reports_missing_key() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Missing]"))
        .stdout(predicate::str::contains("anthropic/claude-3-haiku"));
}
