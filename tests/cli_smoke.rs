#![allow(deprecated)]

/// Smoke tests for the snow-agent binary
///
/// These run the compiled binary with a temporary config and a scrubbed
/// environment so no real instance or planner is contacted.
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

const CREDENTIAL_VARS: [&str; 8] = [
    "SNOW_INSTANCE",
    "SNOW_USERNAME",
    "SNOW_PASSWORD",
    "ANTHROPIC_API_KEY",
    "SNOW_AGENT_PROVIDER",
    "SNOW_AGENT_MODEL",
    "SNOW_AGENT_MAX_ROUNDS",
    "SNOW_AGENT_OLLAMA_HOST",
];

fn snow_agent() -> Command {
    let mut cmd = Command::cargo_bin("snow-agent").unwrap();
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help_lists_commands() {
    snow_agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("ping"));
}

#[test]
fn test_version() {
    snow_agent()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("snow-agent"));
}

#[test]
fn test_run_requires_task() {
    snow_agent().arg("run").assert().failure();
}

#[test]
fn test_invalid_config_rejected() {
    let (_temp_dir, config_path) =
        common::temp_config_file("provider:\n  type: ollama\nagent:\n  max_rounds: 0\n");

    snow_agent()
        .arg("--config")
        .arg(config_path)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_rounds must be greater than 0"));
}

#[test]
fn test_unknown_provider_rejected() {
    let (_temp_dir, config_path) = common::temp_config_file("provider:\n  type: copilot\n");

    snow_agent()
        .arg("--config")
        .arg(config_path)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid provider type"));
}

#[test]
fn test_missing_credentials_listed() {
    let (_temp_dir, config_path) = common::temp_config_file("agent:\n  max_rounds: 5\n");

    snow_agent()
        .arg("--config")
        .arg(config_path)
        .args(["run", "list", "update", "sets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required environment variables: SNOW_INSTANCE, SNOW_USERNAME, SNOW_PASSWORD, ANTHROPIC_API_KEY",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_reports_user_and_update_sets() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sys_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"user_name": "admin", "name": "System Administrator"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/now/table/sys_update_set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"name": "Default"}, {"name": "Priority work"}]
        })))
        .mount(&server)
        .await;

    let (_temp_dir, config_path) = common::temp_config_file(&format!(
        "servicenow:\n  api_base: {}\nprovider:\n  type: ollama\n",
        server.uri()
    ));

    snow_agent()
        .arg("--config")
        .arg(config_path)
        .arg("ping")
        .env("SNOW_USERNAME", "admin")
        .env("SNOW_PASSWORD", "secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connected as: System Administrator"))
        .stdout(predicate::str::contains("Default, Priority work"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_fails_on_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sys_user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "User Not Authenticated", "detail": "Required to provide Auth information"}
        })))
        .mount(&server)
        .await;

    let (_temp_dir, config_path) = common::temp_config_file(&format!(
        "servicenow:\n  api_base: {}\nprovider:\n  type: ollama\n",
        server.uri()
    ));

    snow_agent()
        .arg("--config")
        .arg(config_path)
        .arg("ping")
        .env("SNOW_USERNAME", "admin")
        .env("SNOW_PASSWORD", "wrong")
        .assert()
        .failure()
        .stderr(predicate::str::contains("User Not Authenticated"));
}
