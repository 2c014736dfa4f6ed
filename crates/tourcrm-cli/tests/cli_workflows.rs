// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;

const SECRET: &str = "cli-test-secret-0123456789";

fn tourcrm(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tourcrm").expect("binary");
    cmd.arg("--json")
        .arg("--db")
        .arg(db)
        .env("CRM_PASSWORD_ITERATIONS", "1000")
        .env_remove("CRM_TOKEN_SECRET");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

#[test]
fn bootstrap_tenant_then_issue_a_token() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("nested").join("crm.sqlite3");

    let migrated = stdout_json(&tourcrm(&db).arg("migrate").output().expect("migrate"));
    assert_eq!(migrated["schema"]["ok"], true);

    let org = stdout_json(
        &tourcrm(&db)
            .args(["create-org", "--name", "Anatolia Tours", "--slug", "anatolia"])
            .output()
            .expect("create-org"),
    );
    let org_id = org["organization"]["id"].as_i64().expect("org id");

    let user = stdout_json(
        &tourcrm(&db)
            .args(["create-user", "--org", &org_id.to_string()])
            .args(["--email", "owner@anatolia.test", "--name", "Owner", "--role", "admin"])
            .args(["--password", "long-enough-password"])
            .output()
            .expect("create-user"),
    );
    let user_id = user["user"]["id"].as_i64().expect("user id");
    assert_eq!(user["user"]["role"], "admin");

    let token = stdout_json(
        &tourcrm(&db)
            .args(["issue-token", "--user-id", &user_id.to_string()])
            .env("CRM_TOKEN_SECRET", SECRET)
            .output()
            .expect("issue-token"),
    );
    let token = token["token"].as_str().expect("token");
    let claims = tourcrm_server::verify_token(SECRET, token, 0).expect("verifies");
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.org, org_id);

    let report = stdout_json(
        &tourcrm(&db)
            .args(["report", "--org", &org_id.to_string(), "executive/summary"])
            .output()
            .expect("report"),
    );
    assert_eq!(report["report"], "executive/summary");
}

#[test]
fn duplicate_slugs_fail_with_a_validation_exit_code() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("crm.sqlite3");
    for expected in [Some(0), Some(3)] {
        let output = tourcrm(&db)
            .args(["create-org", "--name", "Dup", "--slug", "dup"])
            .output()
            .expect("create-org");
        assert_eq!(output.status.code(), expected);
    }
}

#[test]
fn openapi_is_written_to_a_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("openapi.json");
    let output = tourcrm(&tmp.path().join("unused.sqlite3"))
        .args(["openapi", "--out"])
        .arg(&out)
        .output()
        .expect("openapi");
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&std::fs::read(&out).expect("file")).expect("json");
    assert_eq!(parsed["openapi"], "3.0.3");
}

#[test]
fn unknown_flag_returns_usage_exit_code_with_machine_error() {
    let output = Command::cargo_bin("tourcrm")
        .expect("binary")
        .args(["--json", "--unknown-flag"])
        .output()
        .expect("run bad cli");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("usage_error"));
}

#[test]
fn short_secrets_are_refused() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = tourcrm(&tmp.path().join("crm.sqlite3"))
        .args(["issue-token", "--user-id", "1", "--secret", "short"])
        .output()
        .expect("issue-token");
    assert_eq!(output.status.code(), Some(2));
}
