//! Integration tests for the portal CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get a portal command isolated from the caller's environment
fn portal(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("portal").unwrap();
    cmd.current_dir(tmp.path())
        .env_remove("PORTAL_USER")
        .env_remove("PORTAL_DB")
        .env_remove("PORTAL_BIND")
        .env("XDG_CONFIG_HOME", tmp.path().join(".xdg"));
    cmd
}

/// Run a command as `user`
fn as_user(tmp: &TempDir, user: &str, args: &[&str]) -> assert_cmd::assert::Assert {
    portal(tmp).arg("--as").arg(user).args(args).assert()
}

/// Project with an admin, staff, student, instructor, supervisor, two
/// committee members and one internship (INT@1)
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .args(["init", "--admin", "root", "--admin-name", "Root Admin"])
        .assert()
        .success();

    for (username, role) in [
        ("sofia", "staff"),
        ("alice", "student"),
        ("ivan", "instructor"),
        ("sam", "supervisor"),
        ("carol", "committee"),
        ("dave", "committee"),
    ] {
        as_user(
            &tmp,
            "root",
            &[
                "user",
                "add",
                username,
                "--name",
                &format!("{} Example", username),
                "--email",
                &format!("{}@uni.test", username),
                "--role",
                role,
            ],
        )
        .success();
    }

    as_user(
        &tmp,
        "sofia",
        &["company", "add", "Acme", "--contact-name", "Wile E."],
    )
    .success();
    as_user(
        &tmp,
        "sofia",
        &[
            "internship",
            "add",
            "Backend intern",
            "--company",
            "Acme",
            "--start",
            "2026-06-01",
            "--positions",
            "2",
        ],
    )
    .success();
    tmp
}

/// Submit as alice and take the application to the committee stage (APP@1)
fn submit_to_committee(tmp: &TempDir) {
    as_user(
        tmp,
        "alice",
        &["app", "submit", "INT@1", "--instructor", "ivan", "--statement", "I like backends"],
    )
    .success();
    as_user(tmp, "ivan", &["review", "@1", "--approve", "-m", "Solid"]).success();
    as_user(tmp, "sofia", &["supervisor", "assign", "@1", "sam"]).success();
    as_user(tmp, "sofia", &["committee", "assign", "@1", "carol", "dave"]).success();
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Internship Portal"))
        .stdout(predicate::str::contains("committee"));
}

#[test]
fn test_version_displays() {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("portal"));
}

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("portal"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .args(["init", "--admin", "root"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized portal project"))
        .stdout(predicate::str::contains("Created administrator root"));

    assert!(tmp.path().join(".portal/config.yaml").is_file());
    assert!(tmp.path().join(".portal/portal.db").is_file());
    assert!(tmp.path().join(".portal/templates").is_dir());
    assert!(tmp.path().join(".portal/documents").is_dir());
}

#[test]
fn test_init_twice_reports_existing_project() {
    let tmp = setup_test_project();
    portal(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();
    portal(&tmp)
        .args(["--as", "root", "user", "list"])
        .assert()
        .failure();
}

// ============================================================================
// Acting User Tests
// ============================================================================

#[test]
fn test_missing_acting_user_fails() {
    let tmp = setup_test_project();
    portal(&tmp)
        .args(["app", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No acting user"));
}

#[test]
fn test_portal_user_env_selects_actor() {
    let tmp = setup_test_project();
    portal(&tmp)
        .env("PORTAL_USER", "alice")
        .args(["dashboard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dashboard for alice"));
}

#[test]
fn test_config_user_selects_actor() {
    let tmp = setup_test_project();
    let config_path = tmp.path().join(".portal/config.yaml");
    let config = fs::read_to_string(&config_path).unwrap();
    fs::write(&config_path, format!("user: sofia\n{}", config)).unwrap();

    portal(&tmp)
        .args(["dashboard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dashboard for sofia"));
}

#[test]
fn test_deactivated_user_cannot_act() {
    let tmp = setup_test_project();
    as_user(&tmp, "root", &["user", "deactivate", "dave", "--yes"])
        .success()
        .stdout(predicate::str::contains("Deactivated dave"));

    as_user(&tmp, "dave", &["dashboard"])
        .failure()
        .stderr(predicate::str::contains("deactivated"));

    as_user(&tmp, "root", &["user", "list"])
        .success()
        .stdout(predicate::str::contains("dave").not());
    as_user(&tmp, "root", &["user", "list", "--all"])
        .success()
        .stdout(predicate::str::contains("dave"));
}

#[test]
fn test_only_admin_registers_users() {
    let tmp = setup_test_project();
    as_user(
        &tmp,
        "sofia",
        &["user", "add", "zed", "--name", "Zed", "--email", "zed@uni.test", "--role", "student"],
    )
    .failure()
    .stderr(predicate::str::contains("Not allowed"));
}

#[test]
fn test_user_roles_replace() {
    let tmp = setup_test_project();
    as_user(&tmp, "root", &["user", "roles", "ivan", "instructor,committee"])
        .success()
        .stdout(predicate::str::contains("instructor"))
        .stdout(predicate::str::contains("committee"));

    as_user(&tmp, "root", &["user", "list", "--role", "committee"])
        .success()
        .stdout(predicate::str::contains("ivan"));
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[test]
fn test_internship_list_and_close() {
    let tmp = setup_test_project();
    as_user(&tmp, "alice", &["internship", "list", "--open"])
        .success()
        .stdout(predicate::str::contains("Backend intern"))
        .stdout(predicate::str::contains("Acme"));

    as_user(&tmp, "sofia", &["internship", "close", "INT@1"]).success();

    as_user(&tmp, "alice", &["internship", "list", "--open"])
        .success()
        .stdout(predicate::str::contains("No internships found"));

    as_user(
        &tmp,
        "alice",
        &["app", "submit", "INT@1", "--instructor", "ivan", "--statement", "Late"],
    )
    .failure()
    .stderr(predicate::str::contains("closed"));
}

#[test]
fn test_company_list_json() {
    let tmp = setup_test_project();
    let output = portal(&tmp)
        .args(["--as", "sofia", "-f", "json", "company", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let companies: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(companies[0]["name"], "Acme");
    assert_eq!(companies[0]["contact_name"], "Wile E.");
}

// ============================================================================
// Workflow Tests
// ============================================================================

#[test]
fn test_submit_and_instructor_review() {
    let tmp = setup_test_project();
    as_user(
        &tmp,
        "alice",
        &["app", "submit", "INT@1", "--instructor", "ivan", "--statement", "Hello"],
    )
    .success()
    .stdout(predicate::str::contains("APP@1"))
    .stdout(predicate::str::contains("pending_instructor"));

    // Only the assigned instructor may review
    as_user(&tmp, "alice", &["review", "@1", "--approve"])
        .failure()
        .stderr(predicate::str::contains("Not allowed"));

    as_user(&tmp, "ivan", &["review", "@1", "--approve"])
        .success()
        .stdout(predicate::str::contains("pending_supervisor"));

    // A decision can only be recorded once
    as_user(&tmp, "ivan", &["review", "@1", "--reject"]).failure();
}

#[test]
fn test_review_requires_a_decision() {
    let tmp = setup_test_project();
    as_user(&tmp, "ivan", &["review", "@1"]).failure();
}

#[test]
fn test_full_lifecycle() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"])
        .success()
        .stdout(predicate::str::contains("pending_committee"));
    as_user(&tmp, "dave", &["committee", "vote", "@1", "--approve", "-m", "Go"])
        .success()
        .stdout(predicate::str::contains("pending_documents"));

    as_user(&tmp, "sofia", &["doc", "generate", "@1", "acceptance_request"])
        .success()
        .stdout(predicate::str::contains("acceptance_request"));
    as_user(&tmp, "sofia", &["send", "@1"])
        .success()
        .stdout(predicate::str::contains("sent_to_company"));
    as_user(&tmp, "sofia", &["company-response", "@1", "--accept", "-m", "Welcome"])
        .success()
        .stdout(predicate::str::contains("in_progress"));

    as_user(
        &tmp,
        "sam",
        &["visit", "schedule", "@1", "--at", "2026-07-01 10:00", "--location", "Acme HQ"],
    )
    .success()
    .stdout(predicate::str::contains("VIS@1"));

    // Completion waits for a completed visit
    as_user(&tmp, "sam", &["complete", "@1"])
        .failure()
        .stderr(predicate::str::contains("visit"));

    as_user(&tmp, "sam", &["visit", "complete", "VIS@1", "-m", "All good"]).success();
    as_user(&tmp, "sam", &["complete", "@1"])
        .success()
        .stdout(predicate::str::contains("completed"));

    as_user(&tmp, "sofia", &["doc", "generate", "@1", "completion_certificate"]).success();

    as_user(&tmp, "alice", &["app", "show", "@1"])
        .success()
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("completion_certificate"))
        .stdout(predicate::str::contains("Acme HQ"));

    as_user(&tmp, "alice", &["app", "history", "@1"])
        .success()
        .stdout(predicate::str::contains("sent_to_company"))
        .stdout(predicate::str::contains("sam"));

    // Generated files land under .portal/documents/<APP-id>/
    let docs_dir = tmp.path().join(".portal/documents");
    let app_dirs: Vec<_> = fs::read_dir(&docs_dir).unwrap().collect();
    assert_eq!(app_dirs.len(), 1);
    let app_dir = app_dirs[0].as_ref().unwrap().path();
    assert_eq!(fs::read_dir(app_dir).unwrap().count(), 2);
}

#[test]
fn test_single_committee_rejection_rejects() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"]).success();
    as_user(&tmp, "dave", &["committee", "vote", "@1", "--reject", "-m", "Too early"])
        .success()
        .stdout(predicate::str::contains("rejected"));

    as_user(&tmp, "carol", &["committee", "status", "@1"])
        .success()
        .stdout(predicate::str::contains("Too early"));
}

#[test]
fn test_committee_member_votes_once() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"]).success();
    as_user(&tmp, "carol", &["committee", "vote", "@1", "--reject"])
        .failure()
        .stderr(predicate::str::contains("already voted"));
}

#[test]
fn test_removing_last_pending_member_completes_approval() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"]).success();
    as_user(&tmp, "sofia", &["committee", "remove", "@1", "dave"])
        .success()
        .stdout(predicate::str::contains("pending_documents"));
}

#[test]
fn test_withdraw() {
    let tmp = setup_test_project();
    as_user(
        &tmp,
        "alice",
        &["app", "submit", "INT@1", "--instructor", "ivan", "--statement", "Hello"],
    )
    .success();

    as_user(&tmp, "alice", &["app", "withdraw", "@1", "--reason", "Found another"])
        .success()
        .stdout(predicate::str::contains("withdrawn"));

    as_user(&tmp, "ivan", &["review", "@1", "--approve"]).failure();
}

#[test]
fn test_send_requires_acceptance_request() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);
    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"]).success();
    as_user(&tmp, "dave", &["committee", "vote", "@1", "--approve"]).success();

    as_user(&tmp, "sofia", &["send", "@1"])
        .failure()
        .stderr(predicate::str::contains("acceptance_request"));
}

#[test]
fn test_template_override_is_used() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);
    as_user(&tmp, "carol", &["committee", "vote", "@1", "--approve"]).success();
    as_user(&tmp, "dave", &["committee", "vote", "@1", "--approve"]).success();

    fs::write(
        tmp.path().join(".portal/templates/approval_letter.html"),
        "<p>Custom letter for {{ student_name }}</p>",
    )
    .unwrap();

    let output = portal(&tmp)
        .args(["--as", "sofia", "-f", "json", "doc", "generate", "@1", "approval_letter"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let path = doc["file_path"].as_str().unwrap();
    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "<p>Custom letter for alice Example</p>"
    );
}

// ============================================================================
// Listing and Report Tests
// ============================================================================

#[test]
fn test_app_list_is_scoped() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "alice", &["app", "list"])
        .success()
        .stdout(predicate::str::contains("APP@1"));
    as_user(&tmp, "carol", &["app", "list"])
        .success()
        .stdout(predicate::str::contains("APP@1"));
    as_user(&tmp, "sofia", &["app", "list", "--status", "completed"])
        .success()
        .stdout(predicate::str::contains("No applications found"));
}

#[test]
fn test_dashboard_shows_votes_waiting() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "carol", &["dashboard"])
        .success()
        .stdout(predicate::str::contains("Awaiting my vote"))
        .stdout(predicate::str::contains("APP@1"));
}

#[test]
fn test_report_summary_and_export() {
    let tmp = setup_test_project();
    submit_to_committee(&tmp);

    as_user(&tmp, "sofia", &["report", "summary"])
        .success()
        .stdout(predicate::str::contains("pending_committee"))
        .stdout(predicate::str::contains("Backend intern"));

    let out = tmp.path().join("apps.csv");
    as_user(
        &tmp,
        "sofia",
        &["report", "export", "--output", out.to_str().unwrap()],
    )
    .success();
    let csv = fs::read_to_string(&out).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,student"));
    let row = lines.next().unwrap();
    assert!(row.contains("alice"));
    assert!(row.contains("pending_committee"));
}

#[test]
fn test_report_is_staff_only() {
    let tmp = setup_test_project();
    as_user(&tmp, "alice", &["report", "summary"])
        .failure()
        .stderr(predicate::str::contains("Not allowed"));
}
