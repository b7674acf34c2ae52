//! Integration tests for the Bindery CLI
//!
//! These tests run the actual CLI binary and verify output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the binary to test
fn bindery_cmd() -> Command {
    let mut cmd = Command::cargo_bin("bindery").unwrap();
    cmd.env_remove("BINDERY_RESTRICTED")
        .env_remove("BINDERY_QUERY_TIMEOUT_MS")
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

const CONFIG: &str = r#"
[resources]
layout = ["contact_item"]
id = ["name", "star"]
drawable = ["star_big_off", "star_big_on"]
"#;

const CONTACTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<cursor-adapter target="@layout/contact_item" uri="content://contacts" sortOrder="display_name">
    <bind from="display_name" to="@id/name" as="string"/>
    <bind from="starred" to="@id/star" as="drawable">
        <map fromValue="0" toValue="@drawable/star_big_off"/>
        <map fromValue="1" toValue="@drawable/star_big_on"/>
    </bind>
</cursor-adapter>
"#;

const ROWS: &str = r#"{
  "content://contacts": [
    {"_id": 2, "display_name": "Bob", "starred": 0},
    {"_id": 1, "display_name": "Ann", "starred": 1}
  ],
  "content://starred": [
    {"_id": 1, "display_name": "Ann", "starred": 1}
  ]
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bindery.toml"), CONFIG).unwrap();
        fs::write(dir.path().join("contacts.xml"), CONTACTS).unwrap();
        fs::write(dir.path().join("rows.json"), ROWS).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = bindery_cmd();
        cmd.current_dir(self.dir.path());
        cmd
    }
}

#[test]
fn test_help_flag() {
    bindery_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("render"));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_prints_plan() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["validate", "contacts.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Target: contact_item"))
        .stdout(predicate::str::contains("Columns: _id, display_name, starred"))
        .stdout(predicate::str::contains("map of 2"));
}

#[test]
fn test_validate_root_mismatch_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["validate", "contacts.xml", "--root", "list-adapter"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-010"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_validate_unknown_element_names_document() {
    let ws = Workspace::new();
    ws.write(
        "broken.xml",
        r#"<cursor-adapter target="@layout/contact_item"><query/></cursor-adapter>"#,
    );
    ws.cmd()
        .args(["validate", "broken.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-012"))
        .stderr(predicate::str::contains("broken"))
        .stderr(predicate::str::contains("<query>"));
}

#[test]
fn test_validate_warns_on_shared_target() {
    let ws = Workspace::new();
    ws.write(
        "shared.xml",
        r#"<cursor-adapter target="@layout/contact_item">
             <bind from="first" to="@id/name" as="string"/>
             <bind from="last" to="@id/name" as="string"/>
           </cursor-adapter>"#,
    );
    ws.cmd()
        .args(["validate", "shared.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("the last one wins"));
}

#[test]
fn test_validate_restricted_env_refuses_custom_binder() {
    let ws = Workspace::new();
    ws.write(
        "custom.xml",
        r#"<cursor-adapter target="@layout/contact_item">
             <bind from="photo" to="@id/star" as="com.example.PhotoBinder"/>
           </cursor-adapter>"#,
    );
    ws.cmd()
        .env("BINDERY_RESTRICTED", "true")
        .args(["validate", "custom.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-015"));
}

#[test]
fn test_validate_malformed_config() {
    let ws = Workspace::new();
    ws.write("bad.toml", "restricted = [");
    ws.cmd()
        .args(["validate", "contacts.xml", "--config", "bad.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-031"));
}

#[test]
fn test_validate_missing_file() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["validate", "nope.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read definition"));
}

// ============================================================================
// render
// ============================================================================

#[test]
fn test_render_binds_rows_in_sort_order() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["render", "contacts.xml", "--rows", "rows.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 row(s) from content://contacts"))
        .stdout(predicate::str::contains("name = \"Ann\""))
        .stdout(predicate::str::contains("star = drawable star_big_on"))
        .stdout(predicate::str::contains("star = drawable star_big_off"))
        .stdout(predicate::str::is_match(r#"(?s)"Ann".*"Bob""#).unwrap());
}

#[test]
fn test_render_uri_override() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "render",
            "contacts.xml",
            "--rows",
            "rows.json",
            "--uri",
            "content://starred",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 row(s) from content://starred"));
}

#[test]
fn test_render_events_flag_prints_log() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["render", "contacts.xml", "--rows", "rows.json", "--events"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"load_started\""))
        .stdout(predicate::str::contains("\"load_delivered\""));
}

#[test]
fn test_render_unknown_uri_shows_empty_state() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "render",
            "contacts.xml",
            "--rows",
            "rows.json",
            "--uri",
            "content://nothing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 row(s)"));
}

#[test]
fn test_render_honours_configured_root() {
    let ws = Workspace::new();
    ws.write("strict.toml", &format!("expected_root = \"list-adapter\"\n{CONFIG}"));

    ws.cmd()
        .args(["render", "contacts.xml", "--rows", "rows.json", "-c", "strict.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-010"))
        .stdout(predicate::str::contains("row(s)").not());

    ws.cmd()
        .args([
            "render",
            "contacts.xml",
            "--rows",
            "rows.json",
            "-c",
            "strict.toml",
            "--uri",
            "content://starred",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BND-010"));
}

#[test]
fn test_render_without_uri_fails() {
    let ws = Workspace::new();
    ws.write(
        "no_uri.xml",
        r#"<cursor-adapter target="@layout/contact_item">
             <bind from="display_name" to="@id/name" as="string"/>
           </cursor-adapter>"#,
    );
    ws.cmd()
        .args(["render", "no_uri.xml", "--rows", "rows.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --uri"));
}
