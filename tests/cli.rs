use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SOURCE: &str = "// @guard:ai:w\na();\n// @guard:ai:r.1\nb();\nc();\n";

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn scan_prints_a_permission_table() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("scan").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("line  ai  human  source"))
        .stdout(predicate::str::contains("   3  r   w      // @guard:ai:r.1"))
        .stdout(predicate::str::contains("   5  w   w      c();"));
}

#[test]
fn scan_emits_json() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);

    let output = cargo_bin_cmd!("guardtag")
        .arg("scan")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["line_count"], 5);
    assert_eq!(value["tags"].as_array().unwrap().len(), 2);
}

#[test]
fn scan_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("scan").arg(&path).arg("--format").arg("xml");
    cmd.assert().failure().stderr(predicate::str::contains("xml"));
}

#[test]
fn missing_file_is_reported() {
    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("scan").arg("does-not-exist.js");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error reading file"));
}

#[test]
fn config_file_changes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", "x\n");
    let config = write_file(&dir, "guardtag.toml", "[defaults]\nai = \"n\"\nhuman = \"r\"\n");

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("scan")
        .arg(&path)
        .arg("--format")
        .arg("regions")
        .arg("--config")
        .arg(&config);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ai:n lines 1-1 (default)"))
        .stdout(predicate::str::contains("human:r lines 1-1 (default)"));
}

#[test]
fn context_default_in_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);
    let config = write_file(&dir, "guardtag.toml", "[defaults]\nai = \"context\"\n");

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("scan").arg(&path).arg("--config").arg(&config);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid permission"));
}

#[test]
fn export_then_validate_passes() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);

    let export = cargo_bin_cmd!("guardtag")
        .arg("export")
        .arg(&path)
        .output()
        .unwrap();
    assert!(export.status.success());
    let request: serde_json::Value = serde_json::from_slice(&export.stdout).unwrap();
    assert_eq!(request["total_lines"], 5);
    assert_eq!(request["guard_regions"][1]["declaration_line"], 3);
    let external = write_file(&dir, "external.json", &String::from_utf8(export.stdout).unwrap());

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("validate").arg(&path).arg("--external").arg(&external);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"pass\""));
}

#[test]
fn validate_fails_on_disagreement() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.js", SOURCE);
    let external = write_file(
        &dir,
        "external.json",
        r#"{
            "file_path": "app.js",
            "total_lines": 5,
            "guard_regions": [
                {"index": 0, "target": "ai", "permission": "w", "scope": "none",
                 "declaration_line": 1, "start_line": 1, "end_line": 5}
            ]
        }"#,
    );

    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("validate").arg(&path).arg("--external").arg(&external);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"fail\""))
        .stdout(predicate::str::contains("missing_in_external"));
}

#[test]
fn languages_lists_the_scope_table() {
    let mut cmd = cargo_bin_cmd!("guardtag");
    cmd.arg("languages");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("python"))
        .stdout(predicate::str::contains("extensions: .py"));
}
