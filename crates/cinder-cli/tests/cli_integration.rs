//! Integration tests for the `cinderc` binary.
//!
//! Each test runs the built binary on a fixture and checks the exit status
//! and what it printed.

use cinder_bytecode::{disassemble, CompiledModule};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Run `cinderc` from `dir` with colors off.
fn cinderc(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cinderc"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("CINDER_LOG")
        .output()
        .expect("failed to run cinderc")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cinderc-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ────────────────────────────────────────────────────────────────────────────
// check
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_check_clean_modules() {
    let output = cinderc(&fixtures_dir().join("simple"), &["check", "lib.cn", "app.cn"]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("compiled lib.cn"), "stderr:\n{}", err);
    assert!(err.contains("compiled app.cn"), "stderr:\n{}", err);
}

#[test]
fn test_check_reports_rendered_diagnostics() {
    let output = cinderc(&fixtures_dir().join("broken"), &["check", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("error[E2001]: cannot find `missing` in this scope"), "stderr:\n{}", err);
    assert!(err.contains("main.cn:2:"), "stderr:\n{}", err);
    assert!(err.contains("failed main.cn"), "stderr:\n{}", err);
}

#[test]
fn test_check_json_diagnostics() {
    let output = cinderc(&fixtures_dir().join("broken"), &["--format", "json", "check", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    let report: serde_json::Value = serde_json::from_str(out.trim()).expect("one JSON report line");
    assert_eq!(report["file"], "main.cn");
    let diagnostics = report["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["code"], "UnresolvedIdentifier");
    assert_eq!(diagnostics[0]["level"], "Error");
    assert_eq!(diagnostics[0]["args"][0], "missing");
    assert!(stderr(&output).is_empty(), "stderr:\n{}", stderr(&output));
}

#[test]
fn test_unresolved_import_without_dependency() {
    let output = cinderc(&fixtures_dir().join("simple"), &["check", "app.cn"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[E2005]"), "stderr:\n{}", stderr(&output));
}

// ────────────────────────────────────────────────────────────────────────────
// configuration
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_file_promotes_warnings() {
    let dir = fixtures_dir().join("strict");
    let output = cinderc(&dir, &["check", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("W5001"), "stderr:\n{}", stderr(&output));

    let output = cinderc(&dir, &["--config", "../simple/missing.toml", "check", "main.cn"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing.toml"), "stderr:\n{}", stderr(&output));
}

#[test]
fn test_warning_alone_still_succeeds() {
    let empty = scratch_dir("empty-config");
    std::fs::create_dir_all(&empty).unwrap();
    std::fs::write(empty.join("none.toml"), "").unwrap();
    let source = fixtures_dir().join("strict/main.cn");

    let output = cinderc(
        &empty,
        &["--config", "none.toml", "check", source.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("warning[W5001]: unused variable `unused`"), "stderr:\n{}", err);
    assert!(err.contains("(1 warning)"), "stderr:\n{}", err);

    let _ = std::fs::remove_dir_all(&empty);
}

// ────────────────────────────────────────────────────────────────────────────
// build and disasm
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_build_writes_decodable_modules() {
    let out_dir = scratch_dir("build");
    let output = cinderc(
        &fixtures_dir().join("simple"),
        &["build", "lib.cn", "app.cn", "-o", out_dir.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));

    let bytes = std::fs::read(out_dir.join("app.cnb")).expect("app.cnb written");
    let module = CompiledModule::decode(&bytes).expect("valid container");
    assert_eq!(module.name, "app");
    assert!(module.globals.iter().any(|g| g == "area"));
    assert!(out_dir.join("lib.cnb").exists());

    let output = cinderc(
        &fixtures_dir().join("simple"),
        &["disasm", out_dir.join("app.cnb").to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(stdout(&output), disassemble(&module));

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn test_build_json_output() {
    let out_dir = scratch_dir("build-json");
    let output = cinderc(
        &fixtures_dir().join("simple"),
        &["build", "lib.cn", "--json", "-o", out_dir.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));

    let text = std::fs::read_to_string(out_dir.join("lib.json")).expect("lib.json written");
    let module: CompiledModule = serde_json::from_str(&text).expect("module JSON");
    assert_eq!(module.name, "lib");
    assert!(module.exports.iter().any(|e| e.name == "square"));

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn test_build_with_errors_writes_nothing() {
    let out_dir = scratch_dir("build-broken");
    let output = cinderc(
        &fixtures_dir().join("broken"),
        &["build", "main.cn", "-o", out_dir.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(!out_dir.exists());
}
