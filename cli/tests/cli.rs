//! Integration tests: drive the `imagepin` binary against temporary packages.
//!
//! None of these tests contact a registry: packages either contain no
//! annotated references or use commands that never resolve.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const UNMARKED: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.21 # served by the edge tier
";

const MARKED: &str = "\
kind: Pod
metadata:
  name: cache
spec:
  containers:
    - name: redis
      image: redis:7 # $update-digest$
";

fn imagepin(args: &[&str], docker_config: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_imagepin"))
        .args(args)
        .env("DOCKER_CONFIG", docker_config)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run imagepin")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn package(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
    dir
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    let output = imagepin(&["version"], home.path());
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("imagepin version "));
}

#[test]
fn test_pin_unmarked_package_is_noop() {
    let home = TempDir::new().unwrap();
    let dir = package(&[("deploy/web.yaml", UNMARKED), ("README.md", "# docs\n")]);
    let dir_arg = dir.path().to_str().unwrap();

    let output = imagepin(&["pin", "-d", dir_arg], home.path());

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("No annotated references updated"));
    assert!(out.contains("1 file(s) scanned, 1 skipped, 0 changed"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("deploy/web.yaml")).unwrap(),
        UNMARKED
    );
}

#[test]
fn test_pin_json_report() {
    let home = TempDir::new().unwrap();
    let dir = package(&[("web.yml", UNMARKED)]);
    let dir_arg = dir.path().to_str().unwrap();

    let output = imagepin(&["pin", "-d", dir_arg, "--json", "--dry-run"], home.path());

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["files_scanned"], 1);
    assert_eq!(report["files_changed"], 0);
    assert!(report["updates"].as_array().unwrap().is_empty());
}

#[test]
fn test_pin_missing_directory_fails() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("does-not-exist");

    let output = imagepin(&["pin", "-d", missing.to_str().unwrap()], home.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_pin_requires_directory() {
    let home = TempDir::new().unwrap();
    let output = imagepin(&["pin"], home.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_pin_malformed_reference_fails_without_network() {
    let home = TempDir::new().unwrap();
    let broken = "image: \"Not A Ref!!\" # $update-digest$\n";
    let dir = package(&[("broken.yaml", broken)]);
    let dir_arg = dir.path().to_str().unwrap();

    let output = imagepin(&["pin", "-d", dir_arg], home.path());

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("broken.yaml")).unwrap(),
        broken
    );
}

#[test]
fn test_scan_lists_annotated_references() {
    let home = TempDir::new().unwrap();
    let dir = package(&[("a.yaml", UNMARKED), ("b.yaml", MARKED)]);
    let dir_arg = dir.path().to_str().unwrap();

    let output = imagepin(&["scan", "-d", dir_arg, "--json"], home.path());

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["file"], "b.yaml");
    assert_eq!(entries[0]["path"], ".spec.containers.image");
    assert_eq!(entries[0]["value"], "redis:7");
}

#[test]
fn test_scan_custom_marker() {
    let home = TempDir::new().unwrap();
    let dir = package(&[("a.yaml", "image: alpine:3.19 # pin-me\n")]);
    let dir_arg = dir.path().to_str().unwrap();

    let output = imagepin(&["scan", "-d", dir_arg, "-c", "pin-me"], home.path());

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains(".image"));
    assert!(out.contains("alpine:3.19"));
}

#[test]
fn test_login_and_logout() {
    let home = TempDir::new().unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_imagepin"))
        .args(["login", "ghcr.io", "-u", "ci", "--password-stdin"])
        .env("DOCKER_CONFIG", home.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"s3cret\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("Login Succeeded"));

    let config: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(home.path().join("config.json")).unwrap(),
    )
    .unwrap();
    assert!(config["auths"]["ghcr.io"]["auth"].is_string());

    let output = imagepin(&["logout", "ghcr.io"], home.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("Removing login credentials for ghcr.io"));

    let output = imagepin(&["logout", "ghcr.io"], home.path());
    assert!(stdout(&output).contains("Not logged in to ghcr.io"));
}
