//! Smoke tests for verificador CLI
//!
//! These tests verify basic CLI functionality works correctly.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the verificador binary
fn verificador() -> Command {
    Command::cargo_bin("verificador").expect("verificador binary should exist")
}

fn write_png(path: &Path, image: &RgbaImage) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Fixture `fixture/series_1_1.jpeg` plus an identical and a changed capture
fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let fixture = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
    write_png(&temp.path().join("fixture/series_1_1.jpeg"), &fixture);
    write_png(&temp.path().join("same.png"), &fixture);

    let mut changed = fixture;
    changed.put_pixel(3, 4, Rgba([200, 20, 30, 255]));
    write_png(&temp.path().join("changed.png"), &changed);
    temp
}

fn diff(temp: &TempDir, rendered: &str) -> Command {
    let mut cmd = verificador();
    cmd.current_dir(temp.path()).args([
        "diff",
        rendered,
        "--fixture-dir",
        "fixture",
        "--prefix",
        "series_1",
        "--index",
        "1",
    ]);
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    verificador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    verificador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_no_args_shows_help() {
    verificador().assert().failure();
}

// ============================================================================
// Diff Tests
// ============================================================================

#[test]
fn test_diff_identical_passes() {
    let temp = workspace();
    diff(&temp, "same.png")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS series_1_1"));

    assert!(temp.path().join("output/rendered_series_1_1.jpg").exists());
    assert!(temp.path().join("output/diff_series_1_1.jpg").exists());
}

#[test]
fn test_diff_single_pixel_fails() {
    let temp = workspace();
    diff(&temp, "changed.png")
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL series_1_1"))
        .stderr(predicate::str::contains("1 mismatched pixels"));

    assert!(temp.path().join("output/diff_series_1_1.jpg").exists());
}

#[test]
fn test_diff_tolerance_flag() {
    let temp = workspace();
    diff(&temp, "changed.png")
        .args(["--tolerance", "1"])
        .assert()
        .success();
}

#[test]
fn test_diff_json_output() {
    let temp = workspace();
    let output = diff(&temp, "changed.png").arg("--json").output().unwrap();
    assert!(!output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["identity"], "series_1_1");
    assert_eq!(value["passed"], false);
    assert_eq!(value["mismatched_pixel_count"], 1);
    assert_eq!(value["error_kind"], "pixel_mismatch");
}

#[test]
fn test_diff_missing_fixture() {
    let temp = workspace();
    verificador()
        .current_dir(temp.path())
        .args([
            "diff", "same.png", "--fixture-dir", "fixture", "--prefix", "series_1", "--index", "4",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("series_1_4.jpeg"));
}

#[test]
fn test_diff_custom_output_dir() {
    let temp = workspace();
    diff(&temp, "same.png")
        .args(["--output-dir", "artifacts"])
        .assert()
        .success();
    assert!(temp.path().join("artifacts/rendered_series_1_1.jpg").exists());
}

#[test]
fn test_diff_quiet_prints_nothing_on_pass() {
    let temp = workspace();
    diff(&temp, "same.png")
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_default() {
    verificador()
        .args(["config", "--default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("series_1"))
        .stdout(predicate::str::contains("series_2"))
        .stdout(predicate::str::contains("medical-image"));
}

#[test]
fn test_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("verificar.yaml");
    fs::write(
        &path,
        "series:\n  - name: Chest\n    fixture_prefix: chest\n    total_images: 3\n    fixture_path: fixture/chest\n",
    )
    .unwrap();

    verificador()
        .args(["config", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("chest"))
        .stdout(predicate::str::contains("series_1").not());
}

#[test]
fn test_config_invalid_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    fs::write(&path, "comparison:\n  jpeg_quality: 0\n").unwrap();

    verificador()
        .args(["config", "--file"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("jpeg_quality"));
}

// ============================================================================
// Check Tests
// ============================================================================

#[test]
fn test_check_requires_url() {
    verificador()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}
