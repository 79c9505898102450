mod common;

use std::process::Command;
use tempfile::TempDir;

use common::get_gridforge_binary;
use common::helpers::create_project_skeleton;

/// Test 1: --help lists the subcommands
#[test]
fn help_lists_subcommands() {
    let output = Command::new(get_gridforge_binary())
        .arg("--help")
        .output()
        .expect("Failed to execute gridforge --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build"), "help should list build");
    assert!(stdout.contains("fetch"), "help should list fetch");
    assert!(stdout.contains("doctor"), "help should list doctor");
}

/// Test 2: --version reports the package version
#[test]
fn version_flag() {
    let output = Command::new(get_gridforge_binary())
        .arg("--version")
        .output()
        .expect("Failed to execute gridforge --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gridforge"));
}

/// Test 3: doctor accepts --json
///
/// The toolchain gate may legitimately fail on machines with an old
/// device compiler, so only the argument surface is pinned down.
#[test]
fn doctor_accepts_json_flag() {
    let temp = TempDir::new().unwrap();
    create_project_skeleton(&temp);

    let output = Command::new(get_gridforge_binary())
        .args(["doctor", "--json"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to execute gridforge doctor");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("unexpected argument"),
        "doctor --json should be accepted. stderr: {stderr}"
    );
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("cpp_std"), "JSON profile names cpp_std");
    }
}

/// Test 4: doctor in human mode reports the language standard
#[test]
fn doctor_reports_profile() {
    let temp = TempDir::new().unwrap();
    create_project_skeleton(&temp);

    let output = Command::new(get_gridforge_binary())
        .arg("doctor")
        .current_dir(temp.path())
        .output()
        .expect("Failed to execute gridforge doctor");

    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Language standard"), "stdout: {stdout}");
        assert!(stdout.contains("voxgrid version: 0.9.0"), "stdout: {stdout}");
    } else {
        assert!(
            stderr.contains("compute capability"),
            "doctor may only fail on the capability gate. stderr: {stderr}"
        );
    }
}

/// Test 5: verbose and quiet are mutually exclusive
#[test]
fn build_rejects_conflicting_verbosity() {
    let output = Command::new(get_gridforge_binary())
        .args(["build", "--verbose", "--quiet"])
        .output()
        .expect("Failed to execute gridforge build");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot be used with"),
        "conflicting flags should be rejected. stderr: {stderr}"
    );
}

/// Test 6: build accepts its documented flags
///
/// The build itself fails in a sandbox (no network, no device
/// toolchain); only flag acceptance is asserted.
#[test]
fn build_accepts_flags() {
    let temp = TempDir::new().unwrap();
    create_project_skeleton(&temp);

    let output = Command::new(get_gridforge_binary())
        .args(["build", "--inplace", "--jobs", "2", "--quiet"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to execute gridforge build");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("unexpected argument"),
        "build flags should be accepted. stderr: {stderr}"
    );
}

/// Test 7: fetch accepts its documented flags
#[test]
fn fetch_accepts_flags() {
    let temp = TempDir::new().unwrap();
    create_project_skeleton(&temp);

    let output = Command::new(get_gridforge_binary())
        .args(["fetch", "--quiet"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to execute gridforge fetch");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("unexpected argument"),
        "fetch flags should be accepted. stderr: {stderr}"
    );
}

/// Test 8: fetch refuses to reuse a non-repository dependency path
#[test]
fn fetch_rejects_occupied_dependency_path() {
    let temp = TempDir::new().unwrap();
    create_project_skeleton(&temp);

    // Occupy the first fetched dependency's path with a plain directory
    let occupied = temp.path().join("external/gridvdb");
    std::fs::create_dir_all(&occupied).unwrap();
    std::fs::write(occupied.join("keep.txt"), b"precious").unwrap();

    let output = Command::new(get_gridforge_binary())
        .args(["fetch", "--quiet"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to execute gridforge fetch");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("not a git repository"),
        "stderr: {stderr}"
    );
    // The occupied directory is left untouched
    assert!(occupied.join("keep.txt").exists());
}

/// Test 9: completion generates a script
#[test]
fn completion_bash_prints_script() {
    let output = Command::new(get_gridforge_binary())
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute gridforge completion");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gridforge"));
}
