//! Top-level help and argument validation.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("mentor")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("lessons"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("mentor")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mentor"));
}

#[test]
fn test_unknown_command_fails() {
    cargo_bin_cmd!("mentor")
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_lessons_new_requires_title_and_subject() {
    cargo_bin_cmd!("mentor")
        .args(["lessons", "new", "--title", "Algebra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--subject"));
}
