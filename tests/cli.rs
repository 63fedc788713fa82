//
//  git-providers
//  tests/cli.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

use assert_cmd::Command;
use predicates::prelude::*;

fn gp(config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gp").unwrap();
    cmd.env("GP_CONFIG", config_dir.path().join("config.toml"))
        .env_remove("GP_PROVIDER")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn parse_public_url_without_configuration() {
    let dir = tempfile::tempdir().unwrap();
    gp(&dir)
        .args(["parse", "https://github.com/daytonaio/daytona/tree/main", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"owner\": \"daytonaio\""))
        .stdout(predicate::str::contains("\"branch\": \"main\""));
}

#[test]
fn link_builds_commit_url() {
    let dir = tempfile::tempdir().unwrap();
    gp(&dir)
        .args(["link", "https://gitlab.com/org/sub/repo", "--commit", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("https://gitlab.com/org/sub/repo"))
        .stdout(predicate::str::contains("abc123"));
}

#[test]
fn providers_list_includes_every_vendor() {
    let dir = tempfile::tempdir().unwrap();
    gp(&dir)
        .args(["providers", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"aws-codecommit\""))
        .stdout(predicate::str::contains("\"gitee\""));
}

#[test]
fn unknown_host_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    gp(&dir)
        .args(["parse", "https://git.example.com/team/app"])
        .assert()
        .code(8)
        .stderr(predicate::str::contains("no configured provider"));
}

#[test]
fn listing_without_providers_asks_for_configuration() {
    let dir = tempfile::tempdir().unwrap();
    gp(&dir)
        .arg("namespaces")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gp providers add"));
}
