//! Integration tests for the `medialink` binary.
//!
//! Every test writes its own config into a temp dir and disables the
//! services it does not stand up, so nothing here needs a running stack.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const SERVICES: &[&str] = &[
    "qbittorrent",
    "sabnzbd",
    "jellyfin",
    "sonarr",
    "radarr",
    "lidarr",
    "prowlarr",
    "bazarr",
    "jellyseerr",
];

// ── Helpers ─────────────────────────────────────────────────────────

/// A `medialink` command with env isolation.
fn medialink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("medialink");
    cmd.env("HOME", "/tmp/medialink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/medialink-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("MEDIALINK_CONFIG")
        .env_remove("MEDIALINK_ADMIN__PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

struct Stack {
    dir: tempfile::TempDir,
}

impl Stack {
    /// Config root, media dirs and a config file with every service disabled.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["config", "stack", "downloads", "tv", "movies", "music"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let mut toml = format!(
            "config_root = \"{root}/config\"\n\
             stack_dir = \"{root}/stack\"\n\
             \n\
             [admin]\n\
             username = \"admin\"\n\
             password = \"hunter2\"\n\
             \n\
             [paths]\n\
             downloads = \"{root}/downloads\"\n\
             tv = \"{root}/tv\"\n\
             movies = \"{root}/movies\"\n\
             music = \"{root}/music\"\n",
            root = root.display()
        );
        for service in SERVICES {
            toml.push_str(&format!("\n[services.{service}]\nenabled = false\n"));
        }
        std::fs::write(root.join("medialink.toml"), toml).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PathBuf {
        self.path().join("medialink.toml")
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = medialink_cmd();
        cmd.env("MEDIALINK_CONFIG", self.config());
        cmd
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    medialink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("media stack")
            .and(predicate::str::contains("preflight"))
            .and(predicate::str::contains("check-config"))
            .and(predicate::str::contains("backup")),
    );
}

#[test]
fn test_version_flag() {
    medialink_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("medialink"));
}

#[test]
fn test_completions_zsh() {
    medialink_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_unknown_service_is_a_usage_error() {
    let output = medialink_cmd()
        .args(["test", "--service", "plex"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("plex"));
}

// ── check-config ────────────────────────────────────────────────────

#[test]
fn test_check_config_valid() {
    let stack = Stack::new();
    stack
        .cmd()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_check_config_flag_matches_subcommand() {
    let stack = Stack::new();
    stack.cmd().arg("--check-config").assert().success();
}

#[test]
fn test_check_config_show_masks_password() {
    let stack = Stack::new();
    stack
        .cmd()
        .args(["check-config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("hunter2").not()));
}

#[test]
fn test_check_config_lists_every_problem() {
    let stack = Stack::new();
    std::fs::write(
        stack.config(),
        "config_root = \"relative\"\n[paths]\ntv = \"media/tv\"\n",
    )
    .unwrap();

    let output = stack.cmd().arg("check-config").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("config_root"), "{text}");
    assert!(text.contains("admin.password"), "{text}");
    assert!(text.contains("paths.tv"), "{text}");
}

#[test]
fn test_missing_config_exits_one() {
    let output = medialink_cmd()
        .args(["check-config", "--config", "/tmp/medialink-cli-test-nonexistent/none.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("not found"));
}

// ── preflight ───────────────────────────────────────────────────────

#[test]
fn test_preflight_without_runtime_check() {
    let stack = Stack::new();
    stack
        .cmd()
        .args(["preflight", "--no-runtime-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("container runtime"));
}

#[test]
fn test_preflight_reports_missing_media_dir() {
    let stack = Stack::new();
    std::fs::remove_dir(stack.path().join("music")).unwrap();

    let output = stack
        .cmd()
        .args(["preflight", "--no-runtime-check"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("does not exist"));
}

// ── setup / test ────────────────────────────────────────────────────

#[test]
fn test_default_run_renders_artifacts() {
    let stack = Stack::new();
    stack.cmd().assert().success();

    let env = std::fs::read_to_string(stack.path().join("stack/.env")).unwrap();
    assert!(env.contains("SONARR_API_KEY="), "{env}");
}

#[test]
fn test_json_output_is_one_document() {
    let stack = Stack::new();
    let output = stack.cmd().args(["--output", "json"]).output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["verify"]["failed"], 0);
    assert_eq!(doc["setup"]["rendered"].as_array().unwrap().len(), 4);
}

#[test]
fn test_verify_alone_with_disabled_services() {
    let stack = Stack::new();
    stack
        .cmd()
        .args(["test", "--service", "sonarr", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"failed\": 0"));
}

// ── backup / restore ────────────────────────────────────────────────

#[test]
fn test_backup_then_restore() {
    let stack = Stack::new();
    let key = stack.path().join("config/sonarr/config.xml");
    std::fs::create_dir_all(key.parent().unwrap()).unwrap();
    std::fs::write(&key, "<ApiKey>abc</ApiKey>").unwrap();

    let out = stack.path().join("backups");
    stack
        .cmd()
        .arg("backup")
        .arg("--dest")
        .arg(&out)
        .assert()
        .success();
    let archive = std::fs::read_dir(&out)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    assert!(
        archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("medialink-backup-")
    );

    // Non-empty target needs --force.
    let output = stack.cmd().arg("restore").arg(&archive).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("--force"));

    std::fs::remove_dir_all(stack.path().join("config")).unwrap();
    stack.cmd().arg("restore").arg(&archive).assert().success();
    assert_eq!(
        std::fs::read_to_string(&key).unwrap(),
        "<ApiKey>abc</ApiKey>"
    );
}
