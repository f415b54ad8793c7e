use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Isolated home with a settings file pointing data and workspace into it.
struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self::with_settings("")
    }

    fn with_settings(extra: &str) -> Self {
        let home = TempDir::new().expect("home");
        let settings = format!(
            "path:\n  data_dir: {}\n  workspace: {}\n{extra}",
            home.path().join("data").display(),
            home.path().join("ws").display(),
        );
        fs::write(home.path().join("options.yaml"), settings).expect("settings");
        Self { home }
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    fn config(&self) -> PathBuf {
        self.path().join("options.yaml")
    }

    fn dli(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dli"));
        cmd.env("HOME", self.path())
            .env("USERPROFILE", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env_remove("DLI_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config());
        cmd
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn add_source(&self) {
        self.write("src/docs/intro.md", "Shared sentence here.\n\n.. only: abc xyz\n");
        self.write("src/docs/guide/setup.md", "Shared sentence here.\n");
        self.dli()
            .args(["add", "--project-code", "abc", "--source-dir"])
            .arg(self.path().join("src"))
            .assert()
            .success();
    }

    fn checkout(&self) {
        self.dli()
            .args([
                "checkout",
                "--project-code",
                "abc",
                "--ticket-id",
                "abc-1",
                "--summary",
                "Fix typo",
            ])
            .assert()
            .success();
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[test]
fn missing_config_file_fails() {
    let sandbox = Sandbox::new();
    Command::new(assert_cmd::cargo::cargo_bin!("dli"))
        .env("HOME", sandbox.path())
        .args(["--config"])
        .arg(sandbox.path().join("nope.yaml"))
        .args(["merge", "--project-code", "abc"])
        .assert()
        .failure()
        .stderr(contains("settings file not found"));
}

#[test]
fn config_is_read_from_environment() {
    let sandbox = Sandbox::new();
    sandbox.add_source();
    sandbox.checkout();
    Command::new(assert_cmd::cargo::cargo_bin!("dli"))
        .env("HOME", sandbox.path())
        .env("DLI_CONFIG", sandbox.config())
        .args(["merge", "--project-code", "abc", "--include", "version"])
        .assert()
        .success()
        .stdout(contains("merge"));
}

#[test]
fn invalid_setting_is_rejected() {
    let sandbox = Sandbox::with_settings("key_length: 0\n");
    sandbox
        .dli()
        .args(["merge", "--project-code", "abc"])
        .assert()
        .failure()
        .stderr(contains("key_length"));
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[test]
fn add_prints_registered_documents() {
    let sandbox = Sandbox::new();
    sandbox.write("src/docs/intro.md", "# Intro\n");
    sandbox
        .dli()
        .args(["add", "--project-code", "abc", "--source-dir"])
        .arg(sandbox.path().join("src"))
        .assert()
        .success()
        .stdout(contains("intro.md-"))
        .stdout(contains("add finished"));
    assert!(sandbox.path().join("data/meta/abc.yaml").exists());
}

#[test]
fn add_without_documents_exits_with_failure() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.path().join("src/docs")).unwrap();
    sandbox
        .dli()
        .args(["add", "--project-code", "abc", "--source-dir"])
        .arg(sandbox.path().join("src"))
        .assert()
        .code(1)
        .stdout(contains("add failed"));
}

#[test]
fn checkout_with_summary_creates_ticket_branch() {
    let sandbox = Sandbox::new();
    sandbox.add_source();
    sandbox.checkout();

    let repo = git2::Repository::open(sandbox.path().join("ws/ABC")).unwrap();
    assert_eq!(repo.head().unwrap().shorthand(), Some("ABC-1-FIX-TYPO-ABC"));
    assert!(sandbox.path().join("ws/ABC/docs/guide/setup.md").exists());
}

#[test]
fn checkin_without_branch_exits_with_failure() {
    let sandbox = Sandbox::new();
    sandbox.add_source();
    sandbox
        .dli()
        .args([
            "checkin",
            "--project-code",
            "abc",
            "--ticket-id",
            "abc-7",
            "--summary",
            "Nothing",
        ])
        .assert()
        .code(1)
        .stdout(contains("ABC-7"));
}

#[test]
fn merge_propagates_to_sibling_product() {
    let sandbox = Sandbox::new();
    sandbox.add_source();
    sandbox.checkout();
    sandbox
        .dli()
        .args(["merge", "--project-code", "abc", "--include", "auto"])
        .assert()
        .success();
    assert!(sandbox.path().join("ws/XYZ/docs/intro.md").exists());
}

#[test]
fn unknown_agent_kind_is_a_usage_error() {
    let sandbox = Sandbox::new();
    sandbox
        .dli()
        .args(["merge", "--project-code", "abc", "--include", "everything"])
        .assert()
        .failure()
        .stderr(contains("everything"));
}

// ---------------------------------------------------------------------------
// Detect
// ---------------------------------------------------------------------------

#[test]
fn detect_json_lists_duplicate_sentence() {
    let sandbox = Sandbox::new();
    sandbox.add_source();
    sandbox.checkout();

    let output = sandbox
        .dli()
        .args(["detect", "--project-code", "abc", "--json"])
        .output()
        .expect("run dli detect");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["context"], "sentence");
    assert_eq!(json["documents"], 2);
    assert_eq!(json["findings"][0]["preview"], "Shared sentence here.");
}

#[test]
fn detect_before_checkout_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .dli()
        .args(["detect", "--project-code", "abc", "--context", "paragraph"])
        .assert()
        .failure()
        .stderr(contains("run checkout first"));
}
