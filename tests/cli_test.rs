//! Integration tests for the boil command line

mod common;

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use common::{TemplateBuilder, hello_template};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

/// Isolated config file and template repository
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn tpldir(&self) -> PathBuf {
        self.path().join("templates")
    }

    fn boil(&self) -> Command {
        let mut cmd = Command::cargo_bin("boil").unwrap();
        cmd.env_remove("BOIL_CONFIG")
            .env_remove("BOIL_TPLDIR")
            .arg("--config")
            .arg(self.path().join("config.json"))
            .arg("--tpldir")
            .arg(self.tpldir());
        cmd
    }

    fn install_hello(&self) {
        let src = hello_template(&self.path().join("sources"));
        self.boil()
            .arg("install")
            .arg(&src)
            .assert()
            .success()
            .stdout(predicate::str::contains("Installed template hello"));
    }
}

#[test]
fn test_list_missing_template_folder() {
    let sandbox = Sandbox::new();
    std::fs::remove_dir(sandbox.tpldir()).unwrap();

    sandbox
        .boil()
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_list_plain() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();

    sandbox
        .boil()
        .args(["list", "--plain"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn test_list_table() {
    let sandbox = Sandbox::new();
    sandbox
        .boil()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No templates installed."));

    sandbox.install_hello();
    sandbox
        .boil()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed templates:"))
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains("never"));
}

#[test]
fn test_install_and_use() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();
    assert!(sandbox.tpldir().join("hello/.parboil").is_file());

    let out = sandbox.path().join("out");
    sandbox
        .boil()
        .arg("use")
        .arg("hello")
        .arg(&out)
        .args(["--no-input", "-v", "Name", "Parboil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created file hello.txt"))
        .stdout(predicate::str::contains("Generated project from hello"));

    assert_eq!(
        std::fs::read_to_string(out.join("hello.txt")).unwrap(),
        "Hello, Parboil!"
    );
}

#[test]
fn test_use_prefilled_from_config() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();
    std::fs::write(
        sandbox.path().join("config.json"),
        json!({"prefilled": {"Name": "Config"}}).to_string(),
    )
    .unwrap();

    let out = sandbox.path().join("out");
    sandbox
        .boil()
        .arg("use")
        .arg("hello")
        .arg(&out)
        .arg("--no-input")
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(out.join("hello.txt")).unwrap(),
        "Hello, Config!"
    );
}

#[test]
fn test_use_hard_clears_output() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();
    let out = sandbox.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("stale.txt"), "old").unwrap();

    sandbox
        .boil()
        .arg("use")
        .arg("hello")
        .arg(&out)
        .args(["--no-input", "--hard"])
        .assert()
        .success();

    assert!(!out.join("stale.txt").exists());
    assert_eq!(
        std::fs::read_to_string(out.join("hello.txt")).unwrap(),
        "Hello, World!"
    );
}

#[test]
fn test_use_missing_template() {
    let sandbox = Sandbox::new();
    sandbox
        .boil()
        .args(["use", "nope", "--no-input"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Template nope is not installed."));
}

#[test]
fn test_update_missing_template() {
    let sandbox = Sandbox::new();
    sandbox
        .boil()
        .args(["update", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not installed"));
}

#[test]
fn test_update_from_local_source() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();
    let src = sandbox.path().join("sources/hello");
    std::fs::write(src.join("template/extra.txt"), "extra").unwrap();

    sandbox
        .boil()
        .args(["update", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated template hello"));
    assert!(sandbox.tpldir().join("hello/template/extra.txt").is_file());
}

#[test]
fn test_install_repo_of_templates() {
    let sandbox = Sandbox::new();
    let collection = sandbox.path().join("collection");
    hello_template(&collection);
    TemplateBuilder::new(&collection, "other")
        .descriptor(json!({"fields": {}}))
        .file("template/readme.md", "other")
        .build();
    std::fs::create_dir_all(collection.join("not-a-template")).unwrap();

    sandbox
        .boil()
        .arg("install")
        .arg(&collection)
        .arg("-r")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed template hello"))
        .stdout(predicate::str::contains("Installed template other"));

    sandbox
        .boil()
        .args(["list", "-p"])
        .assert()
        .success()
        .stdout("hello\nother\n");
}

#[test]
fn test_uninstall_force() {
    let sandbox = Sandbox::new();
    sandbox.install_hello();

    sandbox
        .boil()
        .args(["uninstall", "-f", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninstalled template hello"));
    assert!(!sandbox.tpldir().join("hello").exists());

    sandbox
        .boil()
        .args(["uninstall", "-f", "hello"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file() {
    let sandbox = Sandbox::new();
    std::fs::remove_file(sandbox.path().join("config.json")).unwrap();

    sandbox
        .boil()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
