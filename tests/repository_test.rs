//! Repository install / update / uninstall scenarios

mod common;

use std::time::Duration;

use common::{TemplateBuilder, hello_template, tree};
use parboil::core::error::Error;
use parboil::core::shell::MockCommandExecutor;
use parboil::core::templates::{InstallOptions, Repository, SourceType};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_install_then_installed() {
    let sources = TempDir::new().unwrap();
    let src = hello_template(sources.path());
    let repo = TempDir::new().unwrap();
    let mut repository = Repository::new(repo.path());

    let installed = repository
        .install_from_directory("hello", &src, InstallOptions::default())
        .await
        .unwrap();

    assert_eq!(installed.len(), 1);
    assert!(repository.is_installed("hello"));
    assert_eq!(repository.list(), ["hello"]);

    let template = repository.load_template("hello").await.unwrap();
    assert_eq!(template.meta.source_type().unwrap(), Some(SourceType::Local));
    assert_eq!(
        template.meta.source.as_deref(),
        Some(src.canonicalize().unwrap().to_str().unwrap())
    );
}

#[tokio::test]
async fn test_second_install_requires_hard() {
    let sources = TempDir::new().unwrap();
    let src = hello_template(sources.path());
    let repo = TempDir::new().unwrap();
    let mut repository = Repository::new(repo.path());

    repository
        .install_from_directory("hello", &src, InstallOptions::default())
        .await
        .unwrap();
    let first = repository.load_template("hello").await.unwrap().meta.created;

    let err = repository
        .install_from_directory("hello", &src, InstallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProjectExists(ref name) if name == "hello"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    repository
        .install_from_directory("hello", &src, InstallOptions::default().hard(true))
        .await
        .unwrap();
    let second = repository.load_template("hello").await.unwrap().meta.created;
    assert!(second > first);
}

#[tokio::test]
async fn test_legacy_descriptor_is_renamed_in_copy() {
    let sources = TempDir::new().unwrap();
    let src = sources.path().join("legacy");
    std::fs::create_dir_all(src.join("template")).unwrap();
    std::fs::write(src.join("project.json"), json!({"fields": {"Name": "x"}}).to_string()).unwrap();
    std::fs::write(src.join("template/a.txt"), "{{ Name }}").unwrap();

    let repo = TempDir::new().unwrap();
    let mut repository = Repository::new(repo.path());
    repository
        .install_from_directory("legacy", &src, InstallOptions::default())
        .await
        .unwrap();

    assert!(repo.path().join("legacy/parboil.json").is_file());
    assert!(src.join("project.json").is_file());
    let template = repository.load_template("legacy").await.unwrap();
    assert_eq!(template.fields.len(), 1);
}

#[tokio::test]
async fn test_update_local_syncs_with_source() {
    let sources = TempDir::new().unwrap();
    let src = TemplateBuilder::new(sources.path(), "hello")
        .descriptor(json!({"fields": {"Name": "World"}}))
        .file("template/hello.txt", "Hello, {{ Name }}!")
        .file("template/old.txt", "old")
        .build();
    let repo = TempDir::new().unwrap();
    let mut repository = Repository::new(repo.path());
    repository
        .install_from_directory("hello", &src, InstallOptions::default())
        .await
        .unwrap();

    std::fs::remove_file(src.join("template/old.txt")).unwrap();
    std::fs::write(src.join("template/new.txt"), "new").unwrap();
    std::fs::write(
        src.join("parboil.json"),
        json!({"fields": {"Name": "World", "Year": "2024"}}).to_string(),
    )
    .unwrap();

    let mut template = repository.load_template("hello").await.unwrap();
    let created = template.meta.created;
    template.update(&MockCommandExecutor::new()).await.unwrap();

    assert!(template.meta.updated.unwrap() > created);
    assert_eq!(template.fields.len(), 2);
    assert_eq!(tree(&repo.path().join("hello")), tree(&src));

    // a second update increases the timestamp again
    let first_update = template.meta.updated.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    template.update(&MockCommandExecutor::new()).await.unwrap();
    assert!(template.meta.updated.unwrap() > first_update);
}

#[tokio::test]
async fn test_update_without_metadata_fails() {
    let repo = TempDir::new().unwrap();
    hello_template(repo.path());
    let repository = Repository::new(repo.path());

    let mut template = repository.load_template("hello").await.unwrap();
    let err = template.update(&MockCommandExecutor::new()).await.unwrap_err();
    assert!(matches!(err, Error::ProjectFileNotFound(_)));
}

#[tokio::test]
async fn test_uninstall() {
    let sources = TempDir::new().unwrap();
    let src = hello_template(sources.path());
    let repo = TempDir::new().unwrap();
    let mut repository = Repository::new(repo.path());
    repository
        .install_from_directory("hello", &src, InstallOptions::default())
        .await
        .unwrap();

    repository.uninstall("hello").await.unwrap();
    assert!(!repository.is_installed("hello"));
    assert!(repository.is_empty());

    let err = repository.load_template("hello").await.unwrap_err();
    assert!(matches!(err, Error::NoSuchTemplate(_)));
}
