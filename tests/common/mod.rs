//! Fixture builders shared by the integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Writes a template source directory below `parent`
pub struct TemplateBuilder {
    root: PathBuf,
    descriptor: Value,
}

impl TemplateBuilder {
    pub fn new(parent: &Path, name: &str) -> Self {
        Self {
            root: parent.join(name),
            descriptor: json!({}),
        }
    }

    pub fn descriptor(mut self, descriptor: Value) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Add a file relative to the template root, e.g. `template/README.md`
    pub fn file(self, path: &str, content: &str) -> Self {
        let path = self.root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    pub fn build(self) -> PathBuf {
        std::fs::create_dir_all(self.root.join("template")).unwrap();
        std::fs::write(
            self.root.join("parboil.json"),
            serde_json::to_string_pretty(&self.descriptor).unwrap(),
        )
        .unwrap();
        self.root
    }
}

/// The "hello" template: one field, one file
pub fn hello_template(parent: &Path) -> PathBuf {
    TemplateBuilder::new(parent, "hello")
        .descriptor(json!({"fields": {"Name": "World"}}))
        .file("template/hello.txt", "Hello, {{ Name }}!")
        .build()
}

/// Relative file paths below `dir`, sorted, skipping the metadata file
pub fn tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name() != ".parboil")
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}
