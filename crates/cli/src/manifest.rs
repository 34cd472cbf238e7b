// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest loading: YAML files (multi-document) or directories of them.

use std::path::Path;

use anyhow::Context;

use ink_daemon::service::resource::Object;

pub fn load(path: &Path) -> anyhow::Result<Vec<Object>> {
    let mut objects = Vec::new();
    if path.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(path)
            .with_context(|| format!("read dir {}", path.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        entries.sort();
        for entry in entries {
            objects.extend(load_file(&entry)?);
        }
    } else {
        objects.extend(load_file(path)?);
    }
    if objects.is_empty() {
        anyhow::bail!("no manifests found in {}", path.display());
    }
    Ok(objects)
}

fn load_file(path: &Path) -> anyhow::Result<Vec<Object>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;

    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value: serde_json::Value = serde::Deserialize::deserialize(document)
            .with_context(|| format!("parse {}", path.display()))?;
        if value.is_null() {
            continue;
        }
        let object = Object::from_value(value)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        objects.push(object);
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"
kind: Workflow
name: build
spec:
  steps:
    - name: run
      command: ["true"]
---
kind: Box
name: release
resources:
  - kind: Workflow
    name: build
"#;

    #[test]
    fn loads_multi_document_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.yaml");
        std::fs::File::create(&path).unwrap().write_all(MANIFEST.as_bytes()).unwrap();

        let objects = load(&path).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(matches!(objects[0], Object::Workflow(_)));
        assert!(matches!(objects[1], Object::BoxDef(_)));
    }

    #[test]
    fn loads_directories_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), MANIFEST).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let objects = load(dir.path()).unwrap();
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn empty_inputs_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).is_err());
    }
}
