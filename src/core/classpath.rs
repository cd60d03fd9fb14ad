// src/core/classpath.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, RouteLensError};

/// Supplies raw class bytes by internal name (`com/acme/App`)
pub trait ClassSource {
    /// `Ok(None)` when the type is not part of this source
    fn load_class_bytes(&self, internal_name: &str) -> Result<Option<Vec<u8>>>;
}

/// One or more compiled-class output directories
pub struct DirectoryClassSource {
    roots: Vec<PathBuf>,
}

impl DirectoryClassSource {
    pub fn new(roots: Vec<PathBuf>) -> Result<Self> {
        for root in &roots {
            if !root.is_dir() {
                return Err(RouteLensError::FileSystem(format!(
                    "Class directory does not exist: {}",
                    root.display()
                )));
            }
        }
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Internal names of every `.class` file below the roots, sorted
    pub fn list_classes(&self) -> Vec<String> {
        let mut names = Vec::new();
        for root in &self.roots {
            for entry in WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if let Some(name) = internal_name_for(root, entry.path()) {
                    names.push(name);
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

fn internal_name_for(root: &Path, file: &Path) -> Option<String> {
    if file.extension().and_then(|e| e.to_str()) != Some("class") {
        return None;
    }
    let relative = file.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative.components().filter_map(|c| c.as_os_str().to_str()).collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

impl ClassSource for DirectoryClassSource {
    fn load_class_bytes(&self, internal_name: &str) -> Result<Option<Vec<u8>>> {
        for root in &self.roots {
            let path = root.join(format!("{}.class", internal_name));
            if path.is_file() {
                debug!("Loading {} from {}", internal_name, path.display());
                return Ok(Some(std::fs::read(&path)?));
            }
        }
        Ok(None)
    }
}

/// In-memory class source for embedding and tests
#[derive(Default)]
pub struct MemorySource {
    classes: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, internal_name: &str, bytes: Vec<u8>) {
        self.classes.insert(internal_name.to_string(), bytes);
    }

    pub fn with(mut self, internal_name: &str, bytes: Vec<u8>) -> Self {
        self.insert(internal_name, bytes);
        self
    }
}

impl ClassSource for MemorySource {
    fn load_class_bytes(&self, internal_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.classes.get(internal_name).cloned())
    }
}
