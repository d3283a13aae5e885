// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem graph store.
//!
//! Every graph lives in its own `<id>.json` file inside one directory. The
//! directory is created on first save; a missing directory lists as empty.

use nodewire_editor_graph::{GraphSnapshot, GraphStore, StoreError, StoredGraph};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File extension of stored graphs
pub const GRAPH_FILE_EXTENSION: &str = "json";

/// Graph store backed by a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileGraphStore {
    dir: PathBuf,
}

impl FileGraphStore {
    /// Store graphs under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the graph files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for graph `id`
    pub fn graph_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_id(id) {
            return Err(StoreError::new(format!("Invalid graph id: {id:?}")));
        }
        Ok(self.dir.join(format!("{id}.{GRAPH_FILE_EXTENSION}")))
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\'])
        && !id.contains("..")
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::new(format!("Failed to {action} {}: {e}", path.display()))
}

impl GraphStore for FileGraphStore {
    fn list_own_graphs(&self) -> Result<Vec<StoredGraph>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read", &self.dir, e)),
        };

        let mut graphs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error("read", &self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(GRAPH_FILE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let graph_json = std::fs::read_to_string(&path).map_err(|e| io_error("read", &path, e))?;
            graphs.push(StoredGraph {
                id: id.to_string(),
                graph_json,
            });
        }
        graphs.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!("Listed {} graphs in {:?}", graphs.len(), self.dir);
        Ok(graphs)
    }

    fn save(&mut self, snapshot: &GraphSnapshot) -> Result<(), StoreError> {
        let id = snapshot
            .graph_info
            .id
            .as_deref()
            .ok_or_else(|| StoreError::new("Graph has no id"))?;
        let path = self.graph_path(id)?;

        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("create", &self.dir, e))?;
        let content = snapshot.to_json().map_err(|e| StoreError::new(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| io_error("write", &path, e))?;

        tracing::debug!("Saved graph {} to {:?}", id, path);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let path = self.graph_path(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Deleted graph {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::new(format!("Graph not found: {id}")))
            }
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }
}
