// src/fs/mock.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::FileSystem;

#[derive(Debug, Clone)]
enum Node {
    File,
    Dir(BTreeSet<String>),
}

/// In-memory build tree rooted at `"."`. Clones share the same tree, so a
/// test can keep a handle and add artifacts while a target body runs.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    nodes: Arc<Mutex<HashMap<PathBuf, Node>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(PathBuf::from("."), Node::Dir(BTreeSet::new()));
        Self {
            nodes: Arc::new(Mutex::new(nodes)),
        }
    }

    /// Add a file, creating missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        nodes.insert(path.to_path_buf(), Node::File);
        attach(&mut nodes, path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.lock().unwrap();
        insert_dir(&mut nodes, path.as_ref());
    }
}

/// Register `path` with its parent directory.
fn attach(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return,
    };
    if parent == path {
        return;
    }
    insert_dir(nodes, parent);

    if let (Some(Node::Dir(children)), Some(name)) = (
        nodes.get_mut(parent),
        path.file_name().and_then(|n| n.to_str()),
    ) {
        children.insert(name.to_string());
    }
}

fn insert_dir(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    if nodes.contains_key(path) {
        return;
    }
    nodes.insert(path.to_path_buf(), Node::Dir(BTreeSet::new()));
    attach(nodes, path);
}

impl FileSystem for MockFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::File))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::Dir(_)))
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        match self.nodes.lock().unwrap().get(dir) {
            Some(Node::Dir(children)) => Ok(children.iter().map(|c| dir.join(c)).collect()),
            _ => Err(anyhow!("not a directory: {}", dir.display())),
        }
    }
}
