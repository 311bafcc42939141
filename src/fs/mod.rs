// src/fs/mod.rs

//! Filesystem access for artifact contracts and glob partition items.
//!
//! Everything that looks at the build tree goes through [`FileSystem`], so
//! artifact checks can be tested against [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Direct children of `dir`, as full paths.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Every file below `dir`, sorted. A missing `dir` yields nothing.
    fn files_under(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.is_dir(dir) {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for path in self.list_dir(&current)? {
                if self.is_dir(&path) {
                    pending.push(path);
                } else if self.is_file(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// The build tree on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .map(|entry| {
                entry
                    .map(|e| e.path())
                    .with_context(|| format!("listing {}", dir.display()))
            })
            .collect()
    }
}
