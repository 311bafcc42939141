// src/artifacts.rs

//! Glob matching for artifact contracts (`produces` / `consumes`) and for
//! glob-based partition items.
//!
//! Patterns are relative to the build root and use `/` as separator; `*` does
//! not cross directory boundaries, `**` does. A leading `./` is ignored.
//! Absolute patterns are matched against absolute paths, so
//! `"/repo/output/packages/*.nupkg"` works as well as
//! `"output/packages/*.nupkg"` with `/repo` as root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::fs::FileSystem;

/// A compiled artifact glob.
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    /// As written by the user; used in error reports.
    pattern: String,
    /// `pattern` without leading `./` segments.
    glob: String,
    matcher: GlobMatcher,
}

impl ArtifactPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut glob = pattern;
        while let Some(rest) = glob.strip_prefix("./") {
            glob = rest.trim_start_matches('/');
        }

        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pattern}"))?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            glob: glob.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    fn is_absolute(&self) -> bool {
        Path::new(&self.glob).is_absolute()
    }

    /// Leading path components that contain no glob metacharacters.
    ///
    /// Walking starts there instead of at the root.
    fn literal_prefix(&self) -> PathBuf {
        let mut prefix = if self.glob.starts_with('/') {
            PathBuf::from("/")
        } else {
            PathBuf::new()
        };
        let components: Vec<&str> = self.glob.split('/').collect();
        // The last component names files, never descend into it as a dir.
        for component in &components[..components.len().saturating_sub(1)] {
            if component.contains(['*', '?', '[', '{']) {
                break;
            }
            if !component.is_empty() {
                prefix.push(component);
            }
        }
        prefix
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// All files under `root` matching this pattern, sorted.
    pub fn find_matches(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        // Joining an absolute prefix replaces `root`.
        let files = fs.files_under(&root.join(self.literal_prefix()))?;
        let absolute = self.is_absolute();
        Ok(files
            .into_iter()
            .filter(|path| {
                let candidate = if absolute {
                    Some(path.as_path())
                } else {
                    path.strip_prefix(root).ok()
                };
                candidate.is_some_and(|p| self.is_match(&p.to_string_lossy().replace('\\', "/")))
            })
            .collect())
    }
}

/// Check that every pattern matches at least one file under `root`.
///
/// Returns the first pattern without a match, if any.
pub fn first_unmatched<'a>(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &'a [ArtifactPattern],
) -> Result<Option<&'a ArtifactPattern>> {
    for pattern in patterns {
        if pattern.find_matches(fs, root)?.is_empty() {
            return Ok(Some(pattern));
        }
    }
    Ok(None)
}
