// src/partition.rs

//! Partition resolution: split a target's work items into `count` disjoint
//! slices and pick the one for the current invocation.
//!
//! Items are dealt round-robin: item `i` (in input order) lands in slice
//! `i % count`. This keeps slices balanced to within one item and makes the
//! result a pure function of `(items, count, index)`.

use std::path::Path;

use anyhow::Result as AnyResult;

use crate::artifacts::ArtifactPattern;
use crate::engine::TargetName;
use crate::errors::{BuilddagError, Result};
use crate::fs::FileSystem;

/// Where a partitioned target gets its work items from.
#[derive(Debug, Clone)]
pub enum PartitionItems {
    /// An explicit list, kept in declaration order.
    List(Vec<String>),
    /// Files under the build root matching a glob, sorted by path.
    Glob(String),
}

/// `partition = { count = N, ... }` on a target.
#[derive(Debug, Clone)]
pub struct PartitionSpec {
    pub count: usize,
    pub items: PartitionItems,
}

impl PartitionSpec {
    pub fn new(count: usize, items: PartitionItems) -> Self {
        Self { count, items }
    }

    /// Materialise the work item collection.
    pub fn collect_items(&self, fs: &dyn FileSystem, root: &Path) -> AnyResult<Vec<String>> {
        match &self.items {
            PartitionItems::List(items) => Ok(items.clone()),
            PartitionItems::Glob(pattern) => {
                let pattern = ArtifactPattern::new(pattern)?;
                let files = pattern.find_matches(fs, root)?;
                Ok(files
                    .iter()
                    .map(|p| {
                        p.strip_prefix(root)
                            .unwrap_or(p)
                            .to_string_lossy()
                            .replace('\\', "/")
                    })
                    .collect())
            }
        }
    }
}

/// The slice of work handed to one execution of a partitioned target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSlice {
    /// `None` when the invocation did not select a partition; the target then
    /// processes the whole collection.
    pub index: Option<usize>,
    pub count: usize,
    pub items: Vec<String>,
}

/// Select the items of slice `index` out of `count`.
pub fn select<T: Clone>(items: &[T], count: usize, index: usize) -> Option<Vec<T>> {
    if count == 0 || index >= count {
        return None;
    }
    Some(
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| i % count == index)
            .map(|(_, item)| item.clone())
            .collect(),
    )
}

/// Resolve the slice a target should process for the selected index.
pub fn resolve(
    target: &str,
    spec: &PartitionSpec,
    selected: Option<usize>,
    fs: &dyn FileSystem,
    root: &Path,
) -> Result<PartitionSlice> {
    let invalid = |index: usize| BuilddagError::InvalidPartitionIndex {
        target: TargetName::from(target),
        index,
        count: spec.count,
    };

    // Validate before touching the filesystem.
    if let Some(index) = selected {
        if index >= spec.count {
            return Err(invalid(index));
        }
    }

    let items = spec.collect_items(fs, root)?;

    match selected {
        Some(index) => {
            let items = select(&items, spec.count, index).ok_or_else(|| invalid(index))?;
            Ok(PartitionSlice {
                index: Some(index),
                count: spec.count,
                items,
            })
        }
        None => Ok(PartitionSlice {
            index: None,
            count: spec.count,
            items,
        }),
    }
}
