//! git::merge
//!
//! In-memory merge previews with optional content-merge hooks.
//!
//! A preview merges two commits without touching any ref, index file or
//! working tree. Registered [`MergeHook`]s may resolve file-level conflicts,
//! but only when the caller asks for it: conflict detection runs previews
//! with hooks suspended so the answer reflects a plain merge.

use std::path::Path;

use tracing::debug;

use super::interface::{from_git2_oid, to_git2_oid, Git, GitError};
use crate::core::types::Oid;

/// Stage bits of an index entry's flags.
const INDEX_STAGE_MASK: u16 = 0x3000;

/// A content merger for conflicted files.
pub trait MergeHook: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Merge one conflicted file.
    ///
    /// Returns the merged content, or `None` to leave the conflict alone.
    fn merge_file(
        &self,
        path: &str,
        ancestor: Option<&[u8]>,
        ours: &[u8],
        theirs: &[u8],
    ) -> Option<Vec<u8>>;
}

/// Whether a preview consults the registered merge hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPolicy {
    /// Hooks may resolve conflicts
    Enabled,
    /// Plain merge only
    Suspended,
}

/// Result of a merge preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePreview {
    /// Paths still conflicted after the merge
    pub conflicts: Vec<String>,
    /// Tree of the merge result, present only without conflicts
    pub tree: Option<Oid>,
    /// Paths a hook resolved
    pub resolved_by_hooks: Vec<String>,
}

impl MergePreview {
    /// Whether the merge left conflicts.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

impl Git {
    /// Register a content-merge hook on this handle.
    pub fn add_merge_hook(&mut self, hook: Box<dyn MergeHook>) {
        self.hooks.push(hook);
    }

    /// Names of the registered hooks.
    pub fn merge_hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Merge `theirs` into `ours` in memory.
    pub fn merge_preview(
        &self,
        ours: &Oid,
        theirs: &Oid,
        policy: HookPolicy,
    ) -> Result<MergePreview, GitError> {
        let ours_commit = self
            .repo
            .find_commit(to_git2_oid(ours)?)
            .map_err(|e| GitError::from_git2(e, ours.as_str()))?;
        let theirs_commit = self
            .repo
            .find_commit(to_git2_oid(theirs)?)
            .map_err(|e| GitError::from_git2(e, theirs.as_str()))?;

        let mut options = git2::MergeOptions::new();
        options.find_renames(true);
        let mut index = self
            .repo
            .merge_commits(&ours_commit, &theirs_commit, Some(&options))?;

        let mut resolved_by_hooks = Vec::new();
        if index.has_conflicts() && policy == HookPolicy::Enabled && !self.hooks.is_empty() {
            resolved_by_hooks = self.resolve_with_hooks(&mut index)?;
        }

        if index.has_conflicts() {
            let conflicts = conflict_paths(&index)?;
            debug!(?conflicts, "merge preview has conflicts");
            return Ok(MergePreview {
                conflicts,
                tree: None,
                resolved_by_hooks,
            });
        }

        let tree = index.write_tree_to(&self.repo)?;
        Ok(MergePreview {
            conflicts: Vec::new(),
            tree: Some(from_git2_oid(tree)?),
            resolved_by_hooks,
        })
    }

    fn resolve_with_hooks(&self, index: &mut git2::Index) -> Result<Vec<String>, GitError> {
        let conflicts = index
            .conflicts()?
            .collect::<Result<Vec<git2::IndexConflict>, _>>()?;

        let mut resolved = Vec::new();
        for conflict in conflicts {
            // add/delete conflicts have no content to merge
            let (Some(ours), Some(theirs)) = (conflict.our, conflict.their) else {
                continue;
            };
            let path = String::from_utf8_lossy(&ours.path).into_owned();
            let ancestor = match &conflict.ancestor {
                Some(entry) => Some(self.blob_bytes(entry.id)?),
                None => None,
            };
            let ours_bytes = self.blob_bytes(ours.id)?;
            let theirs_bytes = self.blob_bytes(theirs.id)?;

            let merged = self.hooks.iter().find_map(|hook| {
                let result =
                    hook.merge_file(&path, ancestor.as_deref(), &ours_bytes, &theirs_bytes);
                if result.is_some() {
                    debug!(hook = hook.name(), path = %path, "hook resolved conflict");
                }
                result
            });
            let Some(content) = merged else {
                continue;
            };

            let blob = self.repo.blob(&content)?;
            index.conflict_remove(Path::new(&path))?;
            index.add(&git2::IndexEntry {
                ctime: ours.ctime,
                mtime: ours.mtime,
                dev: ours.dev,
                ino: ours.ino,
                mode: ours.mode,
                uid: ours.uid,
                gid: ours.gid,
                file_size: content.len() as u32,
                id: blob,
                flags: ours.flags & !INDEX_STAGE_MASK,
                flags_extended: ours.flags_extended,
                path: ours.path,
            })?;
            resolved.push(path);
        }
        Ok(resolved)
    }

    fn blob_bytes(&self, id: git2::Oid) -> Result<Vec<u8>, GitError> {
        let blob = self
            .repo
            .find_blob(id)
            .map_err(|e| GitError::from_git2(e, &id.to_string()))?;
        Ok(blob.content().to_vec())
    }
}

fn conflict_paths(index: &git2::Index) -> Result<Vec<String>, GitError> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict
            .our
            .or(conflict.their)
            .or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
