//! Transaction-scoped spill file cleanup
//!
//! A [`TransactionContext`] owns every file a context buffer spilled to while
//! the transaction ran. [`TransactionContext::finish`] removes them once, on
//! commit and abort alike. Dropping an unfinished context takes the abort path.

use query_core::TransactionId;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TransactionContext {
    xid: TransactionId,
    pending: Vec<PathBuf>,
    finished: bool,
}

impl TransactionContext {
    pub fn new(xid: TransactionId) -> Self {
        Self {
            xid,
            pending: Vec::new(),
            finished: false,
        }
    }

    pub fn xid(&self) -> TransactionId {
        self.xid
    }

    /// Schedule `path` for removal at transaction end
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(
            "Registered {} for removal at end of transaction {}",
            path.display(),
            self.xid
        );
        self.pending.push(path);
    }

    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Remove every registered file. Returns the number of files removed;
    /// later calls are no-ops.
    pub fn finish(&mut self, committed: bool) -> usize {
        if self.finished {
            return 0;
        }
        self.finished = true;

        let mut removed = 0;
        for path in self.pending.drain(..) {
            if remove_spill_file(&path) {
                removed += 1;
            }
        }
        tracing::debug!(
            "Transaction {} {}: removed {} spill file(s)",
            self.xid,
            if committed { "committed" } else { "aborted" },
            removed
        );
        removed
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(false);
        }
    }
}

fn remove_spill_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Spill file {} already removed", path.display());
            false
        }
        Err(e) => {
            tracing::warn!("Failed to remove spill file {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spill_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"context").unwrap();
        path
    }

    #[test]
    fn test_commit_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = spill_file(dir.path(), "a");
        let b = spill_file(dir.path(), "b");

        let mut txn = TransactionContext::new(100);
        txn.register(&a);
        txn.register(&b);
        assert_eq!(txn.pending().len(), 2);
        assert_eq!(txn.finish(true), 2);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(txn.is_finished());
    }

    #[test]
    fn test_abort_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = spill_file(dir.path(), "a");

        let mut txn = TransactionContext::new(101);
        txn.register(&a);
        assert_eq!(txn.finish(false), 1);
        assert!(!a.exists());
    }

    #[test]
    fn test_finish_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = spill_file(dir.path(), "a");

        let mut txn = TransactionContext::new(102);
        txn.register(&a);
        assert_eq!(txn.finish(true), 1);

        // recreated after the transaction ended; must not be touched
        std::fs::write(&a, b"later").unwrap();
        assert_eq!(txn.finish(false), 0);
        assert!(a.exists());
    }

    #[test]
    fn test_drop_takes_abort_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = spill_file(dir.path(), "a");
        {
            let mut txn = TransactionContext::new(103);
            txn.register(&a);
        }
        assert!(!a.exists());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(104);
        txn.register(dir.path().join("never-created"));
        assert_eq!(txn.finish(true), 0);
    }
}
