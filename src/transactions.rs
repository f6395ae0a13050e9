use std::{fs, marker::PhantomData, path::PathBuf};

/// Undo step for one filesystem effect of a materialization run.
pub enum RollbackOperation {
    /// A file or symbolic link this run created.
    RemoveFile(PathBuf),
    /// A directory this run created (never one that existed before).
    RemoveDir(PathBuf),
    /// A file this run overwrote, with its previous content.
    RestoreFile(PathBuf, Vec<u8>),
}
/// Active Transaction
pub struct Active;
/// Committed Transaction
pub struct Committed;
/// A trait that tells us if rollback should occur when dropped.
pub trait TransactionState {
    const SHOULD_ROLLBACK: bool;
}
impl TransactionState for Active {
    const SHOULD_ROLLBACK: bool = true;
}
impl TransactionState for Committed {
    const SHOULD_ROLLBACK: bool = false;
}
/// Records every filesystem effect of a materialization so a failed run leaves the
/// destination the way it found it.
///
/// The state parameter decides what happens on drop: an `Active` transaction undoes
/// its operations in reverse order, a `Committed` one forgets them.
/// An error propagating out of the materializer therefore rolls back simply by
/// dropping the active transaction.
pub struct Transaction<State: TransactionState> {
    rollback_operations: Vec<RollbackOperation>,
    state: PhantomData<State>,
}
impl Default for Transaction<Active> {
    fn default() -> Self {
        Self::new()
    }
}
impl Transaction<Active> {
    pub fn new() -> Self {
        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }
    /// Keeps everything that was done.
    pub fn commit(mut self) -> Transaction<Committed> {
        self.rollback_operations.clear();

        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
}
impl<S: TransactionState> Drop for Transaction<S> {
    fn drop(&mut self) {
        if S::SHOULD_ROLLBACK && !self.rollback_operations.is_empty() {
            log::debug!("rolling back {} operations", self.rollback_operations.len());
            while let Some(operation) = self.rollback_operations.pop() {
                match operation {
                    RollbackOperation::RemoveDir(path) => {
                        log::debug!("removing dir: {}", path.display());
                        let _ = fs::remove_dir_all(&path);
                    }
                    RollbackOperation::RemoveFile(path) => {
                        log::debug!("removing file: {}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                    RollbackOperation::RestoreFile(path, content) => {
                        log::debug!("restoring file: {}", path.display());
                        let _ = fs::write(&path, content);
                    }
                }
            }
        } else if !S::SHOULD_ROLLBACK {
            log::debug!("committing transaction");
        }
    }
}
