use crate::error::DbUtilsError;

/// Transaction-control statement the connection has to send to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxCommand {
    Begin,
    Commit,
    Rollback,
}

impl TxCommand {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            TxCommand::Begin => "BEGIN",
            TxCommand::Commit => "COMMIT",
            TxCommand::Rollback => "ROLLBACK",
        }
    }
}

/// Tracks auto-commit mode and whether a server-side transaction is open.
///
/// With auto-commit off, a transaction is opened lazily before the first statement and
/// stays open until `commit` or `rollback`. With auto-commit on, every statement commits
/// on its own and manual commit/rollback are errors.
///
/// Each method returns the command to send; the caller must call [`TxState::confirm`]
/// once the server has accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxState {
    auto_commit: bool,
    in_transaction: bool,
}

impl TxState {
    #[must_use]
    pub fn new(auto_commit: bool) -> Self {
        Self {
            auto_commit,
            in_transaction: false,
        }
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Command required before running a statement.
    #[must_use]
    pub fn before_statement(&self) -> Option<TxCommand> {
        (!self.auto_commit && !self.in_transaction).then_some(TxCommand::Begin)
    }

    /// # Errors
    /// Returns `DbUtilsError::TransactionError` when auto-commit is enabled.
    pub fn commit(&self) -> Result<Option<TxCommand>, DbUtilsError> {
        self.finish(TxCommand::Commit, "commit")
    }

    /// # Errors
    /// Returns `DbUtilsError::TransactionError` when auto-commit is enabled.
    pub fn rollback(&self) -> Result<Option<TxCommand>, DbUtilsError> {
        self.finish(TxCommand::Rollback, "rollback")
    }

    fn finish(&self, command: TxCommand, action: &str) -> Result<Option<TxCommand>, DbUtilsError> {
        if self.auto_commit {
            return Err(DbUtilsError::TransactionError(format!(
                "cannot {action} when auto-commit is enabled"
            )));
        }
        Ok(self.in_transaction.then_some(command))
    }

    /// Command required before switching modes; turning auto-commit on commits pending work.
    #[must_use]
    pub fn before_mode_change(&self, auto_commit: bool) -> Option<TxCommand> {
        (auto_commit && self.in_transaction).then_some(TxCommand::Commit)
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    /// Command required before closing the connection.
    #[must_use]
    pub fn on_close(&self) -> Option<TxCommand> {
        self.in_transaction.then_some(TxCommand::Rollback)
    }

    /// Record that the server accepted `command`.
    pub fn confirm(&mut self, command: TxCommand) {
        self.in_transaction = matches!(command, TxCommand::Begin);
    }

    /// Forget any open transaction, e.g. after the connection was replaced.
    pub fn reset(&mut self) {
        self.in_transaction = false;
    }
}
