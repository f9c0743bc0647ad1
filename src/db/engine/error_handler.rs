//! Error-handler capability for connection failures.
//!
//! When a reconnect-capable engine loses its connection the executor
//! suspends the failing thread and asks the registered handler what to do.
//! The handler is called on its own thread and answers later through the
//! `ErrorAnswer` it was given.

use std::sync::{Arc, Condvar, Mutex};

use super::locking::{lock_unpoisoned, EngineLock};
use crate::db::error::DbError;

/// Whether queries may run, must wait for an answer, or are aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    ExecuteNormal,
    Wait,
    AbortQueries,
}

/// Registered by the application to decide how to continue after a
/// connection error.
pub trait ErrorHandler: Send + Sync {
    /// Called with the failed statement. Must eventually call
    /// `answer.continue_queries()` or `answer.abort_queries()`.
    fn connection_error(&self, answer: ErrorAnswer, error: &DbError, sql: &str);
}

/// Shared operation-status state. The mutex doubles as the error lock that
/// suspended threads wait on.
#[derive(Debug, Default)]
pub(crate) struct OperationState {
    pub(crate) status: Mutex<OperationStatus>,
    pub(crate) changed: Condvar,
}

impl OperationState {
    pub(crate) fn current(&self) -> OperationStatus {
        *lock_unpoisoned(&self.status)
    }

    pub(crate) fn wake_all(&self, status: OperationStatus) {
        *lock_unpoisoned(&self.status) = status;
        self.changed.notify_all();
    }
}

/// Handle through which an error handler resumes or aborts suspended queries.
#[derive(Clone)]
pub struct ErrorAnswer {
    pub(crate) lock: Arc<EngineLock>,
    pub(crate) state: Arc<OperationState>,
}

impl ErrorAnswer {
    /// Resume every suspended query; each retries its statement.
    pub fn continue_queries(&self) {
        let _access = self.lock.lock();
        self.state.wake_all(OperationStatus::ExecuteNormal);
    }

    /// Fail every suspended query and all later ones until resumed.
    pub fn abort_queries(&self) {
        let _access = self.lock.lock();
        self.state.wake_all(OperationStatus::AbortQueries);
    }
}

impl std::fmt::Debug for ErrorAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorAnswer")
            .field("status", &self.state.current())
            .finish()
    }
}
