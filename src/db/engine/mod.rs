//! Thread-aware statement executor.
//!
//! `DbEngine` runs SQL on the calling thread's own connection, retries
//! transient lock errors with a bounded wait, reconnects after connection
//! loss, suspends callers while an error handler decides how to proceed,
//! and keeps a per-thread transaction nesting count so that only the
//! outermost begin/commit reach the engine.

mod error_handler;
mod locking;
mod parameters;
mod registry;

pub use error_handler::{ErrorAnswer, ErrorHandler, OperationStatus};
pub use locking::{EngineLock, EngineLockGuard};
pub(crate) use locking::lock_unpoisoned;
pub use parameters::{ConnectionParameters, DatabaseType, RetryPolicy};
pub use registry::{ConnectionRegistry, ThreadSlot};

use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, ThreadId};

use tracing::{debug, info, warn};

use self::error_handler::OperationState;
use self::locking::WaitingUnlocker;
use super::actions::{self, ActionCatalog, ActionMode, Binding, BindingMap, DbAction, ElementMode};
use super::backend::{Connector, NativeConnection, QueryOutput};
use super::error::{DbError, DbResult, NativeError, NativeErrorKind};
use super::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Unavailable,
    Open,
}

/// A statement that has been checked against the engine, with the values
/// last bound to it. Re-executing after a reconnect re-binds these values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlQuery {
    sql: String,
    bound: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bound_values(&self) -> &[SqlValue] {
        &self.bound
    }
}

enum Recovery {
    Retry,
    Fail(DbError),
}

pub struct DbEngine {
    registry: ConnectionRegistry,
    lock: Arc<EngineLock>,
    busy_mutex: Mutex<()>,
    busy_cond: Condvar,
    operation: Arc<OperationState>,
    handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
    policy: RetryPolicy,
    ui_thread: Mutex<Option<ThreadId>>,
    status: Mutex<EngineStatus>,
}

impl DbEngine {
    pub fn new(
        parameters: ConnectionParameters,
        connector: Box<dyn Connector>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(connector, parameters),
            lock: Arc::new(EngineLock::new()),
            busy_mutex: Mutex::new(()),
            busy_cond: Condvar::new(),
            operation: Arc::new(OperationState::default()),
            handler: RwLock::new(None),
            policy,
            ui_thread: Mutex::new(None),
            status: Mutex::new(EngineStatus::Unavailable),
        }
    }

    // ========================================================================
    // Connection management
    // ========================================================================

    /// Store new parameters, invalidate every thread's connection and open
    /// the calling thread's connection.
    pub fn open(&self, parameters: ConnectionParameters) -> DbResult<()> {
        let _access = self.lock.lock();
        self.registry.set_parameters(parameters);
        *lock_unpoisoned(&self.status) = EngineStatus::Unavailable;

        self.registry.with_thread(|slot| loop {
            match slot.ensure_open() {
                Ok(()) => return Ok(()),
                Err(native) => {
                    let error = DbError::from_native(native, "");
                    warn!("Error while opening the database: {}", error);
                    slot.set_last_error(Some(error.clone()));
                    if !(self.reconnect_on_error() && self.handle_with_error_handler(slot, &error, "")) {
                        return Err(error);
                    }
                }
            }
        })?;

        *lock_unpoisoned(&self.status) = EngineStatus::Open;
        info!(
            "Opened {} database {}",
            self.database_type().name(),
            self.registry.parameters().database_name
        );
        Ok(())
    }

    /// Close the calling thread's connection.
    pub fn close(&self) {
        let _access = self.lock.lock();
        self.registry.close_for_current_thread();
        *lock_unpoisoned(&self.status) = EngineStatus::Unavailable;
    }

    pub fn status(&self) -> EngineStatus {
        *lock_unpoisoned(&self.status)
    }

    pub fn parameters(&self) -> ConnectionParameters {
        self.registry.parameters()
    }

    pub fn database_type(&self) -> DatabaseType {
        self.registry.parameters().database_type
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn maximum_bound_values(&self) -> usize {
        self.database_type().maximum_bound_values()
    }

    pub fn reconnect_on_error(&self) -> bool {
        self.database_type().reconnect_on_error()
    }

    /// The last error recorded on the calling thread.
    pub fn last_sql_error(&self) -> Option<DbError> {
        self.registry.with_thread(|slot| slot.last_error())
    }

    pub fn tables(&self) -> DbResult<Vec<String>> {
        self.run("", &[], |native| native.tables())
    }

    /// Hold the engine lock across several calls.
    pub fn access(&self) -> EngineLockGuard<'_> {
        self.lock.lock()
    }

    /// Use a lower lock-retry ceiling on the calling thread.
    pub fn mark_ui_thread(&self) {
        *lock_unpoisoned(&self.ui_thread) = Some(thread::current().id());
    }

    fn is_ui_thread(&self) -> bool {
        *lock_unpoisoned(&self.ui_thread) == Some(thread::current().id())
    }

    // ========================================================================
    // Error handler
    // ========================================================================

    pub fn set_error_handler(&self, handler: Option<Arc<dyn ErrorHandler>>) {
        *self
            .handler
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = handler;
    }

    fn error_handler(&self) -> Option<Arc<dyn ErrorHandler>> {
        self.handler
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn error_answer(&self) -> ErrorAnswer {
        ErrorAnswer {
            lock: Arc::clone(&self.lock),
            state: Arc::clone(&self.operation),
        }
    }

    pub fn operation_status(&self) -> OperationStatus {
        self.operation.current()
    }

    /// Block while suspended; false once queries have been aborted.
    fn check_operation_status(&self) -> bool {
        let mut status = self.operation.current();
        if status == OperationStatus::Wait {
            let mut unlocker =
                WaitingUnlocker::new(&self.lock, &self.operation.status, &self.operation.changed);
            unlocker.wait_while(|s| *s == OperationStatus::Wait);
            status = unlocker.value().map_or(OperationStatus::AbortQueries, |s| *s);
        }
        status == OperationStatus::ExecuteNormal
    }

    /// Suspend this thread and let the handler decide. Without a handler the
    /// connection is closed and the statement fails.
    fn handle_with_error_handler(&self, slot: &mut ThreadSlot<'_>, error: &DbError, sql: &str) -> bool {
        let Some(handler) = self.error_handler() else {
            slot.close();
            return false;
        };

        let mut unlocker =
            WaitingUnlocker::new(&self.lock, &self.operation.status, &self.operation.changed);
        if let Some(status) = unlocker.value() {
            *status = OperationStatus::Wait;
        }

        let answer = self.error_answer();
        let (error, sql) = (error.clone(), sql.to_string());
        let spawned = thread::Builder::new()
            .name("db-error-handler".into())
            .spawn(move || handler.connection_error(answer, &error, &sql));
        if let Err(e) = spawned {
            warn!("Could not hand the connection error to the error handler: {}", e);
            if let Some(status) = unlocker.value() {
                *status = OperationStatus::AbortQueries;
            }
        }

        unlocker.wait_while(|s| *s == OperationStatus::Wait);
        matches!(unlocker.value().map(|s| *s), Some(OperationStatus::ExecuteNormal))
    }

    // ========================================================================
    // Error classification and retry
    // ========================================================================

    fn is_lock_error(&self, error: &NativeError) -> bool {
        self.database_type() == DatabaseType::Sqlite && error.kind == NativeErrorKind::Busy
    }

    fn is_connection_error(&self, error: &NativeError) -> bool {
        self.database_type() != DatabaseType::Sqlite && error.kind == NativeErrorKind::Connection
    }

    /// Wait for a competing transaction, or give up once the thread's
    /// ceiling is reached.
    fn check_retry_lock_error(&self, retries: u32) -> bool {
        let wait = self.policy.busy_wait;
        if retries > 0 && retries % 25 == 0 {
            debug!(
                "Database is locked. Waited {} ms",
                u128::from(retries) * wait.as_millis()
            );
        }

        let ceiling = if self.is_ui_thread() {
            self.policy.ui_max_retries
        } else {
            self.policy.max_retries
        };
        if retries >= ceiling {
            warn!(
                "Detected locked database file. There is an active transaction. Waited {} retries but giving up now.",
                retries
            );
            return false;
        }

        let mut unlocker = WaitingUnlocker::new(&self.lock, &self.busy_mutex, &self.busy_cond);
        unlocker.wait_timeout(wait);
        true
    }

    /// Wake threads waiting on a lock held by a finished transaction.
    fn transaction_finished(&self) {
        let _guard = lock_unpoisoned(&self.busy_mutex);
        self.busy_cond.notify_all();
    }

    fn debug_output_failed_query(&self, sql: &str, values: &[SqlValue], error: &NativeError) {
        debug!(
            sql,
            values = ?values,
            code = ?error.code,
            driver = %error.driver_text,
            database = %error.database_text,
            "Failure executing query"
        );
    }

    fn query_error_handling(
        &self,
        slot: &mut ThreadSlot<'_>,
        sql: &str,
        values: &[SqlValue],
        error: NativeError,
        retries: u32,
        reconnected: &mut bool,
    ) -> Recovery {
        if self.is_lock_error(&error) {
            if self.check_retry_lock_error(retries) {
                return Recovery::Retry;
            }
            self.debug_output_failed_query(sql, values, &error);
            let failed = DbError::LockTimeout {
                retries,
                sql: sql.to_string(),
            };
            slot.set_last_error(Some(failed.clone()));
            return Recovery::Fail(failed);
        }

        self.debug_output_failed_query(sql, values, &error);
        let connection_lost = self.is_connection_error(&error);
        let failed = DbError::from_native(error, sql);
        slot.set_last_error(Some(failed.clone()));

        if connection_lost && self.reconnect_on_error() {
            slot.close();
            if !*reconnected {
                *reconnected = true;
                debug!("Connection lost; reopening and retrying the statement");
                return Recovery::Retry;
            }
            if self.handle_with_error_handler(slot, &failed, sql) {
                return Recovery::Retry;
            }
        }
        Recovery::Fail(failed)
    }

    /// Run `op` on the calling thread's connection with the full
    /// retry/reconnect/suspend policy.
    fn run<T>(
        &self,
        sql: &str,
        values: &[SqlValue],
        mut op: impl FnMut(&mut dyn NativeConnection) -> Result<T, NativeError>,
    ) -> DbResult<T> {
        let _access = self.lock.lock();
        if !self.check_operation_status() {
            return Err(DbError::Aborted);
        }

        self.registry.with_thread(|slot| {
            let mut retries = 0;
            let mut reconnected = false;
            loop {
                let result = match slot.connection() {
                    Ok(native) => op(native),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(value) => return Ok(value),
                    Err(error) => {
                        match self.query_error_handling(slot, sql, values, error, retries, &mut reconnected) {
                            Recovery::Retry => retries += 1,
                            Recovery::Fail(failed) => return Err(failed),
                        }
                    }
                }
            }
        })
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    /// Prepare and run `sql` with positional values.
    pub fn exec_sql(&self, sql: &str, values: &[SqlValue]) -> DbResult<QueryOutput> {
        self.run(sql, values, |native| native.query(sql, values))
    }

    /// Check that `sql` compiles, retrying through lock errors.
    pub fn prepare(&self, sql: &str) -> DbResult<SqlQuery> {
        self.run(sql, &[], |native| native.prepare(sql))?;
        Ok(SqlQuery {
            sql: sql.to_string(),
            bound: Vec::new(),
        })
    }

    /// Bind `values` to a prepared query and run it.
    pub fn exec_query(&self, query: &mut SqlQuery, values: Vec<SqlValue>) -> DbResult<QueryOutput> {
        query.bound = values;
        self.exec_sql(&query.sql, &query.bound)
    }

    /// Run `query` once per row. `columns` holds one vector per positional
    /// parameter, each with one element per row. A retried lock error
    /// resumes at the row that failed.
    pub fn exec_batch(&self, query: &SqlQuery, columns: &[Vec<SqlValue>]) -> DbResult<u64> {
        let row_count = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|column| column.len() != row_count) {
            warn!("Batch columns for [{}] have different lengths. This is a setup error!", query.sql);
            return Err(DbError::Setup("batch columns have different lengths".into()));
        }
        if row_count == 0 {
            return Ok(0);
        }

        let rows: Vec<Vec<SqlValue>> = (0..row_count)
            .map(|row| columns.iter().map(|column| column[row].clone()).collect())
            .collect();

        let transaction = self.transaction()?;
        let mut done = 0;
        let mut affected = 0;
        self.run(&query.sql, &[], |native| {
            while done < rows.len() {
                affected += native.execute_many(&query.sql, &rows[done..done + 1])?;
                done += 1;
            }
            Ok(())
        })?;
        transaction.commit()?;
        Ok(affected)
    }

    /// Run statements without preparing them; results are discarded.
    pub fn exec_direct(&self, sql: &str) -> DbResult<()> {
        self.run(sql, &[], |native| native.execute_direct(sql))
    }

    /// Run a statement without binding and keep its rows.
    pub fn exec_direct_with_result(&self, sql: &str) -> DbResult<QueryOutput> {
        self.run(sql, &[], |native| native.query(sql, &[]))
    }

    /// Resolve named placeholders from `bindings`, then run.
    pub fn exec_sql_with_bindings(&self, sql: &str, bindings: &BindingMap) -> DbResult<QueryOutput> {
        let resolved = actions::resolve(sql, bindings)?;
        self.exec_sql(&resolved.sql, &resolved.values)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub fn catalog(&self) -> ActionCatalog {
        ActionCatalog::for_engine(self.database_type())
    }

    pub fn action(&self, name: &str) -> Option<&'static DbAction> {
        self.catalog().get(name)
    }

    pub fn exec_action(&self, name: &str, bindings: &BindingMap) -> DbResult<QueryOutput> {
        match self.action(name) {
            Some(action) => self.exec_db_action(action, bindings),
            None => {
                warn!("Attempt to execute null action");
                Err(DbError::Setup(format!("no action named {}", name)))
            }
        }
    }

    /// Run every element of `action`; the first failure stops the action
    /// and, for transactional actions, rolls everything back.
    pub fn exec_db_action(&self, action: &DbAction, bindings: &BindingMap) -> DbResult<QueryOutput> {
        let _access = self.lock.lock();
        let wrap = action.mode == ActionMode::Transaction;
        if wrap {
            self.begin_transaction()?;
        }

        let mut output = QueryOutput::default();
        for element in action.elements {
            let result = match element.mode {
                ElementMode::Query => self.exec_sql_with_bindings(element.statement, bindings),
                ElementMode::Unprepared => self.exec_direct_with_result(element.statement),
                ElementMode::FireAndForget => {
                    self.exec_direct(element.statement).map(|_| QueryOutput::default())
                }
            };
            match result {
                Ok(result) => output = result,
                Err(error) => {
                    warn!(
                        "Error while executing DBAction [{}] Statement [{}]: {}",
                        action.name, element.statement, error
                    );
                    if wrap {
                        self.abort_transaction();
                    }
                    return Err(error);
                }
            }
        }

        if wrap {
            self.commit_transaction()?;
        }
        Ok(output)
    }

    /// Run an upsert action with `:id`, `:fieldList`, `:valueList` and
    /// `:fieldValueList` bound from `field_names` and `values`.
    pub fn exec_upsert_action(
        &self,
        name: &str,
        id: i64,
        field_names: &[&str],
        values: Vec<SqlValue>,
    ) -> DbResult<QueryOutput> {
        if field_names.len() != values.len() {
            warn!("Upsert {} has {} fields but {} values. This is a setup error!", name, field_names.len(), values.len());
            return Err(DbError::Setup("field and value counts differ".into()));
        }
        let mut bindings = BindingMap::new();
        bindings.insert(":id".into(), Binding::value(id));
        bindings.insert(
            ":fieldValueList".into(),
            Binding::FieldValueMap(
                field_names
                    .iter()
                    .map(|f| f.to_string())
                    .zip(values.iter().cloned())
                    .collect(),
            ),
        );
        bindings.insert(
            ":fieldList".into(),
            Binding::FieldList(field_names.iter().map(|f| f.to_string()).collect()),
        );
        bindings.insert(":valueList".into(), Binding::ValueList(values));
        self.exec_action(name, &bindings)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction; only the outermost call starts one natively.
    pub fn begin_transaction(&self) -> DbResult<()> {
        let _access = self.lock.lock();
        if !self.check_operation_status() {
            return Err(DbError::Aborted);
        }

        self.registry.with_thread(|slot| {
            if let Err(native) = slot.ensure_open() {
                let error = DbError::from_native(native, "BEGIN");
                slot.set_last_error(Some(error.clone()));
                return Err(error);
            }
            if !slot.increment_transaction_count() {
                return Ok(());
            }

            let mut retries = 0;
            loop {
                let result = slot.connection().and_then(|native| native.begin());
                match result {
                    Ok(()) => return Ok(()),
                    Err(native) => {
                        if self.is_lock_error(&native) && self.check_retry_lock_error(retries) {
                            retries += 1;
                            continue;
                        }
                        slot.decrement_transaction_count();
                        let error = DbError::from_native(native, "BEGIN");
                        warn!("Failed to begin transaction: {}", error);
                        slot.set_last_error(Some(error.clone()));
                        return Err(error);
                    }
                }
            }
        })
    }

    /// Commit; only the call that closes the outermost level commits natively.
    pub fn commit_transaction(&self) -> DbResult<()> {
        let _access = self.lock.lock();
        self.registry.with_thread(|slot| {
            if slot.transaction_count() == 0 {
                warn!("Commit requested without an open transaction");
                return Err(DbError::Setup("commit without an open transaction".into()));
            }
            if !slot.decrement_transaction_count() {
                return Ok(());
            }

            let mut retries = 0;
            loop {
                let result = slot.connection().and_then(|native| native.commit());
                match result {
                    Ok(()) => break,
                    Err(native) => {
                        if self.is_lock_error(&native) && self.check_retry_lock_error(retries) {
                            retries += 1;
                            continue;
                        }
                        if slot.is_open() {
                            if let Ok(connection) = slot.connection() {
                                let _ = connection.rollback();
                            }
                        }
                        let error = DbError::from_native(native, "COMMIT");
                        warn!("Failed to commit transaction, rolled back: {}", error);
                        slot.set_last_error(Some(error.clone()));
                        self.transaction_finished();
                        return Err(error);
                    }
                }
            }
            self.transaction_finished();
            Ok(())
        })
    }

    /// Roll back the native transaction immediately. The nesting count is
    /// left alone; callers still pair their begin with a commit.
    pub fn rollback_transaction(&self) -> DbResult<()> {
        let _access = self.lock.lock();
        self.registry.with_thread(|slot| {
            if !slot.is_open() {
                return Ok(());
            }
            let result = slot.connection().and_then(|native| native.rollback());
            result.map_err(|native| {
                let error = DbError::from_native(native, "ROLLBACK");
                slot.set_last_error(Some(error.clone()));
                error
            })
        })
    }

    /// Roll back and close one nesting level without committing.
    fn abort_transaction(&self) {
        if let Err(e) = self.rollback_transaction() {
            warn!("Rollback failed: {}", e);
        }
        let finished = self
            .registry
            .with_thread(|slot| slot.transaction_count() > 0 && slot.decrement_transaction_count());
        if finished {
            self.transaction_finished();
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.registry.with_thread(|slot| slot.transaction_count() > 0)
    }

    /// Begin a transaction that rolls back unless committed.
    pub fn transaction(&self) -> DbResult<DbTransaction<'_>> {
        self.begin_transaction()?;
        Ok(DbTransaction {
            engine: self,
            finished: false,
        })
    }
}

/// Scoped transaction; dropping it without `commit` rolls back.
pub struct DbTransaction<'a> {
    engine: &'a DbEngine,
    finished: bool,
}

impl DbTransaction<'_> {
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        self.engine.commit_transaction()
    }
}

impl Drop for DbTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.engine.abort_transaction();
        }
    }
}
