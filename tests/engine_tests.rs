//! Executor behavior against a scripted driver: lock retries, nested
//! transactions, reconnects and the error-handler protocol.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use photocore::db::{
    ConnectionParameters, Connector, DatabaseType, DbEngine, DbError, ErrorAnswer, ErrorHandler,
    NativeConnection, NativeError, OperationStatus, QueryOutput, RetryPolicy, SqlValue,
};

#[derive(Default)]
struct Script {
    /// Failures handed out by `query`, front first; success once empty.
    failures: VecDeque<NativeError>,
    /// Batch row index that fails once with a lock error.
    busy_at_batch_row: Option<usize>,
    batch_rows: usize,
    connects: usize,
    queries: usize,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

#[derive(Clone, Default)]
struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    fn fail_with(&self, errors: impl IntoIterator<Item = NativeError>) {
        self.script.lock().unwrap().failures.extend(errors);
    }

    fn with<R>(&self, f: impl FnOnce(&Script) -> R) -> R {
        f(&self.script.lock().unwrap())
    }
}

struct ScriptedConnection {
    database_type: DatabaseType,
    script: Arc<Mutex<Script>>,
}

impl Connector for ScriptedDriver {
    fn connect(
        &self,
        parameters: &ConnectionParameters,
    ) -> Result<Box<dyn NativeConnection>, NativeError> {
        self.script.lock().unwrap().connects += 1;
        Ok(Box::new(ScriptedConnection {
            database_type: parameters.database_type,
            script: Arc::clone(&self.script),
        }))
    }
}

impl NativeConnection for ScriptedConnection {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn is_open(&self) -> bool {
        true
    }

    fn prepare(&mut self, _sql: &str) -> Result<(), NativeError> {
        Ok(())
    }

    fn query(&mut self, _sql: &str, params: &[SqlValue]) -> Result<QueryOutput, NativeError> {
        let mut script = self.script.lock().unwrap();
        script.queries += 1;
        if let Some(error) = script.failures.pop_front() {
            return Err(error);
        }
        Ok(QueryOutput {
            values: params.to_vec(),
            columns: params.len(),
            ..QueryOutput::default()
        })
    }

    fn execute_many(&mut self, _sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, NativeError> {
        let mut script = self.script.lock().unwrap();
        for _ in rows {
            if script.busy_at_batch_row == Some(script.batch_rows) {
                script.busy_at_batch_row = None;
                return Err(NativeError::busy("database is locked"));
            }
            script.batch_rows += 1;
        }
        Ok(rows.len() as u64)
    }

    fn execute_direct(&mut self, _sql: &str) -> Result<(), NativeError> {
        Ok(())
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        self.script.lock().unwrap().begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.script.lock().unwrap().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.script.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn tables(&mut self) -> Result<Vec<String>, NativeError> {
        Ok(Vec::new())
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        busy_wait: Duration::from_millis(1),
        max_retries: 5,
        ui_max_retries: 2,
    }
}

fn open_engine(database_type: DatabaseType) -> (DbEngine, ScriptedDriver) {
    open_engine_with(database_type, policy())
}

fn open_engine_with(database_type: DatabaseType, policy: RetryPolicy) -> (DbEngine, ScriptedDriver) {
    let driver = ScriptedDriver::default();
    let parameters = ConnectionParameters {
        database_type,
        database_name: "scripted".into(),
        ..ConnectionParameters::default()
    };
    let engine = DbEngine::new(parameters.clone(), Box::new(driver.clone()), policy);
    engine.open(parameters).unwrap();
    (engine, driver)
}

fn busy(count: usize) -> Vec<NativeError> {
    (0..count).map(|_| NativeError::busy("database is locked")).collect()
}

// ============================================================================
// Lock retries
// ============================================================================

#[test]
fn test_busy_errors_below_ceiling_are_retried() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    driver.fail_with(busy(5));

    let output = engine.exec_sql("SELECT ?", &[SqlValue::Integer(4)]).unwrap();
    assert_eq!(output.first_value(), Some(&SqlValue::Integer(4)));
    assert_eq!(driver.with(|s| s.queries), 6);
}

#[test]
fn test_busy_errors_past_ceiling_fail() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    driver.fail_with(busy(6));

    let result = engine.exec_sql("SELECT 1", &[]);
    assert!(matches!(result, Err(DbError::LockTimeout { retries: 5, .. })));
    assert!(matches!(engine.last_sql_error(), Some(DbError::LockTimeout { .. })));
}

#[test]
fn test_ui_thread_gives_up_sooner() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    engine.mark_ui_thread();
    driver.fail_with(busy(3));

    let result = engine.exec_sql("SELECT 1", &[]);
    assert!(matches!(result, Err(DbError::LockTimeout { retries: 2, .. })));
}

#[test]
fn test_statement_errors_are_not_retried() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    driver.fail_with([NativeError::statement("no such table: Nope")]);

    let result = engine.exec_sql("SELECT * FROM Nope", &[]);
    assert!(matches!(result, Err(DbError::Sql { .. })));
    assert_eq!(driver.with(|s| s.queries), 1);
}

#[test]
fn test_batch_resumes_at_the_row_that_hit_a_lock() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    driver.script.lock().unwrap().busy_at_batch_row = Some(2);

    let query = engine.prepare("INSERT INTO Tags (name) VALUES (?)").unwrap();
    let names: Vec<SqlValue> = ["a", "b", "c", "d"].into_iter().map(SqlValue::from).collect();
    assert_eq!(engine.exec_batch(&query, &[names]).unwrap(), 4);
    assert_eq!(driver.with(|s| s.batch_rows), 4);
}

#[test]
fn test_finished_transaction_wakes_busy_waiter() {
    let (engine, driver) = open_engine_with(
        DatabaseType::Sqlite,
        RetryPolicy {
            busy_wait: Duration::from_secs(30),
            ..policy()
        },
    );
    let engine = Arc::new(engine);
    engine.begin_transaction().unwrap();
    driver.fail_with(busy(1));

    let waiter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let started = Instant::now();
            let result = engine.exec_sql("SELECT 1", &[]);
            (result.is_ok(), started.elapsed())
        })
    };
    while driver.with(|s| s.queries) == 0 {
        thread::sleep(Duration::from_millis(5));
    }

    // Blocks until the waiter has parked and released the engine lock.
    engine.commit_transaction().unwrap();
    let (ok, elapsed) = waiter.join().unwrap();
    assert!(ok);
    assert!(elapsed < Duration::from_secs(10));
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_nested_transactions_reach_the_driver_once() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);

    for _ in 0..3 {
        engine.begin_transaction().unwrap();
    }
    assert!(engine.is_in_transaction());
    for _ in 0..3 {
        engine.commit_transaction().unwrap();
    }

    assert!(!engine.is_in_transaction());
    assert_eq!(driver.with(|s| (s.begins, s.commits)), (1, 1));
}

#[test]
fn test_inner_rollback_is_immediate() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);

    engine.begin_transaction().unwrap();
    engine.begin_transaction().unwrap();
    engine.rollback_transaction().unwrap();
    assert_eq!(driver.with(|s| s.rollbacks), 1);

    engine.commit_transaction().unwrap();
    engine.commit_transaction().unwrap();
    assert!(!engine.is_in_transaction());
}

#[test]
fn test_commit_without_transaction_is_an_error() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    assert!(matches!(engine.commit_transaction(), Err(DbError::Setup(_))));
    assert_eq!(driver.with(|s| s.commits), 0);
}

#[test]
fn test_dropped_guard_rolls_back() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    {
        let _transaction = engine.transaction().unwrap();
        engine.exec_sql("UPDATE Images SET status=1", &[]).unwrap();
    }
    assert!(!engine.is_in_transaction());
    assert_eq!(driver.with(|s| (s.begins, s.commits, s.rollbacks)), (1, 0, 1));

    let transaction = engine.transaction().unwrap();
    transaction.commit().unwrap();
    assert_eq!(driver.with(|s| s.commits), 1);
}

// ============================================================================
// Connections
// ============================================================================

#[test]
fn test_one_connection_per_thread() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    engine.exec_sql("SELECT 1", &[]).unwrap();
    engine.exec_sql("SELECT 2", &[]).unwrap();
    assert_eq!(driver.with(|s| s.connects), 1);

    let engine = Arc::new(engine);
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.exec_sql("SELECT 3", &[]).is_ok())
        })
        .collect();
    for worker in workers {
        assert!(worker.join().unwrap());
    }
    assert_eq!(driver.with(|s| s.connects), 3);
}

#[test]
fn test_reopen_invalidates_thread_connections() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    engine.exec_sql("SELECT 1", &[]).unwrap();

    engine.open(engine.parameters()).unwrap();
    engine.exec_sql("SELECT 1", &[]).unwrap();
    assert_eq!(driver.with(|s| s.connects), 2);
}

#[test]
fn test_connection_loss_reconnects_once() {
    let (engine, driver) = open_engine(DatabaseType::Postgresql);
    driver.fail_with([NativeError::connection("server closed the connection")]);

    engine.exec_sql("SELECT 1", &[]).unwrap();
    assert_eq!(driver.with(|s| (s.connects, s.queries)), (2, 2));
}

#[test]
fn test_embedded_engine_does_not_reconnect() {
    let (engine, driver) = open_engine(DatabaseType::Sqlite);
    driver.fail_with([NativeError::connection("disk I/O error")]);

    assert!(matches!(engine.exec_sql("SELECT 1", &[]), Err(DbError::Connection { .. })));
    assert_eq!(driver.with(|s| s.connects), 1);
}

// ============================================================================
// Error handler
// ============================================================================

struct AbortingHandler {
    calls: Mutex<usize>,
}

impl ErrorHandler for AbortingHandler {
    fn connection_error(&self, answer: ErrorAnswer, _error: &DbError, _sql: &str) {
        *self.calls.lock().unwrap() += 1;
        answer.abort_queries();
    }
}

struct ResumingHandler;

impl ErrorHandler for ResumingHandler {
    fn connection_error(&self, answer: ErrorAnswer, _error: &DbError, _sql: &str) {
        answer.continue_queries();
    }
}

#[test]
fn test_handler_abort_fails_later_queries() {
    let (engine, driver) = open_engine(DatabaseType::Postgresql);
    let handler = Arc::new(AbortingHandler { calls: Mutex::new(0) });
    engine.set_error_handler(Some(handler.clone()));
    driver.fail_with([
        NativeError::connection("server closed the connection"),
        NativeError::connection("server closed the connection"),
    ]);

    assert!(matches!(engine.exec_sql("SELECT 1", &[]), Err(DbError::Connection { .. })));
    assert_eq!(*handler.calls.lock().unwrap(), 1);
    assert_eq!(engine.operation_status(), OperationStatus::AbortQueries);
    assert!(matches!(engine.exec_sql("SELECT 2", &[]), Err(DbError::Aborted)));

    engine.error_answer().continue_queries();
    assert!(engine.exec_sql("SELECT 3", &[]).is_ok());
}

#[test]
fn test_handler_resume_retries_statement() {
    let (engine, driver) = open_engine(DatabaseType::Postgresql);
    engine.set_error_handler(Some(Arc::new(ResumingHandler)));
    driver.fail_with([
        NativeError::connection("server closed the connection"),
        NativeError::connection("server closed the connection"),
    ]);

    let output = engine.exec_sql("SELECT ?", &[SqlValue::Integer(9)]).unwrap();
    assert_eq!(output.first_value(), Some(&SqlValue::Integer(9)));
    assert_eq!(driver.with(|s| s.queries), 3);
}

/// Hands the answer to the test and returns, leaving queries suspended.
struct ParkingHandler {
    answers: Mutex<Sender<ErrorAnswer>>,
}

impl ErrorHandler for ParkingHandler {
    fn connection_error(&self, answer: ErrorAnswer, _error: &DbError, _sql: &str) {
        self.answers.lock().unwrap().send(answer).unwrap();
    }
}

#[test]
fn test_suspended_engine_blocks_other_threads_until_answered() {
    let (engine, driver) = open_engine(DatabaseType::Postgresql);
    let (sender, answers) = mpsc::channel();
    engine.set_error_handler(Some(Arc::new(ParkingHandler {
        answers: Mutex::new(sender),
    })));
    driver.fail_with([
        NativeError::connection("server closed the connection"),
        NativeError::connection("server closed the connection"),
    ]);
    let engine = Arc::new(engine);

    let failing = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.exec_sql("SELECT 1", &[]).is_ok())
    };
    let answer = answers.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(engine.operation_status(), OperationStatus::Wait);

    let other = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.exec_sql("SELECT 2", &[]).is_ok())
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!failing.is_finished());
    assert!(!other.is_finished());
    let queries = driver.with(|s| s.queries);

    answer.continue_queries();
    assert!(failing.join().unwrap());
    assert!(other.join().unwrap());
    assert_eq!(driver.with(|s| s.queries), queries + 2);
    assert_eq!(engine.operation_status(), OperationStatus::ExecuteNormal);
}
