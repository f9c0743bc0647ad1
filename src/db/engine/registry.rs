//! Per-thread connection registry.
//!
//! Each thread that touches the database gets its own native connection,
//! opened lazily on first use. Changing the connection parameters bumps a
//! validity generation; a thread whose connection was opened under an
//! older generation closes and reopens it on its next use. Entries are
//! removed when their thread exits.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use super::locking::lock_unpoisoned;
use super::parameters::ConnectionParameters;
use crate::db::backend::{Connector, NativeConnection};
use crate::db::error::{DbError, NativeError};

/// Connection state owned by one thread.
#[derive(Default)]
pub struct ThreadConnection {
    connection: Option<Box<dyn NativeConnection>>,
    /// Generation the connection was opened under; 0 when never opened.
    valid: u64,
    transaction_count: u32,
    last_error: Option<DbError>,
}

pub(crate) struct RegistryShared {
    connector: Box<dyn Connector>,
    parameters: RwLock<ConnectionParameters>,
    validity: AtomicU64,
    threads: Mutex<HashMap<ThreadId, Arc<Mutex<ThreadConnection>>>>,
}

impl RegistryShared {
    fn remove(&self, id: ThreadId) -> bool {
        lock_unpoisoned(&self.threads).remove(&id).is_some()
    }
}

thread_local! {
    static EXIT_HOOKS: ThreadExitHooks = ThreadExitHooks::default();
}

/// Removes this thread's entries from every registry it used when the
/// thread exits.
#[derive(Default)]
struct ThreadExitHooks {
    entries: RefCell<Vec<(ThreadId, Weak<RegistryShared>)>>,
}

impl Drop for ThreadExitHooks {
    fn drop(&mut self) {
        for (id, registry) in self.entries.get_mut().drain(..) {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        }
    }
}

pub struct ConnectionRegistry {
    shared: Arc<RegistryShared>,
}

impl ConnectionRegistry {
    pub fn new(connector: Box<dyn Connector>, parameters: ConnectionParameters) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                connector,
                parameters: RwLock::new(parameters),
                validity: AtomicU64::new(1),
                threads: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn parameters(&self) -> ConnectionParameters {
        self.shared
            .parameters
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Replace the parameters and invalidate every open connection.
    pub fn set_parameters(&self, parameters: ConnectionParameters) {
        *self
            .shared
            .parameters
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = parameters;
        self.invalidate();
    }

    /// Bump the validity generation so threads reopen before their next use.
    pub fn invalidate(&self) -> u64 {
        self.shared.validity.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_validity(&self) -> u64 {
        self.shared.validity.load(Ordering::SeqCst)
    }

    /// Number of threads currently holding an entry.
    pub fn thread_count(&self) -> usize {
        lock_unpoisoned(&self.shared.threads).len()
    }

    /// Run `f` with the calling thread's connection slot.
    pub fn with_thread<R>(&self, f: impl FnOnce(&mut ThreadSlot<'_>) -> R) -> R {
        let entry = self.entry_for_current_thread();
        let mut connection = lock_unpoisoned(&entry);
        let mut slot = ThreadSlot {
            shared: &self.shared,
            connection: &mut connection,
        };
        f(&mut slot)
    }

    /// Close and forget the calling thread's connection.
    pub fn close_for_current_thread(&self) {
        if self.shared.remove(thread::current().id()) {
            debug!("Closed database connection for thread {:?}", thread::current().id());
        }
    }

    fn entry_for_current_thread(&self) -> Arc<Mutex<ThreadConnection>> {
        let id = thread::current().id();
        let mut threads = lock_unpoisoned(&self.shared.threads);
        if let Some(entry) = threads.get(&id) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(Mutex::new(ThreadConnection::default()));
        threads.insert(id, Arc::clone(&entry));
        drop(threads);

        let weak = Arc::downgrade(&self.shared);
        let registered = EXIT_HOOKS.try_with(|hooks| {
            let mut entries = hooks.entries.borrow_mut();
            if !entries.iter().any(|(tid, w)| *tid == id && w.ptr_eq(&weak)) {
                entries.push((id, weak));
            }
        });
        if registered.is_err() {
            warn!("Thread {:?} is exiting; its database connection will not be reclaimed", id);
        }
        entry
    }
}

/// The calling thread's view of its connection.
pub struct ThreadSlot<'a> {
    shared: &'a RegistryShared,
    connection: &'a mut ThreadConnection,
}

impl ThreadSlot<'_> {
    /// Open (or reopen a stale) connection if needed.
    pub fn ensure_open(&mut self) -> Result<(), NativeError> {
        let current = self.shared.validity.load(Ordering::SeqCst);
        if self.connection.valid != 0 && self.connection.valid < current {
            debug!("Connection parameters changed; reopening connection");
            self.close();
        }

        let open = self
            .connection
            .connection
            .as_ref()
            .is_some_and(|c| c.is_open());
        if !open {
            let parameters = self
                .shared
                .parameters
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            let native = self.shared.connector.connect(&parameters)?;
            self.connection.connection = Some(native);
            self.connection.valid = current;
        }
        Ok(())
    }

    /// The open connection, opening it on demand.
    pub fn connection(&mut self) -> Result<&mut dyn NativeConnection, NativeError> {
        self.ensure_open()?;
        match self.connection.connection.as_deref_mut() {
            Some(native) => Ok(native),
            None => Err(NativeError::not_open()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .connection
            .as_ref()
            .is_some_and(|c| c.is_open())
    }

    pub fn close(&mut self) {
        self.connection.connection = None;
        self.connection.valid = 0;
    }

    pub fn transaction_count(&self) -> u32 {
        self.connection.transaction_count
    }

    /// Returns true when this is the outermost transaction.
    pub fn increment_transaction_count(&mut self) -> bool {
        self.connection.transaction_count += 1;
        self.connection.transaction_count == 1
    }

    /// Returns true when the outermost transaction has ended.
    pub fn decrement_transaction_count(&mut self) -> bool {
        self.connection.transaction_count = self.connection.transaction_count.saturating_sub(1);
        self.connection.transaction_count == 0
    }

    pub fn set_last_error(&mut self, error: Option<DbError>) {
        self.connection.last_error = error;
    }

    pub fn last_error(&self) -> Option<DbError> {
        self.connection.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::backend::QueryOutput;
    use crate::db::value::SqlValue;
    use crate::db::DatabaseType;
    use std::sync::atomic::AtomicUsize;

    struct CountingConnector {
        opened: Arc<AtomicUsize>,
    }

    struct Dummy;

    impl NativeConnection for Dummy {
        fn database_type(&self) -> DatabaseType {
            DatabaseType::Sqlite
        }
        fn is_open(&self) -> bool {
            true
        }
        fn prepare(&mut self, _sql: &str) -> Result<(), NativeError> {
            Ok(())
        }
        fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<QueryOutput, NativeError> {
            Ok(QueryOutput::default())
        }
        fn execute_many(&mut self, _sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, NativeError> {
            Ok(rows.len() as u64)
        }
        fn execute_direct(&mut self, _sql: &str) -> Result<(), NativeError> {
            Ok(())
        }
        fn begin(&mut self) -> Result<(), NativeError> {
            Ok(())
        }
        fn commit(&mut self) -> Result<(), NativeError> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<(), NativeError> {
            Ok(())
        }
        fn tables(&mut self) -> Result<Vec<String>, NativeError> {
            Ok(Vec::new())
        }
    }

    impl Connector for CountingConnector {
        fn connect(
            &self,
            _parameters: &ConnectionParameters,
        ) -> Result<Box<dyn NativeConnection>, NativeError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Dummy))
        }
    }

    fn registry() -> (ConnectionRegistry, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let connector = CountingConnector {
            opened: Arc::clone(&opened),
        };
        (
            ConnectionRegistry::new(Box::new(connector), ConnectionParameters::sqlite("x.db")),
            opened,
        )
    }

    #[test]
    fn test_connection_reused_until_invalidated() {
        let (registry, opened) = registry();
        registry.with_thread(|slot| slot.ensure_open().unwrap());
        registry.with_thread(|slot| slot.ensure_open().unwrap());
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        registry.set_parameters(ConnectionParameters::sqlite("y.db"));
        registry.with_thread(|slot| slot.ensure_open().unwrap());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_each_thread_gets_its_own_connection_and_is_reclaimed() {
        let (registry, opened) = registry();
        let registry = Arc::new(registry);
        registry.with_thread(|slot| slot.ensure_open().unwrap());

        let worker = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.with_thread(|slot| slot.ensure_open().unwrap());
                registry.thread_count()
            })
        };
        assert_eq!(worker.join().unwrap(), 2);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(registry.thread_count(), 1);
    }

    #[test]
    fn test_transaction_counter() {
        let (registry, _) = registry();
        registry.with_thread(|slot| {
            assert!(slot.increment_transaction_count());
            assert!(!slot.increment_transaction_count());
            assert!(!slot.decrement_transaction_count());
            assert!(slot.decrement_transaction_count());
        });
    }
}
