//! Photo library metadata store.
//!
//! [`db::DbEngine`] runs statements against SQLite or PostgreSQL with
//! per-thread connections, lock retries and nested transactions;
//! [`db::CoreDb`] is the typed store of album roots, albums, tags, items
//! and their attributes built on top of it.

pub mod config;
pub mod db;
pub mod logging;
