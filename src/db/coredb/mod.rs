//! Typed metadata store over the statement executor.
//!
//! `CoreDb` exposes one accessor per question the application asks about
//! album roots, albums, tags, items and their attributes. Reads return
//! `Option`/empty collections when nothing matches or the statement fails;
//! mutations return whether they took effect and notify the change sink
//! only on success. Accessors are grouped per entity family in the
//! submodules, each adding an `impl CoreDb` block.

mod albums;
mod changes;
mod fields;
mod item_metadata;
mod items;
mod relations;
mod searches;
mod settings;
mod tags;
mod types;

pub use changes::{
    ChangeKind, ChangeNotification, ChangeSink, EntityKind, NullSink, RecordingSink, TracingSink,
};
pub use fields::{
    decode_row, ChangedFields, ColumnKind, FieldColumn, FieldMask, ImageCommentsFields,
    ImageInformationFields, ImageMetadataFields, ImagePositionsFields, ImagesFields,
    VideoMetadataFields,
};
pub use settings::FilterSettings;
pub use types::*;

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::actions::{names, BindingMap};
use super::backend::QueryOutput;
use super::engine::{lock_unpoisoned, DatabaseType, DbEngine};
use super::error::DbResult;
use super::value::SqlValue;

pub struct CoreDb {
    engine: Arc<DbEngine>,
    sink: Arc<dyn ChangeSink>,
    recent_tags: Mutex<Vec<i64>>,
    unique_hash_version: Mutex<Option<i64>>,
}

impl CoreDb {
    pub fn new(engine: Arc<DbEngine>, sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            engine,
            sink,
            recent_tags: Mutex::new(Vec::new()),
            unique_hash_version: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &DbEngine {
        &self.engine
    }

    /// Create the schema if needed and load persisted state.
    pub fn initialize(&self) -> DbResult<()> {
        self.engine.exec_action(names::CREATE_CORE_DB, &BindingMap::new())?;
        self.update_filter_settings();
        self.load_recent_tags();
        info!("Core database ready");
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Run the engine's consistency check and interpret its rows.
    pub fn integrity_check(&self) -> bool {
        let output = match self.engine.exec_action(names::CHECK_INTEGRITY, &BindingMap::new()) {
            Ok(output) => output,
            Err(e) => {
                warn!("Integrity check could not run: {}", e);
                return false;
            }
        };

        let healthy = match self.engine.database_type() {
            // A single "ok" row, or one row per problem found.
            DatabaseType::Sqlite => {
                output.values.len() == 1
                    && output.values[0].to_text().eq_ignore_ascii_case("ok")
            }
            // (table, operation, message type, message) per checked table.
            DatabaseType::Postgresql => output.rows().all(|row| {
                row.get(3)
                    .map(|message| message.to_text().eq_ignore_ascii_case("ok"))
                    .unwrap_or(false)
            }),
        };
        healthy
    }

    pub fn vacuum(&self) -> bool {
        self.engine
            .exec_action(names::VACUUM, &BindingMap::new())
            .map_err(|e| warn!("Vacuum failed: {}", e))
            .is_ok()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn exec(&self, sql: &str, values: Vec<SqlValue>) -> Option<QueryOutput> {
        match self.engine.exec_sql(sql, &values) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("Core database statement failed: {}", e);
                None
            }
        }
    }

    fn exec_ok(&self, sql: &str, values: Vec<SqlValue>) -> bool {
        self.exec(sql, values).is_some()
    }

    fn exec_action(&self, name: &str, bindings: &BindingMap) -> Option<QueryOutput> {
        match self.engine.exec_action(name, bindings) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("Action {} failed: {}", name, e);
                None
            }
        }
    }

    /// Run `sql` once per row of `columns` inside one transaction.
    fn exec_bulk(&self, sql: &str, columns: &[Vec<SqlValue>]) -> bool {
        let result = self
            .engine
            .prepare(sql)
            .and_then(|query| self.engine.exec_batch(&query, columns));
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("Bulk statement failed: {}", e);
                false
            }
        }
    }

    /// Id of a freshly inserted row: a returned `id` column, else the
    /// driver's last insert id.
    fn inserted_id(output: &QueryOutput) -> Option<i64> {
        output
            .first_value()
            .and_then(SqlValue::as_i64)
            .or(output.last_insert_id)
    }

    fn query_ids(&self, sql: &str, values: Vec<SqlValue>) -> Vec<i64> {
        self.exec(sql, values).map(|output| output.ids()).unwrap_or_default()
    }

    /// Split `ids` so each statement stays under the engine's bound-value
    /// limit, leaving room for `reserved` other parameters.
    fn id_chunks<'a>(&self, ids: &'a [i64], reserved: usize) -> std::slice::Chunks<'a, i64> {
        let size = self.engine.maximum_bound_values().saturating_sub(reserved).max(1);
        ids.chunks(size)
    }

    fn notify(&self, change: ChangeNotification) {
        self.sink.notify(change);
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn id_values(ids: &[i64]) -> Vec<SqlValue> {
    ids.iter().copied().map(SqlValue::Integer).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }

    #[test]
    fn test_inserted_id_prefers_returned_column() {
        let output = QueryOutput {
            values: vec![SqlValue::Integer(7)],
            columns: 1,
            last_insert_id: Some(3),
            rows_affected: 1,
        };
        assert_eq!(CoreDb::inserted_id(&output), Some(7));

        let output = QueryOutput {
            last_insert_id: Some(3),
            ..QueryOutput::default()
        };
        assert_eq!(CoreDb::inserted_id(&output), Some(3));
    }
}
