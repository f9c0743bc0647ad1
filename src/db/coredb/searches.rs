use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::types::{SearchInfo, SearchType};
use super::CoreDb;
use crate::db::value::SqlValue;
use crate::sql_values;

impl CoreDb {
    /// Store a saved search and return its id.
    pub fn add_search(&self, search_type: SearchType, name: &str, query: &str) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO Searches (type, name, query) VALUES (?, ?, ?) RETURNING id;",
            sql_values![search_type.as_i64(), name, query],
        )?;
        let id = Self::inserted_id(&output)?;
        self.notify(ChangeNotification::new(EntityKind::Search, vec![id], ChangeKind::Added));
        Some(id)
    }

    pub fn update_search(&self, search_id: i64, search_type: SearchType, name: &str, query: &str) -> bool {
        if !self.exec_ok(
            "UPDATE Searches SET type=?, name=?, query=? WHERE id=?;",
            sql_values![search_type.as_i64(), name, query, search_id],
        ) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Search, vec![search_id], ChangeKind::Changed));
        true
    }

    pub fn delete_search(&self, search_id: i64) -> bool {
        if !self.exec_ok("DELETE FROM Searches WHERE id=?;", sql_values![search_id]) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Search, vec![search_id], ChangeKind::Deleted));
        true
    }

    /// Delete every search of one type.
    pub fn delete_searches(&self, search_type: SearchType) -> bool {
        let ids = self.query_ids(
            "SELECT id FROM Searches WHERE type=?;",
            sql_values![search_type.as_i64()],
        );
        if !self.exec_ok("DELETE FROM Searches WHERE type=?;", sql_values![search_type.as_i64()]) {
            return false;
        }
        if !ids.is_empty() {
            self.notify(ChangeNotification::new(EntityKind::Search, ids, ChangeKind::Deleted));
        }
        true
    }

    pub fn get_search_query(&self, search_id: i64) -> Option<String> {
        self.exec("SELECT query FROM Searches WHERE id=?;", sql_values![search_id])?
            .first_value()
            .and_then(SqlValue::as_text)
    }

    pub fn get_search_info(&self, search_id: i64) -> Option<SearchInfo> {
        let output = self.exec(
            "SELECT id, type, name, query FROM Searches WHERE id=?;",
            sql_values![search_id],
        )?;
        let info = output.rows().next().map(search_info);
        info
    }

    pub fn scan_searches(&self) -> Vec<SearchInfo> {
        self.exec("SELECT id, type, name, query FROM Searches ORDER BY id;", sql_values![])
            .map(|output| output.rows().map(search_info).collect())
            .unwrap_or_default()
    }
}

fn search_info(row: &[SqlValue]) -> SearchInfo {
    SearchInfo {
        id: row[0].to_i64(),
        search_type: SearchType::from_i64(row[1].to_i64()),
        name: row[2].to_text(),
        query: row[3].to_text(),
    }
}
