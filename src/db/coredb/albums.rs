//! Album roots and albums.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate};

use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::types::{AlbumInfo, AlbumRootInfo, AlbumRootStatus, AlbumRootType, AlbumShortInfo};
use super::CoreDb;
use crate::bindings;
use crate::db::actions::names;
use crate::db::value::SqlValue;
use crate::sql_values;

impl CoreDb {
    // ========================================================================
    // Album roots
    // ========================================================================

    pub fn get_album_roots(&self) -> Vec<AlbumRootInfo> {
        let Some(output) = self.exec(
            "SELECT id, label, status, type, identifier, specificPath FROM AlbumRoots ORDER BY id;",
            Vec::new(),
        ) else {
            return Vec::new();
        };

        output
            .rows()
            .map(|row| AlbumRootInfo {
                id: row[0].to_i64(),
                label: row[1].to_text(),
                status: AlbumRootStatus::from_i64(row[2].to_i64()),
                root_type: AlbumRootType::from_i64(row[3].to_i64()),
                identifier: row[4].to_text(),
                specific_path: row[5].to_text(),
            })
            .collect()
    }

    /// Add a root, or update the label and type of the root with the same
    /// identifier and path. Returns the root's id.
    pub fn add_album_root(
        &self,
        root_type: AlbumRootType,
        identifier: &str,
        specific_path: &str,
        label: &str,
    ) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO AlbumRoots (type, label, status, identifier, specificPath) \
             VALUES (?, ?, 0, ?, ?) \
             ON CONFLICT (identifier, specificPath) DO UPDATE SET type=excluded.type, label=excluded.label \
             RETURNING id;",
            sql_values![root_type.as_i64(), label, identifier, specific_path],
        )?;
        let id = Self::inserted_id(&output)?;
        self.notify(ChangeNotification::new(EntityKind::AlbumRoot, vec![id], ChangeKind::Added));
        Some(id)
    }

    /// Delete a root together with its albums and their items.
    pub fn delete_album_root(&self, root_id: i64) -> bool {
        if self
            .exec_action(names::DELETE_ALBUM_ROOT, &bindings! { ":albumRoot" => root_id })
            .is_none()
        {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::AlbumRoot, vec![root_id], ChangeKind::Deleted));
        true
    }

    /// Point a root at a different volume without changing its id.
    pub fn migrate_album_root(&self, root_id: i64, identifier: &str) -> bool {
        self.update_album_root(
            "UPDATE AlbumRoots SET identifier=? WHERE id=?;",
            sql_values![identifier, root_id],
            root_id,
        )
    }

    pub fn set_album_root_label(&self, root_id: i64, label: &str) -> bool {
        self.update_album_root(
            "UPDATE AlbumRoots SET label=? WHERE id=?;",
            sql_values![label, root_id],
            root_id,
        )
    }

    pub fn change_album_root_type(&self, root_id: i64, root_type: AlbumRootType) -> bool {
        self.update_album_root(
            "UPDATE AlbumRoots SET type=? WHERE id=?;",
            sql_values![root_type.as_i64(), root_id],
            root_id,
        )
    }

    fn update_album_root(&self, sql: &str, values: Vec<SqlValue>, root_id: i64) -> bool {
        if !self.exec_ok(sql, values) {
            return false;
        }
        self.notify(ChangeNotification::new(
            EntityKind::AlbumRoot,
            vec![root_id],
            ChangeKind::PropertiesChanged,
        ));
        true
    }

    pub fn get_albums_on_album_root(&self, root_id: i64) -> Vec<i64> {
        self.query_ids("SELECT id FROM Albums WHERE albumRoot=? ORDER BY id;", sql_values![root_id])
    }

    // ========================================================================
    // Album scans
    // ========================================================================

    /// All albums whose root still exists.
    pub fn scan_albums(&self) -> Vec<AlbumInfo> {
        let Some(output) = self.exec(
            "SELECT albumRoot, id, relativePath, date, caption, collection, icon \
             FROM Albums WHERE albumRoot != 0 ORDER BY id;",
            Vec::new(),
        ) else {
            return Vec::new();
        };

        output
            .rows()
            .map(|row| AlbumInfo {
                album_root_id: row[0].to_i64(),
                id: row[1].to_i64(),
                relative_path: row[2].to_text(),
                date: row[3].as_date(),
                caption: row[4].to_text(),
                category: row[5].to_text(),
                icon_id: row[6].as_ref_id(),
            })
            .collect()
    }

    pub fn get_album_short_infos(&self) -> Vec<AlbumShortInfo> {
        let Some(output) = self.exec(
            "SELECT id, relativePath, albumRoot FROM Albums WHERE albumRoot != 0 ORDER BY id;",
            Vec::new(),
        ) else {
            return Vec::new();
        };

        output
            .rows()
            .map(|row| AlbumShortInfo {
                id: row[0].to_i64(),
                relative_path: row[1].to_text(),
                album_root_id: row[2].to_i64(),
            })
            .collect()
    }

    // ========================================================================
    // Album mutations
    // ========================================================================

    /// Add an album, or update caption, date and collection of the album
    /// at the same path. Returns the album's id.
    pub fn add_album(
        &self,
        root_id: i64,
        relative_path: &str,
        caption: &str,
        date: NaiveDate,
        collection: &str,
    ) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO Albums (albumRoot, relativePath, date, caption, collection) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (albumRoot, relativePath) DO UPDATE SET \
             caption=excluded.caption, date=excluded.date, collection=excluded.collection \
             RETURNING id;",
            sql_values![root_id, relative_path, date, caption, collection],
        )?;
        let id = Self::inserted_id(&output)?;
        self.notify(ChangeNotification::new(EntityKind::Album, vec![id], ChangeKind::Added));
        Some(id)
    }

    pub fn set_album_caption(&self, album_id: i64, caption: &str) -> bool {
        self.update_album(
            "UPDATE Albums SET caption=? WHERE id=?;",
            sql_values![caption, album_id],
            album_id,
            ChangeKind::PropertiesChanged,
        )
    }

    pub fn set_album_category(&self, album_id: i64, category: &str) -> bool {
        self.update_album(
            "UPDATE Albums SET collection=? WHERE id=?;",
            sql_values![category, album_id],
            album_id,
            ChangeKind::PropertiesChanged,
        )
    }

    pub fn set_album_date(&self, album_id: i64, date: NaiveDate) -> bool {
        self.update_album(
            "UPDATE Albums SET date=? WHERE id=?;",
            sql_values![date, album_id],
            album_id,
            ChangeKind::PropertiesChanged,
        )
    }

    /// Set or clear the image used as the album's icon.
    pub fn set_album_icon(&self, album_id: i64, icon_id: Option<i64>) -> bool {
        self.update_album(
            "UPDATE Albums SET icon=? WHERE id=?;",
            sql_values![icon_id, album_id],
            album_id,
            ChangeKind::IconChanged,
        )
    }

    fn update_album(&self, sql: &str, values: Vec<SqlValue>, album_id: i64, kind: ChangeKind) -> bool {
        if !self.exec_ok(sql, values) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Album, vec![album_id], kind));
        true
    }

    /// Delete an album and its items.
    pub fn delete_album(&self, album_id: i64) -> bool {
        if self
            .exec_action(names::DELETE_ALBUM_ID, &bindings! { ":albumId" => album_id })
            .is_none()
        {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Album, vec![album_id], ChangeKind::Deleted));
        true
    }

    /// Move an album under the synthetic root 0. Its relative path becomes
    /// `<oldRoot>-<oldPath>` so a new album may take the old path.
    pub fn make_stale_album(&self, album_id: i64) -> bool {
        let Some(output) = self.exec(
            "SELECT albumRoot, relativePath FROM Albums WHERE id=?;",
            sql_values![album_id],
        ) else {
            return false;
        };
        let Some(row) = output.rows().next() else {
            return false;
        };
        let stale_path = format!("{}-{}", row[0].to_i64(), row[1].to_text());

        // Drop older stale albums that used the same path.
        if self
            .exec_action(
                names::DELETE_ALBUM_ROOT_PATH,
                &bindings! { ":albumRoot" => 0i64, ":relativePath" => stale_path.as_str() },
            )
            .is_none()
        {
            return false;
        }

        if !self.exec_ok(
            "UPDATE Albums SET albumRoot=0, relativePath=? WHERE id=?;",
            sql_values![stale_path, album_id],
        ) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Album, vec![album_id], ChangeKind::Deleted));
        true
    }

    /// Delete every stale album and its items.
    pub fn delete_stale_albums(&self) -> bool {
        self.exec_action(names::DELETE_ALBUM_ROOT, &bindings! { ":albumRoot" => 0i64 })
            .is_some()
    }

    /// Move an album to a new root and path, replacing any stale album
    /// left at the destination.
    pub fn rename_album(&self, album_id: i64, new_root_id: i64, new_relative_path: &str) -> bool {
        let (Some(root_id), Some(relative_path)) = (
            self.get_album_root_id(album_id),
            self.get_album_relative_path(album_id),
        ) else {
            return false;
        };
        if root_id == new_root_id && relative_path == new_relative_path {
            return true;
        }

        if self
            .exec_action(
                names::DELETE_ALBUM_ROOT_PATH,
                &bindings! { ":albumRoot" => new_root_id, ":relativePath" => new_relative_path },
            )
            .is_none()
        {
            return false;
        }

        self.update_album(
            "UPDATE Albums SET albumRoot=?, relativePath=? WHERE id=? AND albumRoot=?;",
            sql_values![new_root_id, new_relative_path, album_id, root_id],
            album_id,
            ChangeKind::Renamed,
        )
    }

    /// Copy date, caption, collection and icon from one album to another.
    pub fn copy_album_properties(&self, src_album_id: i64, dst_album_id: i64) -> bool {
        if src_album_id == dst_album_id {
            return true;
        }
        let Some(output) = self.exec(
            "SELECT date, caption, collection, icon FROM Albums WHERE id=?;",
            sql_values![src_album_id],
        ) else {
            return false;
        };
        let Some(row) = output.rows().next() else {
            return false;
        };

        let mut values = row.to_vec();
        values.push(SqlValue::Integer(dst_album_id));
        self.update_album(
            "UPDATE Albums SET date=?, caption=?, collection=?, icon=? WHERE id=?;",
            values,
            dst_album_id,
            ChangeKind::PropertiesChanged,
        )
    }

    // ========================================================================
    // Album lookups
    // ========================================================================

    /// Id of the album at `relative_path`; with `create`, a missing album
    /// is added with today's date.
    pub fn get_album_for_path(&self, root_id: i64, relative_path: &str, create: bool) -> Option<i64> {
        let output = self.exec(
            "SELECT id FROM Albums WHERE albumRoot=? AND relativePath=?;",
            sql_values![root_id, relative_path],
        )?;
        if let Some(id) = output.first_value().and_then(SqlValue::as_i64) {
            return Some(id);
        }
        if create {
            self.add_album(root_id, relative_path, "", Local::now().date_naive(), "")
        } else {
            None
        }
    }

    /// The album at `relative_path` and every album below it.
    pub fn get_album_and_subalbums_for_path(&self, root_id: i64, relative_path: &str) -> Vec<i64> {
        let prefix = if relative_path == "/" {
            "/".to_string()
        } else {
            format!("{}/", relative_path)
        };
        let Some(output) = self.exec(
            "SELECT id, relativePath FROM Albums WHERE albumRoot=? AND (relativePath=? OR relativePath LIKE ?);",
            sql_values![root_id, relative_path, format!("{}%", prefix)],
        ) else {
            return Vec::new();
        };

        // LIKE treats '_' and '%' in the path as wildcards; check exactly.
        output
            .rows()
            .filter(|row| {
                let path = row[1].to_text();
                path == relative_path || path.starts_with(&prefix)
            })
            .map(|row| row[0].to_i64())
            .collect()
    }

    pub fn get_album_relative_path(&self, album_id: i64) -> Option<String> {
        self.exec("SELECT relativePath FROM Albums WHERE id=?;", sql_values![album_id])?
            .first_value()
            .and_then(SqlValue::as_text)
    }

    pub fn get_album_root_id(&self, album_id: i64) -> Option<i64> {
        self.exec("SELECT albumRoot FROM Albums WHERE id=?;", sql_values![album_id])?
            .first_value()
            .and_then(SqlValue::as_i64)
    }

    /// Earliest creation date of the album's items.
    pub fn get_album_lowest_date(&self, album_id: i64) -> Option<NaiveDate> {
        self.exec(
            "SELECT MIN(creationDate) FROM ImageInformation \
             INNER JOIN Images ON Images.id=ImageInformation.imageid \
             WHERE Images.album=? AND Images.status!=3;",
            sql_values![album_id],
        )?
        .first_value()
        .and_then(SqlValue::as_date)
    }

    pub fn get_album_highest_date(&self, album_id: i64) -> Option<NaiveDate> {
        self.exec(
            "SELECT MAX(creationDate) FROM ImageInformation \
             INNER JOIN Images ON Images.id=ImageInformation.imageid \
             WHERE Images.album=? AND Images.status!=3;",
            sql_values![album_id],
        )?
        .first_value()
        .and_then(SqlValue::as_date)
    }

    /// Mean of the album's item creation dates.
    pub fn get_album_average_date(&self, album_id: i64) -> Option<NaiveDate> {
        let output = self.exec(
            "SELECT creationDate FROM ImageInformation \
             INNER JOIN Images ON Images.id=ImageInformation.imageid \
             WHERE Images.album=? AND Images.status!=3;",
            sql_values![album_id],
        )?;

        let stamps: Vec<i64> = output
            .values
            .iter()
            .filter_map(SqlValue::as_datetime)
            .map(|dt| dt.and_utc().timestamp())
            .collect();
        if stamps.is_empty() {
            return None;
        }
        let mean = stamps.iter().map(|s| *s as i128).sum::<i128>() / stamps.len() as i128;
        DateTime::from_timestamp(mean as i64, 0).map(|dt| dt.date_naive())
    }

    /// Visible item count per album id.
    pub fn get_number_of_images_in_albums(&self) -> BTreeMap<i64, i64> {
        let Some(output) = self.exec(
            "SELECT album, COUNT(*) FROM Images WHERE status=1 AND album IS NOT NULL GROUP BY album;",
            Vec::new(),
        ) else {
            return BTreeMap::new();
        };
        output
            .rows()
            .map(|row| (row[0].to_i64(), row[1].to_i64()))
            .collect()
    }
}
