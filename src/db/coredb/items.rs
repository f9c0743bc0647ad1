//! Items (rows of the Images table) and their placement in albums.

use chrono::NaiveDateTime;

use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::fields::{ChangedFields, ImagesFields};
use super::types::{ItemCategory, ItemScanInfo, ItemShortInfo, ItemStatus};
use super::CoreDb;
use crate::db::value::SqlValue;
use crate::sql_values;

const SCAN_INFO_COLUMNS: &str = "id, album, name, status, category, modificationDate, fileSize, uniqueHash";

impl CoreDb {
    // ========================================================================
    // Adding and updating
    // ========================================================================

    /// Add an item, or refresh the item with the same album and name in
    /// place. Returns the item's id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_item(
        &self,
        album_id: i64,
        name: &str,
        status: ItemStatus,
        category: ItemCategory,
        modification_date: NaiveDateTime,
        file_size: i64,
        unique_hash: &str,
    ) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO Images (album, name, status, category, modificationDate, fileSize, uniqueHash) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (album, name) DO UPDATE SET status=excluded.status, category=excluded.category, \
             modificationDate=excluded.modificationDate, fileSize=excluded.fileSize, uniqueHash=excluded.uniqueHash \
             RETURNING id;",
            sql_values![
                album_id,
                name,
                status.as_i64(),
                category.as_i64(),
                modification_date,
                file_size,
                unique_hash
            ],
        )?;
        let id = Self::inserted_id(&output)?;

        self.notify(
            ChangeNotification::new(EntityKind::Image, vec![id], ChangeKind::Added)
                .with_fields(ChangedFields::Images(ImagesFields::all())),
        );
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![id], ChangeKind::Added)
                .with_related(vec![album_id]),
        );
        Some(id)
    }

    /// Refresh the file-derived columns of an item after a rescan.
    pub fn update_item(
        &self,
        image_id: i64,
        category: ItemCategory,
        modification_date: NaiveDateTime,
        file_size: i64,
        unique_hash: &str,
    ) -> bool {
        if !self.exec_ok(
            "UPDATE Images SET category=?, modificationDate=?, fileSize=?, uniqueHash=? WHERE id=?;",
            sql_values![category.as_i64(), modification_date, file_size, unique_hash, image_id],
        ) {
            return false;
        }
        self.notify_image_fields(
            image_id,
            ImagesFields::CATEGORY
                | ImagesFields::MODIFICATION_DATE
                | ImagesFields::FILE_SIZE
                | ImagesFields::UNIQUE_HASH,
        );
        true
    }

    pub fn set_item_status(&self, image_id: i64, status: ItemStatus) -> bool {
        if !self.exec_ok(
            "UPDATE Images SET status=? WHERE id=?;",
            sql_values![status.as_i64(), image_id],
        ) {
            return false;
        }
        self.notify_image_fields(image_id, ImagesFields::STATUS);
        true
    }

    pub fn set_item_album(&self, image_id: i64, album_id: i64) -> bool {
        if !self.exec_ok("UPDATE Images SET album=? WHERE id=?;", sql_values![album_id, image_id]) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![image_id], ChangeKind::Added)
                .with_related(vec![album_id]),
        );
        true
    }

    fn notify_image_fields(&self, image_id: i64, fields: ImagesFields) {
        self.notify(
            ChangeNotification::new(EntityKind::Image, vec![image_id], ChangeKind::Changed)
                .with_fields(ChangedFields::Images(fields)),
        );
    }

    // ========================================================================
    // Id lookups
    // ========================================================================

    /// Id of the item named `name` in the album, if exactly one matches.
    pub fn get_image_id(&self, album_id: i64, name: &str) -> Option<i64> {
        let ids = self.query_ids(
            "SELECT id FROM Images WHERE album=? AND name=?;",
            sql_values![album_id, name],
        );
        single(ids)
    }

    /// Ids of items with this name and status. `None` for the album
    /// matches items that are not in any album.
    pub fn get_image_ids(&self, album_id: Option<i64>, name: &str, status: ItemStatus) -> Vec<i64> {
        match album_id {
            Some(album_id) => self.query_ids(
                "SELECT id FROM Images WHERE album=? AND name=? AND status=? ORDER BY id;",
                sql_values![album_id, name, status.as_i64()],
            ),
            None => self.query_ids(
                "SELECT id FROM Images WHERE album IS NULL AND name=? AND status=? ORDER BY id;",
                sql_values![name, status.as_i64()],
            ),
        }
    }

    /// Id of the item matching every given attribute. Several matches are
    /// treated as no match.
    #[allow(clippy::too_many_arguments)]
    pub fn find_image_id(
        &self,
        album_id: Option<i64>,
        name: &str,
        status: ItemStatus,
        category: ItemCategory,
        file_size: i64,
        unique_hash: &str,
    ) -> Option<i64> {
        let ids = match album_id {
            Some(album_id) => self.query_ids(
                "SELECT id FROM Images WHERE album=? AND name=? AND status=? AND category=? \
                 AND fileSize=? AND uniqueHash=?;",
                sql_values![album_id, name, status.as_i64(), category.as_i64(), file_size, unique_hash],
            ),
            None => self.query_ids(
                "SELECT id FROM Images WHERE album IS NULL AND name=? AND status=? AND category=? \
                 AND fileSize=? AND uniqueHash=?;",
                sql_values![name, status.as_i64(), category.as_i64(), file_size, unique_hash],
            ),
        };
        single(ids)
    }

    pub fn get_image_ids_by_status(&self, status: ItemStatus) -> Vec<i64> {
        self.query_ids(
            "SELECT id FROM Images WHERE status=? ORDER BY id;",
            sql_values![status.as_i64()],
        )
    }

    pub fn get_image_ids_by_status_and_category(&self, status: ItemStatus, category: ItemCategory) -> Vec<i64> {
        self.query_ids(
            "SELECT id FROM Images WHERE status=? AND category=? ORDER BY id;",
            sql_values![status.as_i64(), category.as_i64()],
        )
    }

    pub fn get_item_ids_in_album(&self, album_id: i64) -> Vec<i64> {
        self.query_ids("SELECT id FROM Images WHERE album=? ORDER BY id;", sql_values![album_id])
    }

    pub fn get_all_items(&self) -> Vec<i64> {
        self.query_ids("SELECT id FROM Images ORDER BY id;", Vec::new())
    }

    /// Live items with this file name whose creation date matches.
    pub fn find_by_name_and_creation_date(&self, name: &str, creation_date: NaiveDateTime) -> Vec<i64> {
        self.query_ids(
            "SELECT id FROM Images INNER JOIN ImageInformation ON Images.id=ImageInformation.imageid \
             WHERE name=? AND creationDate=? AND status!=3 ORDER BY id;",
            sql_values![name, creation_date],
        )
    }

    // ========================================================================
    // Item details
    // ========================================================================

    pub fn get_item_name(&self, image_id: i64) -> Option<String> {
        self.exec("SELECT name FROM Images WHERE id=?;", sql_values![image_id])?
            .first_value()
            .and_then(SqlValue::as_text)
    }

    pub fn get_item_album(&self, image_id: i64) -> Option<i64> {
        self.exec("SELECT album FROM Images WHERE id=?;", sql_values![image_id])?
            .first_value()
            .and_then(SqlValue::as_i64)
    }

    pub fn get_item_short_info(&self, image_id: i64) -> Option<ItemShortInfo> {
        let output = self.exec(
            "SELECT Images.name, Albums.albumRoot, Albums.relativePath, Albums.id \
             FROM Images INNER JOIN Albums ON Albums.id=Images.album WHERE Images.id=?;",
            sql_values![image_id],
        )?;
        let info = output.rows().next().map(|row| ItemShortInfo {
            id: image_id,
            name: row[0].to_text(),
            album_root_id: row[1].to_i64(),
            album: row[2].to_text(),
            album_id: row[3].to_i64(),
        });
        info
    }

    pub fn get_item_short_info_by_path(
        &self,
        root_id: i64,
        relative_path: &str,
        name: &str,
    ) -> Option<ItemShortInfo> {
        let output = self.exec(
            "SELECT Images.id, Albums.id FROM Images INNER JOIN Albums ON Images.album=Albums.id \
             WHERE Images.name=? AND Albums.albumRoot=? AND Albums.relativePath=?;",
            sql_values![name, root_id, relative_path],
        )?;
        let info = output.rows().next().map(|row| ItemShortInfo {
            id: row[0].to_i64(),
            name: name.to_string(),
            album_root_id: root_id,
            album: relative_path.to_string(),
            album_id: row[1].to_i64(),
        });
        info
    }

    pub fn get_item_scan_info(&self, image_id: i64) -> Option<ItemScanInfo> {
        let output = self.exec(
            &format!("SELECT {} FROM Images WHERE id=?;", SCAN_INFO_COLUMNS),
            sql_values![image_id],
        )?;
        let info = output.rows().next().map(scan_info);
        info
    }

    pub fn get_item_scan_infos(&self, album_id: i64) -> Vec<ItemScanInfo> {
        self.exec(
            &format!("SELECT {} FROM Images WHERE album=? ORDER BY id;", SCAN_INFO_COLUMNS),
            sql_values![album_id],
        )
        .map(|output| output.rows().map(scan_info).collect())
        .unwrap_or_default()
    }

    /// Items in albums with the same content fingerprint and size,
    /// excluding `source_id`.
    pub fn get_identical_files(&self, unique_hash: &str, file_size: i64, source_id: Option<i64>) -> Vec<ItemScanInfo> {
        if unique_hash.is_empty() {
            return Vec::new();
        }
        self.exec(
            &format!(
                "SELECT {} FROM Images WHERE fileSize=? AND uniqueHash=? AND album IS NOT NULL ORDER BY id;",
                SCAN_INFO_COLUMNS
            ),
            sql_values![file_size, unique_hash],
        )
        .map(|output| {
            output
                .rows()
                .map(scan_info)
                .filter(|info| Some(info.id) != source_id)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Selected Images columns of one item, decoded, in column order.
    /// Empty when the item does not exist.
    pub fn get_images_fields(&self, image_id: i64, fields: ImagesFields) -> Vec<SqlValue> {
        self.read_fields(image_id, fields)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Delete the item named `name` in the album.
    pub fn delete_item(&self, album_id: i64, name: &str) -> bool {
        match self.delete_item_silently(album_id, name) {
            Some(deleted) => {
                self.notify_item_deleted(deleted, album_id);
                true
            }
            None => false,
        }
    }

    /// `None` when the delete failed, otherwise the id of the deleted row
    /// if there was one. Sends no notification.
    fn delete_item_silently(&self, album_id: i64, name: &str) -> Option<Option<i64>> {
        let Some(image_id) = self.get_image_id(album_id, name) else {
            return Some(None);
        };
        self.exec("DELETE FROM Images WHERE id=?;", sql_values![image_id])?;
        Some(Some(image_id))
    }

    fn notify_item_deleted(&self, image_id: Option<i64>, album_id: i64) {
        if let Some(image_id) = image_id {
            self.notify(
                ChangeNotification::new(EntityKind::CollectionImage, vec![image_id], ChangeKind::Deleted)
                    .with_related(vec![album_id]),
            );
        }
    }

    /// Delete an item that no longer belongs to an album.
    pub fn delete_orphan_item(&self, image_id: i64) -> bool {
        let Some(output) = self.exec(
            "DELETE FROM Images WHERE id=? AND album IS NULL;",
            sql_values![image_id],
        ) else {
            return false;
        };
        if output.rows_affected > 0 {
            self.notify(ChangeNotification::new(
                EntityKind::CollectionImage,
                vec![image_id],
                ChangeKind::Deleted,
            ));
        }
        true
    }

    /// Detach items from their albums and mark them trashed.
    pub fn remove_items(&self, image_ids: &[i64], album_ids: &[i64]) -> bool {
        self.detach_items(image_ids, album_ids, ItemStatus::Trashed, ChangeKind::Removed)
    }

    /// Detach items from their albums and mark them obsolete; they are
    /// purged by `delete_removed_items`.
    pub fn remove_items_permanently(&self, image_ids: &[i64], album_ids: &[i64]) -> bool {
        self.detach_items(image_ids, album_ids, ItemStatus::Obsolete, ChangeKind::Removed)
    }

    fn detach_items(&self, image_ids: &[i64], album_ids: &[i64], status: ItemStatus, kind: ChangeKind) -> bool {
        if image_ids.is_empty() {
            return true;
        }
        let statuses = vec![SqlValue::Integer(status.as_i64()); image_ids.len()];
        let ids = image_ids.iter().copied().map(SqlValue::Integer).collect();
        if !self.exec_bulk("UPDATE Images SET status=?, album=NULL WHERE id=?;", &[statuses, ids]) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, image_ids.to_vec(), kind)
                .with_related(album_ids.to_vec()),
        );
        true
    }

    /// Purge every obsolete item.
    pub fn delete_removed_items(&self) -> bool {
        if !self.exec_ok(
            "DELETE FROM Images WHERE status=?;",
            sql_values![ItemStatus::Obsolete.as_i64()],
        ) {
            return false;
        }
        self.notify(ChangeNotification::new(
            EntityKind::CollectionImage,
            Vec::new(),
            ChangeKind::RemovedDeleted,
        ));
        true
    }

    // ========================================================================
    // Move and copy
    // ========================================================================

    /// Move an item to another album and name, replacing any stale entry
    /// at the destination.
    pub fn move_item(&self, src_album_id: i64, src_name: &str, dst_album_id: i64, dst_name: &str) -> bool {
        if src_album_id == dst_album_id && src_name == dst_name {
            return true;
        }
        let engine = self.engine();
        let _access = engine.access();
        let Some(image_id) = self.get_image_id(src_album_id, src_name) else {
            return false;
        };
        let Ok(transaction) = engine.transaction() else {
            return false;
        };
        let Some(replaced) = self.delete_item_silently(dst_album_id, dst_name) else {
            return false;
        };
        if !self.exec_ok(
            "UPDATE Images SET album=?, name=? WHERE id=?;",
            sql_values![dst_album_id, dst_name, image_id],
        ) {
            return false;
        }
        if transaction.commit().is_err() {
            return false;
        }

        self.notify_item_deleted(replaced, dst_album_id);
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![image_id], ChangeKind::Moved)
                .with_related(vec![src_album_id]),
        );
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![image_id], ChangeKind::Added)
                .with_related(vec![dst_album_id]),
        );
        true
    }

    /// Copy an item with all of its attributes. Returns the new item's id,
    /// or the source id when source and destination are the same.
    pub fn copy_item(&self, src_album_id: i64, src_name: &str, dst_album_id: i64, dst_name: &str) -> Option<i64> {
        let engine = self.engine();
        let _access = engine.access();
        let src_id = self.get_image_id(src_album_id, src_name)?;
        if dst_name.is_empty() {
            return None;
        }
        if src_album_id == dst_album_id && src_name == dst_name {
            return Some(src_id);
        }

        let transaction = engine.transaction().ok()?;
        let replaced = self.delete_item_silently(dst_album_id, dst_name)?;
        let output = self.exec(
            "INSERT INTO Images (album, name, status, category, modificationDate, fileSize, uniqueHash) \
             SELECT CAST(? AS BIGINT), CAST(? AS TEXT), status, category, modificationDate, fileSize, uniqueHash \
             FROM Images WHERE id=? RETURNING id;",
            sql_values![dst_album_id, dst_name, src_id],
        )?;
        let dst_id = Self::inserted_id(&output)?;
        if !self.copy_image_attributes_silently(src_id, dst_id) {
            return None;
        }
        transaction.commit().ok()?;

        self.notify_item_deleted(replaced, dst_album_id);
        self.notify_attributes_copied(dst_id);
        self.notify(
            ChangeNotification::new(EntityKind::Image, vec![dst_id], ChangeKind::Added)
                .with_fields(ChangedFields::Images(ImagesFields::all())),
        );
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![dst_id], ChangeKind::Copied)
                .with_related(vec![src_album_id]),
        );
        self.notify(
            ChangeNotification::new(EntityKind::CollectionImage, vec![dst_id], ChangeKind::Added)
                .with_related(vec![dst_album_id]),
        );
        Some(dst_id)
    }

    /// Copy every per-item table row of `src_id` to `dst_id`.
    pub fn copy_image_attributes(&self, src_id: i64, dst_id: i64) -> bool {
        if !self.copy_image_attributes_silently(src_id, dst_id) {
            return false;
        }
        self.notify_attributes_copied(dst_id);
        true
    }

    fn copy_image_attributes_silently(&self, src_id: i64, dst_id: i64) -> bool {
        const COPIES: &[&str] = &[
            "INSERT INTO ImageInformation (imageid, rating, creationDate, digitizationDate, orientation, \
             width, height, format, colorDepth, colorModel) \
             SELECT CAST(? AS BIGINT), rating, creationDate, digitizationDate, orientation, \
             width, height, format, colorDepth, colorModel FROM ImageInformation WHERE imageid=?;",
            "INSERT INTO ImageMetadata (imageid, make, model, lens, aperture, focalLength, focalLength35, \
             exposureTime, exposureProgram, exposureMode, sensitivity, flash, whiteBalance, \
             whiteBalanceColorTemperature, meteringMode, subjectDistance, subjectDistanceCategory) \
             SELECT CAST(? AS BIGINT), make, model, lens, aperture, focalLength, focalLength35, \
             exposureTime, exposureProgram, exposureMode, sensitivity, flash, whiteBalance, \
             whiteBalanceColorTemperature, meteringMode, subjectDistance, subjectDistanceCategory \
             FROM ImageMetadata WHERE imageid=?;",
            "INSERT INTO VideoMetadata (imageid, aspectRatio, audioBitRate, audioChannelType, \
             audioCompressor, duration, frameRate, videoCodec) \
             SELECT CAST(? AS BIGINT), aspectRatio, audioBitRate, audioChannelType, audioCompressor, \
             duration, frameRate, videoCodec FROM VideoMetadata WHERE imageid=?;",
            "INSERT INTO ImagePositions (imageid, latitude, latitudeNumber, longitude, longitudeNumber, \
             altitude, orientation, tilt, roll, accuracy, description) \
             SELECT CAST(? AS BIGINT), latitude, latitudeNumber, longitude, longitudeNumber, \
             altitude, orientation, tilt, roll, accuracy, description FROM ImagePositions WHERE imageid=?;",
            "INSERT INTO ImageComments (imageid, type, language, author, date, comment) \
             SELECT CAST(? AS BIGINT), type, language, author, date, comment FROM ImageComments WHERE imageid=?;",
            "INSERT INTO ImageCopyright (imageid, property, value, extraValue) \
             SELECT CAST(? AS BIGINT), property, value, extraValue FROM ImageCopyright WHERE imageid=?;",
            "INSERT INTO ImageHistory (imageid, uuid, history) \
             SELECT CAST(? AS BIGINT), uuid, history FROM ImageHistory WHERE imageid=?;",
            "INSERT INTO ImageRelations (subject, object, type) \
             SELECT CAST(? AS BIGINT), object, type FROM ImageRelations WHERE subject=?;",
            "INSERT INTO ImageRelations (subject, object, type) \
             SELECT subject, CAST(? AS BIGINT), type FROM ImageRelations WHERE object=?;",
            "INSERT INTO ImageTags (imageid, tagid) \
             SELECT CAST(? AS BIGINT), tagid FROM ImageTags WHERE imageid=?;",
            "INSERT INTO ImageTagProperties (imageid, tagid, property, value) \
             SELECT CAST(? AS BIGINT), tagid, property, value FROM ImageTagProperties WHERE imageid=?;",
            "INSERT INTO ImageProperties (imageid, property, value) \
             SELECT CAST(? AS BIGINT), property, value FROM ImageProperties WHERE imageid=?;",
        ];

        let engine = self.engine();
        let Ok(transaction) = engine.transaction() else {
            return false;
        };
        for sql in COPIES {
            if !self.exec_ok(sql, sql_values![dst_id, src_id]) {
                return false;
            }
        }
        transaction.commit().is_ok()
    }

    fn notify_attributes_copied(&self, dst_id: i64) {
        self.notify(
            ChangeNotification::new(EntityKind::Image, vec![dst_id], ChangeKind::Changed)
                .with_fields(ChangedFields::Information(super::ImageInformationFields::all())),
        );
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![dst_id], ChangeKind::Added)
                .with_related(self.get_item_tag_ids(dst_id)),
        );
    }
}

fn single(ids: Vec<i64>) -> Option<i64> {
    match ids.as_slice() {
        [id] => Some(*id),
        _ => None,
    }
}

fn scan_info(row: &[SqlValue]) -> ItemScanInfo {
    ItemScanInfo {
        id: row[0].to_i64(),
        album_id: row[1].as_ref_id(),
        name: row[2].to_text(),
        status: ItemStatus::from_i64(row[3].to_i64()),
        category: ItemCategory::from_i64(row[4].to_i64()),
        modification_date: row[5].as_datetime(),
        file_size: row[6].to_i64(),
        unique_hash: row[7].to_text(),
    }
}
