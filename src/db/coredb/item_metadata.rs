//! Per-item attribute tables: information, metadata, video, positions,
//! comments, copyright, free-form properties and history.
//!
//! The field-mask accessors take values in the column order of the mask's
//! table, one value per set bit, and return them in the same order.

use chrono::NaiveDateTime;
use tracing::warn;

use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::fields::{
    decode_row, ChangedFields, FieldMask, ImageCommentsFields, ImageInformationFields,
    ImageMetadataFields, ImagePositionsFields, VideoMetadataFields,
};
use super::types::{CommentInfo, CommentType, CopyrightInfo, CopyrightUniqueness, ImageHistoryEntry};
use super::CoreDb;
use crate::db::actions::names;
use crate::db::value::SqlValue;
use crate::sql_values;

impl CoreDb {
    // ========================================================================
    // Field-mask plumbing
    // ========================================================================

    /// Read the `fields` columns of one item's row of `F`'s table.
    pub(super) fn read_fields<F: FieldMask>(&self, image_id: i64, fields: F) -> Vec<SqlValue> {
        let key = if F::TABLE == "Images" { "id" } else { "imageid" };
        self.read_fields_where(fields, key, image_id)
    }

    fn read_fields_where<F: FieldMask>(&self, fields: F, key: &str, id: i64) -> Vec<SqlValue> {
        let columns = fields.column_names();
        if columns.is_empty() {
            return Vec::new();
        }
        let Some(output) = self.exec(
            &format!("SELECT {} FROM {} WHERE {}=?;", columns.join(", "), F::TABLE, key),
            sql_values![id],
        ) else {
            return Vec::new();
        };
        let values = output
            .rows()
            .next()
            .map(|row| decode_row(fields, row))
            .unwrap_or_default();
        values
    }

    fn check_field_values<F: FieldMask>(fields: F, values: &[SqlValue]) -> Option<Vec<&'static str>> {
        let columns = fields.column_names();
        if columns.is_empty() {
            return None;
        }
        if columns.len() != values.len() {
            warn!(
                "{} expects {} values for {:?} but got {}. This is a setup error!",
                F::TABLE,
                columns.len(),
                columns,
                values.len()
            );
            return None;
        }
        Some(columns)
    }

    /// Insert the item's row, or overwrite the given columns of an
    /// existing row.
    fn add_fields<F: FieldMask>(&self, image_id: i64, fields: F, values: Vec<SqlValue>) -> bool {
        let Some(columns) = Self::check_field_values(fields, &values) else {
            return false;
        };
        let updates = columns
            .iter()
            .map(|column| format!("{0}=excluded.{0}", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (imageid, {}) VALUES ({}) ON CONFLICT (imageid) DO UPDATE SET {};",
            F::TABLE,
            columns.join(", "),
            super::placeholders(columns.len() + 1),
            updates
        );

        let mut bound = Vec::with_capacity(values.len() + 1);
        bound.push(SqlValue::Integer(image_id));
        bound.extend(values);
        if !self.exec_ok(&sql, bound) {
            return false;
        }
        self.notify_fields(image_id, fields.changed());
        true
    }

    /// Update columns of a row that already exists.
    fn update_fields<F: FieldMask>(&self, key: &str, id: i64, image_id: i64, fields: F, values: Vec<SqlValue>) -> bool {
        let Some(columns) = Self::check_field_values(fields, &values) else {
            return false;
        };
        let sql = format!(
            "UPDATE {} SET {}=? WHERE {}=?;",
            F::TABLE,
            columns.join("=?, "),
            key
        );
        let mut bound = values;
        bound.push(SqlValue::Integer(id));
        if !self.exec_ok(&sql, bound) {
            return false;
        }
        self.notify_fields(image_id, fields.changed());
        true
    }

    fn notify_fields(&self, image_id: i64, fields: ChangedFields) {
        self.notify(
            ChangeNotification::new(EntityKind::Image, vec![image_id], ChangeKind::Changed).with_fields(fields),
        );
    }

    // ========================================================================
    // Image information
    // ========================================================================

    pub fn get_image_information(&self, image_id: i64, fields: ImageInformationFields) -> Vec<SqlValue> {
        self.read_fields(image_id, fields)
    }

    pub fn add_image_information(&self, image_id: i64, values: Vec<SqlValue>, fields: ImageInformationFields) -> bool {
        self.add_fields(image_id, fields, values)
    }

    /// Upsert through the engine's `changeImageInformation` action.
    pub fn change_image_information(
        &self,
        image_id: i64,
        values: Vec<SqlValue>,
        fields: ImageInformationFields,
    ) -> bool {
        let Some(columns) = Self::check_field_values(fields, &values) else {
            return false;
        };
        if let Err(e) =
            self.engine()
                .exec_upsert_action(names::CHANGE_IMAGE_INFORMATION, image_id, &columns, values)
        {
            warn!("Could not change image information of {}: {}", image_id, e);
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Information(fields));
        true
    }

    // ========================================================================
    // Photo and video metadata
    // ========================================================================

    pub fn get_image_metadata(&self, image_id: i64, fields: ImageMetadataFields) -> Vec<SqlValue> {
        self.read_fields(image_id, fields)
    }

    pub fn add_image_metadata(&self, image_id: i64, values: Vec<SqlValue>, fields: ImageMetadataFields) -> bool {
        self.add_fields(image_id, fields, values)
    }

    pub fn change_image_metadata(&self, image_id: i64, values: Vec<SqlValue>, fields: ImageMetadataFields) -> bool {
        self.update_fields("imageid", image_id, image_id, fields, values)
    }

    pub fn get_video_metadata(&self, image_id: i64, fields: VideoMetadataFields) -> Vec<SqlValue> {
        self.read_fields(image_id, fields)
    }

    pub fn add_video_metadata(&self, image_id: i64, values: Vec<SqlValue>, fields: VideoMetadataFields) -> bool {
        self.add_fields(image_id, fields, values)
    }

    pub fn change_video_metadata(&self, image_id: i64, values: Vec<SqlValue>, fields: VideoMetadataFields) -> bool {
        self.update_fields("imageid", image_id, image_id, fields, values)
    }

    // ========================================================================
    // Positions
    // ========================================================================

    pub fn get_image_position(&self, image_id: i64, fields: ImagePositionsFields) -> Vec<SqlValue> {
        self.read_fields(image_id, fields)
    }

    /// Positions of several items, one entry per id. Items without a
    /// position get an empty entry.
    pub fn get_image_positions(&self, image_ids: &[i64], fields: ImagePositionsFields) -> Vec<Vec<SqlValue>> {
        if fields.is_empty() {
            return Vec::new();
        }
        image_ids.iter().map(|id| self.read_fields(*id, fields)).collect()
    }

    pub fn add_image_position(&self, image_id: i64, values: Vec<SqlValue>, fields: ImagePositionsFields) -> bool {
        self.add_fields(image_id, fields, values)
    }

    pub fn change_image_position(&self, image_id: i64, values: Vec<SqlValue>, fields: ImagePositionsFields) -> bool {
        self.update_fields("imageid", image_id, image_id, fields, values)
    }

    pub fn remove_image_position(&self, image_id: i64) -> bool {
        if !self.exec_ok("DELETE FROM ImagePositions WHERE imageid=?;", sql_values![image_id]) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Positions(ImagePositionsFields::all()));
        true
    }

    pub fn remove_image_position_altitude(&self, image_id: i64) -> bool {
        if !self.exec_ok(
            "UPDATE ImagePositions SET altitude=NULL WHERE imageid=?;",
            sql_values![image_id],
        ) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Positions(ImagePositionsFields::ALTITUDE));
        true
    }

    // ========================================================================
    // Comments
    // ========================================================================

    pub fn get_image_comments(&self, image_id: i64) -> Vec<CommentInfo> {
        let Some(output) = self.exec(
            "SELECT id, type, language, author, date, comment FROM ImageComments WHERE imageid=? ORDER BY id;",
            sql_values![image_id],
        ) else {
            return Vec::new();
        };
        output
            .rows()
            .map(|row| CommentInfo {
                id: row[0].to_i64(),
                image_id,
                comment_type: CommentType::from_i64(row[1].to_i64()),
                language: row[2].to_text(),
                author: row[3].to_text(),
                date: row[4].as_datetime(),
                comment: row[5].to_text(),
            })
            .collect()
    }

    /// Selected columns of one comment row.
    pub fn get_image_comment_fields(&self, comment_id: i64, fields: ImageCommentsFields) -> Vec<SqlValue> {
        self.read_fields_where(fields, "id", comment_id)
    }

    /// Set the comment of the given type, language and author, replacing
    /// an existing one. Returns the comment's id.
    pub fn set_image_comment(
        &self,
        image_id: i64,
        comment: &str,
        comment_type: CommentType,
        language: &str,
        author: &str,
        date: Option<NaiveDateTime>,
    ) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO ImageComments (imageid, type, language, author, date, comment) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (imageid, type, language, author) DO UPDATE SET date=excluded.date, comment=excluded.comment \
             RETURNING id;",
            sql_values![image_id, comment_type.as_i64(), language, author, date, comment],
        )?;
        let id = Self::inserted_id(&output)?;
        self.notify_fields(image_id, ChangedFields::Comments(ImageCommentsFields::all()));
        Some(id)
    }

    pub fn change_image_comment(
        &self,
        comment_id: i64,
        image_id: i64,
        values: Vec<SqlValue>,
        fields: ImageCommentsFields,
    ) -> bool {
        self.update_fields("id", comment_id, image_id, fields, values)
    }

    pub fn remove_image_comment(&self, comment_id: i64, image_id: i64) -> bool {
        if !self.exec_ok("DELETE FROM ImageComments WHERE id=?;", sql_values![comment_id]) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Comments(ImageCommentsFields::all()));
        true
    }

    // ========================================================================
    // Copyright
    // ========================================================================

    /// Copyright entries of an item, optionally for one property.
    pub fn get_image_copyright(&self, image_id: i64, property: Option<&str>) -> Vec<CopyrightInfo> {
        let output = match property {
            Some(property) => self.exec(
                "SELECT id, property, value, extraValue FROM ImageCopyright \
                 WHERE imageid=? AND property=? ORDER BY id;",
                sql_values![image_id, property],
            ),
            None => self.exec(
                "SELECT id, property, value, extraValue FROM ImageCopyright WHERE imageid=? ORDER BY id;",
                sql_values![image_id],
            ),
        };
        let Some(output) = output else {
            return Vec::new();
        };
        output
            .rows()
            .map(|row| CopyrightInfo {
                id: row[0].to_i64(),
                image_id,
                property: row[1].to_text(),
                value: row[2].to_text(),
                extra_value: row[3].to_text(),
            })
            .collect()
    }

    /// Store a copyright value. Depending on `uniqueness`, existing values
    /// of the property (or of the property and extra value) are replaced.
    pub fn set_image_copyright_property(
        &self,
        image_id: i64,
        property: &str,
        value: &str,
        extra_value: &str,
        uniqueness: CopyrightUniqueness,
    ) -> bool {
        let engine = self.engine();
        let _access = engine.access();
        let Ok(transaction) = engine.transaction() else {
            return false;
        };

        let cleared = match uniqueness {
            CopyrightUniqueness::PropertyUnique => self.exec_ok(
                "DELETE FROM ImageCopyright WHERE imageid=? AND property=?;",
                sql_values![image_id, property],
            ),
            CopyrightUniqueness::PropertyExtraValueUnique => self.exec_ok(
                "DELETE FROM ImageCopyright WHERE imageid=? AND property=? AND extraValue=?;",
                sql_values![image_id, property, extra_value],
            ),
            CopyrightUniqueness::PropertyNoConstraint => true,
        };
        if !cleared
            || !self.exec_ok(
                "INSERT INTO ImageCopyright (imageid, property, value, extraValue) VALUES (?, ?, ?, ?) \
                 ON CONFLICT DO NOTHING;",
                sql_values![image_id, property, value, extra_value],
            )
        {
            return false;
        }
        if transaction.commit().is_err() {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Copyright);
        true
    }

    /// Remove copyright entries; each given filter narrows the match.
    pub fn remove_image_copyright_properties(
        &self,
        image_id: i64,
        property: Option<&str>,
        extra_value: Option<&str>,
        value: Option<&str>,
    ) -> bool {
        let (sql, values) = match (property, extra_value, value) {
            (None, _, _) => ("DELETE FROM ImageCopyright WHERE imageid=?;", sql_values![image_id]),
            (Some(property), None, _) => (
                "DELETE FROM ImageCopyright WHERE imageid=? AND property=?;",
                sql_values![image_id, property],
            ),
            (Some(property), Some(extra_value), None) => (
                "DELETE FROM ImageCopyright WHERE imageid=? AND property=? AND extraValue=?;",
                sql_values![image_id, property, extra_value],
            ),
            (Some(property), Some(extra_value), Some(value)) => (
                "DELETE FROM ImageCopyright WHERE imageid=? AND property=? AND extraValue=? AND value=?;",
                sql_values![image_id, property, extra_value, value],
            ),
        };
        if !self.exec_ok(sql, values) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Copyright);
        true
    }

    // ========================================================================
    // Free-form properties
    // ========================================================================

    pub fn get_image_property(&self, image_id: i64, property: &str) -> Option<String> {
        self.exec(
            "SELECT value FROM ImageProperties WHERE imageid=? AND property=?;",
            sql_values![image_id, property],
        )?
        .first_value()
        .and_then(SqlValue::as_text)
    }

    pub fn set_image_property(&self, image_id: i64, property: &str, value: &str) -> bool {
        if !self.exec_ok(
            "INSERT INTO ImageProperties (imageid, property, value) VALUES (?, ?, ?) \
             ON CONFLICT (imageid, property) DO UPDATE SET value=excluded.value;",
            sql_values![image_id, property, value],
        ) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Properties);
        true
    }

    pub fn remove_image_property(&self, image_id: i64, property: &str) -> bool {
        if !self.exec_ok(
            "DELETE FROM ImageProperties WHERE imageid=? AND property=?;",
            sql_values![image_id, property],
        ) {
            return false;
        }
        self.notify_fields(image_id, ChangedFields::Properties);
        true
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn has_image_history(&self, image_id: i64) -> bool {
        self.exec(
            "SELECT history FROM ImageHistory WHERE imageid=? AND history IS NOT NULL;",
            sql_values![image_id],
        )
        .is_some_and(|output| !output.is_empty())
    }

    pub fn get_image_history(&self, image_id: i64) -> Option<ImageHistoryEntry> {
        let output = self.exec(
            "SELECT uuid, history FROM ImageHistory WHERE imageid=?;",
            sql_values![image_id],
        )?;
        let entry = output.rows().next().map(|row| ImageHistoryEntry {
            image_id,
            uuid: row[0].to_text(),
            history: row[1].to_text(),
        });
        entry
    }

    /// Live items sharing a history uuid.
    pub fn get_items_for_uuid(&self, uuid: &str) -> Vec<i64> {
        self.query_ids(
            "SELECT imageid FROM ImageHistory INNER JOIN Images ON ImageHistory.imageid=Images.id \
             WHERE uuid=? AND status!=3 ORDER BY imageid;",
            sql_values![uuid],
        )
    }

    pub fn get_image_uuid(&self, image_id: i64) -> Option<String> {
        self.exec("SELECT uuid FROM ImageHistory WHERE imageid=?;", sql_values![image_id])?
            .first_value()
            .and_then(SqlValue::as_text)
            .filter(|uuid| !uuid.is_empty())
    }

    pub fn set_image_history(&self, image_id: i64, history: &str) -> bool {
        self.change_image_history(image_id, "history", history, ChangedFields::History)
    }

    pub fn set_image_uuid(&self, image_id: i64, uuid: &str) -> bool {
        self.change_image_history(image_id, "uuid", uuid, ChangedFields::Uuid)
    }

    fn change_image_history(&self, image_id: i64, column: &str, value: &str, fields: ChangedFields) -> bool {
        if let Err(e) = self.engine().exec_upsert_action(
            names::CHANGE_IMAGE_HISTORY,
            image_id,
            &[column],
            sql_values![value],
        ) {
            warn!("Could not store image {} of {}: {}", column, image_id, e);
            return false;
        }
        self.notify_fields(image_id, fields);
        true
    }
}
