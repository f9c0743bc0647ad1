//! Tags, tag properties and tag assignments.

use std::collections::BTreeMap;

use tracing::debug;

use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::types::{ImageTagProperty, TagInfo, TagProperty, TagShortInfo};
use super::{id_values, lock_unpoisoned, placeholders, CoreDb};
use crate::bindings;
use crate::db::actions::names;
use crate::db::value::SqlValue;
use crate::sql_values;

/// Tags carrying this property are bookkeeping tags and never enter the
/// recently-assigned list.
pub const INTERNAL_TAG_PROPERTY: &str = "internalTag";

const RECENT_TAGS_SETTING: &str = "RecentlyAssignedTags";
const MAX_RECENT_TAGS: usize = 10;

impl CoreDb {
    // ========================================================================
    // Tags
    // ========================================================================

    pub fn scan_tags(&self) -> Vec<TagInfo> {
        let Some(output) = self.exec("SELECT id, pid, name, icon, iconkde FROM Tags ORDER BY id;", Vec::new())
        else {
            return Vec::new();
        };
        output.rows().map(tag_info).collect()
    }

    pub fn get_tag_info(&self, tag_id: i64) -> Option<TagInfo> {
        let output = self.exec(
            "SELECT id, pid, name, icon, iconkde FROM Tags WHERE id=?;",
            sql_values![tag_id],
        )?;
        let info = output.rows().next().map(tag_info);
        info
    }

    pub fn get_tag_short_infos(&self) -> Vec<TagShortInfo> {
        let Some(output) = self.exec("SELECT id, pid, name FROM Tags ORDER BY id;", Vec::new()) else {
            return Vec::new();
        };
        output
            .rows()
            .map(|row| TagShortInfo {
                id: row[0].to_i64(),
                pid: row[1].to_i64(),
                name: row[2].to_text(),
            })
            .collect()
    }

    /// Add a tag below `parent_id` (0 for top level). A non-empty
    /// `icon_kde` wins over `icon_id`.
    pub fn add_tag(&self, parent_id: i64, name: &str, icon_kde: &str, icon_id: Option<i64>) -> Option<i64> {
        let engine = self.engine();
        let _access = engine.access();
        let transaction = engine.transaction().ok()?;
        let output = self.exec_action(
            names::INSERT_TAG,
            &bindings! { ":tagPID" => parent_id, ":tagname" => name },
        )?;
        let id = Self::inserted_id(&output)?;

        if !icon_kde.is_empty() {
            self.exec("UPDATE Tags SET iconkde=? WHERE id=?;", sql_values![icon_kde, id])?;
        } else if let Some(icon_id) = icon_id.filter(|icon| *icon != 0) {
            self.exec("UPDATE Tags SET icon=? WHERE id=?;", sql_values![icon_id, id])?;
        }
        transaction.commit().ok()?;

        self.notify(ChangeNotification::new(EntityKind::Tag, vec![id], ChangeKind::Added));
        Some(id)
    }

    /// Delete a tag and its whole subtree.
    pub fn delete_tag(&self, tag_id: i64) -> bool {
        if self
            .exec_action(names::DELETE_TAG, &bindings! { ":tagID" => tag_id })
            .is_none()
        {
            return false;
        }
        lock_unpoisoned(&self.recent_tags).retain(|id| *id != tag_id);
        self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::Deleted));
        true
    }

    /// Set either a named icon or an image icon; the other one is cleared.
    pub fn set_tag_icon(&self, tag_id: i64, icon_kde: &str, icon_id: Option<i64>) -> bool {
        let icon_id = icon_id.filter(|icon| *icon != 0);
        let ok = if icon_kde.is_empty() || icon_id.is_some() {
            self.exec_ok(
                "UPDATE Tags SET iconkde=NULL, icon=? WHERE id=?;",
                sql_values![icon_id, tag_id],
            )
        } else {
            self.exec_ok(
                "UPDATE Tags SET iconkde=?, icon=NULL WHERE id=?;",
                sql_values![icon_kde, tag_id],
            )
        };
        if ok {
            self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::IconChanged));
        }
        ok
    }

    pub fn set_tag_parent_id(&self, tag_id: i64, parent_id: i64) -> bool {
        if !self.exec_ok("UPDATE Tags SET pid=? WHERE id=?;", sql_values![parent_id, tag_id]) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::Reparented));
        true
    }

    pub fn set_tag_name(&self, tag_id: i64, name: &str) -> bool {
        if !self.exec_ok("UPDATE Tags SET name=? WHERE id=?;", sql_values![name, tag_id]) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::Renamed));
        true
    }

    /// Visible item count per tag id.
    pub fn get_number_of_images_in_tags(&self) -> BTreeMap<i64, i64> {
        let Some(output) = self.exec(
            "SELECT tagid, COUNT(*) FROM ImageTags \
             INNER JOIN Images ON Images.id=ImageTags.imageid \
             WHERE Images.status=1 GROUP BY tagid;",
            Vec::new(),
        ) else {
            return BTreeMap::new();
        };
        output
            .rows()
            .map(|row| (row[0].to_i64(), row[1].to_i64()))
            .collect()
    }

    // ========================================================================
    // Tag properties
    // ========================================================================

    pub fn get_tag_properties(&self, tag_id: i64) -> Vec<TagProperty> {
        self.tag_properties(
            "SELECT tagid, property, value FROM TagProperties WHERE tagid=? ORDER BY property, value;",
            sql_values![tag_id],
        )
    }

    pub fn get_tag_properties_by_name(&self, property: &str) -> Vec<TagProperty> {
        self.tag_properties(
            "SELECT tagid, property, value FROM TagProperties WHERE property=? ORDER BY tagid, value;",
            sql_values![property],
        )
    }

    pub fn get_all_tag_properties(&self) -> Vec<TagProperty> {
        self.tag_properties(
            "SELECT tagid, property, value FROM TagProperties ORDER BY tagid, property, value;",
            Vec::new(),
        )
    }

    fn tag_properties(&self, sql: &str, values: Vec<SqlValue>) -> Vec<TagProperty> {
        let Some(output) = self.exec(sql, values) else {
            return Vec::new();
        };
        output
            .rows()
            .map(|row| TagProperty {
                tag_id: row[0].to_i64(),
                property: row[1].to_text(),
                value: row[2].to_text(),
            })
            .collect()
    }

    pub fn get_tags_with_property(&self, property: &str) -> Vec<i64> {
        self.query_ids(
            "SELECT DISTINCT tagid FROM TagProperties WHERE property=? ORDER BY tagid;",
            sql_values![property],
        )
    }

    pub fn is_internal_tag(&self, tag_id: i64) -> bool {
        self.exec(
            "SELECT tagid FROM TagProperties WHERE tagid=? AND property=? LIMIT 1;",
            sql_values![tag_id, INTERNAL_TAG_PROPERTY],
        )
        .is_some_and(|output| !output.is_empty())
    }

    /// Add a property value; a key may hold several values.
    pub fn add_tag_property(&self, tag_id: i64, property: &str, value: &str) -> bool {
        if !self.exec_ok(
            "INSERT INTO TagProperties (tagid, property, value) VALUES (?, ?, ?);",
            sql_values![tag_id, property, value],
        ) {
            return false;
        }
        self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::PropertiesChanged));
        true
    }

    /// Remove all properties of a tag, all values of one property, or one
    /// property value, depending on which filters are given.
    pub fn remove_tag_properties(&self, tag_id: i64, property: Option<&str>, value: Option<&str>) -> bool {
        let ok = match (property, value) {
            (None, _) => self.exec_ok("DELETE FROM TagProperties WHERE tagid=?;", sql_values![tag_id]),
            (Some(property), None) => self.exec_ok(
                "DELETE FROM TagProperties WHERE tagid=? AND property=?;",
                sql_values![tag_id, property],
            ),
            (Some(property), Some(value)) => self.exec_ok(
                "DELETE FROM TagProperties WHERE tagid=? AND property=? AND value=?;",
                sql_values![tag_id, property, value],
            ),
        };
        if ok {
            self.notify(ChangeNotification::new(EntityKind::Tag, vec![tag_id], ChangeKind::PropertiesChanged));
        }
        ok
    }

    // ========================================================================
    // Tag assignments
    // ========================================================================

    /// Assign a tag to an item. Unless the tag was just created or is
    /// internal, it moves to the front of the recently assigned list.
    pub fn add_item_tag(&self, image_id: i64, tag_id: i64, new_tag: bool) -> bool {
        if !self.exec_ok(
            "INSERT INTO ImageTags (imageid, tagid) VALUES (?, ?) ON CONFLICT DO NOTHING;",
            sql_values![image_id, tag_id],
        ) {
            return false;
        }

        if !new_tag && !self.is_internal_tag(tag_id) {
            self.remember_recent_tag(tag_id);
        }

        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::Added)
                .with_related(vec![tag_id]),
        );
        true
    }

    /// Assign every tag in `tag_ids` to every item in `image_ids`.
    pub fn add_tags_to_items(&self, image_ids: &[i64], tag_ids: &[i64]) -> bool {
        if image_ids.is_empty() || tag_ids.is_empty() {
            return true;
        }
        let (images, tags) = cross_columns(image_ids, tag_ids);
        if !self.exec_bulk(
            "INSERT INTO ImageTags (imageid, tagid) VALUES (?, ?) ON CONFLICT DO NOTHING;",
            &[images, tags],
        ) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, image_ids.to_vec(), ChangeKind::Added)
                .with_related(tag_ids.to_vec()),
        );
        true
    }

    pub fn remove_item_tag(&self, image_id: i64, tag_id: i64) -> bool {
        if !self.exec_ok(
            "DELETE FROM ImageTags WHERE imageid=? AND tagid=?;",
            sql_values![image_id, tag_id],
        ) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::Removed)
                .with_related(vec![tag_id]),
        );
        true
    }

    pub fn remove_item_all_tags(&self, image_id: i64) -> bool {
        let current = self.get_item_tag_ids(image_id);
        if current.is_empty() {
            return true;
        }
        if !self.exec_ok("DELETE FROM ImageTags WHERE imageid=?;", sql_values![image_id]) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::RemovedAll)
                .with_related(current),
        );
        true
    }

    pub fn remove_tags_from_items(&self, image_ids: &[i64], tag_ids: &[i64]) -> bool {
        if image_ids.is_empty() || tag_ids.is_empty() {
            return true;
        }
        let (images, tags) = cross_columns(image_ids, tag_ids);
        if !self.exec_bulk("DELETE FROM ImageTags WHERE imageid=? AND tagid=?;", &[images, tags]) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, image_ids.to_vec(), ChangeKind::Removed)
                .with_related(tag_ids.to_vec()),
        );
        true
    }

    pub fn get_item_tag_ids(&self, image_id: i64) -> Vec<i64> {
        self.query_ids(
            "SELECT tagid FROM ImageTags WHERE imageid=? ORDER BY tagid;",
            sql_values![image_id],
        )
    }

    pub fn get_item_tag_names(&self, image_id: i64) -> Vec<String> {
        self.exec(
            "SELECT Tags.name FROM ImageTags INNER JOIN Tags ON ImageTags.tagid=Tags.id \
             WHERE ImageTags.imageid=? ORDER BY Tags.name;",
            sql_values![image_id],
        )
        .map(|output| output.strings())
        .unwrap_or_default()
    }

    /// Tag ids per item, in the order of `image_ids`.
    pub fn get_items_tag_ids(&self, image_ids: &[i64]) -> Vec<Vec<i64>> {
        image_ids.iter().map(|id| self.get_item_tag_ids(*id)).collect()
    }

    /// Whether any of the items has a tag.
    pub fn has_tags(&self, image_ids: &[i64]) -> bool {
        self.id_chunks(image_ids, 0).any(|chunk| {
            self.exec(
                &format!("SELECT imageid FROM ImageTags WHERE imageid IN ({}) LIMIT 1;", placeholders(chunk.len())),
                id_values(chunk),
            )
            .is_some_and(|output| !output.is_empty())
        })
    }

    /// Tags assigned to any of the items.
    pub fn get_item_common_tag_ids(&self, image_ids: &[i64]) -> Vec<i64> {
        let mut tags = std::collections::BTreeSet::new();
        for chunk in self.id_chunks(image_ids, 0) {
            tags.extend(self.query_ids(
                &format!("SELECT DISTINCT tagid FROM ImageTags WHERE imageid IN ({});", placeholders(chunk.len())),
                id_values(chunk),
            ));
        }
        tags.into_iter().collect()
    }

    /// Items carrying `tag_id`; with `recursive`, also items carrying any
    /// tag below it.
    pub fn get_item_ids_in_tag(&self, tag_id: i64, recursive: bool) -> Vec<i64> {
        if recursive {
            self.query_ids(
                "WITH RECURSIVE subtree(id) AS \
                   (SELECT CAST(? AS BIGINT) UNION SELECT Tags.id FROM Tags JOIN subtree ON Tags.pid=subtree.id) \
                 SELECT DISTINCT ImageTags.imageid FROM ImageTags \
                 INNER JOIN Images ON Images.id=ImageTags.imageid \
                 WHERE ImageTags.tagid IN (SELECT id FROM subtree) AND Images.status!=3 \
                 ORDER BY ImageTags.imageid;",
                sql_values![tag_id],
            )
        } else {
            self.query_ids(
                "SELECT ImageTags.imageid FROM ImageTags \
                 INNER JOIN Images ON Images.id=ImageTags.imageid \
                 WHERE ImageTags.tagid=? AND Images.status!=3 ORDER BY ImageTags.imageid;",
                sql_values![tag_id],
            )
        }
    }

    // ========================================================================
    // Recently assigned tags
    // ========================================================================

    /// Most recently assigned tags, newest first.
    pub fn recently_assigned_tags(&self) -> Vec<i64> {
        lock_unpoisoned(&self.recent_tags).clone()
    }

    fn remember_recent_tag(&self, tag_id: i64) {
        let joined = {
            let mut recent = lock_unpoisoned(&self.recent_tags);
            recent.retain(|id| *id != tag_id);
            recent.insert(0, tag_id);
            recent.truncate(MAX_RECENT_TAGS);
            recent.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
        };
        self.set_setting(RECENT_TAGS_SETTING, &joined);
    }

    pub(super) fn load_recent_tags(&self) {
        let stored = self.get_setting(RECENT_TAGS_SETTING).unwrap_or_default();
        let mut ids: Vec<i64> = stored
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect();
        ids.truncate(MAX_RECENT_TAGS);
        debug!("Loaded {} recently assigned tags", ids.len());
        *lock_unpoisoned(&self.recent_tags) = ids;
    }

    // ========================================================================
    // Item tag properties
    // ========================================================================

    /// Properties of an item's tags; `tag_id` narrows to one tag.
    pub fn get_image_tag_properties(&self, image_id: i64, tag_id: Option<i64>) -> Vec<ImageTagProperty> {
        match tag_id {
            Some(tag_id) => self.image_tag_properties(
                "SELECT imageid, tagid, property, value FROM ImageTagProperties \
                 WHERE imageid=? AND tagid=? ORDER BY property, value;",
                sql_values![image_id, tag_id],
            ),
            None => self.image_tag_properties(
                "SELECT imageid, tagid, property, value FROM ImageTagProperties \
                 WHERE imageid=? ORDER BY tagid, property, value;",
                sql_values![image_id],
            ),
        }
    }

    pub fn get_tag_ids_with_properties(&self, image_id: i64) -> Vec<i64> {
        self.query_ids(
            "SELECT DISTINCT tagid FROM ImageTagProperties WHERE imageid=? ORDER BY tagid;",
            sql_values![image_id],
        )
    }

    fn image_tag_properties(&self, sql: &str, values: Vec<SqlValue>) -> Vec<ImageTagProperty> {
        let Some(output) = self.exec(sql, values) else {
            return Vec::new();
        };
        output
            .rows()
            .map(|row| ImageTagProperty {
                image_id: row[0].to_i64(),
                tag_id: row[1].to_i64(),
                property: row[2].to_text(),
                value: row[3].to_text(),
            })
            .collect()
    }

    /// Add a property value to an item's tag. Adding the same value twice
    /// keeps one row.
    pub fn add_image_tag_property(&self, image_id: i64, tag_id: i64, property: &str, value: &str) -> bool {
        if !self.exec_ok(
            "INSERT INTO ImageTagProperties (imageid, tagid, property, value) VALUES (?, ?, ?, ?) \
             ON CONFLICT DO NOTHING;",
            sql_values![image_id, tag_id, property, value],
        ) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::PropertiesChanged)
                .with_related(vec![tag_id]),
        );
        true
    }

    /// Replace all values of `property` on an item's tag with `value`.
    pub fn set_image_tag_property(&self, image_id: i64, tag_id: i64, property: &str, value: &str) -> bool {
        let engine = self.engine();
        let _access = engine.access();
        let Ok(transaction) = engine.transaction() else {
            return false;
        };
        if !self.exec_ok(
            "DELETE FROM ImageTagProperties WHERE imageid=? AND tagid=? AND property=?;",
            sql_values![image_id, tag_id, property],
        ) || !self.exec_ok(
            "INSERT INTO ImageTagProperties (imageid, tagid, property, value) VALUES (?, ?, ?, ?);",
            sql_values![image_id, tag_id, property, value],
        ) {
            return false;
        }
        if transaction.commit().is_err() {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::PropertiesChanged)
                .with_related(vec![tag_id]),
        );
        true
    }

    pub fn remove_image_tag_properties(
        &self,
        image_id: i64,
        tag_id: Option<i64>,
        property: Option<&str>,
        value: Option<&str>,
    ) -> bool {
        let (sql, values) = match (tag_id, property, value) {
            (None, _, _) => (
                "DELETE FROM ImageTagProperties WHERE imageid=?;",
                sql_values![image_id],
            ),
            (Some(tag_id), None, _) => (
                "DELETE FROM ImageTagProperties WHERE imageid=? AND tagid=?;",
                sql_values![image_id, tag_id],
            ),
            (Some(tag_id), Some(property), None) => (
                "DELETE FROM ImageTagProperties WHERE imageid=? AND tagid=? AND property=?;",
                sql_values![image_id, tag_id, property],
            ),
            (Some(tag_id), Some(property), Some(value)) => (
                "DELETE FROM ImageTagProperties WHERE imageid=? AND tagid=? AND property=? AND value=?;",
                sql_values![image_id, tag_id, property, value],
            ),
        };
        if !self.exec_ok(sql, values) {
            return false;
        }
        self.notify(
            ChangeNotification::new(EntityKind::ImageTag, vec![image_id], ChangeKind::PropertiesChanged)
                .with_related(tag_id.into_iter().collect()),
        );
        true
    }
}

fn tag_info(row: &[SqlValue]) -> TagInfo {
    TagInfo {
        id: row[0].to_i64(),
        pid: row[1].to_i64(),
        name: row[2].to_text(),
        icon_id: row[3].as_ref_id(),
        icon_kde: row[4].to_text(),
    }
}

/// Column-oriented cross product: one row per (image, tag) pair.
fn cross_columns(image_ids: &[i64], tag_ids: &[i64]) -> (Vec<SqlValue>, Vec<SqlValue>) {
    let mut images = Vec::with_capacity(image_ids.len() * tag_ids.len());
    let mut tags = Vec::with_capacity(images.capacity());
    for image_id in image_ids {
        for tag_id in tag_ids {
            images.push(SqlValue::Integer(*image_id));
            tags.push(SqlValue::Integer(*tag_id));
        }
    }
    (images, tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_columns_pairs_every_image_with_every_tag() {
        let (images, tags) = cross_columns(&[1, 2], &[10, 20]);
        assert_eq!(images, sql_values![1i64, 1i64, 2i64, 2i64]);
        assert_eq!(tags, sql_values![10i64, 20i64, 10i64, 20i64]);
    }
}
