//! Directed, typed relations between images (derived versions, groups).

use std::collections::{BTreeSet, HashSet, VecDeque};

use super::changes::{ChangeKind, ChangeNotification, EntityKind};
use super::fields::ChangedFields;
use super::types::{ImageRelation, RelationType};
use super::CoreDb;
use crate::db::value::SqlValue;
use crate::sql_values;

/// `AND type=?` when the relation type narrows the query.
fn type_filter(relation_type: RelationType, values: &mut Vec<SqlValue>) -> &'static str {
    if relation_type == RelationType::UndefinedType {
        ""
    } else {
        values.push(SqlValue::Integer(relation_type.as_i64()));
        " AND type=?"
    }
}

#[derive(Clone, Copy)]
enum Direction {
    /// Images the subject points at.
    From,
    /// Images pointing at the object.
    To,
}

impl CoreDb {
    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_image_relation(&self, subject_id: i64, object_id: i64, relation_type: RelationType) -> bool {
        if !self.exec_ok(
            "INSERT INTO ImageRelations (subject, object, type) VALUES (?, ?, ?) ON CONFLICT DO NOTHING;",
            sql_values![subject_id, object_id, relation_type.as_i64()],
        ) {
            return false;
        }
        self.notify_relations(vec![subject_id, object_id]);
        true
    }

    /// Add one relation per (subject, object) pair.
    pub fn add_image_relations(&self, subject_ids: &[i64], object_ids: &[i64], relation_type: RelationType) -> bool {
        if subject_ids.len() != object_ids.len() {
            tracing::warn!(
                "Relation lists differ in length ({} subjects, {} objects)",
                subject_ids.len(),
                object_ids.len()
            );
            return false;
        }
        if subject_ids.is_empty() {
            return true;
        }

        let columns = vec![
            super::id_values(subject_ids),
            super::id_values(object_ids),
            vec![SqlValue::Integer(relation_type.as_i64()); subject_ids.len()],
        ];
        if !self.exec_bulk(
            "INSERT INTO ImageRelations (subject, object, type) VALUES (?, ?, ?) ON CONFLICT DO NOTHING;",
            &columns,
        ) {
            return false;
        }
        let ids: BTreeSet<i64> = subject_ids.iter().chain(object_ids).copied().collect();
        self.notify_relations(ids.into_iter().collect());
        true
    }

    pub fn add_image_relation_entry(&self, relation: &ImageRelation) -> bool {
        self.add_image_relation(
            relation.subject_id,
            relation.object_id,
            RelationType::from_i64(relation.relation_type),
        )
    }

    pub fn remove_image_relation(&self, subject_id: i64, object_id: i64, relation_type: RelationType) -> bool {
        if !self.exec_ok(
            "DELETE FROM ImageRelations WHERE subject=? AND object=? AND type=?;",
            sql_values![subject_id, object_id, relation_type.as_i64()],
        ) {
            return false;
        }
        self.notify_relations(vec![subject_id, object_id]);
        true
    }

    /// Drop every relation of `relation_type` pointing at `object_id`.
    /// Returns the subjects that lost their relation.
    pub fn remove_all_image_relations_to(&self, object_id: i64, relation_type: RelationType) -> Vec<i64> {
        self.remove_all_relations(object_id, relation_type, Direction::To)
    }

    /// Drop every relation of `relation_type` starting at `subject_id`.
    /// Returns the objects that lost their relation.
    pub fn remove_all_image_relations_from(&self, subject_id: i64, relation_type: RelationType) -> Vec<i64> {
        self.remove_all_relations(subject_id, relation_type, Direction::From)
    }

    fn remove_all_relations(&self, id: i64, relation_type: RelationType, direction: Direction) -> Vec<i64> {
        let related = self.related_images(id, relation_type, direction, false);
        if related.is_empty() {
            return related;
        }

        let key = match direction {
            Direction::From => "subject",
            Direction::To => "object",
        };
        if !self.exec_ok(
            &format!("DELETE FROM ImageRelations WHERE {}=? AND type=?;", key),
            sql_values![id, relation_type.as_i64()],
        ) {
            return Vec::new();
        }

        let mut ids = related.clone();
        ids.push(id);
        self.notify_relations(ids);
        related
    }

    fn notify_relations(&self, ids: Vec<i64>) {
        self.notify(
            ChangeNotification::new(EntityKind::Image, ids, ChangeKind::Changed)
                .with_fields(ChangedFields::Relations),
        );
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Live images `subject_id` points at.
    pub fn get_images_related_from(&self, subject_id: i64, relation_type: RelationType) -> Vec<i64> {
        self.related_images(subject_id, relation_type, Direction::From, false)
    }

    pub fn has_images_related_from(&self, subject_id: i64, relation_type: RelationType) -> bool {
        !self.related_images(subject_id, relation_type, Direction::From, true).is_empty()
    }

    /// Live images pointing at `object_id`.
    pub fn get_images_related_to(&self, object_id: i64, relation_type: RelationType) -> Vec<i64> {
        self.related_images(object_id, relation_type, Direction::To, false)
    }

    pub fn has_images_related_to(&self, object_id: i64, relation_type: RelationType) -> bool {
        !self.related_images(object_id, relation_type, Direction::To, true).is_empty()
    }

    /// Related images for each of `subject_ids`, in input order.
    pub fn get_images_related_from_each(&self, subject_ids: &[i64], relation_type: RelationType) -> Vec<Vec<i64>> {
        subject_ids
            .iter()
            .map(|id| self.related_images(*id, relation_type, Direction::From, false))
            .collect()
    }

    pub fn get_images_related_to_each(&self, object_ids: &[i64], relation_type: RelationType) -> Vec<Vec<i64>> {
        object_ids
            .iter()
            .map(|id| self.related_images(*id, relation_type, Direction::To, false))
            .collect()
    }

    fn related_images(&self, id: i64, relation_type: RelationType, direction: Direction, bounded: bool) -> Vec<i64> {
        let (select, join, key) = match direction {
            Direction::From => ("object", "object", "subject"),
            Direction::To => ("subject", "subject", "object"),
        };
        let mut values = sql_values![id];
        let filter = type_filter(relation_type, &mut values);
        let limit = if bounded { " LIMIT 1" } else { "" };
        self.query_ids(
            &format!(
                "SELECT {} FROM ImageRelations INNER JOIN Images ON ImageRelations.{}=Images.id \
                 WHERE {}=?{} AND status!=3 ORDER BY {}{};",
                select, join, key, filter, select, limit
            ),
            values,
        )
    }

    /// Every relation reachable from `image_id` through edges of
    /// `relation_type` in either direction, as sorted (subject, object)
    /// pairs. Edges touching removed images are not followed.
    pub fn get_relation_cloud(&self, image_id: i64, relation_type: RelationType) -> Vec<(i64, i64)> {
        let mut todo = VecDeque::from([image_id]);
        let mut done = HashSet::new();
        let mut pairs = BTreeSet::new();

        while let Some(id) = todo.pop_front() {
            if !done.insert(id) {
                continue;
            }

            let mut values = sql_values![id, id];
            let filter = type_filter(relation_type, &mut values);
            let Some(output) = self.exec(
                &format!(
                    "SELECT subject, object FROM ImageRelations \
                     INNER JOIN Images AS SubjectImages ON ImageRelations.subject=SubjectImages.id \
                     INNER JOIN Images AS ObjectImages ON ImageRelations.object=ObjectImages.id \
                     WHERE (subject=? OR object=?){} AND SubjectImages.status!=3 AND ObjectImages.status!=3;",
                    filter
                ),
                values,
            ) else {
                continue;
            };

            for row in output.rows() {
                let (subject, object) = (row[0].to_i64(), row[1].to_i64());
                pairs.insert((subject, object));
                for next in [subject, object] {
                    if !done.contains(&next) {
                        todo.push_back(next);
                    }
                }
            }
        }

        pairs.into_iter().collect()
    }

    /// For each id, the id of one live image related to it in either
    /// direction. Ids without such a partner contribute nothing.
    pub fn get_one_related_image_each(&self, image_ids: &[i64], relation_type: RelationType) -> Vec<i64> {
        let mut result = BTreeSet::new();
        for &id in image_ids {
            let mut values = sql_values![id, id];
            let filter = type_filter(relation_type, &mut values);
            let Some(output) = self.exec(
                &format!(
                    "SELECT subject, object FROM ImageRelations \
                     INNER JOIN Images AS SubjectImages ON ImageRelations.subject=SubjectImages.id \
                     INNER JOIN Images AS ObjectImages ON ImageRelations.object=ObjectImages.id \
                     WHERE ((subject=? AND ObjectImages.status!=3) OR (object=? AND SubjectImages.status!=3)){} \
                     LIMIT 1;",
                    filter
                ),
                values,
            ) else {
                continue;
            };
            let first = output.rows().next().map(|row| (row[0].to_i64(), row[1].to_i64()));
            if let Some((subject, object)) = first {
                result.insert(if subject == id { object } else { subject });
            }
        }
        result.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter_skips_undefined() {
        let mut values = sql_values![1];
        assert_eq!(type_filter(RelationType::UndefinedType, &mut values), "");
        assert_eq!(values.len(), 1);

        assert_eq!(type_filter(RelationType::Grouped, &mut values), " AND type=?");
        assert_eq!(values, vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
    }
}
