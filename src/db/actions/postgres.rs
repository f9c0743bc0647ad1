//! Action table for the PostgreSQL engine.
//!
//! Image children cascade through foreign keys, so the deletes here only
//! touch images, albums and roots. The integrity check reports one
//! `(table, op, msg_type, msg_text)` row per index.

use super::names::*;
use super::{ActionElement, ActionMode, DbAction};
use crate::db::postgres_schema::POSTGRES_SCHEMA;

pub const ACTIONS: &[DbAction] = &[
    DbAction {
        name: CREATE_CORE_DB,
        mode: ActionMode::Transaction,
        elements: &[ActionElement::direct(POSTGRES_SCHEMA)],
    },
    DbAction {
        name: DELETE_ALBUM_ROOT,
        mode: ActionMode::Transaction,
        elements: &[
            ActionElement::query(
                "DELETE FROM Images WHERE album IN (SELECT id FROM Albums WHERE albumRoot=:albumRoot);",
            ),
            ActionElement::query("DELETE FROM Albums WHERE albumRoot=:albumRoot;"),
            ActionElement::query("DELETE FROM AlbumRoots WHERE id=:albumRoot;"),
        ],
    },
    DbAction {
        name: DELETE_ALBUM_ID,
        mode: ActionMode::Transaction,
        elements: &[
            ActionElement::query("DELETE FROM Images WHERE album=:albumId;"),
            ActionElement::query("DELETE FROM Albums WHERE id=:albumId;"),
        ],
    },
    DbAction {
        name: DELETE_ALBUM_ROOT_PATH,
        mode: ActionMode::Transaction,
        elements: &[
            ActionElement::query(
                "DELETE FROM Images WHERE album IN \
                 (SELECT id FROM Albums WHERE albumRoot=:albumRoot AND relativePath=:relativePath);",
            ),
            ActionElement::query(
                "DELETE FROM Albums WHERE albumRoot=:albumRoot AND relativePath=:relativePath;",
            ),
        ],
    },
    DbAction {
        name: INSERT_TAG,
        mode: ActionMode::Plain,
        elements: &[ActionElement::query(
            "INSERT INTO Tags (pid, name) VALUES (:tagPID, :tagname) RETURNING id;",
        )],
    },
    DbAction {
        name: DELETE_TAG,
        mode: ActionMode::Transaction,
        elements: &[ActionElement::query(
            "DELETE FROM Tags WHERE id IN \
             (WITH RECURSIVE subtree(id) AS \
                (SELECT CAST(:tagID AS BIGINT) UNION SELECT Tags.id FROM Tags JOIN subtree ON Tags.pid=subtree.id) \
              SELECT id FROM subtree);",
        )],
    },
    DbAction {
        name: CHANGE_IMAGE_INFORMATION,
        mode: ActionMode::Plain,
        elements: &[ActionElement::query(
            "INSERT INTO ImageInformation (imageid, :fieldList) VALUES (:id, :valueList) \
             ON CONFLICT (imageid) DO UPDATE SET :fieldValueList;",
        )],
    },
    DbAction {
        name: CHANGE_IMAGE_HISTORY,
        mode: ActionMode::Plain,
        elements: &[ActionElement::query(
            "INSERT INTO ImageHistory (imageid, :fieldList) VALUES (:id, :valueList) \
             ON CONFLICT (imageid) DO UPDATE SET :fieldValueList;",
        )],
    },
    DbAction {
        name: CHECK_INTEGRITY,
        mode: ActionMode::Plain,
        elements: &[ActionElement::unprepared(
            "SELECT t.relname, 'check', 'status', \
                    CASE WHEN i.indisvalid AND i.indisready THEN 'OK' ELSE 'invalid index ' || c.relname END \
             FROM pg_index i \
             JOIN pg_class c ON c.oid = i.indexrelid \
             JOIN pg_class t ON t.oid = i.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE n.nspname = current_schema() \
             ORDER BY t.relname;",
        )],
    },
    DbAction {
        name: VACUUM,
        mode: ActionMode::Plain,
        elements: &[ActionElement::direct("VACUUM ANALYZE;")],
    },
];
