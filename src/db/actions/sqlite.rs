//! Action table for the embedded SQLite engine.

use super::names::*;
use super::{ActionElement, ActionMode, DbAction};
use crate::db::schema::SCHEMA;

pub const ACTIONS: &[DbAction] = &[
    DbAction {
        name: CREATE_CORE_DB,
        mode: ActionMode::Transaction,
        elements: &[ActionElement::direct(SCHEMA)],
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
            "INSERT INTO Tags (pid, name) VALUES (:tagPID, :tagname);",
        )],
    },
    DbAction {
        name: DELETE_TAG,
        mode: ActionMode::Transaction,
        elements: &[ActionElement::query(
            "DELETE FROM Tags WHERE id IN \
             (WITH RECURSIVE subtree(id) AS \
                (SELECT :tagID UNION SELECT Tags.id FROM Tags JOIN subtree ON Tags.pid=subtree.id) \
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
        elements: &[ActionElement::unprepared("PRAGMA integrity_check;")],
    },
    DbAction {
        name: VACUUM,
        mode: ActionMode::Plain,
        elements: &[ActionElement::direct("VACUUM;")],
    },
];
