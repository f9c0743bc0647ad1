//! Named multi-statement database actions.
//!
//! Each engine carries a static catalog of actions. An action is a list of
//! statements, optionally wrapped in a single transaction. The facade runs
//! actions by name so engine-specific SQL (cascading deletes, upserts,
//! integrity checks) lives here rather than in the accessors.

mod binding;
pub mod postgres;
pub mod sqlite;

pub use binding::{resolve, Binding, BindingMap, ResolvedStatement};

use tracing::warn;

use super::DatabaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    /// Statements run one by one.
    Plain,
    /// All statements run in one transaction; the first failure rolls back.
    Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMode {
    /// Prepared with the binding map applied.
    Query,
    /// Run as-is and keep the rows it returns.
    Unprepared,
    /// Run as-is, result ignored.
    FireAndForget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionElement {
    pub mode: ElementMode,
    pub statement: &'static str,
}

impl ActionElement {
    pub const fn query(statement: &'static str) -> Self {
        Self {
            mode: ElementMode::Query,
            statement,
        }
    }

    pub const fn unprepared(statement: &'static str) -> Self {
        Self {
            mode: ElementMode::Unprepared,
            statement,
        }
    }

    pub const fn direct(statement: &'static str) -> Self {
        Self {
            mode: ElementMode::FireAndForget,
            statement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbAction {
    pub name: &'static str,
    pub mode: ActionMode,
    pub elements: &'static [ActionElement],
}

/// Action names the metadata store relies on.
pub mod names {
    pub const CREATE_CORE_DB: &str = "CreateCoreDB";
    pub const DELETE_ALBUM_ROOT: &str = "deleteAlbumRoot";
    pub const DELETE_ALBUM_ID: &str = "deleteAlbumID";
    pub const DELETE_ALBUM_ROOT_PATH: &str = "deleteAlbumRootPath";
    pub const INSERT_TAG: &str = "InsertTag";
    pub const DELETE_TAG: &str = "DeleteTag";
    pub const CHANGE_IMAGE_INFORMATION: &str = "changeImageInformation";
    pub const CHANGE_IMAGE_HISTORY: &str = "changeImageHistory";
    pub const CHECK_INTEGRITY: &str = "checkCoreDbIntegrity";
    pub const VACUUM: &str = "vacuumCoreDB";
}

/// The action table of one engine type.
#[derive(Debug, Clone, Copy)]
pub struct ActionCatalog {
    database_type: DatabaseType,
    actions: &'static [DbAction],
}

impl ActionCatalog {
    pub fn for_engine(database_type: DatabaseType) -> Self {
        let actions = match database_type {
            DatabaseType::Sqlite => sqlite::ACTIONS,
            DatabaseType::Postgresql => postgres::ACTIONS,
        };
        Self {
            database_type,
            actions,
        }
    }

    /// Look up an action; a missing name is a setup error and is logged.
    pub fn get(&self, name: &str) -> Option<&'static DbAction> {
        let found = self.actions.iter().find(|action| action.name == name);
        if found.is_none() {
            warn!(
                "No DB action defined for {}! Implementation missing for this database type ({}).",
                name,
                self.database_type.name()
            );
        }
        found
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.actions.iter().map(|action| action.name)
    }
}
