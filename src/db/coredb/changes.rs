//! Change notifications pushed after successful mutations.

use std::sync::Mutex;

use tracing::debug;

use super::fields::ChangedFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    AlbumRoot,
    Album,
    Tag,
    Search,
    Image,
    ImageTag,
    /// Collection-level changes to images (moves, copies, removals).
    CollectionImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Deleted,
    Changed,
    PropertiesChanged,
    Renamed,
    Reparented,
    IconChanged,
    Moved,
    Copied,
    Removed,
    RemovedAll,
    RemovedDeleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub entity: EntityKind,
    pub ids: Vec<i64>,
    /// Secondary ids: albums for image changes, tags for image-tag changes.
    pub related_ids: Vec<i64>,
    pub kind: ChangeKind,
    pub fields: Option<ChangedFields>,
}

impl ChangeNotification {
    pub fn new(entity: EntityKind, ids: Vec<i64>, kind: ChangeKind) -> Self {
        Self {
            entity,
            ids,
            related_ids: Vec::new(),
            kind,
            fields: None,
        }
    }

    pub fn with_related(mut self, related_ids: Vec<i64>) -> Self {
        self.related_ids = related_ids;
        self
    }

    pub fn with_fields(mut self, fields: ChangedFields) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Receives notifications synchronously from inside the mutating call.
pub trait ChangeSink: Send + Sync {
    fn notify(&self, change: ChangeNotification);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn notify(&self, _change: ChangeNotification) {}
}

/// Logs each notification at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ChangeSink for TracingSink {
    fn notify(&self, change: ChangeNotification) {
        debug!(
            entity = ?change.entity,
            kind = ?change.kind,
            ids = ?change.ids,
            related = ?change.related_ids,
            "Database change"
        );
    }
}

/// Keeps every notification; used to observe mutations.
#[derive(Debug, Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<ChangeNotification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded notifications, leaving the sink empty.
    pub fn take(&self) -> Vec<ChangeNotification> {
        std::mem::take(&mut *self.changes.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }
}

impl ChangeSink for RecordingSink {
    fn notify(&self, change: ChangeNotification) {
        self.changes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(change);
    }
}
