//! Records and enumerations returned by the metadata store.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

macro_rules! int_enum {
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
        pub enum $name {
            #[default]
            $($variant = $value),+
        }

        impl $name {
            pub fn from_i64(value: i64) -> Self {
                match value {
                    $(v if v == $value => $name::$variant,)+
                    _ => Self::default(),
                }
            }

            pub fn as_i64(self) -> i64 {
                self as i64
            }
        }
    };
}

int_enum! {
    /// Lifecycle of an image row.
    pub enum ItemStatus {
        UndefinedStatus = 0,
        Visible = 1,
        Trashed = 2,
        Obsolete = 3,
    }
}

int_enum! {
    pub enum ItemCategory {
        UndefinedCategory = 0,
        Image = 1,
        Video = 2,
        Audio = 3,
        Other = 4,
    }
}

int_enum! {
    /// Kind of volume an album root lives on.
    pub enum AlbumRootType {
        UndefinedType = 0,
        LocalWritable = 1,
        Removable = 2,
        Network = 3,
    }
}

int_enum! {
    pub enum AlbumRootStatus {
        LocationAvailable = 0,
        LocationHidden = 1,
        LocationUnavailable = 2,
    }
}

int_enum! {
    /// Relation between two images. `UndefinedType` matches any type in queries.
    pub enum RelationType {
        UndefinedType = 0,
        DerivedFrom = 1,
        Grouped = 2,
    }
}

int_enum! {
    pub enum SearchType {
        UndefinedType = 0,
        KeywordSearch = 1,
        AdvancedSearch = 2,
        LegacyUrlSearch = 3,
        TimeLineSearch = 4,
        HaarSearch = 5,
        MapSearch = 6,
        DuplicatesSearch = 7,
    }
}

int_enum! {
    pub enum CommentType {
        UndefinedType = 0,
        Comment = 1,
        Headline = 2,
        Title = 3,
    }
}

/// How `set_image_copyright_property` treats existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyrightUniqueness {
    /// Only one value per property.
    PropertyUnique,
    /// Only one value per property and extra value (e.g. per language).
    PropertyExtraValueUnique,
    PropertyNoConstraint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumRootInfo {
    pub id: i64,
    pub label: String,
    pub status: AlbumRootStatus,
    pub root_type: AlbumRootType,
    pub identifier: String,
    pub specific_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumInfo {
    pub id: i64,
    pub album_root_id: i64,
    pub relative_path: String,
    pub date: Option<NaiveDate>,
    pub caption: String,
    pub category: String,
    pub icon_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumShortInfo {
    pub id: i64,
    pub album_root_id: i64,
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagInfo {
    pub id: i64,
    pub pid: i64,
    pub name: String,
    pub icon_id: Option<i64>,
    pub icon_kde: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagShortInfo {
    pub id: i64,
    pub pid: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagProperty {
    pub tag_id: i64,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageTagProperty {
    pub image_id: i64,
    pub tag_id: i64,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchInfo {
    pub id: i64,
    pub search_type: SearchType,
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemShortInfo {
    pub id: i64,
    pub name: String,
    pub album_id: i64,
    pub album_root_id: i64,
    pub album: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemScanInfo {
    pub id: i64,
    pub album_id: Option<i64>,
    pub name: String,
    pub status: ItemStatus,
    pub category: ItemCategory,
    pub modification_date: Option<NaiveDateTime>,
    pub file_size: i64,
    pub unique_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentInfo {
    pub id: i64,
    pub image_id: i64,
    pub comment_type: CommentType,
    pub language: String,
    pub author: String,
    pub date: Option<NaiveDateTime>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyrightInfo {
    pub id: i64,
    pub image_id: i64,
    pub property: String,
    pub value: String,
    pub extra_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ImageHistoryEntry {
    pub image_id: i64,
    pub uuid: String,
    pub history: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ImageRelation {
    pub subject_id: i64,
    pub object_id: i64,
    pub relation_type: i64,
}
