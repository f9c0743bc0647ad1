//! Keyword/value settings and the bookkeeping stored in them: file
//! format filters, the database UUID, the unique-hash version and the
//! download history.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{lock_unpoisoned, CoreDb};
use crate::db::value::SqlValue;
use crate::sql_values;

const IMAGE_FORMATS: &str = "databaseImageFormats";
const VIDEO_FORMATS: &str = "databaseVideoFormats";
const AUDIO_FORMATS: &str = "databaseAudioFormats";
const IGNORE_DIRECTORY_FORMATS: &str = "databaseIgnoreDirectoryFormats";
const USER_IMAGE_FORMATS: &str = "databaseUserImageFormats";
const USER_VIDEO_FORMATS: &str = "databaseUserVideoFormats";
const USER_AUDIO_FORMATS: &str = "databaseUserAudioFormats";
const USER_IGNORE_DIRECTORY_FORMATS: &str = "databaseUserIgnoreDirectoryFormats";
const FILTER_SETTINGS_VERSION: &str = "FilterSettingsVersion";
const DATABASE_UUID: &str = "databaseUUID";
const UNIQUE_HASH_VERSION: &str = "uniqueHashVersion";

/// Bump when the default lists below change so existing databases pick
/// them up on the next start.
const CURRENT_FILTER_SETTINGS_VERSION: i64 = 1;

const DEFAULT_IMAGE_FORMATS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jp2", "j2k", "jpx", "jpc", "pgx", "tif", "tiff", "png", "gif", "xpm", "ppm",
    "pnm", "pgf", "bmp", "xcf", "pcx", "webp", "heic", "heif", "avif", "3fr", "arw", "cr2", "cr3",
    "crw", "dng", "erf", "kdc", "mrw", "nef", "nrw", "orf", "pef", "raf", "raw", "rw2", "rwl", "sr2",
    "srf", "srw", "x3f",
];
const DEFAULT_VIDEO_FORMATS: &[&str] = &[
    "mpeg", "mpg", "mpo", "mpe", "mts", "vob", "avi", "divx", "wmv", "wmf", "asf", "mp4", "3gp",
    "mov", "3g2", "m4v", "m2v", "mkv", "webm", "mng",
];
const DEFAULT_AUDIO_FORMATS: &[&str] = &[
    "ogg", "oga", "flac", "wv", "ape", "mpc", "au", "m4b", "aax", "aa", "mp3", "aac", "m4a", "m4p",
    "caf", "aiff", "wma", "wav",
];
const DEFAULT_IGNORE_DIRECTORIES: &[&str] = &["@eaDir"];

/// File-suffix filter lists, one per media category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSettings {
    pub image: Vec<String>,
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

impl CoreDb {
    // ========================================================================
    // Raw settings
    // ========================================================================

    pub fn get_setting(&self, keyword: &str) -> Option<String> {
        self.exec("SELECT value FROM Settings WHERE keyword=?;", sql_values![keyword])?
            .first_value()
            .and_then(SqlValue::as_text)
    }

    pub fn set_setting(&self, keyword: &str, value: &str) -> bool {
        self.exec_ok(
            "INSERT INTO Settings (keyword, value) VALUES (?, ?) \
             ON CONFLICT (keyword) DO UPDATE SET value=excluded.value;",
            sql_values![keyword, value],
        )
    }

    // ========================================================================
    // Format filters
    // ========================================================================

    /// Write the default filter lists when the database has none or an
    /// older version of them.
    pub(super) fn update_filter_settings(&self) {
        let version = self
            .get_setting(FILTER_SETTINGS_VERSION)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);
        if version >= CURRENT_FILTER_SETTINGS_VERSION {
            return;
        }

        let defaults = FilterSettings {
            image: to_strings(DEFAULT_IMAGE_FORMATS),
            video: to_strings(DEFAULT_VIDEO_FORMATS),
            audio: to_strings(DEFAULT_AUDIO_FORMATS),
        };
        if self.set_filter_settings(&defaults)
            && self.set_ignore_directory_filter_settings(&to_strings(DEFAULT_IGNORE_DIRECTORIES))
        {
            self.set_setting(FILTER_SETTINGS_VERSION, &CURRENT_FILTER_SETTINGS_VERSION.to_string());
            info!("Initialized file suffix filters (version {})", CURRENT_FILTER_SETTINGS_VERSION);
        }
    }

    /// Effective filters: the base lists merged with the user overrides.
    pub fn get_filter_settings(&self) -> FilterSettings {
        FilterSettings {
            image: self.merged_filter(IMAGE_FORMATS, USER_IMAGE_FORMATS),
            video: self.merged_filter(VIDEO_FORMATS, USER_VIDEO_FORMATS),
            audio: self.merged_filter(AUDIO_FORMATS, USER_AUDIO_FORMATS),
        }
    }

    /// The raw user override strings, `;`-joined.
    pub fn get_user_filter_settings(&self) -> (String, String, String) {
        (
            self.get_setting(USER_IMAGE_FORMATS).unwrap_or_default(),
            self.get_setting(USER_VIDEO_FORMATS).unwrap_or_default(),
            self.get_setting(USER_AUDIO_FORMATS).unwrap_or_default(),
        )
    }

    pub fn set_filter_settings(&self, filters: &FilterSettings) -> bool {
        self.set_setting(IMAGE_FORMATS, &filters.image.join(";"))
            && self.set_setting(VIDEO_FORMATS, &filters.video.join(";"))
            && self.set_setting(AUDIO_FORMATS, &filters.audio.join(";"))
    }

    /// Store user overrides. Each string may use `;` or spaces as
    /// separator and `*.` wildcards; a leading `-` removes a base entry.
    pub fn set_user_filter_settings(&self, image: &str, video: &str, audio: &str) -> bool {
        self.set_setting(USER_IMAGE_FORMATS, &clean_user_filter_string(image).join(";"))
            && self.set_setting(USER_VIDEO_FORMATS, &clean_user_filter_string(video).join(";"))
            && self.set_setting(USER_AUDIO_FORMATS, &clean_user_filter_string(audio).join(";"))
    }

    /// Add suffixes to the user image filter, keeping existing entries.
    pub fn add_to_user_image_filter_settings(&self, filter: &str) -> bool {
        let mut current = split_filter(&self.get_setting(USER_IMAGE_FORMATS).unwrap_or_default());
        for suffix in clean_user_filter_string(filter) {
            if !current.contains(&suffix) {
                current.push(suffix);
            }
        }
        self.set_setting(USER_IMAGE_FORMATS, &current.join(";"))
    }

    pub fn get_ignore_directory_filter_settings(&self) -> Vec<String> {
        self.merged_filter(IGNORE_DIRECTORY_FORMATS, USER_IGNORE_DIRECTORY_FORMATS)
    }

    pub fn get_user_ignore_directory_filter_settings(&self) -> String {
        self.get_setting(USER_IGNORE_DIRECTORY_FORMATS).unwrap_or_default()
    }

    pub fn set_ignore_directory_filter_settings(&self, directories: &[String]) -> bool {
        self.set_setting(IGNORE_DIRECTORY_FORMATS, &directories.join(";"))
    }

    pub fn set_user_ignore_directory_filter_settings(&self, directories: &[String]) -> bool {
        let joined = directories.join(";");
        debug!("User ignore directory filter: {}", joined);
        self.set_setting(USER_IGNORE_DIRECTORY_FORMATS, &joined)
    }

    fn merged_filter(&self, base_key: &str, user_key: &str) -> Vec<String> {
        join_main_and_user_filter(
            &self.get_setting(base_key).unwrap_or_default(),
            &self.get_setting(user_key).unwrap_or_default(),
        )
    }

    // ========================================================================
    // Identity and hashing
    // ========================================================================

    /// The database's UUID, created and stored on first use.
    pub fn database_uuid(&self) -> Uuid {
        if let Some(uuid) = self
            .get_setting(DATABASE_UUID)
            .and_then(|s| Uuid::parse_str(s.trim_matches(|c| c == '{' || c == '}')).ok())
            .filter(|uuid| !uuid.is_nil())
        {
            return uuid;
        }

        let uuid = Uuid::new_v4();
        self.set_setting(DATABASE_UUID, &uuid.to_string());
        info!("Assigned database UUID {}", uuid);
        uuid
    }

    /// Version of the content fingerprint; 1 unless stored otherwise.
    pub fn get_unique_hash_version(&self) -> i64 {
        let mut cached = lock_unpoisoned(&self.unique_hash_version);
        if let Some(version) = *cached {
            return version;
        }
        let version = self
            .get_setting(UNIQUE_HASH_VERSION)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1);
        *cached = Some(version);
        version
    }

    pub fn is_unique_hash_v2(&self) -> bool {
        self.get_unique_hash_version() == 2
    }

    pub fn set_unique_hash_version(&self, version: i64) -> bool {
        *lock_unpoisoned(&self.unique_hash_version) = Some(version);
        self.set_setting(UNIQUE_HASH_VERSION, &version.to_string())
    }

    // ========================================================================
    // Download history
    // ========================================================================

    pub fn find_in_download_history(
        &self,
        identifier: &str,
        file_name: &str,
        file_size: i64,
        date: NaiveDateTime,
    ) -> Option<i64> {
        self.exec(
            "SELECT id FROM DownloadHistory WHERE identifier=? AND filename=? AND filesize=? AND filedate=?;",
            sql_values![identifier, file_name, file_size, date],
        )?
        .first_value()
        .and_then(SqlValue::as_i64)
    }

    /// Record a downloaded file; recording it again returns the same id.
    pub fn add_to_download_history(
        &self,
        identifier: &str,
        file_name: &str,
        file_size: i64,
        date: NaiveDateTime,
    ) -> Option<i64> {
        let output = self.exec(
            "INSERT INTO DownloadHistory (identifier, filename, filesize, filedate) VALUES (?, ?, ?, ?) \
             ON CONFLICT (identifier, filename, filesize, filedate) DO UPDATE SET filedate=excluded.filedate \
             RETURNING id;",
            sql_values![identifier, file_name, file_size, date],
        )?;
        Self::inserted_id(&output)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn split_filter(filter: &str) -> Vec<String> {
    filter
        .split(';')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply user overrides to a base list. Entries with a leading `-`
/// remove that entry, others are added. The result is sorted.
fn join_main_and_user_filter(filter: &str, user_filter: &str) -> Vec<String> {
    let mut merged: BTreeSet<String> = split_filter(filter).into_iter().collect();
    for entry in split_filter(user_filter) {
        match entry.strip_prefix('-') {
            Some(removed) => {
                merged.remove(removed);
            }
            None => {
                merged.insert(entry);
            }
        }
    }
    merged.into_iter().collect()
}

/// Normalize a user-typed suffix list: split on `;` (or spaces when
/// there is no `;`), strip `*.`/`.` wildcards and lowercase.
fn clean_user_filter_string(filter: &str) -> Vec<String> {
    let separator = if !filter.contains(';') && filter.contains(' ') { ' ' } else { ';' };

    filter
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (sign, rest) = match entry.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", entry),
            };
            let rest = rest
                .strip_prefix("*.")
                .or_else(|| rest.strip_prefix('.'))
                .unwrap_or(rest);
            format!("{}{}", sign, rest.trim().to_lowercase())
        })
        .filter(|s| !s.is_empty() && s != "-")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_adds_and_removes() {
        let merged = join_main_and_user_filter("jpg;png;tif", "-png;xyz;-nothere");
        assert_eq!(merged, vec!["jpg", "tif", "xyz"]);
    }

    #[test]
    fn test_join_with_empty_inputs() {
        assert!(join_main_and_user_filter("", "").is_empty());
        assert_eq!(join_main_and_user_filter("b;a", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_clean_user_filter_string() {
        assert_eq!(clean_user_filter_string("*.JPG; .Png;-*.tif"), vec!["jpg", "png", "-tif"]);
        assert_eq!(clean_user_filter_string("*.raw xcf"), vec!["raw", "xcf"]);
        assert_eq!(clean_user_filter_string("-.gif;;"), vec!["-gif"]);
        assert!(clean_user_filter_string("  ").is_empty());
    }
}
