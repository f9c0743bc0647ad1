//! Field masks for the per-image attribute tables.
//!
//! Each table gets a bitflags type; a mask selects which columns an
//! accessor reads or writes. Values travel in column order, one per set bit.

use bitflags::bitflags;

use crate::db::value::SqlValue;

/// How a column is stored and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// ISO-8601 text, decoded to a date/time on read.
    DateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldColumn<F: 'static> {
    pub flag: F,
    pub name: &'static str,
    pub kind: ColumnKind,
}

macro_rules! field_table {
    ($flags:ident, $table:ident, [$(($flag:ident, $name:literal, $kind:ident)),+ $(,)?]) => {
        pub const $table: &[FieldColumn<$flags>] = &[
            $(FieldColumn { flag: $flags::$flag, name: $name, kind: ColumnKind::$kind }),+
        ];
    };
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImagesFields: u32 {
        const ALBUM = 1 << 0;
        const NAME = 1 << 1;
        const STATUS = 1 << 2;
        const CATEGORY = 1 << 3;
        const MODIFICATION_DATE = 1 << 4;
        const FILE_SIZE = 1 << 5;
        const UNIQUE_HASH = 1 << 6;
    }
}

field_table!(ImagesFields, IMAGES_COLUMNS, [
    (ALBUM, "album", Integer),
    (NAME, "name", Text),
    (STATUS, "status", Integer),
    (CATEGORY, "category", Integer),
    (MODIFICATION_DATE, "modificationDate", DateTime),
    (FILE_SIZE, "fileSize", Integer),
    (UNIQUE_HASH, "uniqueHash", Text),
]);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageInformationFields: u32 {
        const RATING = 1 << 0;
        const CREATION_DATE = 1 << 1;
        const DIGITIZATION_DATE = 1 << 2;
        const ORIENTATION = 1 << 3;
        const WIDTH = 1 << 4;
        const HEIGHT = 1 << 5;
        const FORMAT = 1 << 6;
        const COLOR_DEPTH = 1 << 7;
        const COLOR_MODEL = 1 << 8;
    }
}

field_table!(ImageInformationFields, IMAGE_INFORMATION_COLUMNS, [
    (RATING, "rating", Integer),
    (CREATION_DATE, "creationDate", DateTime),
    (DIGITIZATION_DATE, "digitizationDate", DateTime),
    (ORIENTATION, "orientation", Integer),
    (WIDTH, "width", Integer),
    (HEIGHT, "height", Integer),
    (FORMAT, "format", Text),
    (COLOR_DEPTH, "colorDepth", Integer),
    (COLOR_MODEL, "colorModel", Integer),
]);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageMetadataFields: u32 {
        const MAKE = 1 << 0;
        const MODEL = 1 << 1;
        const LENS = 1 << 2;
        const APERTURE = 1 << 3;
        const FOCAL_LENGTH = 1 << 4;
        const FOCAL_LENGTH_35 = 1 << 5;
        const EXPOSURE_TIME = 1 << 6;
        const EXPOSURE_PROGRAM = 1 << 7;
        const EXPOSURE_MODE = 1 << 8;
        const SENSITIVITY = 1 << 9;
        const FLASH_MODE = 1 << 10;
        const WHITE_BALANCE = 1 << 11;
        const WHITE_BALANCE_COLOR_TEMPERATURE = 1 << 12;
        const METERING_MODE = 1 << 13;
        const SUBJECT_DISTANCE = 1 << 14;
        const SUBJECT_DISTANCE_CATEGORY = 1 << 15;
    }
}

field_table!(ImageMetadataFields, IMAGE_METADATA_COLUMNS, [
    (MAKE, "make", Text),
    (MODEL, "model", Text),
    (LENS, "lens", Text),
    (APERTURE, "aperture", Real),
    (FOCAL_LENGTH, "focalLength", Real),
    (FOCAL_LENGTH_35, "focalLength35", Real),
    (EXPOSURE_TIME, "exposureTime", Real),
    (EXPOSURE_PROGRAM, "exposureProgram", Integer),
    (EXPOSURE_MODE, "exposureMode", Integer),
    (SENSITIVITY, "sensitivity", Integer),
    (FLASH_MODE, "flash", Integer),
    (WHITE_BALANCE, "whiteBalance", Integer),
    (WHITE_BALANCE_COLOR_TEMPERATURE, "whiteBalanceColorTemperature", Integer),
    (METERING_MODE, "meteringMode", Integer),
    (SUBJECT_DISTANCE, "subjectDistance", Real),
    (SUBJECT_DISTANCE_CATEGORY, "subjectDistanceCategory", Integer),
]);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VideoMetadataFields: u32 {
        const ASPECT_RATIO = 1 << 0;
        const AUDIO_BIT_RATE = 1 << 1;
        const AUDIO_CHANNEL_TYPE = 1 << 2;
        const AUDIO_CODEC = 1 << 3;
        const DURATION = 1 << 4;
        const FRAME_RATE = 1 << 5;
        const VIDEO_CODEC = 1 << 6;
    }
}

field_table!(VideoMetadataFields, VIDEO_METADATA_COLUMNS, [
    (ASPECT_RATIO, "aspectRatio", Text),
    (AUDIO_BIT_RATE, "audioBitRate", Text),
    (AUDIO_CHANNEL_TYPE, "audioChannelType", Text),
    (AUDIO_CODEC, "audioCompressor", Text),
    (DURATION, "duration", Text),
    (FRAME_RATE, "frameRate", Text),
    (VIDEO_CODEC, "videoCodec", Text),
]);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImagePositionsFields: u32 {
        const LATITUDE = 1 << 0;
        const LATITUDE_NUMBER = 1 << 1;
        const LONGITUDE = 1 << 2;
        const LONGITUDE_NUMBER = 1 << 3;
        const ALTITUDE = 1 << 4;
        const POSITION_ORIENTATION = 1 << 5;
        const POSITION_TILT = 1 << 6;
        const POSITION_ROLL = 1 << 7;
        const POSITION_ACCURACY = 1 << 8;
        const POSITION_DESCRIPTION = 1 << 9;
    }
}

field_table!(ImagePositionsFields, IMAGE_POSITIONS_COLUMNS, [
    (LATITUDE, "latitude", Text),
    (LATITUDE_NUMBER, "latitudeNumber", Real),
    (LONGITUDE, "longitude", Text),
    (LONGITUDE_NUMBER, "longitudeNumber", Real),
    (ALTITUDE, "altitude", Real),
    (POSITION_ORIENTATION, "orientation", Real),
    (POSITION_TILT, "tilt", Real),
    (POSITION_ROLL, "roll", Real),
    (POSITION_ACCURACY, "accuracy", Real),
    (POSITION_DESCRIPTION, "description", Text),
]);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageCommentsFields: u32 {
        const COMMENT_TYPE = 1 << 0;
        const LANGUAGE = 1 << 1;
        const AUTHOR = 1 << 2;
        const DATE = 1 << 3;
        const COMMENT = 1 << 4;
    }
}

field_table!(ImageCommentsFields, IMAGE_COMMENTS_COLUMNS, [
    (COMMENT_TYPE, "type", Integer),
    (LANGUAGE, "language", Text),
    (AUTHOR, "author", Text),
    (DATE, "date", DateTime),
    (COMMENT, "comment", Text),
]);

/// A field-mask type with a column table.
pub trait FieldMask: bitflags::Flags + Copy + 'static {
    const TABLE: &'static str;
    fn columns() -> &'static [FieldColumn<Self>];

    /// The notification payload for a change to these fields.
    fn changed(self) -> ChangedFields;

    /// Columns selected by this mask, in table order.
    fn selected(self) -> Vec<&'static FieldColumn<Self>> {
        Self::columns()
            .iter()
            .filter(|column| self.contains(column.flag))
            .collect()
    }

    fn column_names(self) -> Vec<&'static str> {
        self.selected().into_iter().map(|column| column.name).collect()
    }
}

impl FieldMask for ImagesFields {
    const TABLE: &'static str = "Images";
    fn columns() -> &'static [FieldColumn<Self>] {
        IMAGES_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Images(self)
    }
}

impl FieldMask for ImageInformationFields {
    const TABLE: &'static str = "ImageInformation";
    fn columns() -> &'static [FieldColumn<Self>] {
        IMAGE_INFORMATION_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Information(self)
    }
}

impl FieldMask for ImageMetadataFields {
    const TABLE: &'static str = "ImageMetadata";
    fn columns() -> &'static [FieldColumn<Self>] {
        IMAGE_METADATA_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Metadata(self)
    }
}

impl FieldMask for VideoMetadataFields {
    const TABLE: &'static str = "VideoMetadata";
    fn columns() -> &'static [FieldColumn<Self>] {
        VIDEO_METADATA_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Video(self)
    }
}

impl FieldMask for ImagePositionsFields {
    const TABLE: &'static str = "ImagePositions";
    fn columns() -> &'static [FieldColumn<Self>] {
        IMAGE_POSITIONS_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Positions(self)
    }
}

impl FieldMask for ImageCommentsFields {
    const TABLE: &'static str = "ImageComments";
    fn columns() -> &'static [FieldColumn<Self>] {
        IMAGE_COMMENTS_COLUMNS
    }
    fn changed(self) -> ChangedFields {
        ChangedFields::Comments(self)
    }
}

impl ColumnKind {
    /// Normalize a value read back from the engine. Numbers that come back
    /// as text are re-parsed, ISO text becomes a date/time.
    pub fn decode(self, value: SqlValue) -> SqlValue {
        if value.is_null() {
            return SqlValue::Null;
        }
        match self {
            ColumnKind::Integer => value.as_i64().map_or(SqlValue::Null, SqlValue::Integer),
            ColumnKind::Real => value.as_f64().map_or(SqlValue::Null, SqlValue::Real),
            ColumnKind::Text => SqlValue::Text(value.to_text()),
            ColumnKind::DateTime => value.as_datetime().map_or(SqlValue::Null, SqlValue::DateTime),
        }
    }
}

/// Decode one row of `mask`'s columns.
pub fn decode_row<F: FieldMask>(mask: F, row: &[SqlValue]) -> Vec<SqlValue> {
    mask.selected()
        .into_iter()
        .zip(row.iter().cloned())
        .map(|(column, value)| column.kind.decode(value))
        .collect()
}

/// Which attribute family a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedFields {
    Images(ImagesFields),
    Information(ImageInformationFields),
    Metadata(ImageMetadataFields),
    Video(VideoMetadataFields),
    Positions(ImagePositionsFields),
    Comments(ImageCommentsFields),
    Properties,
    Copyright,
    History,
    Uuid,
    Relations,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_covers_all_bits<F: FieldMask + bitflags::Flags<Bits = u32>>() {
        let columns = F::columns();
        assert_eq!(columns.len(), F::all().iter().count(), "{}", F::TABLE);
        for (i, column) in columns.iter().enumerate() {
            assert_eq!(column.flag.bits(), 1u32 << i, "{} {}", F::TABLE, column.name);
        }
    }

    #[test]
    fn test_every_bit_has_a_column() {
        table_covers_all_bits::<ImagesFields>();
        table_covers_all_bits::<ImageInformationFields>();
        table_covers_all_bits::<ImageMetadataFields>();
        table_covers_all_bits::<VideoMetadataFields>();
        table_covers_all_bits::<ImagePositionsFields>();
        table_covers_all_bits::<ImageCommentsFields>();
    }

    #[test]
    fn test_selected_columns_follow_table_order() {
        let mask = ImageInformationFields::HEIGHT | ImageInformationFields::RATING;
        assert_eq!(mask.column_names(), vec!["rating", "height"]);
        assert_eq!(
            ImageMetadataFields::FLASH_MODE.column_names(),
            vec!["flash"]
        );
        assert!(ImagesFields::empty().column_names().is_empty());
    }

    #[test]
    fn test_decode_reparses_text_numbers_and_dates() {
        assert_eq!(ColumnKind::Real.decode(SqlValue::Text("2.8".into())), SqlValue::Real(2.8));
        assert_eq!(ColumnKind::Integer.decode(SqlValue::Text("7".into())), SqlValue::Integer(7));
        let decoded = ColumnKind::DateTime.decode(SqlValue::Text("2024-01-01T10:20:30".into()));
        assert!(matches!(decoded, SqlValue::DateTime(_)));
        assert_eq!(ColumnKind::Text.decode(SqlValue::Null), SqlValue::Null);
    }
}
