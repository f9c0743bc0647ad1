/// SQLite schema for the core metadata store.
///
/// Child rows of an image are removed by the `delete_image` trigger so the
/// cascades behave the same as the foreign keys used on PostgreSQL.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS AlbumRoots (
    id INTEGER PRIMARY KEY,
    label TEXT,
    status INTEGER NOT NULL,
    type INTEGER NOT NULL,
    identifier TEXT,
    specificPath TEXT,
    UNIQUE(identifier, specificPath)
);

CREATE TABLE IF NOT EXISTS Albums (
    id INTEGER PRIMARY KEY,
    albumRoot INTEGER NOT NULL,
    relativePath TEXT NOT NULL,
    date DATE,
    caption TEXT,
    collection TEXT,
    icon INTEGER,
    UNIQUE(albumRoot, relativePath)
);

CREATE TABLE IF NOT EXISTS Images (
    id INTEGER PRIMARY KEY,
    album INTEGER,
    name TEXT NOT NULL,
    status INTEGER NOT NULL,
    category INTEGER NOT NULL,
    modificationDate DATETIME,
    fileSize INTEGER,
    uniqueHash TEXT,
    UNIQUE(album, name)
);

CREATE TABLE IF NOT EXISTS ImageInformation (
    imageid INTEGER PRIMARY KEY,
    rating INTEGER,
    creationDate DATETIME,
    digitizationDate DATETIME,
    orientation INTEGER,
    width INTEGER,
    height INTEGER,
    format TEXT,
    colorDepth INTEGER,
    colorModel INTEGER
);

CREATE TABLE IF NOT EXISTS ImageMetadata (
    imageid INTEGER PRIMARY KEY,
    make TEXT,
    model TEXT,
    lens TEXT,
    aperture REAL,
    focalLength REAL,
    focalLength35 REAL,
    exposureTime REAL,
    exposureProgram INTEGER,
    exposureMode INTEGER,
    sensitivity INTEGER,
    flash INTEGER,
    whiteBalance INTEGER,
    whiteBalanceColorTemperature INTEGER,
    meteringMode INTEGER,
    subjectDistance REAL,
    subjectDistanceCategory INTEGER
);

CREATE TABLE IF NOT EXISTS VideoMetadata (
    imageid INTEGER PRIMARY KEY,
    aspectRatio TEXT,
    audioBitRate TEXT,
    audioChannelType TEXT,
    audioCompressor TEXT,
    duration TEXT,
    frameRate TEXT,
    videoCodec TEXT
);

CREATE TABLE IF NOT EXISTS ImagePositions (
    imageid INTEGER PRIMARY KEY,
    latitude TEXT,
    latitudeNumber REAL,
    longitude TEXT,
    longitudeNumber REAL,
    altitude REAL,
    orientation REAL,
    tilt REAL,
    roll REAL,
    accuracy REAL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS ImageComments (
    id INTEGER PRIMARY KEY,
    imageid INTEGER,
    type INTEGER,
    language TEXT,
    author TEXT,
    date DATETIME,
    comment TEXT,
    UNIQUE(imageid, type, language, author)
);

CREATE TABLE IF NOT EXISTS ImageCopyright (
    id INTEGER PRIMARY KEY,
    imageid INTEGER,
    property TEXT,
    value TEXT,
    extraValue TEXT,
    UNIQUE(imageid, property, value, extraValue)
);

CREATE TABLE IF NOT EXISTS ImageProperties (
    imageid INTEGER NOT NULL,
    property TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(imageid, property)
);

CREATE TABLE IF NOT EXISTS ImageHistory (
    imageid INTEGER PRIMARY KEY,
    uuid TEXT,
    history TEXT
);

CREATE TABLE IF NOT EXISTS ImageRelations (
    subject INTEGER,
    object INTEGER,
    type INTEGER,
    UNIQUE(subject, object, type)
);

CREATE TABLE IF NOT EXISTS Tags (
    id INTEGER PRIMARY KEY,
    pid INTEGER,
    name TEXT NOT NULL,
    icon INTEGER,
    iconkde TEXT,
    UNIQUE(name, pid)
);

CREATE TABLE IF NOT EXISTS TagProperties (
    tagid INTEGER,
    property TEXT,
    value TEXT
);

CREATE TABLE IF NOT EXISTS ImageTags (
    imageid INTEGER NOT NULL,
    tagid INTEGER NOT NULL,
    UNIQUE(imageid, tagid)
);

CREATE TABLE IF NOT EXISTS ImageTagProperties (
    imageid INTEGER,
    tagid INTEGER,
    property TEXT,
    value TEXT,
    UNIQUE(imageid, tagid, property, value)
);

CREATE TABLE IF NOT EXISTS Searches (
    id INTEGER PRIMARY KEY,
    type INTEGER,
    name TEXT NOT NULL,
    query TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS DownloadHistory (
    id INTEGER PRIMARY KEY,
    identifier TEXT,
    filename TEXT,
    filesize INTEGER,
    filedate DATETIME,
    UNIQUE(identifier, filename, filesize, filedate)
);

CREATE TABLE IF NOT EXISTS Settings (
    keyword TEXT NOT NULL UNIQUE,
    value TEXT
);

CREATE INDEX IF NOT EXISTS dir_index ON Images (album);
CREATE INDEX IF NOT EXISTS hash_index ON Images (uniqueHash);
CREATE INDEX IF NOT EXISTS tag_index ON ImageTags (tagid);
CREATE INDEX IF NOT EXISTS tag_id_index ON ImageTags (imageid);
CREATE INDEX IF NOT EXISTS image_name_index ON Images (name);
CREATE INDEX IF NOT EXISTS creationdate_index ON ImageInformation (creationDate);
CREATE INDEX IF NOT EXISTS comments_imageid_index ON ImageComments (imageid);
CREATE INDEX IF NOT EXISTS copyright_imageid_index ON ImageCopyright (imageid);
CREATE INDEX IF NOT EXISTS uuid_index ON ImageHistory (uuid);
CREATE INDEX IF NOT EXISTS subject_relations_index ON ImageRelations (subject);
CREATE INDEX IF NOT EXISTS object_relations_index ON ImageRelations (object);
CREATE INDEX IF NOT EXISTS tagproperties_index ON TagProperties (tagid);
CREATE INDEX IF NOT EXISTS imagetagproperties_index ON ImageTagProperties (imageid, tagid);

CREATE TRIGGER IF NOT EXISTS delete_image DELETE ON Images
BEGIN
    DELETE FROM ImageTags WHERE imageid=OLD.id;
    DELETE FROM ImageTagProperties WHERE imageid=OLD.id;
    DELETE FROM ImageInformation WHERE imageid=OLD.id;
    DELETE FROM ImageMetadata WHERE imageid=OLD.id;
    DELETE FROM VideoMetadata WHERE imageid=OLD.id;
    DELETE FROM ImagePositions WHERE imageid=OLD.id;
    DELETE FROM ImageComments WHERE imageid=OLD.id;
    DELETE FROM ImageCopyright WHERE imageid=OLD.id;
    DELETE FROM ImageProperties WHERE imageid=OLD.id;
    DELETE FROM ImageHistory WHERE imageid=OLD.id;
    DELETE FROM ImageRelations WHERE subject=OLD.id OR object=OLD.id;
    UPDATE Albums SET icon=NULL WHERE icon=OLD.id;
    UPDATE Tags SET icon=NULL WHERE icon=OLD.id;
END;

CREATE TRIGGER IF NOT EXISTS delete_tag DELETE ON Tags
BEGIN
    DELETE FROM ImageTags WHERE tagid=OLD.id;
    DELETE FROM TagProperties WHERE tagid=OLD.id;
    DELETE FROM ImageTagProperties WHERE tagid=OLD.id;
END;
"#;
