/// PostgreSQL schema for the core metadata store.
///
/// Integer columns are BIGINT and reals DOUBLE PRECISION so that the
/// engine's 64-bit bind values map onto them without narrowing.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS AlbumRoots (
    id BIGSERIAL PRIMARY KEY,
    label TEXT,
    status BIGINT NOT NULL,
    type BIGINT NOT NULL,
    identifier TEXT,
    specificPath TEXT,
    UNIQUE(identifier, specificPath)
);

CREATE TABLE IF NOT EXISTS Albums (
    id BIGSERIAL PRIMARY KEY,
    albumRoot BIGINT NOT NULL,
    relativePath TEXT NOT NULL,
    date TEXT,
    caption TEXT,
    collection TEXT,
    icon BIGINT,
    UNIQUE(albumRoot, relativePath)
);

CREATE TABLE IF NOT EXISTS Images (
    id BIGSERIAL PRIMARY KEY,
    album BIGINT,
    name TEXT NOT NULL,
    status BIGINT NOT NULL,
    category BIGINT NOT NULL,
    modificationDate TEXT,
    fileSize BIGINT,
    uniqueHash TEXT,
    UNIQUE(album, name)
);

CREATE TABLE IF NOT EXISTS ImageInformation (
    imageid BIGINT PRIMARY KEY REFERENCES Images (id) ON DELETE CASCADE,
    rating BIGINT,
    creationDate TEXT,
    digitizationDate TEXT,
    orientation BIGINT,
    width BIGINT,
    height BIGINT,
    format TEXT,
    colorDepth BIGINT,
    colorModel BIGINT
);

CREATE TABLE IF NOT EXISTS ImageMetadata (
    imageid BIGINT PRIMARY KEY REFERENCES Images (id) ON DELETE CASCADE,
    make TEXT,
    model TEXT,
    lens TEXT,
    aperture DOUBLE PRECISION,
    focalLength DOUBLE PRECISION,
    focalLength35 DOUBLE PRECISION,
    exposureTime DOUBLE PRECISION,
    exposureProgram BIGINT,
    exposureMode BIGINT,
    sensitivity BIGINT,
    flash BIGINT,
    whiteBalance BIGINT,
    whiteBalanceColorTemperature BIGINT,
    meteringMode BIGINT,
    subjectDistance DOUBLE PRECISION,
    subjectDistanceCategory BIGINT
);

CREATE TABLE IF NOT EXISTS VideoMetadata (
    imageid BIGINT PRIMARY KEY REFERENCES Images (id) ON DELETE CASCADE,
    aspectRatio TEXT,
    audioBitRate TEXT,
    audioChannelType TEXT,
    audioCompressor TEXT,
    duration TEXT,
    frameRate TEXT,
    videoCodec TEXT
);

CREATE TABLE IF NOT EXISTS ImagePositions (
    imageid BIGINT PRIMARY KEY REFERENCES Images (id) ON DELETE CASCADE,
    latitude TEXT,
    latitudeNumber DOUBLE PRECISION,
    longitude TEXT,
    longitudeNumber DOUBLE PRECISION,
    altitude DOUBLE PRECISION,
    orientation DOUBLE PRECISION,
    tilt DOUBLE PRECISION,
    roll DOUBLE PRECISION,
    accuracy DOUBLE PRECISION,
    description TEXT
);

CREATE TABLE IF NOT EXISTS ImageComments (
    id BIGSERIAL PRIMARY KEY,
    imageid BIGINT REFERENCES Images (id) ON DELETE CASCADE,
    type BIGINT,
    language TEXT,
    author TEXT,
    date TEXT,
    comment TEXT,
    UNIQUE(imageid, type, language, author)
);

CREATE TABLE IF NOT EXISTS ImageCopyright (
    id BIGSERIAL PRIMARY KEY,
    imageid BIGINT REFERENCES Images (id) ON DELETE CASCADE,
    property TEXT,
    value TEXT,
    extraValue TEXT,
    UNIQUE(imageid, property, value, extraValue)
);

CREATE TABLE IF NOT EXISTS ImageProperties (
    imageid BIGINT NOT NULL REFERENCES Images (id) ON DELETE CASCADE,
    property TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(imageid, property)
);

CREATE TABLE IF NOT EXISTS ImageHistory (
    imageid BIGINT PRIMARY KEY REFERENCES Images (id) ON DELETE CASCADE,
    uuid TEXT,
    history TEXT
);

CREATE TABLE IF NOT EXISTS ImageRelations (
    subject BIGINT REFERENCES Images (id) ON DELETE CASCADE,
    object BIGINT REFERENCES Images (id) ON DELETE CASCADE,
    type BIGINT,
    UNIQUE(subject, object, type)
);

CREATE TABLE IF NOT EXISTS Tags (
    id BIGSERIAL PRIMARY KEY,
    pid BIGINT,
    name TEXT NOT NULL,
    icon BIGINT,
    iconkde TEXT,
    UNIQUE(name, pid)
);

CREATE TABLE IF NOT EXISTS TagProperties (
    tagid BIGINT REFERENCES Tags (id) ON DELETE CASCADE,
    property TEXT,
    value TEXT
);

CREATE TABLE IF NOT EXISTS ImageTags (
    imageid BIGINT NOT NULL REFERENCES Images (id) ON DELETE CASCADE,
    tagid BIGINT NOT NULL REFERENCES Tags (id) ON DELETE CASCADE,
    UNIQUE(imageid, tagid)
);

CREATE TABLE IF NOT EXISTS ImageTagProperties (
    imageid BIGINT REFERENCES Images (id) ON DELETE CASCADE,
    tagid BIGINT REFERENCES Tags (id) ON DELETE CASCADE,
    property TEXT,
    value TEXT,
    UNIQUE(imageid, tagid, property, value)
);

CREATE TABLE IF NOT EXISTS Searches (
    id BIGSERIAL PRIMARY KEY,
    type BIGINT,
    name TEXT NOT NULL,
    query TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS DownloadHistory (
    id BIGSERIAL PRIMARY KEY,
    identifier TEXT,
    filename TEXT,
    filesize BIGINT,
    filedate TEXT,
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
"#;
