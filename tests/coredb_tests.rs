//! Metadata store against a temporary SQLite file.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use photocore::db::coredb::{
    ChangeKind, ChangedFields, CommentType, CopyrightUniqueness, EntityKind, FieldMask, ImageCommentsFields,
    ImageInformationFields, ImageMetadataFields, ImagePositionsFields, ImagesFields, ItemCategory, ItemStatus,
    RecordingSink, RelationType, SearchType, VideoMetadataFields,
};
use photocore::db::coredb::{AlbumRootType, ColumnKind};
use photocore::db::{ConnectionParameters, CoreDb, DbEngine, Drivers, RetryPolicy, SqlValue};

struct Fixture {
    _dir: TempDir,
    store: CoreDb,
    sink: Arc<RecordingSink>,
}

fn open_store() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let parameters = ConnectionParameters::sqlite(dir.path().join("core.db"));
    let engine = DbEngine::new(parameters.clone(), Box::new(Drivers), RetryPolicy::default());
    engine.open(parameters).unwrap();

    let sink = Arc::new(RecordingSink::new());
    let store = CoreDb::new(Arc::new(engine), sink.clone());
    store.initialize().unwrap();
    sink.take();
    Fixture { _dir: dir, store, sink }
}

fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap()
}

/// Root 1, album 1 at "/2024" and item 1 "a.jpg".
fn populate(store: &CoreDb) -> (i64, i64, i64) {
    let root = store
        .add_album_root(AlbumRootType::LocalWritable, "vol-1", "/photos", "Main")
        .unwrap();
    let album = store
        .add_album(root, "/2024", "", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "")
        .unwrap();
    let item = store
        .add_item(album, "a.jpg", ItemStatus::Visible, ItemCategory::Image, timestamp(), 1024, "h1")
        .unwrap();
    (root, album, item)
}

fn add_image(store: &CoreDb, album: i64, name: &str) -> i64 {
    store
        .add_item(album, name, ItemStatus::Visible, ItemCategory::Image, timestamp(), 10, name)
        .unwrap()
}

// ============================================================================
// Albums and items
// ============================================================================

#[test]
fn test_first_root_album_and_item_get_id_one() {
    let fx = open_store();
    assert_eq!(populate(&fx.store), (1, 1, 1));
    assert_eq!(fx.store.get_image_ids(Some(1), "a.jpg", ItemStatus::Visible), vec![1]);
    assert!(fx.store.get_image_ids(Some(1), "a.jpg", ItemStatus::Trashed).is_empty());

    let roots = fx.store.get_album_roots();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].label, "Main");
    assert_eq!(roots[0].root_type, AlbumRootType::LocalWritable);
    assert_eq!(roots[0].specific_path, "/photos");
}

#[test]
fn test_adding_twice_keeps_ids() {
    let fx = open_store();
    let (root, album, item) = populate(&fx.store);

    let root_again = fx
        .store
        .add_album_root(AlbumRootType::Network, "vol-1", "/photos", "Renamed")
        .unwrap();
    assert_eq!(root_again, root);
    assert_eq!(fx.store.get_album_roots()[0].label, "Renamed");

    let item_again = fx
        .store
        .add_item(album, "a.jpg", ItemStatus::Visible, ItemCategory::Image, timestamp(), 2048, "h2")
        .unwrap();
    assert_eq!(item_again, item);
    assert_eq!(fx.store.get_all_items(), vec![item]);
    assert_eq!(fx.store.get_item_scan_info(item).unwrap().file_size, 2048);
}

#[test]
fn test_stale_albums_are_hidden_then_deleted() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);

    assert!(fx.store.make_stale_album(album));
    assert!(fx.store.scan_albums().is_empty());
    assert_eq!(fx.store.get_album_relative_path(album).as_deref(), Some("1-/2024"));

    assert!(fx.store.delete_stale_albums());
    assert!(fx.store.get_album_relative_path(album).is_none());
    assert!(fx.store.get_item_name(item).is_none());
}

#[test]
fn test_delete_album_root_is_all_or_nothing() {
    let fx = open_store();
    let (root, _, item) = populate(&fx.store);
    fx.store
        .engine()
        .exec_direct(
            "CREATE TRIGGER block_album_delete BEFORE DELETE ON Albums \
             BEGIN SELECT RAISE(ABORT, 'album deletion blocked'); END;",
        )
        .unwrap();

    assert!(!fx.store.delete_album_root(root));
    assert_eq!(fx.store.get_item_name(item).as_deref(), Some("a.jpg"));
    assert_eq!(fx.store.get_album_roots().len(), 1);
    assert!(!fx.store.engine().is_in_transaction());

    fx.store.engine().exec_direct("DROP TRIGGER block_album_delete;").unwrap();
    assert!(fx.store.delete_album_root(root));
    assert!(fx.store.get_album_roots().is_empty());
    assert!(fx.store.get_all_items().is_empty());
}

#[test]
fn test_album_for_path_creates_on_request() {
    let fx = open_store();
    let (root, album, _) = populate(&fx.store);

    assert_eq!(fx.store.get_album_for_path(root, "/2024", false), Some(album));
    assert_eq!(fx.store.get_album_for_path(root, "/2025", false), None);
    let created = fx.store.get_album_for_path(root, "/2024/summer", true).unwrap();
    assert_ne!(created, album);

    let mut subtree = fx.store.get_album_and_subalbums_for_path(root, "/2024");
    subtree.sort();
    assert_eq!(subtree, vec![album, created]);
}

#[test]
fn test_move_and_copy_items() {
    let fx = open_store();
    let (root, album, item) = populate(&fx.store);
    let other = fx.store.get_album_for_path(root, "/other", true).unwrap();
    fx.store.add_image_information(
        item,
        vec![SqlValue::Integer(4)],
        ImageInformationFields::RATING,
    );

    let copy = fx.store.copy_item(album, "a.jpg", other, "b.jpg").unwrap();
    assert_ne!(copy, item);
    assert_eq!(
        fx.store.get_image_information(copy, ImageInformationFields::RATING),
        vec![SqlValue::Integer(4)]
    );

    assert!(fx.store.move_item(album, "a.jpg", other, "c.jpg"));
    assert_eq!(fx.store.get_item_album(item), Some(other));
    assert_eq!(fx.store.get_item_name(item).as_deref(), Some("c.jpg"));
    assert!(fx.store.get_item_ids_in_album(album).is_empty());
}

#[test]
fn test_failed_move_or_copy_sends_no_notifications() {
    let fx = open_store();
    let (root, album, _) = populate(&fx.store);
    let other = fx.store.get_album_for_path(root, "/other", true).unwrap();
    let target = add_image(&fx.store, other, "y.jpg");
    fx.sink.take();

    let engine = fx.store.engine();
    engine
        .exec_direct(
            "CREATE TRIGGER block_move BEFORE UPDATE ON Images \
             BEGIN SELECT RAISE(ABORT, 'move blocked'); END;",
        )
        .unwrap();
    assert!(!fx.store.move_item(album, "a.jpg", other, "y.jpg"));
    assert_eq!(fx.store.get_item_name(target).as_deref(), Some("y.jpg"));
    assert!(fx.sink.take().is_empty());
    engine.exec_direct("DROP TRIGGER block_move;").unwrap();

    fx.store.add_image_information(
        fx.store.get_image_id(album, "a.jpg").unwrap(),
        vec![SqlValue::Integer(2)],
        ImageInformationFields::RATING,
    );
    fx.sink.take();
    engine
        .exec_direct(
            "CREATE TRIGGER block_copy BEFORE INSERT ON ImageInformation \
             BEGIN SELECT RAISE(ABORT, 'copy blocked'); END;",
        )
        .unwrap();
    assert_eq!(fx.store.copy_item(album, "a.jpg", other, "y.jpg"), None);
    assert_eq!(fx.store.get_image_id(other, "y.jpg"), Some(target));
    assert!(fx.sink.take().is_empty());
    assert!(!engine.is_in_transaction());
}

#[test]
fn test_replacing_move_reports_the_deleted_target() {
    let fx = open_store();
    let (root, album, item) = populate(&fx.store);
    let other = fx.store.get_album_for_path(root, "/other", true).unwrap();
    let target = add_image(&fx.store, other, "y.jpg");
    fx.sink.take();

    assert!(fx.store.move_item(album, "a.jpg", other, "y.jpg"));
    let changes = fx.sink.take();
    assert_eq!(changes[0].entity, EntityKind::CollectionImage);
    assert_eq!(changes[0].ids, vec![target]);
    assert_eq!(changes[0].kind, ChangeKind::Deleted);
    assert!(changes[1..].iter().all(|change| change.ids == vec![item]));
}

#[test]
fn test_removed_items_lose_their_album() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);

    assert!(fx.store.remove_items(&[item], &[album]));
    let info = fx.store.get_item_scan_info(item).unwrap();
    assert_eq!(info.album_id, None);
    assert_eq!(info.status, ItemStatus::Trashed);

    assert!(fx.store.remove_items_permanently(&[item], &[album]));
    assert!(fx.store.delete_removed_items());
    assert!(fx.store.get_all_items().is_empty());
}

#[test]
fn test_images_fields_follow_mask() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);

    let values = fx
        .store
        .get_images_fields(item, ImagesFields::NAME | ImagesFields::ALBUM | ImagesFields::FILE_SIZE);
    assert_eq!(
        values,
        vec![SqlValue::Integer(album), SqlValue::Text("a.jpg".into()), SqlValue::Integer(1024)]
    );
    assert!(fx.store.get_images_fields(item, ImagesFields::empty()).is_empty());
}

// ============================================================================
// Attribute tables
// ============================================================================

fn sample(kind: ColumnKind) -> SqlValue {
    match kind {
        ColumnKind::Integer => SqlValue::Integer(7),
        ColumnKind::Real => SqlValue::Real(2.5),
        ColumnKind::Text => SqlValue::Text("sample".into()),
        ColumnKind::DateTime => SqlValue::DateTime(timestamp()),
    }
}

/// Write each column on its own and read it back through the same mask.
fn check_every_bit<F: FieldMask + std::fmt::Debug>(
    add: impl Fn(Vec<SqlValue>, F) -> bool,
    get: impl Fn(F) -> Vec<SqlValue>,
) {
    for column in F::columns() {
        let value = sample(column.kind);
        assert!(add(vec![value.clone()], column.flag), "{}", column.name);
        assert_eq!(get(column.flag), vec![value], "{}", column.name);
    }
}

#[test]
fn test_every_field_round_trips() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);
    let store = &fx.store;

    check_every_bit::<ImageInformationFields>(
        |values, mask| store.add_image_information(item, values, mask),
        |mask| store.get_image_information(item, mask),
    );
    check_every_bit::<ImageMetadataFields>(
        |values, mask| store.add_image_metadata(item, values, mask),
        |mask| store.get_image_metadata(item, mask),
    );
    check_every_bit::<VideoMetadataFields>(
        |values, mask| store.add_video_metadata(item, values, mask),
        |mask| store.get_video_metadata(item, mask),
    );
    check_every_bit::<ImagePositionsFields>(
        |values, mask| store.add_image_position(item, values, mask),
        |mask| store.get_image_position(item, mask),
    );
}

#[test]
fn test_change_keeps_other_columns() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);
    let both = ImageInformationFields::WIDTH | ImageInformationFields::HEIGHT;

    assert!(fx
        .store
        .add_image_information(item, vec![SqlValue::Integer(640), SqlValue::Integer(480)], both));
    assert!(fx
        .store
        .change_image_information(item, vec![SqlValue::Integer(800)], ImageInformationFields::WIDTH));
    assert_eq!(
        fx.store.get_image_information(item, both),
        vec![SqlValue::Integer(800), SqlValue::Integer(480)]
    );

    // One value for two columns is rejected.
    assert!(!fx.store.change_image_information(item, vec![SqlValue::Integer(1)], both));
    assert!(!fx
        .store
        .change_image_metadata(item, vec![], ImageMetadataFields::MAKE | ImageMetadataFields::MODEL));
}

#[test]
fn test_positions_of_several_items() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);
    let other = add_image(&fx.store, album, "b.jpg");
    let mask = ImagePositionsFields::LATITUDE_NUMBER | ImagePositionsFields::ALTITUDE;

    fx.store
        .add_image_position(item, vec![SqlValue::Real(48.5), SqlValue::Real(300.0)], mask);
    let positions = fx.store.get_image_positions(&[item, other], mask);
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0], vec![SqlValue::Real(48.5), SqlValue::Real(300.0)]);
    assert!(positions[1].is_empty());

    assert!(fx.store.remove_image_position_altitude(item));
    assert_eq!(fx.store.get_image_position(item, mask), vec![SqlValue::Real(48.5), SqlValue::Null]);
    assert!(fx.store.remove_image_position(item));
    assert!(fx.store.get_image_position(item, mask).is_empty());
}

#[test]
fn test_comments() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);

    let id = fx
        .store
        .set_image_comment(item, "first", CommentType::Comment, "x-default", "ann", None)
        .unwrap();
    let again = fx
        .store
        .set_image_comment(item, "second", CommentType::Comment, "x-default", "ann", None)
        .unwrap();
    assert_eq!(id, again);
    fx.store
        .set_image_comment(item, "Holiday", CommentType::Title, "en-US", "", None)
        .unwrap();

    let comments = fx.store.get_image_comments(item);
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].comment, "second");
    assert_eq!(comments[1].comment_type, CommentType::Title);

    assert!(fx.store.change_image_comment(
        id,
        item,
        vec![SqlValue::Text("de-DE".into())],
        ImageCommentsFields::LANGUAGE
    ));
    assert_eq!(
        fx.store
            .get_image_comment_fields(id, ImageCommentsFields::LANGUAGE | ImageCommentsFields::COMMENT),
        vec![SqlValue::Text("de-DE".into()), SqlValue::Text("second".into())]
    );

    assert!(fx.store.remove_image_comment(id, item));
    assert_eq!(fx.store.get_image_comments(item).len(), 1);
}

#[test]
fn test_copyright_uniqueness() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);
    let store = &fx.store;

    store.set_image_copyright_property(item, "creator", "Ann", "", CopyrightUniqueness::PropertyNoConstraint);
    store.set_image_copyright_property(item, "creator", "Bob", "", CopyrightUniqueness::PropertyNoConstraint);
    assert_eq!(store.get_image_copyright(item, Some("creator")).len(), 2);

    store.set_image_copyright_property(item, "creator", "Cy", "", CopyrightUniqueness::PropertyUnique);
    let creators = store.get_image_copyright(item, Some("creator"));
    assert_eq!(creators.len(), 1);
    assert_eq!(creators[0].value, "Cy");

    store.set_image_copyright_property(item, "rights", "A", "en", CopyrightUniqueness::PropertyExtraValueUnique);
    store.set_image_copyright_property(item, "rights", "B", "de", CopyrightUniqueness::PropertyExtraValueUnique);
    store.set_image_copyright_property(item, "rights", "C", "en", CopyrightUniqueness::PropertyExtraValueUnique);
    let mut rights: Vec<_> = store
        .get_image_copyright(item, Some("rights"))
        .into_iter()
        .map(|c| (c.extra_value, c.value))
        .collect();
    rights.sort();
    assert_eq!(rights, vec![("de".into(), "B".into()), ("en".into(), "C".into())]);

    assert!(store.remove_image_copyright_properties(item, Some("rights"), Some("de"), None));
    assert_eq!(store.get_image_copyright(item, Some("rights")).len(), 1);
    assert!(store.remove_image_copyright_properties(item, None, None, None));
    assert!(store.get_image_copyright(item, None).is_empty());
}

#[test]
fn test_properties_and_history() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);
    let twin = add_image(&fx.store, album, "b.jpg");

    assert!(fx.store.set_image_property(item, "faceScanned", "1"));
    assert!(fx.store.set_image_property(item, "faceScanned", "2"));
    assert_eq!(fx.store.get_image_property(item, "faceScanned").as_deref(), Some("2"));
    assert!(fx.store.remove_image_property(item, "faceScanned"));
    assert_eq!(fx.store.get_image_property(item, "faceScanned"), None);

    assert!(!fx.store.has_image_history(item));
    assert!(fx.store.set_image_uuid(item, "u-1"));
    assert!(fx.store.set_image_uuid(twin, "u-1"));
    assert!(fx.store.set_image_history(item, "<history/>"));
    assert!(fx.store.has_image_history(item));

    let entry = fx.store.get_image_history(item).unwrap();
    assert_eq!(entry.uuid, "u-1");
    assert_eq!(entry.history, "<history/>");
    assert_eq!(fx.store.get_image_uuid(twin).as_deref(), Some("u-1"));
    assert_eq!(fx.store.get_items_for_uuid("u-1"), vec![item, twin]);
}

// ============================================================================
// Tags
// ============================================================================

#[test]
fn test_tag_properties_and_recursive_lookup() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);
    let other = add_image(&fx.store, album, "b.jpg");

    let places = fx.store.add_tag(0, "Places", "", None).unwrap();
    let paris = fx.store.add_tag(places, "Paris", "", None).unwrap();
    assert!(fx.store.add_tag_property(paris, "kind", "city"));
    assert!(fx.store.add_tag_property(paris, "kind", "capital"));
    assert_eq!(fx.store.get_tag_properties(paris).len(), 2);
    assert_eq!(fx.store.get_tags_with_property("kind"), vec![paris]);

    assert!(fx.store.add_item_tag(item, paris, false));
    assert!(fx.store.add_item_tag(other, places, false));
    assert_eq!(fx.store.get_item_ids_in_tag(places, false), vec![other]);
    assert_eq!(fx.store.get_item_ids_in_tag(places, true), vec![item, other]);
    assert_eq!(fx.store.recently_assigned_tags(), vec![places, paris]);

    assert!(fx.store.remove_tag_properties(paris, Some("kind"), Some("city")));
    assert_eq!(fx.store.get_tag_properties(paris).len(), 1);

    assert!(fx.store.delete_tag(paris));
    assert!(fx.store.get_item_tag_ids(item).is_empty());
    assert_eq!(fx.store.recently_assigned_tags(), vec![places]);
}

#[test]
fn test_tag_with_unsettable_icon_is_not_added() {
    let fx = open_store();
    let engine = fx.store.engine();
    engine
        .exec_direct(
            "CREATE TRIGGER block_icon BEFORE UPDATE ON Tags \
             BEGIN SELECT RAISE(ABORT, 'icon blocked'); END;",
        )
        .unwrap();

    assert_eq!(fx.store.add_tag(0, "Events", "folder", None), None);
    assert!(fx.store.scan_tags().iter().all(|tag| tag.name != "Events"));
    assert!(fx.sink.take().is_empty());

    engine.exec_direct("DROP TRIGGER block_icon;").unwrap();
    let events = fx.store.add_tag(0, "Events", "folder", None).unwrap();
    assert_eq!(fx.store.get_tag_info(events).unwrap().icon_kde, "folder");
}

#[test]
fn test_bulk_tagging_and_common_tags() {
    let fx = open_store();
    let (_, album, item) = populate(&fx.store);
    let other = add_image(&fx.store, album, "b.jpg");
    let a = fx.store.add_tag(0, "A", "", None).unwrap();
    let b = fx.store.add_tag(0, "B", "", None).unwrap();

    assert!(fx.store.add_tags_to_items(&[item, other], &[a, b]));
    assert!(fx.store.remove_tags_from_items(&[other], &[b]));
    assert_eq!(fx.store.get_item_tag_ids(item), vec![a, b]);
    assert_eq!(fx.store.get_item_tag_ids(other), vec![a]);
    assert!(fx.store.has_tags(&[other]));
    assert_eq!(fx.store.get_item_common_tag_ids(&[item, other]), vec![a, b]);
}

#[test]
fn test_recent_tags_survive_reload() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);
    let tag = fx.store.add_tag(0, "Family", "", None).unwrap();
    fx.store.add_item_tag(item, tag, false);

    let reloaded = CoreDb::new(Arc::new(reopen(&fx)), Arc::new(RecordingSink::new()));
    reloaded.initialize().unwrap();
    assert_eq!(reloaded.recently_assigned_tags(), vec![tag]);
}

fn reopen(fx: &Fixture) -> DbEngine {
    let parameters = fx.store.engine().parameters();
    let engine = DbEngine::new(parameters.clone(), Box::new(Drivers), RetryPolicy::default());
    engine.open(parameters).unwrap();
    engine
}

// ============================================================================
// Relations
// ============================================================================

#[test]
fn test_relation_cloud_terminates_on_cycles() {
    let fx = open_store();
    let (_, album, a) = populate(&fx.store);
    let b = add_image(&fx.store, album, "b.jpg");
    let c = add_image(&fx.store, album, "c.jpg");
    let lonely = add_image(&fx.store, album, "d.jpg");

    assert!(fx.store.add_image_relations(&[a, b, c], &[b, c, a], RelationType::Grouped));
    fx.store.add_image_relation(lonely, lonely, RelationType::DerivedFrom);

    let cloud = fx.store.get_relation_cloud(b, RelationType::Grouped);
    assert_eq!(cloud, vec![(a, b), (b, c), (c, a)]);
    assert_eq!(fx.store.get_relation_cloud(b, RelationType::UndefinedType).len(), 3);
}

#[test]
fn test_related_images_skip_removed_items() {
    let fx = open_store();
    let (_, album, a) = populate(&fx.store);
    let b = add_image(&fx.store, album, "b.jpg");
    let c = add_image(&fx.store, album, "c.jpg");

    fx.store.add_image_relation(a, b, RelationType::DerivedFrom);
    fx.store.add_image_relation(a, c, RelationType::DerivedFrom);
    assert_eq!(fx.store.get_images_related_from(a, RelationType::DerivedFrom), vec![b, c]);
    assert_eq!(fx.store.get_images_related_to(b, RelationType::UndefinedType), vec![a]);
    assert!(!fx.store.has_images_related_to(b, RelationType::Grouped));

    fx.store.set_item_status(c, ItemStatus::Obsolete);
    assert_eq!(fx.store.get_images_related_from(a, RelationType::DerivedFrom), vec![b]);
    assert_eq!(fx.store.get_one_related_image_each(&[b, c], RelationType::DerivedFrom), vec![a]);

    assert_eq!(fx.store.remove_all_image_relations_from(a, RelationType::DerivedFrom), vec![b]);
    assert!(!fx.store.has_images_related_from(a, RelationType::UndefinedType));
}

// ============================================================================
// Searches and settings
// ============================================================================

#[test]
fn test_searches() {
    let fx = open_store();
    let id = fx.store.add_search(SearchType::KeywordSearch, "cats", "tag:cat").unwrap();
    assert!(fx.store.update_search(id, SearchType::KeywordSearch, "cats", "tag:cat OR tag:kitten"));
    assert_eq!(fx.store.get_search_query(id).as_deref(), Some("tag:cat OR tag:kitten"));
    fx.store.add_search(SearchType::TimeLineSearch, "2024", "date:2024").unwrap();

    assert!(fx.store.delete_searches(SearchType::TimeLineSearch));
    let remaining = fx.store.scan_searches();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "cats");
}

#[test]
fn test_filter_settings_merge_user_overrides() {
    let fx = open_store();
    let defaults = fx.store.get_filter_settings();
    assert!(defaults.image.contains(&"jpg".to_string()));
    assert!(defaults.video.contains(&"mp4".to_string()));
    assert_eq!(fx.store.get_ignore_directory_filter_settings(), vec!["@eaDir"]);

    assert!(fx.store.set_user_filter_settings("*.XYZ;-jpg", "", "-wav"));
    let merged = fx.store.get_filter_settings();
    assert!(merged.image.contains(&"xyz".to_string()));
    assert!(!merged.image.contains(&"jpg".to_string()));
    assert!(!merged.audio.contains(&"wav".to_string()));
    assert_eq!(fx.store.get_user_filter_settings().0, "xyz;-jpg");

    assert!(fx.store.add_to_user_image_filter_settings("xyz abc"));
    assert_eq!(fx.store.get_user_filter_settings().0, "xyz;-jpg;abc");
}

#[test]
fn test_database_uuid_and_hash_version() {
    let fx = open_store();
    let uuid = fx.store.database_uuid();
    assert!(!uuid.is_nil());
    assert_eq!(fx.store.database_uuid(), uuid);

    assert_eq!(fx.store.get_unique_hash_version(), 1);
    assert!(!fx.store.is_unique_hash_v2());
    assert!(fx.store.set_unique_hash_version(2));
    assert!(fx.store.is_unique_hash_v2());
    assert_eq!(fx.store.get_setting("uniqueHashVersion").as_deref(), Some("2"));
}

#[test]
fn test_download_history() {
    let fx = open_store();
    assert_eq!(fx.store.find_in_download_history("cam", "IMG_1.JPG", 10, timestamp()), None);
    let id = fx.store.add_to_download_history("cam", "IMG_1.JPG", 10, timestamp()).unwrap();
    assert_eq!(fx.store.add_to_download_history("cam", "IMG_1.JPG", 10, timestamp()), Some(id));
    assert_eq!(fx.store.find_in_download_history("cam", "IMG_1.JPG", 10, timestamp()), Some(id));
}

// ============================================================================
// Maintenance and notifications
// ============================================================================

#[test]
fn test_integrity_check_and_vacuum() {
    let fx = open_store();
    populate(&fx.store);
    assert!(fx.store.integrity_check());
    assert!(fx.store.vacuum());
}

#[test]
fn test_notifications_only_on_success() {
    let fx = open_store();
    let (_, _, item) = populate(&fx.store);
    let changes = fx.sink.take();
    assert!(changes
        .iter()
        .any(|c| c.entity == EntityKind::AlbumRoot && c.kind == ChangeKind::Added));
    assert!(changes
        .iter()
        .any(|c| c.entity == EntityKind::CollectionImage && c.related_ids == vec![1]));

    fx.store
        .add_image_information(item, vec![SqlValue::Integer(3)], ImageInformationFields::RATING);
    let changes = fx.sink.take();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].ids, vec![item]);
    assert_eq!(
        changes[0].fields,
        Some(ChangedFields::Information(ImageInformationFields::RATING))
    );

    // Wrong value count: nothing written, nothing sent.
    assert!(!fx.store.add_image_information(item, vec![], ImageInformationFields::RATING));
    assert!(fx.sink.take().is_empty());
}
