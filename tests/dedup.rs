mod support;

use seedsync::core::context::Context;
use seedsync::core::dedup::Deduplicator;
use seedsync::core::provider::Coordinator;
use seedsync::core::record::{FetchRequest, Record, RecordId};
use seedsync::core::sqlite::SqliteProvider;
use seedsync::core::store::StoreLocator;
use std::sync::Arc;
use support::favorite;
use tempfile::tempdir;

fn cloud_context(base: &std::path::Path) -> Context {
    let pair = StoreLocator::new("Favorites", "FavoritesCloudStore")
        .resolve(base)
        .expect("resolve");
    let coordinator = Arc::new(Coordinator::new(Arc::new(SqliteProvider::new())));
    coordinator.attach(&pair.cloud).expect("attach cloud");
    Context::new(coordinator)
}

#[test]
fn groups_of_one_two_and_five_collapse_to_their_earliest_record() {
    let tmp = tempdir().expect("tempdir");
    let mut ctx = cloud_context(tmp.path());

    let single = favorite(100, 1);
    let pair: Vec<Record> = vec![favorite(200, 30), favorite(200, 10)];
    let five: Vec<Record> = (0..5).map(|i| favorite(500, 50 - i)).collect();

    let single_id = single.id.clone();
    let pair_keep = pair[1].id.clone();
    let five_keep = five[4].id.clone();
    let pair_dup = pair[0].id.clone();
    let five_dups: Vec<RecordId> = five[..4].iter().map(|r| r.id.clone()).collect();

    // Folders referencing records that will be removed.
    let folder_a = Record::new("Folder")
        .with_attribute("name", "a")
        .with_relationship("items", vec![pair_dup.clone(), single_id.clone()]);
    let folder_b = Record::new("Folder")
        .with_attribute("name", "b")
        .with_relationship("items", five_dups.clone())
        .with_relationship("pinned", vec![five_dups[0].clone()]);
    let folder_a_id = folder_a.id.clone();
    let folder_b_id = folder_b.id.clone();

    ctx.insert(single);
    for r in pair.into_iter().chain(five) {
        ctx.insert(r);
    }
    ctx.insert(folder_a);
    ctx.insert(folder_b);
    ctx.save().expect("seed store");

    let report = Deduplicator::new("Favorite", "entryID").run(&mut ctx);
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.scanned, 8);
    assert_eq!(report.groups_resolved, 2);
    assert_eq!(report.records_removed, 5);
    assert!(!ctx.has_changes(), "dedup pass must commit");

    let favorites = ctx
        .fetch(&FetchRequest::entity("Favorite"))
        .expect("fetch favorites");
    let ids: Vec<RecordId> = favorites.iter().map(|r| r.id.clone()).collect();
    assert_eq!(favorites.len(), 3);
    assert!(ids.contains(&single_id));
    assert!(ids.contains(&pair_keep));
    assert!(ids.contains(&five_keep));

    let folders = ctx.fetch(&FetchRequest::entity("Folder")).expect("fetch folders");
    let a = folders.iter().find(|f| f.id == folder_a_id).expect("folder a");
    let b = folders.iter().find(|f| f.id == folder_b_id).expect("folder b");
    assert_eq!(a.relationships["items"], vec![pair_keep.clone(), single_id.clone()]);
    assert_eq!(b.relationships["items"], vec![five_keep.clone()]);
    assert_eq!(b.relationships["pinned"], vec![five_keep.clone()]);

    // No relationship may dangle.
    for folder in &folders {
        for targets in folder.relationships.values() {
            for target in targets {
                assert!(ids.contains(target), "dangling reference to {target}");
            }
        }
    }
}

#[test]
fn tiebreak_on_equal_timestamps_uses_identity_order() {
    let tmp = tempdir().expect("tempdir");
    let mut ctx = cloud_context(tmp.path());

    let mut first = favorite(7, 10);
    first.id = RecordId::from("01HZZZZZZZZZZZZZZZZZZZZZZA");
    let mut second = favorite(7, 10);
    second.id = RecordId::from("01HZZZZZZZZZZZZZZZZZZZZZZB");
    ctx.insert(second);
    ctx.insert(first.clone());
    ctx.save().expect("save");

    let report = Deduplicator::new("Favorite", "entryID").run(&mut ctx);
    assert_eq!(report.records_removed, 1);
    let left = ctx.fetch(&FetchRequest::entity("Favorite")).expect("fetch");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, first.id);
}

#[test]
fn other_entities_and_unkeyed_records_are_left_alone() {
    let tmp = tempdir().expect("tempdir");
    let mut ctx = cloud_context(tmp.path());

    ctx.insert(Record::new("Folder").with_attribute("entryID", 1));
    ctx.insert(Record::new("Folder").with_attribute("entryID", 1));
    ctx.insert(Record::new("Favorite").with_created_at(1));
    ctx.insert(Record::new("Favorite").with_created_at(2));
    ctx.insert(favorite(1, 3));
    ctx.save().expect("save");

    let report = Deduplicator::new("Favorite", "entryID").run(&mut ctx);
    assert_eq!(report.groups_resolved, 0);
    assert_eq!(ctx.fetch(&FetchRequest::All).expect("fetch").len(), 5);
}

#[test]
fn staged_unsaved_duplicates_are_resolved_too() {
    let tmp = tempdir().expect("tempdir");
    let mut ctx = cloud_context(tmp.path());
    ctx.insert(favorite(3, 1));
    ctx.save().expect("save");
    ctx.insert(favorite(3, 2));

    let report = Deduplicator::new("Favorite", "entryID").run(&mut ctx);
    assert_eq!(report.records_removed, 1);
    assert!(!ctx.has_changes());
    let left = ctx.fetch(&FetchRequest::entity("Favorite")).expect("fetch");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].created_at, 1);
}
