mod common;

use chrono::{Duration, Utc};
use common::*;
use meta_achiever_backend::db::activity::{recent_activities, FeedFilter};
use meta_achiever_backend::db::collections;
use meta_achiever_backend::registry::import_shared;
use meta_achiever_backend::tracker::{
    add_collection_item, create_collection, get_collection, join_collection, list_collections,
    recompute_collection_progress, refresh_joined_collections, set_collection_active,
};
use meta_achiever_core::{ActivityKind, MetaAchieverError, NewCollection, ProgressStatus};
use rusqlite::Connection;

fn new_collection(owner: i64, name: &str) -> NewCollection {
    NewCollection {
        name: name.to_string(),
        description: "Curated set".to_string(),
        collection_type: "seasonal".to_string(),
        difficulty: "hard".to_string(),
        is_featured: false,
        start_date: None,
        end_date: None,
        created_by: owner,
    }
}

/// A collection of two shared achievements worth 10 and 20 points
fn two_item_collection(conn: &Connection, curator: i64) -> (i64, i64, i64) {
    let ten = share_new(conn, curator, "Ten points", &["1"]);
    let twenty = share_new(conn, curator, "Twenty points", &["2"]);
    let collection = create_collection(conn, &new_collection(curator, "Spring")).unwrap();
    add_collection_item(conn, collection.id, ten.id, 0, true, 10).unwrap();
    add_collection_item(conn, collection.id, twenty.id, 1, true, 20).unwrap();
    (collection.id, ten.id, twenty.id)
}

#[test]
fn progress_counts_imported_items() {
    let mut conn = open();
    let curator = add_user(&conn, "curator");
    let player = add_user(&conn, "player");
    let (collection, ten, _) = two_item_collection(&conn, curator);
    import_shared(&mut conn, player, ten).unwrap();

    let progress = recompute_collection_progress(&mut conn, player, collection).unwrap();
    assert_eq!(progress.achievements_completed, 1);
    assert_eq!(progress.total_achievements, 2);
    assert_eq!(progress.points_earned, 10);
    assert_eq!(progress.total_points, 30);
    assert_eq!(progress.status, ProgressStatus::InProgress);
    assert_eq!(progress.completion_percentage(), 50.0);
    assert_eq!(progress.points_percentage(), 33.3);
    assert_eq!(progress.items.len(), 1);
}

#[test]
fn recomputation_is_idempotent_and_completion_counted_once() {
    let mut conn = open();
    let curator = add_user(&conn, "curator");
    let player = add_user(&conn, "player");
    let (collection, ten, twenty) = two_item_collection(&conn, curator);
    import_shared(&mut conn, player, ten).unwrap();
    import_shared(&mut conn, player, twenty).unwrap();

    let first = recompute_collection_progress(&mut conn, player, collection).unwrap();
    assert_eq!(first.status, ProgressStatus::Completed);
    assert!(first.completed_at.is_some());

    let second = recompute_collection_progress(&mut conn, player, collection).unwrap();
    assert_eq!(second.achievements_completed, first.achievements_completed);
    assert_eq!(second.points_earned, first.points_earned);
    assert_eq!(second.status, first.status);
    assert_eq!(second.completed_at, first.completed_at);
    assert_eq!(second.items, first.items);

    assert_eq!(get_collection(&conn, collection).unwrap().completions_count, 1);
    let filter = FeedFilter {
        kind: Some(ActivityKind::CollectionCompleted),
        ..Default::default()
    };
    let completed = recent_activities(&conn, 10, &filter).unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].collection_id, Some(collection));
}

#[test]
fn joining_counts_the_participant_once() {
    let mut conn = open();
    let curator = add_user(&conn, "curator");
    let player = add_user(&conn, "player");
    let (collection, _, _) = two_item_collection(&conn, curator);

    let progress = join_collection(&mut conn, player, collection).unwrap();
    assert_eq!(progress.status, ProgressStatus::NotStarted);
    join_collection(&mut conn, player, collection).unwrap();

    assert_eq!(get_collection(&conn, collection).unwrap().participants_count, 1);
}

#[test]
fn refresh_covers_only_joined_collections() {
    let mut conn = open();
    let curator = add_user(&conn, "curator");
    let player = add_user(&conn, "player");
    let (joined, ten, _) = two_item_collection(&conn, curator);
    create_collection(&conn, &new_collection(curator, "Never joined")).unwrap();
    assert!(refresh_joined_collections(&mut conn, player).unwrap().is_empty());

    join_collection(&mut conn, player, joined).unwrap();
    import_shared(&mut conn, player, ten).unwrap();

    let refreshed = refresh_joined_collections(&mut conn, player).unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].collection_id, joined);
    assert_eq!(refreshed[0].points_earned, 10);
    assert_eq!(refreshed[0].status, ProgressStatus::InProgress);
}

#[test]
fn empty_collection_is_not_started() {
    let mut conn = open();
    let curator = add_user(&conn, "curator");
    let collection = create_collection(&conn, &new_collection(curator, "Empty")).unwrap();

    let progress = recompute_collection_progress(&mut conn, curator, collection.id).unwrap();
    assert_eq!(progress.status, ProgressStatus::NotStarted);
    assert_eq!(progress.total_points, 0);
    assert_eq!(progress.completion_percentage(), 0.0);
    assert_eq!(progress.completed_at, None);
}

#[test]
fn duplicate_items_are_rejected() {
    let conn = open();
    let curator = add_user(&conn, "curator");
    let (collection, ten, _) = two_item_collection(&conn, curator);

    let err = add_collection_item(&conn, collection, ten, 5, false, 50).unwrap_err();
    assert!(matches!(err, MetaAchieverError::Database(_)));
    assert!(matches!(
        add_collection_item(&conn, collection, 9999, 0, true, 10),
        Err(MetaAchieverError::NotFound(_))
    ));
}

#[test]
fn items_are_read_in_display_order() {
    let conn = open();
    let curator = add_user(&conn, "curator");
    let a = share_new(&conn, curator, "A", &[]);
    let b = share_new(&conn, curator, "B", &[]);
    let collection = create_collection(&conn, &new_collection(curator, "Ordered")).unwrap();
    add_collection_item(&conn, collection.id, a.id, 2, true, 10).unwrap();
    add_collection_item(&conn, collection.id, b.id, 1, true, 10).unwrap();

    let order: Vec<i64> = collections::items_for(&conn, collection.id)
        .unwrap()
        .iter()
        .map(|i| i.shared_definition_id)
        .collect();
    assert_eq!(order, vec![b.id, a.id]);
}

#[test]
fn current_listing_respects_flag_and_window() {
    let conn = open();
    let curator = add_user(&conn, "curator");
    let now = Utc::now();

    let open_ended = create_collection(&conn, &new_collection(curator, "Always")).unwrap();
    let mut past = new_collection(curator, "Last year");
    past.start_date = Some(now - Duration::days(400));
    past.end_date = Some(now - Duration::days(300));
    let past = create_collection(&conn, &past).unwrap();
    let retired = create_collection(&conn, &new_collection(curator, "Retired")).unwrap();
    assert!(!set_collection_active(&conn, retired.id, false).unwrap().is_active);

    let current: Vec<i64> = list_collections(&conn, true).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(current, vec![open_ended.id]);
    assert_eq!(list_collections(&conn, false).unwrap().len(), 3);
    assert!(!current.contains(&past.id));

    set_collection_active(&conn, retired.id, true).unwrap();
    assert_eq!(list_collections(&conn, true).unwrap().len(), 2);
    assert!(matches!(set_collection_active(&conn, 9999, false), Err(MetaAchieverError::NotFound(_))));
}

#[test]
fn collection_window_must_be_ordered() {
    let conn = open();
    let curator = add_user(&conn, "curator");
    let mut backwards = new_collection(curator, "Backwards");
    backwards.start_date = Some(Utc::now());
    backwards.end_date = Some(Utc::now() - Duration::days(1));
    assert!(matches!(
        create_collection(&conn, &backwards),
        Err(MetaAchieverError::InvalidData(_))
    ));
}
