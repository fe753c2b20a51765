mod common;

use common::*;
use meta_achiever_backend::db::activity::{log_activity, recent_activities, FeedFilter};
use meta_achiever_backend::db::shared;
use meta_achiever_backend::definitions::{create_definition, delete_definition, evaluate_definitions};
use meta_achiever_backend::registry::{import_shared, ImportOutcome};
use meta_achiever_core::{ActivityKind, Condition, MetaAchieverError, NewActivity, NewDefinition};
use rstest::rstest;

#[rstest]
#[case("", "Own every Portal game")]
#[case("   ", "Own every Portal game")]
#[case("Portal fan", "")]
#[case("Portal fan", "\t")]
fn blank_name_or_description_is_rejected(#[case] name: &str, #[case] description: &str) {
    let conn = open();
    let user = add_user(&conn, "ada");
    let result = create_definition(
        &conn,
        user,
        NewDefinition {
            name: name.to_string(),
            description: description.to_string(),
            condition: Condition::AllGamesOwned { games: ids(&["400"]) },
            image: None,
        },
    );
    assert!(matches!(result, Err(MetaAchieverError::InvalidData(_))));
}

#[test]
fn creating_trims_and_logs() {
    let conn = open();
    let user = add_user(&conn, "ada");
    let def = create(&conn, user, "  Portal fan  ", Condition::AllGamesOwned { games: ids(&["400"]) });
    assert_eq!(def.name, "Portal fan");
    assert_eq!(def.completed_at, None);

    let feed = recent_activities(&conn, 10, &FeedFilter::default()).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, ActivityKind::DefinitionCreated);
    assert_eq!(feed[0].definition_id, Some(def.id));
    assert_eq!(feed[0].username, "ada");
}

#[test]
fn deleting_someone_elses_definition_is_not_found() {
    let conn = open();
    let ada = add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    let def = create(&conn, ada, "Mine", Condition::AllGamesOwned { games: vec![] });

    assert!(matches!(delete_definition(&conn, bob, def.id), Err(MetaAchieverError::NotFound(_))));
    delete_definition(&conn, ada, def.id).unwrap();
    assert!(matches!(delete_definition(&conn, ada, def.id), Err(MetaAchieverError::NotFound(_))));
}

#[test]
fn evaluation_reports_progress_and_game_names() {
    let mut conn = open();
    let user = add_user(&conn, "ada");
    own_game(&conn, user, "10", 120, 4, 4);
    own_game(&conn, user, "20", 60, 4, 1);
    create(&conn, user, "Owned", Condition::AllGamesOwned { games: ids(&["10", "20", "30"]) });
    create(&conn, user, "Playtime", Condition::TotalPlaytime { games: ids(&["10", "20"]), target_hours: 6.0 });
    create(&conn, user, "Mystery", Condition::from_parts("speedrun", Default::default()));

    let results = evaluate_definitions(&mut conn, user).unwrap();
    let by_name = |name: &str| results.iter().find(|r| r.definition.name == name).unwrap();

    let owned = by_name("Owned");
    assert!(!owned.evaluation.complete);
    assert_eq!(owned.evaluation.progress, 66.67);
    assert_eq!(owned.game_names, vec!["Game 10", "Game 20", "App 30"]);

    let playtime = by_name("Playtime");
    assert!(!playtime.evaluation.complete);
    assert_eq!(playtime.evaluation.progress, 50.0);

    let mystery = by_name("Mystery");
    assert!(!mystery.evaluation.complete);
    assert_eq!(mystery.evaluation.progress, 0.0);
}

#[test]
fn first_completion_is_recorded_once() {
    let mut conn = open();
    let alice = add_user(&conn, "alice");
    let bob = add_user(&conn, "bob");
    let snapshot = share_new(&conn, alice, "Own Portal", &["400"]);
    let ImportOutcome::Imported(copy) = import_shared(&mut conn, bob, snapshot.id).unwrap() else {
        panic!("import failed");
    };
    own_game(&conn, bob, "400", 10, 0, 0);

    let first = evaluate_definitions(&mut conn, bob).unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].evaluation.complete);
    assert!(first[0].newly_completed);
    let stamp = first[0].definition.completed_at;
    assert!(stamp.is_some());

    let second = evaluate_definitions(&mut conn, bob).unwrap();
    assert!(!second[0].newly_completed);
    assert_eq!(second[0].definition.completed_at, stamp);

    assert_eq!(shared::get_shared(&conn, snapshot.id).unwrap().unwrap().completions_count, 1);
    let unlocks = recent_activities(
        &conn,
        10,
        &FeedFilter {
            user_id: Some(bob),
            kind: Some(ActivityKind::DefinitionUnlocked),
            include_private: false,
        },
    )
    .unwrap();
    assert_eq!(unlocks.len(), 1);
    assert_eq!(unlocks[0].definition_id, Some(copy.id));
}

#[test]
fn feed_is_newest_first_and_hides_private_entries() {
    let conn = open();
    let ada = add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    let at = chrono::Utc::now();

    let first = log_activity(&conn, &NewActivity::new(ada, ActivityKind::DefinitionCreated, "one"), at).unwrap();
    let second = log_activity(&conn, &NewActivity::new(bob, ActivityKind::DefinitionShared, "two"), at).unwrap();
    let mut private = NewActivity::new(ada, ActivityKind::DefinitionImported, "secret");
    private.is_public = false;
    private.metadata = serde_json::json!({ "source": "test" });
    let hidden = log_activity(&conn, &private, at).unwrap();

    let public: Vec<i64> = recent_activities(&conn, 10, &FeedFilter::default())
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(public, vec![second, first]);

    let everything = recent_activities(&conn, 10, &FeedFilter { include_private: true, ..Default::default() }).unwrap();
    assert_eq!(everything[0].id, hidden);
    assert_eq!(everything[0].metadata["source"], "test");

    let only_ada = FeedFilter { user_id: Some(ada), include_private: true, ..Default::default() };
    assert_eq!(recent_activities(&conn, 10, &only_ada).unwrap().len(), 2);
    assert_eq!(recent_activities(&conn, 1, &only_ada).unwrap()[0].id, hidden);
}

#[test]
fn corrupt_condition_payload_is_never_unlocked() {
    let mut conn = open();
    let user = add_user(&conn, "ada");
    conn.execute(
        "INSERT INTO achievement_definitions
            (user_id, name, description, condition_type, condition_data, created_at)
         VALUES (?1, 'Broken', 'x', 'all_games_owned', 'not json', ?2)",
        rusqlite::params![user, chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)],
    )
    .unwrap();

    let results = evaluate_definitions(&mut conn, user).unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].evaluation.complete);
    assert!(!results[0].newly_completed);
    assert_eq!(results[0].definition.completed_at, None);

    let unlocks = FeedFilter { kind: Some(ActivityKind::DefinitionUnlocked), ..Default::default() };
    assert!(recent_activities(&conn, 10, &unlocks).unwrap().is_empty());
}
