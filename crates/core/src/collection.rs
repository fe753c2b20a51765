//! Collection progress computation
//!
//! Progress is always recomputed from the full item list; the previous
//! record only contributes its start and completion timestamps.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::{CollectionItem, CollectionProgress, ItemProgress, ProgressStatus};

/// Fresh progress plus whether this recomputation completed the collection
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: CollectionProgress,
    pub newly_completed: bool,
}

/// Recompute a user's standing in a collection.
///
/// `imports` maps a shared definition id to the time the user imported it.
pub fn compute_progress(
    user_id: i64,
    collection_id: i64,
    items: &[CollectionItem],
    imports: &HashMap<i64, DateTime<Utc>>,
    previous: Option<&CollectionProgress>,
    now: DateTime<Utc>,
) -> ProgressUpdate {
    let total_achievements = items.len() as i64;
    let total_points: i64 = items.iter().map(|item| item.point_value).sum();

    let mut achievements_completed = 0;
    let mut points_earned = 0;
    let mut completed_items = BTreeMap::new();
    for item in items {
        if let Some(imported_at) = imports.get(&item.shared_definition_id) {
            achievements_completed += 1;
            points_earned += item.point_value;
            completed_items.insert(
                item.id,
                ItemProgress {
                    completed: true,
                    completed_at: *imported_at,
                    points: item.point_value,
                },
            );
        }
    }

    let status = if total_achievements > 0 && achievements_completed == total_achievements {
        ProgressStatus::Completed
    } else if achievements_completed > 0 {
        ProgressStatus::InProgress
    } else {
        ProgressStatus::NotStarted
    };

    // The completion stamp is written once and survives later regressions.
    let previous_completed_at = previous.and_then(|p| p.completed_at);
    let newly_completed = status == ProgressStatus::Completed && previous_completed_at.is_none();
    let completed_at = if newly_completed { Some(now) } else { previous_completed_at };

    ProgressUpdate {
        progress: CollectionProgress {
            user_id,
            collection_id,
            achievements_completed,
            total_achievements,
            points_earned,
            total_points,
            status,
            started_at: previous.map(|p| p.started_at).unwrap_or(now),
            completed_at,
            last_activity: now,
            items: completed_items,
        },
        newly_completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(id: i64, shared: i64, points: i64) -> CollectionItem {
        CollectionItem {
            id,
            collection_id: 1,
            shared_definition_id: shared,
            order_index: id as i32,
            is_required: true,
            point_value: points,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn one_of_two_items_imported() {
        let items = vec![item(1, 100, 10), item(2, 200, 20)];
        let imports = HashMap::from([(100, t0())]);
        let update = compute_progress(7, 1, &items, &imports, None, t0());
        let p = &update.progress;
        assert_eq!(p.achievements_completed, 1);
        assert_eq!(p.total_achievements, 2);
        assert_eq!(p.points_earned, 10);
        assert_eq!(p.total_points, 30);
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.completion_percentage(), 50.0);
        assert_eq!(p.points_percentage(), 33.3);
        assert_eq!(p.items.len(), 1);
        assert!(!update.newly_completed);
    }

    #[test]
    fn empty_collection_is_not_started() {
        let update = compute_progress(7, 1, &[], &HashMap::new(), None, t0());
        assert_eq!(update.progress.status, ProgressStatus::NotStarted);
        assert_eq!(update.progress.completion_percentage(), 0.0);
        assert_eq!(update.progress.points_percentage(), 0.0);
        assert!(!update.newly_completed);
    }

    #[test]
    fn completion_stamp_is_set_once() {
        let items = vec![item(1, 100, 10)];
        let imports = HashMap::from([(100, t0())]);
        let first = compute_progress(7, 1, &items, &imports, None, t0());
        assert!(first.newly_completed);
        assert_eq!(first.progress.completed_at, Some(t0()));

        let later = t0() + Duration::hours(5);
        let second = compute_progress(7, 1, &items, &imports, Some(&first.progress), later);
        assert!(!second.newly_completed);
        assert_eq!(second.progress.completed_at, Some(t0()));
        assert_eq!(second.progress.started_at, t0());
        assert_eq!(second.progress.status, first.progress.status);
        assert_eq!(second.progress.points_earned, first.progress.points_earned);
    }

    #[test]
    fn losing_an_import_keeps_the_completion_stamp() {
        let items = vec![item(1, 100, 10), item(2, 200, 5)];
        let all = HashMap::from([(100, t0()), (200, t0())]);
        let done = compute_progress(7, 1, &items, &all, None, t0());
        assert_eq!(done.progress.status, ProgressStatus::Completed);

        let partial = HashMap::from([(100, t0())]);
        let update = compute_progress(7, 1, &items, &partial, Some(&done.progress), t0());
        assert_eq!(update.progress.status, ProgressStatus::InProgress);
        assert_eq!(update.progress.completed_at, Some(t0()));
    }
}
