//! Shared data models used by the backend and the evaluator

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Round to a fixed number of decimal places, the way percentages are displayed
pub fn round_places(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ============================================================================
// Steam Web API payloads
// ============================================================================

/// Raw game data from the owned-games endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteamGame {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_forever: u32,
}

impl SteamGame {
    /// Display name, falling back to `App <id>` when Steam sent none
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("App {}", self.appid)
        } else {
            self.name.clone()
        }
    }
}

/// Achievement progress from the player achievements endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub apiname: String,
    #[serde(default)]
    pub achieved: u8,
    #[serde(default)]
    pub unlocktime: u32,
}

/// Achievement definition from the game schema endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementSchema {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Library state
// ============================================================================

/// A game in the shared catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub app_id: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
}

/// A user's library row for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub app_id: String,
    pub game_name: String,
    pub playtime_minutes: u32,
    pub achievements_total: u32,
    pub achievements_unlocked: u32,
    pub last_synced: DateTime<Utc>,
}

impl LibraryEntry {
    pub fn playtime_hours(&self) -> f64 {
        self.owned_game().playtime_hours()
    }

    pub fn completion_percent(&self) -> f64 {
        self.owned_game().completion_percent()
    }

    pub fn owned_game(&self) -> OwnedGame {
        OwnedGame {
            playtime_minutes: self.playtime_minutes,
            achievements_total: self.achievements_total,
            achievements_unlocked: self.achievements_unlocked,
        }
    }
}

/// The part of a library row the condition evaluator looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnedGame {
    pub playtime_minutes: u32,
    pub achievements_total: u32,
    pub achievements_unlocked: u32,
}

impl OwnedGame {
    pub fn playtime_hours(&self) -> f64 {
        round_places(f64::from(self.playtime_minutes) / 60.0, 2)
    }

    pub fn completion_percent(&self) -> f64 {
        if self.achievements_total == 0 {
            return 0.0;
        }
        round_places(
            f64::from(self.achievements_unlocked) / f64::from(self.achievements_total) * 100.0,
            2,
        )
    }

    pub fn is_complete(&self) -> bool {
        self.achievements_total > 0 && self.achievements_unlocked >= self.achievements_total
    }
}

/// Stored unlock state for one achievement of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub apiname: String,
    pub display_name: String,
    pub description: String,
    pub achieved: bool,
    pub unlock_time: Option<DateTime<Utc>>,
}

// ============================================================================
// Users and custom achievements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub steam_id: Option<String>,
    pub steam_api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where an imported definition came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Cleared when the shared snapshot is deleted
    pub shared_id: Option<i64>,
    pub original_creator: String,
}

/// A custom meta-achievement owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub provenance: Option<Provenance>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AchievementDefinition {
    pub fn imported_from(&self) -> Option<i64> {
        self.provenance.as_ref().and_then(|p| p.shared_id)
    }
}

/// Fields a user supplies when authoring a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDefinition {
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub image: Option<String>,
}

/// Community copy of a definition, frozen at share time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedDefinition {
    pub id: i64,
    pub creator_id: i64,
    pub creator_name: String,
    pub original_definition_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub image: Option<String>,
    pub tries_count: i64,
    pub completions_count: i64,
    pub is_active: bool,
    pub shared_at: DateTime<Utc>,
}

impl SharedDefinition {
    pub fn popularity(&self) -> i64 {
        self.tries_count + self.completions_count
    }
}

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub collection_type: String,
    pub difficulty: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub participants_count: i64,
    pub completions_count: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Active flag set and `now` inside the optional scheduling window
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCollection {
    pub name: String,
    pub description: String,
    pub collection_type: String,
    pub difficulty: String,
    pub is_featured: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i64,
    pub collection_id: i64,
    pub shared_definition_id: i64,
    pub order_index: i32,
    pub is_required: bool,
    pub point_value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not-started",
            ProgressStatus::InProgress => "in-progress",
            ProgressStatus::Completed => "completed",
        }
    }

    /// Unknown values read back as `NotStarted`; accepts the legacy underscore spelling
    pub fn parse(value: &str) -> Self {
        match value {
            "in-progress" | "in_progress" => ProgressStatus::InProgress,
            "completed" => ProgressStatus::Completed,
            _ => ProgressStatus::NotStarted,
        }
    }
}

/// Completion record for one collection item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub completed: bool,
    pub completed_at: DateTime<Utc>,
    pub points: i64,
}

/// Cached standing of one user in one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionProgress {
    pub user_id: i64,
    pub collection_id: i64,
    pub achievements_completed: i64,
    pub total_achievements: i64,
    pub points_earned: i64,
    pub total_points: i64,
    pub status: ProgressStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    /// Keyed by collection item id
    pub items: BTreeMap<i64, ItemProgress>,
}

impl CollectionProgress {
    pub fn completion_percentage(&self) -> f64 {
        percentage_1dp(self.achievements_completed, self.total_achievements)
    }

    pub fn points_percentage(&self) -> f64 {
        percentage_1dp(self.points_earned, self.total_points)
    }
}

fn percentage_1dp(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_places(part as f64 / whole as f64 * 100.0, 1)
}

// ============================================================================
// Activity feed
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    DefinitionCreated,
    DefinitionShared,
    DefinitionImported,
    DefinitionUnlocked,
    CollectionCompleted,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::DefinitionCreated => "definition-created",
            ActivityKind::DefinitionShared => "definition-shared",
            ActivityKind::DefinitionImported => "definition-imported",
            ActivityKind::DefinitionUnlocked => "definition-unlocked",
            ActivityKind::CollectionCompleted => "collection-completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "definition-created" => Some(ActivityKind::DefinitionCreated),
            "definition-shared" => Some(ActivityKind::DefinitionShared),
            "definition-imported" => Some(ActivityKind::DefinitionImported),
            "definition-unlocked" => Some(ActivityKind::DefinitionUnlocked),
            "collection-completed" => Some(ActivityKind::CollectionCompleted),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::DefinitionCreated => "Created Achievement",
            ActivityKind::DefinitionShared => "Shared Achievement",
            ActivityKind::DefinitionImported => "Imported Achievement",
            ActivityKind::DefinitionUnlocked => "Achievement Unlocked",
            ActivityKind::CollectionCompleted => "Collection Completed",
        }
    }
}

/// A feed entry to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub user_id: i64,
    pub kind: ActivityKind,
    pub title: String,
    pub description: Option<String>,
    pub definition_id: Option<i64>,
    pub shared_definition_id: Option<i64>,
    pub collection_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub is_public: bool,
}

impl NewActivity {
    pub fn new(user_id: i64, kind: ActivityKind, title: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            description: None,
            definition_id: None,
            shared_definition_id: None,
            collection_id: None,
            metadata: serde_json::Value::Object(Default::default()),
            is_public: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub kind: ActivityKind,
    pub title: String,
    pub description: Option<String>,
    pub definition_id: Option<i64>,
    pub shared_definition_id: Option<i64>,
    pub collection_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Sync reporting
// ============================================================================

/// Result of a library sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub games_processed: usize,
    pub games_committed: usize,
    pub achievements_found: usize,
    pub games_with_achievements: usize,
    /// Batches that were rolled back and skipped
    pub failed_batches: Vec<String>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        if self.games_processed == 0 {
            return "No games found in your Steam library".to_string();
        }
        let mut parts = vec![
            "Steam sync completed".to_string(),
            format!("Processed {} games", self.games_processed),
            format!("Found {} achievements", self.achievements_found),
            format!("{} games have achievements", self.games_with_achievements),
            format!("Sync took approximately {} seconds", self.elapsed.as_secs()),
        ];
        if !self.failed_batches.is_empty() {
            parts.push(format!("{} batches failed to save", self.failed_batches.len()));
        }
        parts.join(" • ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn playtime_hours_round_to_two_places() {
        let game = OwnedGame { playtime_minutes: 100, ..Default::default() };
        assert_eq!(game.playtime_hours(), 1.67);
    }

    #[test]
    fn completion_percent_is_zero_without_achievements() {
        let game = OwnedGame { playtime_minutes: 30, achievements_total: 0, achievements_unlocked: 0 };
        assert_eq!(game.completion_percent(), 0.0);
        assert!(!game.is_complete());
    }

    #[test]
    fn collection_window_bounds_activity() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut collection = Collection {
            id: 1,
            name: "Summer".into(),
            description: String::new(),
            collection_type: "seasonal".into(),
            difficulty: "medium".into(),
            is_active: true,
            is_featured: false,
            start_date: Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()),
            participants_count: 0,
            completions_count: 0,
            created_by: 1,
            created_at: now,
        };
        assert!(collection.is_currently_active(now));

        collection.end_date = Some(Utc.with_ymd_and_hms(2026, 5, 31, 0, 0, 0).unwrap());
        assert!(!collection.is_currently_active(now));

        collection.end_date = None;
        collection.is_active = false;
        assert!(!collection.is_currently_active(now));
    }

    #[test]
    fn empty_sync_summary_mentions_empty_library() {
        assert_eq!(SyncReport::default().summary(), "No games found in your Steam library");
    }

    #[test]
    fn status_parse_accepts_legacy_spelling() {
        assert_eq!(ProgressStatus::parse("in_progress"), ProgressStatus::InProgress);
        assert_eq!(ProgressStatus::parse("abandoned"), ProgressStatus::NotStarted);
    }
}
