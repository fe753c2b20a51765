#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use meta_achiever_backend::db::{self, games, users};
use meta_achiever_backend::sync::{Credentials, SyncOptions};
use meta_achiever_backend::{definitions, registry};
use meta_achiever_core::{
    Achievement, AchievementDefinition, AchievementSchema, AchievementSource, Condition, MetaAchieverError,
    NewDefinition, Result, SharedDefinition, SteamGame,
};
use rusqlite::Connection;

/// In-memory stand-in for the Steam Web API
#[derive(Default)]
pub struct FakeSource {
    pub games: Vec<SteamGame>,
    pub achievements: HashMap<String, Vec<Achievement>>,
    pub schemas: HashMap<String, Vec<AchievementSchema>>,
    /// Apps whose achievement request never completes
    pub hanging: HashSet<String>,
    /// Apps whose achievement request fails outright
    pub failing: HashSet<String>,
    /// Apps whose schema request never completes
    pub hanging_schema: HashSet<String>,
    /// Apps whose schema request fails outright
    pub failing_schema: HashSet<String>,
    pub owned_games_fails: bool,
    pub achievement_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_games(games: Vec<SteamGame>) -> Self {
        Self { games, ..Default::default() }
    }

    pub fn unlocks(mut self, app_id: &str, states: &[(&str, u8, u32)]) -> Self {
        let list = states
            .iter()
            .map(|(name, achieved, time)| Achievement {
                apiname: name.to_string(),
                achieved: *achieved,
                unlocktime: *time,
            })
            .collect();
        let schema = states
            .iter()
            .map(|(name, _, _)| AchievementSchema {
                name: name.to_string(),
                display_name: format!("{} title", name),
                description: Some(format!("{} description", name)),
            })
            .collect();
        self.achievements.insert(app_id.to_string(), list);
        self.schemas.insert(app_id.to_string(), schema);
        self
    }
}

#[async_trait]
impl AchievementSource for FakeSource {
    async fn owned_games(&self, _api_key: &str, _account_id: &str) -> Result<Vec<SteamGame>> {
        if self.owned_games_fails {
            return Err(MetaAchieverError::SteamApi("GetOwnedGames returned 403 Forbidden".into()));
        }
        Ok(self.games.clone())
    }

    async fn player_achievements(&self, _api_key: &str, _account_id: &str, app_id: &str) -> Result<Vec<Achievement>> {
        self.achievement_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(app_id) {
            return std::future::pending().await;
        }
        if self.failing.contains(app_id) {
            return Err(MetaAchieverError::SteamApi("GetPlayerAchievements returned 500".into()));
        }
        Ok(self.achievements.get(app_id).cloned().unwrap_or_default())
    }

    async fn achievement_schema(&self, _api_key: &str, app_id: &str) -> Result<Vec<AchievementSchema>> {
        if self.hanging_schema.contains(app_id) {
            return std::future::pending().await;
        }
        if self.failing_schema.contains(app_id) {
            return Err(MetaAchieverError::SteamApi("GetSchemaForGame returned 403 Forbidden".into()));
        }
        Ok(self.schemas.get(app_id).cloned().unwrap_or_default())
    }
}

pub fn steam_game(appid: u64, name: &str, minutes: u32) -> SteamGame {
    SteamGame {
        appid,
        name: name.to_string(),
        playtime_forever: minutes,
    }
}

pub fn fast_options(batch_size: usize) -> SyncOptions {
    SyncOptions {
        batch_size,
        request_delay: Duration::ZERO,
        request_timeout: Duration::from_millis(50),
        lock_ttl: Duration::from_secs(1800),
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("TESTKEY", "76561198000000001").unwrap()
}

pub fn open() -> Connection {
    db::open_in_memory().unwrap()
}

pub fn add_user(conn: &Connection, username: &str) -> i64 {
    users::create_user(conn, username, Some("76561198000000001"), Some("TESTKEY")).unwrap()
}

/// Put a game straight into a user's library, bypassing sync
pub fn own_game(conn: &Connection, user_id: i64, app_id: &str, minutes: u32, total: u32, unlocked: u32) {
    let game_id = games::resolve_game(conn, app_id, &format!("Game {}", app_id), Utc::now()).unwrap();
    games::upsert_library_entry(conn, user_id, game_id, minutes, total, unlocked, Utc::now()).unwrap();
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn create(conn: &Connection, user_id: i64, name: &str, condition: Condition) -> AchievementDefinition {
    definitions::create_definition(
        conn,
        user_id,
        NewDefinition {
            name: name.to_string(),
            description: format!("{} description", name),
            condition,
            image: None,
        },
    )
    .unwrap()
}

/// Create and share a definition, returning the shared snapshot
pub fn share_new(conn: &Connection, user_id: i64, name: &str, games: &[&str]) -> SharedDefinition {
    let def = create(conn, user_id, name, Condition::AllGamesOwned { games: ids(games) });
    match registry::share_definition(conn, user_id, def.id).unwrap() {
        registry::ShareOutcome::Shared(shared) => shared,
        other => panic!("expected a new share, got {:?}", other),
    }
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
