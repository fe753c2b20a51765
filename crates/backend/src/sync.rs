//! Library sync pipeline
//!
//! Pulls a user's owned games and per-game achievement state from an
//! [`AchievementSource`] and upserts them into SQLite. Network calls run
//! with no transaction open; fetched games are buffered and written one
//! batch per transaction, so a failed batch rolls back alone and the run
//! carries on with the next one.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use meta_achiever_core::{
    Achievement, AchievementSchema, AchievementSource, AchievementUnlock, MetaAchieverError, Result,
    SteamGame, SyncReport, User,
};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::config::SyncSettings;
use crate::db::{games, locks, users};
use crate::error::DbResultExt;

/// Runtime knobs for one sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Games per database transaction
    pub batch_size: usize,
    /// Pause between games, to stay within Steam's fair-use limits
    pub request_delay: Duration,
    pub request_timeout: Duration,
    /// Age after which another run's lock is considered abandoned
    pub lock_ttl: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            request_delay: settings.request_delay(),
            request_timeout: settings.request_timeout(),
            lock_ttl: settings.lock_ttl(),
        }
    }
}

/// API key and account id for the upstream API, both non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    account_id: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, account_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        let account_id = account_id.into().trim().to_string();
        if api_key.is_empty() {
            return Err(MetaAchieverError::Config("Steam API key is not configured".to_string()));
        }
        if account_id.is_empty() {
            return Err(MetaAchieverError::Config("Steam account is not linked".to_string()));
        }
        Ok(Self { api_key, account_id })
    }

    /// The user's own key wins over the configured default
    pub fn for_user(user: &User, default_api_key: Option<&str>) -> Result<Self> {
        let api_key = user
            .steam_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(default_api_key)
            .unwrap_or_default();
        Self::new(api_key, user.steam_id.clone().unwrap_or_default())
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

/// One game's fetched state, waiting to be written
#[derive(Debug, Clone)]
struct GameSnapshot {
    app_id: String,
    name: String,
    playtime_minutes: u32,
    unlocks: Vec<AchievementUnlock>,
}

impl GameSnapshot {
    fn new(game: &SteamGame, unlocks: Vec<AchievementUnlock>) -> Self {
        Self {
            app_id: game.appid.to_string(),
            name: game.display_name(),
            playtime_minutes: game.playtime_forever,
            unlocks,
        }
    }

    fn achievement_counts(&self) -> (u32, u32) {
        let total = self.unlocks.len() as u32;
        let unlocked = self.unlocks.iter().filter(|u| u.achieved).count() as u32;
        (total, unlocked)
    }
}

/// Look up the user, resolve credentials and run a sync
pub async fn sync_user(
    conn: &mut Connection,
    source: &dyn AchievementSource,
    user_id: i64,
    default_api_key: Option<&str>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let user = users::get_user(conn, user_id)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("user {}", user_id)))?;
    let credentials = Credentials::for_user(&user, default_api_key)?;
    sync_user_library(conn, source, user_id, &credentials, options).await
}

/// Sync one user's library under their sync lock. The lock is released
/// whatever the outcome.
pub async fn sync_user_library(
    conn: &mut Connection,
    source: &dyn AchievementSource,
    user_id: i64,
    credentials: &Credentials,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let ttl = chrono::Duration::from_std(options.lock_ttl).unwrap_or_else(|_| chrono::Duration::minutes(30));
    if !locks::try_acquire_sync_lock(conn, user_id, Utc::now(), ttl).db_err()? {
        warn!(user_id, "Sync rejected, another sync holds the lock");
        return Err(MetaAchieverError::SyncInProgress(user_id));
    }

    let result = run_sync(conn, source, user_id, credentials, options).await;

    if let Err(e) = locks::release_sync_lock(conn, user_id) {
        error!(user_id, error = %e, "Failed to release sync lock");
    }
    result
}

async fn run_sync(
    conn: &mut Connection,
    source: &dyn AchievementSource,
    user_id: i64,
    credentials: &Credentials,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let started = Instant::now();
    info!(user_id, account = %credentials.account_id, "Starting library sync");

    let owned = with_timeout(
        options.request_timeout,
        source.owned_games(&credentials.api_key, &credentials.account_id),
    )
    .await
    .map_err(|e| {
        error!(user_id, error = %e, "Failed to fetch owned games");
        e
    })?;

    let mut seen = HashSet::new();
    let owned: Vec<SteamGame> = owned.into_iter().filter(|g| seen.insert(g.appid)).collect();
    info!(user_id, games = owned.len(), "Fetched owned games");

    let mut report = SyncReport::default();
    let mut pending: Vec<GameSnapshot> = Vec::with_capacity(options.batch_size);
    let mut batch_number = 0;

    for (index, game) in owned.iter().enumerate() {
        if index > 0 && !options.request_delay.is_zero() {
            tokio::time::sleep(options.request_delay).await;
        }

        let snapshot = fetch_game(source, credentials, game, options.request_timeout).await;
        report.games_processed += 1;
        report.achievements_found += snapshot.unlocks.len();
        if !snapshot.unlocks.is_empty() {
            report.games_with_achievements += 1;
        }
        pending.push(snapshot);

        if pending.len() >= options.batch_size {
            batch_number += 1;
            match write_batch(conn, user_id, &pending, Utc::now()) {
                Ok(()) => {
                    report.games_committed += pending.len();
                    debug!(user_id, batch = batch_number, games = pending.len(), "Committed batch");
                }
                Err(e) => {
                    warn!(user_id, batch = batch_number, error = %e, "Batch rolled back, continuing");
                    report.failed_batches.push(describe_batch(batch_number, &pending, &e));
                }
            }
            pending.clear();
        }
    }

    if !pending.is_empty() {
        batch_number += 1;
        if let Err(e) = write_batch(conn, user_id, &pending, Utc::now()) {
            error!(user_id, batch = batch_number, error = %e, "Final batch failed to commit");
            let mut failed_batches = std::mem::take(&mut report.failed_batches);
            failed_batches.push(describe_batch(batch_number, &pending, &e));
            return Err(MetaAchieverError::PartialSync {
                committed_games: report.games_committed,
                failed_batches,
            });
        }
        report.games_committed += pending.len();
    }

    report.elapsed = started.elapsed();
    info!(
        user_id,
        games = report.games_processed,
        achievements = report.achievements_found,
        failed_batches = report.failed_batches.len(),
        "Library sync finished"
    );
    Ok(report)
}

fn describe_batch(number: usize, batch: &[GameSnapshot], err: &rusqlite::Error) -> String {
    let first = batch.first().map(|g| g.app_id.as_str()).unwrap_or("-");
    let last = batch.last().map(|g| g.app_id.as_str()).unwrap_or("-");
    format!("batch {} (apps {}..{}): {}", number, first, last, err)
}

async fn with_timeout<T>(limit: Duration, request: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| MetaAchieverError::Timeout(limit))?
}

/// Fetch achievements and schema for one game. Any failure degrades to a
/// game with no achievements.
async fn fetch_game(
    source: &dyn AchievementSource,
    credentials: &Credentials,
    game: &SteamGame,
    timeout: Duration,
) -> GameSnapshot {
    let app_id = game.appid.to_string();

    let achievements = match with_timeout(
        timeout,
        source.player_achievements(&credentials.api_key, &credentials.account_id, &app_id),
    )
    .await
    {
        Ok(list) => list,
        Err(e) => {
            warn!(app_id = %app_id, error = %e, "Skipping achievements for game");
            return GameSnapshot::new(game, Vec::new());
        }
    };

    if achievements.is_empty() {
        return GameSnapshot::new(game, Vec::new());
    }

    let schema = match with_timeout(timeout, source.achievement_schema(&credentials.api_key, &app_id)).await {
        Ok(schema) => schema,
        Err(e) => {
            warn!(app_id = %app_id, error = %e, "Skipping achievements for game, schema unavailable");
            return GameSnapshot::new(game, Vec::new());
        }
    };

    GameSnapshot::new(game, merge_schema(&achievements, &schema))
}

/// Attach display metadata to unlock state by achievement key
pub fn merge_schema(achievements: &[Achievement], schema: &[AchievementSchema]) -> Vec<AchievementUnlock> {
    let by_name: HashMap<&str, &AchievementSchema> =
        schema.iter().map(|s| (s.name.as_str(), s)).collect();

    achievements
        .iter()
        .map(|ach| {
            let meta = by_name.get(ach.apiname.as_str());
            let display_name = meta
                .map(|m| m.display_name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| ach.apiname.clone());
            let description = meta.and_then(|m| m.description.clone()).unwrap_or_default();
            AchievementUnlock {
                apiname: ach.apiname.clone(),
                display_name,
                description,
                achieved: ach.achieved == 1,
                unlock_time: unlock_time(ach.unlocktime),
            }
        })
        .collect()
}

fn unlock_time(epoch: u32) -> Option<DateTime<Utc>> {
    if epoch == 0 {
        return None;
    }
    DateTime::from_timestamp(i64::from(epoch), 0)
}

fn write_batch(
    conn: &mut Connection,
    user_id: i64,
    batch: &[GameSnapshot],
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for snapshot in batch {
        let game_id = games::resolve_game(&tx, &snapshot.app_id, &snapshot.name, now)?;
        for unlock in &snapshot.unlocks {
            games::upsert_unlock(&tx, user_id, game_id, unlock)?;
        }
        let (total, unlocked) = snapshot.achievement_counts();
        games::upsert_library_entry(&tx, user_id, game_id, snapshot.playtime_minutes, total, unlocked, now)?;
    }
    tx.commit()
}
