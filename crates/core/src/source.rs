//! Achievement data source abstraction
//!
//! The sync pipeline only talks to this trait; the backend implements it
//! against the Steam Web API.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Achievement, AchievementSchema, SteamGame};

#[async_trait]
pub trait AchievementSource: Send + Sync {
    /// Owned games for an account, including free games that were played
    async fn owned_games(&self, api_key: &str, account_id: &str) -> Result<Vec<SteamGame>>;

    /// Unlock state of every achievement of one game for an account
    async fn player_achievements(
        &self,
        api_key: &str,
        account_id: &str,
        app_id: &str,
    ) -> Result<Vec<Achievement>>;

    /// Display metadata for the achievements of one game
    async fn achievement_schema(&self, api_key: &str, app_id: &str) -> Result<Vec<AchievementSchema>>;
}
