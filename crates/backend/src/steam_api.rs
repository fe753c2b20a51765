//! Steam Web API client

use std::time::Duration;

use async_trait::async_trait;
use meta_achiever_core::{
    Achievement, AchievementSchema, AchievementSource, MetaAchieverError, Result, SteamGame,
};
use serde::de::DeserializeOwned;

use crate::error::http_error;

const API_OWNED_GAMES: &str = "https://api.steampowered.com/IPlayerService/GetOwnedGames/v1/";
const API_ACHIEVEMENTS: &str = "https://api.steampowered.com/ISteamUserStats/GetPlayerAchievements/v1/";
const API_SCHEMA: &str = "https://api.steampowered.com/ISteamUserStats/GetSchemaForGame/v2/";

/// [`AchievementSource`] backed by the public Steam Web API
pub struct SteamClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl SteamClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetaAchieverError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetaAchieverError::SteamApi(format!(
                "{} returned {}",
                url.split('?').next().unwrap_or(url),
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MetaAchieverError::SteamApi(format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl AchievementSource for SteamClient {
    async fn owned_games(&self, api_key: &str, account_id: &str) -> Result<Vec<SteamGame>> {
        let input = serde_json::json!({
            "steamid": account_id,
            "include_appinfo": true,
            "include_played_free_games": true
        });

        let url = format!(
            "{}?key={}&input_json={}&format=json",
            API_OWNED_GAMES,
            urlencoding::encode(api_key),
            urlencoding::encode(&input.to_string())
        );

        let body = self.get_json(&url).await?;
        Ok(parse_owned_games(&body))
    }

    async fn player_achievements(
        &self,
        api_key: &str,
        account_id: &str,
        app_id: &str,
    ) -> Result<Vec<Achievement>> {
        let url = format!(
            "{}?appid={}&key={}&steamid={}&format=json",
            API_ACHIEVEMENTS,
            urlencoding::encode(app_id),
            urlencoding::encode(api_key),
            urlencoding::encode(account_id)
        );

        let body = self.get_json(&url).await?;
        Ok(parse_player_achievements(&body))
    }

    async fn achievement_schema(&self, api_key: &str, app_id: &str) -> Result<Vec<AchievementSchema>> {
        let url = format!(
            "{}?appid={}&key={}&format=json",
            API_SCHEMA,
            urlencoding::encode(app_id),
            urlencoding::encode(api_key)
        );

        let body = self.get_json(&url).await?;
        Ok(parse_schema(&body))
    }
}

/// Entries that do not deserialize are dropped rather than failing the list
fn array_at<T: DeserializeOwned>(value: &serde_json::Value) -> Vec<T> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_owned_games(body: &serde_json::Value) -> Vec<SteamGame> {
    array_at(&body["response"]["games"])
}

pub fn parse_player_achievements(body: &serde_json::Value) -> Vec<Achievement> {
    array_at(&body["playerstats"]["achievements"])
}

pub fn parse_schema(body: &serde_json::Value) -> Vec<AchievementSchema> {
    array_at(&body["game"]["availableGameStats"]["achievements"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owned_games_tolerate_missing_names() {
        let body = json!({
            "response": {
                "game_count": 2,
                "games": [
                    { "appid": 400, "name": "Portal", "playtime_forever": 310 },
                    { "appid": 570, "playtime_forever": 0 },
                    { "name": "no appid" }
                ]
            }
        });
        let games = parse_owned_games(&body);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].display_name(), "Portal");
        assert_eq!(games[1].display_name(), "App 570");
    }

    #[test]
    fn empty_library_response_has_no_games() {
        assert!(parse_owned_games(&json!({ "response": {} })).is_empty());
    }

    #[test]
    fn achievements_and_schema_are_read_from_their_envelopes() {
        let achievements = parse_player_achievements(&json!({
            "playerstats": {
                "steamID": "7656",
                "achievements": [
                    { "apiname": "ACH_WIN", "achieved": 1, "unlocktime": 1700000000 },
                    { "apiname": "ACH_LOSE", "achieved": 0, "unlocktime": 0 }
                ]
            }
        }));
        assert_eq!(achievements.len(), 2);
        assert_eq!(achievements[0].achieved, 1);

        let schema = parse_schema(&json!({
            "game": {
                "availableGameStats": {
                    "achievements": [
                        { "name": "ACH_WIN", "displayName": "Winner", "description": "Win once" },
                        { "name": "ACH_LOSE", "displayName": "Loser" }
                    ]
                }
            }
        }));
        assert_eq!(schema[0].display_name, "Winner");
        assert_eq!(schema[1].description, None);
    }
}
