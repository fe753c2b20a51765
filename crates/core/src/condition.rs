//! Condition evaluation for custom meta-achievements
//!
//! A condition is evaluated against a [`LibrarySnapshot`] of one user and
//! yields an [`Evaluation`]: whether it is complete and a 0-100 progress
//! score rounded to two decimals. Evaluation never fails; unknown condition
//! kinds and games missing from the library degrade to "not complete".

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{round_places, OwnedGame};

/// The rule type of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    AllGamesComplete,
    AllGamesOwned,
    TotalPlaytime,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::AllGamesComplete => "all-games-complete",
            ConditionKind::AllGamesOwned => "all-games-owned",
            ConditionKind::TotalPlaytime => "total-playtime",
        }
    }

    /// Parse a stored kind tag, including the tags older rows were written with
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim() {
            "all-games-complete" | "all_games_100" => Some(ConditionKind::AllGamesComplete),
            "all-games-owned" | "all_games_owned" => Some(ConditionKind::AllGamesOwned),
            "total-playtime" | "playtime_total" => Some(ConditionKind::TotalPlaytime),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConditionKind::AllGamesComplete => "Complete all games (100%)",
            ConditionKind::AllGamesOwned => "Own all games",
            ConditionKind::TotalPlaytime => "Total playtime across games",
        }
    }
}

/// A custom achievement's completion rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ConditionRecord", from = "ConditionRecord")]
pub enum Condition {
    AllGamesComplete { games: Vec<String> },
    AllGamesOwned { games: Vec<String> },
    TotalPlaytime { games: Vec<String>, target_hours: f64 },
    /// A kind tag this build does not know; always evaluates as incomplete
    Unrecognized { kind: String, games: Vec<String> },
}

/// The JSON payload stored next to the kind tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionData {
    #[serde(default, deserialize_with = "lenient_games")]
    pub games: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub playtime_target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConditionRecord {
    kind: String,
    #[serde(flatten)]
    data: ConditionData,
}

impl From<Condition> for ConditionRecord {
    fn from(condition: Condition) -> Self {
        ConditionRecord {
            kind: condition.kind_tag().to_string(),
            data: condition.data(),
        }
    }
}

impl From<ConditionRecord> for Condition {
    fn from(record: ConditionRecord) -> Self {
        Condition::from_parts(&record.kind, record.data)
    }
}

impl Condition {
    pub fn from_parts(tag: &str, data: ConditionData) -> Self {
        let ConditionData { games, playtime_target } = data;
        match ConditionKind::parse(tag) {
            Some(ConditionKind::AllGamesComplete) => Condition::AllGamesComplete { games },
            Some(ConditionKind::AllGamesOwned) => Condition::AllGamesOwned { games },
            Some(ConditionKind::TotalPlaytime) => Condition::TotalPlaytime {
                games,
                target_hours: playtime_target,
            },
            None => Condition::Unrecognized {
                kind: tag.to_string(),
                games,
            },
        }
    }

    pub fn kind(&self) -> Option<ConditionKind> {
        match self {
            Condition::AllGamesComplete { .. } => Some(ConditionKind::AllGamesComplete),
            Condition::AllGamesOwned { .. } => Some(ConditionKind::AllGamesOwned),
            Condition::TotalPlaytime { .. } => Some(ConditionKind::TotalPlaytime),
            Condition::Unrecognized { .. } => None,
        }
    }

    /// Tag written to storage; unknown tags round-trip unchanged
    pub fn kind_tag(&self) -> &str {
        match self {
            Condition::Unrecognized { kind, .. } => kind,
            other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    /// Required games, in the order the author listed them
    pub fn games(&self) -> &[String] {
        match self {
            Condition::AllGamesComplete { games }
            | Condition::AllGamesOwned { games }
            | Condition::TotalPlaytime { games, .. }
            | Condition::Unrecognized { games, .. } => games,
        }
    }

    pub fn playtime_target(&self) -> f64 {
        match self {
            Condition::TotalPlaytime { target_hours, .. } => *target_hours,
            _ => 0.0,
        }
    }

    pub fn data(&self) -> ConditionData {
        ConditionData {
            games: self.games().to_vec(),
            playtime_target: self.playtime_target(),
        }
    }

    pub fn evaluate(&self, library: &LibrarySnapshot) -> Evaluation {
        match self {
            Condition::AllGamesComplete { games } => all_games_complete(games, library),
            Condition::AllGamesOwned { games } => all_games_owned(games, library),
            Condition::TotalPlaytime { games, target_hours } => {
                total_playtime(games, *target_hours, library)
            }
            Condition::Unrecognized { .. } => Evaluation::default(),
        }
    }
}

/// Outcome of evaluating a condition for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub complete: bool,
    /// 0-100, rounded to two decimals
    pub progress: f64,
}

impl Evaluation {
    fn new(complete: bool, progress: f64) -> Self {
        Self {
            complete,
            progress: round_places(progress.clamp(0.0, 100.0), 2),
        }
    }
}

/// A user's library keyed by external game id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibrarySnapshot {
    games: HashMap<String, OwnedGame>,
}

impl LibrarySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, app_id: impl Into<String>, game: OwnedGame) {
        self.games.insert(app_id.into(), game);
    }

    pub fn get(&self, app_id: &str) -> Option<&OwnedGame> {
        self.games.get(app_id)
    }

    pub fn owns(&self, app_id: &str) -> bool {
        self.games.contains_key(app_id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Share of `games` present in the library, as a percentage
    pub fn ownership_percent(&self, games: &[String]) -> f64 {
        all_games_owned(games, self).progress
    }
}

impl FromIterator<(String, OwnedGame)> for LibrarySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, OwnedGame)>>(iter: I) -> Self {
        Self {
            games: iter.into_iter().collect(),
        }
    }
}

fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn all_games_complete(games: &[String], library: &LibrarySnapshot) -> Evaluation {
    let completed = games
        .iter()
        .filter(|app_id| library.get(app_id).is_some_and(OwnedGame::is_complete))
        .count();
    Evaluation::new(completed == games.len(), ratio_percent(completed, games.len()))
}

fn all_games_owned(games: &[String], library: &LibrarySnapshot) -> Evaluation {
    let owned = games.iter().filter(|app_id| library.owns(app_id)).count();
    Evaluation::new(owned == games.len(), ratio_percent(owned, games.len()))
}

fn total_playtime(games: &[String], target_hours: f64, library: &LibrarySnapshot) -> Evaluation {
    // A non-positive target is already met, so the number and the flag agree.
    if target_hours <= 0.0 {
        return Evaluation::new(true, 100.0);
    }
    let hours: f64 = games
        .iter()
        .filter_map(|app_id| library.get(app_id))
        .map(OwnedGame::playtime_hours)
        .sum();
    Evaluation::new(hours >= target_hours, (hours / target_hours * 100.0).min(100.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Number(f64),
    Text(String),
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(TextOrNumber::Number(n)) => n,
        Some(TextOrNumber::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

fn lenient_games<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<TextOrNumber>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|v| match v {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => format!("{}", n as u64),
        })
        .collect())
}
