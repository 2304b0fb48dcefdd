use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VictoryType {
    Draw,
    Mate,
    Resign,
    OutOfTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserColor {
    White,
    Black,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub id: String,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameOpening {
    pub eco: String,
    pub name: String,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeControl {
    pub id: i32,
    pub min: i32,
    pub sec: i32,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Game {
    pub id: String,
    pub is_rated: bool,
    pub no_turns: i32,
    pub victory_type: VictoryType,
    pub moves: String,
    pub time_ctrl_id: i32,
    pub opening_eco: String,
    pub opening_ply: i32,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Association between a game and one of its players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameToUser {
    pub game_id: String,
    pub user_id: String,
    pub user_rating: i32,
    pub user_color: UserColor,
    pub user_won: bool,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

macro_rules! impl_record {
    ($row:ty, [$($key:literal),+]) => {
        impl Record for $row {
            const KEY_FIELDS: &'static [&'static str] = &[$($key),+];

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

impl_record!(User, ["id"]);
impl_record!(GameOpening, ["eco"]);
impl_record!(TimeControl, ["id"]);
impl_record!(Game, ["id"]);
impl_record!(GameToUser, ["game_id", "user_id"]);
