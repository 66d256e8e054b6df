//! Player identity model.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Puuid;

/// Upstream routing region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Eu,
    Na,
    Ap,
    Kr,
    Latam,
    Br,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Eu,
        Region::Na,
        Region::Ap,
        Region::Kr,
        Region::Latam,
        Region::Br,
    ];

    /// Path segment used by the provider for this region.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::Na => "na",
            Region::Ap => "ap",
            Region::Kr => "kr",
            Region::Latam => "latam",
            Region::Br => "br",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdentityError::UnknownRegion(s.to_string()))
    }
}

/// Platform the account plays on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Pc,
    Console,
}

impl Platform {
    /// Map a provider platform label ("PC", "PlayStation", ...).
    pub fn from_provider(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pc" => Some(Platform::Pc),
            "console" | "playstation" | "xbox" => Some(Platform::Console),
            _ => None,
        }
    }
}

/// Errors raised while parsing identity input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid Riot ID '{0}' (expected name#tag)")]
    InvalidRiotId(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

fn riot_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^#]{3,16})#([A-Za-z0-9]{3,5})$").expect("valid regex"))
}

/// Human-readable display handle (`gameName#tagLine`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiotId {
    pub game_name: String,
    pub tag_line: String,
}

impl RiotId {
    pub fn new(game_name: impl Into<String>, tag_line: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            tag_line: tag_line.into(),
        }
    }

    /// Parse and validate a `name#tag` handle.
    pub fn parse(handle: &str) -> Result<Self, IdentityError> {
        let caps = riot_id_regex()
            .captures(handle.trim())
            .ok_or_else(|| IdentityError::InvalidRiotId(handle.to_string()))?;
        let game_name = caps[1].trim();
        if game_name.chars().count() < 3 {
            return Err(IdentityError::InvalidRiotId(handle.to_string()));
        }
        Ok(Self::new(game_name, &caps[2]))
    }

    /// Validate a name and tag supplied separately.
    pub fn from_parts(game_name: &str, tag_line: &str) -> Result<Self, IdentityError> {
        Self::parse(&format!("{}#{}", game_name, tag_line))
    }
}

impl fmt::Display for RiotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.game_name, self.tag_line)
    }
}

/// A resolved player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub puuid: Puuid,

    pub riot_id: RiotId,

    pub region: Region,

    #[serde(default)]
    pub platform: Platform,

    /// Account level at resolution time
    pub account_level: Option<u32>,

    /// Player card image URL
    pub card_url: Option<String>,

    /// When the handle was last resolved upstream
    pub resolved_at: DateTime<Utc>,
}

impl PlayerIdentity {
    pub fn new(puuid: Puuid, riot_id: RiotId, region: Region) -> Self {
        Self {
            puuid,
            riot_id,
            region,
            platform: Platform::default(),
            account_level: None,
            card_url: None,
            resolved_at: Utc::now(),
        }
    }

    pub fn display_handle(&self) -> String {
        self.riot_id.to_string()
    }

    /// Merge a fresh resolution of the same player. The puuid never changes;
    /// only the handle and routing hints are refreshed.
    pub fn refresh_from(&mut self, newer: &PlayerIdentity) {
        if newer.puuid != self.puuid {
            return;
        }
        self.riot_id = newer.riot_id.clone();
        self.region = newer.region;
        self.platform = newer.platform;
        self.account_level = newer.account_level.or(self.account_level);
        self.card_url = newer.card_url.clone().or_else(|| self.card_url.clone());
        self.resolved_at = newer.resolved_at;
    }

    /// Case-insensitive substring match on the display handle.
    pub fn matches_handle(&self, query: &str) -> bool {
        self.display_handle()
            .to_lowercase()
            .contains(&query.trim().to_lowercase())
    }
}
