//! The one piece of state that survives a reload: grid or list layout.

use std::{fmt::Display, str::FromStr};

use sqlite::{Connection, State};

use crate::{db::PREFS_TABLE, FeedError, FeedResult};

pub const LAYOUT_KEY: &str = "layout";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreference {
    #[default]
    Grid,
    List,
}

impl Display for LayoutPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutPreference::Grid => write!(f, "grid"),
            LayoutPreference::List => write!(f, "list"),
        }
    }
}

impl FromStr for LayoutPreference {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(LayoutPreference::Grid),
            "list" => Ok(LayoutPreference::List),
            other => Err(FeedError::custom_error(format!(
                "Unknown layout preference: {other}"
            ))),
        }
    }
}

/// Read the stored preference; a missing or unreadable value means grid.
pub fn load_preference(conn: &Connection) -> FeedResult<LayoutPreference> {
    let statement = format!("SELECT value FROM {PREFS_TABLE} WHERE key = ?");
    let mut stmt = conn.prepare(statement)?;
    stmt.bind((1, LAYOUT_KEY))?;
    if let State::Row = stmt.next()? {
        let value = stmt.read::<String, _>("value")?;
        return Ok(value.parse().unwrap_or_default());
    }
    Ok(LayoutPreference::default())
}

pub fn save_preference(conn: &Connection, preference: LayoutPreference) -> FeedResult<()> {
    let statement = format!("INSERT OR REPLACE INTO {PREFS_TABLE} (key, value) VALUES (?, ?)");
    let mut stmt = conn.prepare(statement)?;
    stmt.bind((1, LAYOUT_KEY))?;
    stmt.bind((2, preference.to_string().as_str()))?;
    stmt.next()?;
    Ok(())
}
