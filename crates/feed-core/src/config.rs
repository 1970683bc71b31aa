use home::home_dir;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::{
    constant::{
        AUTO_RESOLVE_SECS, BATCH_SIZE, CONFIG_DIR, CONFIG_ENV, CONFIG_FILE, DB_FILE,
        RESIZE_QUIET_MS, REVEAL_MAX_MS, REVEAL_STEP_MS, SENTINEL_MARGIN_PX, VISIBLE_COMMENTS,
    },
    layout::Breakpoints,
    render::RenderSettings,
    FeedError, FeedResult,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Posts rendered per batch, including the first one.
    pub batch_size: usize,
    pub reveal_step_ms: u64,
    /// Upper bound on any card's reveal delay.
    pub reveal_max_ms: u64,
    pub resize_quiet_ms: u64,
    /// Growth starts this many px before the sentinel is on screen.
    pub sentinel_margin_px: u32,
    /// Resolve the oldest update after this long without new ones.
    /// Absent or zero disables it.
    pub auto_resolve_secs: Option<u64>,
    pub visible_comments: usize,
    pub breakpoints: Breakpoints,
    /// Path to sqlite Db.
    pub db: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            reveal_step_ms: REVEAL_STEP_MS,
            reveal_max_ms: REVEAL_MAX_MS,
            resize_quiet_ms: RESIZE_QUIET_MS,
            sentinel_margin_px: SENTINEL_MARGIN_PX,
            auto_resolve_secs: Some(AUTO_RESOLVE_SECS),
            visible_comments: VISIBLE_COMMENTS,
            breakpoints: Breakpoints::default(),
            db: config_dir().join(DB_FILE),
        }
    }
}

fn config_dir() -> PathBuf {
    home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
        .join(CONFIG_DIR)
}

impl FeedConfig {
    /// Where the config is read from: the explicit path, then the
    /// environment, then `~/.feed/feed.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => config_dir().join(CONFIG_FILE),
        }
    }

    /// Load the config. A missing file gives the defaults.
    pub fn load(explicit: Option<&Path>) -> FeedResult<Self> {
        let path = Self::resolve_path(explicit);
        if !path.try_exists()? {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let buf = std::fs::read_to_string(&path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> FeedResult<Self> {
        let config: Self = toml::from_str(buf)
            .map_err(|err| FeedError::config_error(format!("Parsing error: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> FeedResult<()> {
        if self.batch_size == 0 {
            return Err(FeedError::config_error("batch_size must be at least 1".into()).into());
        }
        let bp = &self.breakpoints;
        if !(bp.tablet <= bp.desktop && bp.desktop <= bp.wide && bp.wide <= bp.ultra) {
            return Err(
                FeedError::config_error("breakpoints must be in ascending order".into()).into(),
            );
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            batch_size: self.batch_size,
            reveal_step: Duration::from_millis(self.reveal_step_ms),
            reveal_max: Duration::from_millis(self.reveal_max_ms),
            visible_comments: self.visible_comments,
        }
    }

    pub fn resize_quiet(&self) -> Duration {
        Duration::from_millis(self.resize_quiet_ms)
    }

    pub fn auto_resolve_after(&self) -> Option<Duration> {
        self.auto_resolve_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
