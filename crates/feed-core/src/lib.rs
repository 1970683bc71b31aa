//! The feed engine behind the home timeline. Posts fetched from a
//! [`source::FeedSource`] are rendered into balanced columns, grown a
//! batch at a time as the reader scrolls, and kept in step with
//! real-time changes through the [`queue::UpdateQueue`].
mod error;
pub mod card;
pub mod config;
pub mod db;
pub mod document;
pub mod feed;
pub mod layout;
pub mod post;
pub mod prefs;
pub mod queue;
pub mod render;
pub mod resolve;
pub mod scroll;
pub mod source;
pub mod state;
pub mod tree;
pub mod utils;

pub use error::{FeedError, FeedResult};

pub mod constant {
    pub const MAX_POST_LEN: u16 = 2000;
    pub const MAX_COMMENT_LEN: u16 = 1000;
    /// Display nesting of comments is clamped to this depth.
    pub const MAX_COMMENT_DEPTH: usize = 2;
    /// Top-level comments shown before the "show more" affordance.
    pub const VISIBLE_COMMENTS: usize = 2;
    pub const BATCH_SIZE: usize = 20;
    pub const MAX_COLUMNS: usize = 5;
    pub const REVEAL_STEP_MS: u64 = 60;
    pub const REVEAL_MAX_MS: u64 = 600;
    pub const RESIZE_QUIET_MS: u64 = 250;
    pub const SENTINEL_MARGIN_PX: u32 = 400;
    pub const AUTO_RESOLVE_SECS: u64 = 8;
    pub const CONFIG_DIR: &str = ".feed";
    pub const CONFIG_FILE: &str = "feed.toml";
    pub const CONFIG_ENV: &str = "FEEDCONF";
    pub const DB_FILE: &str = "feed.db";
    pub const PAGINATION_LIMIT: u32 = 200;
    pub const MESSAGE_ID_ATTR: &str = "data-message-id";
    pub const COMMENT_ID_ATTR: &str = "data-comment-id";
}
