//! The document the feed renders into. Everything the engine does to the
//! page goes through [`Document`]; the decisions behind those calls live
//! elsewhere and never touch it directly.

use std::fmt::Write;

use crate::{
    card::Card,
    constant::{COMMENT_ID_ATTR, MESSAGE_ID_ATTR},
    layout::{ColumnMetrics, LayoutMode},
    queue::Notification,
};

/// A node the feed can scroll to, addressed by its identity attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScrollTarget {
    Post(String),
    Comment(String),
}

impl ScrollTarget {
    pub fn id(&self) -> &str {
        match self {
            ScrollTarget::Post(id) | ScrollTarget::Comment(id) => id,
        }
    }

    /// The attribute that carries the id in the document.
    pub fn attribute(&self) -> &'static str {
        match self {
            ScrollTarget::Post(_) => MESSAGE_ID_ATTR,
            ScrollTarget::Comment(_) => COMMENT_ID_ATTR,
        }
    }
}

pub trait Document {
    /// Drop every column container (and the cards in them) and create the
    /// containers for `mode`.
    fn reset_columns(&mut self, mode: LayoutMode);
    fn column_metrics(&self) -> Vec<ColumnMetrics>;
    fn append_card(&mut self, column: usize, card: Card);
    fn remove_card(&mut self, post_id: &str) -> bool;
    /// Patch the like count and state of a rendered post or comment.
    fn update_likes(&mut self, target: &ScrollTarget, likes: u32, liked: bool) -> bool;
    fn has_post(&self, id: &str) -> bool;
    fn has_comment(&self, id: &str) -> bool;
    fn scroll_into_view(&mut self, target: &ScrollTarget, highlight: bool) -> bool;
    fn set_loading(&mut self, loading: bool);
    fn set_exhausted(&mut self, exhausted: bool);
    fn show_error(&mut self, msg: &str);
    fn clear_error(&mut self);
    fn set_notification(&mut self, notification: Option<Notification>);

    /// Offset of the sentinel, which sits after the tallest column.
    fn content_height(&self) -> u32 {
        self.column_metrics()
            .iter()
            .map(|column| column.height)
            .max()
            .unwrap_or(0)
    }

    fn card_count(&self) -> usize {
        self.column_metrics()
            .iter()
            .map(|column| column.children)
            .sum()
    }
}

/// One recorded scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRecord {
    pub attribute: &'static str,
    pub id: String,
    pub highlight: bool,
}

/// In-memory document. Keeps cards per column, estimates heights from
/// content and remembers every scroll it was asked to perform.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    mode: Option<LayoutMode>,
    columns: Vec<Vec<Card>>,
    loading: bool,
    exhausted: bool,
    error: Option<String>,
    notification: Option<Notification>,
    scrolls: Vec<ScrollRecord>,
    resets: usize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<LayoutMode> {
        self.mode
    }

    pub fn columns(&self) -> &[Vec<Card>] {
        &self.columns
    }

    pub fn card(&self, post_id: &str) -> Option<&Card> {
        self.columns
            .iter()
            .flatten()
            .find(|card| card.post_id == post_id)
    }

    fn card_mut(&mut self, post_id: &str) -> Option<&mut Card> {
        self.columns
            .iter_mut()
            .flatten()
            .find(|card| card.post_id == post_id)
    }

    /// Post ids per column, top to bottom.
    pub fn column_ids(&self) -> Vec<Vec<&str>> {
        self.columns
            .iter()
            .map(|column| column.iter().map(|card| card.post_id.as_str()).collect())
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn scrolls(&self) -> &[ScrollRecord] {
        &self.scrolls
    }

    pub fn last_scroll(&self) -> Option<&ScrollRecord> {
        self.scrolls.last()
    }

    /// How many times the column set was rebuilt.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Plain-text view of the feed, columns one after another.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(notification) = &self.notification {
            let _ = writeln!(out, "[{}] {}", notification.icon, notification.label);
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "! {error}");
            return out;
        }
        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns.len() > 1 {
                let _ = writeln!(out, "== column {} ==", idx + 1);
            }
            for card in column {
                let _ = writeln!(out, "{card}");
            }
        }
        if self.loading {
            let _ = writeln!(out, "loading...");
        } else if self.exhausted {
            let _ = writeln!(out, "you're all caught up");
        }
        out
    }
}

impl Document for MemoryDocument {
    fn reset_columns(&mut self, mode: LayoutMode) {
        self.mode = Some(mode);
        self.columns = vec![Vec::new(); mode.container_count()];
        self.resets += 1;
    }

    fn column_metrics(&self) -> Vec<ColumnMetrics> {
        self.columns
            .iter()
            .map(|column| ColumnMetrics {
                height: column.iter().map(Card::estimated_height).sum(),
                children: column.len(),
            })
            .collect()
    }

    fn append_card(&mut self, column: usize, card: Card) {
        if self.columns.is_empty() {
            self.columns.push(Vec::new());
        }
        let column = column.min(self.columns.len() - 1);
        self.columns[column].push(card);
    }

    fn remove_card(&mut self, post_id: &str) -> bool {
        for column in self.columns.iter_mut() {
            if let Some(idx) = column.iter().position(|card| card.post_id == post_id) {
                column.remove(idx);
                return true;
            }
        }
        false
    }

    fn update_likes(&mut self, target: &ScrollTarget, likes: u32, liked: bool) -> bool {
        match target {
            ScrollTarget::Post(id) => match self.card_mut(id) {
                Some(card) => {
                    card.actions.likes = likes;
                    card.actions.liked = liked;
                    true
                }
                None => false,
            },
            ScrollTarget::Comment(id) => self
                .columns
                .iter_mut()
                .flatten()
                .find_map(|card| card.comments.find_mut(id))
                .map(|node| {
                    node.likes = likes;
                    node.liked = liked;
                })
                .is_some(),
        }
    }

    fn has_post(&self, id: &str) -> bool {
        self.card(id).is_some()
    }

    fn has_comment(&self, id: &str) -> bool {
        self.columns
            .iter()
            .flatten()
            .any(|card| card.has_comment(id))
    }

    fn scroll_into_view(&mut self, target: &ScrollTarget, highlight: bool) -> bool {
        let found = match target {
            ScrollTarget::Post(id) => self.has_post(id),
            ScrollTarget::Comment(id) => self.has_comment(id),
        };
        if found {
            self.scrolls.push(ScrollRecord {
                attribute: target.attribute(),
                id: target.id().to_string(),
                highlight,
            });
        }
        found
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_exhausted(&mut self, exhausted: bool) {
        self.exhausted = exhausted;
    }

    fn show_error(&mut self, msg: &str) {
        self.error = Some(msg.to_string());
    }

    fn clear_error(&mut self) {
        self.error = None;
    }

    fn set_notification(&mut self, notification: Option<Notification>) {
        self.notification = notification;
    }
}
