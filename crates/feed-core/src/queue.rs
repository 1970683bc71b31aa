//! Backlog of real-time events waiting for the reader to look at them.
//!
//! Entries are keyed by `(kind, target id)`: a like on `c1` and the
//! comment `c1` itself are two different entries. A re-arrival for the
//! same key moves the entry to the back instead of duplicating it.

use std::{fmt::Display, time::Instant};

use tracing::debug;

pub use crate::state::UpdateKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub kind: UpdateKind,
    pub target_id: String,
    /// Post the target belongs to, for comments and likes on a comment.
    pub parent_id: Option<String>,
    pub arrived_at: Instant,
}

impl QueueEntry {
    fn key(&self) -> (UpdateKind, &str) {
        (self.kind, self.target_id.as_str())
    }
}

#[derive(Debug, Default)]
pub struct UpdateQueue {
    entries: Vec<QueueEntry>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event, replacing any entry with the same kind and target.
    pub fn enqueue(
        &mut self,
        kind: UpdateKind,
        target_id: &str,
        parent_id: Option<&str>,
    ) -> &[QueueEntry] {
        self.enqueue_at(kind, target_id, parent_id, Instant::now())
    }

    pub fn enqueue_at(
        &mut self,
        kind: UpdateKind,
        target_id: &str,
        parent_id: Option<&str>,
        now: Instant,
    ) -> &[QueueEntry] {
        self.entries.retain(|entry| entry.key() != (kind, target_id));
        self.entries.push(QueueEntry {
            kind,
            target_id: target_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            arrived_at: now,
        });
        debug!(?kind, target_id, queued = self.entries.len(), "enqueued update");
        &self.entries
    }

    /// Oldest surviving entry.
    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.first()
    }

    pub(crate) fn pop_front(&mut self) -> Option<QueueEntry> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.remove(0))
    }

    /// Forget any entry for a target that no longer exists.
    pub(crate) fn discard(&mut self, target_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.target_id != target_id);
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arrival time of the most recent entry.
    pub fn last_activity(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.arrived_at).max()
    }

    pub fn summary(&self) -> QueueSummary {
        self.entries
            .iter()
            .fold(QueueSummary::default(), |mut summary, entry| {
                match entry.kind {
                    UpdateKind::Post => summary.posts += 1,
                    UpdateKind::Comment => summary.comments += 1,
                    UpdateKind::Like => summary.likes += 1,
                }
                summary
            })
    }

    /// The aggregated notification for the current backlog.
    pub fn notification(&self) -> Option<Notification> {
        self.summary().notification()
    }
}

/// Count of queued entries per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub posts: usize,
    pub comments: usize,
    pub likes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    Post,
    Comment,
    Like,
    Mixed,
}

impl Display for NotificationIcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationIcon::Post => write!(f, "post"),
            NotificationIcon::Comment => write!(f, "comment"),
            NotificationIcon::Like => write!(f, "like"),
            NotificationIcon::Mixed => write!(f, "bell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub icon: NotificationIcon,
    pub label: String,
    pub total: usize,
}

impl QueueSummary {
    pub fn total(&self) -> usize {
        self.posts + self.comments + self.likes
    }

    pub fn notification(&self) -> Option<Notification> {
        let total = self.total();
        let (icon, noun) = match (self.posts, self.comments, self.likes) {
            (0, 0, 0) => return None,
            (_, 0, 0) => (NotificationIcon::Post, "post"),
            (0, _, 0) => (NotificationIcon::Comment, "comment"),
            (0, 0, _) => (NotificationIcon::Like, "like"),
            _ => (NotificationIcon::Mixed, "update"),
        };
        let plural = if total == 1 { "" } else { "s" };
        Some(Notification {
            icon,
            label: format!("{total} new {noun}{plural}"),
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_same_target_moves_to_back() {
        let mut queue = UpdateQueue::new();
        queue.enqueue(UpdateKind::Post, "p1", None);
        queue.enqueue(UpdateKind::Post, "p2", None);
        let len = queue.len();
        let entries = queue.enqueue(UpdateKind::Post, "p1", None);
        assert_eq!(entries.len(), len);
        let ids: Vec<&str> = entries.iter().map(|e| e.target_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[test]
    fn dedup_key_includes_kind() {
        let mut queue = UpdateQueue::new();
        queue.enqueue(UpdateKind::Comment, "c1", Some("p1"));
        queue.enqueue(UpdateKind::Like, "c1", None);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front().unwrap().kind, UpdateKind::Comment);
    }

    #[test]
    fn notification_is_derived_from_composition() {
        let mut queue = UpdateQueue::new();
        assert_eq!(queue.notification(), None);

        queue.enqueue(UpdateKind::Comment, "c1", Some("p1"));
        let notification = queue.notification().unwrap();
        assert_eq!(notification.icon, NotificationIcon::Comment);
        assert_eq!(notification.label, "1 new comment");

        queue.enqueue(UpdateKind::Comment, "c2", Some("p1"));
        assert_eq!(queue.notification().unwrap().label, "2 new comments");

        queue.enqueue(UpdateKind::Like, "p1", None);
        let notification = queue.notification().unwrap();
        assert_eq!(notification.icon, NotificationIcon::Mixed);
        assert_eq!(notification.label, "3 new updates");
        assert_eq!(
            queue.summary(),
            QueueSummary {
                posts: 0,
                comments: 2,
                likes: 1
            }
        );
    }

    #[test]
    fn pop_and_discard() {
        let mut queue = UpdateQueue::new();
        queue.enqueue(UpdateKind::Post, "p1", None);
        queue.enqueue(UpdateKind::Like, "p1", None);
        queue.enqueue(UpdateKind::Post, "p2", None);
        assert_eq!(queue.discard("p1"), 2);
        assert_eq!(queue.pop_front().unwrap().target_id, "p2");
        assert!(queue.pop_front().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn last_activity_tracks_newest_arrival() {
        let start = Instant::now();
        let later = start + std::time::Duration::from_secs(3);
        let mut queue = UpdateQueue::new();
        queue.enqueue_at(UpdateKind::Post, "p1", None, later);
        queue.enqueue_at(UpdateKind::Post, "p2", None, start);
        assert_eq!(queue.last_activity(), Some(later));
    }
}
