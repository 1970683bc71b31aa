//! Turns the oldest queued update into something the reader can see.
//!
//! [`decide`] only looks at the document; [`apply`] is the one place that
//! acts on the decision.

use tracing::info;

use crate::{
    document::{Document, ScrollTarget},
    queue::{QueueEntry, UpdateKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The target is rendered; bring it into view.
    ScrollTo(ScrollTarget),
    /// The target is not rendered yet. Reload the feed and locate it once
    /// loaded. `post_hint` is the post that holds a comment target.
    ReloadAndLocate {
        target: ScrollTarget,
        post_hint: Option<String>,
    },
}

impl Resolution {
    pub fn target(&self) -> &ScrollTarget {
        match self {
            Resolution::ScrollTo(target) | Resolution::ReloadAndLocate { target, .. } => target,
        }
    }

    pub fn needs_reload(&self) -> bool {
        matches!(self, Resolution::ReloadAndLocate { .. })
    }
}

/// Decide how to surface `entry` given what the document has rendered.
pub fn decide<D: Document + ?Sized>(entry: &QueueEntry, doc: &D) -> Resolution {
    let id = entry.target_id.clone();
    match entry.kind {
        UpdateKind::Post => {
            let target = ScrollTarget::Post(id);
            if doc.has_post(target.id()) {
                Resolution::ScrollTo(target)
            } else {
                reload(target, None)
            }
        }
        UpdateKind::Comment => {
            let target = ScrollTarget::Comment(id);
            if doc.has_comment(target.id()) {
                Resolution::ScrollTo(target)
            } else {
                reload(target, entry.parent_id.clone())
            }
        }
        // A like names its target without saying what it is.
        UpdateKind::Like => {
            if doc.has_post(&id) {
                Resolution::ScrollTo(ScrollTarget::Post(id))
            } else if doc.has_comment(&id) {
                Resolution::ScrollTo(ScrollTarget::Comment(id))
            } else if entry.parent_id.is_some() {
                reload(ScrollTarget::Comment(id), entry.parent_id.clone())
            } else {
                reload(ScrollTarget::Post(id), None)
            }
        }
    }
}

fn reload(target: ScrollTarget, post_hint: Option<String>) -> Resolution {
    Resolution::ReloadAndLocate { target, post_hint }
}

/// Perform the scroll for a [`Resolution::ScrollTo`]. Returns `false` when
/// the resolution needs a reload, which is the caller's to run.
pub fn apply<D: Document + ?Sized>(resolution: &Resolution, doc: &mut D) -> bool {
    match resolution {
        Resolution::ScrollTo(target) => {
            info!(attribute = target.attribute(), id = target.id(), "scrolling to update");
            doc.scroll_into_view(target, true)
        }
        Resolution::ReloadAndLocate { target, .. } => {
            info!(
                attribute = target.attribute(),
                id = target.id(),
                "update not rendered, reloading"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{
        card::Card,
        document::MemoryDocument,
        layout::LayoutMode,
        post::{Post, RawComment},
    };

    fn entry(kind: UpdateKind, id: &str, parent: Option<&str>) -> QueueEntry {
        QueueEntry {
            kind,
            target_id: id.into(),
            parent_id: parent.map(str::to_string),
            arrived_at: Instant::now(),
        }
    }

    fn doc_with(post_id: &str, comment_id: &str) -> MemoryDocument {
        let mut post = Post::new(post_id.into(), "ana".into(), "body".into()).unwrap();
        post.comments.push(RawComment {
            id: Some(comment_id.into()),
            author: "bo".into(),
            body: "hey".into(),
            ..Default::default()
        });
        let mut doc = MemoryDocument::new();
        doc.reset_columns(LayoutMode::Columns(2));
        doc.append_card(0, Card::render(&post, 2, Duration::ZERO));
        doc
    }

    #[test]
    fn rendered_post_is_scrolled_to() {
        let mut doc = doc_with("p1", "c1");
        let resolution = decide(&entry(UpdateKind::Post, "p1", None), &doc);
        assert_eq!(resolution, Resolution::ScrollTo(ScrollTarget::Post("p1".into())));
        assert!(apply(&resolution, &mut doc));
        assert_eq!(doc.last_scroll().unwrap().id, "p1");
    }

    #[test]
    fn missing_post_reloads() {
        let doc = doc_with("p1", "c1");
        let resolution = decide(&entry(UpdateKind::Post, "p9", None), &doc);
        assert!(resolution.needs_reload());
        assert_eq!(resolution.target(), &ScrollTarget::Post("p9".into()));
    }

    #[test]
    fn missing_comment_reloads_with_post_hint() {
        let doc = doc_with("p1", "c1");
        let resolution = decide(&entry(UpdateKind::Comment, "c9", Some("p1")), &doc);
        assert_eq!(
            resolution,
            Resolution::ReloadAndLocate {
                target: ScrollTarget::Comment("c9".into()),
                post_hint: Some("p1".into()),
            }
        );
    }

    #[test]
    fn like_checks_post_then_comment() {
        let doc = doc_with("p1", "c1");
        assert_eq!(
            decide(&entry(UpdateKind::Like, "p1", None), &doc),
            Resolution::ScrollTo(ScrollTarget::Post("p1".into()))
        );
        assert_eq!(
            decide(&entry(UpdateKind::Like, "c1", None), &doc),
            Resolution::ScrollTo(ScrollTarget::Comment("c1".into()))
        );
    }

    #[test]
    fn orphaned_like_guesses_from_parent() {
        let doc = doc_with("p1", "c1");
        assert_eq!(
            decide(&entry(UpdateKind::Like, "x", Some("p7")), &doc).target(),
            &ScrollTarget::Comment("x".into())
        );
        let resolution = decide(&entry(UpdateKind::Like, "x", None), &doc);
        assert_eq!(
            resolution,
            Resolution::ReloadAndLocate {
                target: ScrollTarget::Post("x".into()),
                post_hint: None,
            }
        );
    }
}
