//! This module defines `Post` and the raw comment payload attached to it.

use crate::{constant, FeedError, FeedResult};
use std::time::SystemTime;

/// A post as delivered by the data source. Everything except the like
/// state and the comments is fixed once fetched.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Post {
    id: String,
    pub author: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub body: String,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: u64,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub liked: bool,
    /// Comment payload, either flat (linked through `parent_id`) or nested
    /// through `replies`.
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

/// One comment node as it arrives from the source. Nothing here is
/// trusted; the tree builder skips nodes it cannot place.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Display name of the author being replied to, if the source stored it.
    #[serde(default)]
    pub reply_to_name: Option<String>,
    #[serde(default)]
    pub replies: Vec<RawComment>,
}

impl Post {
    /// Create a new post by `author` with the given `body`.
    pub fn new(id: String, author: String, body: String) -> FeedResult<Self> {
        verify_body(&body)?;
        Ok(Post {
            id,
            author,
            avatar: None,
            body,
            image: None,
            created_at: time_in_sec(SystemTime::now())?,
            likes: 0,
            liked: false,
            comments: Vec::new(),
        })
    }

    pub fn with_image(mut self, image: String) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_avatar(mut self, avatar: String) -> Self {
        self.avatar = Some(avatar);
        self
    }

    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Flip the like state of the current viewer and adjust the count.
    pub fn toggle_like(&mut self) {
        if self.liked {
            self.likes = self.likes.saturating_sub(1);
        } else {
            self.likes += 1;
        }
        self.liked = !self.liked;
    }

    /// Ids of the top-level comments in payload order.
    pub fn top_level_ids(&self) -> Vec<&str> {
        self.comments
            .iter()
            .filter(|comment| comment.parent_id.is_none())
            .filter_map(|comment| comment.id.as_deref())
            .collect()
    }

    /// Number of identifiable comments anywhere in the payload.
    pub fn comment_count(&self) -> usize {
        fn count(nodes: &[RawComment]) -> usize {
            nodes
                .iter()
                .filter(|node| node.id.is_some())
                .map(|node| 1 + count(&node.replies))
                .sum()
        }
        count(&self.comments)
    }

    pub fn contains_comment(&self, id: &str) -> bool {
        self.find_comment(id).is_some()
    }

    pub fn find_comment(&self, id: &str) -> Option<&RawComment> {
        fn find<'a>(nodes: &'a [RawComment], id: &str) -> Option<&'a RawComment> {
            nodes.iter().find_map(|node| {
                if node.id.as_deref() == Some(id) {
                    Some(node)
                } else {
                    find(&node.replies, id)
                }
            })
        }
        find(&self.comments, id)
    }

    pub fn find_comment_mut(&mut self, id: &str) -> Option<&mut RawComment> {
        fn find<'a>(nodes: &'a mut [RawComment], id: &str) -> Option<&'a mut RawComment> {
            for node in nodes.iter_mut() {
                if node.id.as_deref() == Some(id) {
                    return Some(node);
                }
                if let Some(found) = find(&mut node.replies, id) {
                    return Some(found);
                }
            }
            None
        }
        find(&mut self.comments, id)
    }

    pub fn parse_sqlite_row(stmt: &sqlite::Statement) -> FeedResult<Self> {
        Ok(Post {
            id: stmt.read::<String, _>("id")?,
            author: stmt.read::<String, _>("author")?,
            avatar: stmt.read::<Option<String>, _>("avatar")?,
            body: stmt.read::<String, _>("body")?,
            image: stmt.read::<Option<String>, _>("image")?,
            created_at: stmt.read::<i64, _>("created_at")?.try_into()?,
            likes: stmt.read::<i64, _>("likes")?.try_into()?,
            liked: false,
            comments: Vec::new(),
        })
    }

    /// Attach a comment to this post in flat form. A parent, if named, must
    /// already be a comment of this post.
    pub fn add_comment(&mut self, comment: RawComment) -> FeedResult<()> {
        let id = comment
            .id
            .as_deref()
            .ok_or_else(|| FeedError::custom_error("Comment has no ID".into()))?;
        if self.contains_comment(id) {
            return Err(FeedError::custom_error(format!("Comment {id} already exists")).into());
        }
        if let Some(parent_id) = comment.parent_id.as_deref() {
            if !self.contains_comment(parent_id) {
                return Err(FeedError::ForeignParent {
                    post_id: self.id.clone(),
                    parent_id: parent_id.to_string(),
                }
                .into());
            }
        }
        self.comments.push(comment);
        Ok(())
    }
}

impl RawComment {
    /// Create a new comment. `parent_id` is `None` for a top-level comment.
    pub fn new(
        id: String,
        author: String,
        body: String,
        parent_id: Option<String>,
    ) -> FeedResult<Self> {
        verify_comment(&body)?;
        Ok(RawComment {
            id: Some(id),
            author,
            body,
            created_at: time_in_sec(SystemTime::now())?,
            parent_id,
            ..Default::default()
        })
    }

    pub fn with_reply_to(mut self, name: String) -> Self {
        self.reply_to_name = Some(name);
        self
    }

    pub fn with_replies(mut self, replies: Vec<RawComment>) -> Self {
        self.replies = replies;
        self
    }

    pub fn toggle_like(&mut self) {
        if self.liked {
            self.likes = self.likes.saturating_sub(1);
        } else {
            self.likes += 1;
        }
        self.liked = !self.liked;
    }

    /// Returns the owning post id along with the comment.
    pub fn parse_sqlite_row(stmt: &sqlite::Statement) -> FeedResult<(String, Self)> {
        let post_id = stmt.read::<String, _>("post_id")?;
        let comment = RawComment {
            id: Some(stmt.read::<String, _>("id")?),
            author: stmt.read::<String, _>("author")?,
            body: stmt.read::<String, _>("body")?,
            created_at: stmt.read::<i64, _>("created_at")?.try_into()?,
            likes: stmt.read::<i64, _>("likes")?.try_into()?,
            liked: false,
            parent_id: stmt.read::<Option<String>, _>("parent_id")?,
            reply_to_name: stmt.read::<Option<String>, _>("reply_to_name")?,
            replies: Vec::new(),
        };
        Ok((post_id, comment))
    }
}

pub(crate) fn time_in_sec(time: SystemTime) -> FeedResult<u64> {
    Ok(time.duration_since(std::time::UNIX_EPOCH)?.as_secs())
}

/// Some necessary checks for a post's body.
fn verify_body(body: &str) -> FeedResult<()> {
    if body.trim().is_empty() {
        return Err(FeedError::EmptyPost.into());
    }
    if body.len() > constant::MAX_POST_LEN as usize {
        return Err(FeedError::InvalidPostLength {
            max_size: constant::MAX_POST_LEN as usize,
            curr_size: body.len(),
        }
        .into());
    }
    Ok(())
}

fn verify_comment(body: &str) -> FeedResult<()> {
    if body.trim().is_empty() {
        return Err(FeedError::EmptyComment.into());
    }
    if body.len() > constant::MAX_COMMENT_LEN as usize {
        return Err(FeedError::InvalidCommentLength {
            max_size: constant::MAX_COMMENT_LEN as usize,
            curr_size: body.len(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post::new("p1".into(), "ana".into(), "hello there".into()).unwrap()
    }

    #[test]
    fn empty_post_is_rejected() {
        let err = Post::new("p1".into(), "ana".into(), "   ".into()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::EmptyPost)
        ));
    }

    #[test]
    fn overlong_post_is_rejected() {
        let body = "x".repeat(constant::MAX_POST_LEN as usize + 1);
        let err = Post::new("p1".into(), "ana".into(), body).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::InvalidPostLength { .. })
        ));
    }

    #[test]
    fn toggle_like_round_trips_count() {
        let mut post = post();
        post.likes = 4;
        post.toggle_like();
        assert_eq!((post.likes, post.liked), (5, true));
        post.toggle_like();
        assert_eq!((post.likes, post.liked), (4, false));
    }

    #[test]
    fn comments_are_counted_and_found_through_nesting() {
        let mut post = post();
        let reply = RawComment::new("c2".into(), "bo".into(), "yes".into(), None).unwrap();
        let root = RawComment::new("c1".into(), "cy".into(), "hi".into(), None)
            .unwrap()
            .with_replies(vec![reply, RawComment::default()]);
        post.comments.push(root);

        assert_eq!(post.comment_count(), 2);
        assert_eq!(post.top_level_ids(), vec!["c1"]);
        assert!(post.contains_comment("c2"));
        post.find_comment_mut("c2").unwrap().toggle_like();
        assert_eq!(post.find_comment("c2").unwrap().likes, 1);
    }

    #[test]
    fn add_comment_rejects_parent_from_elsewhere() {
        let mut post = post();
        let orphan = RawComment::new(
            "c9".into(),
            "bo".into(),
            "reply".into(),
            Some("missing".into()),
        )
        .unwrap();
        let err = post.add_comment(orphan).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::ForeignParent { .. })
        ));

        let root = RawComment::new("c1".into(), "bo".into(), "root".into(), None).unwrap();
        post.add_comment(root).unwrap();
        let reply =
            RawComment::new("c2".into(), "cy".into(), "reply".into(), Some("c1".into())).unwrap();
        post.add_comment(reply).unwrap();
        assert_eq!(post.comment_count(), 2);
    }
}
