//! Where posts come from. A [`FeedSource`] serves bulk fetches, accepts
//! writes and broadcasts a [`ChangeRecord`] for every change it makes.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use sqlite::Connection;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    constant::PAGINATION_LIMIT,
    db::{self, LikedRow},
    post::{Post, RawComment},
    prefs::{self, LayoutPreference},
    state::{ChangeOp, ChangeRecord, PageFilters, UpdateKind},
    FeedError, FeedResult,
};

const CHANGE_CAPACITY: usize = 256;

#[allow(async_fn_in_trait)]
pub trait FeedSource {
    /// Posts matching `filters`, newest first.
    async fn fetch_page(&self, filters: &PageFilters) -> FeedResult<Vec<Post>>;
    async fn insert_post(&self, post: Post) -> FeedResult<()>;
    async fn insert_comment(&self, post_id: &str, comment: RawComment) -> FeedResult<()>;
    /// Add a like to a post or a comment. Returns the new count.
    async fn like(&self, target_id: &str) -> FeedResult<u32>;
    async fn delete_post(&self, post_id: &str) -> FeedResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<ChangeRecord>;
}

fn publish(changes: &broadcast::Sender<ChangeRecord>, record: ChangeRecord) {
    debug!(?record, "publishing change");
    // No subscribers is fine.
    let _ = changes.send(record);
}

fn lock<T>(mutex: &Mutex<T>) -> FeedResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| FeedError::custom_error("Store lock poisoned".into()).into())
}

/// In-process source holding posts in memory.
#[derive(Debug)]
pub struct MemorySource {
    posts: Mutex<Vec<Post>>,
    changes: broadcast::Sender<ChangeRecord>,
    fail_next_fetch: AtomicBool,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemorySource {
    pub fn new(posts: Vec<Post>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            posts: Mutex::new(posts),
            changes,
            fail_next_fetch: AtomicBool::new(false),
        }
    }

    /// Make the next `fetch_page` fail once.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }
}

impl FeedSource for MemorySource {
    async fn fetch_page(&self, filters: &PageFilters) -> FeedResult<Vec<Post>> {
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(FeedError::fetch_error("source unavailable".into()).into());
        }
        let posts = lock(&self.posts)?;
        let mut page: Vec<Post> = posts
            .iter()
            .filter(|post| {
                filters
                    .author
                    .as_ref()
                    .map_or(true, |author| &post.author == author)
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id().cmp(a.id()))
        });
        if let Some(limit) = filters.limit {
            page.truncate(limit.min(PAGINATION_LIMIT) as usize);
        }
        Ok(page)
    }

    async fn insert_post(&self, post: Post) -> FeedResult<()> {
        let record = ChangeRecord::new(ChangeOp::Insert, UpdateKind::Post, post.id(), None);
        {
            let mut posts = lock(&self.posts)?;
            if posts.iter().any(|existing| existing.id() == post.id()) {
                return Err(
                    FeedError::custom_error(format!("Post {} already exists", post.id())).into(),
                );
            }
            posts.push(post);
        }
        publish(&self.changes, record);
        Ok(())
    }

    async fn insert_comment(&self, post_id: &str, comment: RawComment) -> FeedResult<()> {
        let id = comment
            .id
            .clone()
            .ok_or_else(|| FeedError::custom_error("Comment has no ID".into()))?;
        {
            let mut posts = lock(&self.posts)?;
            let post = posts
                .iter_mut()
                .find(|post| post.id() == post_id)
                .ok_or_else(|| FeedError::invalid_id(post_id))?;
            post.add_comment(comment)?;
        }
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Comment, &id, Some(post_id)),
        );
        Ok(())
    }

    async fn like(&self, target_id: &str) -> FeedResult<u32> {
        let (likes, parent) = {
            let mut posts = lock(&self.posts)?;
            let mut liked = None;
            for post in posts.iter_mut() {
                if post.id() == target_id {
                    post.likes += 1;
                    liked = Some((post.likes, None));
                    break;
                }
                let post_id = post.id().to_string();
                if let Some(comment) = post.find_comment_mut(target_id) {
                    comment.likes += 1;
                    liked = Some((comment.likes, Some(post_id)));
                    break;
                }
            }
            liked.ok_or_else(|| FeedError::invalid_id(target_id))?
        };
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Like, target_id, parent.as_deref())
                .with_likes(likes),
        );
        Ok(likes)
    }

    async fn delete_post(&self, post_id: &str) -> FeedResult<()> {
        {
            let mut posts = lock(&self.posts)?;
            let idx = posts
                .iter()
                .position(|post| post.id() == post_id)
                .ok_or_else(|| FeedError::invalid_id(post_id))?;
            posts.remove(idx);
        }
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Delete, UpdateKind::Post, post_id, None),
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeRecord> {
        self.changes.subscribe()
    }
}

/// Source backed by a local sqlite database.
pub struct SqliteSource {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeRecord>,
}

impl SqliteSource {
    pub fn open(path: &Path) -> FeedResult<Self> {
        let conn = db::open_db(path)?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    pub fn layout_preference(&self) -> FeedResult<LayoutPreference> {
        let conn = lock(&self.conn)?;
        prefs::load_preference(&conn)
    }

    pub fn set_layout_preference(&self, preference: LayoutPreference) -> FeedResult<()> {
        let conn = lock(&self.conn)?;
        prefs::save_preference(&conn, preference)
    }
}

impl FeedSource for SqliteSource {
    async fn fetch_page(&self, filters: &PageFilters) -> FeedResult<Vec<Post>> {
        let conn = lock(&self.conn)?;
        db::query_posts(&conn, filters).map_err(|err| {
            warn!(%err, "sqlite fetch failed");
            FeedError::fetch_error(err.to_string()).into()
        })
    }

    async fn insert_post(&self, post: Post) -> FeedResult<()> {
        {
            let conn = lock(&self.conn)?;
            db::insert_post(&conn, &post)?;
        }
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Post, post.id(), None),
        );
        Ok(())
    }

    async fn insert_comment(&self, post_id: &str, comment: RawComment) -> FeedResult<()> {
        let id = comment
            .id
            .clone()
            .ok_or_else(|| FeedError::custom_error("Comment has no ID".into()))?;
        {
            let conn = lock(&self.conn)?;
            db::insert_comment(&conn, post_id, &comment)?;
        }
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Comment, &id, Some(post_id)),
        );
        Ok(())
    }

    async fn like(&self, target_id: &str) -> FeedResult<u32> {
        let liked = {
            let conn = lock(&self.conn)?;
            db::increment_likes(&conn, target_id)?
        };
        let (likes, parent) = match liked {
            Some(LikedRow::Post { likes }) => (likes, None),
            Some(LikedRow::Comment { post_id, likes }) => (likes, Some(post_id)),
            None => return Err(FeedError::invalid_id(target_id).into()),
        };
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Like, target_id, parent.as_deref())
                .with_likes(likes),
        );
        Ok(likes)
    }

    async fn delete_post(&self, post_id: &str) -> FeedResult<()> {
        let removed = {
            let conn = lock(&self.conn)?;
            db::delete_post_by_id(&conn, post_id)?
        };
        if !removed {
            return Err(FeedError::invalid_id(post_id).into());
        }
        publish(
            &self.changes,
            ChangeRecord::new(ChangeOp::Delete, UpdateKind::Post, post_id, None),
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeRecord> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, author: &str, created_at: u64) -> Post {
        Post::new(id.into(), author.into(), "body".into())
            .unwrap()
            .with_created_at(created_at)
    }

    #[tokio::test]
    async fn memory_fetch_is_newest_first_and_filtered() {
        let source = MemorySource::new(vec![
            post("p1", "ana", 10),
            post("p2", "bo", 30),
            post("p3", "ana", 20),
        ]);
        let all = source.fetch_page(&PageFilters::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(Post::id).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);

        let filters = PageFilters {
            author: Some("ana".into()),
            limit: Some(1),
        };
        let page = source.fetch_page(&filters).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id(), "p3");
    }

    #[tokio::test]
    async fn memory_fetch_failure_is_one_shot() {
        let source = MemorySource::default();
        source.fail_next_fetch();
        let err = source.fetch_page(&PageFilters::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::FetchFailed { .. })
        ));
        assert!(source.fetch_page(&PageFilters::default()).await.is_ok());
    }

    #[tokio::test]
    async fn memory_changes_are_broadcast() {
        let source = MemorySource::new(vec![post("p1", "ana", 10)]);
        let mut changes = source.subscribe();

        let comment = RawComment::new("c1".into(), "bo".into(), "hey".into(), None).unwrap();
        source.insert_comment("p1", comment).await.unwrap();
        assert_eq!(source.like("c1").await.unwrap(), 1);
        source.delete_post("p1").await.unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Comment, "c1", Some("p1"))
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            ChangeRecord::new(ChangeOp::Insert, UpdateKind::Like, "c1", Some("p1")).with_likes(1)
        );
        assert_eq!(changes.recv().await.unwrap().op, ChangeOp::Delete);
        assert!(source.like("c1").await.is_err());
    }

    #[tokio::test]
    async fn sqlite_source_round_trip() {
        let path = db::generate_temp_db();
        let source = SqliteSource::open(&path).unwrap();
        let mut changes = source.subscribe();

        source.insert_post(post("p1", "ana", 10)).await.unwrap();
        source.insert_post(post("p2", "bo", 20)).await.unwrap();
        let comment = RawComment::new("c1".into(), "cy".into(), "hey".into(), None).unwrap();
        source.insert_comment("p1", comment).await.unwrap();
        assert_eq!(source.like("p2").await.unwrap(), 1);

        let posts = source.fetch_page(&PageFilters::default()).await.unwrap();
        assert_eq!(posts[0].id(), "p2");
        assert_eq!(posts[0].likes, 1);
        assert_eq!(posts[1].comment_count(), 1);

        assert_eq!(changes.recv().await.unwrap().kind, UpdateKind::Post);
        source.delete_post("p2").await.unwrap();
        assert!(source.delete_post("p2").await.is_err());

        assert_eq!(source.layout_preference().unwrap(), LayoutPreference::Grid);
        source.set_layout_preference(LayoutPreference::List).unwrap();
        assert_eq!(source.layout_preference().unwrap(), LayoutPreference::List);

        drop(source);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }
}
