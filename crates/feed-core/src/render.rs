//! The incremental renderer. Owns the full data set of the current feed
//! session and the cursor marking how much of it has been rendered.

use std::time::Duration;

use tracing::{debug, info};

use crate::{
    card::{reveal_delay, Card},
    constant,
    document::{Document, ScrollTarget},
    layout::Masonry,
    post::Post,
    prefs::LayoutPreference,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub batch_size: usize,
    pub reveal_step: Duration,
    pub reveal_max: Duration,
    pub visible_comments: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            batch_size: constant::BATCH_SIZE,
            reveal_step: Duration::from_millis(constant::REVEAL_STEP_MS),
            reveal_max: Duration::from_millis(constant::REVEAL_MAX_MS),
            visible_comments: constant::VISIBLE_COMMENTS,
        }
    }
}

#[derive(Debug)]
pub struct Renderer {
    posts: Vec<Post>,
    cursor: usize,
    /// Bumped by every `load`; work started under an older epoch is stale.
    epoch: u64,
    masonry: Masonry,
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(settings: RenderSettings, masonry: Masonry) -> Self {
        Self {
            posts: Vec::new(),
            cursor: 0,
            epoch: 0,
            masonry,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn masonry(&self) -> &Masonry {
        &self.masonry
    }

    /// Number of posts currently rendered.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.posts.len()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn materialized(&self) -> &[Post] {
        &self.posts[..self.cursor]
    }

    pub fn position(&self, post_id: &str) -> Option<usize> {
        self.posts.iter().position(|post| post.id() == post_id)
    }

    /// Index of the post holding comment `comment_id`.
    pub fn position_of_comment(&self, comment_id: &str) -> Option<usize> {
        self.posts
            .iter()
            .position(|post| post.contains_comment(comment_id))
    }

    /// Replace the full data set, clear the columns and render the first batch.
    pub fn load<D: Document + ?Sized>(&mut self, posts: Vec<Post>, doc: &mut D) -> usize {
        self.epoch += 1;
        self.posts = posts;
        self.cursor = 0;
        info!(posts = self.posts.len(), epoch = self.epoch, "loading feed");
        self.masonry.rebuild(doc);
        doc.set_exhausted(false);
        self.grow_batch(self.settings.batch_size, doc)
    }

    /// Drop everything rendered, e.g. when a fetch failed.
    pub fn clear<D: Document + ?Sized>(&mut self, doc: &mut D) {
        self.epoch += 1;
        self.posts.clear();
        self.cursor = 0;
        self.masonry.rebuild(doc);
        doc.set_exhausted(false);
    }

    /// Render the next `size` posts, each into the currently shortest column.
    pub fn grow_batch<D: Document + ?Sized>(&mut self, size: usize, doc: &mut D) -> usize {
        let end = (self.cursor + size).min(self.posts.len());
        let start = self.cursor;
        for (position, post) in self.posts[start..end].iter().enumerate() {
            let delay = reveal_delay(
                position,
                self.settings.reveal_step,
                self.settings.reveal_max,
            );
            let card = Card::render(post, self.settings.visible_comments, delay);
            let column = self.masonry.place(doc);
            debug!(post = post.id(), column, "placing card");
            doc.append_card(column, card);
        }
        self.cursor = end;
        debug!(rendered = end - start, cursor = self.cursor, total = self.posts.len(), "grew batch");
        if self.is_exhausted() {
            doc.set_exhausted(true);
        }
        end - start
    }

    /// Grow only if `epoch` is still current.
    pub fn grow_batch_for<D: Document + ?Sized>(
        &mut self,
        epoch: u64,
        size: usize,
        doc: &mut D,
    ) -> usize {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping stale batch");
            return 0;
        }
        self.grow_batch(size, doc)
    }

    /// Apply a new viewport width. Rebuilds and re-renders the rendered
    /// prefix, in order and without animation, if the layout changed.
    pub fn set_width<D: Document + ?Sized>(&mut self, width: u32, doc: &mut D) -> bool {
        if !self.masonry.set_width(width) {
            return false;
        }
        self.rerender(doc);
        true
    }

    pub fn set_preference<D: Document + ?Sized>(
        &mut self,
        preference: LayoutPreference,
        doc: &mut D,
    ) -> bool {
        if !self.masonry.set_preference(preference) {
            return false;
        }
        self.rerender(doc);
        true
    }

    fn rerender<D: Document + ?Sized>(&mut self, doc: &mut D) {
        info!(mode = ?self.masonry.mode(), cards = self.cursor, "re-laying out feed");
        self.masonry.rebuild(doc);
        for post in &self.posts[..self.cursor] {
            let card = Card::render(post, self.settings.visible_comments, Duration::ZERO);
            let column = self.masonry.place(doc);
            doc.append_card(column, card);
        }
        doc.set_exhausted(self.is_exhausted());
    }

    /// Update a like count in the data set and, if rendered, in place.
    /// Returns whether the target was known.
    pub fn apply_likes<D: Document + ?Sized>(
        &mut self,
        target_id: &str,
        likes: u32,
        doc: &mut D,
    ) -> bool {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id() == target_id) {
            post.likes = likes;
            let liked = post.liked;
            doc.update_likes(&ScrollTarget::Post(target_id.to_string()), likes, liked);
            return true;
        }
        for post in self.posts.iter_mut() {
            if let Some(comment) = post.find_comment_mut(target_id) {
                comment.likes = likes;
                let liked = comment.liked;
                doc.update_likes(&ScrollTarget::Comment(target_id.to_string()), likes, liked);
                return true;
            }
        }
        false
    }

    /// Remove a deleted post from the data set and the document.
    pub fn remove_post<D: Document + ?Sized>(&mut self, post_id: &str, doc: &mut D) -> bool {
        let Some(idx) = self.position(post_id) else {
            return false;
        };
        self.posts.remove(idx);
        if idx < self.cursor {
            self.cursor -= 1;
            doc.remove_card(post_id);
        }
        if self.is_exhausted() {
            doc.set_exhausted(true);
        }
        true
    }
}
