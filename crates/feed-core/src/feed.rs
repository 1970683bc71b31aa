//! The feed as a whole: one owned state object wiring the renderer, the
//! scroll trigger and the update queue to a source and a document.
//!
//! Every operation takes the document it acts on, and time where time
//! matters, so a feed can be driven step by step.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    config::FeedConfig,
    document::{Document, ScrollTarget},
    layout::Masonry,
    post::Post,
    prefs::LayoutPreference,
    queue::UpdateQueue,
    render::Renderer,
    resolve::{self, Resolution},
    scroll::{BatchTicket, ScrollTrigger, Viewport},
    source::FeedSource,
    state::{ChangeOp, ChangeRecord, PageFilters, UpdateKind},
    utils::Debouncer,
    FeedResult,
};

/// A target to find once the next load completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locate {
    pub target: ScrollTarget,
    /// Post holding a comment target.
    pub post_hint: Option<String>,
}

/// Proof that this caller owns the single fetch slot.
#[derive(Debug)]
pub struct FetchTicket {
    _private: (),
}

#[derive(Debug)]
pub struct Feed {
    renderer: Renderer,
    trigger: ScrollTrigger,
    queue: UpdateQueue,
    filters: PageFilters,
    fetching: bool,
    pending_locate: Option<Locate>,
    resize: Debouncer<u32>,
    auto_resolve_after: Option<Duration>,
    last_auto_resolve: Option<Instant>,
}

impl Feed {
    pub fn new(config: &FeedConfig, width: u32, preference: LayoutPreference) -> Self {
        let masonry = Masonry::new(config.breakpoints, width, preference);
        Self {
            renderer: Renderer::new(config.render_settings(), masonry),
            trigger: ScrollTrigger::new(config.sentinel_margin_px),
            queue: UpdateQueue::new(),
            filters: PageFilters::default(),
            fetching: false,
            pending_locate: None,
            resize: Debouncer::new(config.resize_quiet()),
            auto_resolve_after: config.auto_resolve_after(),
            last_auto_resolve: None,
        }
    }

    pub fn with_filters(mut self, filters: PageFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn trigger(&self) -> &ScrollTrigger {
        &self.trigger
    }

    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    pub fn filters(&self) -> &PageFilters {
        &self.filters
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn pending_locate(&self) -> Option<&Locate> {
        self.pending_locate.as_ref()
    }

    // ***
    // Bulk load
    // ***

    /// Claim the fetch slot. `None` while another fetch is in flight.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if self.fetching {
            debug!("fetch already in flight");
            return None;
        }
        self.fetching = true;
        Some(FetchTicket { _private: () })
    }

    /// Apply the outcome of a fetch. A failure replaces the feed with an
    /// inline error; nothing is partially rendered.
    pub fn finish_fetch<D: Document + ?Sized>(
        &mut self,
        ticket: FetchTicket,
        result: FeedResult<Vec<Post>>,
        doc: &mut D,
    ) -> bool {
        drop(ticket);
        self.fetching = false;
        match result {
            Err(err) => {
                warn!(%err, "feed fetch failed");
                self.renderer.clear(doc);
                self.trigger.arm(&self.renderer, doc);
                if let Some(locate) = self.pending_locate.take() {
                    debug!(id = locate.target.id(), "dropping locate after failed fetch");
                }
                doc.show_error(&format!("Couldn't load the feed: {err}"));
                false
            }
            Ok(posts) => {
                doc.clear_error();
                self.renderer.load(posts, doc);
                self.trigger.arm(&self.renderer, doc);
                if let Some(locate) = self.pending_locate.take() {
                    self.locate(&locate, doc);
                }
                true
            }
        }
    }

    /// Fetch and load the feed. Returns whether a new feed was loaded;
    /// a refresh while another is in flight does nothing.
    pub async fn refresh<S, D>(&mut self, source: &S, doc: &mut D) -> bool
    where
        S: FeedSource,
        D: Document + ?Sized,
    {
        let Some(ticket) = self.begin_fetch() else {
            return false;
        };
        let result = source.fetch_page(&self.filters).await;
        self.finish_fetch(ticket, result, doc)
    }

    /// Render up to the post holding the target, then scroll to it.
    fn locate<D: Document + ?Sized>(&mut self, locate: &Locate, doc: &mut D) -> bool {
        let position = match &locate.target {
            ScrollTarget::Post(id) => self.renderer.position(id),
            ScrollTarget::Comment(id) => self.renderer.position_of_comment(id).or_else(|| {
                locate
                    .post_hint
                    .as_deref()
                    .and_then(|hint| self.renderer.position(hint))
            }),
        };
        let Some(position) = position else {
            info!(id = locate.target.id(), "located target is not in the feed");
            return false;
        };
        if position >= self.renderer.cursor() {
            let batch = self.renderer.settings().batch_size.max(1);
            let missing = position + 1 - self.renderer.cursor();
            self.renderer.grow_batch(missing.div_ceil(batch) * batch, doc);
        }
        let target = match &locate.target {
            ScrollTarget::Comment(id) if !doc.has_comment(id) => {
                ScrollTarget::Post(self.renderer.posts()[position].id().to_string())
            }
            target => target.clone(),
        };
        info!(attribute = target.attribute(), id = target.id(), "locating after reload");
        doc.scroll_into_view(&target, true)
    }

    // ***
    // Scrolling and layout
    // ***

    /// Check the sentinel for the current viewport.
    pub fn on_scroll<D: Document + ?Sized>(
        &mut self,
        viewport: Viewport,
        doc: &mut D,
    ) -> Option<BatchTicket> {
        self.trigger.observe(viewport, &self.renderer, doc)
    }

    pub fn on_sentinel_visible<D: Document + ?Sized>(&mut self, doc: &mut D) -> Option<BatchTicket> {
        self.trigger.on_visible(&self.renderer, doc)
    }

    pub fn finish_batch<D: Document + ?Sized>(&mut self, ticket: BatchTicket, doc: &mut D) -> usize {
        self.trigger.complete(ticket, &mut self.renderer, doc)
    }

    /// Record a viewport width; applied by [`Feed::tick`] once resizing settles.
    pub fn on_resize(&mut self, width: u32, now: Instant) {
        self.resize.push(width, now);
    }

    pub fn set_preference<D: Document + ?Sized>(
        &mut self,
        preference: LayoutPreference,
        doc: &mut D,
    ) -> bool {
        self.renderer.set_preference(preference, doc)
    }

    // ***
    // Real-time updates
    // ***

    /// Take in one change from the subscription.
    pub fn on_change<D: Document + ?Sized>(
        &mut self,
        record: &ChangeRecord,
        now: Instant,
        doc: &mut D,
    ) {
        let id = record.id.as_str();
        match (record.op, record.kind) {
            (ChangeOp::Delete, UpdateKind::Post) => {
                self.renderer.remove_post(id, doc);
                self.queue.discard(id);
                if self
                    .pending_locate
                    .as_ref()
                    .is_some_and(|locate| locate.target.id() == id)
                {
                    self.pending_locate = None;
                }
            }
            (ChangeOp::Delete, kind) => {
                debug!(?kind, id, "dropping queued updates for deleted target");
                self.queue.discard(id);
            }
            (op, UpdateKind::Like) => {
                if let Some(likes) = record.likes {
                    self.renderer.apply_likes(id, likes, doc);
                }
                if op == ChangeOp::Insert {
                    self.queue
                        .enqueue_at(UpdateKind::Like, id, record.parent_id.as_deref(), now);
                }
            }
            (ChangeOp::Insert, kind) => {
                self.queue
                    .enqueue_at(kind, id, record.parent_id.as_deref(), now);
            }
            (ChangeOp::Update, kind) => {
                debug!(?kind, id, "ignoring update to immutable content");
            }
        }
        doc.set_notification(self.queue.notification());
    }

    /// Resolve the oldest queued update. Suppressed while a reload asked
    /// for by an earlier resolution has not happened yet.
    pub fn resolve<D: Document + ?Sized>(&mut self, doc: &mut D) -> Option<Resolution> {
        if let Some(locate) = &self.pending_locate {
            debug!(id = locate.target.id(), "reload pending, ignoring resolve");
            return None;
        }
        let entry = self.queue.pop_front()?;
        let resolution = resolve::decide(&entry, doc);
        if !resolve::apply(&resolution, doc) {
            if let Resolution::ReloadAndLocate { target, post_hint } = &resolution {
                self.pending_locate = Some(Locate {
                    target: target.clone(),
                    post_hint: post_hint.clone(),
                });
            }
        }
        doc.set_notification(self.queue.notification());
        Some(resolution)
    }

    /// Resolve, running the reload a resolution asks for.
    pub async fn resolve_with<S, D>(&mut self, source: &S, doc: &mut D) -> Option<Resolution>
    where
        S: FeedSource,
        D: Document + ?Sized,
    {
        let resolution = self.resolve(doc)?;
        if resolution.needs_reload() {
            self.refresh(source, doc).await;
        }
        Some(resolution)
    }

    /// Advance timers: apply a settled resize and auto-resolve after a
    /// quiet period without new updates.
    pub fn tick<D: Document + ?Sized>(&mut self, now: Instant, doc: &mut D) -> Option<Resolution> {
        if let Some(width) = self.resize.ready(now) {
            self.renderer.set_width(width, doc);
        }
        let after = self.auto_resolve_after?;
        let last_arrival = self.queue.last_activity()?;
        let quiet_since = match self.last_auto_resolve {
            Some(at) => last_arrival.max(at),
            None => last_arrival,
        };
        if now.saturating_duration_since(quiet_since) < after {
            return None;
        }
        let resolution = self.resolve(doc)?;
        info!(id = resolution.target().id(), "auto-resolved update");
        self.last_auto_resolve = Some(now);
        Some(resolution)
    }

    /// [`Feed::tick`], running the reload an auto-resolution asks for.
    pub async fn tick_with<S, D>(
        &mut self,
        source: &S,
        now: Instant,
        doc: &mut D,
    ) -> Option<Resolution>
    where
        S: FeedSource,
        D: Document + ?Sized,
    {
        let resolution = self.tick(now, doc)?;
        if resolution.needs_reload() {
            self.refresh(source, doc).await;
        }
        Some(resolution)
    }
}
