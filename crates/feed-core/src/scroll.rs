//! Grows the feed when the sentinel after the last column comes near the
//! viewport.
//!
//! Growth is split in two: [`ScrollTrigger::on_visible`] claims the single
//! loading slot and hands out a [`BatchTicket`], and
//! [`ScrollTrigger::complete`] renders the batch. Anything that fires in
//! between is ignored.

use tracing::debug;

use crate::{document::Document, render::Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Loading,
    /// Everything is rendered; the sentinel is no longer observed.
    Exhausted,
}

/// The visible part of the feed, in px from the top of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_top: u32,
    pub height: u32,
}

/// Whether a sentinel at `sentinel_y` is within `margin` px below the
/// viewport.
pub fn sentinel_visible(viewport: Viewport, sentinel_y: u32, margin: u32) -> bool {
    let reach = viewport
        .scroll_top
        .saturating_add(viewport.height)
        .saturating_add(margin);
    sentinel_y <= reach
}

/// Permission to render one batch, tied to the feed session it was
/// issued in.
#[derive(Debug, PartialEq, Eq)]
pub struct BatchTicket {
    epoch: u64,
}

#[derive(Debug)]
pub struct ScrollTrigger {
    state: TriggerState,
    margin: u32,
}

impl ScrollTrigger {
    pub fn new(margin: u32) -> Self {
        Self {
            state: TriggerState::Exhausted,
            margin,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Start observing after a load. Drops any batch in flight.
    pub fn arm<D: Document + ?Sized>(&mut self, renderer: &Renderer, doc: &mut D) {
        doc.set_loading(false);
        self.state = if renderer.is_exhausted() {
            TriggerState::Exhausted
        } else {
            TriggerState::Idle
        };
    }

    /// Check the sentinel against the viewport and claim a batch if it is
    /// in range.
    pub fn observe<D: Document + ?Sized>(
        &mut self,
        viewport: Viewport,
        renderer: &Renderer,
        doc: &mut D,
    ) -> Option<BatchTicket> {
        if !sentinel_visible(viewport, doc.content_height(), self.margin) {
            return None;
        }
        self.on_visible(renderer, doc)
    }

    /// The sentinel became visible.
    pub fn on_visible<D: Document + ?Sized>(
        &mut self,
        renderer: &Renderer,
        doc: &mut D,
    ) -> Option<BatchTicket> {
        match self.state {
            TriggerState::Idle if !renderer.is_exhausted() => {
                self.state = TriggerState::Loading;
                doc.set_loading(true);
                debug!(cursor = renderer.cursor(), "sentinel visible, loading batch");
                Some(BatchTicket {
                    epoch: renderer.epoch(),
                })
            }
            TriggerState::Idle => {
                self.state = TriggerState::Exhausted;
                None
            }
            TriggerState::Loading | TriggerState::Exhausted => None,
        }
    }

    /// Render the batch the ticket was issued for. A ticket from before the
    /// latest load renders nothing.
    pub fn complete<D: Document + ?Sized>(
        &mut self,
        ticket: BatchTicket,
        renderer: &mut Renderer,
        doc: &mut D,
    ) -> usize {
        let size = renderer.settings().batch_size;
        let rendered = renderer.grow_batch_for(ticket.epoch, size, doc);
        if ticket.epoch == renderer.epoch() {
            doc.set_loading(false);
            self.state = if renderer.is_exhausted() {
                TriggerState::Exhausted
            } else {
                TriggerState::Idle
            };
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::MemoryDocument,
        layout::{Breakpoints, Masonry},
        post::Post,
        prefs::LayoutPreference,
        render::RenderSettings,
    };

    fn setup(n: usize) -> (Renderer, ScrollTrigger, MemoryDocument) {
        let masonry = Masonry::new(Breakpoints::default(), 1280, LayoutPreference::Grid);
        let mut renderer = Renderer::new(RenderSettings::default(), masonry);
        let mut doc = MemoryDocument::new();
        let posts = (0..n)
            .map(|idx| Post::new(format!("p{idx}"), "ana".into(), "body".into()).unwrap())
            .collect();
        renderer.load(posts, &mut doc);
        let mut trigger = ScrollTrigger::new(400);
        trigger.arm(&renderer, &mut doc);
        (renderer, trigger, doc)
    }

    #[test]
    fn sentinel_margin_starts_growth_early() {
        let viewport = Viewport {
            scroll_top: 1000,
            height: 800,
        };
        assert!(sentinel_visible(viewport, 1800, 0));
        assert!(!sentinel_visible(viewport, 2100, 0));
        assert!(sentinel_visible(viewport, 2100, 400));
        assert!(!sentinel_visible(viewport, 2300, 400));
    }

    #[test]
    fn loading_indicator_only_while_loading() {
        let (mut renderer, mut trigger, mut doc) = setup(45);
        assert_eq!(trigger.state(), TriggerState::Idle);
        assert!(!doc.is_loading());

        let ticket = trigger.on_visible(&renderer, &mut doc).unwrap();
        assert!(doc.is_loading());
        assert_eq!(trigger.complete(ticket, &mut renderer, &mut doc), 20);
        assert!(!doc.is_loading());
        assert_eq!(trigger.state(), TriggerState::Idle);
    }

    #[test]
    fn reentrant_trigger_is_ignored() {
        let (mut renderer, mut trigger, mut doc) = setup(45);
        let first = trigger.on_visible(&renderer, &mut doc);
        let second = trigger.on_visible(&renderer, &mut doc);
        assert!(first.is_some());
        assert!(second.is_none());
        trigger.complete(first.unwrap(), &mut renderer, &mut doc);
        assert_eq!(renderer.cursor(), 40);
    }

    #[test]
    fn exhausted_feed_stops_observing() {
        let (mut renderer, mut trigger, mut doc) = setup(25);
        let ticket = trigger.on_visible(&renderer, &mut doc).unwrap();
        assert_eq!(trigger.complete(ticket, &mut renderer, &mut doc), 5);
        assert_eq!(trigger.state(), TriggerState::Exhausted);
        assert!(trigger.on_visible(&renderer, &mut doc).is_none());
        assert!(doc.is_exhausted());
    }

    #[test]
    fn ticket_from_before_reload_renders_nothing() {
        let (mut renderer, mut trigger, mut doc) = setup(45);
        let ticket = trigger.on_visible(&renderer, &mut doc).unwrap();
        let posts = (0..45)
            .map(|idx| Post::new(format!("n{idx}"), "bo".into(), "body".into()).unwrap())
            .collect();
        renderer.load(posts, &mut doc);
        trigger.arm(&renderer, &mut doc);
        assert_eq!(trigger.complete(ticket, &mut renderer, &mut doc), 0);
        assert_eq!(renderer.cursor(), 20);
        assert_eq!(trigger.state(), TriggerState::Idle);
    }

    #[test]
    fn observe_uses_content_height() {
        let (renderer, mut trigger, mut doc) = setup(45);
        let far = Viewport {
            scroll_top: 0,
            height: 10,
        };
        assert!(trigger.observe(far, &renderer, &mut doc).is_none());
        let near = Viewport {
            scroll_top: doc.content_height(),
            height: 10,
        };
        assert!(trigger.observe(near, &renderer, &mut doc).is_some());
    }
}
