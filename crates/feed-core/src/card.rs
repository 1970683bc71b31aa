//! A card is the rendered form of one post: header, body, optional image,
//! action bar and its comment tree.

use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use textwrap::{core::display_width, wrap};

use crate::{
    post::Post,
    tree::{self, CommentTree},
};

const CARD_WIDTH: usize = 50;
const HEADER_HEIGHT: u32 = 56;
const LINE_HEIGHT: u32 = 20;
const IMAGE_HEIGHT: u32 = 240;
const ACTION_BAR_HEIGHT: u32 = 40;
const COMMENT_HEIGHT: u32 = 48;
const SHOW_MORE_HEIGHT: u32 = 28;

#[derive(Debug, Clone, PartialEq)]
pub struct CardHeader {
    pub author: String,
    pub avatar: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionBar {
    pub likes: u32,
    pub liked: bool,
    pub comments: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Rendered as `data-message-id`.
    pub post_id: String,
    pub header: CardHeader,
    pub body: String,
    pub image: Option<String>,
    pub actions: ActionBar,
    pub comments: CommentTree,
    /// Top-level comments shown before the "show more" affordance.
    pub visible_comments: usize,
    /// Number of top-level comments behind "show more", if any.
    pub show_more: Option<usize>,
    /// Delay before the card fades in. Zero means no animation.
    pub reveal_delay: Duration,
}

impl Card {
    /// Render one post. The tree builder runs exactly once per card.
    pub fn render(post: &Post, visible_comments: usize, reveal_delay: Duration) -> Self {
        let comments = tree::build(&post.comments);
        let top_level = comments.roots().len();
        let shown = top_level.min(visible_comments);
        Card {
            post_id: post.id().to_string(),
            header: CardHeader {
                author: post.author.clone(),
                avatar: post.avatar.clone(),
                created_at: post.created_at,
            },
            body: post.body.clone(),
            image: post.image.clone(),
            actions: ActionBar {
                likes: post.likes,
                liked: post.liked,
                comments: comments.len(),
            },
            show_more: top_level
                .checked_sub(visible_comments)
                .filter(|hidden| *hidden > 0),
            visible_comments: shown,
            comments,
            reveal_delay,
        }
    }

    /// Every `data-comment-id` carried by this card, collapsed ones included.
    pub fn comment_ids(&self) -> impl Iterator<Item = &str> {
        self.comments.iter().map(|node| node.id.as_str())
    }

    pub fn has_comment(&self, id: &str) -> bool {
        self.comments.contains(id)
    }

    /// Height in px the card occupies once laid out.
    pub fn estimated_height(&self) -> u32 {
        let body_lines = wrap(&self.body, CARD_WIDTH).len() as u32;
        let image = self.image.as_ref().map_or(0, |_| IMAGE_HEIGHT);
        let shown: u32 = self
            .comments
            .roots()
            .iter()
            .take(self.visible_comments)
            .map(|root| visible_nodes(root) as u32)
            .sum();
        let show_more = self.show_more.map_or(0, |_| SHOW_MORE_HEIGHT);
        HEADER_HEIGHT
            + body_lines * LINE_HEIGHT
            + image
            + ACTION_BAR_HEIGHT
            + shown * COMMENT_HEIGHT
            + show_more
    }
}

fn visible_nodes(node: &tree::CommentNode) -> usize {
    1 + node.replies.iter().map(visible_nodes).sum::<usize>()
}

/// Reveal delay for the card at `position` within its batch. Capped, so a
/// large batch never turns into a long waterfall.
pub fn reveal_delay(position: usize, step: Duration, max: Duration) -> Duration {
    let position = u32::try_from(position).unwrap_or(u32::MAX);
    step.saturating_mul(position).min(max)
}

fn boxed_line(f: &mut Formatter<'_>, line: &str) -> std::fmt::Result {
    let whitespace = CARD_WIDTH.saturating_sub(display_width(line));
    writeln!(f, "| {}{} |", line, " ".repeat(whitespace))
}

fn write_thread(f: &mut Formatter<'_>, node: &tree::CommentNode) -> std::fmt::Result {
    let indent = "  ".repeat(node.display_depth());
    let mention = node
        .mention
        .as_ref()
        .map(|name| format!("@{name} "))
        .unwrap_or_default();
    let text = format!("{indent}{}: {mention}{}", node.author, node.body);
    let options = textwrap::Options::new(CARD_WIDTH)
        .break_words(true)
        .subsequent_indent(&indent);
    for line in wrap(&text, options) {
        boxed_line(f, &line)?;
    }
    node.replies
        .iter()
        .try_for_each(|reply| write_thread(f, reply))
}

impl Display for Card {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "+{:-<52}+", "")?;
        boxed_line(f, &format!("{} [{}]", self.header.author, self.post_id))?;
        boxed_line(f, "")?;
        let wrapping_config = textwrap::Options::new(CARD_WIDTH).break_words(true);
        for line in wrap(&self.body, wrapping_config) {
            boxed_line(f, &line)?;
        }
        if let Some(image) = &self.image {
            boxed_line(f, &format!("[image: {image}]"))?;
        }
        boxed_line(
            f,
            &format!(
                "{} {}   {} comments",
                if self.actions.liked { "♥" } else { "♡" },
                self.actions.likes,
                self.actions.comments
            ),
        )?;
        if self.comments.is_empty() {
            boxed_line(f, "no comments yet")?;
        }
        for root in self.comments.roots().iter().take(self.visible_comments) {
            write_thread(f, root)?;
        }
        if let Some(hidden) = self.show_more {
            boxed_line(f, &format!("show {hidden} more"))?;
        }
        write!(f, "+{:-<52}+", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::RawComment;

    fn post_with_comments(top_level: usize) -> Post {
        let mut post = Post::new("p1".into(), "ana".into(), "a body".into()).unwrap();
        for idx in 0..top_level {
            post.comments.push(RawComment {
                id: Some(format!("c{idx}")),
                author: "bo".into(),
                body: "nice".into(),
                ..Default::default()
            });
        }
        post
    }

    #[test]
    fn show_more_appears_past_visible_limit() {
        let card = Card::render(&post_with_comments(2), 2, Duration::ZERO);
        assert_eq!(card.show_more, None);
        assert_eq!(card.visible_comments, 2);

        let card = Card::render(&post_with_comments(5), 2, Duration::ZERO);
        assert_eq!(card.show_more, Some(3));
        assert_eq!(card.comment_ids().count(), 5);
        assert!(card.has_comment("c4"));
    }

    #[test]
    fn single_comment_renders_without_show_more() {
        let card = Card::render(&post_with_comments(1), 2, Duration::ZERO);
        assert_eq!(card.show_more, None);
        assert_eq!(card.visible_comments, 1);
        assert!(card.to_string().contains("bo: nice"));
    }

    #[test]
    fn reveal_delay_is_capped() {
        let step = Duration::from_millis(60);
        let max = Duration::from_millis(600);
        assert_eq!(reveal_delay(0, step, max), Duration::ZERO);
        assert_eq!(reveal_delay(3, step, max), Duration::from_millis(180));
        assert_eq!(reveal_delay(10, step, max), max);
        assert_eq!(reveal_delay(10_000, step, max), max);
    }

    #[test]
    fn image_makes_a_card_taller() {
        let post = post_with_comments(0);
        let plain = Card::render(&post, 2, Duration::ZERO);
        let pictured = Card::render(&post.with_image("cat.png".into()), 2, Duration::ZERO);
        assert!(pictured.estimated_height() > plain.estimated_height());
    }

    #[test]
    fn display_shows_empty_comment_state() {
        let card = Card::render(&post_with_comments(0), 2, Duration::ZERO);
        let text = card.to_string();
        assert!(text.contains("no comments yet"));
        assert!(text.contains("[p1]"));
    }
}
