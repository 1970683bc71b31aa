//! Turns a post's comment payload into the tree the card renders.
//!
//! The payload may be flat (every node names its `parent_id`), nested
//! (replies inline under `replies`), or a mix of both. Nodes without an
//! id, duplicates, and nodes whose parent is not part of the payload are
//! skipped; nothing here fails.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::{constant::MAX_COMMENT_DEPTH, post::RawComment, utils::present_name};

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: u64,
    pub likes: u32,
    pub liked: bool,
    /// Nesting depth in storage, 0 for a top-level comment. Unbounded.
    pub depth: usize,
    /// Name rendered as "@name" in front of a reply.
    pub mention: Option<String>,
    pub can_reply: bool,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Indentation level; replies deeper than the maximum share its indent.
    pub fn display_depth(&self) -> usize {
        self.depth.min(MAX_COMMENT_DEPTH)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentTree {
    /// Nothing displayable; the card shows its empty-comments state.
    NoComments,
    Threads(Vec<CommentNode>),
}

impl CommentTree {
    pub fn roots(&self) -> &[CommentNode] {
        match self {
            CommentTree::NoComments => &[],
            CommentTree::Threads(roots) => roots,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CommentTree::NoComments)
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Pre-order walk over every node.
    pub fn iter(&self) -> impl Iterator<Item = &CommentNode> {
        let mut stack: Vec<&CommentNode> = self.roots().iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.replies.iter().rev());
            Some(node)
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.iter().any(|node| node.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut CommentNode> {
        fn find<'a>(nodes: &'a mut [CommentNode], id: &str) -> Option<&'a mut CommentNode> {
            for node in nodes.iter_mut() {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = find(&mut node.replies, id) {
                    return Some(found);
                }
            }
            None
        }
        match self {
            CommentTree::NoComments => None,
            CommentTree::Threads(roots) => find(roots, id),
        }
    }
}

/// A payload node that survived validation, with its effective parent.
struct Entry<'a> {
    raw: &'a RawComment,
    id: &'a str,
    parent: Option<&'a str>,
}

type Children<'a, 'e> = HashMap<Option<&'a str>, Vec<&'e Entry<'a>>>;

/// Build the display tree for one post's comment payload.
pub fn build(payload: &[RawComment]) -> CommentTree {
    let mut entries = Vec::new();
    collect(payload, None, &mut entries);

    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let fresh = seen.insert(entry.id);
        if !fresh {
            warn!(id = entry.id, "skipping duplicate comment");
        }
        fresh
    });

    let mut children: Children = HashMap::new();
    for entry in &entries {
        match entry.parent {
            Some(parent) if !seen.contains(parent) => {
                warn!(id = entry.id, parent, "skipping comment with unknown parent");
            }
            parent => children.entry(parent).or_default().push(entry),
        }
    }

    let roots = thread(&children, None, None, 0);
    if roots.is_empty() {
        CommentTree::NoComments
    } else {
        CommentTree::Threads(roots)
    }
}

fn collect<'a>(nodes: &'a [RawComment], nesting_parent: Option<&'a str>, out: &mut Vec<Entry<'a>>) {
    for raw in nodes {
        let Some(id) = present_name(raw.id.as_deref()) else {
            warn!(replies = raw.replies.len(), "skipping comment without an id");
            continue;
        };
        let parent = present_name(raw.parent_id.as_deref()).or(nesting_parent);
        out.push(Entry { raw, id, parent });
        collect(&raw.replies, Some(id), out);
    }
}

/// Build the replies under `parent`. `parent_name` is the author of the
/// node being replied to and is handed down rather than stored anywhere.
fn thread(
    children: &Children,
    parent: Option<&str>,
    parent_name: Option<&str>,
    depth: usize,
) -> Vec<CommentNode> {
    let Some(level) = children.get(&parent) else {
        return Vec::new();
    };
    level
        .iter()
        .map(|entry| {
            let mention = (depth > 0)
                .then(|| mention_for(entry.raw, parent_name))
                .flatten();
            CommentNode {
                id: entry.id.to_string(),
                author: entry.raw.author.clone(),
                body: entry.raw.body.clone(),
                created_at: entry.raw.created_at,
                likes: entry.raw.likes,
                liked: entry.raw.liked,
                depth,
                mention,
                can_reply: depth < MAX_COMMENT_DEPTH,
                replies: thread(
                    children,
                    Some(entry.id),
                    Some(entry.raw.author.as_str()),
                    depth + 1,
                ),
            }
        })
        .collect()
}

/// The stored reply-to name wins; otherwise the syntactic parent's author.
fn mention_for(raw: &RawComment, parent_name: Option<&str>) -> Option<String> {
    present_name(raw.reply_to_name.as_deref())
        .or_else(|| present_name(parent_name))
        .map(str::to_string)
}
