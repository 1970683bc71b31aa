use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Post,
    Comment,
    Like,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// What a subscription delivers for every change in the source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChangeRecord {
    pub op: ChangeOp,
    pub kind: UpdateKind,
    /// Id of the post, comment, or liked target.
    pub id: String,
    /// Post the target belongs to, for comments and likes on a comment.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// New like count, for like changes.
    #[serde(default)]
    pub likes: Option<u32>,
}

impl ChangeRecord {
    pub fn new(op: ChangeOp, kind: UpdateKind, id: &str, parent_id: Option<&str>) -> Self {
        Self {
            op,
            kind,
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            likes: None,
        }
    }

    pub fn with_likes(mut self, likes: u32) -> Self {
        self.likes = Some(likes);
        self
    }
}

/// Filters for a bulk fetch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PageFilters {
    pub author: Option<String>,
    pub limit: Option<u32>,
}
