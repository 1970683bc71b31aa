use thiserror::Error;

pub type FeedResult<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum FeedError {
    /// An empty body was provided for the post.
    #[error("Post cannot be empty")]
    EmptyPost,
    /// An empty body was provided for the comment.
    #[error("Comment cannot be empty")]
    EmptyComment,
    /// The post length exceeds the maximum length.
    #[error("Max allowed size of post: {max_size}, current size: {curr_size}")]
    InvalidPostLength { max_size: usize, curr_size: usize },
    /// The comment length exceeds the maximum length.
    #[error("Max allowed size of comment: {max_size}, current size: {curr_size}")]
    InvalidCommentLength { max_size: usize, curr_size: usize },
    /// The requested/specified ID does not exist.
    #[error("Nothing exists with the given ID: {id}")]
    InvalidId { id: String },
    /// A comment names a parent that is not part of the same post.
    #[error("Parent comment {parent_id} does not belong to post {post_id}")]
    ForeignParent { post_id: String, parent_id: String },
    #[error("Unable to load the feed: {msg}")]
    FetchFailed { msg: String },
    #[error("Sqlite error: {msg}")]
    SqliteError { msg: String },
    #[error("Config error: {msg}")]
    ConfigError { msg: String },
    /// Custom Error type for errors not covered by the above errors.
    #[error("{msg}")]
    CustomError { msg: String },
}

impl FeedError {
    pub fn custom_error(msg: String) -> Self {
        Self::CustomError { msg }
    }

    pub fn config_error(msg: String) -> Self {
        Self::ConfigError { msg }
    }

    pub fn fetch_error(msg: String) -> Self {
        Self::FetchFailed { msg }
    }

    pub fn invalid_id(id: &str) -> Self {
        Self::InvalidId { id: id.to_string() }
    }
}
