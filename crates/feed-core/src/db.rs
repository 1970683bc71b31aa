use crate::{
    constant::{DB_FILE, PAGINATION_LIMIT},
    post::{Post, RawComment},
    state::PageFilters,
    FeedError, FeedResult,
};
use rand::{thread_rng, Rng};
use sqlite::{Connection, State};
use std::{collections::HashMap, path::Path, path::PathBuf};

pub const POSTS_TABLE: &str = "posts";
pub const COMMENTS_TABLE: &str = "comments";
pub const PREFS_TABLE: &str = "prefs";

/// What a like landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikedRow {
    Post { likes: u32 },
    Comment { post_id: String, likes: u32 },
}

pub fn setup_tables(conn: &mut Connection) -> FeedResult<()> {
    let statement = format!(
        "
        CREATE TABLE IF NOT EXISTS {POSTS_TABLE}
        (id TEXT PRIMARY KEY,
        author TEXT NOT NULL,
        avatar TEXT,
        body TEXT NOT NULL,
        image TEXT,
        created_at INTEGER NOT NULL,
        likes INTEGER NOT NULL DEFAULT 0);
        CREATE TABLE IF NOT EXISTS {COMMENTS_TABLE}
        (id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        parent_id TEXT,
        reply_to_name TEXT,
        author TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        likes INTEGER NOT NULL DEFAULT 0);
        CREATE TABLE IF NOT EXISTS {PREFS_TABLE}
        (key TEXT PRIMARY KEY,
        value TEXT NOT NULL);
    "
    );

    conn.execute(statement)?;

    Ok(())
}

pub fn query_table_info(conn: &Connection, table_name: &str) -> FeedResult<Vec<String>> {
    let statement = format!("PRAGMA table_info({table_name});");
    let mut stmt = conn.prepare(statement)?;
    let mut columns = Vec::new();
    while let State::Row = stmt.next()? {
        columns.push(stmt.read::<String, _>("name")?);
    }
    Ok(columns)
}

/// path - Can be either a complete file path(with .db suffix) or
///        a directory which will then be appended with the default
///        db name. Missing directories are created.
pub fn open_db(path: &Path) -> FeedResult<Connection> {
    let path = if path.extension().is_some_and(|ext| ext == "db") {
        path.to_path_buf()
    } else {
        path.join(DB_FILE)
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = sqlite::open(&path).map_err(|err| FeedError::SqliteError {
        msg: format!("{}: {err}", path.display()),
    })?;
    setup_tables(&mut conn)?;
    Ok(conn)
}

/// Inserts the post and its comments in one transaction; nothing is
/// stored if any row fails.
pub fn insert_post(conn: &Connection, post: &Post) -> FeedResult<()> {
    conn.execute("BEGIN")?;
    match write_post(conn, post) {
        Ok(()) => {
            conn.execute("COMMIT")?;
            Ok(())
        }
        Err(err) => {
            conn.execute("ROLLBACK")?;
            Err(err)
        }
    }
}

fn write_post(conn: &Connection, post: &Post) -> FeedResult<()> {
    let statement = format!(
        "INSERT INTO {POSTS_TABLE} (id, author, avatar, body, image, created_at, likes)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    );
    let mut stmt = conn.prepare(statement)?;
    stmt.bind((1, post.id()))?;
    stmt.bind((2, post.author.as_str()))?;
    stmt.bind((3, post.avatar.as_deref()))?;
    stmt.bind((4, post.body.as_str()))?;
    stmt.bind((5, post.image.as_deref()))?;
    stmt.bind((6, i64::try_from(post.created_at)?))?;
    stmt.bind((7, i64::from(post.likes)))?;
    stmt.next()?;

    for comment in flatten_comments(&post.comments, None) {
        if let Some(parent_id) = comment.parent_id.as_deref() {
            if !post.contains_comment(parent_id) {
                return Err(foreign_parent(post.id(), parent_id));
            }
        }
        write_comment(conn, post.id(), &comment)?;
    }
    Ok(())
}

/// Nested replies are stored flat, linked through `parent_id`.
fn flatten_comments(nodes: &[RawComment], nesting_parent: Option<&str>) -> Vec<RawComment> {
    let mut flat = Vec::new();
    for node in nodes {
        let Some(id) = node.id.as_deref() else {
            continue;
        };
        let mut comment = node.clone();
        comment.replies = Vec::new();
        if comment.parent_id.is_none() {
            comment.parent_id = nesting_parent.map(str::to_string);
        }
        flat.push(comment);
        flat.extend(flatten_comments(&node.replies, Some(id)));
    }
    flat
}

fn foreign_parent(post_id: &str, parent_id: &str) -> anyhow::Error {
    FeedError::ForeignParent {
        post_id: post_id.to_string(),
        parent_id: parent_id.to_string(),
    }
    .into()
}

/// Attach a comment to a stored post. A parent, if named, must be a
/// comment of the same post.
pub fn insert_comment(conn: &Connection, post_id: &str, comment: &RawComment) -> FeedResult<()> {
    if let Some(parent_id) = comment.parent_id.as_deref() {
        let mut stmt =
            conn.prepare(format!("SELECT post_id FROM {COMMENTS_TABLE} WHERE id = ?"))?;
        stmt.bind((1, parent_id))?;
        let owner = match stmt.next()? {
            State::Row => Some(stmt.read::<String, _>("post_id")?),
            State::Done => None,
        };
        if owner.as_deref() != Some(post_id) {
            return Err(foreign_parent(post_id, parent_id));
        }
    }
    write_comment(conn, post_id, comment)
}

fn write_comment(conn: &Connection, post_id: &str, comment: &RawComment) -> FeedResult<()> {
    let id = comment
        .id
        .as_deref()
        .ok_or_else(|| FeedError::custom_error("Comment has no ID".into()))?;
    let statement = format!(
        "INSERT INTO {COMMENTS_TABLE}
         (id, post_id, parent_id, reply_to_name, author, body, created_at, likes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    );
    let mut stmt = conn.prepare(statement)?;
    stmt.bind((1, id))?;
    stmt.bind((2, post_id))?;
    stmt.bind((3, comment.parent_id.as_deref()))?;
    stmt.bind((4, comment.reply_to_name.as_deref()))?;
    stmt.bind((5, comment.author.as_str()))?;
    stmt.bind((6, comment.body.as_str()))?;
    stmt.bind((7, i64::try_from(comment.created_at)?))?;
    stmt.bind((8, i64::from(comment.likes)))?;
    stmt.next()?;
    Ok(())
}

/// Deletes the post and all of its comments. Returns whether a post was removed.
pub fn delete_post_by_id(conn: &Connection, post_id: &str) -> FeedResult<bool> {
    let mut stmt = conn.prepare(format!("DELETE FROM {COMMENTS_TABLE} WHERE post_id = ?"))?;
    stmt.bind((1, post_id))?;
    stmt.next()?;

    let mut stmt = conn.prepare(format!("DELETE FROM {POSTS_TABLE} WHERE id = ?"))?;
    stmt.bind((1, post_id))?;
    stmt.next()?;
    Ok(conn.change_count() > 0)
}

/// Add one like to whatever `target_id` names, post first.
pub fn increment_likes(conn: &Connection, target_id: &str) -> FeedResult<Option<LikedRow>> {
    if let Some(likes) = bump(conn, POSTS_TABLE, target_id)? {
        return Ok(Some(LikedRow::Post { likes }));
    }
    if let Some(likes) = bump(conn, COMMENTS_TABLE, target_id)? {
        let mut stmt =
            conn.prepare(format!("SELECT post_id FROM {COMMENTS_TABLE} WHERE id = ?"))?;
        stmt.bind((1, target_id))?;
        if let State::Row = stmt.next()? {
            let post_id = stmt.read::<String, _>("post_id")?;
            return Ok(Some(LikedRow::Comment { post_id, likes }));
        }
    }
    Ok(None)
}

fn bump(conn: &Connection, table: &str, id: &str) -> FeedResult<Option<u32>> {
    let mut stmt = conn.prepare(format!("UPDATE {table} SET likes = likes + 1 WHERE id = ?"))?;
    stmt.bind((1, id))?;
    stmt.next()?;
    if conn.change_count() == 0 {
        return Ok(None);
    }
    let mut stmt = conn.prepare(format!("SELECT likes FROM {table} WHERE id = ?"))?;
    stmt.bind((1, id))?;
    match stmt.next()? {
        State::Row => Ok(Some(stmt.read::<i64, _>("likes")?.try_into()?)),
        State::Done => Ok(None),
    }
}

/// Newest-first page of posts with their comments attached in flat form.
pub fn query_posts(conn: &Connection, filters: &PageFilters) -> FeedResult<Vec<Post>> {
    let limit = filters
        .limit
        .map_or(i64::MAX, |limit| i64::from(limit.min(PAGINATION_LIMIT)));
    let statement = format!(
        "SELECT * FROM {POSTS_TABLE}
         WHERE (?1 IS NULL OR author = ?1)
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(statement)?;
    stmt.bind((1, filters.author.as_deref()))?;
    stmt.bind((2, limit))?;

    let mut posts = Vec::new();
    while let State::Row = stmt.next()? {
        posts.push(Post::parse_sqlite_row(&stmt)?);
    }

    let mut comments = query_comments(conn)?;
    for post in posts.iter_mut() {
        if let Some(list) = comments.remove(post.id()) {
            post.comments = list;
        }
    }
    Ok(posts)
}

fn query_comments(conn: &Connection) -> FeedResult<HashMap<String, Vec<RawComment>>> {
    let statement = format!("SELECT * FROM {COMMENTS_TABLE} ORDER BY created_at ASC, rowid ASC");
    let mut stmt = conn.prepare(statement)?;
    let mut by_post: HashMap<String, Vec<RawComment>> = HashMap::new();
    while let State::Row = stmt.next()? {
        let (post_id, comment) = RawComment::parse_sqlite_row(&stmt)?;
        by_post.entry(post_id).or_default().push(comment);
    }
    Ok(by_post)
}

/// Generates a random db name with four 16-bit fields, such that when generating
/// random numbers, the range of each 16 bit field is 0-65536. Hence,
/// each random db name is `feed-xxxxx-xxxxx-xxxxx-xxxxx.db`
/// The generated digits are padded with zeroes to ensure standardised
/// length of each field.
pub fn generate_random_db_name() -> String {
    let mut buffer = [0u16; 4];
    thread_rng().fill(&mut buffer);
    let mut result = buffer
        .into_iter()
        .map(|val| format!("{:05}", val.to_be()))
        .collect::<Vec<String>>()
        .join("-");
    result.insert_str(0, "feed-");
    result.push_str(".db");
    result
}

pub fn generate_temp_db() -> PathBuf {
    std::env::temp_dir().join(generate_random_db_name())
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_conn() -> (PathBuf, Connection) {
        let path = generate_temp_db();
        let conn = open_db(&path).unwrap();
        (path, conn)
    }

    fn post(id: &str, created_at: u64) -> Post {
        Post::new(id.into(), "ana".into(), format!("body of {id}"))
            .unwrap()
            .with_created_at(created_at)
    }

    #[test]
    fn test_generate_random_db_name() {
        for _ in 0..5 {
            let db_name = generate_random_db_name();
            assert!(db_name.starts_with("feed-"));
            assert!(db_name.ends_with(".db"));
            assert_eq!(db_name.len(), 31);
        }
    }

    #[test]
    fn test_setup_tables() {
        let (path, conn) = temp_conn();
        let columns = query_table_info(&conn, POSTS_TABLE).unwrap();
        assert_eq!(
            columns,
            ["id", "author", "avatar", "body", "image", "created_at", "likes"]
        );
        let columns = query_table_info(&conn, COMMENTS_TABLE).unwrap();
        assert_eq!(columns.len(), 8);
        drop(conn);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }

    #[test]
    fn test_query_posts_newest_first_with_comments() {
        let (path, conn) = temp_conn();
        let mut old = post("p1", 100);
        old.comments.push(
            RawComment {
                id: Some("c1".into()),
                author: "bo".into(),
                body: "first".into(),
                created_at: 101,
                ..Default::default()
            }
            .with_replies(vec![RawComment {
                id: Some("c2".into()),
                author: "cy".into(),
                body: "reply".into(),
                created_at: 102,
                ..Default::default()
            }]),
        );
        insert_post(&conn, &old).unwrap();
        insert_post(&conn, &post("p2", 200).with_image("cat.png".into())).unwrap();

        let posts = query_posts(&conn, &PageFilters::default()).unwrap();
        let ids: Vec<&str> = posts.iter().map(Post::id).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert_eq!(posts[0].image.as_deref(), Some("cat.png"));
        assert_eq!(posts[1].comments.len(), 2);
        assert_eq!(posts[1].comments[1].parent_id.as_deref(), Some("c1"));

        let limited = PageFilters {
            author: None,
            limit: Some(1),
        };
        assert_eq!(query_posts(&conn, &limited).unwrap().len(), 1);

        drop(conn);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }

    #[test]
    fn test_increment_and_delete() {
        let (path, conn) = temp_conn();
        let mut p = post("p1", 100);
        p.comments.push(RawComment {
            id: Some("c1".into()),
            author: "bo".into(),
            body: "first".into(),
            ..Default::default()
        });
        insert_post(&conn, &p).unwrap();

        assert_eq!(
            increment_likes(&conn, "p1").unwrap(),
            Some(LikedRow::Post { likes: 1 })
        );
        assert_eq!(
            increment_likes(&conn, "c1").unwrap(),
            Some(LikedRow::Comment {
                post_id: "p1".into(),
                likes: 1
            })
        );
        assert_eq!(increment_likes(&conn, "nope").unwrap(), None);

        assert!(delete_post_by_id(&conn, "p1").unwrap());
        assert!(!delete_post_by_id(&conn, "p1").unwrap());
        assert!(query_posts(&conn, &PageFilters::default()).unwrap().is_empty());

        drop(conn);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }

    #[test]
    fn test_comment_parent_must_share_post() {
        let (path, conn) = temp_conn();
        let mut p1 = post("p1", 100);
        p1.comments.push(RawComment {
            id: Some("c1".into()),
            author: "bo".into(),
            body: "first".into(),
            ..Default::default()
        });
        insert_post(&conn, &p1).unwrap();
        insert_post(&conn, &post("p2", 200)).unwrap();

        let reply = RawComment {
            id: Some("c2".into()),
            author: "cy".into(),
            body: "reply".into(),
            parent_id: Some("c1".into()),
            ..Default::default()
        };
        let err = insert_comment(&conn, "p2", &reply).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::ForeignParent { .. })
        ));
        insert_comment(&conn, "p1", &reply).unwrap();

        let posts = query_posts(&conn, &PageFilters::default()).unwrap();
        assert!(posts[0].comments.is_empty());
        assert_eq!(posts[1].comments.len(), 2);

        drop(conn);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }

    #[test]
    fn test_failed_post_insert_stores_nothing() {
        let (path, conn) = temp_conn();
        let mut p1 = post("p1", 100);
        p1.comments.push(RawComment {
            id: Some("c1".into()),
            author: "bo".into(),
            body: "first".into(),
            ..Default::default()
        });
        insert_post(&conn, &p1).unwrap();

        let mut p2 = post("p2", 200);
        p2.comments.push(RawComment {
            id: Some("c1".into()),
            author: "cy".into(),
            body: "taken id".into(),
            ..Default::default()
        });
        assert!(insert_post(&conn, &p2).is_err());

        let posts = query_posts(&conn, &PageFilters::default()).unwrap();
        let ids: Vec<&str> = posts.iter().map(Post::id).collect();
        assert_eq!(ids, vec!["p1"]);
        insert_post(&conn, &post("p3", 300)).unwrap();
        assert_eq!(query_posts(&conn, &PageFilters::default()).unwrap().len(), 2);

        drop(conn);
        std::fs::remove_file(path).expect("Db cleanup failed");
    }
}
