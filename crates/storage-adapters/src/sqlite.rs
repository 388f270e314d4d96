//! # SQLite Adapter
//!
//! Maps the domain records onto a SQLite schema via sqlx. Map- and
//! set-valued fields (votes, unread counters, accepted/deleted sets,
//! user snapshots) are stored as JSON text columns; counter bumps run as
//! single `UPDATE ... SET x = MAX(0, x + ?)` statements so they stay
//! atomic.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use domains::models::{Comment, Conversation, ConversationId, Message, Post, UserSnapshot};
use domains::traits::{CommentStore, ConversationStore, MessageStore, PostStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    author_id     TEXT NOT NULL,
    comment_count INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS comments (
    id              TEXT PRIMARY KEY,
    post_id         TEXT NOT NULL,
    author_id       TEXT NOT NULL,
    author_username TEXT NOT NULL,
    parent_id       TEXT,
    depth           INTEGER NOT NULL,
    content         TEXT NOT NULL,
    votes           TEXT NOT NULL,
    upvotes         INTEGER NOT NULL,
    downvotes       INTEGER NOT NULL,
    reply_count     INTEGER NOT NULL,
    is_deleted      INTEGER NOT NULL,
    deleted_at      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT
);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY,
    from_user_id  TEXT NOT NULL,
    to_user_id    TEXT NOT NULL,
    from_snapshot TEXT NOT NULL,
    to_snapshot   TEXT NOT NULL,
    subject       TEXT NOT NULL,
    body          TEXT NOT NULL,
    kind          TEXT NOT NULL,
    reply_to      TEXT,
    thread_id     TEXT NOT NULL,
    is_read       INTEGER NOT NULL,
    is_starred    INTEGER NOT NULL,
    deleted_by    TEXT NOT NULL,
    is_deleted    INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, created_at);
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY,
    participant_a     TEXT NOT NULL,
    participant_b     TEXT NOT NULL,
    participant_names TEXT NOT NULL,
    last_message      TEXT,
    unread            TEXT NOT NULL,
    accepted_by       TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects and bootstraps the schema.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Seeds a post. Post creation is outside the engines' scope.
    pub async fn add_post(&self, post: &Post) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO posts (id, title, author_id, comment_count, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(post.id.to_string())
        .bind(&post.title)
        .bind(&post.author_id)
        .bind(post.comment_count as i64)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn text_to_uuid(text: &str) -> Uuid {
    Uuid::parse_str(text).unwrap_or_default()
}

fn row_to_comment(row: &SqliteRow) -> Comment {
    Comment {
        id: text_to_uuid(&row.get::<String, _>("id")),
        post_id: text_to_uuid(&row.get::<String, _>("post_id")),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        parent_id: row
            .get::<Option<String>, _>("parent_id")
            .map(|s| text_to_uuid(&s)),
        depth: row.get::<i64, _>("depth") as u32,
        content: row.get("content"),
        votes: serde_json::from_str(&row.get::<String, _>("votes")).unwrap_or_default(),
        upvotes: row.get::<i64, _>("upvotes") as u32,
        downvotes: row.get::<i64, _>("downvotes") as u32,
        reply_count: row.get::<i64, _>("reply_count") as u32,
        is_deleted: row.get("is_deleted"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Falls back to a bare snapshot if the stored JSON is unreadable, so a
/// single corrupt column cannot take a whole listing down.
fn snapshot_or_bare(json: &str, user_id: String) -> UserSnapshot {
    serde_json::from_str(json).unwrap_or_else(|_| UserSnapshot {
        username: user_id.clone(),
        display_name: user_id.clone(),
        avatar_url: None,
        user_id,
    })
}

fn row_to_message(row: &SqliteRow) -> Message {
    Message {
        id: text_to_uuid(&row.get::<String, _>("id")),
        from: snapshot_or_bare(
            &row.get::<String, _>("from_snapshot"),
            row.get("from_user_id"),
        ),
        to: snapshot_or_bare(&row.get::<String, _>("to_snapshot"), row.get("to_user_id")),
        subject: row.get("subject"),
        body: row.get("body"),
        kind: serde_json::from_str(&row.get::<String, _>("kind"))
            .unwrap_or(domains::models::MessageKind::Direct),
        reply_to: row
            .get::<Option<String>, _>("reply_to")
            .map(|s| text_to_uuid(&s)),
        thread_id: text_to_uuid(&row.get::<String, _>("thread_id")),
        is_read: row.get("is_read"),
        is_starred: row.get("is_starred"),
        deleted_by: serde_json::from_str(&row.get::<String, _>("deleted_by")).unwrap_or_default(),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_conversation(row: &SqliteRow) -> Conversation {
    let a: String = row.get("participant_a");
    let b: String = row.get("participant_b");
    Conversation {
        id: ConversationId::for_pair(&a, &b),
        participants: [a, b],
        participant_names: serde_json::from_str(&row.get::<String, _>("participant_names"))
            .unwrap_or_default(),
        last_message: row
            .get::<Option<String>, _>("last_message")
            .and_then(|s| serde_json::from_str(&s).ok()),
        unread: serde_json::from_str(&row.get::<String, _>("unread")).unwrap_or_default(),
        accepted_by: serde_json::from_str(&row.get::<String, _>("accepted_by"))
            .unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CommentStore for SqliteStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_comment))
    }

    async fn create(&self, comment: Comment) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, author_username, parent_id, depth, \
             content, votes, upvotes, downvotes, reply_count, is_deleted, deleted_at, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.id.to_string())
        .bind(comment.post_id.to_string())
        .bind(&comment.author_id)
        .bind(&comment.author_username)
        .bind(comment.parent_id.map(|p| p.to_string()))
        .bind(comment.depth as i64)
        .bind(&comment.content)
        .bind(serde_json::to_string(&comment.votes)?)
        .bind(comment.upvotes as i64)
        .bind(comment.downvotes as i64)
        .bind(comment.reply_count as i64)
        .bind(comment.is_deleted)
        .bind(comment.deleted_at)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, comment: &Comment) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE comments SET content = ?, author_username = ?, votes = ?, upvotes = ?, \
             downvotes = ?, is_deleted = ?, deleted_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&comment.content)
        .bind(&comment.author_username)
        .bind(serde_json::to_string(&comment.votes)?)
        .bind(comment.upvotes as i64)
        .bind(comment.downvotes as i64)
        .bind(comment.is_deleted)
        .bind(comment.deleted_at)
        .bind(comment.updated_at)
        .bind(comment.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query("SELECT * FROM comments WHERE post_id = ? ORDER BY created_at ASC")
            .bind(post_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn list_children(
        &self,
        post_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Comment>> {
        let rows = match parent_id {
            Some(parent) => {
                sqlx::query(
                    "SELECT * FROM comments WHERE post_id = ? AND parent_id = ? \
                     ORDER BY created_at ASC",
                )
                .bind(post_id.to_string())
                .bind(parent.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM comments WHERE post_id = ? AND parent_id IS NULL \
                     ORDER BY created_at ASC",
                )
                .bind(post_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()> {
        let result =
            sqlx::query("UPDATE comments SET reply_count = MAX(0, reply_count + ?) WHERE id = ?")
                .bind(delta)
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("comment {id} not found");
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Post {
            id: text_to_uuid(&row.get::<String, _>("id")),
            title: row.get("title"),
            author_id: row.get("author_id"),
            comment_count: row.get::<i64, _>("comment_count") as u32,
            created_at: row.get("created_at"),
        }))
    }

    async fn increment_comment_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()> {
        let result =
            sqlx::query("UPDATE posts SET comment_count = MAX(0, comment_count + ?) WHERE id = ?")
                .bind(delta)
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("post {id} not found");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_message))
    }

    async fn create(&self, message: Message) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, from_user_id, to_user_id, from_snapshot, to_snapshot, \
             subject, body, kind, reply_to, thread_id, is_read, is_starred, deleted_by, \
             is_deleted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(&message.from.user_id)
        .bind(&message.to.user_id)
        .bind(serde_json::to_string(&message.from)?)
        .bind(serde_json::to_string(&message.to)?)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(serde_json::to_string(&message.kind)?)
        .bind(message.reply_to.map(|r| r.to_string()))
        .bind(message.thread_id.to_string())
        .bind(message.is_read)
        .bind(message.is_starred)
        .bind(serde_json::to_string(&message.deleted_by)?)
        .bind(message.is_deleted)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, message: &Message) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE messages SET is_read = ?, is_starred = ?, deleted_by = ?, is_deleted = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(message.is_read)
        .bind(message.is_starred)
        .bind(serde_json::to_string(&message.deleted_by)?)
        .bind(message.is_deleted)
        .bind(message.updated_at)
        .bind(message.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_thread(&self, thread_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let rows =
            sqlx::query("SELECT * FROM messages WHERE thread_id = ? ORDER BY created_at ASC")
                .bind(thread_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE from_user_id = ? OR to_user_id = ? \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(row_to_message)
            .filter(|m| !m.deleted_by.contains(user_id))
            .collect())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get(&self, id: &ConversationId) -> anyhow::Result<Option<Conversation>> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_conversation))
    }

    async fn create(&self, conversation: Conversation) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO conversations (id, participant_a, participant_b, participant_names, \
             last_message, unread, accepted_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(conversation.id.as_str())
        .bind(&conversation.participants[0])
        .bind(&conversation.participants[1])
        .bind(serde_json::to_string(&conversation.participant_names)?)
        .bind(
            conversation
                .last_message
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(serde_json::to_string(&conversation.unread)?)
        .bind(serde_json::to_string(&conversation.accepted_by)?)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, conversation: &Conversation) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE conversations SET participant_names = ?, last_message = ?, unread = ?, \
             accepted_by = ?, updated_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(&conversation.participant_names)?)
        .bind(
            conversation
                .last_message
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(serde_json::to_string(&conversation.unread)?)
        .bind(serde_json::to_string(&conversation.accepted_by)?)
        .bind(conversation.updated_at)
        .bind(conversation.id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &ConversationId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE participant_a = ? OR participant_b = ? \
             ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_conversation).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn comment_roundtrip_and_bump() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let post = Post {
            id: Uuid::now_v7(),
            title: "t".into(),
            author_id: "op".into(),
            comment_count: 0,
            created_at: Utc::now(),
        };
        store.add_post(&post).await.unwrap();

        let comment = Comment {
            id: Uuid::now_v7(),
            post_id: post.id,
            author_id: "alice".into(),
            author_username: "alice".into(),
            parent_id: None,
            depth: 0,
            content: "hello".into(),
            votes: BTreeMap::from([("bob".to_string(), domains::models::VoteKind::Up)]),
            upvotes: 1,
            downvotes: 0,
            reply_count: 0,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let id = comment.id;
        CommentStore::create(&store, comment).await.unwrap();
        store.increment_reply_count(id, 1).await.unwrap();

        let got = CommentStore::get(&store, id).await.unwrap().unwrap();
        assert_eq!(got.reply_count, 1);
        assert_eq!(got.upvotes, 1);
        assert_eq!(got.votes.len(), 1);

        let listed = store.list_for_post(post.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
