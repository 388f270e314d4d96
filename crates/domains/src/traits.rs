//! # Persistence Ports
//!
//! Repository contracts the engines depend on. Any storage adapter must
//! implement these traits; services receive them by injection rather than
//! through any shared global handle.
//!
//! Records cross this boundary as the typed structs from
//! [`crate::models`] — adapters own the mapping to and from their native
//! representation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Comment, Conversation, ConversationId, Message, Post};

/// Data persistence contract for comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
    async fn create(&self, comment: Comment) -> anyhow::Result<()>;

    /// Whole-record put. Concurrent writers are last-writer-wins; callers
    /// wanting stronger guarantees need a versioned adapter.
    async fn update(&self, comment: &Comment) -> anyhow::Result<()>;

    /// Every comment on a post, ordered by creation time ascending. The
    /// fixed order is required by the tree builder, which wires parents
    /// and children in a single pass.
    async fn list_for_post(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>>;

    /// Direct children of `parent_id` (roots when `None`), creation time
    /// ascending.
    async fn list_children(
        &self,
        post_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Comment>>;

    /// Atomic counter bump on `reply_count`; saturates at zero.
    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()>;
}

/// The slice of post persistence the comment engine needs.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>>;

    /// Atomic counter bump on `comment_count`; saturates at zero.
    async fn increment_comment_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()>;
}

/// Data persistence contract for inbox messages.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>>;
    async fn create(&self, message: Message) -> anyhow::Result<()>;
    async fn update(&self, message: &Message) -> anyhow::Result<()>;

    /// Hard removal. Only used once both participants have trashed their
    /// copy; soft deletion is an `update` of flags.
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;

    /// Every message sharing `thread_id`, creation time ascending.
    async fn list_thread(&self, thread_id: Uuid) -> anyhow::Result<Vec<Message>>;

    /// Every message where `user_id` is sender or receiver and has not
    /// trashed their copy, creation time descending.
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Message>>;
}

/// Data persistence contract for two-party conversations.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &ConversationId) -> anyhow::Result<Option<Conversation>>;
    async fn create(&self, conversation: Conversation) -> anyhow::Result<()>;
    async fn update(&self, conversation: &Conversation) -> anyhow::Result<()>;

    /// Hard removal — declining a conversation leaves no tombstone.
    async fn delete(&self, id: &ConversationId) -> anyhow::Result<()>;

    /// Conversations `user_id` participates in, most recently updated
    /// first.
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Conversation>>;
}
