//! # In-Memory Adapter
//!
//! DashMap-backed implementation of every persistence port. Counter bumps
//! mutate the record in place while holding the per-key lock, giving the
//! atomic single-field increment the ports promise. Used by the test
//! suites and suitable for embedded/demo deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use domains::models::{Comment, Conversation, ConversationId, Message, Post};
use domains::traits::{CommentStore, ConversationStore, MessageStore, PostStore};

#[derive(Default)]
pub struct MemoryStore {
    posts: DashMap<Uuid, Post>,
    comments: DashMap<Uuid, Comment>,
    messages: DashMap<Uuid, Message>,
    conversations: DashMap<ConversationId, Conversation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a post. Post creation is outside the engines' scope, so this
    /// is an inherent method rather than part of a port.
    pub fn add_post(&self, post: Post) {
        self.posts.insert(post.id, post);
    }
}

fn bump(value: u32, delta: i64) -> u32 {
    if delta < 0 {
        value.saturating_sub(delta.unsigned_abs() as u32)
    } else {
        value.saturating_add(delta as u32)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.clone()))
    }

    async fn create(&self, comment: Comment) -> anyhow::Result<()> {
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn update(&self, comment: &Comment) -> anyhow::Result<()> {
        self.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == post_id)
            .map(|entry| entry.clone())
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn list_children(
        &self,
        post_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == post_id && entry.parent_id == parent_id)
            .map(|entry| entry.clone())
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()> {
        let mut entry = self
            .comments
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("comment {id} not found"))?;
        entry.reply_count = bump(entry.reply_count, delta);
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn increment_comment_count(&self, id: Uuid, delta: i64) -> anyhow::Result<()> {
        let mut entry = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("post {id} not found"))?;
        entry.comment_count = bump(entry.comment_count, delta);
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn create(&self, message: Message) -> anyhow::Result<()> {
        self.messages.insert(message.id, message);
        Ok(())
    }

    async fn update(&self, message: &Message) -> anyhow::Result<()> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.messages.remove(&id);
        Ok(())
    }

    async fn list_thread(&self, thread_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| entry.thread_id == thread_id)
            .map(|entry| entry.clone())
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| entry.involves(user_id) && !entry.deleted_by.contains(user_id))
            .map(|entry| entry.clone())
            .collect();
        messages.sort_by_key(|m| (std::cmp::Reverse(m.created_at), m.id));
        Ok(messages)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, id: &ConversationId) -> anyhow::Result<Option<Conversation>> {
        Ok(self.conversations.get(id).map(|c| c.clone()))
    }

    async fn create(&self, conversation: Conversation) -> anyhow::Result<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn update(&self, conversation: &Conversation) -> anyhow::Result<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete(&self, id: &ConversationId) -> anyhow::Result<()> {
        self.conversations.remove(id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|entry| entry.is_participant(user_id))
            .map(|entry| entry.clone())
            .collect();
        conversations.sort_by_key(|c| std::cmp::Reverse(c.updated_at));
        Ok(conversations)
    }
}
