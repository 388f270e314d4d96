//! # Conversation Service
//!
//! Two-party direct messaging gated by mutual acceptance. The first
//! message between a pair of users creates their conversation and counts
//! as the initiator's consent; every later send requires both sides to
//! have accepted. Declining removes the conversation outright.
//!
//! Also owns the per-message inbox bookkeeping (star, read, trash) since
//! those operate on the same records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use domains::error::{AppError, Result};
use domains::models::{
    Conversation, ConversationId, Message, MessageKind, MessagePreview, UserSnapshot,
    PREVIEW_MAX_CHARS,
};
use domains::traits::{ConversationStore, MessageStore};

use crate::threads::{breadcrumb, build_message_tree, MessageNode};

/// Input for a direct message or reply.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: UserSnapshot,
    pub to: UserSnapshot,
    pub subject: String,
    pub body: String,
    /// `None` starts a new thread.
    pub reply_to: Option<Uuid>,
}

pub struct ConversationService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
}

impl ConversationService {
    pub fn new(conversations: Arc<dyn ConversationStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    /// Sends a direct message, lazily creating the conversation.
    ///
    /// The very first message between two users always goes through (it is
    /// the contact request). Once the conversation exists, sends are
    /// rejected with `PermissionDenied` until both participants have
    /// accepted.
    pub async fn send_direct_message(&self, outgoing: OutgoingMessage) -> Result<Uuid> {
        let OutgoingMessage {
            from,
            to,
            subject,
            body,
            reply_to,
        } = outgoing;
        if from.user_id == to.user_id {
            return Err(AppError::InvalidState(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let conv_id = ConversationId::for_pair(&from.user_id, &to.user_id);
        let existing = self.conversations.get(&conv_id).await?;
        if let Some(conv) = &existing {
            if !conv.is_fully_accepted() {
                return Err(AppError::PermissionDenied(
                    "conversation is awaiting acceptance".into(),
                ));
            }
        }

        let id = Uuid::now_v7();
        let thread_id = match reply_to {
            Some(parent_id) => {
                let parent = self
                    .messages
                    .get(parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Message", parent_id))?;
                if !parent.involves(&from.user_id) {
                    return Err(AppError::Forbidden(
                        "cannot reply to a message you are not part of".into(),
                    ));
                }
                if !parent.involves(&to.user_id) {
                    return Err(AppError::Forbidden(
                        "reply recipient is not part of this thread".into(),
                    ));
                }
                parent.thread_id
            }
            None => id,
        };

        let now = Utc::now();
        let message = Message {
            id,
            from: from.clone(),
            to: to.clone(),
            subject,
            body: body.clone(),
            kind: MessageKind::Direct,
            reply_to,
            thread_id,
            is_read: false,
            is_starred: false,
            deleted_by: BTreeSet::new(),
            is_deleted: false,
            created_at: now,
            updated_at: None,
        };
        self.messages.create(message).await?;

        let preview = MessagePreview {
            text: preview_text(&body),
            sent_at: now,
        };
        match existing {
            Some(mut conv) => {
                conv.last_message = Some(preview);
                *conv.unread.entry(to.user_id.clone()).or_insert(0) += 1;
                conv.participant_names
                    .insert(from.user_id.clone(), from.display_name.clone());
                conv.participant_names
                    .insert(to.user_id.clone(), to.display_name.clone());
                conv.updated_at = now;
                self.conversations.update(&conv).await?;
            }
            None => {
                let conv = Conversation {
                    id: conv_id.clone(),
                    participants: [from.user_id.clone(), to.user_id.clone()],
                    participant_names: BTreeMap::from([
                        (from.user_id.clone(), from.display_name.clone()),
                        (to.user_id.clone(), to.display_name.clone()),
                    ]),
                    last_message: Some(preview),
                    unread: BTreeMap::from([(to.user_id.clone(), 1)]),
                    // Sending the request is the initiator's consent.
                    accepted_by: BTreeSet::from([from.user_id.clone()]),
                    created_at: now,
                    updated_at: now,
                };
                self.conversations.create(conv).await?;
                debug!(conversation = %conv_id, "conversation created by first message");
            }
        }
        Ok(id)
    }

    pub async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        self.conversations
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation", id))
    }

    /// Conversations `user_id` participates in, most recent activity first.
    pub async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>> {
        Ok(self.conversations.list_for_user(user_id).await?)
    }

    /// Records `user_id`'s acceptance. Once both participants are in, the
    /// conversation is open for free exchange.
    pub async fn accept_chat(&self, id: &ConversationId, user_id: &str) -> Result<Conversation> {
        let mut conv = self.get_conversation(id).await?;
        if !conv.is_participant(user_id) {
            return Err(AppError::Forbidden(
                "only a participant may accept a conversation".into(),
            ));
        }
        conv.accepted_by.insert(user_id.to_string());
        conv.updated_at = Utc::now();
        self.conversations.update(&conv).await?;
        debug!(conversation = %id, user = user_id, fully_accepted = conv.is_fully_accepted(),
               "conversation accepted");
        Ok(conv)
    }

    /// Declines the conversation: the record is removed entirely. No
    /// tombstone is kept, so the pair can start over later.
    pub async fn decline_chat(&self, id: &ConversationId, user_id: &str) -> Result<()> {
        let conv = self.get_conversation(id).await?;
        if !conv.is_participant(user_id) {
            return Err(AppError::Forbidden(
                "only a participant may decline a conversation".into(),
            ));
        }
        self.conversations.delete(id).await?;
        debug!(conversation = %id, user = user_id, "conversation declined and removed");
        Ok(())
    }

    /// Flat fetch of every message in a thread, creation order.
    pub async fn thread_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.messages.list_thread(thread_id).await?)
    }

    /// The reply tree for a thread.
    pub async fn message_tree(&self, thread_id: Uuid) -> Result<Vec<MessageNode>> {
        let messages = self.messages.list_thread(thread_id).await?;
        Ok(build_message_tree(messages))
    }

    /// Root-to-leaf navigation path for one message of a thread.
    pub async fn breadcrumb_for(&self, thread_id: Uuid, leaf_id: Uuid) -> Result<Vec<Message>> {
        let messages = self.messages.list_thread(thread_id).await?;
        Ok(breadcrumb(&messages, leaf_id))
    }

    /// All messages visible to `user_id`, newest first.
    pub async fn inbox_for(&self, user_id: &str) -> Result<Vec<Message>> {
        Ok(self.messages.list_for_user(user_id).await?)
    }

    /// Flips the star flag; returns the new state.
    pub async fn toggle_star(&self, message_id: Uuid, user_id: &str) -> Result<bool> {
        let mut message = self.get_message(message_id, user_id).await?;
        message.is_starred = !message.is_starred;
        message.updated_at = Some(Utc::now());
        self.messages.update(&message).await?;
        Ok(message.is_starred)
    }

    /// Marks a message read and, for the recipient, releases one unit of
    /// the conversation's unread counter.
    pub async fn mark_read(&self, message_id: Uuid, user_id: &str) -> Result<()> {
        let mut message = self.get_message(message_id, user_id).await?;
        if message.is_read {
            return Ok(());
        }
        message.is_read = true;
        message.updated_at = Some(Utc::now());
        self.messages.update(&message).await?;
        if message.to.user_id == user_id {
            self.adjust_unread(&message, user_id, -1).await?;
        }
        Ok(())
    }

    /// Puts a message back into the unread state.
    pub async fn mark_unread(&self, message_id: Uuid, user_id: &str) -> Result<()> {
        let mut message = self.get_message(message_id, user_id).await?;
        if !message.is_read {
            return Ok(());
        }
        message.is_read = false;
        message.updated_at = Some(Utc::now());
        self.messages.update(&message).await?;
        if message.to.user_id == user_id {
            self.adjust_unread(&message, user_id, 1).await?;
        }
        Ok(())
    }

    /// Soft-deletes `user_id`'s copy of a message. The record is removed
    /// for good only once both participants have trashed it.
    pub async fn move_to_trash(&self, message_id: Uuid, user_id: &str) -> Result<()> {
        let mut message = self.get_message(message_id, user_id).await?;
        message.deleted_by.insert(user_id.to_string());

        let both_sides = message.deleted_by.contains(&message.from.user_id)
            && message.deleted_by.contains(&message.to.user_id);
        if both_sides {
            self.messages.delete(message_id).await?;
        } else {
            message.is_deleted = true;
            message.updated_at = Some(Utc::now());
            self.messages.update(&message).await?;
        }
        Ok(())
    }

    async fn get_message(&self, message_id: Uuid, user_id: &str) -> Result<Message> {
        let message = self
            .messages
            .get(message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Message", message_id))?;
        if !message.involves(user_id) {
            return Err(AppError::Forbidden(
                "message belongs to another pair of users".into(),
            ));
        }
        Ok(message)
    }

    async fn adjust_unread(&self, message: &Message, user_id: &str, delta: i64) -> Result<()> {
        let conv_id = ConversationId::for_pair(&message.from.user_id, &message.to.user_id);
        let Some(mut conv) = self.conversations.get(&conv_id).await? else {
            return Ok(());
        };
        let counter = conv.unread.entry(user_id.to_string()).or_insert(0);
        *counter = if delta < 0 {
            counter.saturating_sub(delta.unsigned_abs() as u32)
        } else {
            counter.saturating_add(delta as u32)
        };
        conv.updated_at = Utc::now();
        self.conversations.update(&conv).await?;
        Ok(())
    }
}

/// Truncated single-line preview for conversation listings.
fn preview_text(body: &str) -> String {
    let flattened: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= PREVIEW_MAX_CHARS {
        flattened
    } else {
        let cut: String = flattened.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::traits::{MockConversationStore, MockMessageStore};
    use mockall::predicate::eq;

    fn snapshot(user: &str) -> UserSnapshot {
        UserSnapshot {
            user_id: user.into(),
            username: user.into(),
            display_name: user.into(),
            avatar_url: None,
        }
    }

    fn pending_conversation(a: &str, b: &str) -> Conversation {
        Conversation {
            id: ConversationId::for_pair(a, b),
            participants: [a.to_string(), b.to_string()],
            participant_names: BTreeMap::new(),
            last_message: None,
            unread: BTreeMap::new(),
            accepted_by: BTreeSet::from([a.to_string()]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn outgoing(from: &str, to: &str) -> OutgoingMessage {
        OutgoingMessage {
            from: snapshot(from),
            to: snapshot(to),
            subject: "hey".into(),
            body: "hello there".into(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn first_message_creates_conversation_with_sender_accepted() {
        let mut conversations = MockConversationStore::new();
        conversations.expect_get().returning(|_| Ok(None));
        conversations
            .expect_create()
            .withf(|conv: &Conversation| {
                conv.accepted_by.contains("alice")
                    && !conv.accepted_by.contains("bob")
                    && conv.unread.get("bob") == Some(&1)
                    && conv.last_message.is_some()
            })
            .returning(|_| Ok(()));

        let mut messages = MockMessageStore::new();
        messages.expect_create().returning(|_| Ok(()));

        let service = ConversationService::new(Arc::new(conversations), Arc::new(messages));
        service
            .send_direct_message(outgoing("alice", "bob"))
            .await
            .expect("first message must always be allowed");
    }

    #[tokio::test]
    async fn send_into_pending_conversation_is_denied_for_both_sides() {
        for sender in ["alice", "bob"] {
            let mut conversations = MockConversationStore::new();
            conversations
                .expect_get()
                .returning(|_| Ok(Some(pending_conversation("alice", "bob"))));
            let messages = MockMessageStore::new();

            let service = ConversationService::new(Arc::new(conversations), Arc::new(messages));
            let receiver = if sender == "alice" { "bob" } else { "alice" };
            let err = service
                .send_direct_message(outgoing(sender, receiver))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::PermissionDenied(_)));
        }
    }

    #[tokio::test]
    async fn accept_by_outsider_is_forbidden() {
        let mut conversations = MockConversationStore::new();
        conversations
            .expect_get()
            .returning(|_| Ok(Some(pending_conversation("alice", "bob"))));

        let service =
            ConversationService::new(Arc::new(conversations), Arc::new(MockMessageStore::new()));
        let id = ConversationId::for_pair("alice", "bob");
        let err = service.accept_chat(&id, "mallory").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn decline_removes_the_conversation() {
        let id = ConversationId::for_pair("alice", "bob");
        let mut conversations = MockConversationStore::new();
        conversations
            .expect_get()
            .returning(|_| Ok(Some(pending_conversation("alice", "bob"))));
        conversations
            .expect_delete()
            .with(eq(id.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let service =
            ConversationService::new(Arc::new(conversations), Arc::new(MockMessageStore::new()));
        service.decline_chat(&id, "bob").await.unwrap();
    }

    #[test]
    fn preview_is_flattened_and_capped() {
        let text = preview_text("line one\nline two");
        assert_eq!(text, "line one line two");

        let long = "x".repeat(PREVIEW_MAX_CHARS + 20);
        let text = preview_text(&long);
        assert_eq!(text.chars().count(), PREVIEW_MAX_CHARS + 1);
        assert!(text.ends_with('…'));
    }
}
