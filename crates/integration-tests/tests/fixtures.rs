//! Shared fixtures for the service-level test suites. Each suite pulls
//! this file in with a `#[path]` module declaration, so everything here
//! must stay free of test-specific state.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use domains::models::{Post, UserSnapshot};
use services::{CommentService, ConversationService, NewComment, OutgoingMessage};
use storage_adapters::MemoryStore;

/// A comment service plus the shared store behind it, so tests can peek
/// at raw records and seed posts.
pub fn comment_service() -> (Arc<MemoryStore>, CommentService) {
    let store = Arc::new(MemoryStore::new());
    let service = CommentService::new(store.clone(), store.clone());
    (store, service)
}

pub fn conversation_service() -> (Arc<MemoryStore>, ConversationService) {
    let store = Arc::new(MemoryStore::new());
    let service = ConversationService::new(store.clone(), store.clone());
    (store, service)
}

/// Seeds a post and returns its id.
pub fn seed_post(store: &MemoryStore) -> Uuid {
    let post = Post {
        id: Uuid::now_v7(),
        title: "a post".into(),
        author_id: "op".into(),
        comment_count: 0,
        created_at: Utc::now(),
    };
    let id = post.id;
    store.add_post(post);
    id
}

pub fn new_comment(post_id: Uuid, author: &str, parent_id: Option<Uuid>) -> NewComment {
    NewComment {
        post_id,
        author_id: author.to_string(),
        author_username: author.to_string(),
        content: format!("a comment by {author}"),
        parent_id,
    }
}

pub fn snapshot(user: &str) -> UserSnapshot {
    UserSnapshot {
        user_id: user.to_string(),
        username: user.to_string(),
        display_name: user.to_string(),
        avatar_url: None,
    }
}

pub fn direct_message(from: &str, to: &str, body: &str, reply_to: Option<Uuid>) -> OutgoingMessage {
    OutgoingMessage {
        from: snapshot(from),
        to: snapshot(to),
        subject: "subject".to_string(),
        body: body.to_string(),
        reply_to,
    }
}
