//! # Comment Service
//!
//! Orchestrates comment creation, voting, editing, and soft deletion
//! against the persistence ports, and exposes the sorted reply forest.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use domains::error::{AppError, Result};
use domains::models::{
    Comment, SortOrder, VoteKind, DELETED_AUTHOR, DELETED_CONTENT, MAX_COMMENT_DEPTH,
};
use domains::traits::{CommentStore, PostStore};

use crate::tree::{build_comment_tree, CommentNode};

/// Input for a new root comment or reply.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    /// `None` for a root comment.
    pub parent_id: Option<Uuid>,
}

/// Vote state returned after a toggle.
#[derive(Debug, Clone, Serialize)]
pub struct VoteTally {
    pub votes: BTreeMap<String, VoteKind>,
    pub upvotes: u32,
    pub downvotes: u32,
}

pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    posts: Arc<dyn PostStore>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentStore>, posts: Arc<dyn PostStore>) -> Self {
        Self { comments, posts }
    }

    /// Creates a comment, enforcing the depth invariant, and bumps the
    /// denormalized counters on the post and (for replies) the parent.
    ///
    /// The counter bumps are separate writes with no cross-document
    /// transaction; each one is an atomic single-field increment.
    pub async fn create_comment(&self, new: NewComment) -> Result<Uuid> {
        self.posts
            .get(new.post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", new.post_id))?;

        let depth = match new.parent_id {
            Some(parent_id) => {
                let parent = self
                    .comments
                    .get(parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Comment", parent_id))?;
                if parent.post_id != new.post_id {
                    return Err(AppError::InvalidState(
                        "parent comment belongs to a different post".into(),
                    ));
                }
                let depth = parent.depth + 1;
                if depth > MAX_COMMENT_DEPTH {
                    return Err(AppError::DepthLimitExceeded {
                        depth,
                        max: MAX_COMMENT_DEPTH,
                    });
                }
                depth
            }
            None => 0,
        };

        let comment = Comment {
            id: Uuid::now_v7(),
            post_id: new.post_id,
            author_id: new.author_id,
            author_username: new.author_username,
            parent_id: new.parent_id,
            depth,
            content: new.content,
            votes: BTreeMap::new(),
            upvotes: 0,
            downvotes: 0,
            reply_count: 0,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let id = comment.id;
        self.comments.create(comment).await?;

        self.posts.increment_comment_count(new.post_id, 1).await?;
        if let Some(parent_id) = new.parent_id {
            self.comments.increment_reply_count(parent_id, 1).await?;
        }
        Ok(id)
    }

    pub async fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.comments
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment", id))
    }

    /// Every comment on a post, flat, creation order.
    pub async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        Ok(self.comments.list_for_post(post_id).await?)
    }

    /// Direct children of one parent (roots when `None`), flat.
    pub async fn replies_of(
        &self,
        post_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<Comment>> {
        Ok(self.comments.list_children(post_id, parent_id).await?)
    }

    /// The sorted reply forest for a post.
    pub async fn comment_tree(&self, post_id: Uuid, sort: SortOrder) -> Result<Vec<CommentNode>> {
        let comments = self.comments.list_for_post(post_id).await?;
        Ok(build_comment_tree(comments, sort))
    }

    /// Toggles `user_id`'s vote on a comment.
    ///
    /// Voting the same direction twice removes the vote; voting the other
    /// direction replaces it. The counters are recomputed from the map on
    /// every change and persisted together with it.
    pub async fn vote(&self, comment_id: Uuid, user_id: &str, kind: VoteKind) -> Result<VoteTally> {
        let mut comment = self.get_comment(comment_id).await?;
        if comment.is_deleted {
            return Err(AppError::InvalidState(
                "cannot vote on a deleted comment".into(),
            ));
        }

        match comment.votes.get(user_id) {
            Some(existing) if *existing == kind => {
                comment.votes.remove(user_id);
            }
            _ => {
                comment.votes.insert(user_id.to_string(), kind);
            }
        }
        comment.recount_votes();
        self.comments.update(&comment).await?;

        Ok(VoteTally {
            votes: comment.votes,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        })
    }

    /// Author-only content edit.
    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        user_id: &str,
        content: String,
    ) -> Result<Comment> {
        let mut comment = self.get_comment(comment_id).await?;
        if comment.author_id != user_id {
            return Err(AppError::Forbidden(
                "only the author may edit a comment".into(),
            ));
        }
        if comment.is_deleted {
            return Err(AppError::InvalidState(
                "cannot edit a deleted comment".into(),
            ));
        }
        comment.content = content;
        comment.updated_at = Some(Utc::now());
        self.comments.update(&comment).await?;
        Ok(comment)
    }

    /// Author-only soft delete. Content and author name are replaced with
    /// sentinels; the votes map and its counters stay untouched so the
    /// tree keeps its shape. Children are not cascaded.
    pub async fn delete_comment(&self, comment_id: Uuid, user_id: &str) -> Result<()> {
        let mut comment = self.get_comment(comment_id).await?;
        if comment.author_id != user_id {
            return Err(AppError::Forbidden(
                "only the author may delete a comment".into(),
            ));
        }
        if comment.is_deleted {
            return Err(AppError::InvalidState("comment is already deleted".into()));
        }

        comment.is_deleted = true;
        comment.deleted_at = Some(Utc::now());
        comment.content = DELETED_CONTENT.to_string();
        comment.author_username = DELETED_AUTHOR.to_string();
        self.comments.update(&comment).await?;

        self.posts
            .increment_comment_count(comment.post_id, -1)
            .await?;
        if let Some(parent_id) = comment.parent_id {
            self.comments.increment_reply_count(parent_id, -1).await?;
        }
        Ok(())
    }
}
