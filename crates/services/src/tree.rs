//! # Comment Tree Builder
//!
//! Pure forest construction over a flat comment fetch. The store hands
//! back every comment for a post in creation order; wiring is a single
//! pass over that list, grouping children under their parent id, followed
//! by a recursive per-level sort.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use domains::models::{Comment, SortOrder};

/// A comment with its direct replies attached.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Total nodes in this subtree, the node itself included.
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::size).sum::<usize>()
    }
}

/// Builds the sorted reply forest for a post from its flat comment list.
///
/// A comment whose `parent_id` is not present in `comments` is promoted to
/// the root level rather than dropped, so user content stays visible even
/// when a parent record is missing or the fetch was partial.
pub fn build_comment_tree(comments: Vec<Comment>, sort: SortOrder) -> Vec<CommentNode> {
    let ids: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();

    let mut children: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    let mut roots: Vec<Comment> = Vec::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(comment);
            }
            Some(parent) => {
                warn!(
                    comment_id = %comment.id,
                    parent_id = %parent,
                    "comment parent missing from fetched set; promoting to root"
                );
                roots.push(comment);
            }
            None => roots.push(comment),
        }
    }

    let mut forest: Vec<CommentNode> = roots
        .into_iter()
        .map(|root| attach_children(root, &mut children, sort))
        .collect();
    sort_siblings(&mut forest, sort);
    forest
}

fn attach_children(
    comment: Comment,
    children: &mut HashMap<Uuid, Vec<Comment>>,
    sort: SortOrder,
) -> CommentNode {
    let mut replies: Vec<CommentNode> = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_children(child, children, sort))
        .collect();
    sort_siblings(&mut replies, sort);
    CommentNode { comment, replies }
}

/// Orders one level of siblings. Sorting is stable, so ties keep the
/// creation order of the underlying fetch.
fn sort_siblings(nodes: &mut [CommentNode], sort: SortOrder) {
    match sort {
        SortOrder::Newest => {
            nodes.sort_by(|a, b| b.comment.created_at.cmp(&a.comment.created_at))
        }
        SortOrder::Oldest => {
            nodes.sort_by(|a, b| a.comment.created_at.cmp(&b.comment.created_at))
        }
        SortOrder::Top => nodes.sort_by(|a, b| b.comment.score().cmp(&a.comment.score())),
    }
}
