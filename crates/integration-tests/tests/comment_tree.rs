//! Forest construction over comments created through the service:
//! completeness, per-level sorting, and the documented two-root scenario.

#[path = "fixtures.rs"]
mod fixtures;

use std::time::Duration;

use domains::models::{SortOrder, VoteKind};
use fixtures::{comment_service, new_comment, seed_post};
use services::CommentNode;

/// Creation timestamps drive the Newest/Oldest orders, so keep successive
/// creates strictly apart.
async fn spaced() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

fn forest_size(forest: &[CommentNode]) -> usize {
    forest.iter().map(CommentNode::size).sum()
}

#[tokio::test]
async fn tree_contains_every_comment_exactly_once() {
    let (store, service) = comment_service();
    let post_id = seed_post(&store);

    let mut roots = Vec::new();
    for author in ["alice", "bob", "carol"] {
        roots.push(
            service
                .create_comment(new_comment(post_id, author, None))
                .await
                .unwrap(),
        );
        spaced().await;
    }
    for root in &roots {
        service
            .create_comment(new_comment(post_id, "dave", Some(*root)))
            .await
            .unwrap();
        spaced().await;
    }

    let forest = service.comment_tree(post_id, SortOrder::Oldest).await.unwrap();
    assert_eq!(forest.len(), 3);
    assert_eq!(forest_size(&forest), 6);
    for node in &forest {
        assert_eq!(node.replies.len(), 1);
    }
}

#[tokio::test]
async fn newest_and_oldest_order_roots_by_creation() {
    let (store, service) = comment_service();
    let post_id = seed_post(&store);

    let first = service
        .create_comment(new_comment(post_id, "alice", None))
        .await
        .unwrap();
    spaced().await;
    let second = service
        .create_comment(new_comment(post_id, "bob", None))
        .await
        .unwrap();

    let oldest = service.comment_tree(post_id, SortOrder::Oldest).await.unwrap();
    assert_eq!(oldest[0].comment.id, first);
    assert_eq!(oldest[1].comment.id, second);

    let newest = service.comment_tree(post_id, SortOrder::Newest).await.unwrap();
    assert_eq!(newest[0].comment.id, second);
    assert_eq!(newest[1].comment.id, first);
}

#[tokio::test]
async fn two_roots_with_replies_sorted_by_top() {
    let (store, service) = comment_service();
    let post_id = seed_post(&store);

    // root1 scores 5, root2 scores 2; each carries one depth-1 reply.
    let root1 = service
        .create_comment(new_comment(post_id, "alice", None))
        .await
        .unwrap();
    spaced().await;
    let root2 = service
        .create_comment(new_comment(post_id, "bob", None))
        .await
        .unwrap();
    for voter in ["v1", "v2", "v3", "v4", "v5"] {
        service.vote(root1, voter, VoteKind::Up).await.unwrap();
    }
    for voter in ["v1", "v2"] {
        service.vote(root2, voter, VoteKind::Up).await.unwrap();
    }
    service
        .create_comment(new_comment(post_id, "carol", Some(root1)))
        .await
        .unwrap();
    service
        .create_comment(new_comment(post_id, "dave", Some(root2)))
        .await
        .unwrap();

    let forest = service.comment_tree(post_id, SortOrder::Top).await.unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].comment.id, root1);
    assert_eq!(forest[1].comment.id, root2);
    for node in &forest {
        assert_eq!(node.replies.len(), 1);
        assert_eq!(node.replies[0].comment.depth, 1);
        assert!(node.replies[0].replies.is_empty());
    }
}

#[tokio::test]
async fn empty_post_yields_empty_forest() {
    let (store, service) = comment_service();
    let post_id = seed_post(&store);
    let forest = service.comment_tree(post_id, SortOrder::Top).await.unwrap();
    assert!(forest.is_empty());
}

#[tokio::test]
async fn deleted_comments_stay_in_the_tree() {
    let (store, service) = comment_service();
    let post_id = seed_post(&store);

    let root = service
        .create_comment(new_comment(post_id, "alice", None))
        .await
        .unwrap();
    service
        .create_comment(new_comment(post_id, "bob", Some(root)))
        .await
        .unwrap();
    service.delete_comment(root, "alice").await.unwrap();

    // Soft deletion never cascades; the child stays attached under the
    // scrubbed parent.
    let forest = service.comment_tree(post_id, SortOrder::Oldest).await.unwrap();
    assert_eq!(forest.len(), 1);
    assert!(forest[0].comment.is_deleted);
    assert_eq!(forest[0].replies.len(), 1);
    assert!(!forest[0].replies[0].comment.is_deleted);
}
