//! # Message Threads
//!
//! Pure helpers that organize a flat message fetch into a reply tree, and
//! walk a leaf back up to its thread root for breadcrumb navigation. Same
//! wiring technique as the comment tree, except that reply chains carry
//! no depth cap, so assembly runs on an explicit stack.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use domains::models::{Message, BREADCRUMB_MAX_HOPS};

/// A message with its direct replies attached.
#[derive(Debug, Clone, Serialize)]
pub struct MessageNode {
    #[serde(flatten)]
    pub message: Message,
    pub children: Vec<MessageNode>,
}

/// Groups a flat message list into reply trees. Roots (no `reply_to`) and
/// each level of children come back in creation order. A reply whose
/// parent is absent from the input is promoted to a root.
pub fn build_message_tree(messages: Vec<Message>) -> Vec<MessageNode> {
    let ids: HashSet<Uuid> = messages.iter().map(|m| m.id).collect();

    let mut children: HashMap<Uuid, Vec<Message>> = HashMap::new();
    let mut roots: Vec<Message> = Vec::new();
    for message in messages {
        match message.reply_to {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(message);
            }
            Some(parent) => {
                warn!(
                    message_id = %message.id,
                    reply_to = %parent,
                    "reply parent missing from fetched set; promoting to root"
                );
                roots.push(message);
            }
            None => roots.push(message),
        }
    }

    roots.sort_by_key(|m| m.created_at);
    attach_children(roots, &mut children)
}

/// Depth-first assembly of the forest. Message threads have no depth
/// cap, so the walk keeps its own stack instead of recursing.
fn attach_children(
    roots: Vec<Message>,
    children: &mut HashMap<Uuid, Vec<Message>>,
) -> Vec<MessageNode> {
    struct Frame {
        node: MessageNode,
        pending: std::vec::IntoIter<Message>,
    }

    fn open(message: Message, children: &mut HashMap<Uuid, Vec<Message>>) -> Frame {
        let mut direct = children.remove(&message.id).unwrap_or_default();
        direct.sort_by_key(|m| m.created_at);
        Frame {
            node: MessageNode {
                message,
                children: Vec::new(),
            },
            pending: direct.into_iter(),
        }
    }

    let mut forest = Vec::new();
    for root in roots {
        let mut stack = vec![open(root, children)];
        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.next() {
                let next = open(child, children);
                stack.push(next);
            } else if let Some(done) = stack.pop() {
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(done.node),
                    None => forest.push(done.node),
                }
            }
        }
    }
    forest
}

/// Root-to-leaf path for `leaf_id`, following `reply_to` upward.
///
/// The walk carries a visited set and a hop cap so a cyclic or corrupted
/// parent chain terminates; on corruption the partial path collected so
/// far is returned.
pub fn breadcrumb(messages: &[Message], leaf_id: Uuid) -> Vec<Message> {
    let by_id: HashMap<Uuid, &Message> = messages.iter().map(|m| (m.id, m)).collect();

    let mut path: Vec<Message> = Vec::new();
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut cursor = leaf_id;
    loop {
        if path.len() >= BREADCRUMB_MAX_HOPS {
            warn!(leaf_id = %leaf_id, "breadcrumb hop cap reached; returning partial path");
            break;
        }
        if !visited.insert(cursor) {
            warn!(leaf_id = %leaf_id, at = %cursor, "cycle in reply chain; returning partial path");
            break;
        }
        let Some(message) = by_id.get(&cursor) else {
            // Parent pointing outside the fetched set; the chain ends here.
            break;
        };
        path.push((*message).clone());
        match message.reply_to {
            Some(parent) => cursor = parent,
            None => break,
        }
    }

    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domains::models::{MessageKind, UserSnapshot};
    use std::collections::BTreeSet;

    fn snapshot(user: &str) -> UserSnapshot {
        UserSnapshot {
            user_id: user.into(),
            username: user.into(),
            display_name: user.into(),
            avatar_url: None,
        }
    }

    fn message(id: Uuid, reply_to: Option<Uuid>, thread_id: Uuid, age_secs: i64) -> Message {
        Message {
            id,
            from: snapshot("alice"),
            to: snapshot("bob"),
            subject: "subject".into(),
            body: "body".into(),
            kind: MessageKind::Direct,
            reply_to,
            thread_id,
            is_read: false,
            is_starred: false,
            deleted_by: BTreeSet::new(),
            is_deleted: false,
            created_at: Utc::now() - Duration::seconds(age_secs),
            updated_at: None,
        }
    }

    #[test]
    fn groups_replies_under_their_parent() {
        let root = Uuid::now_v7();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let nested = Uuid::now_v7();

        let tree = build_message_tree(vec![
            message(root, None, root, 40),
            message(first, Some(root), root, 30),
            message(second, Some(root), root, 20),
            message(nested, Some(first), root, 10),
        ]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].message.id, root);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].message.id, first);
        assert_eq!(tree[0].children[0].children[0].message.id, nested);
    }

    #[test]
    fn deep_reply_chain_builds_without_overflow() {
        const CHAIN_LEN: usize = 10_000;

        let root = Uuid::now_v7();
        let mut messages = vec![message(root, None, root, (CHAIN_LEN + 1) as i64)];
        let mut parent = root;
        for i in 0..CHAIN_LEN {
            let id = Uuid::now_v7();
            messages.push(message(id, Some(parent), root, (CHAIN_LEN - i) as i64));
            parent = id;
        }

        let tree = build_message_tree(messages);
        assert_eq!(tree.len(), 1);

        let mut depth = 0usize;
        let mut cursor = &tree[0];
        while let Some(child) = cursor.children.first() {
            depth += 1;
            cursor = child;
        }
        assert_eq!(depth, CHAIN_LEN);

        // Dropping the nested tree would recurse as deep as the chain,
        // so flatten it level by level first.
        let mut worklist: Vec<MessageNode> = tree;
        while let Some(mut node) = worklist.pop() {
            worklist.append(&mut node.children);
        }
    }

    #[test]
    fn breadcrumb_runs_root_to_leaf() {
        let root = Uuid::now_v7();
        let mid = Uuid::now_v7();
        let leaf = Uuid::now_v7();
        let messages = vec![
            message(root, None, root, 30),
            message(mid, Some(root), root, 20),
            message(leaf, Some(mid), root, 10),
        ];

        let path = breadcrumb(&messages, leaf);
        let ids: Vec<Uuid> = path.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![root, mid, leaf]);
    }

    #[test]
    fn breadcrumb_terminates_on_cycle() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        // a and b reply to each other; bad data, but the walk must stop.
        let messages = vec![
            message(a, Some(b), a, 20),
            message(b, Some(a), a, 10),
        ];

        let path = breadcrumb(&messages, a);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn breadcrumb_of_unknown_leaf_is_empty() {
        let root = Uuid::now_v7();
        let messages = vec![message(root, None, root, 10)];
        assert!(breadcrumb(&messages, Uuid::now_v7()).is_empty());
    }
}
