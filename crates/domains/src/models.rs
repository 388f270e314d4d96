//! # Domain Models
//!
//! These structs represent the core entities of the comment and
//! conversation engines. We use UUID v7 for time-ordered, globally unique
//! identification of records; user ids come from an external identity
//! provider and are carried as opaque strings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum nesting depth for comment replies. A reply whose computed depth
/// would exceed this is rejected.
pub const MAX_COMMENT_DEPTH: u32 = 10;

/// Hop cap for the breadcrumb walk up `reply_to` links, so a corrupted or
/// cyclic parent chain can never loop forever.
pub const BREADCRUMB_MAX_HOPS: usize = 64;

/// Maximum characters kept in a conversation's last-message preview.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Sentinel shown in place of a soft-deleted comment's content.
pub const DELETED_CONTENT: &str = "[deleted]";

/// Sentinel shown in place of a soft-deleted comment's author name.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// Direction of a single user's vote on a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Up,
    Down,
}

/// Ordering applied to every level of a comment forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent first
    Newest,
    /// Oldest first
    Oldest,
    /// Highest (upvotes - downvotes) first
    Top,
}

/// The post a comment forest hangs off. Only the fields the comment engine
/// touches are modeled here; everything else about posts lives outside
/// this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub author_id: String,
    /// Denormalized count of all comments on the post, maintained by the
    /// comment engine on create and soft-delete.
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A single comment in a post's reply forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: String,
    pub author_username: String,
    /// Absent for root comments; otherwise the direct parent's id.
    pub parent_id: Option<Uuid>,
    /// 0 for roots, parent.depth + 1 for replies. Never exceeds
    /// [`MAX_COMMENT_DEPTH`].
    pub depth: u32,
    pub content: String,
    /// One entry per user. `upvotes`/`downvotes` are always recomputed
    /// from this map, never adjusted independently.
    pub votes: BTreeMap<String, VoteKind>,
    pub upvotes: u32,
    pub downvotes: u32,
    /// Count of direct children only.
    pub reply_count: u32,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Net score used by [`SortOrder::Top`].
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Recomputes the denormalized vote counters from the votes map.
    pub fn recount_votes(&mut self) {
        self.upvotes = self
            .votes
            .values()
            .filter(|v| **v == VoteKind::Up)
            .count() as u32;
        self.downvotes = self
            .votes
            .values()
            .filter(|v| **v == VoteKind::Down)
            .count() as u32;
    }
}

/// Kind discriminator for inbox messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A user-to-user direct message
    #[serde(rename = "message")]
    Direct,
    System,
    Notification,
}

/// Display snapshot of a user taken at send time, so messages stay
/// renderable even if the profile changes or disappears later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A single inbox message. Messages form reply threads through
/// `reply_to`; every message carries the id of its thread root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: UserSnapshot,
    pub to: UserSnapshot,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
    /// Absent on a thread root; otherwise the message being replied to.
    pub reply_to: Option<Uuid>,
    /// Id of the thread root. Equals `id` for a root message.
    pub thread_id: Uuid,
    pub is_read: bool,
    pub is_starred: bool,
    /// Participants who have trashed their copy. The record is removed for
    /// good only once both sides are present here.
    pub deleted_by: BTreeSet<String>,
    /// True once at least one participant has trashed their copy.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// True if `user_id` is the sender or the receiver.
    pub fn involves(&self, user_id: &str) -> bool {
        self.from.user_id == user_id || self.to.user_id == user_id
    }

    /// The participant on the other end from `user_id`.
    pub fn counterpart(&self, user_id: &str) -> &UserSnapshot {
        if self.from.user_id == user_id {
            &self.to
        } else {
            &self.from
        }
    }
}

/// Deterministic identifier for the two-party conversation between a pair
/// of users: the lexicographically sorted pair joined with `__`. Both
/// sides derive the same id without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Derives the id for a pair of users; symmetric in its arguments.
    pub fn for_pair(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}__{hi}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Preview of the latest message, denormalized onto the conversation for
/// inbox listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Acceptance state of a conversation as seen by one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptanceState {
    /// Neither side has accepted
    Unaccepted,
    /// The viewer has accepted; the other side has not
    PendingOther,
    /// The other side has accepted; the viewer has not
    PendingSelf,
    /// Both sides have accepted
    Accepted,
}

/// A two-party conversation gated by mutual acceptance. Created lazily on
/// the first message between a pair of users and removed entirely when
/// either side declines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Exactly two distinct user ids.
    pub participants: [String; 2],
    /// user id -> display name, snapshotted per participant.
    pub participant_names: BTreeMap<String, String>,
    pub last_message: Option<MessagePreview>,
    /// user id -> count of messages that participant has not read yet.
    pub unread: BTreeMap<String, u32>,
    /// Participants who have accepted the conversation. Creating a
    /// conversation seeds this with the initiator.
    pub accepted_by: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant on the other end from `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| *p != user_id)
            .map(String::as_str)
    }

    /// Both sides have accepted; free exchange is allowed.
    pub fn is_fully_accepted(&self) -> bool {
        self.participants
            .iter()
            .all(|p| self.accepted_by.contains(p))
    }

    /// Acceptance state from `viewer`'s perspective.
    pub fn acceptance_state(&self, viewer: &str) -> AcceptanceState {
        let self_in = self.accepted_by.contains(viewer);
        let other_in = self
            .other_participant(viewer)
            .map(|o| self.accepted_by.contains(o))
            .unwrap_or(false);
        match (self_in, other_in) {
            (true, true) => AcceptanceState::Accepted,
            (true, false) => AcceptanceState::PendingOther,
            (false, true) => AcceptanceState::PendingSelf,
            (false, false) => AcceptanceState::Unaccepted,
        }
    }
}
