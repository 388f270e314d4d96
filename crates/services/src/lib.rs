//! crates/services/src/lib.rs
//!
//! The two engines of the core: the comment reply-tree engine and the
//! conversation acceptance / message-thread engine. Both speak only to
//! the persistence ports defined in `domains`.

pub mod comments;
pub mod conversations;
pub mod threads;
pub mod tree;

pub use comments::{CommentService, NewComment, VoteTally};
pub use conversations::{ConversationService, OutgoingMessage};
pub use threads::{breadcrumb, build_message_tree, MessageNode};
pub use tree::{build_comment_tree, CommentNode};
