//! crates/domains/src/lib.rs
//!
//! The central domain models, persistence ports, and error definitions for
//! the comment-tree and conversation engines.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
