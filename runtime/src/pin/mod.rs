//! Digest pinning: tree walk, annotated-scalar rewrite and resolution.

pub mod filter;
pub mod resolver;
pub mod rewriter;
pub mod walker;

pub use filter::{is_candidate, should_skip};
pub use resolver::{CachingResolver, DigestResolver};
pub use rewriter::ScalarRewriter;
pub use walker::{AnnotatedSite, TreeWalker, WalkError};
