//! Per-node content tables for ccdn.
//!
//! Both tables are bounded and ordered by recency: the most recently touched
//! entry sits at the head and overflow evicts the tail. Each sits on an
//! [`lru::LruCache`] keyed by content id.

pub mod cache;
pub mod fib;

pub use cache::{CachedContent, ContentCache};
pub use fib::{ContentFib, ContentFibEntry};
