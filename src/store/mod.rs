//! Key-value persistence.

pub mod kv;

pub use kv::{KvPage, KvStore};
