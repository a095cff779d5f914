//! Integration tests for the row index
//!
//! Run with: cargo test --test index

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod dictionary;
mod lookup;
mod mutation;
mod reopen;
