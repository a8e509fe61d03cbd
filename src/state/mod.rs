//! State management module
//!
//! This module handles all application state, including:
//! - The collection store and its subscriptions (library.rs)
//! - Shared data structures (data.rs)
//! - The map screen: entry index, selection, search, viewport and
//!   carousel, tied together by sync.rs
//! - Votes, photo uploads, forms and discussions

pub mod blob;
pub mod carousel;
pub mod data;
pub mod discussion;
pub mod forms;
pub mod index;
pub mod library;
pub mod search;
pub mod selection;
pub mod sync;
pub mod viewport;
pub mod votes;
