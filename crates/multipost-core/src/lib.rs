//! Core domain + orchestration engine for the multipost Telegram gateway.
//!
//! This crate is intentionally framework-agnostic. The messaging platform,
//! the moderation/linking backend and the HTTP surface live behind ports
//! (traits) implemented in adapter crates.

pub mod blobs;
pub mod channels;
pub mod config;
pub mod domain;
pub mod drafts;
pub mod errors;
pub mod links;
pub mod login;
pub mod moderation;
pub mod post;
pub mod publish;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
