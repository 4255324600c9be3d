use async_trait::async_trait;

use crate::{domain::AccountId, Result};

/// A discovered channel-to-account link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLink {
    pub title: String,
    pub main_username: String,
}

/// Persistence port for discovered links. Implementations deduplicate
/// against already-recorded links; recording the same channel twice is a
/// no-op.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn record(&self, account: &AccountId, links: &[ChannelLink], bearer: &str) -> Result<()>;
}
