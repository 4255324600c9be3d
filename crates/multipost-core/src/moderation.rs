use async_trait::async_trait;

use crate::{domain::AccountId, Result};

/// Outcome of a pre-send moderation check.
#[derive(Clone, Debug, Default)]
pub struct ModerationVerdict {
    pub banned: bool,
    pub forbidden_words: Vec<String>,
}

/// Reject-before-send moderation port. The check runs before any
/// transport call and gates the whole submission atomically.
#[async_trait]
pub trait ModerationService: Send + Sync {
    async fn check(&self, account: &AccountId, text: &str, bearer: &str)
        -> Result<ModerationVerdict>;
}
