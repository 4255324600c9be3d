use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChannelId, DataCenterId, MessageId, PostTarget};

/// Opaque token correlating a code request with its verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeToken(pub String);

/// The account's display identity after a successful sign-in.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    pub username: Option<String>,
}

/// One entry of the account's dialog list.
#[derive(Clone, Debug)]
pub struct DialogInfo {
    pub id: i64,
    pub title: String,
    pub is_channel: bool,
}

/// Posting rights of the account in a channel, populated uniformly for
/// every channel kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelRights {
    pub creator: bool,
    pub post_messages: bool,
}

/// Channel metadata used to derive the canonical posting identifier.
#[derive(Clone, Debug)]
pub struct ChannelProfile {
    pub title: String,
    pub usernames: Vec<String>,
}

/// Receipt for a sent message; `text` is the platform's echoed content,
/// used for caption verification.
#[derive(Clone, Debug)]
pub struct SendReceipt {
    pub message: MessageId,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SendOptions {
    pub silent: bool,
    pub schedule: Option<DateTime<Utc>>,
}

impl SendOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            schedule: None,
        }
    }
}

/// Typed failures at the transport boundary. The login state machine and
/// the prober branch on these kinds; everything else collapses into
/// `Error::Transport` at the handler level.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("account lives on another data center ({0:?})")]
    Migrate(DataCenterId),

    #[error("a two-factor password is required")]
    PasswordRequired,

    #[error("invalid code or password")]
    InvalidCredentials,

    #[error("the authorization was revoked")]
    NotAuthorized,

    #[error("the channel is private")]
    PrivateChannel,

    #[error("the account is not a participant of the channel")]
    NotParticipant,

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Narrow port over the messaging platform client. Protocol internals are
/// an adapter concern; the orchestration engine only sees this surface.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Request a login code for `phone`; returns the challenge token that
    /// must accompany the subsequent `sign_in`.
    async fn send_code(&self, phone: &str) -> TransportResult<ChallengeToken>;

    /// Complete the login challenge. When the account is protected by a
    /// second factor and `password` is `None`, fails with
    /// `PasswordRequired`; a retry with the password must not require a
    /// fresh code.
    async fn sign_in(
        &self,
        phone: &str,
        challenge: &ChallengeToken,
        code: &str,
        password: Option<&str>,
    ) -> TransportResult<Identity>;

    async fn is_authorized(&self) -> TransportResult<bool>;

    async fn dialogs(&self) -> TransportResult<Vec<DialogInfo>>;

    async fn channel_rights(&self, channel: ChannelId) -> TransportResult<ChannelRights>;

    async fn channel_profile(&self, channel: ChannelId) -> TransportResult<ChannelProfile>;

    /// Resolve a dispatch target to a channel id.
    async fn resolve_target(&self, target: &PostTarget) -> TransportResult<ChannelId>;

    async fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
        opts: &SendOptions,
    ) -> TransportResult<SendReceipt>;

    /// Send one or more images as a single post; the caption is attached
    /// to the first media item. Returns one receipt per item.
    async fn send_media(
        &self,
        channel: ChannelId,
        images: &[PathBuf],
        caption: Option<&str>,
        opts: &SendOptions,
    ) -> TransportResult<Vec<SendReceipt>>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()>;

    /// Release the underlying connection. Idempotent.
    async fn disconnect(&self);
}

/// Factory for transport connections. `dc` binds the connection to a
/// specific data center after a migration redirect.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        dc: Option<DataCenterId>,
    ) -> TransportResult<std::sync::Arc<dyn Transport>>;
}
