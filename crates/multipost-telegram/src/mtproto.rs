//! Transport port implementation over `grammers-client`.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use grammers_client::{
    session::Session, types::Chat, Client, Config as ClientConfig, InitParams, InputMessage,
    SignInError,
};
use tokio::sync::Mutex;
use tracing::debug;

use multipost_core::{
    domain::{ChannelId, DataCenterId, MessageId, PostTarget},
    transport::{
        ChallengeToken, ChannelProfile, ChannelRights, DialogInfo, Identity, SendOptions,
        SendReceipt, Transport, TransportConnector, TransportError, TransportResult,
    },
};

pub struct MtprotoConnector {
    api_id: i32,
    api_hash: String,
}

impl MtprotoConnector {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
        }
    }
}

#[async_trait]
impl TransportConnector for MtprotoConnector {
    async fn connect(&self, _dc: Option<DataCenterId>) -> TransportResult<Arc<dyn Transport>> {
        // The client library follows data-center migration redirects on
        // its own, so the state machine's explicit rebinding path is
        // never exercised through this adapter.
        let client = Client::connect(ClientConfig {
            session: Session::new(),
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Arc::new(MtprotoTransport {
            client,
            pending_login: Mutex::new(None),
            chats: Mutex::new(HashMap::new()),
        }))
    }
}

pub struct MtprotoTransport {
    client: Client,
    pending_login: Mutex<Option<grammers_client::types::LoginToken>>,
    // Chats seen through dialogs/resolution; bare channel ids can only be
    // used once their access hash has been observed.
    chats: Mutex<HashMap<i64, Chat>>,
}

impl MtprotoTransport {
    async fn chat_for(&self, channel: ChannelId) -> TransportResult<Chat> {
        if let Some(chat) = self.chats.lock().await.get(&channel.0) {
            return Ok(chat.clone());
        }
        // Refresh the cache once from the dialog list.
        let _ = self.dialogs().await?;
        self.chats
            .lock()
            .await
            .get(&channel.0)
            .cloned()
            .ok_or_else(|| TransportError::UnknownTarget(format!("channel_{}", channel.0)))
    }
}

#[async_trait]
impl Transport for MtprotoTransport {
    async fn send_code(&self, phone: &str) -> TransportResult<ChallengeToken> {
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| map_error(&e))?;
        *self.pending_login.lock().await = Some(token);
        Ok(ChallengeToken(format!("login:{phone}")))
    }

    async fn sign_in(
        &self,
        _phone: &str,
        _challenge: &ChallengeToken,
        code: &str,
        password: Option<&str>,
    ) -> TransportResult<Identity> {
        let attempt = {
            let guard = self.pending_login.lock().await;
            let Some(token) = guard.as_ref() else {
                return Err(TransportError::Other(
                    "no pending login challenge".to_string(),
                ));
            };
            self.client.sign_in(token, code).await
        };

        match attempt {
            Ok(user) => Ok(identity_of(&user)),
            Err(SignInError::PasswordRequired(password_token)) => match password {
                Some(password) => self
                    .client
                    .check_password(password_token, password)
                    .await
                    .map(|user| identity_of(&user))
                    .map_err(|_| TransportError::InvalidCredentials),
                None => Err(TransportError::PasswordRequired),
            },
            Err(SignInError::InvalidCode) => Err(TransportError::InvalidCredentials),
            Err(other) => Err(TransportError::Other(other.to_string())),
        }
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| map_error(&e))
    }

    async fn dialogs(&self) -> TransportResult<Vec<DialogInfo>> {
        let mut iter = self.client.iter_dialogs();
        let mut out = Vec::new();
        while let Some(dialog) = iter.next().await.map_err(|e| map_error(&e))? {
            let chat = dialog.chat();
            self.chats.lock().await.insert(chat.id(), chat.clone());
            out.push(DialogInfo {
                id: chat.id(),
                title: chat.name().to_string(),
                is_channel: matches!(chat, Chat::Channel(_)),
            });
        }
        Ok(out)
    }

    async fn channel_rights(&self, channel: ChannelId) -> TransportResult<ChannelRights> {
        // The high-level client does not expose admin-rights metadata, so
        // role checks are inconclusive here and the prober falls through
        // to its sentinel probe.
        debug!(channel = channel.0, "no role metadata from the client, deferring to the probe");
        Ok(ChannelRights::default())
    }

    async fn channel_profile(&self, channel: ChannelId) -> TransportResult<ChannelProfile> {
        let chat = self.chat_for(channel).await?;
        Ok(ChannelProfile {
            title: chat.name().to_string(),
            usernames: chat
                .username()
                .map(|u| vec![u.to_string()])
                .unwrap_or_default(),
        })
    }

    async fn resolve_target(&self, target: &PostTarget) -> TransportResult<ChannelId> {
        match target {
            PostTarget::Channel(id) => {
                self.chat_for(*id).await?;
                Ok(*id)
            }
            PostTarget::Username(name) => {
                let chat = self
                    .client
                    .resolve_username(name)
                    .await
                    .map_err(|e| map_error(&e))?
                    .ok_or_else(|| TransportError::UnknownTarget(name.clone()))?;
                let id = chat.id();
                self.chats.lock().await.insert(id, chat);
                Ok(ChannelId(id))
            }
        }
    }

    async fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
        opts: &SendOptions,
    ) -> TransportResult<SendReceipt> {
        if opts.schedule.is_some() {
            return Err(unsupported_schedule());
        }
        let chat = self.chat_for(channel).await?;
        let mut message = InputMessage::text(text);
        if opts.silent {
            message = message.silent(true);
        }
        let sent = self
            .client
            .send_message(&chat, message)
            .await
            .map_err(|e| map_error(&e))?;
        Ok(SendReceipt {
            message: MessageId(sent.id()),
            text: sent.text().to_string(),
        })
    }

    async fn send_media(
        &self,
        channel: ChannelId,
        images: &[PathBuf],
        caption: Option<&str>,
        opts: &SendOptions,
    ) -> TransportResult<Vec<SendReceipt>> {
        if opts.schedule.is_some() {
            return Err(unsupported_schedule());
        }
        let chat = self.chat_for(channel).await?;

        // The client library has no native grouped-media send; photos go
        // out sequentially with the caption on the first one.
        let mut receipts = Vec::with_capacity(images.len());
        for (index, path) in images.iter().enumerate() {
            let uploaded = self
                .client
                .upload_file(path)
                .await
                .map_err(|e| TransportError::Other(format!("upload failed: {e}")))?;
            let text = if index == 0 {
                caption.unwrap_or_default()
            } else {
                ""
            };
            let sent = self
                .client
                .send_message(&chat, InputMessage::text(text).photo(uploaded))
                .await
                .map_err(|e| map_error(&e))?;
            receipts.push(SendReceipt {
                message: MessageId(sent.id()),
                text: sent.text().to_string(),
            });
        }
        Ok(receipts)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()> {
        let chat = self.chat_for(channel).await?;
        self.client
            .delete_messages(&chat, &[message.0])
            .await
            .map_err(|e| map_error(&e))?;
        Ok(())
    }

    async fn disconnect(&self) {
        // The connection closes when the last clone of the client is
        // dropped; the session is memory-resident by design.
    }
}

fn identity_of(user: &grammers_client::types::User) -> Identity {
    Identity {
        username: user.username().map(str::to_string),
    }
}

fn unsupported_schedule() -> TransportError {
    TransportError::Other("platform-side scheduled sends are not supported".to_string())
}

/// Classify client errors by their RPC error name; everything
/// unrecognized stays an opaque transport failure.
fn map_error(e: &dyn std::fmt::Display) -> TransportError {
    let message = e.to_string();
    if message.contains("CHANNEL_PRIVATE") {
        TransportError::PrivateChannel
    } else if message.contains("USER_NOT_PARTICIPANT") {
        TransportError::NotParticipant
    } else if message.contains("AUTH_KEY_UNREGISTERED") || message.contains("SESSION_REVOKED") {
        TransportError::NotAuthorized
    } else {
        TransportError::Other(message)
    }
}
