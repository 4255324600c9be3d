//! Script-driven fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{AccountId, ChannelId, DataCenterId, MessageId, PostTarget},
    moderation::{ModerationService, ModerationVerdict},
    transport::{
        ChallengeToken, ChannelProfile, ChannelRights, DialogInfo, Identity, SendOptions,
        SendReceipt, Transport, TransportConnector, TransportError, TransportResult,
    },
    Result,
};

#[derive(Clone, Debug)]
pub(crate) struct SentText {
    pub channel: ChannelId,
    pub text: String,
    pub silent: bool,
    pub schedule: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub(crate) struct SentMedia {
    pub channel: ChannelId,
    pub images: Vec<PathBuf>,
    pub caption: Option<String>,
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    // Behavior knobs
    pub unauthorized: AtomicBool,
    pub send_code_script: Mutex<VecDeque<TransportResult<ChallengeToken>>>,
    pub sign_in_script: Mutex<VecDeque<TransportResult<Identity>>>,
    pub dialog_list: Mutex<Vec<DialogInfo>>,
    pub rights: Mutex<HashMap<i64, TransportResult<ChannelRights>>>,
    pub profiles: Mutex<HashMap<i64, ChannelProfile>>,
    pub unresolvable: Mutex<HashSet<String>>,
    pub send_failures: Mutex<HashMap<i64, TransportError>>,
    pub echoed_text: Mutex<Option<String>>,

    // Recordings
    pub texts: Mutex<Vec<SentText>>,
    pub media: Mutex<Vec<SentMedia>>,
    pub deleted: Mutex<Vec<(ChannelId, MessageId)>>,
    pub sign_in_calls: Mutex<Vec<(String, String, Option<String>)>>,

    ops: AtomicUsize,
    next_message_id: AtomicI32,
    next_username_id: AtomicI32,
    username_ids: Mutex<HashMap<String, i64>>,
    disconnected: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn sent_texts(&self) -> Vec<SentText> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_media(&self) -> Vec<SentMedia> {
        self.media.lock().unwrap().clone()
    }

    pub fn add_dialog(&self, id: i64, title: &str, is_channel: bool) {
        self.dialog_list.lock().unwrap().push(DialogInfo {
            id,
            title: title.to_string(),
            is_channel,
        });
    }

    pub fn set_rights(&self, id: i64, rights: ChannelRights) {
        self.rights.lock().unwrap().insert(id, Ok(rights));
    }

    fn bump(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
    }

    fn alloc_message(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_code(&self, _phone: &str) -> TransportResult<ChallengeToken> {
        self.bump();
        self.send_code_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChallengeToken("challenge-1".to_string())))
    }

    async fn sign_in(
        &self,
        phone: &str,
        _challenge: &ChallengeToken,
        code: &str,
        password: Option<&str>,
    ) -> TransportResult<Identity> {
        self.bump();
        self.sign_in_calls.lock().unwrap().push((
            phone.to_string(),
            code.to_string(),
            password.map(str::to_string),
        ));
        self.sign_in_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(Identity {
                    username: Some("tester".to_string()),
                })
            })
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        self.bump();
        Ok(!self.unauthorized.load(Ordering::SeqCst))
    }

    async fn dialogs(&self) -> TransportResult<Vec<DialogInfo>> {
        self.bump();
        Ok(self.dialog_list.lock().unwrap().clone())
    }

    async fn channel_rights(&self, channel: ChannelId) -> TransportResult<ChannelRights> {
        self.bump();
        self.rights
            .lock()
            .unwrap()
            .get(&channel.0)
            .cloned()
            .unwrap_or(Ok(ChannelRights::default()))
    }

    async fn channel_profile(&self, channel: ChannelId) -> TransportResult<ChannelProfile> {
        self.bump();
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(&channel.0)
            .cloned()
            .unwrap_or_else(|| ChannelProfile {
                title: format!("channel {}", channel.0),
                usernames: Vec::new(),
            }))
    }

    async fn resolve_target(&self, target: &PostTarget) -> TransportResult<ChannelId> {
        self.bump();
        let raw = target.to_string();
        if self.unresolvable.lock().unwrap().contains(&raw) {
            return Err(TransportError::UnknownTarget(raw));
        }
        match target {
            PostTarget::Channel(id) => Ok(*id),
            PostTarget::Username(name) => {
                let mut ids = self.username_ids.lock().unwrap();
                let id = *ids.entry(name.clone()).or_insert_with(|| {
                    1000 + i64::from(self.next_username_id.fetch_add(1, Ordering::SeqCst))
                });
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
        self.bump();
        if let Some(err) = self.send_failures.lock().unwrap().get(&channel.0) {
            return Err(err.clone());
        }
        self.texts.lock().unwrap().push(SentText {
            channel,
            text: text.to_string(),
            silent: opts.silent,
            schedule: opts.schedule,
        });
        let echoed = self
            .echoed_text
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| text.to_string());
        Ok(SendReceipt {
            message: self.alloc_message(),
            text: echoed,
        })
    }

    async fn send_media(
        &self,
        channel: ChannelId,
        images: &[PathBuf],
        caption: Option<&str>,
        _opts: &SendOptions,
    ) -> TransportResult<Vec<SendReceipt>> {
        self.bump();
        if let Some(err) = self.send_failures.lock().unwrap().get(&channel.0) {
            return Err(err.clone());
        }
        self.media.lock().unwrap().push(SentMedia {
            channel,
            images: images.to_vec(),
            caption: caption.map(str::to_string),
        });
        let first_text = self
            .echoed_text
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| caption.unwrap_or_default().to_string());
        let mut receipts = Vec::with_capacity(images.len());
        for (i, _) in images.iter().enumerate() {
            receipts.push(SendReceipt {
                message: self.alloc_message(),
                text: if i == 0 { first_text.clone() } else { String::new() },
            });
        }
        Ok(receipts)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()> {
        self.bump();
        self.deleted.lock().unwrap().push((channel, message));
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out [`FakeTransport`]s; records every connect and
/// keeps the created transports for inspection.
#[derive(Default)]
pub(crate) struct FakeConnector {
    pub connect_failures: Mutex<VecDeque<TransportError>>,
    pub connects: Mutex<Vec<Option<DataCenterId>>>,
    pub created: Mutex<Vec<Arc<FakeTransport>>>,
    pub prepared: Mutex<VecDeque<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare(&self, transport: Arc<FakeTransport>) {
        self.prepared.lock().unwrap().push_back(transport);
    }

    pub fn created(&self) -> Vec<Arc<FakeTransport>> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self, dc: Option<DataCenterId>) -> TransportResult<Arc<dyn Transport>> {
        self.connects.lock().unwrap().push(dc);
        if let Some(err) = self.connect_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let transport = self
            .prepared
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(FakeTransport::new()));
        self.created.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}

#[derive(Default)]
pub(crate) struct FakeModeration {
    pub verdict: Mutex<ModerationVerdict>,
    pub calls: AtomicUsize,
}

impl FakeModeration {
    pub fn allowing() -> Self {
        Self::default()
    }

    pub fn forbidding(words: &[&str]) -> Self {
        Self {
            verdict: Mutex::new(ModerationVerdict {
                banned: false,
                forbidden_words: words.iter().map(|w| w.to_string()).collect(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn banned() -> Self {
        Self {
            verdict: Mutex::new(ModerationVerdict {
                banned: true,
                forbidden_words: Vec::new(),
            }),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModerationService for FakeModeration {
    async fn check(
        &self,
        _account: &AccountId,
        _text: &str,
        _bearer: &str,
    ) -> Result<ModerationVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.lock().unwrap().clone())
    }
}

