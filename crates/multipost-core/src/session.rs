//! Authentication sessions and their registry.
//!
//! One session per phone identifier; the session owns its transport
//! connection exclusively. The registry is the single shared map used by
//! both the request handlers and the draft scheduler.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::transport::{ChallengeToken, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    ChallengeSent,
    Authenticated,
    Closed,
}

/// A login session created by a successful code request.
pub struct AuthSession {
    phone: String,
    transport: Arc<dyn Transport>,
    challenge: ChallengeToken,
    state: Mutex<AuthState>,
}

impl AuthSession {
    pub fn new(phone: impl Into<String>, transport: Arc<dyn Transport>, challenge: ChallengeToken) -> Self {
        Self {
            phone: phone.into(),
            transport,
            challenge,
            state: Mutex::new(AuthState::ChallengeSent),
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn challenge(&self) -> &ChallengeToken {
        &self.challenge
    }

    pub async fn state(&self) -> AuthState {
        *self.state.lock().await
    }

    pub async fn mark_authenticated(&self) {
        *self.state.lock().await = AuthState::Authenticated;
    }

    /// Close the session: mark it `Closed` and release the transport.
    pub async fn close(&self) {
        *self.state.lock().await = AuthState::Closed;
        self.transport.disconnect().await;
    }
}

/// Shared phone → session map. All access goes through the mutex; no
/// lock is held across an await point.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<AuthSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, returning the displaced one (if any) so the
    /// caller can release its transport instead of leaking it.
    pub async fn insert(&self, session: Arc<AuthSession>) -> Option<Arc<AuthSession>> {
        self.sessions
            .lock()
            .await
            .insert(session.phone().to_string(), session)
    }

    pub async fn get(&self, phone: &str) -> Option<Arc<AuthSession>> {
        self.sessions.lock().await.get(phone).cloned()
    }

    pub async fn remove(&self, phone: &str) -> Option<Arc<AuthSession>> {
        self.sessions.lock().await.remove(phone)
    }

    /// Take every session out of the registry (shutdown path).
    pub async fn drain(&self) -> Vec<Arc<AuthSession>> {
        self.sessions.lock().await.drain().map(|(_, s)| s).collect()
    }
}
