//! Login challenge state machine.
//!
//! Drives `send_code` → `sign_in` against the transport, including the
//! optional two-factor step and a single data-center migration retry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    session::{AuthSession, SessionRegistry},
    transport::{Identity, TransportConnector, TransportError},
    Error, Result,
};

pub struct LoginFlow {
    connector: Arc<dyn TransportConnector>,
    registry: Arc<SessionRegistry>,
}

impl LoginFlow {
    pub fn new(connector: Arc<dyn TransportConnector>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            connector,
            registry,
        }
    }

    /// Open a transport connection and request a login code for `phone`.
    ///
    /// A migration redirect triggers exactly one reconnect bound to the
    /// advertised data center. No session is registered on failure; a
    /// prior session for the same phone is replaced and its transport
    /// released.
    pub async fn request_code(&self, phone: &str) -> Result<()> {
        let transport = self
            .connector
            .connect(None)
            .await
            .map_err(|e| Error::CodeRequestFailed(e.to_string()))?;

        let (transport, challenge) = match transport.send_code(phone).await {
            Ok(challenge) => (transport, challenge),
            Err(TransportError::Migrate(dc)) => {
                info!(phone, dc = dc.0, "account lives on another data center, reconnecting");
                transport.disconnect().await;
                let migrated = self
                    .connector
                    .connect(Some(dc))
                    .await
                    .map_err(|e| Error::CodeRequestFailed(e.to_string()))?;
                match migrated.send_code(phone).await {
                    Ok(challenge) => (migrated, challenge),
                    Err(e) => {
                        migrated.disconnect().await;
                        return Err(Error::CodeRequestFailed(e.to_string()));
                    }
                }
            }
            Err(e) => {
                transport.disconnect().await;
                warn!(phone, error = %e, "code request failed");
                return Err(Error::CodeRequestFailed(e.to_string()));
            }
        };

        let session = Arc::new(AuthSession::new(phone, transport, challenge));
        if let Some(displaced) = self.registry.insert(session).await {
            info!(phone, "replacing an existing session");
            displaced.close().await;
        }
        Ok(())
    }

    /// Complete the challenge for an open session.
    ///
    /// `PasswordRequired` preserves the session so the caller can
    /// resubmit with the two-factor password without a fresh code.
    pub async fn verify_code(
        &self,
        phone: &str,
        code: &str,
        password: Option<&str>,
    ) -> Result<Identity> {
        let session = self.registry.get(phone).await.ok_or(Error::SessionNotFound)?;

        match session
            .transport()
            .sign_in(phone, session.challenge(), code, password)
            .await
        {
            Ok(identity) => {
                session.mark_authenticated().await;
                info!(phone, username = identity.username.as_deref().unwrap_or(""), "signed in");
                Ok(identity)
            }
            Err(TransportError::PasswordRequired) => Err(Error::PasswordRequired),
            Err(TransportError::InvalidCredentials) => Err(Error::InvalidCredentials),
            Err(e) => {
                warn!(phone, error = %e, "sign-in failed");
                Err(Error::Transport(e.to_string()))
            }
        }
    }

    /// Close and remove the session for `phone`, if any.
    pub async fn logout(&self, phone: &str) -> Result<()> {
        if let Some(session) = self.registry.remove(phone).await {
            session.close().await;
            info!(phone, "logged out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataCenterId;
    use crate::session::AuthState;
    use crate::testing::{FakeConnector, FakeTransport};
    use crate::transport::ChallengeToken;

    fn flow(connector: Arc<FakeConnector>) -> (LoginFlow, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        (LoginFlow::new(connector, registry.clone()), registry)
    }

    #[tokio::test]
    async fn request_code_opens_a_challenge_sent_session() {
        let connector = Arc::new(FakeConnector::new());
        let (flow, registry) = flow(connector);

        flow.request_code("+100").await.unwrap();

        let session = registry.get("+100").await.unwrap();
        assert_eq!(session.state().await, AuthState::ChallengeSent);
        assert_eq!(session.challenge(), &ChallengeToken("challenge-1".into()));
    }

    #[tokio::test]
    async fn migration_reconnects_once_to_the_advertised_dc() {
        let connector = Arc::new(FakeConnector::new());
        let first = Arc::new(FakeTransport::new());
        first
            .send_code_script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Migrate(DataCenterId(5))));
        connector.prepare(first.clone());
        let (flow, registry) = flow(connector.clone());

        flow.request_code("+100").await.unwrap();

        assert_eq!(
            connector.connects.lock().unwrap().clone(),
            vec![None, Some(DataCenterId(5))]
        );
        assert!(first.is_disconnected());
        assert!(registry.get("+100").await.is_some());
    }

    #[tokio::test]
    async fn connect_failure_surfaces_as_code_request_failed() {
        let connector = Arc::new(FakeConnector::new());
        connector
            .connect_failures
            .lock()
            .unwrap()
            .push_back(TransportError::Unavailable("no route".into()));
        let (flow, registry) = flow(connector);

        let err = flow.request_code("+100").await.unwrap_err();
        assert!(matches!(err, Error::CodeRequestFailed(_)));
        assert!(registry.get("+100").await.is_none());
    }

    #[tokio::test]
    async fn code_request_failure_registers_no_session() {
        let connector = Arc::new(FakeConnector::new());
        let transport = Arc::new(FakeTransport::new());
        transport
            .send_code_script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Unavailable("flood wait".into())));
        connector.prepare(transport.clone());
        let (flow, registry) = flow(connector);

        let err = flow.request_code("+100").await.unwrap_err();
        assert!(matches!(err, Error::CodeRequestFailed(_)));
        assert!(registry.get("+100").await.is_none());
        assert!(transport.is_disconnected());
    }

    #[tokio::test]
    async fn repeated_request_replaces_and_disconnects_the_prior_session() {
        let connector = Arc::new(FakeConnector::new());
        let (flow, registry) = flow(connector.clone());

        flow.request_code("+100").await.unwrap();
        flow.request_code("+100").await.unwrap();

        let created = connector.created();
        assert_eq!(created.len(), 2);
        assert!(created[0].is_disconnected());
        assert!(!created[1].is_disconnected());
        assert!(registry.get("+100").await.is_some());
    }

    #[tokio::test]
    async fn verify_without_session_fails() {
        let connector = Arc::new(FakeConnector::new());
        let (flow, _registry) = flow(connector);

        let err = flow.verify_code("+100", "12345", None).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound));
    }

    #[tokio::test]
    async fn two_factor_step_preserves_the_session() {
        let connector = Arc::new(FakeConnector::new());
        let transport = Arc::new(FakeTransport::new());
        {
            let mut script = transport.sign_in_script.lock().unwrap();
            script.push_back(Err(TransportError::PasswordRequired));
            script.push_back(Ok(Identity {
                username: Some("alice".to_string()),
            }));
        }
        connector.prepare(transport.clone());
        let (flow, registry) = flow(connector);

        flow.request_code("+100").await.unwrap();

        let err = flow.verify_code("+100", "12345", None).await.unwrap_err();
        assert!(matches!(err, Error::PasswordRequired));
        assert!(registry.get("+100").await.is_some());

        // Resubmitting with the password succeeds without a new code.
        let identity = flow
            .verify_code("+100", "12345", Some("hunter2"))
            .await
            .unwrap();
        assert_eq!(identity.username.as_deref(), Some("alice"));
        let session = registry.get("+100").await.unwrap();
        assert_eq!(session.state().await, AuthState::Authenticated);

        let calls = transport.sign_in_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].2.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn bad_code_maps_to_invalid_credentials() {
        let connector = Arc::new(FakeConnector::new());
        let transport = Arc::new(FakeTransport::new());
        transport
            .sign_in_script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::InvalidCredentials));
        connector.prepare(transport);
        let (flow, _registry) = flow(connector);

        flow.request_code("+100").await.unwrap();
        let err = flow.verify_code("+100", "00000", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn logout_closes_and_removes_the_session() {
        let connector = Arc::new(FakeConnector::new());
        let (flow, registry) = flow(connector.clone());

        flow.request_code("+100").await.unwrap();
        flow.logout("+100").await.unwrap();

        assert!(registry.get("+100").await.is_none());
        assert!(connector.created()[0].is_disconnected());

        // Logging out an unknown phone is a no-op.
        flow.logout("+200").await.unwrap();
    }
}
