//! Moderation and account-linking adapter for the Go backend's REST API.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use multipost_core::{
    domain::AccountId,
    links::{ChannelLink, LinkStore},
    moderation::{ModerationService, ModerationVerdict},
    Error, Result,
};

const PLATFORM: &str = "telegram";

/// REST client for the backend; implements both the moderation and the
/// link-store ports.
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_user(&self, account: &AccountId, bearer: &str) -> Result<UserInfo> {
        let resp = self
            .http
            .get(self.url(&format!("/api/user/{account}")))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("user lookup: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "user lookup returned {}",
                resp.status()
            )));
        }
        resp.json::<UserInfo>()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("user lookup body: {e}")))
    }

    async fn forbidden_words(&self, text: &str, bearer: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .post(self.url("/api/check_forbidden_words"))
            .bearer_auth(bearer)
            .json(&CheckWordsRequest { text })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("forbidden-words check: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "forbidden-words check returned {}",
                resp.status()
            )));
        }
        // The backend occasionally answers `null` for a clean text.
        let body: Option<CheckWordsResponse> = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("forbidden-words body: {e}")))?;
        Ok(body
            .and_then(|b| b.forbidden_words)
            .unwrap_or_default())
    }

    async fn report_attempt(&self, account: &AccountId, words: &[String], bearer: &str) {
        let outcome = self
            .http
            .post(self.url("/api/report_forbidden_words_attempt"))
            .bearer_auth(bearer)
            .json(&ReportAttemptRequest {
                account_id: &account.0,
                forbidden_words: words,
            })
            .send()
            .await;
        if let Err(e) = outcome {
            warn!(account = %account, error = %e, "failed to report forbidden-words attempt");
        }
    }

    async fn existing_social_ids(&self, account: &AccountId, bearer: &str) -> HashSet<String> {
        let resp = self
            .http
            .get(self.url("/api/links"))
            .query(&[("user_id", account.0.as_str()), ("platform", PLATFORM)])
            .bearer_auth(bearer)
            .send()
            .await;
        let resp = match resp {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(account = %account, status = %r.status(), "could not list existing links");
                return HashSet::new();
            }
            Err(e) => {
                warn!(account = %account, error = %e, "could not list existing links");
                return HashSet::new();
            }
        };
        match resp.json::<LinksResponse>().await {
            Ok(body) => body.links.into_iter().map(|l| l.social_id).collect(),
            Err(e) => {
                warn!(account = %account, error = %e, "could not parse existing links");
                HashSet::new()
            }
        }
    }
}

#[async_trait]
impl ModerationService for BackendClient {
    async fn check(
        &self,
        account: &AccountId,
        text: &str,
        bearer: &str,
    ) -> Result<ModerationVerdict> {
        let user = self.fetch_user(account, bearer).await?;
        if user.is_banned {
            return Ok(ModerationVerdict {
                banned: true,
                forbidden_words: Vec::new(),
            });
        }

        let words = self.forbidden_words(text, bearer).await?;
        if !words.is_empty() {
            info!(account = %account, words = ?words, "forbidden words matched");
            self.report_attempt(account, &words, bearer).await;
        }
        Ok(ModerationVerdict {
            banned: false,
            forbidden_words: words,
        })
    }
}

#[async_trait]
impl LinkStore for BackendClient {
    async fn record(&self, account: &AccountId, links: &[ChannelLink], bearer: &str) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }

        let existing = self.existing_social_ids(account, bearer).await;
        let new_channels: Vec<ChannelPayload<'_>> = links
            .iter()
            .filter(|l| !existing.contains(&l.main_username))
            .map(|l| ChannelPayload {
                title: &l.title,
                main_username: &l.main_username,
                social_id: &l.main_username,
            })
            .collect();
        if new_channels.is_empty() {
            return Ok(());
        }

        let resp = self
            .http
            .post(self.url("/api/links"))
            .bearer_auth(bearer)
            .json(&SaveLinksRequest {
                user_id: &account.0,
                platform: PLATFORM,
                channels: &new_channels,
            })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("link save: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "link save returned {}",
                resp.status()
            )));
        }
        info!(account = %account, count = new_channels.len(), "recorded new channel links");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    is_banned: bool,
}

#[derive(Debug, Serialize)]
struct CheckWordsRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckWordsResponse {
    #[serde(default)]
    forbidden_words: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ReportAttemptRequest<'a> {
    account_id: &'a str,
    forbidden_words: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LinksResponse {
    #[serde(default)]
    links: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    social_id: String,
}

#[derive(Debug, Serialize)]
struct ChannelPayload<'a> {
    title: &'a str,
    main_username: &'a str,
    social_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SaveLinksRequest<'a> {
    user_id: &'a str,
    platform: &'a str,
    channels: &'a [ChannelPayload<'a>],
}
