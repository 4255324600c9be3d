//! Submission orchestration: moderation gate, schedule decision, and the
//! draft-or-immediate split.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::{
    blobs::{BlobStore, ImageHandle},
    domain::AccountId,
    drafts::{Draft, DraftStore},
    moderation::ModerationService,
    post::{dispatch_post, PostRequest},
    session::SessionRegistry,
    Error, Result,
};

/// A content submission as parsed off the wire. `targets_json` is the
/// raw `chat_usernames` form field (a JSON array of target identifiers).
#[derive(Clone, Debug)]
pub struct Submission {
    pub phone: String,
    pub account: AccountId,
    pub targets_json: String,
    pub title: String,
    pub description: String,
    pub images: Vec<Vec<u8>>,
    pub schedule_date: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Sent to every target immediately.
    Published,
    /// Stored as a draft for the scheduler.
    Deferred,
}

pub struct PublishService {
    registry: Arc<SessionRegistry>,
    drafts: Arc<DraftStore>,
    moderation: Arc<dyn ModerationService>,
    blobs: BlobStore,
    transport_timeout: Duration,
}

impl PublishService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        drafts: Arc<DraftStore>,
        moderation: Arc<dyn ModerationService>,
        blobs: BlobStore,
        transport_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            drafts,
            moderation,
            blobs,
            transport_timeout,
        }
    }

    /// Publish a submission now, or defer it as a draft when its
    /// schedule lies in the future. A schedule at or before the current
    /// time collapses to an immediate send.
    pub async fn create_post(&self, submission: Submission, bearer: &str) -> Result<PublishOutcome> {
        let session = self
            .registry
            .get(&submission.phone)
            .await
            .ok_or(Error::SessionNotFound)?;

        self.moderate(&submission, bearer).await?;
        let targets = parse_targets(&submission.targets_json)?;

        let now = Utc::now();
        let schedule = match submission.schedule_date.as_deref() {
            Some(raw) => {
                let at = parse_schedule_date(raw)?;
                if at <= now {
                    warn!(phone = %submission.phone, "schedule is in the past, sending immediately");
                    None
                } else {
                    Some(at)
                }
            }
            None => None,
        };

        let images = self.spool_images(&submission.images).await?;

        if let Some(scheduled_at) = schedule {
            self.drafts
                .push(Draft {
                    phone: submission.phone.clone(),
                    targets,
                    title: submission.title,
                    description: submission.description,
                    images,
                    scheduled_at,
                    created_at: now,
                })
                .await;
            info!(phone = %submission.phone, %scheduled_at, "post deferred as draft");
            return Ok(PublishOutcome::Deferred);
        }

        // Immediate path: the image handles stay owned by this frame, so
        // the spooled files are released on every exit below.
        let authorized = tokio::time::timeout(self.transport_timeout, async {
            session.transport().is_authorized().await
        })
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Transport(e.to_string()))?;
        if !authorized {
            return Err(Error::NotAuthenticated);
        }

        let request = PostRequest {
            targets,
            title: submission.title,
            description: submission.description,
            images: images.iter().map(|h| h.path().to_path_buf()).collect(),
            schedule: None,
        };
        tokio::time::timeout(self.transport_timeout, async {
            dispatch_post(session.transport(), &request).await
        })
        .await
        .map_err(|_| Error::Timeout)??;

        info!(phone = %submission.phone, "post published");
        Ok(PublishOutcome::Published)
    }

    /// Store a draft. The schedule is required and must be strictly in
    /// the future; a past date is a hard rejection and no draft is
    /// created. No open session is required: ownerless drafts are
    /// dropped by the scheduler at publish time.
    pub async fn save_draft(&self, submission: Submission, bearer: &str) -> Result<()> {
        self.moderate(&submission, bearer).await?;
        let targets = parse_targets(&submission.targets_json)?;

        let raw = submission
            .schedule_date
            .as_deref()
            .ok_or_else(|| Error::malformed("schedule_date", "required for drafts"))?;
        let scheduled_at = parse_schedule_date(raw)?;
        let now = Utc::now();
        if scheduled_at <= now {
            return Err(Error::malformed("schedule_date", "must be in the future"));
        }

        let images = self.spool_images(&submission.images).await?;
        self.drafts
            .push(Draft {
                phone: submission.phone.clone(),
                targets,
                title: submission.title,
                description: submission.description,
                images,
                scheduled_at,
                created_at: now,
            })
            .await;
        info!(phone = %submission.phone, %scheduled_at, "draft saved");
        Ok(())
    }

    async fn moderate(&self, submission: &Submission, bearer: &str) -> Result<()> {
        let text = format!("{} {}", submission.title, submission.description);
        let verdict = self
            .moderation
            .check(&submission.account, &text, bearer)
            .await?;
        if verdict.banned {
            return Err(Error::AccountBanned);
        }
        if !verdict.forbidden_words.is_empty() {
            return Err(Error::ForbiddenContent(verdict.forbidden_words));
        }
        Ok(())
    }

    async fn spool_images(&self, images: &[Vec<u8>]) -> Result<Vec<ImageHandle>> {
        let mut handles = Vec::with_capacity(images.len());
        for bytes in images {
            handles.push(self.blobs.store(bytes).await?);
        }
        Ok(handles)
    }
}

fn parse_targets(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|e| Error::malformed("chat_usernames", format!("expected a JSON array: {e}")))
}

/// Parse an ISO-8601 schedule timestamp. A trailing `Z` or an explicit
/// offset is normalized to UTC; a naive timestamp is interpreted as UTC.
pub fn parse_schedule_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::malformed(
        "schedule_date",
        format!("invalid ISO-8601 timestamp: {raw}"),
    ))
}
