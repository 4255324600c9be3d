//! Draft store and the background scheduler that publishes due drafts.
//!
//! The store is a time-ordered queue keyed by `scheduled_at`; the
//! scheduler pops only due entries, so pending drafts are never mutated
//! mid-iteration. A popped draft gets exactly one publish attempt and is
//! never re-queued; its image handles are released when it is dropped.

use std::{
    cmp::{Ordering as CmpOrdering, Reverse},
    collections::BinaryHeap,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    blobs::ImageHandle,
    post::{dispatch_post, PostRequest},
    session::SessionRegistry,
};

/// A pending scheduled post. `scheduled_at` is non-optional by
/// construction: a submission without a future schedule is dispatched
/// synchronously and never stored.
#[derive(Debug)]
pub struct Draft {
    pub phone: String,
    pub targets: Vec<String>,
    pub title: String,
    pub description: String,
    pub images: Vec<ImageHandle>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

struct QueuedDraft {
    seq: u64,
    draft: Draft,
}

impl PartialEq for QueuedDraft {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedDraft {}

impl PartialOrd for QueuedDraft {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedDraft {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.draft
            .scheduled_at
            .cmp(&other.draft.scheduled_at)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Default)]
struct StoreInner {
    heap: BinaryHeap<Reverse<QueuedDraft>>,
    next_seq: u64,
}

/// Time-ordered draft queue shared by the handlers and the scheduler.
/// No lock is held across an await point.
#[derive(Default)]
pub struct DraftStore {
    inner: Mutex<StoreInner>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, draft: Draft) {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(QueuedDraft { seq, draft }));
    }

    /// Pop every draft due at `now`, oldest schedule first. Pending
    /// drafts stay queued untouched.
    pub async fn pop_due(&self, now: DateTime<Utc>) -> Vec<Draft> {
        let mut inner = self.inner.lock().await;
        let mut due = Vec::new();
        while inner
            .heap
            .peek()
            .is_some_and(|Reverse(q)| q.draft.scheduled_at <= now)
        {
            if let Some(Reverse(q)) = inner.heap.pop() {
                due.push(q.draft);
            }
        }
        due
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Recurring worker publishing due drafts. Cloneable handle over shared
/// state, stopped through a cancellation token.
#[derive(Clone)]
pub struct DraftScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    registry: Arc<SessionRegistry>,
    drafts: Arc<DraftStore>,
    poll_interval: Duration,
    dispatch_timeout: Duration,
    cancel: CancellationToken,
}

impl DraftScheduler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        drafts: Arc<DraftStore>,
        poll_interval: Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                drafts,
                poll_interval,
                dispatch_timeout,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawn the recurring tick loop.
    pub fn start(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(scheduler.inner.poll_interval);
            // The first tick of `interval` fires immediately; skip it so
            // a fresh start waits one full period like every later tick.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = scheduler.inner.cancel.cancelled() => break,
                    _ = tick.tick() => scheduler.publish_due(Utc::now()).await,
                }
            }
            info!("draft scheduler stopped");
        });
    }

    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Publish every draft due at `now`. Never surfaces errors: a failed
    /// publish is logged and the draft is dropped without retry.
    pub async fn publish_due(&self, now: DateTime<Utc>) {
        let due = self.inner.drafts.pop_due(now).await;
        if !due.is_empty() {
            info!(count = due.len(), "publishing due drafts");
        }
        for draft in due {
            self.publish_one(draft).await;
            // The draft (and its image handles) is dropped here, which
            // releases the spooled files on every outcome.
        }
    }

    async fn publish_one(&self, draft: Draft) {
        let Some(session) = self.inner.registry.get(&draft.phone).await else {
            warn!(phone = %draft.phone, "no session for draft owner, dropping draft");
            return;
        };

        if draft.images.iter().any(|h| !h.is_live()) {
            error!(phone = %draft.phone, "draft image no longer exists, dropping draft");
            return;
        }

        let request = PostRequest {
            targets: draft.targets.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            images: draft.images.iter().map(|h| h.path().to_path_buf()).collect(),
            schedule: None,
        };

        let outcome = tokio::time::timeout(
            self.inner.dispatch_timeout,
            dispatch_post(session.transport(), &request),
        )
        .await;

        match outcome {
            Ok(Ok(())) => info!(phone = %draft.phone, "draft published"),
            Ok(Err(e)) => error!(phone = %draft.phone, error = %e, "draft publish failed, dropping draft"),
            Err(_) => error!(phone = %draft.phone, "draft publish timed out, dropping draft"),
        }
    }
}
