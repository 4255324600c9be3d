//! Multi-target post dispatcher.
//!
//! Composes the outgoing message, delivers it to every target
//! independently, and aggregates per-target failures instead of aborting
//! the batch. Send is not transactional across targets: successful
//! targets keep their posts even when the call as a whole fails.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    domain::PostTarget,
    transport::{SendOptions, Transport},
    Error, Result,
};

/// Platform caption limit; longer messages are truncated with an ellipsis.
pub const MESSAGE_LIMIT: usize = 1024;

/// An outgoing post, resolved down to image paths.
#[derive(Clone, Debug)]
pub struct PostRequest {
    pub targets: Vec<String>,
    pub title: String,
    pub description: String,
    pub images: Vec<PathBuf>,
    pub schedule: Option<DateTime<Utc>>,
}

/// `title`, blank line, `description`; truncated to the caption limit.
/// Limits are in characters, not bytes.
pub fn compose_message(title: &str, description: &str) -> String {
    let message = format!("{title}\n\n{description}");
    if message.chars().count() <= MESSAGE_LIMIT {
        return message;
    }
    let mut truncated: String = message.chars().take(MESSAGE_LIMIT - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Deliver `request` to every target. Succeeds only if all targets
/// succeeded; otherwise fails with an aggregate error naming every
/// failed target.
pub async fn dispatch_post(transport: &dyn Transport, request: &PostRequest) -> Result<()> {
    let message = compose_message(&request.title, &request.description);

    let mut failed: Vec<String> = Vec::new();
    for raw in &request.targets {
        match deliver(transport, raw, &message, &request.images, request.schedule).await {
            Ok(()) => {
                info!(target = %raw, scheduled = request.schedule.is_some(), "post delivered");
            }
            Err(e) => {
                warn!(target = %raw, error = %e, "post delivery failed");
                failed.push(raw.clone());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialDelivery(failed))
    }
}

async fn deliver(
    transport: &dyn Transport,
    raw: &str,
    message: &str,
    images: &[PathBuf],
    schedule: Option<DateTime<Utc>>,
) -> Result<()> {
    let target =
        PostTarget::parse(raw).ok_or_else(|| Error::ChannelResolutionFailed(raw.to_string()))?;
    let channel = transport
        .resolve_target(&target)
        .await
        .map_err(|e| Error::ChannelResolutionFailed(format!("{raw}: {e}")))?;

    let opts = SendOptions {
        silent: false,
        schedule,
    };

    if images.is_empty() {
        transport
            .send_text(channel, message, &opts)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        return Ok(());
    }

    for path in images {
        if !path.exists() {
            return Err(Error::Transport(format!(
                "image file not found: {}",
                path.display()
            )));
        }
    }

    // The caption rides on the first media item, whether the post is a
    // single photo or a grouped album.
    let receipts = transport
        .send_media(channel, images, Some(message), &opts)
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    // Known platform inconsistency: the caption is sometimes dropped.
    // Inspect the first receipt and fall back to a plain-text follow-up
    // so the text is guaranteed to arrive.
    if let Some(first) = receipts.first() {
        if first.text != message {
            warn!(target = %raw, "caption was not echoed back, sending the text separately");
            transport
                .send_text(channel, message, &opts)
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
        }
    }

    Ok(())
}
