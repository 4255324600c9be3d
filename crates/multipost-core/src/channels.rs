//! Channel capability prober.
//!
//! Walks the account's dialogs and keeps only the channels the account
//! can post to, then resolves each one's canonical posting identifier.

use tracing::{debug, info, warn};

use crate::{
    domain::{synthetic_username, ChannelDescriptor, ChannelId},
    transport::{SendOptions, Transport, TransportError, TransportResult},
    Error, Result,
};

/// Sentinel sent silently when role checks are inconclusive; deleted
/// right after a successful probe.
const PROBE_TEXT: &str = "connectivity check";

/// List the channels the account may post to, with their canonical
/// posting identifiers.
///
/// Writability is decided in strict priority order: channel creator,
/// admin with post rights, then an empirical sentinel probe. Per-channel
/// failures (rights lookup, probe, profile lookup) exclude the channel
/// and never fail the scan.
pub async fn writable_channels(transport: &dyn Transport) -> Result<Vec<ChannelDescriptor>> {
    let dialogs = transport
        .dialogs()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let mut writable: Vec<(ChannelId, String)> = Vec::new();
    for dialog in dialogs.into_iter().filter(|d| d.is_channel) {
        let id = ChannelId(dialog.id);
        match is_writable(transport, id, &dialog.title).await {
            Ok(true) => writable.push((id, dialog.title)),
            Ok(false) => {}
            Err(e) => {
                warn!(channel = %dialog.title, error = %e, "skipping channel, rights lookup failed");
            }
        }
    }

    let mut descriptors = Vec::with_capacity(writable.len());
    for (id, title) in writable {
        match transport.channel_profile(id).await {
            Ok(profile) => {
                let main_username = profile
                    .usernames
                    .into_iter()
                    .find(|u| !u.is_empty())
                    .unwrap_or_else(|| {
                        debug!(channel = %profile.title, id = id.0, "channel has no username, using synthetic id");
                        synthetic_username(id)
                    });
                descriptors.push(ChannelDescriptor {
                    id,
                    title: if profile.title.is_empty() { title } else { profile.title },
                    main_username,
                });
            }
            Err(e) => {
                warn!(id = id.0, error = %e, "skipping channel, profile lookup failed");
            }
        }
    }

    Ok(descriptors)
}

async fn is_writable(
    transport: &dyn Transport,
    id: ChannelId,
    title: &str,
) -> TransportResult<bool> {
    let rights = transport.channel_rights(id).await?;
    if rights.creator {
        info!(channel = title, "account is the channel creator");
        return Ok(true);
    }
    if rights.post_messages {
        info!(channel = title, "account is an admin with post rights");
        return Ok(true);
    }

    // Role checks were inconclusive; probe with a silent sentinel.
    match transport.send_text(id, PROBE_TEXT, &SendOptions::silent()).await {
        Ok(receipt) => {
            info!(channel = title, "account can post (verified by sentinel)");
            if let Err(e) = transport.delete_message(id, receipt.message).await {
                warn!(channel = title, error = %e, "failed to delete sentinel message");
            }
            Ok(true)
        }
        Err(TransportError::PrivateChannel) => {
            info!(channel = title, "channel is private, not writable");
            Ok(false)
        }
        Err(TransportError::NotParticipant) => {
            info!(channel = title, "account is not a participant, not writable");
            Ok(false)
        }
        Err(e) => {
            info!(channel = title, error = %e, "sentinel probe failed, not writable");
            Ok(false)
        }
    }
}
