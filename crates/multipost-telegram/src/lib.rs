//! MTProto transport adapter.
//!
//! Implements the `multipost-core` transport port over a user-account
//! MTProto client. The implementation is feature-gated so the workspace
//! builds without the MTProto stack; without the `mtproto` feature,
//! [`connector`] reports a configuration error at startup.

use std::sync::Arc;

use multipost_core::{config::Config, transport::TransportConnector, Error, Result};

#[cfg(feature = "mtproto")]
mod mtproto;

#[cfg(feature = "mtproto")]
pub use mtproto::MtprotoConnector;

/// Build the platform connector for this build.
#[cfg(feature = "mtproto")]
pub fn connector(cfg: &Config) -> Result<Arc<dyn TransportConnector>> {
    Ok(Arc::new(MtprotoConnector::new(
        cfg.api_id,
        cfg.api_hash.clone(),
    )))
}

#[cfg(not(feature = "mtproto"))]
pub fn connector(_cfg: &Config) -> Result<Arc<dyn TransportConnector>> {
    Err(Error::Config(
        "built without MTProto support; rebuild with `--features mtproto`".to_string(),
    ))
}
