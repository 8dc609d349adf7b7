//! Duplicate-suppressing SMS dispatch.
//!
//! Every (message, recipient) pair is hashed over the exact form body that
//! would be sent; a cache hit means an identical delivery happened within
//! the TTL and the recipient is silently skipped. The cache is only written
//! after the gateway confirms delivery, so a failed send can be retried.

pub mod dedup;
pub mod gateway;

pub use dedup::{DedupCache, FileStore, RedisStore};
pub use gateway::{GatewayClient, HttpSmsGateway};

use chrono::Duration;

use crate::{config::NotifySettings, errors::Result};

const DEDUP_TTL_HOURS: i64 = 24;

/// Fans one message out to every configured recipient.
pub struct Notifier<'a> {
    settings: &'a NotifySettings,
    gateway: &'a dyn GatewayClient,
    cache: &'a dyn DedupCache,
    dry_run: bool,
}

impl<'a> Notifier<'a> {
    pub fn new(
        settings: &'a NotifySettings,
        gateway: &'a dyn GatewayClient,
        cache: &'a dyn DedupCache,
        dry_run: bool,
    ) -> Self {
        Self {
            settings,
            gateway,
            cache,
            dry_run,
        }
    }

    /// Sends `message` to each recipient in turn, returning how many were
    /// actually delivered. Suppressed and dry-run recipients do not count.
    /// A gateway failure aborts the remaining recipients.
    pub fn send(&self, message: &str) -> Result<usize> {
        self.settings.validate()?;

        let mut delivered = 0;
        for recipient in &self.settings.mobiles {
            let body = encode_body(message, &self.settings.from, recipient);
            let hash = content_hash(&body);

            if self.cache.get(&hash)?.is_some() {
                tracing::info!(recipient, "already notified, skipping");
                continue;
            }

            if self.dry_run {
                tracing::info!("(DRYRUN) SMS : {message}");
                continue;
            }

            self.gateway.deliver(&body)?;
            delivered += 1;
            if let Err(err) = self
                .cache
                .set(&hash, recipient, Duration::hours(DEDUP_TTL_HOURS))
            {
                tracing::error!(error = %err, recipient, "failed to record notification");
            }
        }
        Ok(delivered)
    }
}

/// Form body in the wire order the gateway expects. Field order is part of
/// the dedup key, so it must stay stable across runs.
fn encode_body(message: &str, from: &str, to: &str) -> String {
    serde_urlencoded::to_string([("Body", message), ("From", from), ("To", to)])
        .expect("string pairs always encode")
}

fn content_hash(body: &str) -> String {
    format!("{:x}", md5::compute(body))
}
