use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use redis::Commands;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AuditError, Result},
    time::{Clock, SystemClock},
};

const ENTRY_SUFFIX: &str = "json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hash-to-recipient store preventing duplicate deliveries.
///
/// A miss is a `None`, never an error; entries become misses on their own
/// once the TTL elapses. Only the notification dispatcher writes here.
pub trait DedupCache: Send + Sync {
    fn get(&self, hash: &str) -> Result<Option<String>>;
    fn set(&self, hash: &str, recipient: &str, ttl: Duration) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    recipient: String,
    expires_at: DateTime<Utc>,
}

/// Durable local cache: a directory holding one JSON file per hash, each
/// replaced atomically through a uniquely named temp file. Writers for
/// different hashes touch different files, so independent processes sharing
/// the store never clobber each other's entries. Expired entries read as
/// misses and are pruned opportunistically on write.
pub struct FileStore {
    dir: PathBuf,
    clock: Box<dyn Clock>,
}

impl FileStore {
    /// Opens (or creates) the store directory. An unusable location fails
    /// here, before any obligation is evaluated.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_clock(dir, Box::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Box<dyn Clock>) -> Result<Self> {
        let store = Self {
            dir: dir.into(),
            clock,
        };
        fs::create_dir_all(&store.dir)?;
        Ok(store)
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.{ENTRY_SUFFIX}"))
    }

    fn read_entry(&self, path: &Path) -> Result<Option<Entry>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&data).map(Some).map_err(|err| {
            AuditError::Store(format!("corrupt dedup entry {}: {err}", path.display()))
        })
    }

    /// Drops entries past their expiry. Removing an expired entry can race a
    /// concurrent rewrite of the same hash; the worst case is one re-send,
    /// which the delivery model already tolerates.
    fn prune_expired(&self) {
        let now = self.clock.now();
        let Ok(listing) = fs::read_dir(&self.dir) else {
            return;
        };
        for file in listing.flatten() {
            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_SUFFIX) {
                continue;
            }
            match self.read_entry(&path) {
                Ok(Some(entry)) if entry.expires_at > now => {}
                // Expired or unreadable; a concurrent remove is harmless.
                _ => {
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }
}

impl DedupCache for FileStore {
    fn get(&self, hash: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        Ok(self
            .read_entry(&self.entry_path(hash))?
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.recipient))
    }

    fn set(&self, hash: &str, recipient: &str, ttl: Duration) -> Result<()> {
        self.prune_expired();
        let entry = Entry {
            recipient: recipient.to_string(),
            expires_at: self.clock.now() + ttl,
        };
        let json = serde_json::to_string(&entry)?;
        let tmp = self.dir.join(format!(
            "{hash}.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, self.entry_path(hash))?;
        Ok(())
    }
}

/// Networked cache with native expiry; safe for concurrent writers because
/// every key is set atomically.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|err| AuditError::Store(format!("unable to open redis: {err}")))?;
        Ok(Self { client })
    }
}

impl DedupCache for RedisStore {
    fn get(&self, hash: &str) -> Result<Option<String>> {
        let mut connection = self
            .client
            .get_connection()
            .map_err(|err| AuditError::Store(format!("failure reaching redis: {err}")))?;
        connection
            .get(hash)
            .map_err(|err| AuditError::Store(format!("failure reaching redis: {err}")))
    }

    fn set(&self, hash: &str, recipient: &str, ttl: Duration) -> Result<()> {
        let mut connection = self
            .client
            .get_connection()
            .map_err(|err| AuditError::Store(format!("failure reaching redis: {err}")))?;
        let seconds = ttl.num_seconds().max(1) as u64;
        connection
            .set_ex(hash, recipient, seconds)
            .map_err(|err| AuditError::Store(format!("failure reaching redis: {err}")))
    }
}
