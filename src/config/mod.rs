use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    errors::{AuditError, Result},
    obligation::Obligation,
};

const SECRET_PREFIX: &str = "age:";

/// A configuration value that may arrive encrypted (`age:<base64>`).
///
/// Secrets are resolved exactly once during configuration load; after that
/// the rest of the crate treats them as plaintext and never inspects
/// prefixes itself.
#[derive(Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_encrypted(&self) -> bool {
        self.0.starts_with(SECRET_PREFIX)
    }

    fn resolve(&mut self, decryptor: &dyn Decryptor) -> Result<()> {
        if let Some(payload) = self.0.strip_prefix(SECRET_PREFIX) {
            self.0 = decryptor.decrypt(payload)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_encrypted() {
            f.write_str("Secret(<encrypted>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

/// Resolves encrypted configuration values to plaintext.
///
/// Decryption itself is an external concern; callers wire in whatever
/// identity management they have.
pub trait Decryptor {
    fn decrypt(&self, payload: &str) -> Result<String>;
}

/// Decryptor used when no identity is configured. Encrypted values become a
/// configuration error instead of being passed through verbatim.
pub struct NoDecryptor;

impl Decryptor for NoDecryptor {
    fn decrypt(&self, _payload: &str) -> Result<String> {
        Err(AuditError::Config(
            "encrypted value found but no decryptor configured".into(),
        ))
    }
}

fn default_sender() -> String {
    "Budget".into()
}

/// SMS gateway settings shared by both binaries.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifySettings {
    #[serde(default)]
    pub sid: Secret,
    #[serde(default)]
    pub token: Secret,
    #[serde(default)]
    pub mobiles: Vec<String>,
    #[serde(default = "default_sender")]
    pub from: String,
}

impl NotifySettings {
    /// Fails before any network call when the gateway cannot possibly be
    /// reached with what was configured.
    pub fn validate(&self) -> Result<()> {
        if self.sid.is_empty() || self.token.is_empty() || self.mobiles.is_empty() {
            return Err(AuditError::Config("missing notify config".into()));
        }
        Ok(())
    }

    fn resolve_secrets(&mut self, decryptor: &dyn Decryptor) -> Result<()> {
        self.sid.resolve(decryptor)?;
        self.token.resolve(decryptor)?;
        Ok(())
    }
}

/// One configured check. The auditor currently evaluates amount checks only;
/// unknown types fail configuration load for the run.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckDef {
    Amount(Obligation),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditorConfig {
    /// Base URL of the transaction ledger API.
    pub backend: String,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub store: Option<PathBuf>,
    pub notify: NotifySettings,
    #[serde(default)]
    pub checks: Vec<CheckDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BigBillsSettings {
    pub spreadsheet_id: String,
    pub spreadsheet_range: String,
    #[serde(default)]
    pub credentials: Secret,
    pub account_id: String,
    /// Base URL of the transaction ledger API used for repayment lookups.
    pub transactions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BigBillsConfig {
    pub bigbills: BigBillsSettings,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub store: Option<PathBuf>,
    pub notify: NotifySettings,
}

/// Loads the auditor configuration and resolves secrets in place.
pub fn load_auditor(path: &Path, decryptor: &dyn Decryptor) -> Result<AuditorConfig> {
    let mut loaded: AuditorConfig = load_file(path)?;
    loaded.notify.resolve_secrets(decryptor)?;
    Ok(loaded)
}

/// Loads the big-bills configuration and resolves secrets in place.
pub fn load_bigbills(path: &Path, decryptor: &dyn Decryptor) -> Result<BigBillsConfig> {
    let mut loaded: BigBillsConfig = load_file(path)?;
    loaded.notify.resolve_secrets(decryptor)?;
    loaded.bigbills.credentials.resolve(decryptor)?;
    Ok(loaded)
}

fn load_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .map_err(|err| AuditError::Config(format!("unable to load config: {err}")))?;
    builder
        .try_deserialize()
        .map_err(|err| AuditError::Config(format!("unable to parse config: {err}")))
}

/// Default location of the dedup store directory for the named binary.
pub fn default_store_path(app: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app)
        .join("notifications")
}
