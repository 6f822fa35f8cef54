//! Passphrase-sealed static user database.
//!
//! The file is base64 text of `salt ‖ nonce ‖ ciphertext`. The key is derived
//! from the passphrase with PBKDF2-HMAC-SHA256 over the salt, and the ciphertext is
//! AES-256-GCM over a JSON document that carries a fixed sentinel so a wrong
//! passphrase can be told apart from a right one.

use crate::{
    error::{
        LedgerError,
        Result,
    },
    ledger::LedgerService,
    model::UserRecord,
    session::Session,
    transaction::UpdateRequest,
};
use aes_gcm::{
    Aes256Gcm,
    Nonce,
    aead::{
        Aead,
        KeyInit,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use pbkdf2::pbkdf2_hmac;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::Sha256;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    info,
    warn,
};

pub const VERIFICATION_SENTINEL: &str = "points-ledger-database-v1";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const PBKDF2_ITERATIONS: u32 = 200_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDocument {
    #[serde(rename = "__verification_key__", default)]
    pub verification_key: String,
    pub users: Vec<DatabaseUser>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUser {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Legacy single counter, read as local points when the split counters
    /// are both absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_rewards: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_rewards: Option<u64>,
}

impl DatabaseDocument {
    pub fn new(users: Vec<DatabaseUser>) -> Self {
        Self {
            verification_key: VERIFICATION_SENTINEL.to_string(),
            users,
        }
    }

    pub fn user_records(&self) -> Vec<UserRecord> {
        self.users.iter().map(UserRecord::from).collect()
    }
}

impl From<&DatabaseUser> for UserRecord {
    fn from(user: &DatabaseUser) -> Self {
        let (local, global) = match (user.local_rewards, user.global_rewards) {
            (None, None) => (user.rewards.unwrap_or_default(), 0),
            (local, global) => (local.unwrap_or_default(), global.unwrap_or_default()),
        };
        let record = UserRecord::new(user.name.clone(), local, global);
        match &user.icon {
            Some(icon) => record.with_icon(icon.clone()),
            None => record,
        }
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt a document under `passphrase`, stamping the sentinel.
pub fn seal(document: &DatabaseDocument, passphrase: &str) -> Result<String> {
    if passphrase.is_empty() {
        return Err(LedgerError::MissingPassword);
    }
    let mut document = document.clone();
    document.verification_key = VERIFICATION_SENTINEL.to_string();
    let plaintext = serde_json::to_vec(&document)
        .map_err(|err| LedgerError::Seal(format!("failed to encode database: {err}")))?;

    let salt: [u8; SALT_LEN] = rand::random();
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|err| LedgerError::Seal(format!("failed to create cipher: {err}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|err| LedgerError::Seal(format!("encryption failed: {err}")))?;

    let mut sealed = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

/// Decrypt and verify a sealed database. Every way this can go wrong is
/// reported as [`LedgerError::IncorrectPassword`].
pub fn unseal(sealed: &str, passphrase: &str) -> Result<DatabaseDocument> {
    try_unseal(sealed, passphrase).ok_or(LedgerError::IncorrectPassword)
}

fn try_unseal(sealed: &str, passphrase: &str) -> Option<DatabaseDocument> {
    let bytes = STANDARD.decode(sealed.trim()).ok()?;
    if bytes.len() < SALT_LEN + NONCE_LEN {
        return None;
    }
    let (salt, rest) = bytes.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new_from_slice(&key).ok()?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .ok()?;
    let document: DatabaseDocument = serde_json::from_slice(&plaintext).ok()?;
    (document.verification_key == VERIFICATION_SENTINEL).then_some(document)
}

/// Read-only data source backed by a sealed file. It has no write path:
/// updates are accepted for the running session and never persisted.
#[derive(Clone, Debug)]
pub struct EncryptedDatabase {
    path: PathBuf,
}

impl EncryptedDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerService for EncryptedDatabase {
    async fn fetch_users(&self, session: &Session) -> Result<Vec<UserRecord>> {
        let sealed = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            LedgerError::Load(format!(
                "failed to read database {}: {err}",
                self.path.display()
            ))
        })?;
        let document = unseal(&sealed, session.shared_secret())?;
        info!(path = %self.path.display(), "database unsealed");
        Ok(document.user_records())
    }

    async fn submit_update(&self, request: &UpdateRequest) -> Result<()> {
        warn!(
            user_affected = %request.user_affected,
            "encrypted database is read-only; update kept for this session only"
        );
        Ok(())
    }
}
