use crate::error::{
    LedgerError,
    Result,
};
use std::fmt;

pub const DEFAULT_IDENTITY: &str = "rose";

/// How the acting identity is chosen at the password gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Every session acts as this identity.
    Default(String),
    /// The operator must pick one of these identities.
    Select { known: Vec<String> },
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        IdentityPolicy::Default(DEFAULT_IDENTITY.to_string())
    }
}

impl IdentityPolicy {
    pub fn requires_selection(&self) -> bool {
        matches!(self, IdentityPolicy::Select { .. })
    }

    pub fn known_identities(&self) -> Vec<String> {
        match self {
            IdentityPolicy::Default(name) => vec![name.clone()],
            IdentityPolicy::Select { known } => known.clone(),
        }
    }
}

/// Acting identity plus the shared secret forwarded with every write.
///
/// The secret is never checked here. Whether it is right is decided by the
/// next load: the remote service authorizes it, or the encrypted database
/// fails to open with it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    identity: String,
    secret: String,
}

impl Session {
    pub fn authenticate(
        password: &str,
        selected_identity: Option<&str>,
        policy: &IdentityPolicy,
    ) -> Result<Self> {
        if password.is_empty() {
            return Err(LedgerError::MissingPassword);
        }
        let identity = match policy {
            IdentityPolicy::Default(name) => name.clone(),
            IdentityPolicy::Select { known } => {
                let selected = selected_identity
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or(LedgerError::MissingSelection)?;
                known
                    .iter()
                    .find(|name| name.as_str() == selected)
                    .cloned()
                    .ok_or(LedgerError::MissingSelection)?
            }
        };
        Ok(Self {
            identity,
            secret: password.to_string(),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn shared_secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}
