use crate::{
    config::LedgerSource,
    encrypted::EncryptedDatabase,
    error::Result,
    ledger::LedgerService,
    model::UserRecord,
    remote::HttpLedgerService,
    session::Session,
    transaction::UpdateRequest,
};
use std::fmt;

/// The configured data source, picked at startup.
#[derive(Clone)]
pub enum LedgerBackend {
    Remote(HttpLedgerService),
    Encrypted(EncryptedDatabase),
}

impl LedgerBackend {
    pub fn from_source(source: &LedgerSource) -> Result<Self> {
        match source {
            LedgerSource::Remote { url } => {
                Ok(LedgerBackend::Remote(HttpLedgerService::new(url.clone())?))
            }
            LedgerSource::EncryptedFile { path } => {
                Ok(LedgerBackend::Encrypted(EncryptedDatabase::new(path.clone())))
            }
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, LedgerBackend::Encrypted(_))
    }
}

impl LedgerService for LedgerBackend {
    async fn fetch_users(&self, session: &Session) -> Result<Vec<UserRecord>> {
        match self {
            LedgerBackend::Remote(service) => service.fetch_users(session).await,
            LedgerBackend::Encrypted(service) => service.fetch_users(session).await,
        }
    }

    async fn submit_update(&self, request: &UpdateRequest) -> Result<()> {
        match self {
            LedgerBackend::Remote(service) => service.submit_update(request).await,
            LedgerBackend::Encrypted(service) => service.submit_update(request).await,
        }
    }
}

impl fmt::Display for LedgerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerBackend::Remote(service) => write!(f, "{service}"),
            LedgerBackend::Encrypted(service) => {
                write!(f, "{} (read-only)", service.path().display())
            }
        }
    }
}
