use crate::session::IdentityPolicy;
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::path::PathBuf;

pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerSource {
    /// Spreadsheet script endpoint serving reads and writes.
    Remote { url: String },
    /// Sealed database file, read-only.
    EncryptedFile { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub source: LedgerSource,
    pub identities: IdentityPolicy,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn new(
        url: Option<String>,
        database: Option<&str>,
        identities: Vec<String>,
        default_identity: Option<String>,
        log_dir: Option<&str>,
    ) -> Result<Self> {
        let source = match (url, database) {
            (Some(url), None) => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    return Err(eyre!("--url must not be empty"));
                }
                LedgerSource::Remote { url }
            }
            (None, Some(path)) => LedgerSource::EncryptedFile {
                path: resolve_path(path),
            },
            (Some(_), Some(_)) => {
                return Err(eyre!("Choose one of --url or --database, not both"));
            }
            (None, None) => {
                return Err(eyre!("Select a data source with --url or --database"));
            }
        };

        let identities = identity_policy(identities, default_identity)?;
        let log_dir = resolve_path(log_dir.unwrap_or(DEFAULT_LOG_DIR));

        Ok(Self {
            source,
            identities,
            log_dir,
        })
    }
}

fn identity_policy(
    identities: Vec<String>,
    default_identity: Option<String>,
) -> Result<IdentityPolicy> {
    let mut known: Vec<String> = Vec::new();
    for name in identities {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(eyre!("--identity must not be empty"));
        }
        if !known.contains(&name) {
            known.push(name);
        }
    }
    match (known.is_empty(), default_identity) {
        (true, Some(name)) => Ok(IdentityPolicy::Default(name)),
        (true, None) => Ok(IdentityPolicy::default()),
        (false, None) => Ok(IdentityPolicy::Select { known }),
        (false, Some(_)) => Err(eyre!(
            "--default-identity cannot be combined with --identity"
        )),
    }
}

/// Expands a leading `~` so paths can be given the way a shell would.
pub fn resolve_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    PathBuf::from(expanded.into_owned())
}
