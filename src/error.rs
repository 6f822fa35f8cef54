use crate::model::Balance;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Every failure the ledger core can surface. `Display` texts are shown to
/// the operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Please enter the password.")]
    MissingPassword,
    #[error("Please select who you are.")]
    MissingSelection,
    #[error("Incorrect password.")]
    IncorrectPassword,
    #[error("Please unlock with the password first.")]
    Locked,
    #[error("Could not load data: {0}")]
    Load(String),
    #[error("Unknown user '{0}'")]
    UnknownUser(String),
    #[error("Please enter a valid, non-negative number for {field} points (got '{input}').")]
    InvalidAmount { field: PointsField, input: String },
    #[error("Please provide a reason.")]
    MissingReason,
    #[error("Please enter at least one point.")]
    NoOp,
    #[error(
        "User does not have enough points. Current points - Local: {local}, Global: {global}"
    )]
    InsufficientBalance { local: u64, global: u64 },
    #[error(
        "Points changed since this form was opened (now Local: {}, Global: {}). Please reopen it.",
        .current.local,
        .current.global
    )]
    StaleSnapshot { current: Balance },
    #[error("Update failed: {0}")]
    WriteFailed(String),
    #[error("Could not seal database: {0}")]
    Seal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsField {
    Local,
    Global,
}

impl std::fmt::Display for PointsField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PointsField::Local => "local",
            PointsField::Global => "global",
        };
        write!(f, "{name}")
    }
}
