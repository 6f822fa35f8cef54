pub use error::{
    LedgerError,
    Result,
};
pub use ledger::{
    Ledger,
    LedgerCache,
    LedgerService,
};
pub use model::{
    Balance,
    UserRecord,
};
pub use session::{
    IdentityPolicy,
    Session,
};
pub use transaction::{
    Mode,
    PendingTransaction,
    UpdateRequest,
    ValidatedTransaction,
};

pub mod activity;
pub mod backend;
pub mod config;
pub mod encrypted;
pub mod error;
pub mod ledger;
pub mod model;
pub mod remote;
pub mod session;
pub mod transaction;

pub mod test_helpers;
