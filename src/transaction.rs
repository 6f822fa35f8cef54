use crate::{
    error::{
        LedgerError,
        PointsField,
        Result,
    },
    model::Balance,
    session::Session,
};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Add,
    Redeem,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Add => "Add",
            Mode::Redeem => "Redeem",
        };
        write!(f, "{name}")
    }
}

/// An add/redeem form opened on one user. Amounts are kept as typed until
/// [`PendingTransaction::validate`] parses them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub target: String,
    pub mode: Mode,
    pub snapshot: Balance,
    pub local_delta: String,
    pub global_delta: String,
    pub reason: String,
}

impl PendingTransaction {
    pub fn new(target: impl Into<String>, mode: Mode, snapshot: Balance) -> Self {
        Self {
            target: target.into(),
            mode,
            snapshot,
            local_delta: "0".to_string(),
            global_delta: "0".to_string(),
            reason: String::new(),
        }
    }

    pub fn with_amounts(
        mut self,
        local_delta: impl Into<String>,
        global_delta: impl Into<String>,
    ) -> Self {
        self.local_delta = local_delta.into();
        self.global_delta = global_delta.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn validate(&self) -> Result<ValidatedTransaction> {
        let local_delta = parse_amount(PointsField::Local, &self.local_delta)?;
        let global_delta = parse_amount(PointsField::Global, &self.global_delta)?;

        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::MissingReason);
        }

        if local_delta == 0 && global_delta == 0 {
            return Err(LedgerError::NoOp);
        }

        match self.mode {
            Mode::Redeem => {
                if local_delta > self.snapshot.local || global_delta > self.snapshot.global
                {
                    return Err(LedgerError::InsufficientBalance {
                        local: self.snapshot.local,
                        global: self.snapshot.global,
                    });
                }
            }
            Mode::Add => {
                if self.snapshot.local.checked_add(local_delta).is_none() {
                    return Err(LedgerError::InvalidAmount {
                        field: PointsField::Local,
                        input: self.local_delta.clone(),
                    });
                }
                if self.snapshot.global.checked_add(global_delta).is_none() {
                    return Err(LedgerError::InvalidAmount {
                        field: PointsField::Global,
                        input: self.global_delta.clone(),
                    });
                }
            }
        }

        Ok(ValidatedTransaction {
            target: self.target.clone(),
            mode: self.mode,
            snapshot: self.snapshot,
            delta: Balance::new(local_delta, global_delta),
            reason: reason.to_string(),
        })
    }
}

fn parse_amount(field: PointsField, input: &str) -> Result<u64> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| LedgerError::InvalidAmount {
            field,
            input: input.to_string(),
        })
}

/// A transaction that passed every validation rule. Only these can be
/// dispatched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTransaction {
    target: String,
    mode: Mode,
    snapshot: Balance,
    delta: Balance,
    reason: String,
}

impl ValidatedTransaction {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn snapshot(&self) -> Balance {
        self.snapshot
    }

    pub fn delta(&self) -> Balance {
        self.delta
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn new_totals(&self) -> Balance {
        // validation guarantees neither side can overflow or underflow
        match self.mode {
            Mode::Add => Balance::new(
                self.snapshot.local.saturating_add(self.delta.local),
                self.snapshot.global.saturating_add(self.delta.global),
            ),
            Mode::Redeem => Balance::new(
                self.snapshot.local.saturating_sub(self.delta.local),
                self.snapshot.global.saturating_sub(self.delta.global),
            ),
        }
    }

    pub fn into_request(self, session: &Session) -> UpdateRequest {
        let totals = self.new_totals();
        UpdateRequest {
            password: session.shared_secret().to_string(),
            updated_by: session.identity().to_string(),
            user_affected: self.target,
            reason: self.reason,
            new_local: totals.local,
            new_global: totals.global,
        }
    }
}

/// Body of a write sent to the ledger service.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRequest {
    pub password: String,
    pub updated_by: String,
    pub user_affected: String,
    pub reason: String,
    pub new_local: u64,
    pub new_global: u64,
}

impl UpdateRequest {
    pub fn new_totals(&self) -> Balance {
        Balance::new(self.new_local, self.new_global)
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("password", &"<redacted>")
            .field("updated_by", &self.updated_by)
            .field("user_affected", &self.user_affected)
            .field("reason", &self.reason)
            .field("new_local", &self.new_local)
            .field("new_global", &self.new_global)
            .finish()
    }
}
