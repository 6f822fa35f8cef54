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
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
};

/// In-memory stand-in for the points service. Clones share state, so a test
/// can keep one handle while a `Ledger` owns another.
#[derive(Clone, Default)]
pub struct FakeLedgerService {
    state: Arc<Mutex<FakeState>>,
    requests: Arc<Mutex<Vec<UpdateRequest>>>,
}

#[derive(Default)]
struct FakeState {
    users: Vec<UserRecord>,
    load_failures: VecDeque<LedgerError>,
    write_rejections: VecDeque<String>,
}

impl FakeLedgerService {
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        let service = Self::default();
        service.set_users(users);
        service
    }

    pub fn failing_load(err: LedgerError) -> Self {
        let service = Self::default();
        service.fail_next_load(err);
        service
    }

    pub fn set_users(&self, users: Vec<UserRecord>) {
        self.state.lock().unwrap().users = users;
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn fail_next_load(&self, err: LedgerError) {
        self.state.lock().unwrap().load_failures.push_back(err);
    }

    pub fn reject_next_write(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .write_rejections
            .push_back(message.into());
    }

    /// Every write request received, accepted or not.
    pub fn requests(&self) -> Arc<Mutex<Vec<UpdateRequest>>> {
        self.requests.clone()
    }
}

impl LedgerService for FakeLedgerService {
    async fn fetch_users(&self, _session: &Session) -> Result<Vec<UserRecord>> {
        let mut state = self.state.lock().unwrap();
        match state.load_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state.users.clone()),
        }
    }

    async fn submit_update(&self, request: &UpdateRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.write_rejections.pop_front() {
            return Err(LedgerError::WriteFailed(message));
        }
        if let Some(user) = state
            .users
            .iter_mut()
            .find(|user| user.username == request.user_affected)
        {
            user.points = request.new_totals();
        }
        Ok(())
    }
}
