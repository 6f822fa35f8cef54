use crate::{
    activity::{
        ActivityLog,
        ChangeRecord,
    },
    error::{
        LedgerError,
        Result,
    },
    model::{
        Balance,
        UserRecord,
    },
    session::Session,
    transaction::{
        Mode,
        PendingTransaction,
        UpdateRequest,
        ValidatedTransaction,
    },
};
use std::collections::HashSet;
use tracing::{
    debug,
    info,
    warn,
};

/// The collaborator that owns the authoritative points.
pub trait LedgerService {
    /// fetch the current user list, in display order
    fn fetch_users(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<UserRecord>>>;

    /// `Ok` only when the service confirmed the write
    fn submit_update(&self, request: &UpdateRequest) -> impl Future<Output = Result<()>>;
}

/// In-memory mirror of the service's user list.
#[derive(Clone, Debug, Default)]
pub struct LedgerCache {
    users: Vec<UserRecord>,
}

impl LedgerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly loaded list. Nothing from the previous list survives.
    pub fn replace(&mut self, users: Vec<UserRecord>) -> Result<()> {
        let mut seen = HashSet::new();
        for user in &users {
            if !seen.insert(user.username.as_str()) {
                return Err(LedgerError::Load(format!(
                    "duplicate user '{}' in payload",
                    user.username
                )));
            }
        }
        self.users = users;
        Ok(())
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn lookup(&self, username: &str) -> Result<&UserRecord> {
        self.users
            .iter()
            .find(|user| user.username == username)
            .ok_or_else(|| LedgerError::UnknownUser(username.to_string()))
    }

    /// Returns `false` when the user is not cached; records are not expected
    /// to vanish mid-session so that case is a no-op.
    pub(crate) fn apply_confirmed_write(
        &mut self,
        username: &str,
        new_totals: Balance,
    ) -> bool {
        match self.users.iter_mut().find(|user| user.username == username) {
            Some(user) => {
                user.points = new_totals;
                true
            }
            None => false,
        }
    }
}

/// A live session: identity, cached users and the service they sync with.
pub struct Ledger<S> {
    session: Session,
    cache: LedgerCache,
    service: S,
    activity: ActivityLog,
}

impl<S: LedgerService> Ledger<S> {
    /// Performs the initial load. A ledger only exists once that load worked,
    /// which is also how the password gets verified.
    pub async fn connect(session: Session, service: S) -> Result<Self> {
        let mut ledger = Self {
            session,
            cache: LedgerCache::new(),
            service,
            activity: ActivityLog::default(),
        };
        ledger.load().await?;
        Ok(ledger)
    }

    pub async fn load(&mut self) -> Result<&[UserRecord]> {
        let users = self.service.fetch_users(&self.session).await?;
        self.cache.replace(users)?;
        info!(users = self.cache.users().len(), "ledger loaded");
        Ok(self.cache.users())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn users(&self) -> &[UserRecord] {
        self.cache.users()
    }

    pub fn lookup(&self, username: &str) -> Result<&UserRecord> {
        self.cache.lookup(username)
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn open(&self, username: &str, mode: Mode) -> Result<PendingTransaction> {
        let user = self.cache.lookup(username)?;
        Ok(PendingTransaction::new(
            user.username.clone(),
            mode,
            user.points,
        ))
    }

    pub async fn submit(&mut self, pending: &PendingTransaction) -> Result<Balance> {
        let validated = pending.validate()?;
        self.dispatch(validated).await
    }

    /// Send a validated transaction. The cache only changes after the service
    /// confirms; on any failure it is left exactly as it was.
    pub async fn dispatch(&mut self, transaction: ValidatedTransaction) -> Result<Balance> {
        let current = self.cache.lookup(transaction.target())?.points;
        if current != transaction.snapshot() {
            return Err(LedgerError::StaleSnapshot { current });
        }

        let mode = transaction.mode();
        let before = transaction.snapshot();
        let request = transaction.into_request(&self.session);
        debug!(?request, "submitting points update");

        if let Err(err) = self.service.submit_update(&request).await {
            warn!(
                user_affected = %request.user_affected,
                error = %err,
                "points update rejected"
            );
            return Err(match err {
                LedgerError::WriteFailed(message) => LedgerError::WriteFailed(message),
                other => LedgerError::WriteFailed(other.to_string()),
            });
        }

        let after = request.new_totals();
        if !self
            .cache
            .apply_confirmed_write(&request.user_affected, after)
        {
            debug!(user_affected = %request.user_affected, "confirmed user is not cached");
        }
        info!(
            updated_by = %request.updated_by,
            user_affected = %request.user_affected,
            mode = %mode,
            reason = %request.reason,
            new_local = after.local,
            new_global = after.global,
            "points updated"
        );
        self.activity.push(ChangeRecord {
            at: chrono::Utc::now(),
            updated_by: request.updated_by,
            user_affected: request.user_affected,
            mode,
            reason: request.reason,
            before,
            after,
        });
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        session::IdentityPolicy,
        test_helpers::FakeLedgerService,
    };

    fn session() -> Session {
        Session::authenticate("pw", None, &IdentityPolicy::default()).unwrap()
    }

    fn users() -> Vec<UserRecord> {
        vec![
            UserRecord::new("alice", 10, 5),
            UserRecord::new("bob", 2, 0),
        ]
    }

    #[test]
    fn replace__duplicate_usernames__is_load_error_and_keeps_previous() {
        // given
        let mut cache = LedgerCache::new();
        cache.replace(users()).unwrap();
        let duplicated = vec![UserRecord::new("x", 1, 1), UserRecord::new("x", 2, 2)];

        // when
        let result = cache.replace(duplicated);

        // then
        assert!(matches!(result, Err(LedgerError::Load(_))));
        assert_eq!(cache.users(), users().as_slice());
    }

    #[test]
    fn apply_confirmed_write__unknown_user__is_noop() {
        // given
        let mut cache = LedgerCache::new();
        cache.replace(users()).unwrap();

        // when
        let applied = cache.apply_confirmed_write("carol", Balance::new(1, 1));

        // then
        assert!(!applied);
        assert_eq!(cache.users(), users().as_slice());
    }

    #[tokio::test]
    async fn connect__failed_initial_load__yields_no_ledger() {
        // given
        let service = FakeLedgerService::failing_load(LedgerError::IncorrectPassword);

        // when
        let result = Ledger::connect(session(), service).await;

        // then
        assert!(matches!(result, Err(LedgerError::IncorrectPassword)));
    }

    #[tokio::test]
    async fn open__unknown_user__is_unknown_user() {
        // given
        let ledger = Ledger::connect(session(), FakeLedgerService::with_users(users()))
            .await
            .unwrap();

        // when
        let result = ledger.open("carol", Mode::Add);

        // then
        assert_eq!(result, Err(LedgerError::UnknownUser("carol".to_string())));
    }

    #[tokio::test]
    async fn submit__confirmed_add__updates_only_the_target() {
        // given
        let service = FakeLedgerService::with_users(users());
        let requests = service.requests();
        let mut ledger = Ledger::connect(session(), service).await.unwrap();
        let pending = ledger
            .open("alice", Mode::Add)
            .unwrap()
            .with_amounts("3", "0")
            .with_reason("bonus");

        // when
        let totals = ledger.submit(&pending).await.unwrap();

        // then
        assert_eq!(totals, Balance::new(13, 5));
        assert_eq!(ledger.lookup("alice").unwrap().total_points(), 18);
        assert_eq!(ledger.lookup("bob").unwrap().points, Balance::new(2, 0));
        let sent = requests.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].updated_by, "rose");
        assert_eq!(sent[0].password, "pw");
        assert_eq!(ledger.activity().len(), 1);
    }

    #[tokio::test]
    async fn submit__rejected_write__leaves_cache_untouched() {
        // given
        let service = FakeLedgerService::with_users(users());
        service.reject_next_write("Incorrect password");
        let mut ledger = Ledger::connect(session(), service).await.unwrap();
        let before = ledger.users().to_vec();
        let pending = ledger
            .open("bob", Mode::Redeem)
            .unwrap()
            .with_amounts("1", "0")
            .with_reason("sticker");

        // when
        let result = ledger.submit(&pending).await;

        // then
        assert_eq!(
            result,
            Err(LedgerError::WriteFailed("Incorrect password".to_string()))
        );
        assert_eq!(ledger.users(), before.as_slice());
        assert!(ledger.activity().is_empty());
    }

    #[tokio::test]
    async fn submit__insufficient_balance__never_reaches_the_service() {
        // given
        let service = FakeLedgerService::with_users(users());
        let requests = service.requests();
        let mut ledger = Ledger::connect(session(), service).await.unwrap();
        let pending = ledger
            .open("bob", Mode::Redeem)
            .unwrap()
            .with_amounts("5", "0")
            .with_reason("prize");

        // when
        let result = ledger.submit(&pending).await;

        // then
        assert_eq!(
            result,
            Err(LedgerError::InsufficientBalance {
                local: 2,
                global: 0
            })
        );
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch__snapshot_changed_by_earlier_write__is_stale() {
        // given
        let service = FakeLedgerService::with_users(users());
        let requests = service.requests();
        let mut ledger = Ledger::connect(session(), service).await.unwrap();
        let first = ledger
            .open("alice", Mode::Redeem)
            .unwrap()
            .with_amounts("10", "0")
            .with_reason("first");
        let second = ledger
            .open("alice", Mode::Redeem)
            .unwrap()
            .with_amounts("10", "0")
            .with_reason("second");
        ledger.submit(&first).await.unwrap();

        // when
        let result = ledger.submit(&second).await;

        // then
        assert_eq!(
            result,
            Err(LedgerError::StaleSnapshot {
                current: Balance::new(0, 5)
            })
        );
        assert_eq!(requests.lock().unwrap().len(), 1);
        assert_eq!(ledger.lookup("alice").unwrap().points, Balance::new(0, 5));
    }

    #[tokio::test]
    async fn load__replaces_cache_wholesale() {
        // given
        let service = FakeLedgerService::with_users(users());
        let mut ledger = Ledger::connect(session(), service.clone()).await.unwrap();
        service.set_users(vec![UserRecord::new("carol", 7, 7)]);

        // when
        ledger.load().await.unwrap();

        // then
        assert_eq!(ledger.users(), &[UserRecord::new("carol", 7, 7)]);
        assert!(ledger.lookup("alice").is_err());
    }

    #[tokio::test]
    async fn load__failure__keeps_previous_cache() {
        // given
        let service = FakeLedgerService::with_users(users());
        let mut ledger = Ledger::connect(session(), service.clone()).await.unwrap();
        service.fail_next_load(LedgerError::Load("offline".to_string()));

        // when
        let result = ledger.load().await.map(|users| users.len());

        // then
        assert_eq!(result, Err(LedgerError::Load("offline".to_string())));
        assert_eq!(ledger.users(), users().as_slice());
    }
}
