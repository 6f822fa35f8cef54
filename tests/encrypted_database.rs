#![allow(non_snake_case)]

use points_ledger::{
    Balance,
    IdentityPolicy,
    Ledger,
    LedgerError,
    Mode,
    Session,
    UserRecord,
    backend::LedgerBackend,
    config::LedgerSource,
    encrypted::{
        self,
        DatabaseDocument,
        DatabaseUser,
        EncryptedDatabase,
    },
};
use std::fs;
use tempfile::TempDir;

fn database_user(name: &str, local: u64, global: u64) -> DatabaseUser {
    DatabaseUser {
        name: name.to_string(),
        icon: None,
        rewards: None,
        local_rewards: Some(local),
        global_rewards: Some(global),
    }
}

fn sealed_file(passphrase: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");
    let document = DatabaseDocument::new(vec![
        database_user("alice", 10, 5),
        DatabaseUser {
            name: "bob".to_string(),
            icon: Some("robot.png".to_string()),
            rewards: Some(7),
            local_rewards: None,
            global_rewards: None,
        },
    ]);
    fs::write(&path, encrypted::seal(&document, passphrase).unwrap()).unwrap();
    (dir, path)
}

fn session(password: &str) -> Session {
    Session::authenticate(password, None, &IdentityPolicy::default()).unwrap()
}

#[tokio::test]
async fn connect__right_passphrase__loads_sealed_users() {
    // given
    let (_dir, path) = sealed_file("hunter2");

    // when
    let ledger = Ledger::connect(session("hunter2"), EncryptedDatabase::new(&path))
        .await
        .unwrap();

    // then
    assert_eq!(
        ledger.users(),
        &[
            UserRecord::new("alice", 10, 5),
            UserRecord::new("bob", 7, 0).with_icon("robot.png"),
        ]
    );
}

#[tokio::test]
async fn connect__wrong_passphrase__is_incorrect_password() {
    // given
    let (_dir, path) = sealed_file("hunter2");

    // when
    let result = Ledger::connect(session("hunter3"), EncryptedDatabase::new(&path)).await;

    // then
    assert!(matches!(result, Err(LedgerError::IncorrectPassword)));
}

#[tokio::test]
async fn connect__missing_file__is_load_error() {
    // given
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");

    // when
    let result = Ledger::connect(session("hunter2"), EncryptedDatabase::new(path)).await;

    // then
    assert!(matches!(result, Err(LedgerError::Load(_))));
}

#[tokio::test]
async fn connect__plaintext_file__is_incorrect_password() {
    // given
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.json");
    fs::write(&path, r#"{"users": []}"#).unwrap();

    // when
    let result = Ledger::connect(session("hunter2"), EncryptedDatabase::new(path)).await;

    // then
    assert!(matches!(result, Err(LedgerError::IncorrectPassword)));
}

#[tokio::test]
async fn submit__read_only_database__updates_session_but_not_file() {
    // given
    let (_dir, path) = sealed_file("hunter2");
    let sealed_before = fs::read_to_string(&path).unwrap();
    let backend = LedgerBackend::from_source(&LedgerSource::EncryptedFile { path: path.clone() })
        .unwrap();
    assert!(backend.is_read_only());
    let mut ledger = Ledger::connect(session("hunter2"), backend).await.unwrap();
    let pending = ledger
        .open("bob", Mode::Redeem)
        .unwrap()
        .with_amounts("2", "0")
        .with_reason("snack");

    // when
    let totals = ledger.submit(&pending).await.unwrap();

    // then
    assert_eq!(totals, Balance::new(5, 0));
    assert_eq!(ledger.lookup("bob").unwrap().points, Balance::new(5, 0));
    assert_eq!(fs::read_to_string(&path).unwrap(), sealed_before);

    // a fresh load reads the untouched file again
    ledger.load().await.unwrap();
    assert_eq!(ledger.lookup("bob").unwrap().points, Balance::new(7, 0));
}
