//! Integration tests for privileged session recovery: dropped connections, stalls and an
//! unreachable directory.

mod common;

use common::FakeDirectory;
use dirgate_core::Error;
use dirgate_directory::{DirectoryGateway, DirectorySession, SessionState, UserLookup};
use std::sync::Arc;
use std::time::Duration;

fn gateway(directory: &FakeDirectory) -> DirectoryGateway {
    DirectoryGateway::with_connector(directory.config(), directory.connector())
}

#[tokio::test]
async fn session_binds_lazily_and_once() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);
    assert_eq!(gateway.session().state().await, SessionState::Unbound);
    assert_eq!(directory.calls().connects, 0);

    gateway.find_user("jdoe", UserLookup::AccountName).await.unwrap();
    gateway.find_computer("PC7").await.unwrap();
    gateway.session().bind().await.unwrap();

    assert_eq!(gateway.session().state().await, SessionState::Bound);
    let calls = directory.calls();
    assert_eq!(calls.connects, 1);
    assert_eq!(calls.binds, vec!["svc-gateway@corp.example.com".to_string()]);
}

#[tokio::test]
async fn concurrent_first_calls_share_one_bind() {
    let directory = FakeDirectory::load();
    let session = Arc::new(DirectorySession::new(
        Arc::new(directory.config()),
        directory.connector(),
    ));

    let (a, b, c) = tokio::join!(session.bind(), session.bind(), session.bind());
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(directory.calls().connects, 1);
}

#[tokio::test]
async fn connection_dropped_while_idle_is_replaced() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);
    gateway.session().bind().await.unwrap();

    directory.sever_connections();
    gateway.session().bind().await.unwrap();
    assert_eq!(directory.calls().connects, 2);

    gateway.unlock_user("jdoe").await.unwrap();
    assert_eq!(gateway.session().state().await, SessionState::Bound);
    assert_eq!(directory.calls().modifies.len(), 1);
    assert_eq!(directory.calls().connects, 2);
}

#[tokio::test]
async fn connection_dropped_while_idle_is_replaced_without_explicit_bind() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);
    gateway.find_computer("PC7").await.unwrap();

    directory.sever_connections();
    gateway.unlock_user("jdoe").await.unwrap();

    let calls = directory.calls();
    assert_eq!(calls.connects, 2);
    assert_eq!(calls.modifies.len(), 1);
}

#[tokio::test]
async fn server_rejection_keeps_connection() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);

    let result = gateway.delete_computer("PC404").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(gateway.session().state().await, SessionState::Bound);

    gateway.find_computer("PC7").await.unwrap();
    assert_eq!(directory.calls().connects, 1);
}

#[tokio::test]
async fn unreachable_directory_surfaces_and_recovers() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);

    directory.set_unreachable(true);
    let result = gateway.find_user("jdoe", UserLookup::AccountName).await;
    assert!(matches!(result, Err(Error::DirectoryUnreachable(_))));
    assert_eq!(gateway.session().state().await, SessionState::Unbound);
    assert!(!gateway.verify("jdoe", "Secret1!").await);

    directory.set_unreachable(false);
    gateway.find_user("jdoe", UserLookup::AccountName).await.unwrap();
    assert!(gateway.verify("jdoe", "Secret1!").await);
}

#[tokio::test(start_paused = true)]
async fn stalled_request_times_out_and_rebinds() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);
    gateway.session().bind().await.unwrap();

    directory.set_hang(true);
    let started = tokio::time::Instant::now();
    let result = gateway.find_computer("PC7").await;
    assert!(matches!(result, Err(Error::DirectoryUnreachable(_))));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(gateway.session().state().await, SessionState::Broken);

    directory.set_hang(false);
    gateway.find_computer("PC7").await.unwrap();
    assert_eq!(gateway.session().state().await, SessionState::Bound);
    assert_eq!(directory.calls().connects, 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);

    directory.set_hang(true);
    let result = gateway.session().bind().await;
    assert!(matches!(result, Err(Error::DirectoryUnreachable(_))));
    assert_eq!(gateway.session().state().await, SessionState::Unbound);
}

#[tokio::test(start_paused = true)]
async fn stalled_verification_is_false() {
    let directory = FakeDirectory::load();
    let gateway = gateway(&directory);

    directory.set_hang(true);
    assert!(!gateway.verify("jdoe", "Secret1!").await);
}

#[tokio::test(start_paused = true)]
async fn slow_connect_within_connection_timeout_succeeds() {
    let directory = FakeDirectory::load();
    let config = directory.config().with_connection_timeout_secs(30);
    let gateway = DirectoryGateway::with_connector(config, directory.connector());

    directory.set_connect_delay(Duration::from_secs(10));
    gateway.session().bind().await.unwrap();
    assert_eq!(gateway.session().state().await, SessionState::Bound);
    assert!(gateway.verify("jdoe", "Secret1!").await);
}

#[tokio::test(start_paused = true)]
async fn connect_beyond_connection_timeout_fails() {
    let directory = FakeDirectory::load();
    let config = directory.config().with_connection_timeout_secs(2);
    let gateway = DirectoryGateway::with_connector(config, directory.connector());

    directory.set_connect_delay(Duration::from_secs(3));
    let result = gateway.session().bind().await;
    assert!(matches!(result, Err(Error::DirectoryUnreachable(_))));
    assert_eq!(gateway.session().state().await, SessionState::Unbound);
    assert!(!gateway.verify("jdoe", "Secret1!").await);
}
