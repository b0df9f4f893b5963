use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::test_client_set;
use crate::test_utils::FakeConsul;
use crate::test_utils::FakeVault;
use crate::Dependency;
use crate::KvVersion;

#[test]
fn test_new_rejects_empty_path() {
    assert!(VaultListQuery::new("").is_err());
    assert!(VaultListQuery::new("/").is_err());
}

#[test]
fn test_new_keeps_plain_path() {
    let d = VaultListQuery::new("path").unwrap();
    assert_eq!(d.path(), "path");
}

#[test]
fn test_new_strips_leading_slash() {
    let d = VaultListQuery::new("/leading/slash").unwrap();
    assert_eq!(d.path(), "leading/slash");
}

#[test]
fn test_new_strips_trailing_slash() {
    let d = VaultListQuery::new("trailing/slash/").unwrap();
    assert_eq!(d.path(), "trailing/slash");
}

#[test]
fn test_display_form() {
    let d = VaultListQuery::new("path").unwrap();
    assert_eq!(d.to_string(), "vault.list(path)");
}

/// Value-equal descriptors constructed independently must share an identity.
#[test]
fn test_equal_arguments_yield_equal_fingerprints() {
    let a = VaultListQuery::new("/secret/foo/").unwrap();
    let b = VaultListQuery::new("secret/foo").unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[tokio::test]
async fn test_fetch_lists_parent_of_nested_secret() {
    enable_logger();
    let vault = FakeVault::new("listfetch", KvVersion::V1);
    vault.create_secret("foo/bar", &[("ttl", "100ms"), ("zip", "zap")]);
    let clients = test_client_set(vault, FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("listfetch").unwrap();
    let fetched = d
        .fetch(&clients, &QueryOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(
        fetched.value,
        DependencyValue::Entries(vec!["foo/".to_string()])
    );
}

/// "not found" on a list path is a valid empty result, not an error.
#[tokio::test]
async fn test_fetch_missing_path_returns_empty_listing() {
    let vault = FakeVault::new("listfetch", KvVersion::V1);
    vault.create_secret("foo/bar", &[("zip", "zap")]);
    let clients = test_client_set(vault, FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("not/a/real/path/like/ever").unwrap();
    let fetched = d
        .fetch(&clients, &QueryOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(fetched.value, DependencyValue::Entries(vec![]));
}

#[tokio::test]
async fn test_fetch_lists_through_kv_v2_rewrite() {
    let vault = FakeVault::new("listfetchV2", KvVersion::V2);
    vault.create_secret("foo/bar", &[("ttl", "100ms"), ("zip", "zap")]);
    let clients = test_client_set(vault, FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("listfetchV2").unwrap();
    let fetched = d
        .fetch(&clients, &QueryOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(
        fetched.value,
        DependencyValue::Entries(vec!["foo/".to_string()])
    );
}

#[tokio::test]
async fn test_fetch_missing_path_on_kv_v2_returns_empty_listing() {
    let vault = FakeVault::new("listfetchV2", KvVersion::V2);
    vault.create_secret("foo/bar", &[("zip", "zap")]);
    let clients = test_client_set(vault, FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("not/a/real/path/like/ever").unwrap();
    let fetched = d
        .fetch(&clients, &QueryOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(fetched.value, DependencyValue::Entries(vec![]));
}

#[tokio::test]
async fn test_fetch_stops_promptly_when_cancelled() {
    enable_logger();
    let vault = FakeVault::new("secret", KvVersion::V1);
    vault.create_secret("foo/bar", &[("zip", "zap")]);
    let clients = test_client_set(vault, FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("secret/foo").unwrap();

    let (data_tx, mut data_rx) = tokio::sync::mpsc::channel(1);
    let (err_tx, mut err_rx) = tokio::sync::mpsc::channel(1);
    let task_cancel = cancel.clone();
    let task_clients = clients.clone();
    tokio::spawn(async move {
        let mut wait_index = None;
        loop {
            let opts = QueryOptions {
                wait_index,
                wait_time: Some(Duration::from_secs(60)),
            };
            match d.fetch(&task_clients, &opts, &task_cancel).await {
                Ok(fetched) => {
                    wait_index = Some(fetched.meta.last_index);
                    let _ = data_tx.send(fetched).await;
                }
                Err(err) => {
                    let _ = err_tx.send(err).await;
                    return;
                }
            }
        }
    });

    // first round trip completes normally
    tokio::time::timeout(Duration::from_secs(1), data_rx.recv())
        .await
        .expect("first fetch should complete")
        .unwrap();

    // the second fetch is blocked in the long poll now; stop must interrupt
    // it well before the backend's own wait elapses
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_millis(100), err_rx.recv())
        .await
        .expect("did not stop")
        .unwrap();
    assert!(err.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_with_wait_index_blocks_until_change() {
    let vault = FakeVault::new("secret", KvVersion::V1);
    vault.create_secret("foo/bar", &[("zip", "zap")]);
    let clients = test_client_set(vault.clone(), FakeConsul::new());
    let cancel = CancellationToken::new();

    let d = VaultListQuery::new("secret").unwrap();
    let first = d
        .fetch(&clients, &QueryOptions::default(), &cancel)
        .await
        .unwrap();

    // nothing changes: the blocking call only returns once the deadline cuts
    // it off
    let opts = QueryOptions {
        wait_index: Some(first.meta.last_index),
        wait_time: Some(Duration::from_secs(60)),
    };
    let timed_out = fetch_with_deadline(&d, &clients, &opts, &cancel, Duration::from_secs(1)).await;
    assert!(matches!(timed_out, Err(DependencyError::Timeout(_))));

    // a write wakes the blocked poll with a strictly greater index
    let blocked = {
        let d = d.clone();
        let clients = clients.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { d.fetch(&clients, &opts, &cancel).await })
    };
    tokio::task::yield_now().await;

    vault.create_secret("foo/baz", &[("zip", "zap")]);

    let fetched = tokio::time::timeout(Duration::from_secs(5), blocked)
        .await
        .expect("blocked fetch should wake")
        .unwrap()
        .unwrap();
    assert!(fetched.meta.last_index > first.meta.last_index);
    assert_eq!(
        fetched.value,
        DependencyValue::Entries(vec!["foo/".to_string()])
    );
}
