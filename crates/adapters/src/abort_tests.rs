// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn cancelled_resolves_after_abort() {
    let handle = AbortHandle::new();
    let signal = handle.signal();
    let waiter = tokio::spawn(async move { signal.cancelled().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.abort();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn cancelled_resolves_immediately_when_already_aborted() {
    let handle = AbortHandle::new();
    handle.abort();
    let signal = handle.signal();
    tokio::time::timeout(Duration::from_millis(50), signal.cancelled())
        .await
        .unwrap();
}

#[test]
fn abort_is_idempotent_and_visible_to_all_signals() {
    let handle = AbortHandle::new();
    let a = handle.signal();
    let b = handle.signal();
    assert!(!a.is_aborted());
    handle.abort();
    handle.abort();
    assert!(a.is_aborted());
    assert!(b.is_aborted());
    assert!(handle.is_aborted());
}

#[tokio::test]
async fn never_signal_does_not_fire() {
    let signal = AbortSignal::never();
    let result =
        tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
    assert!(result.is_err(), "never() signal must not resolve");
}
