// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[cfg(unix)]
fn spawn(script: &str) -> Child {
    Command::new("sh")
        .args(["-c", script])
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn exited_child_keeps_its_status() {
    let mut child = spawn("exit 4");
    // Exited but not yet waited for, as when the peer is busy forwarding.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = exited_or_kill(&mut child, 1).unwrap();
    assert_eq!(status.code(), Some(4));
}

#[cfg(unix)]
#[tokio::test]
async fn running_child_is_killed() {
    let mut child = spawn("sleep 30");
    assert!(exited_or_kill(&mut child, 2).is_none());
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.code(), None);
}
