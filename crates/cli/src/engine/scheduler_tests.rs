// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use cs_core::RelPath;

fn scheduler(dependencies: &[Vec<usize>]) -> Scheduler {
    let labels = (0..dependencies.len())
        .map(|i| ("create-dir", RelPath::new(format!("d{}", i)).unwrap()))
        .collect();
    Scheduler::new(dependencies, labels)
}

fn run(scheduler: &Scheduler) -> usize {
    match scheduler.next() {
        Next::Run(op) => op,
        other => panic!("expected an operation, got {:?}", other),
    }
}

#[test]
fn empty_plan_is_done() {
    let scheduler = scheduler(&[]);
    assert_eq!(scheduler.next(), Next::Done);
    assert!(scheduler.into_outcomes(|| SyncError::NoSession).is_empty());
}

#[test]
fn independent_ops_are_handed_out_in_order() {
    let scheduler = scheduler(&[vec![], vec![], vec![]]);
    assert_eq!(run(&scheduler), 0);
    assert_eq!(run(&scheduler), 1);
    assert_eq!(run(&scheduler), 2);
    // All three are running: nothing left to hand out, but not done.
    assert_eq!(scheduler.next(), Next::Wait);
    for op in 0..3 {
        scheduler.complete(op, Ok(0));
    }
    assert_eq!(scheduler.next(), Next::Done);
}

#[test]
fn dependents_wait_for_their_dependencies() {
    // dir, then a file inside it.
    let scheduler = scheduler(&[vec![], vec![0]]);
    assert_eq!(run(&scheduler), 0);
    assert_eq!(scheduler.next(), Next::Wait);
    scheduler.complete(0, Ok(0));
    assert_eq!(run(&scheduler), 1);
    scheduler.complete(1, Ok(5));

    let outcomes = scheduler.into_outcomes(|| SyncError::NoSession);
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[1], Ok(5)));
}

#[test]
fn op_with_several_dependencies_waits_for_all() {
    let scheduler = scheduler(&[vec![], vec![], vec![0, 1]]);
    assert_eq!(run(&scheduler), 0);
    assert_eq!(run(&scheduler), 1);
    scheduler.complete(1, Ok(0));
    assert_eq!(scheduler.next(), Next::Wait);
    scheduler.complete(0, Ok(0));
    assert_eq!(run(&scheduler), 2);
}

#[test]
fn failure_blocks_dependents_transitively() {
    // 0 <- 1 <- 2, and 3 is independent.
    let scheduler = scheduler(&[vec![], vec![0], vec![1], vec![]]);
    assert_eq!(run(&scheduler), 0);
    assert_eq!(run(&scheduler), 3);
    scheduler.complete(
        0,
        Err(SyncError::PreconditionFailed {
            reason: "changed".to_string(),
        }),
    );
    scheduler.complete(3, Ok(0));
    // 1 and 2 are resolved as blocked without being handed out.
    assert_eq!(scheduler.next(), Next::Done);

    let outcomes = scheduler.into_outcomes(|| SyncError::NoSession);
    assert!(matches!(outcomes[0], Err(SyncError::PreconditionFailed { .. })));
    match &outcomes[1] {
        Err(SyncError::Blocked { path, action }) => {
            assert_eq!(path.as_str(), "d0");
            assert_eq!(*action, "create-dir");
        }
        other => panic!("unexpected {:?}", other),
    }
    // The chain keeps naming its own failed dependency.
    assert!(matches!(&outcomes[2], Err(SyncError::Blocked { path, .. }) if path.as_str() == "d1"));
    assert!(outcomes[3].is_ok());
}

#[test]
fn unfinished_ops_get_the_interruption_error() {
    let scheduler = scheduler(&[vec![], vec![0]]);
    assert_eq!(run(&scheduler), 0);
    let outcomes = scheduler.into_outcomes(|| SyncError::Cancelled);
    assert!(matches!(outcomes[0], Err(SyncError::Cancelled)));
    assert!(matches!(outcomes[1], Err(SyncError::Cancelled)));
}

#[tokio::test]
async fn completion_wakes_waiters() {
    let scheduler = std::sync::Arc::new(scheduler(&[vec![], vec![0]]));
    assert_eq!(run(&scheduler), 0);

    let waiter = {
        let scheduler = std::sync::Arc::clone(&scheduler);
        tokio::spawn(async move {
            loop {
                let changed = scheduler.notify().notified();
                match scheduler.next() {
                    Next::Run(op) => return op,
                    Next::Wait => changed.await,
                    Next::Done => panic!("finished without running op 1"),
                }
            }
        })
    };
    tokio::task::yield_now().await;
    scheduler.complete(0, Ok(0));
    assert_eq!(waiter.await.unwrap(), 1);
}
