//! Deleting shapers and cascading through empty detached parents.

use nshaper::ErrorKind;
use nshaper::shaper::{ShaperPatch, SimOp};

use crate::common::{TestDevice, new_detached, queue, queues};

#[tokio::test]
async fn test_delete_queue() {
    let env = TestDevice::new();
    env.dev.set(&ShaperPatch::new(queue(1)).bw_max(10)).await.unwrap();
    env.dev.set(&ShaperPatch::new(queue(2)).bw_max(20)).await.unwrap();

    env.dev.delete(queue(1)).await.unwrap();
    assert!(env.dev.get(queue(1)).unwrap_err().is_not_found());
    assert_eq!(env.dev.get(queue(2)).unwrap().bw_max, 20);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_delete_missing() {
    let env = TestDevice::new();
    let err = env.dev.delete(queue(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(env.sim.calls(SimOp::Delete), 0);
}

#[tokio::test]
async fn test_delete_with_children_changes_nothing() {
    let env = TestDevice::new();
    let group = env.group_queues(&[0, 1]).await;
    let before = env.snapshot();

    let err = env.dev.delete(group).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HasChildren);
    assert_eq!(err.errno(), libc::EINVAL);

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.sim.calls(SimOp::Delete), 0);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_delete_last_child_removes_group() {
    let env = TestDevice::new();
    let group = env.group_queues(&[0, 1]).await;

    env.dev.delete(queue(0)).await.unwrap();
    assert_eq!(env.dev.get(group).unwrap().children, 1);

    env.dev.delete(queue(1)).await.unwrap();
    assert!(env.dev.get(group).unwrap_err().is_not_found());
    assert_eq!(env.dev.detached_ids_in_use(), 0);
    assert!(env.snapshot().is_empty());
    assert!(env.sim.hw_shapers().is_empty());
}

#[tokio::test]
async fn test_delete_cascades_multiple_levels() {
    let env = TestDevice::new();
    let leaf = env.group_queues(&[2]).await;
    let mid = env
        .dev
        .group(&[ShaperPatch::new(leaf)], &ShaperPatch::new(new_detached()))
        .await
        .unwrap();
    let top = env
        .dev
        .group(&[ShaperPatch::new(mid)], &ShaperPatch::new(new_detached()))
        .await
        .unwrap();
    env.dev.set(&ShaperPatch::new(queue(7)).bw_max(1)).await.unwrap();

    assert_eq!(env.dev.get(top).unwrap().children, 1);
    assert_eq!(env.dev.get(mid).unwrap().parent, top);

    env.dev.delete(queue(2)).await.unwrap();

    for h in [queue(2), leaf, mid, top] {
        assert!(env.dev.get(h).unwrap_err().is_not_found(), "{} survived", h);
    }
    assert_eq!(env.sim.calls(SimOp::Delete), 4);
    assert_eq!(env.dev.detached_ids_in_use(), 0);
    assert_eq!(env.snapshot().len(), 1);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_cascade_stops_at_nonempty_parent() {
    let env = TestDevice::new();
    let top = env.group_queues(&[0]).await;
    let inner = env
        .dev
        .group(&queues(&[1]), &ShaperPatch::new(new_detached()).parent(top))
        .await
        .unwrap();

    env.dev.delete(queue(1)).await.unwrap();
    assert!(env.dev.get(inner).unwrap_err().is_not_found());
    assert_eq!(env.dev.get(top).unwrap().children, 1);
    assert_eq!(env.dev.detached_ids_in_use(), 1);
}

#[tokio::test]
async fn test_cascade_failure_keeps_progress() {
    let env = TestDevice::new();
    let leaf = env.group_queues(&[2]).await;
    let mid = env
        .dev
        .group(&[ShaperPatch::new(leaf)], &ShaperPatch::new(new_detached()))
        .await
        .unwrap();
    let top = env
        .dev
        .group(&[ShaperPatch::new(mid)], &ShaperPatch::new(new_detached()))
        .await
        .unwrap();

    // queue 2 and leaf go, then mid fails.
    env.sim.pass_next(SimOp::Delete);
    env.sim.pass_next(SimOp::Delete);
    env.sim
        .fail_next(SimOp::Delete, nshaper::Error::backend(libc::EIO, "injected failure"));
    let err = env.dev.delete(queue(2)).await.unwrap_err();
    assert_eq!(err.errno(), libc::EIO);
    assert_eq!(env.sim.calls(SimOp::Delete), 3);

    assert!(env.dev.get(queue(2)).unwrap_err().is_not_found());
    assert!(env.dev.get(leaf).unwrap_err().is_not_found());
    assert_eq!(env.dev.get(mid).unwrap().children, 0);
    assert_eq!(env.dev.get(top).unwrap().children, 1);
    assert_eq!(env.dev.detached_ids_in_use(), 2);
    assert_eq!(env.dev.held_count(), 0);
    env.assert_matches_hw();

    // The empty group can be deleted on its own later.
    env.dev.delete(mid).await.unwrap();
    assert!(env.snapshot().is_empty());
    assert_eq!(env.dev.detached_ids_in_use(), 0);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_freed_id_is_reused() {
    let env = TestDevice::new();
    let first = env.group_queues(&[0]).await;
    env.dev.delete(queue(0)).await.unwrap();

    let second = env.group_queues(&[1]).await;
    assert_eq!(second, first);
}
