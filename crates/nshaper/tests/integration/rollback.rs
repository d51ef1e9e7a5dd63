//! Backend failures must leave the cache exactly as it was.

use nshaper::shaper::{ShaperPatch, SimConfig, SimOp};
use nshaper::{Error, ErrorKind};

use crate::common::{TestDevice, new_detached, queue, queues};

fn injected() -> Error {
    Error::backend(libc::EIO, "injected failure")
}

#[tokio::test]
async fn test_failed_set_of_new_shaper() {
    let env = TestDevice::new();
    env.dev.set(&ShaperPatch::new(queue(0)).bw_max(5)).await.unwrap();
    let before = env.snapshot();

    env.sim.fail_next(SimOp::Set, injected());
    let err = env
        .dev
        .set(&ShaperPatch::new(queue(1)).bw_max(10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);
    assert_eq!(err.errno(), libc::EIO);

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.tentative_count(), 0);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_failed_set_of_existing_shaper() {
    let env = TestDevice::new();
    env.dev
        .set(&ShaperPatch::new(queue(3)).bw_max(5).weight(1))
        .await
        .unwrap();
    let before = env.snapshot();

    env.sim.fail_next(SimOp::Set, injected());
    env.dev
        .set(&ShaperPatch::new(queue(3)).bw_max(99))
        .await
        .unwrap_err();

    assert_eq!(env.snapshot(), before);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_failed_group_releases_everything() {
    let env = TestDevice::new();
    let existing = env.group_queues(&[0]).await;
    let before = env.snapshot();

    env.sim.fail_next(SimOp::Group, injected());
    env.dev
        .group(&queues(&[1, 2, 3]), &ShaperPatch::new(new_detached()))
        .await
        .unwrap_err();

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.detached_ids_in_use(), 1);
    assert_eq!(env.dev.tentative_count(), 0);

    // The id that was handed out and rolled back is available again.
    let next = env.group_queues(&[1]).await;
    assert_ne!(next, existing);
    assert_eq!(env.dev.detached_ids_in_use(), 2);
}

#[tokio::test]
async fn test_failed_regroup_keeps_counts() {
    let env = TestDevice::new();
    let a = env.group_queues(&[0, 1]).await;
    let b = env.group_queues(&[2]).await;
    let before = env.snapshot();

    env.sim.fail_next(SimOp::Group, injected());
    env.dev
        .group(&queues(&[1]), &ShaperPatch::new(b))
        .await
        .unwrap_err();

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.get(a).unwrap().children, 2);
    assert_eq!(env.dev.get(b).unwrap().children, 1);
}

#[tokio::test]
async fn test_failed_delete_keeps_shaper() {
    let env = TestDevice::new();
    let group = env.group_queues(&[0]).await;
    let before = env.snapshot();

    env.sim.fail_next(SimOp::Delete, injected());
    env.dev.delete(queue(0)).await.unwrap_err();

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.get(group).unwrap().children, 1);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_queue_out_of_range_is_rolled_back() {
    let env = TestDevice::with_config(SimConfig::new().queues(2));
    let err = env
        .dev
        .group(&queues(&[0, 5]), &ShaperPatch::new(new_detached()))
        .await
        .unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
    assert!(env.snapshot().is_empty());
    assert_eq!(env.dev.detached_ids_in_use(), 0);
}

#[tokio::test]
async fn test_store_capacity() {
    let mut config = SimConfig::new();
    config.max_shapers = Some(2);
    let env = TestDevice::with_config(config);

    env.dev.set(&ShaperPatch::new(queue(0))).await.unwrap();
    env.dev.set(&ShaperPatch::new(queue(1))).await.unwrap();
    let err = env.dev.set(&ShaperPatch::new(queue(2))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);

    // Updating a cached shaper needs no new entry.
    env.dev.set(&ShaperPatch::new(queue(1)).bw_max(3)).await.unwrap();
    assert_eq!(env.snapshot().len(), 2);
}
