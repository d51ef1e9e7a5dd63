//! Requests racing with a backend call that is still in flight.
//!
//! The store lock is never held across backend calls, so readers and
//! unrelated writers proceed while a call is parked in the gated backend.

use nshaper::ErrorKind;
use nshaper::shaper::{Handle, ShaperPatch, SimOp};

use crate::common::{gated_device, new_detached, queue, queues};

fn handles(shapers: &[nshaper::shaper::ShaperInfo]) -> Vec<Handle> {
    shapers.iter().map(|s| s.handle).collect()
}

#[tokio::test]
async fn test_reads_proceed_during_set() {
    let (dev, gated) = gated_device();
    dev.set(&ShaperPatch::new(queue(0)).bw_max(10)).await.unwrap();

    gated.arm();
    let d = dev.clone();
    let pending = tokio::spawn(async move { d.set(&ShaperPatch::new(queue(5)).bw_max(20)).await });
    gated.wait_entered().await;

    // queue 5 is tentative: held, but invisible.
    assert_eq!(dev.tentative_count(), 1);
    assert_eq!(dev.get(queue(0)).unwrap().bw_max, 10);
    assert!(dev.get(queue(5)).unwrap_err().is_not_found());
    assert_eq!(handles(&dev.shapers().unwrap()), vec![queue(0)]);

    gated.disarm();
    assert_eq!(pending.await.unwrap().unwrap(), queue(5));
    assert_eq!(dev.get(queue(5)).unwrap().bw_max, 20);
    assert_eq!(dev.tentative_count(), 0);
}

#[tokio::test]
async fn test_second_writer_on_tentative_handle_fails() {
    let (dev, gated) = gated_device();

    gated.arm();
    let d = dev.clone();
    let pending = tokio::spawn(async move { d.set(&ShaperPatch::new(queue(3))).await });
    gated.wait_entered().await;

    let err = dev
        .set(&ShaperPatch::new(queue(3)).bw_max(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(gated.sim.calls(SimOp::Set), 0);

    gated.disarm();
    pending.await.unwrap().unwrap();
    assert_eq!(dev.get(queue(3)).unwrap().bw_max, 0);
    assert_eq!(gated.sim.calls(SimOp::Set), 1);
}

#[tokio::test]
async fn test_independent_writers_interleave() {
    let (dev, gated) = gated_device();
    gated.arm();

    let d = dev.clone();
    let first = tokio::spawn(async move {
        d.group(&queues(&[0, 1]), &ShaperPatch::new(new_detached()))
            .await
    });
    gated.wait_entered().await;

    let d = dev.clone();
    let second = tokio::spawn(async move {
        d.group(&queues(&[2]), &ShaperPatch::new(new_detached()))
            .await
    });
    gated.wait_entered().await;

    // Both outputs hold a detached id while in flight.
    assert_eq!(dev.detached_ids_in_use(), 2);
    assert_eq!(dev.tentative_count(), 5);
    assert!(dev.shapers().unwrap().is_empty());

    gated.release(2);
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_ne!(a, b);
    assert_eq!(dev.get(a).unwrap().children, 2);
    assert_eq!(dev.get(b).unwrap().children, 1);
    assert_eq!(dev.tentative_count(), 0);
}

#[tokio::test]
async fn test_failure_in_flight_rolls_back() {
    let (dev, gated) = gated_device();
    gated
        .sim
        .fail_next(SimOp::Group, nshaper::Error::backend(libc::EBUSY, "busy"));
    gated.arm();

    let d = dev.clone();
    let pending = tokio::spawn(async move {
        d.group(&queues(&[4]), &ShaperPatch::new(new_detached()))
            .await
    });
    gated.wait_entered().await;
    assert_eq!(dev.detached_ids_in_use(), 1);

    gated.release(1);
    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.errno(), libc::EBUSY);
    assert_eq!(dev.detached_ids_in_use(), 0);
    assert_eq!(dev.tentative_count(), 0);
    assert!(dev.shapers().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_writer_on_committed_shaper_fails() {
    let (dev, gated) = gated_device();
    dev.set(&ShaperPatch::new(queue(0)).bw_max(10)).await.unwrap();

    gated.arm();
    let d = dev.clone();
    let first = tokio::spawn(async move { d.set(&ShaperPatch::new(queue(0)).bw_max(20)).await });
    gated.wait_entered().await;

    // Still readable while held.
    assert_eq!(dev.get(queue(0)).unwrap().bw_max, 10);
    assert_eq!(dev.held_count(), 1);
    assert_eq!(dev.tentative_count(), 0);

    let err = dev
        .set(&ShaperPatch::new(queue(0)).weight(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    let err = dev.delete(queue(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    gated.disarm();
    first.await.unwrap().unwrap();
    assert_eq!(dev.held_count(), 0);

    // A retry builds on the committed update.
    dev.set(&ShaperPatch::new(queue(0)).weight(5)).await.unwrap();
    let shaper = dev.get(queue(0)).unwrap();
    assert_eq!(shaper.bw_max, 20);
    assert_eq!(shaper.weight, 5);
}

#[tokio::test]
async fn test_racing_groups_count_input_once() {
    let (dev, gated) = gated_device();
    dev.set(&ShaperPatch::new(queue(0))).await.unwrap();

    gated.arm();
    let d = dev.clone();
    let first = tokio::spawn(async move {
        d.group(&queues(&[0]), &ShaperPatch::new(new_detached()))
            .await
    });
    gated.wait_entered().await;

    let err = dev
        .group(&queues(&[0]), &ShaperPatch::new(new_detached()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(dev.detached_ids_in_use(), 1);

    gated.disarm();
    let out = first.await.unwrap().unwrap();
    assert_eq!(dev.get(out).unwrap().children, 1);
    assert_eq!(dev.get(queue(0)).unwrap().parent, out);
    assert_eq!(handles(&dev.shapers().unwrap()), vec![queue(0), out]);
    assert_eq!(dev.held_count(), 0);
}

#[tokio::test]
async fn test_output_in_flight_is_held() {
    let (dev, gated) = gated_device();
    let out = dev
        .group(&queues(&[0]), &ShaperPatch::new(new_detached()))
        .await
        .unwrap();

    gated.arm();
    let d = dev.clone();
    let pending = tokio::spawn(async move { d.group(&queues(&[1]), &ShaperPatch::new(out)).await });
    gated.wait_entered().await;

    // Neither a second group into the output nor a delete under it
    // can slip in while the first group is in flight.
    let err = dev
        .group(&queues(&[2]), &ShaperPatch::new(out))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    let err = dev.delete(out).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(dev.get(queue(2)).unwrap_err().is_not_found());

    gated.disarm();
    assert_eq!(pending.await.unwrap().unwrap(), out);
    assert_eq!(dev.get(out).unwrap().children, 2);
}
