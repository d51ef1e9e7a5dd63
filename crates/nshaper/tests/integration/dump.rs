//! Enumerating shapers, in one go or in resumable batches.

use nshaper::netlink::genl::shaper::DumpCursor;
use nshaper::shaper::{Handle, Scope, ShaperPatch};

use crate::common::{TestDevice, netdev, queue};

fn handles(shapers: &[nshaper::shaper::ShaperInfo]) -> Vec<Handle> {
    shapers.iter().map(|s| s.handle).collect()
}

#[tokio::test]
async fn test_dump_is_ordered_by_scope_then_id() {
    let env = TestDevice::new();
    env.dev.set(&ShaperPatch::new(queue(9))).await.unwrap();
    env.dev.set(&ShaperPatch::new(queue(1))).await.unwrap();
    let group = env.group_queues(&[4]).await;
    env.dev.set(&ShaperPatch::new(netdev()).bw_max(1)).await.unwrap();

    assert_eq!(
        handles(&env.snapshot()),
        vec![netdev(), queue(1), queue(4), queue(9), group]
    );
}

#[tokio::test]
async fn test_dump_empty_device() {
    let env = TestDevice::new();
    assert!(env.snapshot().is_empty());
    assert!(!env.dev.has_store());
}

#[tokio::test]
async fn test_cursor_walks_in_batches() {
    let env = TestDevice::new();
    for id in 0..10 {
        env.dev.set(&ShaperPatch::new(queue(id))).await.unwrap();
    }

    let mut cursor = DumpCursor::new();
    let mut seen = Vec::new();
    loop {
        let batch = cursor.next_batch(&env.dev, 4).unwrap();
        if batch.is_empty() {
            break;
        }
        assert!(batch.len() <= 4);
        seen.extend(handles(&batch));
    }
    assert_eq!(seen, (0..10).map(queue).collect::<Vec<_>>());
    assert_eq!(cursor.last(), Some(queue(9)));
}

#[tokio::test]
async fn test_cursor_resumes_after_changes() {
    let env = TestDevice::new();
    for id in [0, 2, 4, 6, 8] {
        env.dev.set(&ShaperPatch::new(queue(id))).await.unwrap();
    }

    let mut cursor = DumpCursor::new();
    let first = cursor.next_batch(&env.dev, 2).unwrap();
    assert_eq!(handles(&first), vec![queue(0), queue(2)]);

    // Changes behind the cursor are not seen, changes ahead of it are.
    env.dev.delete(queue(0)).await.unwrap();
    env.dev.set(&ShaperPatch::new(queue(1))).await.unwrap();
    env.dev.delete(queue(4)).await.unwrap();
    env.dev.set(&ShaperPatch::new(queue(5))).await.unwrap();

    let mut rest = Vec::new();
    loop {
        let batch = cursor.next_batch(&env.dev, 2).unwrap();
        if batch.is_empty() {
            break;
        }
        rest.extend(handles(&batch));
    }
    assert_eq!(rest, vec![queue(5), queue(6), queue(8)]);
}

#[tokio::test]
async fn test_cursor_after_removed_handle() {
    let env = TestDevice::new();
    for id in 0..4 {
        env.dev.set(&ShaperPatch::new(queue(id))).await.unwrap();
    }
    env.dev.delete(queue(1)).await.unwrap();

    let mut cursor = DumpCursor::after(queue(1));
    let batch = cursor.next_batch(&env.dev, 10).unwrap();
    assert_eq!(handles(&batch), vec![queue(2), queue(3)]);

    let mut cursor = DumpCursor::after(Handle::new(Scope::Queue, 3));
    assert!(cursor.next_batch(&env.dev, 10).unwrap().is_empty());
}
