//! Grouping shapers under a netdev or detached output.

use nshaper::ErrorKind;
use nshaper::shaper::{Handle, Scope, ShaperPatch};

use crate::common::{TestDevice, detached, netdev, new_detached, queue, queues};

#[tokio::test]
async fn test_group_creates_detached_output() {
    let env = TestDevice::new();
    let out = env
        .dev
        .group(&queues(&[2]), &ShaperPatch::new(new_detached()).bw_max(1_000))
        .await
        .unwrap();

    assert_eq!(out.scope(), Scope::Detached);
    assert!(!out.is_id_unspec());

    let output = env.dev.get(out).unwrap();
    assert_eq!(output.children, 1);
    assert_eq!(output.parent, netdev());
    assert_eq!(output.bw_max, 1_000);
    assert_eq!(env.dev.get(queue(2)).unwrap().parent, out);
    assert_eq!(env.dev.detached_ids_in_use(), 1);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_group_ids_are_distinct() {
    let env = TestDevice::new();
    let a = env.group_queues(&[0]).await;
    let b = env.group_queues(&[1]).await;
    let c = env.group_queues(&[2]).await;
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
    assert_eq!(env.dev.detached_ids_in_use(), 3);
}

#[tokio::test]
async fn test_regroup_same_inputs_is_idempotent() {
    let env = TestDevice::new();
    let out = env.group_queues(&[0, 1, 2]).await;
    let before = env.snapshot();

    let again = env
        .dev
        .group(&queues(&[0, 1, 2]), &ShaperPatch::new(out))
        .await
        .unwrap();
    assert_eq!(again, out);
    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.get(out).unwrap().children, 3);
}

#[tokio::test]
async fn test_move_inputs_between_groups() {
    let env = TestDevice::new();
    let a = env.group_queues(&[0, 1, 2]).await;
    let b = env.group_queues(&[3]).await;

    env.dev
        .group(&queues(&[1, 2]), &ShaperPatch::new(b))
        .await
        .unwrap();

    assert_eq!(env.dev.get(a).unwrap().children, 1);
    assert_eq!(env.dev.get(b).unwrap().children, 3);
    assert_eq!(env.dev.get(queue(1)).unwrap().parent, b);
    assert_eq!(env.dev.get(queue(0)).unwrap().parent, a);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_group_under_netdev() {
    let env = TestDevice::new();
    let group = env.group_queues(&[5]).await;

    // A netdev output keeps its port parent, which is refused.
    let err = env
        .dev
        .group(&queues(&[6]), &ShaperPatch::new(netdev()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidScope);

    // Move the queue back from the detached group to the netdev.
    let out = env
        .dev
        .group(&queues(&[5]), &ShaperPatch::new(new_detached()).parent(netdev()))
        .await
        .unwrap();
    assert_eq!(env.dev.get(group).unwrap().children, 0);
    assert_eq!(env.dev.get(queue(5)).unwrap().parent, out);
}

#[tokio::test]
async fn test_nested_detached_groups() {
    let env = TestDevice::new();
    let top = env.group_queues(&[0]).await;
    let inner = env
        .dev
        .group(&queues(&[1, 2]), &ShaperPatch::new(new_detached()).parent(top))
        .await
        .unwrap();

    assert_eq!(env.dev.get(inner).unwrap().parent, top);
    assert_eq!(env.dev.get(top).unwrap().children, 2);
    assert_eq!(env.dev.get(inner).unwrap().children, 2);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_group_detached_input() {
    let env = TestDevice::new();
    let leaf = env.group_queues(&[0]).await;
    let root = env.group_queues(&[1]).await;

    env.dev
        .group(&[ShaperPatch::new(leaf)], &ShaperPatch::new(root))
        .await
        .unwrap();
    assert_eq!(env.dev.get(leaf).unwrap().parent, root);
    assert_eq!(env.dev.get(root).unwrap().children, 2);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_group_rejections_leave_no_trace() {
    let env = TestDevice::new();
    let group = env.group_queues(&[0]).await;
    let before = env.snapshot();

    let cases: Vec<(Vec<ShaperPatch>, ShaperPatch, ErrorKind)> = vec![
        (vec![], ShaperPatch::new(new_detached()), ErrorKind::InvalidRequest),
        (queues(&[1]), ShaperPatch::new(queue(2)), ErrorKind::InvalidScope),
        (
            queues(&[1]),
            ShaperPatch::new(Handle::new(Scope::Port, 0)),
            ErrorKind::InvalidScope,
        ),
        (queues(&[1]), ShaperPatch::new(detached(77)), ErrorKind::InvalidRequest),
        (
            vec![ShaperPatch::new(netdev())],
            ShaperPatch::new(new_detached()),
            ErrorKind::InvalidScope,
        ),
        (
            vec![ShaperPatch::new(detached(9))],
            ShaperPatch::new(new_detached()),
            ErrorKind::InvalidRequest,
        ),
        (queues(&[1, 1]), ShaperPatch::new(new_detached()), ErrorKind::InvalidRequest),
        (
            vec![ShaperPatch::new(group)],
            ShaperPatch::new(group),
            ErrorKind::InvalidRequest,
        ),
        (
            queues(&[1]),
            ShaperPatch::new(group).parent(group),
            ErrorKind::InvalidRequest,
        ),
        (
            queues(&[1]),
            ShaperPatch::new(new_detached()).parent(queue(0)),
            ErrorKind::InvalidScope,
        ),
        (
            queues(&[1]),
            ShaperPatch::new(new_detached()).parent(detached(55)),
            ErrorKind::InvalidRequest,
        ),
    ];

    for (inputs, output, kind) in cases {
        let err = env.dev.group(&inputs, &output).await.unwrap_err();
        assert_eq!(err.kind(), kind, "inputs {:?} output {:?}: {}", inputs, output, err);
    }

    assert_eq!(env.snapshot(), before);
    assert_eq!(env.dev.detached_ids_in_use(), 1);
    assert_eq!(env.dev.tentative_count(), 0);
    env.assert_matches_hw();
}

#[tokio::test]
async fn test_group_rejects_input_parent() {
    let env = TestDevice::new();
    let a = env.group_queues(&[1]).await;
    let b = env.group_queues(&[2]).await;
    let before = env.snapshot();

    let err = env
        .dev
        .group(&[ShaperPatch::new(queue(1)).parent(b)], &ShaperPatch::new(b))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(env.snapshot(), before);

    // Without a parent on the input the move is counted.
    env.dev
        .group(&queues(&[1]), &ShaperPatch::new(b))
        .await
        .unwrap();
    assert_eq!(env.dev.get(queue(1)).unwrap().parent, b);
    assert_eq!(env.dev.get(a).unwrap().children, 0);
    assert_eq!(env.dev.get(b).unwrap().children, 2);
}

#[tokio::test]
async fn test_group_rejects_loop() {
    let env = TestDevice::new();
    let top = env.group_queues(&[0]).await;
    let mid = env
        .dev
        .group(&queues(&[1]), &ShaperPatch::new(new_detached()).parent(top))
        .await
        .unwrap();
    let before = env.snapshot();

    // `top` above `mid` can't be moved below it.
    let err = env
        .dev
        .group(&queues(&[2]), &ShaperPatch::new(top).parent(mid))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = env
        .dev
        .group(&[ShaperPatch::new(top)], &ShaperPatch::new(mid))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    assert_eq!(env.snapshot(), before);
}

#[tokio::test]
async fn test_group_exhausts_detached_ids() {
    use nshaper::shaper::SimConfig;

    let mut config = SimConfig::new().queues(8);
    config.max_detached = Some(2);
    let env = TestDevice::with_config(config);

    env.group_queues(&[0]).await;
    env.group_queues(&[1]).await;
    let err = env
        .dev
        .group(&queues(&[2]), &ShaperPatch::new(new_detached()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(env.dev.get(queue(2)).unwrap_err().is_not_found());
    assert_eq!(env.dev.detached_ids_in_use(), 2);
}
