//! The shaper operations driven through the net-shaper transport.

use std::sync::Arc;

use nshaper::ErrorKind;
use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
use nshaper::shaper::{Capabilities, Device, Handle, Metric, Scope, ShaperPatch, SimConfig};

use crate::common::{TestDevice, detached, netdev, new_detached, queue, queues};

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_set_get_dump() {
    let env = TestDevice::new();
    let conn = env.connection();

    conn.set(1, &ShaperPatch::new(queue(2)).metric(Metric::Pps).bw_max(9000).priority(1))
        .await
        .unwrap();
    conn.set(1, &ShaperPatch::new(netdev()).bw_max(40_000_000_000))
        .await
        .unwrap();

    let q2 = conn.get(1, queue(2)).await.unwrap();
    assert_eq!(q2, env.dev.get(queue(2)).unwrap());
    assert_eq!(q2.metric, Metric::Pps);

    // Rates above u32 range survive the variable-width encoding.
    let nd = conn.get(1, netdev()).await.unwrap();
    assert_eq!(nd.bw_max, 40_000_000_000);
    assert_eq!(nd.parent, Handle::new(Scope::Port, 0));

    let dumped = conn.dump(1).await.unwrap();
    assert_eq!(dumped, env.snapshot());
}

#[tokio::test]
async fn test_group_reply_carries_allocated_id() {
    let env = TestDevice::new();
    let conn = env.connection();

    env.group_queues(&[0]).await;
    let out = conn
        .group(1, &queues(&[1, 2]), &ShaperPatch::new(new_detached()).bw_max(1000))
        .await
        .unwrap();
    assert_eq!(out, detached(1));

    // Child counts stay local to the cache.
    let wire = conn.get(1, out).await.unwrap();
    assert_eq!(wire.children, 0);
    assert_eq!(env.dev.get(out).unwrap().children, 2);
    assert_eq!(wire.bw_max, 1000);
}

#[tokio::test]
async fn test_dump_in_small_chunks() {
    let env = TestDevice::new();
    for id in 0..7 {
        env.dev.set(&ShaperPatch::new(queue(id))).await.unwrap();
    }
    let conn = ShaperConnection::new(ShaperServer::new(env.table.clone()).with_dump_chunk(2));

    let dumped = conn.dump(1).await.unwrap();
    let got: Vec<_> = dumped.iter().map(|s| s.handle).collect();
    assert_eq!(got, (0..7).map(queue).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_capabilities() {
    let config = SimConfig::new()
        .capabilities(Scope::Netdev, Capabilities::empty())
        .capabilities(Scope::Detached, Capabilities::empty());
    let env = TestDevice::with_config(config);
    let conn = env.connection();

    let all = conn.capabilities_dump(1).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].scope, Scope::Queue);
    assert_eq!(all[0].caps, Capabilities::all());

    let err = conn.capabilities(1, Scope::Netdev).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_replies() {
    let env = TestDevice::new();
    let conn = env.connection();
    let group = env.group_queues(&[0]).await;

    let err = conn.delete(1, group).await.unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = conn.get(1, queue(12)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = conn
        .set(1, &ShaperPatch::new(Handle::new(Scope::Port, 0)))
        .await
        .unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
    assert!(err.to_string().contains("port"));

    // The cache is untouched by failed requests.
    assert_eq!(env.dev.get(group).unwrap().children, 1);
}

#[tokio::test]
async fn test_vf_scope_is_not_exposed() {
    let env = TestDevice::new();
    let conn = env.connection();

    let err = conn
        .set(1, &ShaperPatch::new(Handle::new(Scope::Vf, 0)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(env.snapshot().is_empty());
}

#[tokio::test]
async fn test_device_without_shaper_support() {
    let env = TestDevice::new();
    env.table.register(Device::new(2, "lo")).unwrap();
    let conn = env.connection();

    let err = conn.dump(2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    let err = conn.get(42, queue(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(err.to_string().contains("device 42 not found"));
}

#[tokio::test]
async fn test_shared_table_between_connections() {
    let env = TestDevice::new();
    let a = env.connection();
    let b = ShaperConnection::new(a.server().clone());

    a.set(1, &ShaperPatch::new(queue(3)).weight(4)).await.unwrap();
    assert_eq!(b.get(1, queue(3)).await.unwrap().weight, 4);
    assert!(Arc::ptr_eq(a.server().table(), &env.table));
}
