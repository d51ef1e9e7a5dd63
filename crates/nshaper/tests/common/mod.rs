//! Common test utilities for integration tests.
//!
//! Provides `TestDevice`, a simulated device registered in its own
//! table, and `GatedBackend`, a backend whose calls can be held in
//! flight while the test inspects the store.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use nshaper::Result;
use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
use nshaper::shaper::{
    Capabilities, Device, DeviceTable, Handle, ID_UNSPEC, Scope, ShaperInfo, ShaperOps,
    ShaperPatch, SimBackend, SimConfig,
};

/// Handle of queue `id`.
pub fn queue(id: u32) -> Handle {
    Handle::new(Scope::Queue, id)
}

/// Handle of detached shaper `id`.
pub fn detached(id: u32) -> Handle {
    Handle::new(Scope::Detached, id)
}

/// Detached handle asking for a fresh id.
pub fn new_detached() -> Handle {
    Handle::new(Scope::Detached, ID_UNSPEC)
}

/// The device's netdev shaper.
pub fn netdev() -> Handle {
    Handle::new(Scope::Netdev, 0)
}

/// Patches for plain queue inputs.
pub fn queues(ids: &[u32]) -> Vec<ShaperPatch> {
    ids.iter().map(|&id| ShaperPatch::new(queue(id))).collect()
}

/// A simulated device registered in a fresh table.
pub struct TestDevice {
    pub table: Arc<DeviceTable>,
    pub dev: Arc<Device>,
    pub sim: Arc<SimBackend>,
}

impl TestDevice {
    /// Device `sim0` (ifindex 1) with 16 queues.
    pub fn new() -> Self {
        Self::with_config(SimConfig::new().queues(16))
    }

    /// Device built from `config`.
    pub fn with_config(config: SimConfig) -> Self {
        let table = Arc::new(DeviceTable::new());
        let (dev, sim) = table
            .register_sim(config)
            .expect("failed to register simulated device");
        Self { table, dev, sim }
    }

    /// A client connection to this device's table.
    pub fn connection(&self) -> ShaperConnection {
        ShaperConnection::new(ShaperServer::new(self.table.clone()))
    }

    /// Create a new detached group over `inputs` and return its handle.
    pub async fn group_queues(&self, ids: &[u32]) -> Handle {
        self.dev
            .group(&queues(ids), &ShaperPatch::new(new_detached()))
            .await
            .expect("group failed")
    }

    /// Committed shapers, in handle order.
    pub fn snapshot(&self) -> Vec<ShaperInfo> {
        self.dev.shapers().expect("dump failed")
    }

    /// Check that every cached shaper is programmed in the simulator
    /// with the same configuration, and nothing else is.
    pub fn assert_matches_hw(&self) {
        let strip = |s: &ShaperInfo| ShaperInfo { children: 0, ..*s };
        let cached: Vec<_> = self.snapshot().iter().map(strip).collect();
        let hw: Vec<_> = self.sim.hw_shapers().iter().map(strip).collect();
        assert_eq!(cached, hw, "cache and hardware diverged");
    }
}

/// A backend that can park its calls until the test releases them.
///
/// Wraps a [`SimBackend`]; when armed, each set/delete/group call
/// signals `entered` and waits for a permit before reaching the
/// simulator.
pub struct GatedBackend {
    pub sim: SimBackend,
    armed: AtomicBool,
    gate: Semaphore,
    entered: Notify,
}

impl GatedBackend {
    pub fn new(config: SimConfig) -> Self {
        Self {
            sim: SimBackend::new(config),
            armed: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Start holding calls.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Let `n` held calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Stop holding calls and let everything through.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Wait until a call is held.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    async fn pass(&self) {
        if self.armed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl ShaperOps for GatedBackend {
    async fn set(&self, dev: &Device, shaper: &ShaperInfo) -> Result<()> {
        self.pass().await;
        self.sim.set(dev, shaper).await
    }

    async fn delete(&self, dev: &Device, handle: Handle) -> Result<()> {
        self.pass().await;
        self.sim.delete(dev, handle).await
    }

    async fn group(&self, dev: &Device, inputs: &[ShaperInfo], output: &ShaperInfo) -> Result<()> {
        self.pass().await;
        self.sim.group(dev, inputs, output).await
    }

    async fn capabilities(&self, dev: &Device, scope: Scope) -> Result<Capabilities> {
        self.sim.capabilities(dev, scope).await
    }
}

/// A device backed by a [`GatedBackend`].
pub fn gated_device() -> (Arc<Device>, Arc<GatedBackend>) {
    let gated = Arc::new(GatedBackend::new(SimConfig::new().queues(16)));
    let dev = Arc::new(Device::new(1, "gated0").with_backend(gated.clone()));
    (dev, gated)
}
