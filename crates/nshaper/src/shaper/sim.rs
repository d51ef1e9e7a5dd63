//! Software backend simulating a shaper-capable NIC.
//!
//! [`SimBackend`] keeps a mirror of what "hardware" currently holds,
//! enforces per-scope capabilities and the queue count, and can be told
//! to fail the next call of a given kind.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nshaper::shaper::{Device, SimBackend, SimConfig};
//!
//! let sim = Arc::new(SimBackend::new(SimConfig::new().queues(4)));
//! let dev = Device::new(1, "sim0").with_backend(sim.clone());
//! assert!(dev.has_backend());
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::ShaperOps;
use super::device::Device;
use super::handle::{Handle, Scope};
use super::store::ShaperLimits;
use super::types::{Capabilities, Capability, Metric, ShaperInfo};
use crate::{Error, Result};

/// Configuration of a simulated device.
///
/// `capabilities` maps scope names to capability names, as printed by
/// [`Scope::name`] and [`Capability::name`]. Scopes that are missing are
/// not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Deserialize), serde(default))]
pub struct SimConfig {
    /// Interface name.
    pub name: String,
    /// Interface index.
    pub ifindex: u32,
    /// Number of transmit queues.
    pub queues: u32,
    /// Supported features per scope.
    pub capabilities: BTreeMap<String, Vec<String>>,
    /// Delay added to every backend call, in milliseconds.
    pub latency_ms: u64,
    /// Size of the detached id space.
    pub max_detached: Option<u32>,
    /// Maximum number of cached shapers.
    pub max_shapers: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let all: Vec<String> = Capability::ALL
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let mut capabilities = BTreeMap::new();
        for scope in [Scope::Netdev, Scope::Queue, Scope::Detached] {
            capabilities.insert(scope.name().to_string(), all.clone());
        }

        Self {
            name: "sim0".to_string(),
            ifindex: 1,
            queues: 8,
            capabilities,
            latency_ms: 0,
            max_detached: None,
            max_shapers: None,
        }
    }
}

impl SimConfig {
    /// Default configuration: 8 queues, every feature on the netdev,
    /// queue and detached scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface name and index.
    pub fn device(mut self, name: impl Into<String>, ifindex: u32) -> Self {
        self.name = name.into();
        self.ifindex = ifindex;
        self
    }

    /// Set the number of queues.
    pub fn queues(mut self, n: u32) -> Self {
        self.queues = n;
        self
    }

    /// Replace the features of one scope. An empty set removes support
    /// for the scope.
    pub fn capabilities(mut self, scope: Scope, caps: Capabilities) -> Self {
        if caps.is_empty() {
            self.capabilities.remove(scope.name());
        } else {
            self.capabilities.insert(
                scope.name().to_string(),
                caps.iter().map(|c| c.name().to_string()).collect(),
            );
        }
        self
    }

    /// Add latency to every backend call.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis() as u64;
        self
    }

    /// Store limits derived from this configuration.
    pub fn limits(&self) -> ShaperLimits {
        let mut limits = ShaperLimits::new();
        if let Some(n) = self.max_detached {
            limits = limits.max_detached(n);
        }
        if let Some(n) = self.max_shapers {
            limits = limits.max_shapers(n);
        }
        limits
    }

    /// Check that every scope and capability name is known.
    pub fn validate(&self) -> Result<()> {
        self.scope_caps()?;
        Ok(())
    }

    fn scope_caps(&self) -> Result<HashMap<Scope, Capabilities>> {
        let mut out = HashMap::new();
        for (scope, names) in &self.capabilities {
            let scope: Scope = scope.parse()?;
            let mut caps = Capabilities::empty();
            for name in names {
                let cap = Capability::from_name(name).ok_or_else(|| {
                    Error::InvalidRequest(format!("unknown capability '{}'", name))
                })?;
                caps.insert(cap);
            }
            out.insert(scope, caps);
        }
        Ok(out)
    }
}

/// Kind of backend call, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    /// [`ShaperOps::set`].
    Set,
    /// [`ShaperOps::delete`].
    Delete,
    /// [`ShaperOps::group`].
    Group,
    /// [`ShaperOps::capabilities`].
    Capabilities,
}

#[derive(Debug, Default)]
struct SimState {
    hw: BTreeMap<Handle, ShaperInfo>,
    failures: HashMap<SimOp, VecDeque<Option<Error>>>,
    calls: HashMap<SimOp, usize>,
}

/// Simulated shaper hardware.
#[derive(Debug)]
pub struct SimBackend {
    queues: u32,
    caps: HashMap<Scope, Capabilities>,
    latency: Duration,
    state: Mutex<SimState>,
}

impl SimBackend {
    /// Create a simulator. Unknown scope or capability names in the
    /// configuration are ignored; see [`SimConfig::validate`].
    pub fn new(config: SimConfig) -> Self {
        let caps = config.scope_caps().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring bad simulator capabilities");
            HashMap::new()
        });
        Self {
            queues: config.queues,
            caps,
            latency: Duration::from_millis(config.latency_ms),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Make the next call of kind `op` fail with `error`.
    ///
    /// Queued failures are consumed in order.
    pub fn fail_next(&self, op: SimOp, error: Error) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(Some(error));
    }

    /// Let the next call of kind `op` succeed before any failure queued
    /// after it.
    pub fn pass_next(&self, op: SimOp) {
        self.state.lock().failures.entry(op).or_default().push_back(None);
    }

    /// Number of calls of kind `op` so far, failed ones included.
    pub fn calls(&self, op: SimOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Shapers currently programmed, in handle order.
    pub fn hw_shapers(&self) -> Vec<ShaperInfo> {
        self.state.lock().hw.values().copied().collect()
    }

    /// Programmed state of one shaper.
    pub fn hw_get(&self, handle: Handle) -> Option<ShaperInfo> {
        self.state.lock().hw.get(&handle).copied()
    }

    async fn enter(&self, op: SimOp) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(&op).and_then(|q| q.pop_front()).flatten() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn scope_caps(&self, scope: Scope) -> Result<Capabilities> {
        self.caps
            .get(&scope)
            .copied()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Unsupported(format!("{} shapers are not supported", scope)))
    }

    fn check(&self, shaper: &ShaperInfo) -> Result<()> {
        let handle = shaper.handle;
        if handle.scope() == Scope::Queue && handle.id() >= self.queues {
            return Err(Error::backend(
                libc::EINVAL,
                format!("queue {} out of range, device has {}", handle.id(), self.queues),
            ));
        }

        let caps = self.scope_caps(handle.scope())?;
        let need = |cap: Capability, used: bool| -> Result<()> {
            if used && !caps.contains(cap) {
                return Err(Error::Unsupported(format!(
                    "{} not supported for {} shapers",
                    cap.name(),
                    handle.scope()
                )));
            }
            Ok(())
        };
        need(Capability::MetricBps, shaper.metric == Metric::Bps)?;
        need(Capability::MetricPps, shaper.metric == Metric::Pps)?;
        need(Capability::BwMin, shaper.bw_min != 0)?;
        need(Capability::BwMax, shaper.bw_max != 0)?;
        need(Capability::Burst, shaper.burst != 0)?;
        need(Capability::Priority, shaper.priority != 0)?;
        need(Capability::Weight, shaper.weight != 0)?;
        Ok(())
    }
}

#[async_trait]
impl ShaperOps for SimBackend {
    async fn set(&self, dev: &Device, shaper: &ShaperInfo) -> Result<()> {
        self.enter(SimOp::Set).await?;
        self.check(shaper)?;
        self.state.lock().hw.insert(shaper.handle, *shaper);
        tracing::trace!(dev = dev.name(), handle = %shaper.handle, "sim: shaper programmed");
        Ok(())
    }

    async fn delete(&self, dev: &Device, handle: Handle) -> Result<()> {
        self.enter(SimOp::Delete).await?;
        self.state.lock().hw.remove(&handle);
        tracing::trace!(dev = dev.name(), %handle, "sim: shaper removed");
        Ok(())
    }

    async fn group(
        &self,
        dev: &Device,
        inputs: &[ShaperInfo],
        output: &ShaperInfo,
    ) -> Result<()> {
        self.enter(SimOp::Group).await?;

        let caps = self.scope_caps(output.scope())?;
        if !caps.contains(Capability::Nesting) {
            return Err(Error::Unsupported(format!(
                "{} shapers can't nest other shapers",
                output.scope()
            )));
        }
        self.check(output)?;
        for input in inputs {
            self.check(input)?;
        }

        let mut state = self.state.lock();
        state.hw.insert(output.handle, *output);
        for input in inputs {
            state.hw.insert(input.handle, *input);
        }
        tracing::trace!(dev = dev.name(), output = %output.handle, inputs = inputs.len(), "sim: group programmed");
        Ok(())
    }

    async fn capabilities(&self, _dev: &Device, scope: Scope) -> Result<Capabilities> {
        self.enter(SimOp::Capabilities).await?;
        if scope == Scope::Vf {
            return Err(Error::Unsupported("vf shapers are not supported".into()));
        }
        self.scope_caps(scope)
    }
}
