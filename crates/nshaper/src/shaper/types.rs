//! Shaper records, patches and capability sets.

use super::handle::{Handle, Scope};

/// Unit of the rate limits of a shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    /// Bits per second.
    #[default]
    Bps,
    /// Packets per second.
    Pps,
}

impl Metric {
    /// Parse from the wire value.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Metric::Bps),
            1 => Some(Metric::Pps),
            _ => None,
        }
    }

    /// Wire value.
    pub fn to_u32(self) -> u32 {
        match self {
            Metric::Bps => 0,
            Metric::Pps => 1,
        }
    }

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Bps => "bps",
            Metric::Pps => "pps",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bps" => Ok(Metric::Bps),
            "pps" => Ok(Metric::Pps),
            _ => Err(crate::Error::InvalidRequest(format!(
                "unknown metric '{}', expected bps or pps",
                s
            ))),
        }
    }
}

/// One shaping element as cached by the core and handed to the backend.
///
/// Zeroed rate fields are considered not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaperInfo {
    /// Unique key of the shaper.
    pub handle: Handle,
    /// Enclosing shaper. [`Handle::NONE`] for the root.
    pub parent: Handle,
    /// Unit of `bw_min` and `bw_max`.
    pub metric: Metric,
    /// Minimum guaranteed rate.
    pub bw_min: u64,
    /// Maximum peak rate.
    pub bw_max: u64,
    /// Maximum burst in bytes at `bw_max`.
    pub burst: u64,
    /// Strict scheduling priority.
    pub priority: u32,
    /// Weighted round robin weight.
    pub weight: u32,
    /// Number of nested shapers, accounted for detached shapers only.
    pub children: u32,
}

impl ShaperInfo {
    /// Zero-valued shaper placed under its scope's default parent.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            parent: handle.default_parent(),
            ..Default::default()
        }
    }

    /// The shaper's scope.
    pub fn scope(&self) -> Scope {
        self.handle.scope()
    }
}

/// Incremental update of a shaper.
///
/// Only the fields that are set overwrite the base record.
///
/// # Example
///
/// ```
/// use nshaper::shaper::{Handle, Metric, Scope, ShaperPatch};
///
/// let patch = ShaperPatch::new(Handle::new(Scope::Queue, 1))
///     .metric(Metric::Bps)
///     .bw_max(10_000_000)
///     .priority(2);
/// assert_eq!(patch.bw_max, Some(10_000_000));
/// assert!(patch.weight.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaperPatch {
    /// Target shaper.
    pub handle: Handle,
    /// New parent.
    pub parent: Option<Handle>,
    /// New metric.
    pub metric: Option<Metric>,
    /// New minimum rate.
    pub bw_min: Option<u64>,
    /// New maximum rate.
    pub bw_max: Option<u64>,
    /// New burst.
    pub burst: Option<u64>,
    /// New priority.
    pub priority: Option<u32>,
    /// New weight.
    pub weight: Option<u32>,
}

impl ShaperPatch {
    /// Create an empty patch for `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            ..Default::default()
        }
    }

    /// Set the parent.
    pub fn parent(mut self, parent: Handle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Set the minimum guaranteed rate.
    pub fn bw_min(mut self, rate: u64) -> Self {
        self.bw_min = Some(rate);
        self
    }

    /// Set the maximum rate.
    pub fn bw_max(mut self, rate: u64) -> Self {
        self.bw_max = Some(rate);
        self
    }

    /// Set the burst size.
    pub fn burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the weight.
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// True if no field besides the handle is set.
    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
            && self.metric.is_none()
            && self.bw_min.is_none()
            && self.bw_max.is_none()
            && self.burst.is_none()
            && self.priority.is_none()
            && self.weight.is_none()
    }

    /// Merge the set fields into `base`.
    ///
    /// The handle and child count of `base` are left alone.
    pub fn apply_to(&self, base: &mut ShaperInfo) {
        if let Some(parent) = self.parent {
            base.parent = parent;
        }
        if let Some(metric) = self.metric {
            base.metric = metric;
        }
        if let Some(v) = self.bw_min {
            base.bw_min = v;
        }
        if let Some(v) = self.bw_max {
            base.bw_max = v;
        }
        if let Some(v) = self.burst {
            base.burst = v;
        }
        if let Some(v) = self.priority {
            base.priority = v;
        }
        if let Some(v) = self.weight {
            base.weight = v;
        }
    }
}

/// Feature a backend may support for a given scope.
///
/// The discriminant is both the capability attribute id and the bit
/// index within [`Capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Capability {
    /// Rates in bits per second.
    MetricBps = 3,
    /// Rates in packets per second.
    MetricPps = 4,
    /// Shapers of this scope can nest other shapers.
    Nesting = 5,
    /// Minimum guaranteed rate.
    BwMin = 6,
    /// Maximum rate.
    BwMax = 7,
    /// Burst size.
    Burst = 8,
    /// Strict priority.
    Priority = 9,
    /// WRR weight.
    Weight = 10,
}

impl Capability {
    /// Every capability, in attribute order.
    pub const ALL: [Capability; 8] = [
        Capability::MetricBps,
        Capability::MetricPps,
        Capability::Nesting,
        Capability::BwMin,
        Capability::BwMax,
        Capability::Burst,
        Capability::Priority,
        Capability::Weight,
    ];

    /// Parse from the attribute id.
    pub fn from_u16(v: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| *c as u16 == v)
    }

    /// Parse from the name printed by [`Capability::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Lower-case name, as printed by tools.
    pub fn name(self) -> &'static str {
        match self {
            Capability::MetricBps => "metric-bps",
            Capability::MetricPps => "metric-pps",
            Capability::Nesting => "nesting",
            Capability::BwMin => "bw-min",
            Capability::BwMax => "bw-max",
            Capability::Burst => "burst",
            Capability::Priority => "priority",
            Capability::Weight => "weight",
        }
    }
}

/// Set of supported features for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u64);

impl Capabilities {
    /// No feature supported.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every feature supported.
    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Build from raw bits. Bits with no matching capability are dropped.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits & Self::all().0)
    }

    /// Raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Add a feature.
    pub fn with(mut self, cap: Capability) -> Self {
        self.insert(cap);
        self
    }

    /// Add a feature in place.
    pub fn insert(&mut self, cap: Capability) {
        self.0 |= 1 << cap as u16;
    }

    /// Check for a feature.
    pub fn contains(self, cap: Capability) -> bool {
        self.0 & (1 << cap as u16) != 0
    }

    /// True if no feature is supported.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Supported features, in attribute order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut caps = Capabilities::empty();
        for cap in iter {
            caps.insert(cap);
        }
        caps
    }
}

/// Capabilities of one scope of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeCapabilities {
    /// Device interface index.
    pub ifindex: u32,
    /// Scope the capabilities apply to.
    pub scope: Scope,
    /// Supported features.
    pub caps: Capabilities,
}
