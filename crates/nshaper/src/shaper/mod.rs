//! Hierarchical hardware shapers.
//!
//! Each [`Device`] caches the shapers applied to its hardware in a
//! [`ShaperStore`] and forwards changes to a driver implementing
//! [`ShaperOps`]. Mutations run as transactions: new cache entries stay
//! tentative until the driver call succeeded, and are erased otherwise.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nshaper::shaper::{Device, Handle, Scope, ShaperPatch, SimBackend, SimConfig, ID_UNSPEC};
//!
//! # async fn example() -> nshaper::Result<()> {
//! let sim = Arc::new(SimBackend::new(SimConfig::new()));
//! let dev = Device::new(1, "sim0").with_backend(sim);
//!
//! // Limit queue 1 to 10 Mbit/s
//! let q1 = Handle::new(Scope::Queue, 1);
//! dev.set(&ShaperPatch::new(q1).bw_max(10_000_000)).await?;
//!
//! // Share 100 Mbit/s between queues 2 and 3
//! let group = dev
//!     .group(
//!         &[
//!             ShaperPatch::new(Handle::new(Scope::Queue, 2)),
//!             ShaperPatch::new(Handle::new(Scope::Queue, 3)),
//!         ],
//!         &ShaperPatch::new(Handle::new(Scope::Detached, ID_UNSPEC)).bw_max(100_000_000),
//!     )
//!     .await?;
//! assert_eq!(dev.get(group)?.children, 2);
//! # Ok(())
//! # }
//! ```

mod backend;
mod device;
mod handle;
mod ops;
mod store;
mod table;
mod txn;
mod types;

pub mod sim;

pub use backend::ShaperOps;
pub use device::Device;
pub use handle::{
    Handle, ID_MASK, ID_UNSPEC, SCOPE_SHIFT, Scope, id_of, make_handle, scope_of,
};
pub use sim::{SimBackend, SimConfig, SimOp};
pub use store::{Prepared, ShaperLimits, ShaperStore, TxnId};
pub use table::DeviceTable;
pub use types::{
    Capabilities, Capability, Metric, ScopeCapabilities, ShaperInfo, ShaperPatch,
};
