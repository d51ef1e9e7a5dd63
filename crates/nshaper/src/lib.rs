//! Hierarchical hardware shaper management for network devices.
//!
//! This crate keeps a per-device cache of hardware traffic shapers
//! (port, netdev, queue and detached grouping shapers), applies changes
//! through a driver backend transactionally, and serves the `net-shaper`
//! generic netlink family on top of it.
//!
//! # Features
//!
//! - `output` - JSON/text output formatting
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
//! use nshaper::shaper::{DeviceTable, Handle, Scope, ShaperPatch, SimConfig};
//!
//! #[tokio::main]
//! async fn main() -> nshaper::Result<()> {
//!     let table = std::sync::Arc::new(DeviceTable::new());
//!     table.register_sim(SimConfig::new())?;
//!
//!     let conn = ShaperConnection::new(ShaperServer::new(table));
//!     let q0 = Handle::new(Scope::Queue, 0);
//!     conn.set(1, &ShaperPatch::new(q0).bw_max(10_000_000)).await?;
//!
//!     for shaper in conn.dump(1).await? {
//!         println!("{} parent {} bw-max {}", shaper.handle, shaper.parent, shaper.bw_max);
//!     }
//!     Ok(())
//! }
//! ```

mod error;

// Core modules (always available)
pub mod netlink;
pub mod shaper;
pub mod util;

// Feature-gated modules
#[cfg(feature = "output")]
pub mod output;

// Re-export common types at crate root for convenience
pub use error::{Error, ErrorKind, Result};
