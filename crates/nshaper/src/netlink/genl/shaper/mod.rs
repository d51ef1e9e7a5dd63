//! The `net-shaper` Generic Netlink family.
//!
//! Configures hierarchical hardware shapers of a device: queue and
//! netdev rate limits, and detached shapers grouping several queues.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
//! use nshaper::shaper::{DeviceTable, Handle, Scope, ShaperPatch, SimConfig, ID_UNSPEC};
//!
//! # async fn example() -> nshaper::Result<()> {
//! let table = Arc::new(DeviceTable::new());
//! table.register_sim(SimConfig::new())?;
//! let conn = ShaperConnection::new(ShaperServer::new(table));
//!
//! // Group queues 0 and 1 under a new detached shaper capped at 1 Gbit/s
//! let group = conn
//!     .group(
//!         1,
//!         &[
//!             ShaperPatch::new(Handle::new(Scope::Queue, 0)),
//!             ShaperPatch::new(Handle::new(Scope::Queue, 1)),
//!         ],
//!         &ShaperPatch::new(Handle::new(Scope::Detached, ID_UNSPEC)).bw_max(1_000_000_000),
//!     )
//!     .await?;
//! println!("created {}", group);
//! # Ok(())
//! # }
//! ```

mod connection;
mod reply;
mod request;
mod server;

pub use connection::ShaperConnection;
pub use reply::{
    parse_caps_reply, parse_group_reply, parse_shaper_reply, write_caps, write_group_reply,
    write_handle, write_shaper,
};
pub use request::{ShaperRequest, parse_handle};
pub use server::{DUMP_CHUNK, DumpCursor, ShaperServer};

/// net-shaper Generic Netlink family name.
pub const SHAPER_GENL_NAME: &str = "net-shaper";

/// net-shaper Generic Netlink version.
pub const SHAPER_GENL_VERSION: u8 = 1;

/// Family id handed out by [`ShaperServer`] for `net-shaper`.
pub const SHAPER_FAMILY_ID: u16 = 0x1c;

/// net-shaper GENL commands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaperCmd {
    Get = 1,
    Set = 2,
    Delete = 3,
    Group = 4,
    CapGet = 5,
}

impl ShaperCmd {
    /// Parse from the GENL command byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ShaperCmd::Get),
            2 => Some(ShaperCmd::Set),
            3 => Some(ShaperCmd::Delete),
            4 => Some(ShaperCmd::Group),
            5 => Some(ShaperCmd::CapGet),
            _ => None,
        }
    }
}

/// net-shaper attributes.
///
/// Top-level, shaper-nest and handle-nest attributes share one number
/// space.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaperAttr {
    Unspec = 0,
    Ifindex = 1,
    Handle = 2,
    Metric = 3,
    BwMin = 4,
    BwMax = 5,
    Burst = 6,
    Priority = 7,
    Weight = 8,
    Scope = 9,
    Id = 10,
    Parent = 11,
    Inputs = 12,
    Output = 13,
    Shaper = 14,
}

impl ShaperAttr {
    /// Highest attribute number.
    pub const MAX: u16 = ShaperAttr::Shaper as u16;
}

/// net-shaper capability attributes.
///
/// Feature flags use their attribute number as bit index in
/// [`Capabilities`](crate::shaper::Capabilities).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapsAttr {
    Unspec = 0,
    Ifindex = 1,
    Scope = 2,
    SupportMetricBps = 3,
    SupportMetricPps = 4,
    SupportNesting = 5,
    SupportBwMin = 6,
    SupportBwMax = 7,
    SupportBurst = 8,
    SupportPriority = 9,
    SupportWeight = 10,
}

impl CapsAttr {
    /// Highest attribute number.
    pub const MAX: u16 = CapsAttr::SupportWeight as u16;
}
