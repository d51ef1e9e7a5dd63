//! Generic Netlink (GENL) support.
//!
//! Generic Netlink extends the standard netlink protocol with dynamic
//! family ids, resolved by name through the control family, and
//! family-specific commands and attributes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ ShaperConnection                        │
//! │ (typed client, family id cache)         │
//! └────────────────┬────────────────────────┘
//!                  │ request / reply bytes
//! ┌────────────────▼────────────────────────┐
//! │ ShaperServer                            │
//! │ (control + net-shaper families)         │
//! └────────────────┬────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────┐
//! │ DeviceTable -> Device -> ShaperOps      │
//! └─────────────────────────────────────────┘
//! ```

mod header;

pub use header::{GENL_HDRLEN, GenlMsgHdr};

pub mod shaper;

// Control family constants (fixed, not dynamically assigned)
pub const GENL_ID_CTRL: u16 = 0x10;

/// Control family commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlCmd {
    Unspec = 0,
    NewFamily = 1,
    DelFamily = 2,
    GetFamily = 3,
}

/// Control family attributes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlAttr {
    Unspec = 0,
    FamilyId = 1,
    FamilyName = 2,
    Version = 3,
    HdrSize = 4,
    MaxAttr = 5,
}
