//! Shared utilities for nshaper.

pub mod parse;

pub use parse::{get_pkt_rate, get_rate, get_size, get_u32, get_u64};
