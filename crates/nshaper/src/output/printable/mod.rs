//! Printable implementations for shaper types.

mod shaper;
