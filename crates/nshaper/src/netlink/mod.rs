//! Netlink transport for the `net-shaper` family.
//!
//! Framing follows the kernel's netlink conventions: a `nlmsghdr`, a
//! generic netlink header, then native-endian TLV attributes. Requests
//! are served in-process by [`genl::shaper::ShaperServer`] and issued by
//! [`genl::shaper::ShaperConnection`].

pub mod attr;
pub mod builder;
pub mod genl;
pub mod message;
pub mod parse;

pub use builder::MessageBuilder;
pub use message::{MessageIter, NlMsgError, NlMsgHdr};
