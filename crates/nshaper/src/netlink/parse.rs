//! Parser combinators for netlink wire data.
//!
//! Netlink is native endian; every integer parser here reads host order.

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::attr::{NLA_HDRLEN, nla_align};
use super::genl::{GENL_HDRLEN, GenlMsgHdr};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};
use crate::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

/// Parse a u16 in native endian.
pub fn parse_u16_ne(input: &mut &[u8]) -> PResult<u16> {
    let bytes: &[u8] = take(2usize).parse_next(input)?;
    match bytes.try_into() {
        Ok(b) => Ok(u16::from_ne_bytes(b)),
        Err(_) => cut(),
    }
}

/// Parse a u32 in native endian.
pub fn parse_u32_ne(input: &mut &[u8]) -> PResult<u32> {
    let bytes: &[u8] = take(4usize).parse_next(input)?;
    match bytes.try_into() {
        Ok(b) => Ok(u32::from_ne_bytes(b)),
        Err(_) => cut(),
    }
}

/// Parse a u8.
pub fn parse_u8(input: &mut &[u8]) -> PResult<u8> {
    let bytes: &[u8] = take(1usize).parse_next(input)?;
    Ok(bytes[0])
}

/// Parse a netlink message header.
pub fn parse_nlmsghdr(input: &mut &[u8]) -> PResult<NlMsgHdr> {
    let len = parse_u32_ne(input)?;
    let msg_type = parse_u16_ne(input)?;
    let flags = parse_u16_ne(input)?;
    let seq = parse_u32_ne(input)?;
    let pid = parse_u32_ne(input)?;

    Ok(NlMsgHdr {
        nlmsg_len: len,
        nlmsg_type: msg_type,
        nlmsg_flags: flags,
        nlmsg_seq: seq,
        nlmsg_pid: pid,
    })
}

/// Parse a generic netlink header.
pub fn parse_genlmsghdr(input: &mut &[u8]) -> PResult<GenlMsgHdr> {
    let cmd = parse_u8(input)?;
    let version = parse_u8(input)?;
    let reserved = parse_u16_ne(input)?;
    Ok(GenlMsgHdr {
        cmd,
        version,
        reserved,
    })
}

/// Parse one attribute and its padding, returning (type, payload).
///
/// The nested and byte-order flags are masked off the type.
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = parse_u16_ne(input)? as usize;
    let attr_type = parse_u16_ne(input)? & super::attr::NLA_TYPE_MASK;

    if len < NLA_HDRLEN {
        return cut();
    }

    let payload: &[u8] = take(len - NLA_HDRLEN).parse_next(input)?;

    let padding = (nla_align(len) - len).min(input.len());
    let _: &[u8] = take(padding).parse_next(input)?;

    Ok((attr_type, payload))
}

/// Parse every attribute in `data`.
///
/// Unlike [`AttrIter`](super::attr::AttrIter), trailing garbage is an
/// error.
pub fn parse_attrs(data: &[u8]) -> Result<Vec<(u16, &[u8])>> {
    let mut input = data;
    let mut attrs = Vec::new();
    while !input.is_empty() {
        let attr = parse_attr(&mut input).map_err(|_| {
            Error::InvalidAttribute(format!(
                "malformed attribute at offset {}",
                data.len() - input.len()
            ))
        })?;
        attrs.push(attr);
    }
    Ok(attrs)
}

/// A generic netlink request split into its parts.
#[derive(Debug, Clone, Copy)]
pub struct GenlRequest<'a> {
    /// Netlink header.
    pub header: NlMsgHdr,
    /// Generic netlink header.
    pub genl: GenlMsgHdr,
    /// Attribute data after both headers.
    pub attrs: &'a [u8],
}

/// Split `data` into generic netlink messages.
pub fn parse_genl_messages(data: &[u8]) -> Result<Vec<GenlRequest<'_>>> {
    let mut out = Vec::new();
    let mut input = data;

    while !input.is_empty() {
        let start = input;
        let header = parse_nlmsghdr(&mut input).map_err(|_| Error::Truncated {
            expected: NLMSG_HDRLEN,
            actual: start.len(),
        })?;

        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN + GENL_HDRLEN || len > start.len() {
            return Err(Error::InvalidMessage(format!(
                "invalid message length: {}",
                len
            )));
        }

        let mut body = &start[NLMSG_HDRLEN..len];
        let genl = parse_genlmsghdr(&mut body)
            .map_err(|_| Error::InvalidMessage("GENL header too short".into()))?;

        out.push(GenlRequest {
            header,
            genl,
            attrs: body,
        });

        input = start.get(nlmsg_align(len)..).unwrap_or(&[]);
    }

    Ok(out)
}
