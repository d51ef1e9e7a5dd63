//! net-shaper reply encoding and decoding.

use super::request::parse_handle;
use super::{CapsAttr, ShaperAttr};
use crate::netlink::attr::{AttrIter, AttrTable, get};
use crate::netlink::builder::MessageBuilder;
use crate::shaper::{
    Capabilities, Capability, Handle, Metric, Scope, ScopeCapabilities, ShaperInfo,
};
use crate::{Error, Result};

/// Append a handle nest. The "no parent" handle is left out.
pub fn write_handle(builder: &mut MessageBuilder, kind: u16, handle: Handle) {
    if handle.to_raw() == 0 {
        return;
    }
    let nest = builder.nest_start(kind);
    builder.append_attr_u32(ShaperAttr::Scope as u16, handle.scope().to_u32());
    builder.append_attr_u32(ShaperAttr::Id as u16, handle.id());
    builder.nest_end(nest);
}

/// Append the attributes describing one shaper.
pub fn write_shaper(builder: &mut MessageBuilder, shaper: &ShaperInfo) {
    write_handle(builder, ShaperAttr::Parent as u16, shaper.parent);
    write_handle(builder, ShaperAttr::Handle as u16, shaper.handle);
    builder.append_attr_u32(ShaperAttr::Metric as u16, shaper.metric.to_u32());
    builder.append_attr_uint(ShaperAttr::BwMin as u16, shaper.bw_min);
    builder.append_attr_uint(ShaperAttr::BwMax as u16, shaper.bw_max);
    builder.append_attr_uint(ShaperAttr::Burst as u16, shaper.burst);
    builder.append_attr_u32(ShaperAttr::Priority as u16, shaper.priority);
    builder.append_attr_u32(ShaperAttr::Weight as u16, shaper.weight);
}

/// Append the reply to a GROUP request: the resolved output handle.
pub fn write_group_reply(builder: &mut MessageBuilder, output: Handle) {
    let nest = builder.nest_start(ShaperAttr::Handle as u16);
    builder.append_attr_u32(ShaperAttr::Scope as u16, output.scope().to_u32());
    builder.append_attr_u32(ShaperAttr::Id as u16, output.id());
    builder.nest_end(nest);
}

/// Append a capability reply: device, scope and one flag per feature.
pub fn write_caps(builder: &mut MessageBuilder, caps: &ScopeCapabilities) {
    builder.append_attr_u32(CapsAttr::Ifindex as u16, caps.ifindex);
    builder.append_attr_u32(CapsAttr::Scope as u16, caps.scope.to_u32());
    for cap in caps.caps.iter() {
        builder.append_attr_empty(cap as u16);
    }
}

/// Decode a shaper reply.
///
/// The child count is not carried on the wire and reads as 0.
pub fn parse_shaper_reply(data: &[u8]) -> Result<ShaperInfo> {
    let tb = AttrTable::parse(data, ShaperAttr::MAX)?;
    let mut info = ShaperInfo {
        handle: parse_handle(tb.require(ShaperAttr::Handle as u16, "handle")?)?,
        ..Default::default()
    };

    if let Some(v) = tb.get(ShaperAttr::Parent as u16) {
        info.parent = parse_handle(v)?;
    }
    if let Some(v) = tb.get(ShaperAttr::Metric as u16) {
        let raw = get::u32_ne(v)?;
        info.metric = Metric::from_u32(raw)
            .ok_or_else(|| Error::InvalidAttribute(format!("invalid metric value {}", raw)))?;
    }
    if let Some(v) = tb.get(ShaperAttr::BwMin as u16) {
        info.bw_min = get::uint(v)?;
    }
    if let Some(v) = tb.get(ShaperAttr::BwMax as u16) {
        info.bw_max = get::uint(v)?;
    }
    if let Some(v) = tb.get(ShaperAttr::Burst as u16) {
        info.burst = get::uint(v)?;
    }
    if let Some(v) = tb.get(ShaperAttr::Priority as u16) {
        info.priority = get::u32_ne(v)?;
    }
    if let Some(v) = tb.get(ShaperAttr::Weight as u16) {
        info.weight = get::u32_ne(v)?;
    }

    Ok(info)
}

/// Decode the reply to a GROUP request.
pub fn parse_group_reply(data: &[u8]) -> Result<Handle> {
    let tb = AttrTable::parse(data, ShaperAttr::MAX)?;
    parse_handle(tb.require(ShaperAttr::Handle as u16, "handle")?)
}

/// Decode a capability reply.
///
/// Unknown feature flags are skipped.
pub fn parse_caps_reply(data: &[u8]) -> Result<ScopeCapabilities> {
    let mut ifindex = None;
    let mut scope = None;
    let mut caps = Capabilities::empty();

    for (kind, payload) in AttrIter::new(data) {
        match kind {
            k if k == CapsAttr::Ifindex as u16 => ifindex = Some(get::u32_ne(payload)?),
            k if k == CapsAttr::Scope as u16 => {
                let raw = get::u32_ne(payload)?;
                scope = Some(Scope::from_u32(raw).ok_or_else(|| {
                    Error::InvalidAttribute(format!("invalid scope value {}", raw))
                })?);
            }
            k => {
                if let Some(cap) = Capability::from_u16(k) {
                    get::flag(payload)?;
                    caps.insert(cap);
                }
            }
        }
    }

    Ok(ScopeCapabilities {
        ifindex: ifindex.ok_or_else(|| Error::InvalidMessage("missing caps ifindex".into()))?,
        scope: scope.ok_or_else(|| Error::InvalidMessage("missing caps scope".into()))?,
        caps,
    })
}
