//! net-shaper request decoding and encoding.

use super::{CapsAttr, ShaperAttr, ShaperCmd};
use crate::netlink::attr::{AttrTable, get};
use crate::netlink::builder::MessageBuilder;
use crate::shaper::{Handle, ID_MASK, ID_UNSPEC, Metric, Scope, ShaperPatch};
use crate::{Error, Result};

/// A decoded net-shaper request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaperRequest {
    /// Look up one shaper.
    Get { ifindex: u32, handle: Handle },
    /// Enumerate every shaper of a device.
    Dump { ifindex: u32 },
    /// Create or update a shaper.
    Set { ifindex: u32, shaper: ShaperPatch },
    /// Delete a shaper.
    Delete { ifindex: u32, handle: Handle },
    /// Nest `inputs` under `output`.
    Group {
        ifindex: u32,
        inputs: Vec<ShaperPatch>,
        output: ShaperPatch,
    },
    /// Capabilities of one scope.
    CapGet { ifindex: u32, scope: Scope },
    /// Capabilities of every scope.
    CapDump { ifindex: u32 },
}

impl ShaperRequest {
    /// Decode the attributes of a request for `cmd`.
    pub fn parse(cmd: ShaperCmd, dump: bool, attrs: &[u8]) -> Result<Self> {
        match (cmd, dump) {
            (ShaperCmd::Get, false) => {
                let tb = AttrTable::parse(attrs, ShaperAttr::Handle as u16)?;
                Ok(Self::Get {
                    ifindex: ifindex(&tb, ShaperAttr::Ifindex as u16)?,
                    handle: parse_handle(tb.require(ShaperAttr::Handle as u16, "handle")?)?,
                })
            }
            (ShaperCmd::Get, true) => {
                let tb = AttrTable::parse(attrs, ShaperAttr::Ifindex as u16)?;
                Ok(Self::Dump {
                    ifindex: ifindex(&tb, ShaperAttr::Ifindex as u16)?,
                })
            }
            (ShaperCmd::Set, _) => {
                let tb = AttrTable::parse(attrs, ShaperAttr::Shaper as u16)?;
                let ifindex = ifindex(&tb, ShaperAttr::Ifindex as u16)?;
                let nest = tb.require(ShaperAttr::Shaper as u16, "shaper")?;
                Ok(Self::Set {
                    ifindex,
                    shaper: parse_shaper(nest, false)?,
                })
            }
            (ShaperCmd::Delete, _) => {
                let tb = AttrTable::parse(attrs, ShaperAttr::Handle as u16)?;
                Ok(Self::Delete {
                    ifindex: ifindex(&tb, ShaperAttr::Ifindex as u16)?,
                    handle: parse_handle(tb.require(ShaperAttr::Handle as u16, "handle")?)?,
                })
            }
            (ShaperCmd::Group, _) => {
                let tb = AttrTable::parse(attrs, ShaperAttr::Output as u16)?;
                let ifindex = ifindex(&tb, ShaperAttr::Ifindex as u16)?;
                tb.require(ShaperAttr::Inputs as u16, "inputs")?;
                let output = parse_shaper(tb.require(ShaperAttr::Output as u16, "output")?, true)?;
                let inputs = tb
                    .all(ShaperAttr::Inputs as u16)
                    .map(|nest| parse_shaper(nest, false))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Group {
                    ifindex,
                    inputs,
                    output,
                })
            }
            (ShaperCmd::CapGet, false) => {
                let tb = AttrTable::parse(attrs, CapsAttr::Scope as u16)?;
                let ifindex = ifindex(&tb, CapsAttr::Ifindex as u16)?;
                let raw = get::u32_ne(tb.require(CapsAttr::Scope as u16, "scope")?)?;
                Ok(Self::CapGet {
                    ifindex,
                    scope: exposed_scope(raw)?,
                })
            }
            (ShaperCmd::CapGet, true) => {
                let tb = AttrTable::parse(attrs, CapsAttr::Ifindex as u16)?;
                Ok(Self::CapDump {
                    ifindex: ifindex(&tb, CapsAttr::Ifindex as u16)?,
                })
            }
        }
    }

    /// The GENL command carrying this request.
    pub fn cmd(&self) -> ShaperCmd {
        match self {
            Self::Get { .. } | Self::Dump { .. } => ShaperCmd::Get,
            Self::Set { .. } => ShaperCmd::Set,
            Self::Delete { .. } => ShaperCmd::Delete,
            Self::Group { .. } => ShaperCmd::Group,
            Self::CapGet { .. } | Self::CapDump { .. } => ShaperCmd::CapGet,
        }
    }

    /// True for requests sent with `NLM_F_DUMP`.
    pub fn is_dump(&self) -> bool {
        matches!(self, Self::Dump { .. } | Self::CapDump { .. })
    }

    /// Target device.
    pub fn ifindex(&self) -> u32 {
        match self {
            Self::Get { ifindex, .. }
            | Self::Dump { ifindex }
            | Self::Set { ifindex, .. }
            | Self::Delete { ifindex, .. }
            | Self::Group { ifindex, .. }
            | Self::CapGet { ifindex, .. }
            | Self::CapDump { ifindex } => *ifindex,
        }
    }

    /// Append the request attributes to `builder`.
    pub fn write_attrs(&self, builder: &mut MessageBuilder) {
        match self {
            Self::Get { ifindex, handle } | Self::Delete { ifindex, handle } => {
                builder.append_attr_u32(ShaperAttr::Ifindex as u16, *ifindex);
                write_request_handle(builder, ShaperAttr::Handle as u16, *handle);
            }
            Self::Dump { ifindex } => {
                builder.append_attr_u32(ShaperAttr::Ifindex as u16, *ifindex);
            }
            Self::Set { ifindex, shaper } => {
                builder.append_attr_u32(ShaperAttr::Ifindex as u16, *ifindex);
                write_patch(builder, ShaperAttr::Shaper as u16, shaper, false);
            }
            Self::Group {
                ifindex,
                inputs,
                output,
            } => {
                builder.append_attr_u32(ShaperAttr::Ifindex as u16, *ifindex);
                for input in inputs {
                    write_patch(builder, ShaperAttr::Inputs as u16, input, false);
                }
                write_patch(builder, ShaperAttr::Output as u16, output, true);
            }
            Self::CapGet { ifindex, scope } => {
                builder.append_attr_u32(CapsAttr::Ifindex as u16, *ifindex);
                builder.append_attr_u32(CapsAttr::Scope as u16, scope.to_u32());
            }
            Self::CapDump { ifindex } => {
                builder.append_attr_u32(CapsAttr::Ifindex as u16, *ifindex);
            }
        }
    }
}

fn ifindex(tb: &AttrTable<'_>, kind: u16) -> Result<u32> {
    get::u32_ne(tb.require(kind, "ifindex")?)
}

fn exposed_scope(raw: u32) -> Result<Scope> {
    Scope::from_u32(raw)
        .filter(|scope| *scope <= Scope::MAX_EXPOSED)
        .ok_or_else(|| Error::InvalidRequest(format!("invalid scope value {}", raw)))
}

/// Decode a handle nest (scope and id).
///
/// A missing id means "allocate" for detached handles and 0 otherwise.
pub fn parse_handle(data: &[u8]) -> Result<Handle> {
    let tb = AttrTable::parse(data, ShaperAttr::Id as u16)?;
    let scope = match tb.get(ShaperAttr::Scope as u16) {
        Some(v) => exposed_scope(get::u32_ne(v)?)?,
        None => {
            return Err(Error::InvalidRequest(
                "missing 'scope' attribute for handle".into(),
            ));
        }
    };

    let id = match tb.get(ShaperAttr::Id as u16) {
        Some(v) => get::u32_ne(v)?,
        None if scope == Scope::Detached => ID_UNSPEC,
        None => 0,
    };
    if id > ID_MASK {
        return Err(Error::InvalidRequest(format!(
            "shaper id {} out of range",
            id
        )));
    }

    Ok(Handle::new(scope, id))
}

/// Decode a shaper nest into a patch. Only output nests may carry a
/// parent.
fn parse_shaper(data: &[u8], output: bool) -> Result<ShaperPatch> {
    let max = if output {
        ShaperAttr::Parent
    } else {
        ShaperAttr::Weight
    };
    let tb = AttrTable::parse(data, max as u16)?;

    let handle = parse_handle(tb.require(ShaperAttr::Handle as u16, "handle")?)?;
    let mut patch = ShaperPatch::new(handle);

    if let Some(v) = tb.get(ShaperAttr::Metric as u16) {
        let raw = get::u32_ne(v)?;
        let metric = Metric::from_u32(raw)
            .ok_or_else(|| Error::InvalidRequest(format!("invalid metric value {}", raw)))?;
        patch = patch.metric(metric);
    }
    if let Some(v) = tb.get(ShaperAttr::BwMin as u16) {
        patch = patch.bw_min(get::uint(v)?);
    }
    if let Some(v) = tb.get(ShaperAttr::BwMax as u16) {
        patch = patch.bw_max(get::uint(v)?);
    }
    if let Some(v) = tb.get(ShaperAttr::Burst as u16) {
        patch = patch.burst(get::uint(v)?);
    }
    if let Some(v) = tb.get(ShaperAttr::Priority as u16) {
        patch = patch.priority(get::u32_ne(v)?);
    }
    if let Some(v) = tb.get(ShaperAttr::Weight as u16) {
        patch = patch.weight(get::u32_ne(v)?);
    }
    if output && let Some(v) = tb.get(ShaperAttr::Parent as u16) {
        patch = patch.parent(parse_handle(v)?);
    }

    Ok(patch)
}

/// Handle nest as a client writes it: the id is left out when it asks
/// for allocation.
fn write_request_handle(builder: &mut MessageBuilder, kind: u16, handle: Handle) {
    let nest = builder.nest_start(kind);
    builder.append_attr_u32(ShaperAttr::Scope as u16, handle.scope().to_u32());
    if !handle.is_id_unspec() {
        builder.append_attr_u32(ShaperAttr::Id as u16, handle.id());
    }
    builder.nest_end(nest);
}

fn write_patch(builder: &mut MessageBuilder, kind: u16, patch: &ShaperPatch, output: bool) {
    let nest = builder.nest_start(kind);
    write_request_handle(builder, ShaperAttr::Handle as u16, patch.handle);
    if let Some(metric) = patch.metric {
        builder.append_attr_u32(ShaperAttr::Metric as u16, metric.to_u32());
    }
    if let Some(v) = patch.bw_min {
        builder.append_attr_uint(ShaperAttr::BwMin as u16, v);
    }
    if let Some(v) = patch.bw_max {
        builder.append_attr_uint(ShaperAttr::BwMax as u16, v);
    }
    if let Some(v) = patch.burst {
        builder.append_attr_uint(ShaperAttr::Burst as u16, v);
    }
    if let Some(v) = patch.priority {
        builder.append_attr_u32(ShaperAttr::Priority as u16, v);
    }
    if let Some(v) = patch.weight {
        builder.append_attr_u32(ShaperAttr::Weight as u16, v);
    }
    if output && let Some(parent) = patch.parent {
        write_request_handle(builder, ShaperAttr::Parent as u16, parent);
    }
    builder.nest_end(nest);
}
