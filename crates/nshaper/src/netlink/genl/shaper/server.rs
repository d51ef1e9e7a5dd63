//! In-process net-shaper request server.

use std::sync::Arc;

use super::reply::{write_caps, write_group_reply, write_shaper};
use super::request::ShaperRequest;
use super::{SHAPER_FAMILY_ID, SHAPER_GENL_NAME, SHAPER_GENL_VERSION, ShaperAttr, ShaperCmd};
use crate::netlink::attr::{AttrTable, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::genl::{CtrlAttr, CtrlCmd, GENL_ID_CTRL, GenlMsgHdr};
use crate::netlink::message::{
    NLM_F_ACK_TLVS, NLM_F_CAPPED, NLM_F_MULTI, NLM_F_REQUEST, NLMSGERR_ATTR_MSG, NlMsgError,
    NlMsgHdr, NlMsgType,
};
use crate::netlink::parse::{GenlRequest, parse_genl_messages};
use crate::shaper::{Device, DeviceTable, Handle, ScopeCapabilities, ShaperInfo};
use crate::{Error, Result};

/// Shapers emitted per dump batch.
pub const DUMP_CHUNK: usize = 32;

/// Position within a shaper dump.
///
/// Holds the last handle emitted; the next batch starts strictly after
/// it, so a resumed dump never repeats or skips a committed shaper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpCursor {
    last: Option<Handle>,
}

impl DumpCursor {
    /// Cursor at the start of the dump.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor resuming after `handle`.
    pub fn after(handle: Handle) -> Self {
        Self { last: Some(handle) }
    }

    /// Last handle emitted, if any.
    pub fn last(&self) -> Option<Handle> {
        self.last
    }

    /// Fetch up to `limit` shapers and advance past them.
    ///
    /// An empty batch means the dump is complete.
    pub fn next_batch(&mut self, dev: &Device, limit: usize) -> Result<Vec<ShaperInfo>> {
        let batch = dev.dump(self.last, limit)?;
        if let Some(shaper) = batch.last() {
            self.last = Some(shaper.handle);
        }
        Ok(batch)
    }
}

/// Serves the control and net-shaper families over a [`DeviceTable`].
///
/// Takes raw request bytes and returns raw reply bytes, the way a
/// netlink socket would exchange them with the kernel.
#[derive(Debug, Clone)]
pub struct ShaperServer {
    table: Arc<DeviceTable>,
    chunk: usize,
}

impl ShaperServer {
    /// Create a server for the devices in `table`.
    pub fn new(table: Arc<DeviceTable>) -> Self {
        Self {
            table,
            chunk: DUMP_CHUNK,
        }
    }

    /// Set the number of shapers fetched per dump batch.
    pub fn with_dump_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// The device table.
    pub fn table(&self) -> &Arc<DeviceTable> {
        &self.table
    }

    /// Process every request in `data` and return the replies.
    pub async fn process(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();

        let requests = match parse_genl_messages(data) {
            Ok(requests) => requests,
            Err(e) => {
                let header = NlMsgHdr::from_bytes(data).copied().unwrap_or_default();
                push_error(&mut out, &header, &e);
                return out;
            }
        };

        for req in &requests {
            if req.header.nlmsg_flags & NLM_F_REQUEST == 0 {
                continue;
            }

            let mut reply = Vec::new();
            match self.dispatch(req, &mut reply).await {
                Ok(()) => {
                    out.extend(reply);
                    if req.header.wants_ack() && !req.header.is_dump() {
                        push_ack(&mut out, &req.header);
                    }
                }
                Err(e) => {
                    tracing::debug!(cmd = req.genl.cmd, error = %e, "request failed");
                    push_error(&mut out, &req.header, &e);
                }
            }
        }

        out
    }

    async fn dispatch(&self, req: &GenlRequest<'_>, out: &mut Vec<u8>) -> Result<()> {
        match req.header.nlmsg_type {
            GENL_ID_CTRL => self.ctrl(req, out),
            SHAPER_FAMILY_ID => self.shaper(req, out).await,
            other => Err(Error::Unsupported(format!(
                "unknown generic netlink family {}",
                other
            ))),
        }
    }

    /// Control family: only family resolution by name.
    fn ctrl(&self, req: &GenlRequest<'_>, out: &mut Vec<u8>) -> Result<()> {
        if req.genl.cmd != CtrlCmd::GetFamily as u8 {
            return Err(Error::Unsupported(format!(
                "unsupported control command {}",
                req.genl.cmd
            )));
        }

        let tb = AttrTable::parse(req.attrs, CtrlAttr::MaxAttr as u16)?;
        let name = get::string(tb.require(CtrlAttr::FamilyName as u16, "family name")?)?;
        if name != SHAPER_GENL_NAME {
            return Err(Error::from_errno(
                -libc::ENOENT,
                Some(format!("unknown family {}", name)),
            ));
        }

        let mut builder = reply_builder(&req.header, 0);
        builder.append(&GenlMsgHdr::new(CtrlCmd::NewFamily as u8, 2));
        builder.append_attr_u16(CtrlAttr::FamilyId as u16, SHAPER_FAMILY_ID);
        builder.append_attr_str(CtrlAttr::FamilyName as u16, SHAPER_GENL_NAME);
        builder.append_attr_u32(CtrlAttr::Version as u16, SHAPER_GENL_VERSION as u32);
        builder.append_attr_u32(CtrlAttr::HdrSize as u16, 0);
        builder.append_attr_u32(CtrlAttr::MaxAttr as u16, ShaperAttr::MAX as u32);
        out.extend(builder.finish());
        Ok(())
    }

    async fn shaper(&self, req: &GenlRequest<'_>, out: &mut Vec<u8>) -> Result<()> {
        let cmd = ShaperCmd::from_u8(req.genl.cmd).ok_or_else(|| {
            Error::Unsupported(format!("unknown net-shaper command {}", req.genl.cmd))
        })?;
        let request = ShaperRequest::parse(cmd, req.header.is_dump(), req.attrs)?;
        tracing::debug!(?cmd, ifindex = request.ifindex(), dump = request.is_dump(), "net-shaper request");

        let dev = self.table.get_shaper_device(request.ifindex())?;
        let hdr = &req.header;

        match request {
            ShaperRequest::Get { handle, .. } => {
                let shaper = dev.get(handle)?;
                push_reply(out, hdr, cmd, 0, |b| write_shaper(b, &shaper));
            }
            ShaperRequest::Dump { .. } => {
                let mut cursor = DumpCursor::new();
                loop {
                    let batch = cursor.next_batch(&dev, self.chunk)?;
                    if batch.is_empty() {
                        break;
                    }
                    for shaper in &batch {
                        push_reply(out, hdr, cmd, NLM_F_MULTI, |b| write_shaper(b, shaper));
                    }
                }
                push_done(out, hdr);
            }
            ShaperRequest::Set { shaper, .. } => {
                dev.set(&shaper).await?;
            }
            ShaperRequest::Delete { handle, .. } => {
                dev.delete(handle).await?;
            }
            ShaperRequest::Group { inputs, output, .. } => {
                let handle = dev.group(&inputs, &output).await?;
                push_reply(out, hdr, cmd, 0, |b| write_group_reply(b, handle));
            }
            ShaperRequest::CapGet { ifindex, scope } => {
                let caps = dev.capabilities(scope).await?;
                let caps = ScopeCapabilities {
                    ifindex,
                    scope,
                    caps,
                };
                push_reply(out, hdr, cmd, 0, |b| write_caps(b, &caps));
            }
            ShaperRequest::CapDump { .. } => {
                for caps in dev.capabilities_all().await? {
                    push_reply(out, hdr, cmd, NLM_F_MULTI, |b| write_caps(b, &caps));
                }
                push_done(out, hdr);
            }
        }

        Ok(())
    }
}

fn reply_builder(req: &NlMsgHdr, flags: u16) -> MessageBuilder {
    let mut builder = MessageBuilder::new(req.nlmsg_type, flags);
    builder.set_seq(req.nlmsg_seq);
    builder.set_pid(req.nlmsg_pid);
    builder
}

fn push_reply(
    out: &mut Vec<u8>,
    req: &NlMsgHdr,
    cmd: ShaperCmd,
    flags: u16,
    fill: impl FnOnce(&mut MessageBuilder),
) {
    let mut builder = reply_builder(req, flags);
    builder.append(&GenlMsgHdr::new(cmd as u8, SHAPER_GENL_VERSION));
    fill(&mut builder);
    out.extend(builder.finish());
}

fn push_done(out: &mut Vec<u8>, req: &NlMsgHdr) {
    let mut builder = MessageBuilder::new(NlMsgType::DONE, NLM_F_MULTI);
    builder.set_seq(req.nlmsg_seq);
    builder.set_pid(req.nlmsg_pid);
    builder.append(&0i32);
    out.extend(builder.finish());
}

fn push_ack(out: &mut Vec<u8>, req: &NlMsgHdr) {
    let mut builder = MessageBuilder::new(NlMsgType::ERROR, NLM_F_CAPPED);
    builder.set_seq(req.nlmsg_seq);
    builder.set_pid(req.nlmsg_pid);
    builder.append(&NlMsgError::new(0, *req));
    out.extend(builder.finish());
}

fn push_error(out: &mut Vec<u8>, req: &NlMsgHdr, err: &Error) {
    let mut builder = MessageBuilder::new(NlMsgType::ERROR, NLM_F_CAPPED | NLM_F_ACK_TLVS);
    builder.set_seq(req.nlmsg_seq);
    builder.set_pid(req.nlmsg_pid);
    builder.append(&NlMsgError::new(-err.errno(), *req));
    builder.append_attr_str(NLMSGERR_ATTR_MSG, &reason(err));
    out.extend(builder.finish());
}

/// Extended ack text: replies decoded by a client already carry one.
fn reason(err: &Error) -> String {
    match err {
        Error::Kernel { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
