//! Typed net-shaper client.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use super::reply::{parse_caps_reply, parse_group_reply, parse_shaper_reply};
use super::request::ShaperRequest;
use super::server::ShaperServer;
use super::{SHAPER_GENL_NAME, SHAPER_GENL_VERSION};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::genl::{CtrlAttr, CtrlCmd, GENL_HDRLEN, GENL_ID_CTRL, GenlMsgHdr};
use crate::netlink::message::{MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NlMsgError};
use crate::shaper::{Handle, Scope, ScopeCapabilities, ShaperInfo, ShaperPatch};
use crate::{Error, Result};

/// Client for the net-shaper family.
///
/// Builds requests, hands them to a [`ShaperServer`] and decodes the
/// replies. The family id is resolved through the control family on
/// first use and cached.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
/// use nshaper::shaper::{DeviceTable, Handle, Scope, ShaperPatch, SimConfig};
///
/// # async fn example() -> nshaper::Result<()> {
/// let table = Arc::new(DeviceTable::new());
/// table.register_sim(SimConfig::new())?;
/// let conn = ShaperConnection::new(ShaperServer::new(table));
///
/// conn.set(1, &ShaperPatch::new(Handle::new(Scope::Queue, 0)).bw_max(1_000_000)).await?;
/// for shaper in conn.dump(1).await? {
///     println!("{} bw-max {}", shaper.handle, shaper.bw_max);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ShaperConnection {
    server: ShaperServer,
    seq: AtomicU32,
    pid: u32,
    family_id: RwLock<Option<u16>>,
}

impl ShaperConnection {
    /// Create a connection to `server`.
    pub fn new(server: ShaperServer) -> Self {
        Self {
            server,
            seq: AtomicU32::new(1),
            pid: std::process::id(),
            family_id: RwLock::new(None),
        }
    }

    /// The server this connection talks to.
    pub fn server(&self) -> &ShaperServer {
        &self.server
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// The net-shaper family id, resolved once and cached.
    pub async fn family_id(&self) -> Result<u16> {
        if let Some(id) = *self.family_id.read() {
            return Ok(id);
        }

        let id = self.query_family().await?;
        *self.family_id.write() = Some(id);
        Ok(id)
    }

    /// Forget the cached family id.
    pub fn clear_cache(&self) {
        *self.family_id.write() = None;
    }

    async fn query_family(&self) -> Result<u16> {
        let mut builder = MessageBuilder::new(GENL_ID_CTRL, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&GenlMsgHdr::new(CtrlCmd::GetFamily as u8, 1));
        builder.append_attr_str(CtrlAttr::FamilyName as u16, SHAPER_GENL_NAME);

        let payloads = self.exchange(builder).await?;
        let attrs = payloads
            .first()
            .ok_or_else(|| Error::InvalidMessage("empty family reply".into()))?;

        for (kind, payload) in AttrIter::new(attrs) {
            if kind == CtrlAttr::FamilyId as u16 {
                return get::u16_ne(payload);
            }
        }
        Err(Error::InvalidMessage("missing family ID".into()))
    }

    /// Send one request and collect the attribute payloads of its replies.
    async fn request(&self, req: &ShaperRequest) -> Result<Vec<Vec<u8>>> {
        let family_id = self.family_id().await?;
        let flags = if req.is_dump() {
            NLM_F_REQUEST | NLM_F_DUMP
        } else {
            NLM_F_REQUEST | NLM_F_ACK
        };

        let mut builder = MessageBuilder::new(family_id, flags);
        builder.append(&GenlMsgHdr::new(req.cmd() as u8, SHAPER_GENL_VERSION));
        req.write_attrs(&mut builder);
        self.exchange(builder).await
    }

    async fn exchange(&self, mut builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.pid);

        let response = self.server.process(&builder.finish()).await;
        self.collect(&response, seq)
    }

    /// Split a response into data payloads, stopping at the ACK or DONE.
    fn collect(&self, data: &[u8], seq: u32) -> Result<Vec<Vec<u8>>> {
        let mut payloads = Vec::new();

        for result in MessageIter::new(data) {
            let (header, payload) = result?;

            if header.nlmsg_seq != seq {
                continue;
            }

            if header.is_error() {
                let err = NlMsgError::from_bytes(payload)?;
                if !err.is_ack() {
                    return Err(Error::from_errno(
                        err.error,
                        err.ext_message(payload).map(String::from),
                    ));
                }
                break;
            }

            if header.is_done() {
                break;
            }

            let attrs = payload
                .get(GENL_HDRLEN..)
                .ok_or_else(|| Error::InvalidMessage("GENL header too short".into()))?;
            payloads.push(attrs.to_vec());
        }

        Ok(payloads)
    }

    /// Fetch one shaper.
    pub async fn get(&self, ifindex: u32, handle: Handle) -> Result<ShaperInfo> {
        let payloads = self.request(&ShaperRequest::Get { ifindex, handle }).await?;
        let attrs = payloads
            .first()
            .ok_or_else(|| Error::InvalidMessage("empty shaper reply".into()))?;
        parse_shaper_reply(attrs)
    }

    /// Every shaper of a device, in handle order.
    pub async fn dump(&self, ifindex: u32) -> Result<Vec<ShaperInfo>> {
        self.request(&ShaperRequest::Dump { ifindex })
            .await?
            .iter()
            .map(|attrs| parse_shaper_reply(attrs))
            .collect()
    }

    /// Create or update a shaper.
    pub async fn set(&self, ifindex: u32, shaper: &ShaperPatch) -> Result<()> {
        self.request(&ShaperRequest::Set {
            ifindex,
            shaper: *shaper,
        })
        .await?;
        Ok(())
    }

    /// Delete a shaper, and the detached shapers it leaves empty.
    pub async fn delete(&self, ifindex: u32, handle: Handle) -> Result<()> {
        self.request(&ShaperRequest::Delete { ifindex, handle }).await?;
        Ok(())
    }

    /// Nest `inputs` under `output`. Returns the output handle, with
    /// its id filled in when a new detached shaper was created.
    pub async fn group(
        &self,
        ifindex: u32,
        inputs: &[ShaperPatch],
        output: &ShaperPatch,
    ) -> Result<Handle> {
        let payloads = self
            .request(&ShaperRequest::Group {
                ifindex,
                inputs: inputs.to_vec(),
                output: *output,
            })
            .await?;
        let attrs = payloads
            .first()
            .ok_or_else(|| Error::InvalidMessage("empty group reply".into()))?;
        parse_group_reply(attrs)
    }

    /// Capabilities of one scope.
    pub async fn capabilities(&self, ifindex: u32, scope: Scope) -> Result<ScopeCapabilities> {
        let payloads = self
            .request(&ShaperRequest::CapGet { ifindex, scope })
            .await?;
        let attrs = payloads
            .first()
            .ok_or_else(|| Error::InvalidMessage("empty capabilities reply".into()))?;
        parse_caps_reply(attrs)
    }

    /// Capabilities of every scope the device answers for.
    pub async fn capabilities_dump(&self, ifindex: u32) -> Result<Vec<ScopeCapabilities>> {
        self.request(&ShaperRequest::CapDump { ifindex })
            .await?
            .iter()
            .map(|attrs| parse_caps_reply(attrs))
            .collect()
    }
}
