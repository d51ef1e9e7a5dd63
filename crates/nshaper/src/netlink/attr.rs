//! Netlink attribute (nlattr) handling.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

/// Netlink attribute header (mirrors struct nlattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Stops at the first malformed attribute.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type, payload data).
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }

        let attr = NlAttr::from_bytes(self.data).ok()?;
        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);
        self.data = self.data.get(aligned_len..).unwrap_or(&[]);

        Some((attr.kind(), payload))
    }
}

/// Attributes of one level, indexed by type.
///
/// Later occurrences of a type win, except through [`AttrTable::all`]
/// which keeps every occurrence (multi-attributes).
#[derive(Debug, Default)]
pub struct AttrTable<'a> {
    attrs: Vec<(u16, &'a [u8])>,
}

impl<'a> AttrTable<'a> {
    /// Parse one attribute level.
    ///
    /// Every attribute type must be at most `max`.
    pub fn parse(data: &'a [u8], max: u16) -> Result<Self> {
        let attrs: Vec<(u16, &'a [u8])> = crate::netlink::parse::parse_attrs(data)?;
        if let Some((kind, _)) = attrs.iter().find(|(kind, _)| *kind > max) {
            return Err(Error::InvalidAttribute(format!(
                "unknown attribute type {}",
                kind
            )));
        }
        Ok(Self { attrs })
    }

    /// Payload of the last attribute of type `kind`.
    pub fn get(&self, kind: u16) -> Option<&'a [u8]> {
        self.attrs
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| *v)
    }

    /// Payloads of every attribute of type `kind`, in order.
    pub fn all(&self, kind: u16) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.attrs
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, v)| *v)
    }

    /// True if an attribute of type `kind` is present.
    pub fn has(&self, kind: u16) -> bool {
        self.attrs.iter().any(|(k, _)| *k == kind)
    }

    /// Payload of a mandatory attribute.
    pub fn require(&self, kind: u16, name: &str) -> Result<&'a [u8]> {
        self.get(kind)
            .ok_or_else(|| Error::InvalidRequest(format!("missing '{}' attribute", name)))
    }
}

/// Helper functions for extracting typed values from attribute payloads.
pub mod get {
    use super::*;

    /// Extract a u16 value (native endian).
    pub fn u16_ne(data: &[u8]) -> Result<u16> {
        let bytes: [u8; 2] = data
            .try_into()
            .map_err(|_| Error::InvalidAttribute(format!("bad u16 attribute length {}", data.len())))?;
        Ok(u16::from_ne_bytes(bytes))
    }

    /// Extract a u32 value (native endian).
    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        let bytes: [u8; 4] = data
            .try_into()
            .map_err(|_| Error::InvalidAttribute(format!("bad u32 attribute length {}", data.len())))?;
        Ok(u32::from_ne_bytes(bytes))
    }

    /// Extract a u64 value (native endian).
    pub fn u64_ne(data: &[u8]) -> Result<u64> {
        let bytes: [u8; 8] = data
            .try_into()
            .map_err(|_| Error::InvalidAttribute(format!("bad u64 attribute length {}", data.len())))?;
        Ok(u64::from_ne_bytes(bytes))
    }

    /// Extract a variable width unsigned value (NLA_UINT): 4 or 8 bytes.
    pub fn uint(data: &[u8]) -> Result<u64> {
        match data.len() {
            4 => u32_ne(data).map(u64::from),
            8 => u64_ne(data),
            n => Err(Error::InvalidAttribute(format!(
                "bad uint attribute length {}",
                n
            ))),
        }
    }

    /// Extract a null-terminated string.
    pub fn string(data: &[u8]) -> Result<&str> {
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }

    /// Check that a flag attribute carries no payload.
    pub fn flag(data: &[u8]) -> Result<bool> {
        if !data.is_empty() {
            return Err(Error::InvalidAttribute("flag attribute with payload".into()));
        }
        Ok(true)
    }
}
