//! Shaper handles.
//!
//! A handle packs a [`Scope`] into the 6 high bits and a scope-relative
//! id into the 26 low bits of a `u32`. Ordering handles by their packed
//! value groups them by scope, then by id.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Bit offset of the scope field.
pub const SCOPE_SHIFT: u32 = 26;

/// Mask of the id field.
pub const ID_MASK: u32 = (1 << SCOPE_SHIFT) - 1;

/// Reserved id asking for a freshly allocated detached id.
pub const ID_UNSPEC: u32 = ID_MASK;

/// Pack a raw scope value and id into a handle value.
///
/// Bits of `id` above the id field are dropped.
pub const fn make_handle(scope: u32, id: u32) -> u32 {
    (scope << SCOPE_SHIFT) | (id & ID_MASK)
}

/// Extract the raw scope value from a packed handle.
pub const fn scope_of(handle: u32) -> u32 {
    handle >> SCOPE_SHIFT
}

/// Extract the id from a packed handle.
pub const fn id_of(handle: u32) -> u32 {
    handle & ID_MASK
}

/// Structural tier of a shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u32)]
pub enum Scope {
    /// No scope; only valid as "no parent".
    #[default]
    Unspec = 0,
    /// Root shaper of the whole hardware.
    Port = 1,
    /// Main shaper of a network device.
    Netdev = 2,
    /// Shaper attached to a transmit queue, id is the queue number.
    Queue = 3,
    /// Free-floating grouping shaper, id is an allocated slot.
    Detached = 4,
    /// Shaper attached to a virtual function. Never exposed on the wire.
    Vf = 5,
}

impl Scope {
    /// Scopes that can be named in requests, in ascending order.
    pub const EXPOSED: [Scope; 5] = [
        Scope::Unspec,
        Scope::Port,
        Scope::Netdev,
        Scope::Queue,
        Scope::Detached,
    ];

    /// Largest scope accepted from the wire.
    pub const MAX_EXPOSED: Scope = Scope::Detached;

    /// Parse from the raw scope value.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Scope::Unspec),
            1 => Some(Scope::Port),
            2 => Some(Scope::Netdev),
            3 => Some(Scope::Queue),
            4 => Some(Scope::Detached),
            5 => Some(Scope::Vf),
            _ => None,
        }
    }

    /// Raw scope value.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Scope::Unspec => "unspec",
            Scope::Port => "port",
            Scope::Netdev => "netdev",
            Scope::Queue => "queue",
            Scope::Detached => "detached",
            Scope::Vf => "vf",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unspec" => Ok(Scope::Unspec),
            "port" => Ok(Scope::Port),
            "netdev" | "dev" => Ok(Scope::Netdev),
            "queue" | "q" => Ok(Scope::Queue),
            "detached" | "group" => Ok(Scope::Detached),
            "vf" => Ok(Scope::Vf),
            _ => Err(Error::InvalidRequest(format!("unknown scope '{}'", s))),
        }
    }
}

/// Unique identifier of a shaper within a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Handle {
    scope: Scope,
    id: u32,
}

impl Handle {
    /// The "no parent" handle.
    pub const NONE: Handle = Handle {
        scope: Scope::Unspec,
        id: 0,
    };

    /// Create a handle. Bits of `id` above the id field are dropped.
    pub const fn new(scope: Scope, id: u32) -> Self {
        Self {
            scope,
            id: id & ID_MASK,
        }
    }

    /// Decode a packed handle value.
    ///
    /// Returns `None` if the scope bits name no known scope.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Scope::from_u32(scope_of(raw)).map(|scope| Self::new(scope, id_of(raw)))
    }

    /// Packed handle value.
    pub const fn to_raw(self) -> u32 {
        make_handle(self.scope as u32, self.id)
    }

    /// The handle's scope.
    pub const fn scope(self) -> Scope {
        self.scope
    }

    /// The handle's scope-relative id.
    pub const fn id(self) -> u32 {
        self.id
    }

    /// True if the id asks for allocation.
    pub const fn is_id_unspec(self) -> bool {
        self.id == ID_UNSPEC
    }

    /// Parent used when none was given and no shaper is cached yet.
    pub fn default_parent(self) -> Handle {
        match self.scope {
            Scope::Port | Scope::Unspec => Handle::NONE,
            Scope::Queue | Scope::Detached => Handle::new(Scope::Netdev, 0),
            Scope::Netdev | Scope::Vf => Handle::new(Scope::Port, 0),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_id_unspec() {
            write!(f, "{}", self.scope)
        } else {
            write!(f, "{}:{}", self.scope, self.id)
        }
    }
}

impl FromStr for Handle {
    type Err = Error;

    /// Parse `scope[:id]`. A missing id means "allocate" for detached
    /// handles and 0 for every other scope.
    fn from_str(s: &str) -> Result<Self> {
        let (scope, id) = match s.split_once(':') {
            Some((scope, id)) => (scope, Some(id)),
            None => (s, None),
        };
        let scope: Scope = scope.parse()?;

        let id = match id {
            Some(id) => {
                let id = crate::util::parse::get_u32(id)
                    .map_err(|e| Error::InvalidRequest(format!("bad shaper id: {}", e)))?;
                if id > ID_MASK {
                    return Err(Error::InvalidRequest(format!(
                        "shaper id {} exceeds {} bits",
                        id, SCOPE_SHIFT
                    )));
                }
                id
            }
            None if scope == Scope::Detached => ID_UNSPEC,
            None => 0,
        };

        Ok(Handle::new(scope, id))
    }
}

impl From<Handle> for u32 {
    fn from(h: Handle) -> u32 {
        h.to_raw()
    }
}
