//! Error types for shaper operations and the net-shaper transport.

use std::io;

use crate::shaper::Handle;

/// Result type for shaper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation is not legal for the handle's scope.
    InvalidScope,
    /// Semantically malformed request.
    InvalidRequest,
    /// Handle absent from the store.
    NotFound,
    /// Delete blocked by a nonzero child count.
    HasChildren,
    /// Id space exhausted.
    ResourceExhausted,
    /// Allocation failure.
    OutOfMemory,
    /// The backend declined the request.
    Unsupported,
    /// The backend reported any other failure.
    BackendFailure,
}

/// Errors that can occur while managing shapers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation is not legal for this handle's scope.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Malformed request, or a reference to a node that must (or must not) exist.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No shaper with the given handle.
    #[error("shaper {handle} not found")]
    NotFound {
        /// The handle that was looked up.
        handle: Handle,
    },

    /// A detached shaper still has nested shapers.
    #[error("can't delete detached shaper {handle} with {children} children")]
    HasChildren {
        /// The detached shaper.
        handle: Handle,
        /// Its current child count.
        children: u32,
    },

    /// No more ids can be allocated.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Memory for a cached shaper could not be allocated.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The device or its driver can't honor the request.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// The driver failed the request.
    #[error("backend failure: {message} (errno {errno})")]
    Backend {
        /// Positive errno reported by the driver.
        errno: i32,
        /// Human-readable reason.
        message: String,
    },

    /// No device registered under this ifindex.
    #[error("device {ifindex} not found")]
    DeviceNotFound {
        /// The interface index that was requested.
        ifindex: u32,
    },

    /// Error reply decoded from the transport.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the reply.
        errno: i32,
        /// Extended ack message, or the errno description.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// I/O error while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[cfg(feature = "output")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a backend failure from an errno value (sign is ignored).
    pub fn backend(errno: i32, message: impl Into<String>) -> Self {
        Self::Backend {
            errno: errno.abs(),
            message: message.into(),
        }
    }

    /// Create an error from a negative errno carried in an error reply.
    ///
    /// `message` is the extended ack text; when absent the errno
    /// description is used.
    pub fn from_errno(errno: i32, message: Option<String>) -> Self {
        let message =
            message.unwrap_or_else(|| io::Error::from_raw_os_error(-errno).to_string());
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Classify this error.
    ///
    /// Codec errors and decoded replies are classified by errno; a
    /// decoded `EINVAL` is reported as [`ErrorKind::InvalidRequest`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidScope(_) => ErrorKind::InvalidScope,
            Self::InvalidRequest(_)
            | Self::DeviceNotFound { .. }
            | Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidAttribute(_) => ErrorKind::InvalidRequest,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::HasChildren { .. } => ErrorKind::HasChildren,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Kernel { errno, .. } => match *errno {
                libc::EINVAL => ErrorKind::InvalidRequest,
                libc::ENOENT => ErrorKind::NotFound,
                libc::ENOSPC => ErrorKind::ResourceExhausted,
                libc::ENOMEM => ErrorKind::OutOfMemory,
                libc::EOPNOTSUPP => ErrorKind::Unsupported,
                _ => ErrorKind::BackendFailure,
            },
            _ => ErrorKind::BackendFailure,
        }
    }

    /// Positive errno equivalent used when encoding an error reply.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidScope(_)
            | Self::InvalidRequest(_)
            | Self::HasChildren { .. }
            | Self::DeviceNotFound { .. }
            | Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidAttribute(_) => libc::EINVAL,
            Self::NotFound { .. } => libc::ENOENT,
            Self::ResourceExhausted(_) => libc::ENOSPC,
            Self::OutOfMemory(_) => libc::ENOMEM,
            Self::Unsupported(_) => libc::EOPNOTSUPP,
            Self::Backend { errno, .. } | Self::Kernel { errno, .. } => *errno,
            Self::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            #[cfg(feature = "output")]
            Self::Json(_) => libc::EINVAL,
        }
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound) || matches!(self, Self::DeviceNotFound { .. })
    }

    /// Check if the backend or device declined the request.
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }
}
