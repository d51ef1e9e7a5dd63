//! Driver-side shaper operations.

use async_trait::async_trait;

use super::device::Device;
use super::handle::{Handle, Scope};
use super::types::{Capabilities, ShaperInfo};
use crate::Result;

/// Operations a driver implements to apply shapers to hardware.
///
/// Every call receives fully resolved shaper records. A driver that
/// can't honor a request returns [`Error::Unsupported`] with a reason;
/// any other error aborts the enclosing transaction. Calls may block on
/// hardware; the core never holds the device lock across them.
///
/// [`Error::Unsupported`]: crate::Error::Unsupported
#[async_trait]
pub trait ShaperOps: Send + Sync {
    /// Create or update one shaper.
    async fn set(&self, dev: &Device, shaper: &ShaperInfo) -> Result<()>;

    /// Remove one shaper, restoring the default behavior.
    async fn delete(&self, dev: &Device, handle: Handle) -> Result<()>;

    /// Nest `inputs` under `output`, creating or moving shapers as needed.
    async fn group(&self, dev: &Device, inputs: &[ShaperInfo], output: &ShaperInfo)
    -> Result<()>;

    /// Features supported for `scope`.
    async fn capabilities(&self, dev: &Device, scope: Scope) -> Result<Capabilities>;
}
