//! Resource-side barrier for branch operations
//!
//! The coordinator delivers branch operations at least once and in no
//! guaranteed order. [`ResourceBarrier::execute`] makes each delivery safe:
//! - a repeated operation is skipped (`Duplicate`)
//! - a compensation with nothing to undo is skipped (`NullCompensation`)
//! - a forward operation after its compensation is skipped (`Suspended`)
//!
//! The barrier needs a store whose transactions also hold the effect's own
//! writes. [`MemoryBarrierStore`] keeps everything in process;
//! [`FjallBarrierStore`] is durable.

mod barrier;
mod durable;
mod error;
mod memory;
mod record;
mod store;

pub use barrier::{BarrierOutcome, BranchBarrier, ResourceBarrier, SkipReason};
pub use durable::{FjallBarrierStore, FjallTx};
pub use error::{BarrierError, Result};
pub use memory::{MemoryBarrierStore, MemoryTx};
pub use record::{BarrierKey, BarrierRecord};
pub use store::{BarrierStore, BarrierTx, DataTx};

pub use futures::future::BoxFuture;
