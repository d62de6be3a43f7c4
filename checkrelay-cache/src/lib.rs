//! checkrelay Cache - Snapshot Caching and Queue Tailing
//!
//! Two mechanisms keep the gateway from hammering the remote system:
//!
//! - [`RefreshableCache`] serves a slowly changing collection (active jobs,
//!   disk units) for a fixed TTL. A failed refresh is remembered and replayed
//!   until the TTL expires, so a failing remote system sees at most one
//!   attempt per window.
//! - [`TailingEngine`] answers "what is new in this message queue since the
//!   last poll" by comparing against a content watermark rather than an
//!   offset. Watermarks are keyed by [`WatermarkKey`], a one-way digest of
//!   the tenant and the query shape.

pub mod key;
pub mod read;
pub mod refreshable;
pub mod tailing;
pub mod watermark;

pub use key::WatermarkKey;
pub use read::{CacheRead, CacheStats};
pub use refreshable::{QuerySnapshotSource, RefreshableCache, SnapshotSource};
pub use tailing::{MessageQueueReader, PollOutcome, TailingEngine};
pub use watermark::WatermarkStore;
