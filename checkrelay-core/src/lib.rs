//! checkrelay Core - Shared Types and Contracts
//!
//! Everything the dispatch and cache layers agree on lives here: tenant
//! credentials, the inbound check request, the response envelope, the
//! error taxonomy, configuration, and the remote session contract.
//! This crate performs no I/O of its own.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub mod check;
pub mod clock;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod message;
pub mod records;
pub mod remote;
pub mod request;
pub mod response;

// ============================================================================
// SHARED TYPE ALIASES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// One result entry: a string-keyed attribute map, as returned to callers.
pub type Record = BTreeMap<String, serde_json::Value>;

/// SHA-256 digest used for credential and watermark keys.
pub type Digest32 = [u8; 32];

/// Compute the SHA-256 digest of a sequence of parts.
///
/// Parts are separated by a unit separator byte so that `("ab", "c")` and
/// `("a", "bc")` never collide.
pub fn digest_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Digest32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update([0x1f]);
    }
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use check::{CheckName, PoolKind};
pub use clock::{Clock, SystemClock};
pub use config::GatewayConfig;
pub use credentials::{CredentialKey, Credentials};
pub use error::{
    ConfigError, DispatchError, ErrorKind, GatewayError, GatewayResult, RemoteError, RequestError,
};
pub use filter::{MessageFilter, SeverityBand};
pub use message::{MessageQueueQuery, QueuedMessage};
pub use records::{ActiveJob, CommandRun, DiskUnit, JobQueueRef, JobQueueStatus};
pub use remote::{
    RawResult, RemoteClient, RemoteQuery, RemoteSession, SessionFactory, SessionGuard,
    SocketPolicy,
};
pub use request::CheckRequest;
pub use response::{CheckResponse, ResponseCode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_parts_separates_boundaries() {
        let a = digest_parts([b"ab".as_slice(), b"c".as_slice()]);
        let b = digest_parts([b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_parts_is_deterministic() {
        let a = digest_parts([b"host".as_slice(), b"login".as_slice()]);
        let b = digest_parts([b"host".as_slice(), b"login".as_slice()]);
        assert_eq!(a, b);
    }
}
