//! Watermark keys for message queue tailing.
//!
//! A key is a SHA-256 digest of the tenant (host and login, lowercased)
//! and the full query shape: queue path, identifier pattern and severity
//! band. Two differently filtered reads of the same queue therefore keep
//! independent watermarks. The digest is one-way; nothing ever needs to
//! recover the inputs.

use checkrelay_core::{digest_parts, Credentials, Digest32, MessageQueueQuery};
use std::fmt;

/// Opaque watermark key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WatermarkKey {
    /// Private inner data - only [`WatermarkKey::derive`] constructs keys.
    inner: KeyInner,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    digest: Digest32,
}

impl WatermarkKey {
    pub fn derive(credentials: &Credentials, query: &MessageQueueQuery) -> Self {
        let host = credentials.host().to_ascii_lowercase();
        let login = credentials.login().to_ascii_lowercase();
        // Tag byte keeps "no pattern" distinct from an empty pattern.
        let pattern = match &query.id_pattern {
            Some(p) => [&[1u8][..], p.as_bytes()].concat(),
            None => vec![0u8],
        };
        let min = query.band.min.to_be_bytes();
        let max = query.band.max.to_be_bytes();

        let digest = digest_parts([
            host.as_bytes(),
            login.as_bytes(),
            query.path.as_bytes(),
            pattern.as_slice(),
            &min[..],
            &max[..],
        ]);
        Self {
            inner: KeyInner { digest },
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.inner.digest
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.digest)
    }
}

impl fmt::Debug for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WatermarkKey({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
