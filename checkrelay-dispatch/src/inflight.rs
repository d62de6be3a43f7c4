//! In-flight request filter.
//!
//! Maps a request fingerprint to the time it was admitted. At most one
//! entry exists per fingerprint; admission uses the map's entry API so the
//! check and the insert are one atomic step.
//!
//! [`InFlightFilter::admit`] hands out an [`Admission`] that releases the
//! fingerprint when dropped, until ownership of the release passes to the
//! worker pool's post-execution hook.

use checkrelay_core::clock::elapsed_ms;
use checkrelay_core::{Clock, DispatchError, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct InFlightFilter {
    entries: DashMap<String, Timestamp>,
    clock: Arc<dyn Clock>,
}

impl InFlightFilter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Admit `fingerprint`, or report how long the identical request has been running.
    pub fn try_begin(&self, fingerprint: &str) -> Result<(), DispatchError> {
        match self.entries.entry(fingerprint.to_string()) {
            Entry::Occupied(entry) => Err(DispatchError::DuplicateInFlight {
                elapsed_ms: elapsed_ms(*entry.get(), self.clock.now()),
            }),
            Entry::Vacant(entry) => {
                entry.insert(self.clock.now());
                Ok(())
            }
        }
    }

    /// Release `fingerprint`. Returns whether it was present.
    pub fn finish(&self, fingerprint: &str) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Admit `fingerprint` and return a guard that releases it on drop.
    pub fn admit(self: &Arc<Self>, fingerprint: &str) -> Result<Admission, DispatchError> {
        self.try_begin(fingerprint)?;
        Ok(Admission {
            filter: Arc::clone(self),
            fingerprint: Some(fingerprint.to_string()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An admitted fingerprint, released when the guard drops.
///
/// Covers the window between admission and a successful enqueue, including
/// the submitting future being dropped while it waits for queue space.
#[derive(Debug)]
pub struct Admission {
    filter: Arc<InFlightFilter>,
    fingerprint: Option<String>,
}

impl Admission {
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.as_deref().unwrap_or_default()
    }

    /// Keep the entry; something else now owns its release.
    pub fn hand_off(mut self) {
        self.fingerprint = None;
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(fingerprint) = self.fingerprint.take() {
            self.filter.finish(&fingerprint);
        }
    }
}
