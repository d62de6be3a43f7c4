//! Lazily initialized, memoized handler slots.
//!
//! Each tenant dispatcher owns one slot per handler category. A slot is
//! filled on first use and keeps its handler for the dispatcher's
//! lifetime. Initialization runs under the slot's lock, so concurrent
//! first uses construct the handler once. A failed initialization leaves
//! the slot empty and the next use tries again.

use crate::handlers::{CommandHandler, DiskHandler, JobHandler, SubsystemHandler, SystemHandler};
use checkrelay_core::{GatewayError, GatewayResult};
use std::sync::{Arc, Mutex};

pub struct HandlerSlot<H> {
    name: &'static str,
    cell: Mutex<Option<Arc<H>>>,
}

impl<H> HandlerSlot<H> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: Mutex::new(None),
        }
    }

    pub fn get_or_try_init(
        &self,
        init: impl FnOnce() -> GatewayResult<H>,
    ) -> GatewayResult<Arc<H>> {
        let mut cell = self
            .cell
            .lock()
            .map_err(|_| GatewayError::lock_poisoned(format!("{} handler slot", self.name)))?;
        if let Some(handler) = cell.as_ref() {
            return Ok(Arc::clone(handler));
        }
        let handler = Arc::new(init()?);
        *cell = Some(Arc::clone(&handler));
        Ok(handler)
    }

    pub fn get(&self) -> Option<Arc<H>> {
        self.cell.lock().ok().and_then(|cell| cell.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.get().is_some()
    }

    /// Drop the memoized handler.
    pub fn clear(&self) {
        if let Ok(mut cell) = self.cell.lock() {
            cell.take();
        }
    }
}

/// Handler categories memoized per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerCategory {
    Jobs,
    Disks,
    System,
    Subsystems,
    Commands,
}

/// The slot arena of one tenant dispatcher.
pub struct HandlerSlots {
    pub jobs: HandlerSlot<JobHandler>,
    pub disks: HandlerSlot<DiskHandler>,
    pub system: HandlerSlot<SystemHandler>,
    pub subsystems: HandlerSlot<SubsystemHandler>,
    pub commands: HandlerSlot<CommandHandler>,
}

impl HandlerSlots {
    pub fn new() -> Self {
        Self {
            jobs: HandlerSlot::new("jobs"),
            disks: HandlerSlot::new("disks"),
            system: HandlerSlot::new("system"),
            subsystems: HandlerSlot::new("subsystems"),
            commands: HandlerSlot::new("commands"),
        }
    }

    /// Categories whose handler has been constructed.
    pub fn initialized(&self) -> Vec<HandlerCategory> {
        [
            (HandlerCategory::Jobs, self.jobs.is_initialized()),
            (HandlerCategory::Disks, self.disks.is_initialized()),
            (HandlerCategory::System, self.system.is_initialized()),
            (HandlerCategory::Subsystems, self.subsystems.is_initialized()),
            (HandlerCategory::Commands, self.commands.is_initialized()),
        ]
        .into_iter()
        .filter_map(|(category, ready)| ready.then_some(category))
        .collect()
    }

    /// Drop every handler, closing persistent sessions.
    pub fn clear(&self) {
        self.jobs.clear();
        self.disks.clear();
        self.system.clear();
        self.subsystems.clear();
        self.commands.clear();
    }
}

impl Default for HandlerSlots {
    fn default() -> Self {
        Self::new()
    }
}
