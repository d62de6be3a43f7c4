//! In-memory remote system for tests.
//!
//! [`ScriptedRemote`] answers every query the handlers issue from data set
//! up by the test, counts opens, disconnects and queries, injects failures,
//! and can hold a query at a [`Gate`] so a test controls when it finishes.

use checkrelay_core::remote::queries;
use checkrelay_core::{
    ActiveJob, CommandRun, Credentials, DiskUnit, GatewayError, GatewayResult, JobQueueStatus,
    QueuedMessage, RawResult, Record, RemoteClient, RemoteQuery, RemoteSession, SocketPolicy,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

// ============================================================================
// GATE
// ============================================================================

/// Blocks queries until released.
#[derive(Debug, Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    entered: AtomicUsize,
}

impl Gate {
    /// Block the calling worker until [`Gate::release`] is called.
    pub fn wait(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = self.opened.wait(open).unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn release(&self) {
        *self.open.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.opened.notify_all();
    }

    /// How many queries have reached the gate.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Poll until `count` queries have reached the gate or `timeout` passes.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.entered() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }
}

// ============================================================================
// SCRIPT
// ============================================================================

#[derive(Default)]
struct Script {
    jobs: Vec<ActiveJob>,
    disks: Vec<DiskUnit>,
    subsystems: Vec<Record>,
    system_status: Record,
    pools: Vec<Record>,
    job_queues: Vec<JobQueueStatus>,
    commands: HashMap<String, CommandRun>,
    /// Oldest first.
    message_queues: HashMap<String, Vec<QueuedMessage>>,
    query_failures: HashMap<String, GatewayError>,
    open_failure: Option<GatewayError>,
    panics: Vec<String>,
    gates: HashMap<String, Arc<Gate>>,
}

#[derive(Default)]
struct Inner {
    script: Mutex<Script>,
    opens: AtomicUsize,
    disconnects: AtomicUsize,
    queries: Mutex<HashMap<String, usize>>,
}

/// Scripted in-memory remote system. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedRemote {
    inner: Arc<Inner>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Data ===

    pub fn set_jobs(&self, jobs: Vec<ActiveJob>) {
        self.script().jobs = jobs;
    }

    pub fn set_disks(&self, disks: Vec<DiskUnit>) {
        self.script().disks = disks;
    }

    pub fn set_subsystems(&self, subsystems: Vec<Record>) {
        self.script().subsystems = subsystems;
    }

    pub fn set_system_status(&self, status: Record) {
        self.script().system_status = status;
    }

    pub fn set_pools(&self, pools: Vec<Record>) {
        self.script().pools = pools;
    }

    pub fn add_job_queue(&self, queue: JobQueueStatus) {
        self.script().job_queues.push(queue);
    }

    pub fn set_command(&self, command: impl Into<String>, run: CommandRun) {
        self.script().commands.insert(command.into(), run);
    }

    /// Append an entry (it becomes the newest) to a queue.
    pub fn push_message(&self, path: impl Into<String>, message: QueuedMessage) {
        self.script()
            .message_queues
            .entry(path.into())
            .or_default()
            .push(message);
    }

    /// Replace a queue's content. `messages` is oldest first.
    pub fn set_messages(&self, path: impl Into<String>, messages: Vec<QueuedMessage>) {
        self.script().message_queues.insert(path.into(), messages);
    }

    // === Failures ===

    /// Fail every run of `query` until cleared.
    pub fn fail_query(&self, query: impl Into<String>, error: GatewayError) {
        self.script().query_failures.insert(query.into(), error);
    }

    pub fn clear_query_failure(&self, query: &str) {
        self.script().query_failures.remove(query);
    }

    /// Fail every session open until cleared.
    pub fn fail_open(&self, error: GatewayError) {
        self.script().open_failure = Some(error);
    }

    pub fn clear_open_failure(&self) {
        self.script().open_failure = None;
    }

    /// Panic inside the worker on every run of `query`.
    pub fn panic_on(&self, query: impl Into<String>) {
        self.script().panics.push(query.into());
    }

    /// Hold every run of `query` at a gate until it is released.
    pub fn gate(&self, query: impl Into<String>) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.script().gates.insert(query.into(), Arc::clone(&gate));
        gate
    }

    // === Counters ===

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet disconnected.
    pub fn open_sessions(&self) -> usize {
        self.opens().saturating_sub(self.disconnects())
    }

    pub fn query_count(&self, query: &str) -> usize {
        self.inner
            .queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(query)
            .copied()
            .unwrap_or(0)
    }

    fn answer(&self, query: &RemoteQuery) -> GatewayResult<RawResult> {
        *self
            .inner
            .queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(query.name.clone())
            .or_insert(0) += 1;

        let gate = self.script().gates.get(&query.name).cloned();
        if let Some(gate) = gate {
            gate.wait();
        }

        let script = self.script();
        if script.panics.contains(&query.name) {
            drop(script);
            panic!("scripted panic in {}", query.name);
        }
        if let Some(error) = script.query_failures.get(&query.name) {
            return Err(error.clone());
        }

        match query.name.as_str() {
            queries::ACTIVE_JOBS => Ok(to_records(&script.jobs)),
            queries::DISK_UNITS => Ok(to_records(&script.disks)),
            queries::SUBSYSTEMS => Ok(script.subsystems.clone()),
            queries::SYSTEM_STATUS => Ok(vec![script.system_status.clone()]),
            queries::SYSTEM_POOLS => Ok(script.pools.clone()),
            queries::JOB_QUEUE => {
                let name = query.param_str("name").unwrap_or_default();
                let library = query.param_str("library").unwrap_or_default();
                let found: Vec<&JobQueueStatus> = script
                    .job_queues
                    .iter()
                    .filter(|q| q.name == name && q.library == library)
                    .collect();
                Ok(to_records(&found))
            }
            queries::RUN_COMMAND => {
                let command = query.param_str("command").unwrap_or_default();
                let run = script.commands.get(command).cloned().unwrap_or(CommandRun {
                    success: true,
                    messages: Vec::new(),
                });
                Ok(to_records(&[run]))
            }
            queries::MESSAGE_QUEUE_LENGTH => {
                let entries = queue(&script, query)?;
                let mut record = Record::new();
                record.insert("length".to_string(), Value::from(entries.len() as u64));
                Ok(vec![record])
            }
            queries::MESSAGE_QUEUE_PAGE => {
                let entries = queue(&script, query)?;
                let offset = query.param_u64("offset").unwrap_or(0) as usize;
                let count = query.param_u64("count").unwrap_or(u64::MAX) as usize;
                let page: Vec<&QueuedMessage> = entries.iter().rev().skip(offset).take(count).collect();
                Ok(to_records(&page))
            }
            queries::MESSAGE_QUEUE_ALL => Ok(to_records(queue(&script, query)?)),
            other => Err(GatewayError::protocol(other, "unknown query")),
        }
    }
}

fn queue<'a>(script: &'a Script, query: &RemoteQuery) -> GatewayResult<&'a Vec<QueuedMessage>> {
    let path = query.param_str("path").unwrap_or_default();
    script
        .message_queues
        .get(path)
        .ok_or_else(|| GatewayError::protocol(&query.name, format!("no message queue {}", path)))
}

/// Serialize values into remote records.
pub fn to_records<T: Serialize>(items: &[T]) -> RawResult {
    items
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(Value::Object(map)) => Some(map.into_iter().collect()),
            _ => None,
        })
        .collect()
}

impl RemoteClient for ScriptedRemote {
    fn open(
        &self,
        _credentials: &Credentials,
        _policy: &SocketPolicy,
    ) -> GatewayResult<Box<dyn RemoteSession>> {
        if let Some(error) = self.script().open_failure.clone() {
            return Err(error);
        }
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            remote: self.clone(),
            connected: true,
        }))
    }
}

struct ScriptedSession {
    remote: ScriptedRemote,
    connected: bool,
}

impl RemoteSession for ScriptedSession {
    fn run_query(&mut self, query: &RemoteQuery) -> GatewayResult<RawResult> {
        if !self.connected {
            return Err(GatewayError::protocol(&query.name, "session disconnected"));
        }
        self.remote.answer(query)
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.remote.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}
