//! Check names and pool routing.

use std::fmt;

/// A supported check, parsed case-insensitively from the request command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckName {
    ListJobs,
    ListDisks,
    ListSubsystems,
    GetSystem,
    PageFault,
    ExecuteCommand,
    GetJobQueues,
    GetErrorMessageQueue,
    GetNewMessageInMessageQueue,
}

impl CheckName {
    pub const ALL: [CheckName; 9] = [
        CheckName::ListJobs,
        CheckName::ListDisks,
        CheckName::ListSubsystems,
        CheckName::GetSystem,
        CheckName::PageFault,
        CheckName::ExecuteCommand,
        CheckName::GetJobQueues,
        CheckName::GetErrorMessageQueue,
        CheckName::GetNewMessageInMessageQueue,
    ];

    pub fn parse(command: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|check| check.as_str().eq_ignore_ascii_case(command.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::ListJobs => "listJobs",
            CheckName::ListDisks => "listDisks",
            CheckName::ListSubsystems => "listSubsystems",
            CheckName::GetSystem => "getSystem",
            CheckName::PageFault => "pageFault",
            CheckName::ExecuteCommand => "executeCommand",
            CheckName::GetJobQueues => "getJobQueues",
            CheckName::GetErrorMessageQueue => "getErrorMessageQueue",
            CheckName::GetNewMessageInMessageQueue => "getNewMessageInMessageQueue",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of a tenant's worker pools runs a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Global,
    Jobs,
    Disks,
}

impl PoolKind {
    /// Route a raw command. Unknown commands go to the global pool, where they
    /// are answered with an error.
    pub fn for_command(command: &str) -> Self {
        match CheckName::parse(command) {
            Some(CheckName::ListJobs) => PoolKind::Jobs,
            Some(CheckName::ListDisks) => PoolKind::Disks,
            _ => PoolKind::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Global => "global",
            PoolKind::Jobs => "job",
            PoolKind::Disks => "disk",
        }
    }
}
