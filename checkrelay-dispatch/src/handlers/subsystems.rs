use super::HandlerContext;
use checkrelay_core::records::project;
use checkrelay_core::remote::queries;
use checkrelay_core::{GatewayResult, Record, RemoteQuery};

const SUBSYSTEM_FIELDS: &[&str] = &["name", "path", "library", "status", "currentActiveJobs"];

/// Subsystem listing. Opens a session per call.
pub struct SubsystemHandler {
    ctx: HandlerContext,
}

impl SubsystemHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub fn list_subsystems(&self) -> GatewayResult<Vec<Record>> {
        let mut session = self.ctx.open_session()?;
        let rows = session.run_query(&RemoteQuery::new(queries::SUBSYSTEMS))?;
        session.close();
        Ok(rows.iter().map(|row| project(row, SUBSYSTEM_FIELDS)).collect())
    }
}
