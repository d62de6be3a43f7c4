use super::HandlerContext;
use checkrelay_core::remote::queries;
use checkrelay_core::{CommandRun, GatewayError, GatewayResult, Record, RemoteQuery};
use serde_json::Value;
use tracing::debug;

/// Runs a remote command on a fresh session per call.
///
/// A command that fails remotely is still a successful check: the failure
/// is reported inside the record.
pub struct CommandHandler {
    ctx: HandlerContext,
}

impl CommandHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub fn execute(&self, command: &str) -> GatewayResult<Vec<Record>> {
        let mut session = self.ctx.open_session()?;
        let query = RemoteQuery::new(queries::RUN_COMMAND).with_param("command", command);

        let mut record = Record::new();
        record.insert("cmdName".to_string(), Value::from(command));
        record.insert("status".to_string(), Value::from("success"));

        let mut output = String::new();
        match session.fetch::<CommandRun>(&query) {
            Ok(runs) => {
                let run = runs
                    .into_iter()
                    .next()
                    .ok_or_else(|| GatewayError::protocol(&query.name, "empty result"))?;
                if !run.success {
                    record.insert("status".to_string(), Value::from("failed"));
                    record.insert("message".to_string(), Value::from("command run failed"));
                }
                for message in &run.messages {
                    output.push_str(message);
                    output.push('\n');
                }
            }
            Err(e) => {
                debug!(command, error = %e, "Command run raised an error");
                record.insert("status".to_string(), Value::from("failed"));
                record.insert("message".to_string(), Value::from(format!("exception: {}", e)));
            }
        }
        record.insert("output".to_string(), Value::from(output));
        session.close();

        Ok(vec![record])
    }
}
