//! glaura rollup: manual reconciliation of header and service status.

use crate::cli::{Context, RollupCommands};
use crate::error::Result;
use crate::events::{rollup_events, Event};
use crate::output::{emit_success, HumanOutput};

pub async fn run(context: &Context, command: RollupCommands) -> Result<()> {
    let (orchestrator, session) = context.orchestrator()?;
    let actor = session.user().to_string();

    match command {
        RollupCommands::Header { id, scope } => {
            let report = orchestrator.roll_up_header(&id, scope.scope().as_ref()).await;
            context.emit_events(&rollup_events(&report, Some(&actor))?)?;

            let mut human = HumanOutput::new(format!(
                "glaura rollup header: {} write(s) for {id}",
                report.writes()
            ));
            context.describe_rollup(&report, &mut human);
            emit_success(context.output, "rollup header", &report, Some(&human))
        }
        RollupCommands::Service { service } => {
            let scope = service.scope();
            let report = orchestrator.roll_up_service(&scope).await;
            context.emit_events(&rollup_events(&report, Some(&actor))?)?;

            let mut human = HumanOutput::new(format!(
                "glaura rollup service: {} write(s) for {}",
                report.writes(),
                scope.record_id()
            ));
            context.describe_rollup(&report, &mut human);
            emit_success(context.output, "rollup service", &report, Some(&human))
        }
        RollupCommands::PortCall { job_id } => {
            let result = orchestrator.reconcile_port_call(&job_id).await?;

            let mut events: Vec<Event> = Vec::new();
            for report in &result.services {
                events.extend(rollup_events(report, Some(&actor))?);
            }
            context.emit_events(&events)?;

            let mut human = HumanOutput::new(format!(
                "glaura rollup port-call: {} service(s), {} write(s)",
                result.services.len(),
                result.writes()
            ));
            human.push_summary("job", job_id.clone());
            human.push_summary(
                "all services complete",
                result.all_services_complete.to_string(),
            );
            for report in &result.services {
                context.describe_rollup(report, &mut human);
            }
            emit_success(context.output, "rollup port-call", &result, Some(&human))
        }
    }
}
