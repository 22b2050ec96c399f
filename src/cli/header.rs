//! glaura header command implementations.

use crate::cli::task::format_task;
use crate::cli::{Context, HeaderCommands};
use crate::error::Result;
use crate::events::{rollup_events, Event, EventKind};
use crate::model::{NewTask, TaskHeader};
use crate::output::{emit_success, HumanOutput};
use crate::rollup::evaluate::{is_header_complete, normalized_truthy};
use crate::store::{HeaderStore, TaskStore};

pub async fn run(context: &Context, command: HeaderCommands) -> Result<()> {
    match command {
        HeaderCommands::List { service } => {
            let store = context.store()?;
            let headers = store
                .list_headers_for_service(&service.job_id, &service.service_id)
                .await?;

            let mut human = HumanOutput::new(format!(
                "glaura header list: {} header(s) for {}",
                headers.len(),
                service.scope().record_id()
            ));
            for header in &headers {
                human.push_detail(format_header(header));
            }
            emit_success(context.output, "header list", &headers, Some(&human))
        }
        HeaderCommands::Show { id } => {
            let store = context.store()?;
            let mut header = store.get_header(&id).await?;
            if header.tasks.is_none() {
                header.tasks = Some(store.list_tasks_for_header(&id).await?);
            }
            let tasks = header.tasks.as_deref().unwrap_or_default();

            let mut human =
                HumanOutput::new(format!("glaura header show: {}", format_header(&header)));
            human.push_summary("job", header.job_id.clone());
            human.push_summary("service", header.service_id.clone());
            human.push_summary("tasks", tasks.len().to_string());
            for task in tasks {
                human.push_detail(format_task(task));
            }
            let recorded = normalized_truthy(&header.status);
            if recorded != is_header_complete(tasks) {
                human.push_warning("recorded status disagrees with its tasks");
                human.push_next_step(format!("glaura rollup header {id}"));
            }
            emit_success(context.output, "header show", &header, Some(&human))
        }
        HeaderCommands::New {
            service,
            name,
            tasks,
        } => {
            let (orchestrator, session) = context.orchestrator()?;
            let initial: Vec<NewTask> = tasks
                .into_iter()
                .map(|task_name| NewTask {
                    task_name,
                    created_by: session.user().to_string(),
                })
                .collect();
            let scope = service.scope();
            let outcome = orchestrator
                .create_header(&scope, &name, session.user(), &initial)
                .await?;

            let actor = session.user().to_string();
            let mut events = vec![Event::new(EventKind::HeaderCreated, Some(actor.clone()))
                .with_data(&outcome.result.header)?];
            events.extend(rollup_events(&outcome.rollup, Some(&actor))?);
            context.emit_events(&events)?;

            let header = &outcome.result.header;
            let mut human = HumanOutput::new(format!("glaura header new: created {}", header.id));
            human.push_summary("name", header.header_name.clone());
            human.push_summary("service", scope.record_id());
            human.push_summary("tasks", initial.len().to_string());
            context.describe_rollup(&outcome.rollup, &mut human);
            emit_success(context.output, "header new", &outcome, Some(&human))
        }
        HeaderCommands::Rm { service, id } => {
            let (orchestrator, session) = context.orchestrator()?;
            let scope = service.scope();
            let outcome = orchestrator.delete_header(&scope, &id).await?;

            let actor = session.user().to_string();
            let mut events = vec![Event::new(EventKind::HeaderDeleted, Some(actor.clone()))
                .with_data(&outcome.result)?];
            events.extend(rollup_events(&outcome.rollup, Some(&actor))?);
            context.emit_events(&events)?;

            let title = if outcome.result.already_absent {
                format!("glaura header rm: {id} was already gone")
            } else {
                format!("glaura header rm: deleted {id}")
            };
            let mut human = HumanOutput::new(title);
            human.push_summary("service", scope.record_id());
            context.describe_rollup(&outcome.rollup, &mut human);
            emit_success(context.output, "header rm", &outcome, Some(&human))
        }
    }
}

fn format_header(header: &TaskHeader) -> String {
    let mark = if normalized_truthy(&header.status) { "x" } else { " " };
    format!("[{mark}] {} {}", header.id, header.header_name)
}
