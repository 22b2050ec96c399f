//! glaura task command implementations.

use crate::cli::{Context, TaskCommands};
use crate::error::Result;
use crate::events::{rollup_events, Event, EventKind};
use crate::model::Task;
use crate::output::{emit_success, HumanOutput};
use crate::rollup::evaluate::normalized_truthy;
use crate::rollup::{Orchestrator, RollUpReport};
use crate::store::TaskStore;

pub async fn run(context: &Context, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::List { header } => run_list(context, &header).await,
        TaskCommands::Add {
            header,
            name,
            scope,
        } => {
            let (orchestrator, session) = context.orchestrator()?;
            let outcome = orchestrator
                .create_task(&header, &name, session.user(), scope.scope().as_ref())
                .await?;

            let task = &outcome.result.task;
            let mut events =
                vec![Event::new(EventKind::TaskCreated, Some(session.user().to_string()))
                    .with_data(task)?];
            let title = format!("glaura task add: created {}", task.id);
            finish(context, "task add", &outcome, &outcome.rollup, &mut events, title, |human| {
                human.push_summary("task", task.id.clone());
                human.push_summary("name", task.task_name.clone());
                human.push_summary("header", header.clone());
            })
        }
        TaskCommands::Complete {
            header,
            task,
            scope,
        } => {
            let (orchestrator, session) = context.orchestrator()?;
            let outcome = orchestrator
                .complete_task(&header, &task, scope.scope().as_ref())
                .await?;

            let mut events =
                vec![Event::new(EventKind::TaskCompleted, Some(session.user().to_string()))
                    .with_data(&outcome.result)?];
            let stamp = outcome.result.stamp.clone();
            let title = format!("glaura task complete: {task} completed");
            let rollup = &outcome.rollup;
            finish(context, "task complete", &outcome, rollup, &mut events, title, |human| {
                human.push_summary("task", task.clone());
                human.push_summary("completed", format!("{} {}", stamp.date, stamp.time));
            })
        }
        TaskCommands::Rm {
            header,
            task,
            scope,
        } => {
            let (orchestrator, session) = context.orchestrator()?;
            let outcome = orchestrator
                .delete_task(&header, &task, scope.scope().as_ref())
                .await?;

            let mut events =
                vec![Event::new(EventKind::TaskDeleted, Some(session.user().to_string()))
                    .with_data(&outcome.result)?];
            let absent = outcome.result.already_absent;
            let title = if absent {
                format!("glaura task rm: {task} was already gone")
            } else {
                format!("glaura task rm: deleted {task}")
            };
            finish(context, "task rm", &outcome, &outcome.rollup, &mut events, title, |human| {
                human.push_summary("task", task.clone());
                human.push_summary("header", header.clone());
            })
        }
        // Rejected before credentials are resolved.
        TaskCommands::Reopen { task } => Orchestrator::reopen_task(&task),
    }
}

async fn run_list(context: &Context, header_id: &str) -> Result<()> {
    let store = context.store()?;
    let tasks = store.list_tasks_for_header(header_id).await?;

    let mut human = HumanOutput::new(format!(
        "glaura task list: {} task(s) under {header_id}",
        tasks.len()
    ));
    for task in &tasks {
        human.push_detail(format_task(task));
    }
    emit_success(context.output, "task list", &tasks, Some(&human))
}

pub(crate) fn format_task(task: &Task) -> String {
    let mark = if normalized_truthy(&task.status) { "x" } else { " " };
    let mut line = format!("[{mark}] {} {}", task.id, task.task_name);
    if let (Some(date), Some(time)) = (&task.compleated_date, &task.compleated_time) {
        line.push_str(&format!(" (completed {date} {time})"));
    }
    line
}

/// Emit the primary result plus roll-up details and events.
fn finish<T: serde::Serialize>(
    context: &Context,
    command: &str,
    data: &T,
    rollup: &RollUpReport,
    events: &mut Vec<Event>,
    title: String,
    summarize: impl FnOnce(&mut HumanOutput),
) -> Result<()> {
    let actor = events.first().and_then(|event| event.actor.clone());
    events.extend(rollup_events(rollup, actor.as_deref())?);
    context.emit_events(events)?;

    let mut human = HumanOutput::new(title);
    summarize(&mut human);
    context.describe_rollup(rollup, &mut human);
    emit_success(context.output, command, data, Some(&human))
}
