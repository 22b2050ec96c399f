//! glaura service command implementations.

use serde::Serialize;

use crate::cli::{Context, ServiceCommands};
use crate::error::Result;
use crate::model::NewService;
use crate::output::{emit_success, HumanOutput};
use crate::rollup::evaluate::normalized_truthy;
use crate::store::ServiceStore;

#[derive(Serialize)]
struct DeletedService {
    service_id: String,
}

pub async fn run(context: &Context, command: ServiceCommands) -> Result<()> {
    match command {
        ServiceCommands::List { job_id } => {
            let store = context.store()?;
            let services = store.list_services_for_port_call(&job_id).await?;

            let mut human = HumanOutput::new(format!(
                "glaura service list: {} service(s) for {job_id}",
                services.len()
            ));
            for service in &services {
                let mark = if normalized_truthy(&service.status) { "x" } else { " " };
                let mut line = format!("[{mark}] {} {}", service.record_id(), service.service_name);
                if let Some(vendor) = &service.vendor_name {
                    line.push_str(&format!(" ({vendor})"));
                }
                human.push_detail(line);
            }
            emit_success(context.output, "service list", &services, Some(&human))
        }
        ServiceCommands::New {
            service,
            name,
            vendor_id,
            vendor_name,
        } => {
            let store = context.store()?;
            let created = store
                .create_service(&NewService {
                    job_id: service.job_id,
                    service_id: service.service_id,
                    service_name: name,
                    vendor_id,
                    vendor_name,
                })
                .await?;
            tracing::info!(service_id = %created.record_id(), "service created");

            let mut human =
                HumanOutput::new(format!("glaura service new: created {}", created.record_id()));
            human.push_summary("name", created.service_name.clone());
            if let Some(vendor) = &created.vendor_name {
                human.push_summary("vendor", vendor.clone());
            }
            emit_success(context.output, "service new", &created, Some(&human))
        }
        ServiceCommands::Rm { service } => {
            let store = context.store()?;
            let record_id = service.scope().record_id();
            store.delete_service(&record_id).await?;
            tracing::info!(service_id = %record_id, "service deleted");

            let human = HumanOutput::new(format!("glaura service rm: deleted {record_id}"));
            emit_success(
                context.output,
                "service rm",
                &DeletedService {
                    service_id: record_id.clone(),
                },
                Some(&human),
            )
        }
    }
}
