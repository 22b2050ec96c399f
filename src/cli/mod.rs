//! Command-line interface for glaura
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::events::{Event, EventDestination};
use crate::model::ServiceScope;
use crate::output::{HumanOutput, OutputOptions};
use crate::rollup::{Orchestrator, RollUpPolicy, RollUpReport};
use crate::session::{resolve_session, Session, SessionFile};
use crate::store::http::HttpStore;

mod header;
mod rollup;
mod service;
mod session;
mod task;

/// glaura - port-call task tracking and completion roll-up
///
/// Drives task, header and service records of the port-call API and keeps
/// header and service completion in line with their tasks.
#[derive(Parser, Debug)]
#[command(name = "glaura")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to glaura.toml
    #[arg(long, global = true, env = "GLAURA_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL (overrides api.base_url)
    #[arg(long, global = true, env = "GLAURA_API")]
    pub api: Option<String>,

    /// Bearer token for this invocation
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// User recorded as creator of new records
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Location of the cached session file
    #[arg(long, global = true, env = "GLAURA_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Write JSONL events to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cache the --token bearer token (and --user) for later commands
    Login,

    /// Discard the cached session
    Logout,

    /// Task operations (each runs a roll-up afterwards)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Task header operations
    #[command(subcommand)]
    Header(HeaderCommands),

    /// Port call service operations
    #[command(subcommand)]
    Service(ServiceCommands),

    /// Re-evaluate and repair completion status
    #[command(subcommand)]
    Rollup(RollupCommands),
}

/// Service context for a header; enables the service-level roll-up.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Port call job id
    #[arg(long = "job", requires = "service_id")]
    pub job_id: Option<String>,

    /// Service id within the port call
    #[arg(long = "service", requires = "job_id")]
    pub service_id: Option<String>,
}

impl ScopeArgs {
    pub fn scope(&self) -> Option<ServiceScope> {
        match (&self.job_id, &self.service_id) {
            (Some(job), Some(service)) => Some(ServiceScope::new(job.clone(), service.clone())),
            _ => None,
        }
    }
}

/// Required service context.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Port call job id
    #[arg(long = "job")]
    pub job_id: String,

    /// Service id within the port call
    #[arg(long = "service")]
    pub service_id: String,
}

impl ServiceArgs {
    pub fn scope(&self) -> ServiceScope {
        ServiceScope::new(self.job_id.clone(), self.service_id.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks under a header
    List {
        /// Header id
        #[arg(long)]
        header: String,
    },

    /// Add an incomplete task to a header
    Add {
        /// Header id
        #[arg(long)]
        header: String,

        /// Task name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Mark a task complete
    Complete {
        /// Header id the task belongs to
        #[arg(long)]
        header: String,

        /// Task id
        task: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Delete a task
    Rm {
        /// Header id the task belongs to
        #[arg(long)]
        header: String,

        /// Task id
        task: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Reopen a completed task (not supported)
    Reopen {
        /// Task id
        task: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum HeaderCommands {
    /// List headers of a service
    List {
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Show one header with its tasks
    Show {
        /// Header id
        id: String,
    },

    /// Create a header, optionally with initial tasks
    New {
        #[command(flatten)]
        service: ServiceArgs,

        /// Header name
        #[arg(long)]
        name: String,

        /// Initial task name (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },

    /// Delete a header and its tasks
    Rm {
        #[command(flatten)]
        service: ServiceArgs,

        /// Header id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServiceCommands {
    /// List services of a port call
    List {
        /// Port call job id
        #[arg(long = "job")]
        job_id: String,
    },

    /// Create a service under a port call
    New {
        #[command(flatten)]
        service: ServiceArgs,

        /// Service name
        #[arg(long)]
        name: String,

        /// Vendor id
        #[arg(long)]
        vendor_id: Option<String>,

        /// Vendor name
        #[arg(long)]
        vendor_name: Option<String>,
    },

    /// Delete a service
    Rm {
        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum RollupCommands {
    /// Re-evaluate one header (and its service when --job/--service given)
    Header {
        /// Header id
        id: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Re-evaluate one service from its headers
    Service {
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Re-evaluate every header and service of a port call
    PortCall {
        /// Port call job id
        job_id: String,
    },
}

/// Resolved settings shared by every command.
pub(crate) struct Context {
    pub config: Config,
    pub output: OutputOptions,
    pub session_file: Option<SessionFile>,
    pub token: Option<String>,
    pub user: Option<String>,
    events: Option<EventDestination>,
}

impl Context {
    fn build(cli: &Cli) -> Result<Self> {
        let mut config = Config::discover(cli.config.as_deref())?;
        if let Some(api) = cli.api.as_deref() {
            config.api.base_url = api.trim().to_string();
        }
        let session_file = match &cli.session_file {
            Some(path) => Some(SessionFile::new(path.clone())),
            None => SessionFile::default_location(),
        };
        Ok(Self {
            config,
            output: OutputOptions {
                json: cli.json,
                quiet: cli.quiet,
            },
            session_file,
            token: cli.token.clone(),
            user: cli.user.clone(),
            events: EventDestination::parse(cli.events.as_deref()),
        })
    }

    pub fn session(&self) -> Result<Session> {
        resolve_session(
            self.token.as_deref(),
            self.user.as_deref(),
            self.session_file.as_ref(),
            &self.config,
        )
    }

    pub fn store(&self) -> Result<Arc<HttpStore>> {
        let session = self.session()?;
        Ok(Arc::new(HttpStore::from_config(&self.config, session)?))
    }

    pub fn orchestrator(&self) -> Result<(Orchestrator, Session)> {
        let store = self.store()?;
        let session = store.session().clone();
        let orchestrator = Orchestrator::from_store(store, RollUpPolicy::from(&self.config.rollup));
        Ok((orchestrator, session))
    }

    pub fn emit_events(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        if let Some(destination) = &self.events {
            destination.open()?.emit_all(events)?;
        }
        Ok(())
    }

    /// Drop cached credentials after the API rejected them.
    pub fn discard_session(&self) {
        if let Some(file) = &self.session_file {
            match file.clear() {
                Ok(true) => {
                    tracing::info!(path = %file.path().display(), "cached session discarded")
                }
                Ok(false) => {}
                Err(err) => tracing::warn!(error = %err, "failed to discard cached session"),
            }
        }
    }

    /// Add roll-up outcome lines to human output and react to auth warnings.
    pub fn describe_rollup(&self, report: &RollUpReport, human: &mut HumanOutput) {
        for header in &report.headers {
            human.push_detail(format!(
                "header {}: {} task(s), complete={} ({})",
                header.header_id,
                header.task_count,
                header.target_complete,
                describe_write(header.written, header.previous_complete, header.target_complete)
            ));
        }
        if let Some(service) = &report.service {
            human.push_detail(format!(
                "service {}: {} header(s), complete={} ({})",
                service.service_id,
                service.header_count,
                service.target_complete,
                describe_write(service.written, service.previous_complete, service.target_complete)
            ));
        }
        for warning in &report.warnings {
            human.push_warning(warning.to_string());
        }
        if report.requires_reauth() {
            self.discard_session();
            human.push_next_step("glaura login --token <token>");
        } else if !report.is_clean() {
            human.push_next_step("glaura rollup header <id> to reconcile");
        }
    }
}

fn describe_write(written: bool, previous: bool, target: bool) -> &'static str {
    if written {
        "updated"
    } else if previous == target {
        "unchanged"
    } else {
        "not written"
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let context = Context::build(&self)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let ctx = &context;
        let result = runtime.block_on(async move {
            match self.command {
                Commands::Login => session::run_login(ctx),
                Commands::Logout => session::run_logout(ctx),
                Commands::Task(cmd) => task::run(ctx, cmd).await,
                Commands::Header(cmd) => header::run(ctx, cmd).await,
                Commands::Service(cmd) => service::run(ctx, cmd).await,
                Commands::Rollup(cmd) => rollup::run(ctx, cmd).await,
            }
        });

        if let Err(err) = &result {
            if err.is_auth() {
                context.discard_session();
            }
        }
        result
    }
}
