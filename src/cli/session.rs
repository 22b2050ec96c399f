//! glaura login / logout

use serde::Serialize;

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::session::SessionFile;

#[derive(Serialize)]
struct SessionReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    cached: bool,
}

fn session_file(context: &Context) -> Result<&SessionFile> {
    context.session_file.as_ref().ok_or_else(|| {
        Error::OperationFailed("no data directory available; pass --session-file".to_string())
    })
}

pub fn run_login(context: &Context) -> Result<()> {
    let token = context
        .token
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("login requires --token".to_string()))?;
    let file = session_file(context)?;
    file.save(token, context.user.as_deref())?;

    let report = SessionReport {
        path: file.path().display().to_string(),
        user: context.user.clone(),
        cached: true,
    };
    let mut human = HumanOutput::new("glaura login: session cached");
    human.push_summary("path", report.path.clone());
    if let Some(user) = &report.user {
        human.push_summary("user", user.clone());
    }
    emit_success(context.output, "login", &report, Some(&human))
}

pub fn run_logout(context: &Context) -> Result<()> {
    let file = session_file(context)?;
    let removed = file.clear()?;

    let report = SessionReport {
        path: file.path().display().to_string(),
        user: None,
        cached: false,
    };
    let header = if removed {
        "glaura logout: session discarded"
    } else {
        "glaura logout: no cached session"
    };
    let human = HumanOutput::new(header);
    emit_success(context.output, "logout", &report, Some(&human))
}
