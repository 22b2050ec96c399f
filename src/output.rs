//! Command output: human-readable sections or a versioned JSON envelope.
//!
//! JSON output always has `schema_version`, `command` and `status`; success
//! carries `data`, failure carries `error`. Warnings and next steps ride
//! along in both modes.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "glaura.v1";

/// Global flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &[
    "--config",
    "--api",
    "--token",
    "--user",
    "--session-file",
    "--events",
];

/// Command groups whose first positional is a subcommand.
const GROUPS: &[&str] = &["task", "header", "service", "rollup"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human output for one command: a title line then optional sections.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    /// Add a suggested follow-up command; repeats are dropped.
    pub fn push_next_step(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !self.next_steps.contains(&value) {
            self.next_steps.push(value);
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(flatten)]
    body: B,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct SuccessBody<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    message: &'a str,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    let (warnings, next_steps) = match human {
        Some(human) => (human.warnings.as_slice(), human.next_steps.as_slice()),
        None => (&[][..], &[][..]),
    };

    if options.json {
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            body: SuccessBody { data },
            warnings,
            next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if options.quiet {
        // Roll-up warnings still reach the user in quiet mode.
        for warning in warnings {
            eprintln!("warning: {warning}");
        }
    } else if let Some(human) = human {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);

    if json {
        let message = err.to_string();
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            body: ErrorBody {
                error: ErrorDetail {
                    message: &message,
                    code: err.exit_code(),
                    kind: err.kind(),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {command}: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let summary: Vec<String> = output
        .summary
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}: {value}")
            }
        })
        .collect();

    let sections = [
        ("Summary", &summary),
        ("Details", &output.details),
        ("Warnings", &output.warnings),
        ("Next steps", &output.next_steps),
    ];

    let mut lines = vec![output.header.clone()];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{title}:"));
        lines.extend(items.iter().map(|item| format!("- {item}")));
    }
    lines.join("\n")
}

/// Best-effort command name for error output, before clap has parsed.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut positionals: Vec<String> = Vec::with_capacity(2);
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            positionals.push(arg);
            let wanted = if GROUPS.contains(&positionals[0].as_str()) { 2 } else { 1 };
            if positionals.len() == wanted {
                break;
            }
        }
    }

    if positionals.is_empty() {
        "glaura".to_string()
    } else {
        positionals.join(" ")
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::Auth(_) => "glaura login --token <token>",
        Error::InvalidConfig(_) => "fix glaura.toml then retry",
        Error::ConfigNotFound(_) => "pass --config with an existing glaura.toml",
        Error::Transient(_) => "retry the command",
        _ => return Vec::new(),
    };
    vec![step.to_string()]
}
