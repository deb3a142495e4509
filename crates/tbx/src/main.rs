use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tbx_core::types::enums::{EventSource, SensorType};
use tbx_core::types::ids::{MachineId, SessionId};
use tbx_core::types::io::{
    ApproveClosureInput, CreateSessionInput, MachineFilter, RequestClosureInput, SessionFilter,
    SubmitSolutionInput, UploadDataFileInput,
};
use tbx_core::types::session::SensorModule;
use tbx_core::types::user::User;
use tbx_core::{ActorContext, Testbox};
use tbx_db::DbStore;

mod config;
mod error;
mod export;
mod render;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "tbx", about = "Track machine test sessions from assignment to closure")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "TESTBOX_DB_PATH", default_value = ".testbox/sessions.db")]
    db: String,
    /// Email of the acting user
    #[arg(long, global = true)]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load users and machines from a TOML seed file
    Seed { file: PathBuf },
    /// List all users
    Users,
    /// List machines
    Machines(MachinesArgs),
    /// Create a session and assign it to a technician
    Create(CreateArgs),
    /// List sessions visible to the actor
    List(ListArgs),
    /// Show one session in full
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Begin data collection on an assigned session
    Start { id: String },
    /// Attach an uploaded data file to a session
    Upload(UploadArgs),
    /// Mark the uploaded data as analyzed
    AnalysisComplete { id: String },
    /// Submit the solution for an analyzed session
    SubmitSolution(SolutionArgs),
    /// Approve a submitted solution (manager)
    ApproveSolution { id: String },
    /// Ask for the session to be closed (technician)
    RequestClosure {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Approve a closure request and complete the session (manager)
    ApproveClosure {
        id: String,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Force-complete an in-progress session (manager)
    Stop { id: String },
    /// Cancel a session (manager)
    Cancel { id: String },
    /// Flag a session as failed (manager)
    MarkError { id: String },
    /// Hand an assigned session to another technician (manager)
    Reassign {
        id: String,
        #[arg(long)]
        to: String,
    },
    /// Delete a non-completed session (manager)
    Delete { id: String },
    /// Show the persisted event log
    Events(EventsArgs),
    /// Export the actor's visible sessions
    Export(ExportArgs),
}

#[derive(Args)]
struct MachinesArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    query: Option<String>,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    /// Machine id (mach_...)
    #[arg(long)]
    machine: String,
    /// Email of the technician to assign
    #[arg(long)]
    assign: String,
    /// Sensor module as `kind` or `kind:label`, repeatable
    #[arg(long = "sensor", required = true)]
    sensors: Vec<String>,
    #[arg(long, default_value_t = 100)]
    frequency: u32,
    #[arg(long)]
    notes: Option<String>,
    /// Put the session straight into in_progress
    #[arg(long)]
    auto_start: bool,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    machine: Option<String>,
    /// Filter by assigned technician email
    #[arg(long)]
    assigned: Option<String>,
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct UploadArgs {
    id: String,
    #[arg(long)]
    file_name: String,
    #[arg(long)]
    size: u64,
    /// json, csv or xlsx
    #[arg(long, default_value = "csv")]
    format: String,
    #[arg(long)]
    records: Option<u64>,
}

#[derive(Args)]
struct SolutionArgs {
    id: String,
    #[arg(long)]
    description: String,
    /// Performed step, repeatable
    #[arg(long = "step", required = true)]
    steps: Vec<String>,
    #[arg(long)]
    recommend: Option<String>,
}

#[derive(Args)]
struct EventsArgs {
    /// Only events after this sequence number
    #[arg(long)]
    after: Option<i64>,
    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Args)]
struct ExportArgs {
    /// sessions, users or machines
    #[arg(default_value = "sessions")]
    what: String,
    /// csv or json
    #[arg(long, default_value = "csv")]
    format: String,
    /// Write to a file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{}: {err}", "error".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(parent) = Path::new(&cli.db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = tbx_db::schema::open_and_migrate(&cli.db)?;
    let testbox = Testbox::new(DbStore::new(conn));

    match cli.command {
        Command::Seed { file } => {
            let (users, machines) = config::load(&file)?.into_records();
            let counts = (users.len(), machines.len());
            testbox.directory().seed(&users, &machines)?;
            println!("seeded {} user(s) and {} machine(s)", counts.0, counts.1);
        }
        Command::Users => {
            render::print_users(&testbox.directory().list_users()?);
        }
        Command::Machines(args) => {
            let filter = MachineFilter {
                status: args
                    .status
                    .as_deref()
                    .map(|value| parse_variant(value, "machine status"))
                    .transpose()?,
                query: args.query,
            };
            render::print_machines(&testbox.directory().list_machines(&filter)?);
        }
        Command::Create(args) => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let assignee = user_by_email(&testbox, &args.assign)?;
            let input = CreateSessionInput {
                name: args.name,
                machine_id: machine_id(&args.machine)?,
                assigned_to: assignee.id,
                sensors: parse_sensors(&args.sensors)?,
                sampling_frequency_hz: args.frequency,
                notes: args.notes,
                auto_start: args.auto_start,
            };
            let session = testbox.sessions().create(&ctx, input)?;
            render::print_session_detail(&session);
        }
        Command::List(args) => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let filter = SessionFilter {
                status: args
                    .status
                    .as_deref()
                    .map(|value| parse_variant(value, "session status"))
                    .transpose()?,
                machine_id: args.machine.as_deref().map(machine_id).transpose()?,
                assigned_to: args
                    .assigned
                    .as_deref()
                    .map(|email| user_by_email(&testbox, email).map(|user| user.id))
                    .transpose()?,
                query: args.query,
            };
            let sessions = testbox.sessions().list(&ctx, &filter)?;
            if args.json {
                println!("{}", export::sessions_to_json(&sessions)?);
            } else {
                render::print_sessions(&sessions);
            }
        }
        Command::Show { id, json } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().get(&ctx, &session_id(&id)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                render::print_session_detail(&session);
            }
        }
        Command::Start { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().start(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::Upload(args) => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let input = UploadDataFileInput {
                session_id: session_id(&args.id)?,
                file_name: args.file_name,
                file_size: args.size,
                data_format: parse_variant(&args.format, "data format")?,
                record_count: args.records,
            };
            let session = testbox.sessions().upload_data(&ctx, input)?;
            render::print_session_detail(&session);
        }
        Command::AnalysisComplete { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox
                .sessions()
                .mark_analysis_complete(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::SubmitSolution(args) => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let input = SubmitSolutionInput {
                session_id: session_id(&args.id)?,
                description: args.description,
                steps_performed: args.steps,
                recommendations: args.recommend,
            };
            let session = testbox.sessions().submit_solution(&ctx, input)?;
            render::print_session_detail(&session);
        }
        Command::ApproveSolution { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().approve_solution(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::RequestClosure { id, reason } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let input = RequestClosureInput {
                session_id: session_id(&id)?,
                reason,
            };
            let session = testbox.sessions().request_closure(&ctx, input)?;
            render::print_session_detail(&session);
        }
        Command::ApproveClosure { id, comments } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let input = ApproveClosureInput {
                session_id: session_id(&id)?,
                comments,
            };
            let session = testbox.sessions().approve_closure(&ctx, input)?;
            render::print_session_detail(&session);
        }
        Command::Stop { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().stop(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::Cancel { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().cancel(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::MarkError { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let session = testbox.sessions().mark_error(&ctx, &session_id(&id)?)?;
            render::print_session_detail(&session);
        }
        Command::Reassign { id, to } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let assignee = user_by_email(&testbox, &to)?;
            let session = testbox
                .sessions()
                .reassign(&ctx, &session_id(&id)?, &assignee.id)?;
            render::print_session_detail(&session);
        }
        Command::Delete { id } => {
            let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
            let id = session_id(&id)?;
            testbox.sessions().delete(&ctx, &id)?;
            println!("deleted {}", id.as_str());
        }
        Command::Events(args) => {
            let events = testbox.events().list(args.after, args.limit)?;
            render::print_events(&events);
        }
        Command::Export(args) => {
            let output = match (args.what.as_str(), args.format.as_str()) {
                ("sessions", "csv") => {
                    let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
                    export::sessions_to_csv(
                        &testbox.sessions().list(&ctx, &SessionFilter::default())?,
                    )
                }
                ("sessions", "json") => {
                    let ctx = resolve_actor(&testbox, cli.actor.as_deref())?;
                    export::sessions_to_json(
                        &testbox.sessions().list(&ctx, &SessionFilter::default())?,
                    )?
                }
                ("users", "csv") => export::users_to_csv(&testbox.directory().list_users()?),
                ("users", "json") => {
                    serde_json::to_string_pretty(&testbox.directory().list_users()?)?
                }
                ("machines", "csv") => export::machines_to_csv(
                    &testbox.directory().list_machines(&MachineFilter::default())?,
                ),
                ("machines", "json") => serde_json::to_string_pretty(
                    &testbox.directory().list_machines(&MachineFilter::default())?,
                )?,
                (what, "csv" | "json") => {
                    return Err(CliError::Usage(format!("unsupported export target: {what}")))
                }
                (_, format) => {
                    return Err(CliError::Usage(format!(
                        "unsupported export format: {format}"
                    )))
                }
            };
            match args.out {
                Some(path) => {
                    std::fs::write(&path, output)?;
                    println!("exported {} to {}", args.what, path.display());
                }
                None => print!("{output}"),
            }
        }
    }
    Ok(())
}

fn resolve_actor<S: tbx_core::Store>(testbox: &Testbox<S>, actor: Option<&str>) -> Result<ActorContext> {
    let Some(email) = actor else {
        return Err(CliError::Usage(
            "--actor <email> is required for this command".to_string(),
        ));
    };
    let user = user_by_email(testbox, email)?;
    Ok(ActorContext::new(user, EventSource::Cli, None))
}

fn user_by_email<S: tbx_core::Store>(testbox: &Testbox<S>, email: &str) -> Result<User> {
    testbox
        .directory()
        .get_user_by_email(email)?
        .ok_or_else(|| CliError::Usage(format!("no user with email {email}")))
}

fn session_id(value: &str) -> Result<SessionId> {
    SessionId::new(value.to_string()).map_err(|err| CliError::Usage(err.to_string()))
}

fn machine_id(value: &str) -> Result<MachineId> {
    MachineId::new(value.to_string()).map_err(|err| CliError::Usage(err.to_string()))
}

/// Parses a snake_case enum name through its serde form, so the CLI accepts
/// exactly the values the data model stores.
fn parse_variant<T: DeserializeOwned>(value: &str, what: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| CliError::Usage(format!("invalid {what}: {value}")))
}

fn parse_sensors(raw: &[String]) -> Result<Vec<SensorModule>> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| {
            let (kind, name) = match entry.split_once(':') {
                Some((kind, name)) => (kind, name.to_string()),
                None => (entry.as_str(), entry.clone()),
            };
            let kind: SensorType = parse_variant(kind, "sensor type")?;
            Ok(SensorModule {
                id: format!("sensor-{:02}", index + 1),
                name,
                kind,
                description: String::new(),
                is_active: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    // Builds every arg, including the TESTBOX_DB_PATH env binding.
    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sensors_parse_kind_and_label() {
        let sensors =
            parse_sensors(&["vibration:Spindle probe".to_string(), "pressure".to_string()])
                .unwrap();
        assert_eq!(sensors[0].kind, SensorType::Vibration);
        assert_eq!(sensors[0].name, "Spindle probe");
        assert_eq!(sensors[1].name, "pressure");
        assert!(parse_sensors(&["warp_field".to_string()]).is_err());
    }
}
