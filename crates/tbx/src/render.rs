use owo_colors::OwoColorize;
use tbx_core::types::enums::{MachineStatus, SessionStatus, UserRole};
use tbx_core::types::event::EventRecord;
use tbx_core::types::machine::Machine;
use tbx_core::types::session::TestSession;
use tbx_core::types::user::User;

pub fn status_name(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Created => "created",
        SessionStatus::Assigned => "assigned",
        SessionStatus::InProgress => "in_progress",
        SessionStatus::DataUploaded => "data_uploaded",
        SessionStatus::AnalysisComplete => "analysis_complete",
        SessionStatus::SolutionSubmitted => "solution_submitted",
        SessionStatus::Completed => "completed",
        SessionStatus::Cancelled => "cancelled",
        SessionStatus::Error => "error",
    }
}

fn status_colored(status: SessionStatus) -> String {
    let name = status_name(status);
    match status {
        SessionStatus::Created | SessionStatus::Assigned => name.cyan().to_string(),
        SessionStatus::InProgress => name.yellow().to_string(),
        SessionStatus::DataUploaded | SessionStatus::AnalysisComplete => name.blue().to_string(),
        SessionStatus::SolutionSubmitted => name.magenta().to_string(),
        SessionStatus::Completed => name.green().to_string(),
        SessionStatus::Cancelled => name.dimmed().to_string(),
        SessionStatus::Error => name.red().to_string(),
    }
}

pub fn machine_status_name(status: MachineStatus) -> &'static str {
    match status {
        MachineStatus::Operational => "operational",
        MachineStatus::Maintenance => "maintenance",
        MachineStatus::Failure => "failure",
        MachineStatus::Offline => "offline",
    }
}

fn machine_status_colored(status: MachineStatus) -> String {
    let name = machine_status_name(status);
    match status {
        MachineStatus::Operational => name.green().to_string(),
        MachineStatus::Maintenance => name.yellow().to_string(),
        MachineStatus::Failure => name.red().to_string(),
        MachineStatus::Offline => name.dimmed().to_string(),
    }
}

pub fn role_name(role: UserRole) -> &'static str {
    match role {
        UserRole::Technician => "technician",
        UserRole::MaintenanceManager => "maintenance_manager",
    }
}

pub fn print_sessions(sessions: &[TestSession]) {
    if sessions.is_empty() {
        println!("no sessions");
        return;
    }
    for session in sessions {
        println!(
            "{}  {:<22}  {:<32}  {}  {} file(s)",
            session.id.as_str().dimmed(),
            status_colored(session.status),
            session.name,
            session.assigned_to.name,
            session.data_files.len(),
        );
    }
}

pub fn print_session_detail(session: &TestSession) {
    println!("{}  {}", session.id.as_str().bold(), session.name);
    println!("  status:     {}", status_colored(session.status));
    println!("  machine:    {}", session.machine_id.as_str());
    println!(
        "  assigned:   {} <{}>",
        session.assigned_to.name, session.assigned_to.email
    );
    println!(
        "  created by: {} <{}>",
        session.created_by.name, session.created_by.email
    );
    println!("  sampling:   {} Hz", session.sampling_frequency_hz);
    println!("  started:    {}", session.start_time.to_rfc3339());
    match session.end_time {
        Some(end) => println!("  ended:      {}", end.to_rfc3339()),
        None => println!("  ended:      -"),
    }
    if let Some(notes) = &session.notes {
        println!("  notes:      {notes}");
    }
    println!("  sensors:");
    for sensor in &session.sensors {
        println!("    - {} ({:?})", sensor.name, sensor.kind);
    }
    if !session.data_files.is_empty() {
        println!("  data files:");
        for file in &session.data_files {
            println!(
                "    - {} ({} bytes, {:?}) uploaded by {}",
                file.file_name, file.file_size, file.data_format, file.uploaded_by.name
            );
        }
    }
    if let Some(solution) = &session.solution {
        let verdict = if solution.approved {
            "approved".green().to_string()
        } else {
            "pending review".yellow().to_string()
        };
        println!("  solution ({verdict}):");
        println!("    {}", solution.description);
        for step in &solution.steps_performed {
            println!("    - {step}");
        }
        if let Some(recommendations) = &solution.recommendations {
            println!("    recommendations: {recommendations}");
        }
    }
    if let Some(request) = &session.closure_request {
        let verdict = if request.approved {
            "approved".green().to_string()
        } else {
            "pending".yellow().to_string()
        };
        println!("  closure request ({verdict}): {}", request.reason);
        if let Some(comments) = &request.comments {
            println!("    comments: {comments}");
        }
    }
}

pub fn print_users(users: &[User]) {
    for user in users {
        println!(
            "{}  {:<22}  {:<28}  {}",
            user.id.as_str().dimmed(),
            role_name(user.role),
            user.name,
            user.email,
        );
    }
}

pub fn print_machines(machines: &[Machine]) {
    for machine in machines {
        println!(
            "{}  {:<14}  {:<28}  {}  [{}]",
            machine.id.as_str().dimmed(),
            machine_status_colored(machine.status),
            machine.name,
            machine.location,
            machine.serial_number,
        );
    }
}

pub fn print_events(events: &[EventRecord]) {
    for event in events {
        let kind = event.body["kind"].as_str().unwrap_or("?");
        println!(
            "{:>6}  {}  {:<22}  {}",
            event.seq,
            event.at.to_rfc3339().dimmed(),
            kind.bold(),
            event.actor_id.as_str(),
        );
    }
}
