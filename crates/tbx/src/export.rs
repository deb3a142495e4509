use tbx_core::types::machine::Machine;
use tbx_core::types::session::TestSession;
use tbx_core::types::user::User;

/// Quotes a CSV field when it contains a delimiter, quote or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn sessions_to_csv(sessions: &[TestSession]) -> String {
    let mut out = String::from(
        "id,name,machine_id,status,assigned_to,created_by,sampling_frequency_hz,start_time,end_time,data_files,created_at\n",
    );
    for session in sessions {
        let row = [
            session.id.as_str().to_string(),
            session.name.clone(),
            session.machine_id.as_str().to_string(),
            status_label(session).to_string(),
            session.assigned_to.email.clone(),
            session.created_by.email.clone(),
            session.sampling_frequency_hz.to_string(),
            session.start_time.to_rfc3339(),
            session
                .end_time
                .map(|value| value.to_rfc3339())
                .unwrap_or_default(),
            session.data_files.len().to_string(),
            session.created_at.to_rfc3339(),
        ];
        let row: Vec<String> = row.iter().map(|field| escape(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn sessions_to_json(sessions: &[TestSession]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(sessions)
}

pub fn users_to_csv(users: &[User]) -> String {
    let mut out = String::from("id,name,email,role,created_at\n");
    for user in users {
        let row = [
            user.id.as_str().to_string(),
            user.name.clone(),
            user.email.clone(),
            crate::render::role_name(user.role).to_string(),
            user.created_at.to_rfc3339(),
        ];
        let row: Vec<String> = row.iter().map(|field| escape(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn machines_to_csv(machines: &[Machine]) -> String {
    let mut out = String::from("id,name,location,kind,serial_number,status,created_at\n");
    for machine in machines {
        let row = [
            machine.id.as_str().to_string(),
            machine.name.clone(),
            machine.location.clone(),
            machine.kind.clone(),
            machine.serial_number.clone(),
            crate::render::machine_status_name(machine.status).to_string(),
            machine.created_at.to_rfc3339(),
        ];
        let row: Vec<String> = row.iter().map(|field| escape(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn status_label(session: &TestSession) -> &'static str {
    crate::render::status_name(session.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_fields_with_delimiters() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }
}
