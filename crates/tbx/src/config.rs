use crate::error::Result;
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use tbx_core::types::enums::{MachineStatus, UserRole};
use tbx_core::types::ids::{MachineId, UserId};
use tbx_core::types::machine::Machine;
use tbx_core::types::user::User;

/// TOML seed file for the user and machine directories.
///
/// ```toml
/// [[users]]
/// name = "Sarah Manager"
/// email = "sarah@plant.local"
/// role = "maintenance_manager"
///
/// [[machines]]
/// name = "Hydraulic press 3"
/// location = "Hall A"
/// kind = "hydraulic_press"
/// serial_number = "HP-2200-011"
/// ```
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub machines: Vec<SeedMachine>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct SeedMachine {
    pub name: String,
    pub location: String,
    pub kind: String,
    pub serial_number: String,
    #[serde(default = "default_machine_status")]
    pub status: MachineStatus,
}

fn default_machine_status() -> MachineStatus {
    MachineStatus::Operational
}

pub fn load(path: &Path) -> Result<SeedFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

impl SeedFile {
    pub fn into_records(self) -> (Vec<User>, Vec<Machine>) {
        let now = Utc::now();
        let users = self
            .users
            .into_iter()
            .map(|seed| User {
                id: UserId::generate(),
                email: seed.email,
                name: seed.name,
                role: seed.role,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let machines = self
            .machines
            .into_iter()
            .map(|seed| Machine {
                id: MachineId::generate(),
                name: seed.name,
                location: seed.location,
                kind: seed.kind,
                serial_number: seed.serial_number,
                status: seed.status,
                created_at: now,
                updated_at: now,
            })
            .collect();
        (users, machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seed_file() {
        let text = r#"
[[users]]
name = "Sarah Manager"
email = "sarah@plant.local"
role = "maintenance_manager"

[[users]]
name = "John Technician"
email = "john@plant.local"
role = "technician"

[[machines]]
name = "Hydraulic press 3"
location = "Hall A"
kind = "hydraulic_press"
serial_number = "HP-2200-011"
"#;
        let seed: SeedFile = toml::from_str(text).unwrap();
        let (users, machines) = seed.into_records();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].role, UserRole::MaintenanceManager);
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].status, MachineStatus::Operational);
        assert!(machines[0].id.as_str().starts_with("mach_"));
    }
}
