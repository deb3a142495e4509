use crate::types::enums::{DataFormat, MachineStatus, SessionStatus};
use crate::types::ids::{MachineId, SessionId, UserId};
use crate::types::machine::Machine;
use crate::types::session::{SensorModule, TestSession};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionInput {
    pub name: String,
    pub machine_id: MachineId,
    pub assigned_to: UserId,
    pub sensors: Vec<SensorModule>,
    pub sampling_frequency_hz: u32,
    pub notes: Option<String>,
    pub auto_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDataFileInput {
    pub session_id: SessionId,
    pub file_name: String,
    pub file_size: u64,
    pub data_format: DataFormat,
    pub record_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSolutionInput {
    pub session_id: SessionId,
    pub description: String,
    pub steps_performed: Vec<String>,
    pub recommendations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestClosureInput {
    pub session_id: SessionId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveClosureInput {
    pub session_id: SessionId,
    pub comments: Option<String>,
}

/// Conjunctive listing filter: every present predicate must match. `query`
/// is a case-insensitive substring match across the session name, the
/// assigned technician's name and the creator's name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub machine_id: Option<MachineId>,
    pub assigned_to: Option<UserId>,
    pub query: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, session: &TestSession) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(machine_id) = &self.machine_id {
            if &session.machine_id != machine_id {
                return false;
            }
        }
        if let Some(assigned_to) = &self.assigned_to {
            if &session.assigned_to.id != assigned_to {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let needle = query.to_lowercase();
            let hit = [
                session.name.as_str(),
                session.assigned_to.name.as_str(),
                session.created_by.name.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineFilter {
    pub status: Option<MachineStatus>,
    pub query: Option<String>,
}

impl MachineFilter {
    pub fn matches(&self, machine: &Machine) -> bool {
        if let Some(status) = self.status {
            if machine.status != status {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let needle = query.to_lowercase();
            let hit = [
                machine.name.as_str(),
                machine.location.as_str(),
                machine.serial_number.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::enums::{SensorType, UserRole};
    use crate::types::user::User;
    use chrono::Utc;

    fn session() -> TestSession {
        let now = Utc::now();
        let manager = User {
            id: UserId::generate(),
            email: "manager@testbox.local".to_string(),
            name: "Sarah Manager".to_string(),
            role: UserRole::MaintenanceManager,
            created_at: now,
            updated_at: now,
        };
        let tech = User {
            id: UserId::generate(),
            email: "tech@testbox.local".to_string(),
            name: "John Technician".to_string(),
            role: UserRole::Technician,
            created_at: now,
            updated_at: now,
        };
        TestSession {
            id: SessionId::generate(),
            name: "Hydraulic press vibration survey".to_string(),
            machine_id: MachineId::generate(),
            created_by: manager,
            assigned_to: tech,
            sensors: vec![SensorModule {
                id: "vib-01".to_string(),
                name: "Vibration probe".to_string(),
                kind: SensorType::Vibration,
                description: String::new(),
                is_active: true,
            }],
            sampling_frequency_hz: 10,
            start_time: now,
            end_time: None,
            status: SessionStatus::Assigned,
            notes: None,
            data_files: Vec::new(),
            solution: None,
            closure_request: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SessionFilter::default().matches(&session()));
    }

    #[test]
    fn query_is_case_insensitive_substring() {
        let s = session();
        let filter = SessionFilter {
            query: Some("HYDRAULIC".to_string()),
            ..SessionFilter::default()
        };
        assert!(filter.matches(&s));

        let filter = SessionFilter {
            query: Some("john tech".to_string()),
            ..SessionFilter::default()
        };
        assert!(filter.matches(&s));

        let filter = SessionFilter {
            query: Some("lathe".to_string()),
            ..SessionFilter::default()
        };
        assert!(!filter.matches(&s));
    }

    #[test]
    fn predicates_are_conjunctive() {
        let s = session();
        let filter = SessionFilter {
            status: Some(SessionStatus::Assigned),
            query: Some("hydraulic".to_string()),
            ..SessionFilter::default()
        };
        assert!(filter.matches(&s));

        // Same query, wrong status: the conjunction fails.
        let filter = SessionFilter {
            status: Some(SessionStatus::Completed),
            query: Some("hydraulic".to_string()),
            ..SessionFilter::default()
        };
        assert!(!filter.matches(&s));
    }
}
