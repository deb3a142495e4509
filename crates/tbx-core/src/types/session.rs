use crate::types::enums::{DataFormat, SensorType, SessionStatus};
use crate::types::ids::{ClosureRequestId, DataFileId, MachineId, SessionId, SolutionId};
use crate::types::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorModule {
    pub id: String,
    pub name: String,
    pub kind: SensorType,
    pub description: String,
    pub is_active: bool,
}

/// A scheduled period of sensor data collection against one machine, tracked
/// through a multi-stage approval workflow.
///
/// `created_by` is set once at creation. `assigned_to` may change only while
/// the session is still `Assigned`. `data_files` is append-only. `solution`
/// and `closure_request` are at-most-one sub-entities whose presence gates
/// the later transitions; a closure request can only exist once the solution
/// has been approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSession {
    pub id: SessionId,
    pub name: String,
    pub machine_id: MachineId,
    pub created_by: User,
    pub assigned_to: User,
    pub sensors: Vec<SensorModule>,
    pub sampling_frequency_hz: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub data_files: Vec<SessionDataFile>,
    pub solution: Option<SessionSolution>,
    pub closure_request: Option<SessionClosureRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDataFile {
    pub id: DataFileId,
    pub session_id: SessionId,
    pub file_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: User,
    pub data_format: DataFormat,
    pub record_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSolution {
    pub id: SolutionId,
    pub session_id: SessionId,
    pub description: String,
    pub steps_performed: Vec<String>,
    pub recommendations: Option<String>,
    pub submitted_by: User,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<User>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClosureRequest {
    pub id: ClosureRequestId,
    pub session_id: SessionId,
    pub requested_by: User,
    pub requested_at: DateTime<Utc>,
    pub reason: String,
    pub solution_id: SolutionId,
    pub approved: bool,
    pub reviewed_by: Option<User>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}
