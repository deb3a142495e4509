use crate::types::enums::EventSource;
use crate::types::ids::{ClosureRequestId, DataFileId, SessionId, SolutionId, UserId};
use crate::types::session::TestSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted domain event. `seq` is assigned by the store on append and is
/// strictly increasing within one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub seq: i64,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    pub actor_id: UserId,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventBody {
    SessionCreated {
        session: TestSession,
    },
    SessionStarted {
        session_id: SessionId,
    },
    DataFileUploaded {
        session_id: SessionId,
        file_id: DataFileId,
        file_name: String,
    },
    AnalysisCompleted {
        session_id: SessionId,
    },
    SolutionSubmitted {
        session_id: SessionId,
        solution_id: SolutionId,
    },
    SolutionApproved {
        session_id: SessionId,
        solution_id: SolutionId,
        reviewed_by: UserId,
    },
    ClosureRequested {
        session_id: SessionId,
        closure_request_id: ClosureRequestId,
    },
    ClosureApproved {
        session_id: SessionId,
        closure_request_id: ClosureRequestId,
        reviewed_by: UserId,
    },
    SessionStopped {
        session_id: SessionId,
    },
    SessionCancelled {
        session_id: SessionId,
    },
    SessionErrored {
        session_id: SessionId,
    },
    SessionReassigned {
        session_id: SessionId,
        assigned_to: UserId,
    },
    SessionDeleted {
        session_id: SessionId,
    },
}
