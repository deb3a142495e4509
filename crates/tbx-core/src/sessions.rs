use crate::error::SessionError;
use crate::types::ids::{SessionId, UserId};
use crate::types::io::SessionFilter;
use crate::types::session::{
    SessionClosureRequest, SessionDataFile, SessionSolution, TestSession,
};
use crate::types::SessionStatus;
use chrono::{DateTime, Utc};

/// Persistence surface for sessions. Implementations store records only; all
/// legality checks happen in the facade before any of these are called.
pub trait SessionRepository {
    fn insert(&self, session: &TestSession) -> Result<(), SessionError>;
    fn get(&self, id: &SessionId) -> Result<Option<TestSession>, SessionError>;
    fn list(&self, filter: &SessionFilter) -> Result<Vec<TestSession>, SessionError>;
    fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<TestSession, SessionError>;
    fn append_data_file(&self, file: &SessionDataFile) -> Result<(), SessionError>;
    fn set_solution(&self, solution: &SessionSolution) -> Result<(), SessionError>;
    fn update_solution(&self, solution: &SessionSolution) -> Result<(), SessionError>;
    fn set_closure_request(&self, request: &SessionClosureRequest) -> Result<(), SessionError>;
    fn update_closure_request(
        &self,
        request: &SessionClosureRequest,
    ) -> Result<(), SessionError>;
    fn reassign(&self, id: &SessionId, assigned_to: &UserId) -> Result<TestSession, SessionError>;
    fn delete(&self, id: &SessionId) -> Result<(), SessionError>;
}
