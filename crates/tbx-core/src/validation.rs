use crate::error::{PermissionError, SessionError, TestboxError};
use crate::permissions::{has_permission, Action};
use crate::types::enums::{SessionOperation, SessionStatus};
use crate::types::io::{CreateSessionInput, SubmitSolutionInput, UploadDataFileInput};
use crate::types::session::TestSession;
use crate::types::user::User;

pub const MIN_SAMPLING_FREQUENCY_HZ: u32 = 1;
pub const MAX_SAMPLING_FREQUENCY_HZ: u32 = 1000;

/// The permission each operation requires. Keyed exhaustively so the
/// compiler flags any operation added without a guard decision.
pub fn required_action(operation: SessionOperation) -> Action {
    match operation {
        SessionOperation::Start => Action::StartSessions,
        SessionOperation::UploadData | SessionOperation::MarkAnalysisComplete => {
            Action::UploadSessionData
        }
        SessionOperation::SubmitSolution => Action::SubmitSolution,
        SessionOperation::ApproveSolution => Action::ReviewSolutions,
        SessionOperation::RequestClosure => Action::RequestSessionClosure,
        SessionOperation::ApproveClosure => Action::CloseSessions,
        SessionOperation::Stop | SessionOperation::Cancel | SessionOperation::MarkError => {
            Action::EditSessions
        }
        SessionOperation::Reassign => Action::AssignSessions,
        SessionOperation::Delete => Action::DeleteSessions,
    }
}

fn requires_assignment(operation: SessionOperation) -> bool {
    matches!(
        operation,
        SessionOperation::Start
            | SessionOperation::UploadData
            | SessionOperation::MarkAnalysisComplete
            | SessionOperation::SubmitSolution
            | SessionOperation::RequestClosure
    )
}

/// Single source of truth for transition legality. Checks, in order: the
/// actor's role against the permission table, the assignment requirement for
/// technician operations, then the status/sub-entity precondition. Every
/// mutating path goes through here before touching the record.
pub fn check_operation(
    session: &TestSession,
    actor: &User,
    operation: SessionOperation,
) -> Result<(), TestboxError> {
    let action = required_action(operation);
    if !has_permission(actor.role, action) {
        return Err(PermissionError::Denied {
            role: actor.role,
            action,
        }
        .into());
    }
    if requires_assignment(operation) && session.assigned_to.id != actor.id {
        return Err(PermissionError::NotAssigned.into());
    }
    validate_session_transition(session, operation).map_err(TestboxError::from)
}

pub fn can_perform(session: &TestSession, actor: &User, operation: SessionOperation) -> bool {
    check_operation(session, actor, operation).is_ok()
}

/// Status and sub-entity preconditions for each operation. Terminal sessions
/// reject everything except deletion of non-completed records.
pub fn validate_session_transition(
    session: &TestSession,
    operation: SessionOperation,
) -> Result<(), SessionError> {
    use SessionStatus::{
        AnalysisComplete, Assigned, Completed, DataUploaded, InProgress, SolutionSubmitted,
    };

    let from = session.status;
    if from.is_terminal() && operation != SessionOperation::Delete {
        return Err(SessionError::InvalidTransition { from, operation });
    }

    let valid = match operation {
        SessionOperation::Start => from == Assigned,
        SessionOperation::UploadData => matches!(
            from,
            Assigned | InProgress | DataUploaded | AnalysisComplete | SolutionSubmitted
        ),
        SessionOperation::MarkAnalysisComplete => from == DataUploaded,
        SessionOperation::SubmitSolution => from == AnalysisComplete && session.solution.is_none(),
        SessionOperation::ApproveSolution => {
            session.solution.as_ref().is_some_and(|s| !s.approved)
        }
        SessionOperation::RequestClosure => {
            session.solution.as_ref().is_some_and(|s| s.approved)
                && session.closure_request.is_none()
        }
        SessionOperation::ApproveClosure => {
            session.closure_request.as_ref().is_some_and(|c| !c.approved)
        }
        SessionOperation::Stop => from == InProgress,
        SessionOperation::Cancel | SessionOperation::MarkError => true,
        SessionOperation::Reassign => from == Assigned,
        SessionOperation::Delete => from != Completed,
    };

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition { from, operation })
    }
}

pub fn validate_create_session(input: &CreateSessionInput) -> Result<(), SessionError> {
    if input.name.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            message: "session name must not be empty".to_string(),
        });
    }
    if input.sensors.is_empty() {
        return Err(SessionError::InvalidInput {
            message: "at least one sensor module must be selected".to_string(),
        });
    }
    if !(MIN_SAMPLING_FREQUENCY_HZ..=MAX_SAMPLING_FREQUENCY_HZ)
        .contains(&input.sampling_frequency_hz)
    {
        return Err(SessionError::InvalidInput {
            message: format!(
                "sampling frequency must be between {MIN_SAMPLING_FREQUENCY_HZ} and {MAX_SAMPLING_FREQUENCY_HZ} Hz"
            ),
        });
    }
    Ok(())
}

/// Drops blank steps, then requires a description and at least one step.
/// Returns the cleaned step list used for the stored solution.
pub fn validate_solution_input(input: &SubmitSolutionInput) -> Result<Vec<String>, SessionError> {
    if input.description.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            message: "solution description must not be empty".to_string(),
        });
    }
    let steps: Vec<String> = input
        .steps_performed
        .iter()
        .map(|step| step.trim().to_string())
        .filter(|step| !step.is_empty())
        .collect();
    if steps.is_empty() {
        return Err(SessionError::InvalidInput {
            message: "at least one performed step is required".to_string(),
        });
    }
    Ok(steps)
}

pub fn validate_closure_reason(reason: &str) -> Result<(), SessionError> {
    if reason.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            message: "closure reason must not be empty".to_string(),
        });
    }
    Ok(())
}

pub fn validate_data_file(input: &UploadDataFileInput) -> Result<(), SessionError> {
    if input.file_name.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            message: "file name must not be empty".to_string(),
        });
    }
    if input.file_size == 0 {
        return Err(SessionError::InvalidInput {
            message: "file size must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::enums::{DataFormat, SensorType, UserRole};
    use crate::types::ids::{
        ClosureRequestId, MachineId, SessionId, SolutionId, UserId,
    };
    use crate::types::session::{
        SensorModule, SessionClosureRequest, SessionSolution, TestSession,
    };
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: UserId::generate(),
            email: "person@testbox.local".to_string(),
            name: "Person".to_string(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    fn sensor() -> SensorModule {
        SensorModule {
            id: "vib-01".to_string(),
            name: "Vibration probe".to_string(),
            kind: SensorType::Vibration,
            description: "triaxial accelerometer".to_string(),
            is_active: true,
        }
    }

    fn session(status: SessionStatus, assigned_to: &User) -> TestSession {
        let now = Utc::now();
        TestSession {
            id: SessionId::generate(),
            name: "Bearing check".to_string(),
            machine_id: MachineId::generate(),
            created_by: user(UserRole::MaintenanceManager),
            assigned_to: assigned_to.clone(),
            sensors: vec![sensor()],
            sampling_frequency_hz: 10,
            start_time: now,
            end_time: None,
            status,
            notes: None,
            data_files: Vec::new(),
            solution: None,
            closure_request: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn solution(session: &TestSession, approved: bool) -> SessionSolution {
        SessionSolution {
            id: SolutionId::generate(),
            session_id: session.id.clone(),
            description: "replaced bearing".to_string(),
            steps_performed: vec!["swap bearing".to_string()],
            recommendations: None,
            submitted_by: session.assigned_to.clone(),
            submitted_at: Utc::now(),
            reviewed_by: None,
            reviewed_at: None,
            approved,
        }
    }

    #[test]
    fn start_requires_assigned_status() {
        let tech = user(UserRole::Technician);
        let s = session(SessionStatus::Assigned, &tech);
        assert!(validate_session_transition(&s, SessionOperation::Start).is_ok());

        let s = session(SessionStatus::InProgress, &tech);
        let err = validate_session_transition(&s, SessionOperation::Start).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn uploads_allowed_past_data_uploaded_without_status_change_rules() {
        let tech = user(UserRole::Technician);
        for status in [
            SessionStatus::Assigned,
            SessionStatus::InProgress,
            SessionStatus::DataUploaded,
            SessionStatus::AnalysisComplete,
            SessionStatus::SolutionSubmitted,
        ] {
            let s = session(status, &tech);
            assert!(validate_session_transition(&s, SessionOperation::UploadData).is_ok());
        }
        let s = session(SessionStatus::Completed, &tech);
        assert!(validate_session_transition(&s, SessionOperation::UploadData).is_err());
    }

    #[test]
    fn second_solution_is_rejected() {
        let tech = user(UserRole::Technician);
        let mut s = session(SessionStatus::AnalysisComplete, &tech);
        assert!(validate_session_transition(&s, SessionOperation::SubmitSolution).is_ok());
        s.solution = Some(solution(&s, false));
        let err =
            validate_session_transition(&s, SessionOperation::SubmitSolution).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn closure_requires_approved_solution() {
        let tech = user(UserRole::Technician);
        let mut s = session(SessionStatus::SolutionSubmitted, &tech);
        assert!(validate_session_transition(&s, SessionOperation::RequestClosure).is_err());
        s.solution = Some(solution(&s, false));
        assert!(validate_session_transition(&s, SessionOperation::RequestClosure).is_err());
        s.solution = Some(solution(&s, true));
        assert!(validate_session_transition(&s, SessionOperation::RequestClosure).is_ok());
    }

    #[test]
    fn approving_closure_twice_is_rejected() {
        let tech = user(UserRole::Technician);
        let mut s = session(SessionStatus::SolutionSubmitted, &tech);
        s.solution = Some(solution(&s, true));
        s.closure_request = Some(SessionClosureRequest {
            id: ClosureRequestId::generate(),
            session_id: s.id.clone(),
            requested_by: tech.clone(),
            requested_at: Utc::now(),
            reason: "issue resolved".to_string(),
            solution_id: s.solution.as_ref().unwrap().id.clone(),
            approved: false,
            reviewed_by: None,
            reviewed_at: None,
            comments: None,
        });
        assert!(validate_session_transition(&s, SessionOperation::ApproveClosure).is_ok());
        s.closure_request.as_mut().unwrap().approved = true;
        s.status = SessionStatus::Completed;
        assert!(validate_session_transition(&s, SessionOperation::ApproveClosure).is_err());
    }

    #[test]
    fn completed_sessions_reject_everything_including_delete() {
        let tech = user(UserRole::Technician);
        let s = session(SessionStatus::Completed, &tech);
        for op in [
            SessionOperation::Start,
            SessionOperation::UploadData,
            SessionOperation::SubmitSolution,
            SessionOperation::Stop,
            SessionOperation::Cancel,
            SessionOperation::Delete,
        ] {
            assert!(validate_session_transition(&s, op).is_err(), "{op:?}");
        }
    }

    #[test]
    fn cancelled_sessions_can_still_be_deleted() {
        let tech = user(UserRole::Technician);
        let s = session(SessionStatus::Cancelled, &tech);
        assert!(validate_session_transition(&s, SessionOperation::Delete).is_ok());
        assert!(validate_session_transition(&s, SessionOperation::Cancel).is_err());
    }

    #[test]
    fn unassigned_technician_is_refused_before_status_checks() {
        let assigned = user(UserRole::Technician);
        let other = user(UserRole::Technician);
        let s = session(SessionStatus::Assigned, &assigned);
        let err = check_operation(&s, &other, SessionOperation::Start).unwrap_err();
        assert!(matches!(
            err,
            TestboxError::Permission(PermissionError::NotAssigned)
        ));
    }

    #[test]
    fn manager_cannot_submit_solutions() {
        let tech = user(UserRole::Technician);
        let manager = user(UserRole::MaintenanceManager);
        let s = session(SessionStatus::AnalysisComplete, &tech);
        let err = check_operation(&s, &manager, SessionOperation::SubmitSolution).unwrap_err();
        assert!(matches!(
            err,
            TestboxError::Permission(PermissionError::Denied { .. })
        ));
    }

    #[test]
    fn create_input_bounds() {
        let input = CreateSessionInput {
            name: "Spindle survey".to_string(),
            machine_id: MachineId::generate(),
            assigned_to: UserId::generate(),
            sensors: vec![sensor()],
            sampling_frequency_hz: 1000,
            notes: None,
            auto_start: false,
        };
        assert!(validate_create_session(&input).is_ok());

        let too_fast = CreateSessionInput {
            sampling_frequency_hz: 1001,
            ..input.clone()
        };
        assert!(validate_create_session(&too_fast).is_err());

        let no_sensors = CreateSessionInput {
            sensors: Vec::new(),
            ..input
        };
        assert!(validate_create_session(&no_sensors).is_err());
    }

    #[test]
    fn solution_steps_are_trimmed_and_required() {
        let input = SubmitSolutionInput {
            session_id: SessionId::generate(),
            description: "fixed bearing".to_string(),
            steps_performed: vec!["  ".to_string(), "replaced seal ".to_string()],
            recommendations: None,
        };
        let steps = validate_solution_input(&input).unwrap();
        assert_eq!(steps, vec!["replaced seal".to_string()]);

        let blank = SubmitSolutionInput {
            steps_performed: vec!["  ".to_string()],
            ..input
        };
        assert!(validate_solution_input(&blank).is_err());
    }

    #[test]
    fn data_file_must_have_content() {
        let input = UploadDataFileInput {
            session_id: SessionId::generate(),
            file_name: "data.json".to_string(),
            file_size: 0,
            data_format: DataFormat::Json,
            record_count: None,
        };
        assert!(validate_data_file(&input).is_err());
    }
}
