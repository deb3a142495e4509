use chrono::Utc;
use tbx_core::error::{PermissionError, SessionError, TestboxError};
use tbx_core::types::enums::{
    DataFormat, EventSource, MachineStatus, SensorType, SessionStatus, UserRole,
};
use tbx_core::types::ids::{MachineId, SessionId, UserId};
use tbx_core::types::io::{
    ApproveClosureInput, CreateSessionInput, RequestClosureInput, SessionFilter,
    SubmitSolutionInput, UploadDataFileInput,
};
use tbx_core::types::machine::Machine;
use tbx_core::types::session::SensorModule;
use tbx_core::types::user::User;
use tbx_core::{ActorContext, Testbox};
use tbx_db::schema::with_test_db;
use tbx_db::DbStore;

fn user(name: &str, email: &str, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: UserId::generate(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        created_at: now,
        updated_at: now,
    }
}

fn machine(name: &str) -> Machine {
    let now = Utc::now();
    Machine {
        id: MachineId::generate(),
        name: name.to_string(),
        location: "Hall A".to_string(),
        kind: "hydraulic_press".to_string(),
        serial_number: "HP-2200-011".to_string(),
        status: MachineStatus::Operational,
        created_at: now,
        updated_at: now,
    }
}

struct Fixture {
    testbox: Testbox<DbStore>,
    manager: ActorContext,
    tech: ActorContext,
    other_tech: ActorContext,
    machine_id: MachineId,
}

fn setup() -> Fixture {
    let conn = with_test_db().unwrap();
    let testbox = Testbox::new(DbStore::new(conn));

    let manager = user(
        "Sarah Manager",
        "sarah@testbox.local",
        UserRole::MaintenanceManager,
    );
    let tech = user("John Technician", "john@testbox.local", UserRole::Technician);
    let other_tech = user("Mia Technician", "mia@testbox.local", UserRole::Technician);
    let press = machine("Hydraulic press 3");

    testbox
        .directory()
        .seed(
            &[manager.clone(), tech.clone(), other_tech.clone()],
            &[press.clone()],
        )
        .unwrap();

    Fixture {
        testbox,
        manager: ActorContext::new(manager, EventSource::Cli, None),
        tech: ActorContext::new(tech, EventSource::Cli, None),
        other_tech: ActorContext::new(other_tech, EventSource::Cli, None),
        machine_id: press.id,
    }
}

fn create_input(fixture: &Fixture) -> CreateSessionInput {
    CreateSessionInput {
        name: "Bearing vibration survey".to_string(),
        machine_id: fixture.machine_id.clone(),
        assigned_to: fixture.tech.actor.id.clone(),
        sensors: vec![SensorModule {
            id: "vib-01".to_string(),
            name: "Vibration probe".to_string(),
            kind: SensorType::Vibration,
            description: "Spindle housing, axial".to_string(),
            is_active: true,
        }],
        sampling_frequency_hz: 100,
        notes: None,
        auto_start: false,
    }
}

fn upload_input(session_id: &SessionId) -> UploadDataFileInput {
    UploadDataFileInput {
        session_id: session_id.clone(),
        file_name: "vibration-run-1.csv".to_string(),
        file_size: 48_211,
        data_format: DataFormat::Csv,
        record_count: Some(1_200),
    }
}

fn solution_input(session_id: &SessionId) -> SubmitSolutionInput {
    SubmitSolutionInput {
        session_id: session_id.clone(),
        description: "Worn outer-race bearing, replaced and re-torqued".to_string(),
        steps_performed: vec![
            "Inspected spindle housing".to_string(),
            "Replaced bearing".to_string(),
        ],
        recommendations: Some("Re-check alignment in 30 days".to_string()),
    }
}

/// Drives one session through the entire lifecycle and checks each stage.
#[test]
fn full_lifecycle_to_completed() {
    let f = setup();
    let sessions = f.testbox.sessions();

    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    assert_eq!(session.status, SessionStatus::Assigned);
    assert_eq!(session.assigned_to.id, f.tech.actor.id);
    assert_eq!(session.created_by.id, f.manager.actor.id);
    assert!(session.end_time.is_none());

    let session = sessions.start(&f.tech, &session.id).unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);

    let session = sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    assert_eq!(session.status, SessionStatus::DataUploaded);
    assert_eq!(session.data_files.len(), 1);
    assert_eq!(session.data_files[0].uploaded_by.id, f.tech.actor.id);

    // A second upload appends but does not move the status.
    let session = sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    assert_eq!(session.status, SessionStatus::DataUploaded);
    assert_eq!(session.data_files.len(), 2);

    let session = sessions.mark_analysis_complete(&f.tech, &session.id).unwrap();
    assert_eq!(session.status, SessionStatus::AnalysisComplete);

    let session = sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap();
    assert_eq!(session.status, SessionStatus::SolutionSubmitted);
    let solution = session.solution.as_ref().unwrap();
    assert!(!solution.approved);
    assert_eq!(solution.submitted_by.id, f.tech.actor.id);

    let session = sessions.approve_solution(&f.manager, &session.id).unwrap();
    let solution = session.solution.as_ref().unwrap();
    assert!(solution.approved);
    assert_eq!(solution.reviewed_by.as_ref().unwrap().id, f.manager.actor.id);
    // Approval alone does not complete the session.
    assert_eq!(session.status, SessionStatus::SolutionSubmitted);

    let session = sessions
        .request_closure(
            &f.tech,
            RequestClosureInput {
                session_id: session.id.clone(),
                reason: "Fix verified on second run".to_string(),
            },
        )
        .unwrap();
    let request = session.closure_request.as_ref().unwrap();
    assert!(!request.approved);
    assert_eq!(request.solution_id, session.solution.as_ref().unwrap().id);

    let session = sessions
        .approve_closure(
            &f.manager,
            ApproveClosureInput {
                session_id: session.id.clone(),
                comments: Some("Good turnaround".to_string()),
            },
        )
        .unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.end_time.is_some());
    let request = session.closure_request.as_ref().unwrap();
    assert!(request.approved);
    assert_eq!(request.reviewed_by.as_ref().unwrap().id, f.manager.actor.id);
}

#[test]
fn auto_start_creates_in_progress() {
    let f = setup();
    let mut input = create_input(&f);
    input.auto_start = true;
    let session = f.testbox.sessions().create(&f.manager, input).unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
}

#[test]
fn technician_cannot_create_sessions() {
    let f = setup();
    let err = f
        .testbox
        .sessions()
        .create(&f.tech, create_input(&f))
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::Denied { .. })
    ));
}

#[test]
fn unassigned_technician_is_rejected() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();

    let err = sessions.start(&f.other_tech, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::NotAssigned)
    ));

    let err = sessions
        .upload_data(&f.other_tech, upload_input(&session.id))
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::NotAssigned)
    ));

    // Reads are scoped the same way.
    let err = sessions.get(&f.other_tech, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::NotAssigned)
    ));
}

#[test]
fn manager_cannot_submit_solution_and_technician_cannot_approve() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    sessions.mark_analysis_complete(&f.tech, &session.id).unwrap();

    let err = sessions
        .submit_solution(&f.manager, solution_input(&session.id))
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::Denied { .. })
    ));

    sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap();
    let err = sessions.approve_solution(&f.tech, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Permission(PermissionError::Denied { .. })
    ));
}

#[test]
fn analysis_requires_uploaded_data() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();

    let err = sessions
        .mark_analysis_complete(&f.tech, &session.id)
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn large_data_files_round_trip() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();

    // Sizes past the 32-bit range must survive the integer columns.
    let mut input = upload_input(&session.id);
    input.file_size = 5_000_000_000;
    input.record_count = Some(4_294_967_296);
    let session = sessions.upload_data(&f.tech, input).unwrap();
    assert_eq!(session.data_files[0].file_size, 5_000_000_000);
    assert_eq!(session.data_files[0].record_count, Some(4_294_967_296));
}

#[test]
fn solution_can_only_be_submitted_once() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    sessions.mark_analysis_complete(&f.tech, &session.id).unwrap();
    sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap();

    let err = sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn solution_cannot_be_approved_twice() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    sessions.mark_analysis_complete(&f.tech, &session.id).unwrap();
    sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap();

    let session = sessions.approve_solution(&f.manager, &session.id).unwrap();
    let first = session.solution.clone().unwrap();
    assert!(first.approved);

    let err = sessions.approve_solution(&f.manager, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));

    // The failed attempt left the review stamp untouched.
    let session = sessions.get(&f.manager, &session.id).unwrap();
    let solution = session.solution.unwrap();
    assert_eq!(
        solution.reviewed_by.map(|user| user.id),
        first.reviewed_by.map(|user| user.id)
    );
    assert_eq!(solution.reviewed_at, first.reviewed_at);
}

#[test]
fn closure_requires_approved_solution() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();
    sessions.mark_analysis_complete(&f.tech, &session.id).unwrap();
    sessions
        .submit_solution(&f.tech, solution_input(&session.id))
        .unwrap();

    // Solution submitted but not yet approved.
    let err = sessions
        .request_closure(
            &f.tech,
            RequestClosureInput {
                session_id: session.id.clone(),
                reason: "Done".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn completed_sessions_are_terminal() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    let session = sessions.stop(&f.manager, &session.id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.end_time.is_some());

    let err = sessions
        .upload_data(&f.tech, upload_input(&session.id))
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));

    let err = sessions.cancel(&f.manager, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));

    // Completed sessions are kept; even delete is refused.
    let err = sessions.delete(&f.manager, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn cancel_keeps_end_time_unset_and_allows_delete() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();

    let session = sessions.cancel(&f.manager, &session.id).unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.end_time.is_none());

    sessions.delete(&f.manager, &session.id).unwrap();
    let err = sessions.get(&f.manager, &session.id).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::NotFound)
    ));
}

#[test]
fn reassign_only_while_assigned() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();

    let session = sessions
        .reassign(&f.manager, &session.id, &f.other_tech.actor.id)
        .unwrap();
    assert_eq!(session.assigned_to.id, f.other_tech.actor.id);

    // The new assignee owns the session now.
    sessions.start(&f.other_tech, &session.id).unwrap();
    let err = sessions
        .reassign(&f.manager, &session.id, &f.tech.actor.id)
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn reassign_requires_technician_assignee() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    let err = sessions
        .reassign(&f.manager, &session.id, &f.manager.actor.id)
        .unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidInput { .. })
    ));
}

#[test]
fn sampling_frequency_bounds_are_enforced() {
    let f = setup();
    let sessions = f.testbox.sessions();

    let mut input = create_input(&f);
    input.sampling_frequency_hz = 0;
    let err = sessions.create(&f.manager, input).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidInput { .. })
    ));

    let mut input = create_input(&f);
    input.sampling_frequency_hz = 1_001;
    let err = sessions.create(&f.manager, input).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidInput { .. })
    ));

    let mut input = create_input(&f);
    input.sampling_frequency_hz = 1_000;
    sessions.create(&f.manager, input).unwrap();
}

#[test]
fn technicians_only_list_their_own_sessions() {
    let f = setup();
    let sessions = f.testbox.sessions();
    sessions.create(&f.manager, create_input(&f)).unwrap();
    let mut input = create_input(&f);
    input.name = "Pump acoustic check".to_string();
    input.assigned_to = f.other_tech.actor.id.clone();
    sessions.create(&f.manager, input).unwrap();

    let all = sessions.list(&f.manager, &SessionFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    let mine = sessions.list(&f.tech, &SessionFilter::default()).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].assigned_to.id, f.tech.actor.id);

    // An explicit filter cannot widen a technician's view.
    let filter = SessionFilter {
        assigned_to: Some(f.other_tech.actor.id.clone()),
        ..SessionFilter::default()
    };
    let leaked = sessions.list(&f.tech, &filter).unwrap();
    assert!(leaked.is_empty());
}

#[test]
fn list_filters_by_status_and_query() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let first = sessions.create(&f.manager, create_input(&f)).unwrap();
    let mut input = create_input(&f);
    input.name = "Pump acoustic check".to_string();
    sessions.create(&f.manager, input).unwrap();
    sessions.start(&f.tech, &first.id).unwrap();

    let filter = SessionFilter {
        status: Some(SessionStatus::InProgress),
        ..SessionFilter::default()
    };
    let in_progress = sessions.list(&f.manager, &filter).unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, first.id);

    let filter = SessionFilter {
        query: Some("acoustic".to_string()),
        ..SessionFilter::default()
    };
    let hits = sessions.list(&f.manager, &filter).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Pump acoustic check");
}

#[test]
fn events_are_appended_in_order() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    sessions.start(&f.tech, &session.id).unwrap();
    sessions.upload_data(&f.tech, upload_input(&session.id)).unwrap();

    let events = f.testbox.events().list(None, None).unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert_eq!(events[0].actor_id, f.manager.actor.id);
    assert_eq!(events[1].actor_id, f.tech.actor.id);
    assert_eq!(events[0].body["kind"], "session_created");
    assert_eq!(events[1].body["kind"], "session_started");
    assert_eq!(events[2].body["kind"], "data_file_uploaded");

    // Tail reads pick up after a known sequence number.
    let tail = f.testbox.events().list(Some(events[1].seq), None).unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].seq, events[2].seq);
}

#[test]
fn failed_operation_leaves_no_event() {
    let f = setup();
    let sessions = f.testbox.sessions();
    let session = sessions.create(&f.manager, create_input(&f)).unwrap();
    let before = f.testbox.events().list(None, None).unwrap().len();

    sessions
        .mark_analysis_complete(&f.tech, &session.id)
        .unwrap_err();

    let after = f.testbox.events().list(None, None).unwrap().len();
    assert_eq!(before, after);
}

#[test]
fn create_rejects_unknown_machine_and_manager_assignee() {
    let f = setup();
    let sessions = f.testbox.sessions();

    let mut input = create_input(&f);
    input.machine_id = MachineId::generate();
    let err = sessions.create(&f.manager, input).unwrap_err();
    assert!(matches!(err, TestboxError::Directory(_)));

    let mut input = create_input(&f);
    input.assigned_to = f.manager.actor.id.clone();
    let err = sessions.create(&f.manager, input).unwrap_err();
    assert!(matches!(
        err,
        TestboxError::Session(SessionError::InvalidInput { .. })
    ));
}
