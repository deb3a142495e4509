use crate::directory::{MachineRepository, UserRepository};
use crate::error::{DirectoryError, PermissionError, SessionError, TestboxError};
use crate::events::EventRepository;
use crate::permissions::{has_permission, Action};
use crate::sessions::SessionRepository;
use crate::store::Store;
use crate::types::enums::{EventSource, SessionOperation, SessionStatus, UserRole};
use crate::types::event::{EventBody, EventRecord};
use crate::types::ids::{
    ClosureRequestId, DataFileId, MachineId, SessionId, SolutionId, UserId,
};
use crate::types::io::{
    ApproveClosureInput, CreateSessionInput, MachineFilter, RequestClosureInput, SessionFilter,
    SubmitSolutionInput, UploadDataFileInput,
};
use crate::types::machine::Machine;
use crate::types::session::{
    SessionClosureRequest, SessionDataFile, SessionSolution, TestSession,
};
use crate::types::user::User;
use crate::validation::{
    check_operation, validate_closure_reason, validate_create_session, validate_data_file,
    validate_solution_input,
};
use chrono::Utc;

/// The acting user, threaded explicitly through every operation. There is no
/// ambient logged-in state; callers resolve the actor at their own boundary
/// and pass it in.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor: User,
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl ActorContext {
    pub fn new(actor: User, source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            actor,
            source,
            correlation_id,
        }
    }
}

pub struct Testbox<S: Store> {
    store: S,
}

impl<S: Store> Testbox<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn sessions(&self) -> SessionsApi<'_, S> {
        SessionsApi { core: self }
    }

    pub fn directory(&self) -> DirectoryApi<'_, S> {
        DirectoryApi { core: self }
    }

    pub fn events(&self) -> EventsApi<'_, S> {
        EventsApi { core: self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn with_events<T, F>(&self, ctx: &ActorContext, f: F) -> Result<T, TestboxError>
    where
        F: FnOnce(&S) -> Result<(T, Vec<EventBody>), TestboxError>,
    {
        self.store.with_tx(|store| {
            let (value, bodies) = f(store)?;
            for body in bodies {
                let record = build_event_record(ctx, body)?;
                store.events().append(record)?;
            }
            Ok(value)
        })
    }
}

pub struct SessionsApi<'a, S: Store> {
    core: &'a Testbox<S>,
}

impl<'a, S: Store> SessionsApi<'a, S> {
    pub fn create(
        &self,
        ctx: &ActorContext,
        input: CreateSessionInput,
    ) -> Result<TestSession, TestboxError> {
        require_permission(&ctx.actor, Action::CreateSessions)?;
        validate_create_session(&input).map_err(TestboxError::from)?;

        self.core.with_events(ctx, |store| {
            if store.machines().get(&input.machine_id)?.is_none() {
                return Err(DirectoryError::MachineNotFound.into());
            }
            let assignee = store
                .users()
                .get(&input.assigned_to)?
                .ok_or(DirectoryError::UserNotFound)?;
            if assignee.role != UserRole::Technician {
                return Err(TestboxError::Session(SessionError::InvalidInput {
                    message: "sessions must be assigned to a technician".to_string(),
                }));
            }

            let now = Utc::now();
            let status = if input.auto_start {
                SessionStatus::InProgress
            } else {
                SessionStatus::Assigned
            };
            let session = TestSession {
                id: SessionId::generate(),
                name: input.name,
                machine_id: input.machine_id,
                created_by: ctx.actor.clone(),
                assigned_to: assignee,
                sensors: input.sensors,
                sampling_frequency_hz: input.sampling_frequency_hz,
                start_time: now,
                end_time: None,
                status,
                notes: input.notes,
                data_files: Vec::new(),
                solution: None,
                closure_request: None,
                created_at: now,
                updated_at: now,
            };
            store.sessions().insert(&session)?;
            Ok((
                session.clone(),
                vec![EventBody::SessionCreated { session }],
            ))
        })
    }

    pub fn get(&self, ctx: &ActorContext, id: &SessionId) -> Result<TestSession, TestboxError> {
        require_permission(&ctx.actor, Action::ViewAllSessions)?;
        let session = self
            .core
            .store
            .sessions()
            .get(id)?
            .ok_or(SessionError::NotFound)?;
        if ctx.actor.is_technician() && session.assigned_to.id != ctx.actor.id {
            return Err(PermissionError::NotAssigned.into());
        }
        Ok(session)
    }

    /// Conjunctive filters; technicians only ever see sessions assigned to
    /// them, whatever the explicit filter says.
    pub fn list(
        &self,
        ctx: &ActorContext,
        filter: &SessionFilter,
    ) -> Result<Vec<TestSession>, TestboxError> {
        require_permission(&ctx.actor, Action::ViewAllSessions)?;
        let mut sessions = self.core.store.sessions().list(filter)?;
        if ctx.actor.is_technician() {
            sessions.retain(|session| session.assigned_to.id == ctx.actor.id);
        }
        Ok(sessions)
    }

    pub fn start(&self, ctx: &ActorContext, id: &SessionId) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::Start)?;
            let updated =
                store
                    .sessions()
                    .set_status(id, SessionStatus::InProgress, session.end_time)?;
            Ok((
                updated,
                vec![EventBody::SessionStarted {
                    session_id: id.clone(),
                }],
            ))
        })
    }

    pub fn upload_data(
        &self,
        ctx: &ActorContext,
        input: UploadDataFileInput,
    ) -> Result<TestSession, TestboxError> {
        validate_data_file(&input).map_err(TestboxError::from)?;
        self.core.with_events(ctx, |store| {
            let session = load(store, &input.session_id)?;
            check_operation(&session, &ctx.actor, SessionOperation::UploadData)?;

            let file = SessionDataFile {
                id: DataFileId::generate(),
                session_id: session.id.clone(),
                file_name: input.file_name,
                file_size: input.file_size,
                uploaded_at: Utc::now(),
                uploaded_by: ctx.actor.clone(),
                data_format: input.data_format,
                record_count: input.record_count,
            };
            store.sessions().append_data_file(&file)?;

            // Only the first upload advances the status; later uploads just
            // append to the file list.
            let updated = if matches!(
                session.status,
                SessionStatus::Assigned | SessionStatus::InProgress
            ) {
                store.sessions().set_status(
                    &session.id,
                    SessionStatus::DataUploaded,
                    session.end_time,
                )?
            } else {
                load(store, &session.id)?
            };

            Ok((
                updated,
                vec![EventBody::DataFileUploaded {
                    session_id: session.id,
                    file_id: file.id,
                    file_name: file.file_name,
                }],
            ))
        })
    }

    pub fn mark_analysis_complete(
        &self,
        ctx: &ActorContext,
        id: &SessionId,
    ) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::MarkAnalysisComplete)?;
            let updated = store.sessions().set_status(
                id,
                SessionStatus::AnalysisComplete,
                session.end_time,
            )?;
            Ok((
                updated,
                vec![EventBody::AnalysisCompleted {
                    session_id: id.clone(),
                }],
            ))
        })
    }

    pub fn submit_solution(
        &self,
        ctx: &ActorContext,
        input: SubmitSolutionInput,
    ) -> Result<TestSession, TestboxError> {
        let steps = validate_solution_input(&input).map_err(TestboxError::from)?;
        self.core.with_events(ctx, |store| {
            let session = load(store, &input.session_id)?;
            check_operation(&session, &ctx.actor, SessionOperation::SubmitSolution)?;

            let solution = SessionSolution {
                id: SolutionId::generate(),
                session_id: session.id.clone(),
                description: input.description,
                steps_performed: steps,
                recommendations: input.recommendations,
                submitted_by: ctx.actor.clone(),
                submitted_at: Utc::now(),
                reviewed_by: None,
                reviewed_at: None,
                approved: false,
            };
            store.sessions().set_solution(&solution)?;
            let updated = store.sessions().set_status(
                &session.id,
                SessionStatus::SolutionSubmitted,
                session.end_time,
            )?;
            Ok((
                updated,
                vec![EventBody::SolutionSubmitted {
                    session_id: session.id,
                    solution_id: solution.id,
                }],
            ))
        })
    }

    pub fn approve_solution(
        &self,
        ctx: &ActorContext,
        id: &SessionId,
    ) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::ApproveSolution)?;

            // check_operation guarantees an unapproved solution is present.
            let Some(mut solution) = session.solution else {
                return Err(TestboxError::Internal {
                    message: "approved transition without solution".to_string(),
                });
            };
            solution.approved = true;
            solution.reviewed_by = Some(ctx.actor.clone());
            solution.reviewed_at = Some(Utc::now());
            store.sessions().update_solution(&solution)?;

            let updated = load(store, id)?;
            Ok((
                updated,
                vec![EventBody::SolutionApproved {
                    session_id: id.clone(),
                    solution_id: solution.id,
                    reviewed_by: ctx.actor.id.clone(),
                }],
            ))
        })
    }

    pub fn request_closure(
        &self,
        ctx: &ActorContext,
        input: RequestClosureInput,
    ) -> Result<TestSession, TestboxError> {
        validate_closure_reason(&input.reason).map_err(TestboxError::from)?;
        self.core.with_events(ctx, |store| {
            let session = load(store, &input.session_id)?;
            check_operation(&session, &ctx.actor, SessionOperation::RequestClosure)?;

            let Some(solution) = session.solution.as_ref() else {
                return Err(TestboxError::Internal {
                    message: "closure requested without solution".to_string(),
                });
            };
            let request = SessionClosureRequest {
                id: ClosureRequestId::generate(),
                session_id: session.id.clone(),
                requested_by: ctx.actor.clone(),
                requested_at: Utc::now(),
                reason: input.reason,
                solution_id: solution.id.clone(),
                approved: false,
                reviewed_by: None,
                reviewed_at: None,
                comments: None,
            };
            store.sessions().set_closure_request(&request)?;

            let updated = load(store, &session.id)?;
            Ok((
                updated,
                vec![EventBody::ClosureRequested {
                    session_id: session.id,
                    closure_request_id: request.id,
                }],
            ))
        })
    }

    pub fn approve_closure(
        &self,
        ctx: &ActorContext,
        input: ApproveClosureInput,
    ) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, &input.session_id)?;
            check_operation(&session, &ctx.actor, SessionOperation::ApproveClosure)?;

            let Some(mut request) = session.closure_request else {
                return Err(TestboxError::Internal {
                    message: "closure approved without request".to_string(),
                });
            };
            let now = Utc::now();
            request.approved = true;
            request.reviewed_by = Some(ctx.actor.clone());
            request.reviewed_at = Some(now);
            request.comments = input.comments;
            store.sessions().update_closure_request(&request)?;

            let end_time = session.end_time.or(Some(now));
            let updated =
                store
                    .sessions()
                    .set_status(&input.session_id, SessionStatus::Completed, end_time)?;
            Ok((
                updated,
                vec![EventBody::ClosureApproved {
                    session_id: input.session_id.clone(),
                    closure_request_id: request.id,
                    reviewed_by: ctx.actor.id.clone(),
                }],
            ))
        })
    }

    /// Force-completes an in-progress session without the solution/closure
    /// workflow.
    pub fn stop(&self, ctx: &ActorContext, id: &SessionId) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::Stop)?;
            let end_time = session.end_time.or_else(|| Some(Utc::now()));
            let updated = store
                .sessions()
                .set_status(id, SessionStatus::Completed, end_time)?;
            Ok((
                updated,
                vec![EventBody::SessionStopped {
                    session_id: id.clone(),
                }],
            ))
        })
    }

    pub fn cancel(&self, ctx: &ActorContext, id: &SessionId) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::Cancel)?;
            let updated =
                store
                    .sessions()
                    .set_status(id, SessionStatus::Cancelled, session.end_time)?;
            Ok((
                updated,
                vec![EventBody::SessionCancelled {
                    session_id: id.clone(),
                }],
            ))
        })
    }

    pub fn mark_error(
        &self,
        ctx: &ActorContext,
        id: &SessionId,
    ) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::MarkError)?;
            let updated = store
                .sessions()
                .set_status(id, SessionStatus::Error, session.end_time)?;
            Ok((
                updated,
                vec![EventBody::SessionErrored {
                    session_id: id.clone(),
                }],
            ))
        })
    }

    pub fn reassign(
        &self,
        ctx: &ActorContext,
        id: &SessionId,
        assigned_to: &UserId,
    ) -> Result<TestSession, TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::Reassign)?;
            let assignee = store
                .users()
                .get(assigned_to)?
                .ok_or(DirectoryError::UserNotFound)?;
            if assignee.role != UserRole::Technician {
                return Err(TestboxError::Session(SessionError::InvalidInput {
                    message: "sessions must be assigned to a technician".to_string(),
                }));
            }
            let updated = store.sessions().reassign(id, assigned_to)?;
            Ok((
                updated,
                vec![EventBody::SessionReassigned {
                    session_id: id.clone(),
                    assigned_to: assigned_to.clone(),
                }],
            ))
        })
    }

    pub fn delete(&self, ctx: &ActorContext, id: &SessionId) -> Result<(), TestboxError> {
        self.core.with_events(ctx, |store| {
            let session = load(store, id)?;
            check_operation(&session, &ctx.actor, SessionOperation::Delete)?;
            store.sessions().delete(id)?;
            Ok((
                (),
                vec![EventBody::SessionDeleted {
                    session_id: id.clone(),
                }],
            ))
        })
    }
}

pub struct DirectoryApi<'a, S: Store> {
    core: &'a Testbox<S>,
}

impl<'a, S: Store> DirectoryApi<'a, S> {
    pub fn get_user(&self, id: &UserId) -> Result<Option<User>, TestboxError> {
        self.core.store.users().get(id).map_err(TestboxError::from)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TestboxError> {
        self.core
            .store
            .users()
            .get_by_email(email)
            .map_err(TestboxError::from)
    }

    pub fn list_users(&self) -> Result<Vec<User>, TestboxError> {
        self.core.store.users().list().map_err(TestboxError::from)
    }

    pub fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, TestboxError> {
        self.core
            .store
            .machines()
            .get(id)
            .map_err(TestboxError::from)
    }

    pub fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, TestboxError> {
        self.core
            .store
            .machines()
            .list(filter)
            .map_err(TestboxError::from)
    }

    /// Seeds the read-only directories. This is the process bootstrap, not a
    /// session operation, so it takes no actor.
    pub fn seed(&self, users: &[User], machines: &[Machine]) -> Result<(), TestboxError> {
        self.core.store.with_tx(|store| {
            for user in users {
                store.users().insert(user)?;
            }
            for machine in machines {
                store.machines().insert(machine)?;
            }
            Ok(())
        })
    }
}

pub struct EventsApi<'a, S: Store> {
    core: &'a Testbox<S>,
}

impl<'a, S: Store> EventsApi<'a, S> {
    pub fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, TestboxError> {
        self.core.store.events().list(after, limit)
    }
}

fn require_permission(actor: &User, action: Action) -> Result<(), TestboxError> {
    if has_permission(actor.role, action) {
        Ok(())
    } else {
        Err(PermissionError::Denied {
            role: actor.role,
            action,
        }
        .into())
    }
}

fn load<S: Store>(store: &S, id: &SessionId) -> Result<TestSession, TestboxError> {
    store
        .sessions()
        .get(id)?
        .ok_or_else(|| SessionError::NotFound.into())
}

fn build_event_record(ctx: &ActorContext, body: EventBody) -> Result<EventRecord, TestboxError> {
    let value = serde_json::to_value(body).map_err(|err| TestboxError::Internal {
        message: err.to_string(),
    })?;
    Ok(EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        actor_id: ctx.actor.id.clone(),
        body: value,
    })
}
