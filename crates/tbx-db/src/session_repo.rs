use crate::util::{
    column_to_size, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339,
    size_to_column, to_rfc3339,
};
use rusqlite::Connection;
use tbx_core::error::SessionError;
use tbx_core::sessions::SessionRepository;
use tbx_core::types::enums::{DataFormat, SessionStatus, UserRole};
use tbx_core::types::ids::{
    ClosureRequestId, DataFileId, MachineId, SessionId, SolutionId, UserId,
};
use tbx_core::types::io::SessionFilter;
use tbx_core::types::session::{
    SensorModule, SessionClosureRequest, SessionDataFile, SessionSolution, TestSession,
};
use tbx_core::types::user::User;

pub struct SessionRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> SessionRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn invalid(err: impl std::fmt::Display) -> SessionError {
    SessionError::InvalidInput {
        message: err.to_string(),
    }
}

const SESSION_COLUMNS: &str = "id, name, machine_id, created_by, assigned_to, sensors, sampling_frequency_hz, start_time, end_time, status, notes, created_at, updated_at";

impl<'a> SessionRepository for SessionRepo<'a> {
    fn insert(&self, session: &TestSession) -> Result<(), SessionError> {
        let sql = "INSERT INTO sessions (id, name, machine_id, created_by, assigned_to, sensors, sampling_frequency_hz, start_time, end_time, status, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";
        let params = (
            session.id.as_str(),
            session.name.as_str(),
            session.machine_id.as_str(),
            session.created_by.id.as_str(),
            session.assigned_to.id.as_str(),
            encode_json(&session.sensors).map_err(invalid)?,
            session.sampling_frequency_hz,
            to_rfc3339(&session.start_time),
            session.end_time.map(|value| to_rfc3339(&value)),
            encode_enum(&session.status).map_err(invalid)?,
            session.notes.clone(),
            to_rfc3339(&session.created_at),
            to_rfc3339(&session.updated_at),
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        Ok(())
    }

    fn get(&self, id: &SessionId) -> Result<Option<TestSession>, SessionError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(invalid)?;
        let mut rows = stmt.query([id.as_str()]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        self.assemble_session(row).map(Some)
    }

    fn list(&self, filter: &SessionFilter) -> Result<Vec<TestSession>, SessionError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC");
        let mut stmt = self.conn.prepare(&sql).map_err(invalid)?;
        let mut rows = stmt.query([]).map_err(invalid)?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().map_err(invalid)? {
            sessions.push(self.assemble_session(row)?);
        }
        sessions.retain(|session| filter.matches(session));
        Ok(sessions)
    }

    fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        end_time: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<TestSession, SessionError> {
        let now = chrono::Utc::now();
        let sql = "UPDATE sessions SET status = ?1, end_time = COALESCE(?2, end_time), updated_at = ?3 WHERE id = ?4";
        let params = (
            encode_enum(&status).map_err(invalid)?,
            end_time.map(|value| to_rfc3339(&value)),
            to_rfc3339(&now),
            id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(invalid)?;
        if changed == 0 {
            return Err(SessionError::NotFound);
        }
        self.get(id)?.ok_or(SessionError::NotFound)
    }

    fn append_data_file(&self, file: &SessionDataFile) -> Result<(), SessionError> {
        let sql = "INSERT INTO session_data_files (id, session_id, file_name, file_size, uploaded_at, uploaded_by, data_format, record_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
        let params = (
            file.id.as_str(),
            file.session_id.as_str(),
            file.file_name.as_str(),
            size_to_column(file.file_size).map_err(invalid)?,
            to_rfc3339(&file.uploaded_at),
            file.uploaded_by.id.as_str(),
            encode_enum(&file.data_format).map_err(invalid)?,
            file.record_count
                .map(size_to_column)
                .transpose()
                .map_err(invalid)?,
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        let now = chrono::Utc::now();
        self.conn
            .execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                (to_rfc3339(&now), file.session_id.as_str()),
            )
            .map_err(invalid)?;
        Ok(())
    }

    fn set_solution(&self, solution: &SessionSolution) -> Result<(), SessionError> {
        let sql = "INSERT INTO session_solutions (id, session_id, description, steps_performed, recommendations, submitted_by, submitted_at, reviewed_by, reviewed_at, approved) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
        let params = (
            solution.id.as_str(),
            solution.session_id.as_str(),
            solution.description.as_str(),
            encode_json(&solution.steps_performed).map_err(invalid)?,
            solution.recommendations.clone(),
            solution.submitted_by.id.as_str(),
            to_rfc3339(&solution.submitted_at),
            solution.reviewed_by.as_ref().map(|user| user.id.as_str()),
            solution.reviewed_at.map(|value| to_rfc3339(&value)),
            solution.approved,
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        Ok(())
    }

    fn update_solution(&self, solution: &SessionSolution) -> Result<(), SessionError> {
        let sql = "UPDATE session_solutions SET description = ?1, steps_performed = ?2, recommendations = ?3, reviewed_by = ?4, reviewed_at = ?5, approved = ?6 WHERE id = ?7";
        let params = (
            solution.description.as_str(),
            encode_json(&solution.steps_performed).map_err(invalid)?,
            solution.recommendations.clone(),
            solution.reviewed_by.as_ref().map(|user| user.id.as_str()),
            solution.reviewed_at.map(|value| to_rfc3339(&value)),
            solution.approved,
            solution.id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(invalid)?;
        if changed == 0 {
            return Err(SessionError::NotFound);
        }
        Ok(())
    }

    fn set_closure_request(&self, request: &SessionClosureRequest) -> Result<(), SessionError> {
        let sql = "INSERT INTO session_closure_requests (id, session_id, requested_by, requested_at, reason, solution_id, approved, reviewed_by, reviewed_at, comments) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
        let params = (
            request.id.as_str(),
            request.session_id.as_str(),
            request.requested_by.id.as_str(),
            to_rfc3339(&request.requested_at),
            request.reason.as_str(),
            request.solution_id.as_str(),
            request.approved,
            request.reviewed_by.as_ref().map(|user| user.id.as_str()),
            request.reviewed_at.map(|value| to_rfc3339(&value)),
            request.comments.clone(),
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        Ok(())
    }

    fn update_closure_request(&self, request: &SessionClosureRequest) -> Result<(), SessionError> {
        let sql = "UPDATE session_closure_requests SET approved = ?1, reviewed_by = ?2, reviewed_at = ?3, comments = ?4 WHERE id = ?5";
        let params = (
            request.approved,
            request.reviewed_by.as_ref().map(|user| user.id.as_str()),
            request.reviewed_at.map(|value| to_rfc3339(&value)),
            request.comments.clone(),
            request.id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(invalid)?;
        if changed == 0 {
            return Err(SessionError::NotFound);
        }
        Ok(())
    }

    fn reassign(&self, id: &SessionId, assigned_to: &UserId) -> Result<TestSession, SessionError> {
        let now = chrono::Utc::now();
        let sql = "UPDATE sessions SET assigned_to = ?1, updated_at = ?2 WHERE id = ?3";
        let changed = self
            .conn
            .execute(sql, (assigned_to.as_str(), to_rfc3339(&now), id.as_str()))
            .map_err(invalid)?;
        if changed == 0 {
            return Err(SessionError::NotFound);
        }
        self.get(id)?.ok_or(SessionError::NotFound)
    }

    fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        // Children go with the session via ON DELETE CASCADE.
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", [id.as_str()])
            .map_err(invalid)?;
        if changed == 0 {
            return Err(SessionError::NotFound);
        }
        Ok(())
    }
}

impl<'a> SessionRepo<'a> {
    fn assemble_session(&self, row: &rusqlite::Row<'_>) -> Result<TestSession, SessionError> {
        let id: String = row.get(0).map_err(invalid)?;
        let name: String = row.get(1).map_err(invalid)?;
        let machine_id: String = row.get(2).map_err(invalid)?;
        let created_by: String = row.get(3).map_err(invalid)?;
        let assigned_to: String = row.get(4).map_err(invalid)?;
        let sensors: String = row.get(5).map_err(invalid)?;
        let sampling_frequency_hz: u32 = row.get(6).map_err(invalid)?;
        let start_time: String = row.get(7).map_err(invalid)?;
        let end_time: Option<String> = row.get(8).map_err(invalid)?;
        let status: String = row.get(9).map_err(invalid)?;
        let notes: Option<String> = row.get(10).map_err(invalid)?;
        let created_at: String = row.get(11).map_err(invalid)?;
        let updated_at: String = row.get(12).map_err(invalid)?;

        let id = SessionId::new(id).map_err(invalid)?;
        let machine_id = MachineId::new(machine_id).map_err(invalid)?;
        let created_by = self.load_user(&created_by)?;
        let assigned_to = self.load_user(&assigned_to)?;
        let sensors: Vec<SensorModule> = decode_json(&sensors).map_err(invalid)?;
        let status: SessionStatus = decode_enum(&status).map_err(invalid)?;

        let data_files = self.load_data_files(&id)?;
        let solution = self.load_solution(&id)?;
        let closure_request = self.load_closure_request(&id)?;

        Ok(TestSession {
            id,
            name,
            machine_id,
            created_by,
            assigned_to,
            sensors,
            sampling_frequency_hz,
            start_time: from_rfc3339(&start_time).map_err(invalid)?,
            end_time: end_time
                .map(|value| from_rfc3339(&value))
                .transpose()
                .map_err(invalid)?,
            status,
            notes,
            data_files,
            solution,
            closure_request,
            created_at: from_rfc3339(&created_at).map_err(invalid)?,
            updated_at: from_rfc3339(&updated_at).map_err(invalid)?,
        })
    }

    fn load_user(&self, id: &str) -> Result<User, SessionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name, role, created_at, updated_at FROM users WHERE id = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([id]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Err(SessionError::InvalidInput {
                message: format!("session references unknown user {id}"),
            });
        };
        let id: String = row.get(0).map_err(invalid)?;
        let email: String = row.get(1).map_err(invalid)?;
        let name: String = row.get(2).map_err(invalid)?;
        let role: String = row.get(3).map_err(invalid)?;
        let created_at: String = row.get(4).map_err(invalid)?;
        let updated_at: String = row.get(5).map_err(invalid)?;
        let role: UserRole = decode_enum(&role).map_err(invalid)?;
        Ok(User {
            id: UserId::new(id).map_err(invalid)?,
            email,
            name,
            role,
            created_at: from_rfc3339(&created_at).map_err(invalid)?,
            updated_at: from_rfc3339(&updated_at).map_err(invalid)?,
        })
    }

    fn load_data_files(&self, session_id: &SessionId) -> Result<Vec<SessionDataFile>, SessionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, session_id, file_name, file_size, uploaded_at, uploaded_by, data_format, record_count FROM session_data_files WHERE session_id = ?1 ORDER BY uploaded_at ASC, id ASC")
            .map_err(invalid)?;
        let mut rows = stmt.query([session_id.as_str()]).map_err(invalid)?;
        let mut files = Vec::new();
        while let Some(row) = rows.next().map_err(invalid)? {
            let id: String = row.get(0).map_err(invalid)?;
            let session_id: String = row.get(1).map_err(invalid)?;
            let file_name: String = row.get(2).map_err(invalid)?;
            let file_size: i64 = row.get(3).map_err(invalid)?;
            let uploaded_at: String = row.get(4).map_err(invalid)?;
            let uploaded_by: String = row.get(5).map_err(invalid)?;
            let data_format: String = row.get(6).map_err(invalid)?;
            let record_count: Option<i64> = row.get(7).map_err(invalid)?;
            let data_format: DataFormat = decode_enum(&data_format).map_err(invalid)?;
            files.push(SessionDataFile {
                id: DataFileId::new(id).map_err(invalid)?,
                session_id: SessionId::new(session_id).map_err(invalid)?,
                file_name,
                file_size: column_to_size(file_size).map_err(invalid)?,
                uploaded_at: from_rfc3339(&uploaded_at).map_err(invalid)?,
                uploaded_by: self.load_user(&uploaded_by)?,
                data_format,
                record_count: record_count
                    .map(column_to_size)
                    .transpose()
                    .map_err(invalid)?,
            });
        }
        Ok(files)
    }

    fn load_solution(&self, session_id: &SessionId) -> Result<Option<SessionSolution>, SessionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, session_id, description, steps_performed, recommendations, submitted_by, submitted_at, reviewed_by, reviewed_at, approved FROM session_solutions WHERE session_id = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([session_id.as_str()]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        let id: String = row.get(0).map_err(invalid)?;
        let session_id: String = row.get(1).map_err(invalid)?;
        let description: String = row.get(2).map_err(invalid)?;
        let steps_performed: String = row.get(3).map_err(invalid)?;
        let recommendations: Option<String> = row.get(4).map_err(invalid)?;
        let submitted_by: String = row.get(5).map_err(invalid)?;
        let submitted_at: String = row.get(6).map_err(invalid)?;
        let reviewed_by: Option<String> = row.get(7).map_err(invalid)?;
        let reviewed_at: Option<String> = row.get(8).map_err(invalid)?;
        let approved: bool = row.get(9).map_err(invalid)?;

        Ok(Some(SessionSolution {
            id: SolutionId::new(id).map_err(invalid)?,
            session_id: SessionId::new(session_id).map_err(invalid)?,
            description,
            steps_performed: decode_json(&steps_performed).map_err(invalid)?,
            recommendations,
            submitted_by: self.load_user(&submitted_by)?,
            submitted_at: from_rfc3339(&submitted_at).map_err(invalid)?,
            reviewed_by: reviewed_by
                .map(|value| self.load_user(&value))
                .transpose()?,
            reviewed_at: reviewed_at
                .map(|value| from_rfc3339(&value))
                .transpose()
                .map_err(invalid)?,
            approved,
        }))
    }

    fn load_closure_request(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionClosureRequest>, SessionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, session_id, requested_by, requested_at, reason, solution_id, approved, reviewed_by, reviewed_at, comments FROM session_closure_requests WHERE session_id = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([session_id.as_str()]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        let id: String = row.get(0).map_err(invalid)?;
        let session_id: String = row.get(1).map_err(invalid)?;
        let requested_by: String = row.get(2).map_err(invalid)?;
        let requested_at: String = row.get(3).map_err(invalid)?;
        let reason: String = row.get(4).map_err(invalid)?;
        let solution_id: String = row.get(5).map_err(invalid)?;
        let approved: bool = row.get(6).map_err(invalid)?;
        let reviewed_by: Option<String> = row.get(7).map_err(invalid)?;
        let reviewed_at: Option<String> = row.get(8).map_err(invalid)?;
        let comments: Option<String> = row.get(9).map_err(invalid)?;

        Ok(Some(SessionClosureRequest {
            id: ClosureRequestId::new(id).map_err(invalid)?,
            session_id: SessionId::new(session_id).map_err(invalid)?,
            requested_by: self.load_user(&requested_by)?,
            requested_at: from_rfc3339(&requested_at).map_err(invalid)?,
            reason,
            solution_id: SolutionId::new(solution_id).map_err(invalid)?,
            approved,
            reviewed_by: reviewed_by
                .map(|value| self.load_user(&value))
                .transpose()?,
            reviewed_at: reviewed_at
                .map(|value| from_rfc3339(&value))
                .transpose()
                .map_err(invalid)?,
            comments,
        }))
    }
}
