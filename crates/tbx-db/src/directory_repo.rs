use crate::util::{decode_enum, encode_enum, from_rfc3339, to_rfc3339};
use rusqlite::Connection;
use tbx_core::directory::{MachineRepository, UserRepository};
use tbx_core::error::DirectoryError;
use tbx_core::types::enums::{MachineStatus, UserRole};
use tbx_core::types::ids::{MachineId, UserId};
use tbx_core::types::io::MachineFilter;
use tbx_core::types::machine::Machine;
use tbx_core::types::user::User;

pub struct UserRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> UserRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn invalid(err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::InvalidInput {
        message: err.to_string(),
    }
}

impl<'a> UserRepository for UserRepo<'a> {
    fn insert(&self, user: &User) -> Result<(), DirectoryError> {
        let sql = "INSERT INTO users (id, email, name, role, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            user.id.as_str(),
            user.email.as_str(),
            user.name.as_str(),
            encode_enum(&user.role).map_err(invalid)?,
            to_rfc3339(&user.created_at),
            to_rfc3339(&user.updated_at),
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        Ok(())
    }

    fn get(&self, id: &UserId) -> Result<Option<User>, DirectoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name, role, created_at, updated_at FROM users WHERE id = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([id.as_str()]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        map_user_row(row).map(Some)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name, role, created_at, updated_at FROM users WHERE email = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([email]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        map_user_row(row).map(Some)
    }

    fn list(&self) -> Result<Vec<User>, DirectoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name, role, created_at, updated_at FROM users ORDER BY name ASC")
            .map_err(invalid)?;
        let mut rows = stmt.query([]).map_err(invalid)?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().map_err(invalid)? {
            users.push(map_user_row(row)?);
        }
        Ok(users)
    }
}

fn map_user_row(row: &rusqlite::Row<'_>) -> Result<User, DirectoryError> {
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

pub struct MachineRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> MachineRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> MachineRepository for MachineRepo<'a> {
    fn insert(&self, machine: &Machine) -> Result<(), DirectoryError> {
        let sql = "INSERT INTO machines (id, name, location, kind, serial_number, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
        let params = (
            machine.id.as_str(),
            machine.name.as_str(),
            machine.location.as_str(),
            machine.kind.as_str(),
            machine.serial_number.as_str(),
            encode_enum(&machine.status).map_err(invalid)?,
            to_rfc3339(&machine.created_at),
            to_rfc3339(&machine.updated_at),
        );
        self.conn.execute(sql, params).map_err(invalid)?;
        Ok(())
    }

    fn get(&self, id: &MachineId) -> Result<Option<Machine>, DirectoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, location, kind, serial_number, status, created_at, updated_at FROM machines WHERE id = ?1")
            .map_err(invalid)?;
        let mut rows = stmt.query([id.as_str()]).map_err(invalid)?;
        let Some(row) = rows.next().map_err(invalid)? else {
            return Ok(None);
        };
        map_machine_row(row).map(Some)
    }

    fn list(&self, filter: &MachineFilter) -> Result<Vec<Machine>, DirectoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, location, kind, serial_number, status, created_at, updated_at FROM machines ORDER BY name ASC")
            .map_err(invalid)?;
        let mut rows = stmt.query([]).map_err(invalid)?;
        let mut machines = Vec::new();
        while let Some(row) = rows.next().map_err(invalid)? {
            machines.push(map_machine_row(row)?);
        }
        machines.retain(|machine| filter.matches(machine));
        Ok(machines)
    }
}

fn map_machine_row(row: &rusqlite::Row<'_>) -> Result<Machine, DirectoryError> {
    let id: String = row.get(0).map_err(invalid)?;
    let name: String = row.get(1).map_err(invalid)?;
    let location: String = row.get(2).map_err(invalid)?;
    let kind: String = row.get(3).map_err(invalid)?;
    let serial_number: String = row.get(4).map_err(invalid)?;
    let status: String = row.get(5).map_err(invalid)?;
    let created_at: String = row.get(6).map_err(invalid)?;
    let updated_at: String = row.get(7).map_err(invalid)?;

    let status: MachineStatus = decode_enum(&status).map_err(invalid)?;
    Ok(Machine {
        id: MachineId::new(id).map_err(invalid)?,
        name,
        location,
        kind,
        serial_number,
        status,
        created_at: from_rfc3339(&created_at).map_err(invalid)?,
        updated_at: from_rfc3339(&updated_at).map_err(invalid)?,
    })
}
