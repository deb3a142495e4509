use crate::error::DirectoryError;
use crate::types::ids::{MachineId, UserId};
use crate::types::io::MachineFilter;
use crate::types::machine::Machine;
use crate::types::user::User;

/// Read-mostly user directory. `insert` exists for seeding only; the session
/// core never mutates users.
pub trait UserRepository {
    fn insert(&self, user: &User) -> Result<(), DirectoryError>;
    fn get(&self, id: &UserId) -> Result<Option<User>, DirectoryError>;
    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    fn list(&self) -> Result<Vec<User>, DirectoryError>;
}

/// Read-mostly machine directory; sessions reference machines and never
/// change them.
pub trait MachineRepository {
    fn insert(&self, machine: &Machine) -> Result<(), DirectoryError>;
    fn get(&self, id: &MachineId) -> Result<Option<Machine>, DirectoryError>;
    fn list(&self, filter: &MachineFilter) -> Result<Vec<Machine>, DirectoryError>;
}
