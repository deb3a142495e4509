use crate::types::enums::UserRole;
use crate::types::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_manager(&self) -> bool {
        self.role == UserRole::MaintenanceManager
    }

    pub fn is_technician(&self) -> bool {
        self.role == UserRole::Technician
    }
}
