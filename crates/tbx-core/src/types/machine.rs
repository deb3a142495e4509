use crate::types::enums::MachineStatus;
use crate::types::ids::MachineId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub location: String,
    pub kind: String,
    pub serial_number: String,
    pub status: MachineStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
