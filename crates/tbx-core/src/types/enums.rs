use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Technician,
    MaintenanceManager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Operational,
    Maintenance,
    Failure,
    Offline,
}

/// Lifecycle of a test session. `Created` is part of the vocabulary but
/// sessions are born directly into `Assigned` (or `InProgress` with the
/// auto-start flag). `Completed`, `Cancelled` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Assigned,
    InProgress,
    DataUploaded,
    AnalysisComplete,
    SolutionSubmitted,
    Completed,
    Cancelled,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Camera,
    Vibration,
    GasDetector,
    Multimeter,
    Pressure,
    Humidity,
    Current,
    Voltage,
    SpeedRpm,
    Proximity,
    LoadCell,
    Microphone,
    IrTemperature,
    Light,
    Ph,
    MagneticField,
    WaterLeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Json,
    Csv,
    Xlsx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Cli,
    System,
}

/// Every state-changing operation on a session. The transition table in
/// `validation` and the permission guard are both keyed by this enum, so a
/// new operation cannot be added without deciding its precondition and its
/// required action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    Start,
    UploadData,
    MarkAnalysisComplete,
    SubmitSolution,
    ApproveSolution,
    RequestClosure,
    ApproveClosure,
    Stop,
    Cancel,
    MarkError,
    Reassign,
    Delete,
}
