pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod machine;
pub mod session;
pub mod user;

pub use enums::{
    DataFormat, EventSource, MachineStatus, SensorType, SessionOperation, SessionStatus, UserRole,
};
pub use event::{EventBody, EventRecord};
pub use ids::{ClosureRequestId, DataFileId, IdError, MachineId, SessionId, SolutionId, UserId};
pub use io::{
    ApproveClosureInput, CreateSessionInput, MachineFilter, RequestClosureInput, SessionFilter,
    SubmitSolutionInput, UploadDataFileInput,
};
pub use machine::Machine;
pub use session::{
    SensorModule, SessionClosureRequest, SessionDataFile, SessionSolution, TestSession,
};
pub use user::User;
