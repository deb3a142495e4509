use crate::types::enums::UserRole;
use serde::{Deserialize, Serialize};

/// Action identifiers gating every operation. The allow-lists below are the
/// whole access-control model: no wildcards, no role inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewMachines,
    CreateMachines,
    EditMachines,
    DeleteMachines,
    CreateSessions,
    AssignSessions,
    StartSessions,
    ViewAssignedSessions,
    ViewAllSessions,
    ViewArchivedSessions,
    EditSessions,
    DeleteSessions,
    CloseSessions,
    UploadSessionData,
    SubmitSolution,
    RequestSessionClosure,
    ReviewSolutions,
    ApproveClosureRequests,
    ViewSessionSolutions,
    ViewOwnData,
    ViewAllData,
    ViewAnalytics,
    ManageUsers,
    ManageSensors,
    ExportBasicData,
    ExportAllData,
    ViewKnowledgeBase,
    EditKnowledgeBase,
    ManageAlerts,
    ViewSystemLogs,
}

const TECHNICIAN_ACTIONS: &[Action] = &[
    Action::ViewMachines,
    Action::ViewAssignedSessions,
    // Technicians reach the session listings too; results are ownership
    // filtered to sessions assigned to them.
    Action::ViewAllSessions,
    Action::StartSessions,
    Action::UploadSessionData,
    Action::SubmitSolution,
    Action::RequestSessionClosure,
    Action::ViewArchivedSessions,
    Action::ViewSessionSolutions,
    Action::ViewOwnData,
    Action::ExportBasicData,
];

const MANAGER_ACTIONS: &[Action] = &[
    Action::ViewMachines,
    Action::CreateMachines,
    Action::EditMachines,
    Action::DeleteMachines,
    Action::CreateSessions,
    Action::AssignSessions,
    Action::ViewAllSessions,
    Action::ViewArchivedSessions,
    Action::EditSessions,
    Action::DeleteSessions,
    Action::CloseSessions,
    Action::ReviewSolutions,
    Action::ApproveClosureRequests,
    Action::ViewSessionSolutions,
    Action::ViewAllData,
    Action::ViewAnalytics,
    Action::ManageUsers,
    Action::ManageSensors,
    Action::ExportAllData,
    Action::ViewKnowledgeBase,
    Action::EditKnowledgeBase,
    Action::ManageAlerts,
    Action::ViewSystemLogs,
];

pub fn allowed_actions(role: UserRole) -> &'static [Action] {
    match role {
        UserRole::Technician => TECHNICIAN_ACTIONS,
        UserRole::MaintenanceManager => MANAGER_ACTIONS,
    }
}

/// Pure allow-list lookup. Checked at every mutation boundary, not only when
/// deciding what a caller gets to see.
pub fn has_permission(role: UserRole, action: Action) -> bool {
    allowed_actions(role).contains(&action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_pure() {
        for _ in 0..3 {
            assert!(has_permission(
                UserRole::MaintenanceManager,
                Action::ReviewSolutions
            ));
            assert!(!has_permission(UserRole::Technician, Action::ReviewSolutions));
        }
    }

    #[test]
    fn technician_cannot_mutate_as_manager() {
        for action in [
            Action::CreateSessions,
            Action::EditSessions,
            Action::DeleteSessions,
            Action::CloseSessions,
            Action::ReviewSolutions,
            Action::ApproveClosureRequests,
            Action::AssignSessions,
        ] {
            assert!(!has_permission(UserRole::Technician, action));
        }
    }

    #[test]
    fn manager_does_not_inherit_technician_submission_actions() {
        for action in [
            Action::StartSessions,
            Action::UploadSessionData,
            Action::SubmitSolution,
            Action::RequestSessionClosure,
        ] {
            assert!(!has_permission(UserRole::MaintenanceManager, action));
        }
    }

    #[test]
    fn both_roles_share_view_actions() {
        for role in [UserRole::Technician, UserRole::MaintenanceManager] {
            assert!(has_permission(role, Action::ViewMachines));
            assert!(has_permission(role, Action::ViewAllSessions));
        }
    }
}
