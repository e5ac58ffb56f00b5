use teleclaude_core::HumanRole;

use crate::types::ToolOperation;

/// The exclusion set for a role — operations the tool server refuses for
/// callers at that `human_role` (spec §4.6).
pub fn excluded_operations(role: HumanRole) -> &'static [ToolOperation] {
    use ToolOperation::*;
    match role {
        HumanRole::Admin => &[],
        HumanRole::Member => &[Deploy],
        HumanRole::Contributor => &[Deploy, EndSession, StopNotifications],
        HumanRole::Newcomer => &[Deploy, EndSession, StopNotifications, StartSession],
        HumanRole::Unauthorized => &[
            Deploy,
            EndSession,
            StopNotifications,
            StartSession,
            SendFile,
            GetSessionData,
        ],
        // Strictest tier: only the help-desk relevant surface plus escalate.
        // Escalate is excluded for every other role below.
        HumanRole::Customer => &[
            ListComputers,
            ListProjects,
            ListSessions,
            StartSession,
            SendFile,
            GetSessionData,
            EndSession,
            StopNotifications,
            Deploy,
        ],
    }
}

/// `escalate` is visible only to customer sessions (spec §4.6).
pub fn is_permitted(role: HumanRole, operation: ToolOperation) -> bool {
    if operation == ToolOperation::Escalate {
        return role == HumanRole::Customer;
    }
    !excluded_operations(role).contains(&operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_full_access_except_escalate() {
        for op in ToolOperation::ALL {
            if op == ToolOperation::Escalate {
                assert!(!is_permitted(HumanRole::Admin, op));
            } else {
                assert!(is_permitted(HumanRole::Admin, op));
            }
        }
    }

    #[test]
    fn customer_sees_only_help_desk_surface_plus_escalate() {
        assert!(is_permitted(HumanRole::Customer, ToolOperation::Escalate));
        assert!(is_permitted(HumanRole::Customer, ToolOperation::SendMessage));
        assert!(!is_permitted(HumanRole::Customer, ToolOperation::ListComputers));
        assert!(!is_permitted(HumanRole::Customer, ToolOperation::Deploy));
    }

    #[test]
    fn unauthorized_is_stricter_than_member() {
        assert!(!is_permitted(HumanRole::Unauthorized, ToolOperation::StartSession));
        assert!(is_permitted(HumanRole::Member, ToolOperation::StartSession));
    }
}
