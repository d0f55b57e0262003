//! Role-scoped visibility rules for print jobs, enforced at the endpoint
//! level regardless of any store-side authorization.

use crate::types::{PrintJob, Role};

/// Staff see only their own jobs; front-office and admin see all.
pub fn can_view_job(role: Role, caller_id: &str, job: &PrintJob) -> bool {
    match role {
        Role::FrontOffice | Role::Admin => true,
        Role::Staff => job.requester_id == caller_id,
        Role::Unassigned => false,
    }
}

/// Download follows visibility.
pub fn can_download_job(role: Role, caller_id: &str, job: &PrintJob) -> bool {
    can_view_job(role, caller_id, job)
}

/// Only front-office and admin may move a pending job to a terminal status.
pub fn can_transition_jobs(role: Role) -> bool {
    matches!(role, Role::FrontOffice | Role::Admin)
}

/// Deletion is requester-only, for every role. Front-office and admin see
/// all jobs but still may not delete someone else's.
pub fn can_delete_job(caller_id: &str, job: &PrintJob) -> bool {
    job.requester_id == caller_id
}

/// The requester-role listing filter is an admin-view feature.
pub fn can_filter_by_role(role: Role) -> bool {
    matches!(role, Role::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    fn job_of(requester: &str) -> PrintJob {
        PrintJob {
            job_id: "j1".to_string(),
            requester_id: requester.to_string(),
            file_path: "u1/1-a.pdf".to_string(),
            original_filename: "a.pdf".to_string(),
            copy_count: 1,
            is_color: false,
            notes: String::new(),
            status: JobStatus::Pending,
            handler_id: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn staff_see_only_their_own_jobs() {
        let job = job_of("u1");
        assert!(can_view_job(Role::Staff, "u1", &job));
        assert!(!can_view_job(Role::Staff, "u2", &job));
    }

    #[test]
    fn front_office_and_admin_see_all_jobs() {
        let job = job_of("u1");
        assert!(can_view_job(Role::FrontOffice, "fo1", &job));
        assert!(can_view_job(Role::Admin, "a1", &job));
    }

    #[test]
    fn unassigned_sees_nothing() {
        let job = job_of("u1");
        assert!(!can_view_job(Role::Unassigned, "u1", &job));
    }

    #[test]
    fn only_front_office_and_admin_transition() {
        assert!(can_transition_jobs(Role::FrontOffice));
        assert!(can_transition_jobs(Role::Admin));
        assert!(!can_transition_jobs(Role::Staff));
        assert!(!can_transition_jobs(Role::Unassigned));
    }

    #[test]
    fn deletion_is_requester_only_for_every_role() {
        let job = job_of("u1");
        assert!(can_delete_job("u1", &job));
        // Non-owner staff, front-office and admin identities are all rejected
        assert!(!can_delete_job("u2", &job));
        assert!(!can_delete_job("fo1", &job));
        assert!(!can_delete_job("a1", &job));
    }

    #[test]
    fn role_filter_is_admin_only() {
        assert!(can_filter_by_role(Role::Admin));
        assert!(!can_filter_by_role(Role::FrontOffice));
        assert!(!can_filter_by_role(Role::Staff));
    }
}
