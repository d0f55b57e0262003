use serde::{Deserialize, Serialize};

use crate::error::PortalError;

// ========== ROLE ==========

/// Closed role set. Wire strings match the profile rows
/// ("scc-admin", "staff", "front-office", "unassigned").
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[serde(rename = "scc-admin")]
    Admin,
    Staff,
    FrontOffice,
    Unassigned,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "scc-admin",
            Role::Staff => "staff",
            Role::FrontOffice => "front-office",
            Role::Unassigned => "unassigned",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "scc-admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "front-office" => Some(Role::FrontOffice),
            "unassigned" => Some(Role::Unassigned),
            _ => None,
        }
    }

    /// Roles an admin may grant. `unassigned` is a state, not a grant.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Role::Unassigned)
    }

    /// Dashboard the frontend should land a freshly logged-in user on.
    pub fn dashboard_path(&self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("/admin/dashboard"),
            Role::Staff => Some("/staff/dashboard"),
            Role::FrontOffice => Some("/office/dashboard"),
            Role::Unassigned => None,
        }
    }
}

// ========== JOB STATUS ==========

/// Print job lifecycle. Pending is initial; completed and cancelled are
/// terminal, reached only from pending.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "completed" => Some(JobStatus::Completed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (JobStatus::Pending, JobStatus::Completed)
                | (JobStatus::Pending, JobStatus::Cancelled)
        )
    }
}

// ========== PROFILE ==========

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated identity+profile pair the guard hands to route handlers.
#[derive(Debug, Serialize, Clone)]
pub struct Caller {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

// ========== PRINT JOB ==========

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PrintJob {
    pub job_id: String,
    pub requester_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub copy_count: u32,
    pub is_color: bool,
    pub notes: String,
    pub status: JobStatus,
    pub handler_id: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl PrintJob {
    /// Single mutation point for the status machine. Handler and
    /// completed_at are stamped together on both terminal targets.
    pub fn apply_transition(
        &mut self,
        target: JobStatus,
        handler_id: &str,
        now: &str,
    ) -> Result<(), PortalError> {
        if !target.is_terminal() {
            return Err(PortalError::Validation(
                "Target status must be completed or cancelled".to_string(),
            ));
        }
        if !self.status.can_transition_to(target) {
            return Err(PortalError::NotFound(
                "No pending print job with that id".to_string(),
            ));
        }
        self.status = target;
        self.handler_id = Some(handler_id.to_string());
        self.completed_at = Some(now.to_string());
        Ok(())
    }
}

/// Listing row: the job joined with requester/handler display data and a
/// per-row download link (absent when presigning failed).
#[derive(Debug, Serialize, Clone)]
pub struct JobView {
    #[serde(flatten)]
    pub job: PrintJob,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_role: Role,
    pub handler_name: Option<String>,
    pub download_url: Option<String>,
}

// ========== REQUEST / RESPONSE BODIES ==========

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
    pub user: Caller,
    pub redirect: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_data: String, // base64 encoded
    pub copy_count: u32,
    pub is_color: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    #[serde(rename = "newStatus")]
    pub new_status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobStats {
    pub pending: i32,
    pub completed: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRoleRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "newRole", alias = "role")]
    pub new_role: Role,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateJobRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "newStatus")]
    pub new_status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> PrintJob {
        PrintJob {
            job_id: "j1".to_string(),
            requester_id: "u1".to_string(),
            file_path: "u1/42-report.pdf".to_string(),
            original_filename: "report.pdf".to_string(),
            copy_count: 3,
            is_color: false,
            notes: "staple top-left".to_string(),
            status: JobStatus::Pending,
            handler_id: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn role_wire_strings_round_trip() {
        for role in [Role::Admin, Role::Staff, Role::FrontOffice, Role::Unassigned] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn assignable_set_excludes_unassigned() {
        assert!(Role::Admin.is_assignable());
        assert!(Role::Staff.is_assignable());
        assert!(Role::FrontOffice.is_assignable());
        assert!(!Role::Unassigned.is_assignable());
    }

    #[test]
    fn dashboard_paths_per_role() {
        assert_eq!(Role::Admin.dashboard_path(), Some("/admin/dashboard"));
        assert_eq!(Role::Staff.dashboard_path(), Some("/staff/dashboard"));
        assert_eq!(Role::FrontOffice.dashboard_path(), Some("/office/dashboard"));
        assert_eq!(Role::Unassigned.dashboard_path(), None);
    }

    #[test]
    fn unknown_role_fails_deserialization() {
        let err = serde_json::from_str::<Role>("\"superuser\"");
        assert!(err.is_err());
    }

    #[test]
    fn only_pending_transitions_and_only_to_terminal() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn transition_stamps_handler_and_completed_at_together() {
        let mut job = pending_job();
        job.apply_transition(JobStatus::Completed, "fo1", "2026-01-02T00:00:00Z")
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.handler_id.as_deref(), Some("fo1"));
        assert_eq!(job.completed_at.as_deref(), Some("2026-01-02T00:00:00Z"));
    }

    #[test]
    fn cancellation_also_stamps_handler_and_completed_at() {
        let mut job = pending_job();
        job.apply_transition(JobStatus::Cancelled, "fo1", "2026-01-02T00:00:00Z")
            .unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.handler_id.as_deref(), Some("fo1"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn second_transition_fails_with_not_found() {
        let mut job = pending_job();
        job.apply_transition(JobStatus::Completed, "fo1", "2026-01-02T00:00:00Z")
            .unwrap();
        let err = job
            .apply_transition(JobStatus::Cancelled, "fo2", "2026-01-03T00:00:00Z")
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
        // First handler untouched by the rejected attempt
        assert_eq!(job.handler_id.as_deref(), Some("fo1"));
    }

    #[test]
    fn pending_is_not_a_valid_transition_target() {
        let mut job = pending_job();
        let err = job
            .apply_transition(JobStatus::Pending, "fo1", "2026-01-02T00:00:00Z")
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.handler_id.is_none());
    }
}
