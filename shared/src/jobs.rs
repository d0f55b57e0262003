use aws_sdk_dynamodb::types::{AttributeValue, Select};
use base64::{engine::general_purpose, Engine as _};
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

use crate::error::PortalError;
use crate::http;
use crate::policy;
use crate::profiles;
use crate::storage;
use crate::types::{
    Caller, JobStats, JobStatus, JobView, PrintJob, Role, SubmitJobRequest, TransitionRequest,
};
use crate::AppState;

/// Static partition: all jobs live under PK = "JOB" so the queue listing is
/// a query, not a scan.
pub const JOB_PK: &str = "JOB";

pub fn job_sk(job_id: &str) -> String {
    format!("JOB#{}", job_id)
}

pub fn job_from_item(item: &HashMap<String, AttributeValue>) -> Option<PrintJob> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let job_id = sk.strip_prefix("JOB#")?.to_string();
    let status = item
        .get("status")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| JobStatus::parse(s))?;
    Some(PrintJob {
        job_id,
        requester_id: item
            .get("requester_id")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        file_path: item
            .get("file_path")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        original_filename: item
            .get("original_filename")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        copy_count: item
            .get("copy_count")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .unwrap_or(1),
        is_color: item
            .get("is_color")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        notes: item
            .get("notes")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        status,
        handler_id: item
            .get("handler_id")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        completed_at: item
            .get("completed_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
    })
}

fn validate_submit(req: &SubmitJobRequest, notes_max_len: usize) -> Result<(), PortalError> {
    if req.file_name.trim().is_empty() {
        return Err(PortalError::Validation(
            "A file name is required".to_string(),
        ));
    }
    if req.file_data.is_empty() {
        return Err(PortalError::Validation(
            "Please select a file to upload".to_string(),
        ));
    }
    if req.copy_count < 1 {
        return Err(PortalError::Validation(
            "Copy count must be at least 1".to_string(),
        ));
    }
    if req.notes.chars().count() > notes_max_len {
        return Err(PortalError::Validation(format!(
            "Notes must be at most {} characters",
            notes_max_len
        )));
    }
    Ok(())
}

/// Submit a new print job: upload the file, then insert the pending row.
/// If the insert fails after a successful upload, a compensating object
/// delete is attempted (best effort, logged).
pub async fn submit(
    state: &AppState,
    caller: &Caller,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let req: SubmitJobRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    if let Err(e) = validate_submit(&req, state.config.notes_max_len) {
        return http::error_response(&e);
    }

    let file_bytes = match general_purpose::STANDARD.decode(&req.file_data) {
        Ok(bytes) => bytes,
        Err(e) => {
            return http::error_response(&PortalError::Validation(format!(
                "File data is not valid base64: {}",
                e
            )))
        }
    };

    let now = chrono::Utc::now();
    let key = storage::object_key(&caller.user_id, &req.file_name, now.timestamp_millis());

    tracing::info!(
        "Submitting print job for {} ({} bytes as {})",
        caller.user_id,
        file_bytes.len(),
        key
    );

    if let Err(e) = storage::upload_object(
        &state.s3_client,
        &state.config.files_bucket,
        &key,
        file_bytes,
        req.content_type.as_deref(),
    )
    .await
    {
        return http::error_response(&e);
    }

    let job = PrintJob {
        job_id: uuid::Uuid::new_v4().to_string(),
        requester_id: caller.user_id.clone(),
        file_path: key.clone(),
        original_filename: req.file_name.clone(),
        copy_count: req.copy_count,
        is_color: req.is_color,
        notes: req.notes.clone(),
        status: JobStatus::Pending,
        handler_id: None,
        created_at: now.to_rfc3339(),
        completed_at: None,
    };

    let insert = state
        .dynamo_client
        .put_item()
        .table_name(&state.config.table_name)
        .item("PK", AttributeValue::S(JOB_PK.to_string()))
        .item("SK", AttributeValue::S(job_sk(&job.job_id)))
        .item("requester_id", AttributeValue::S(job.requester_id.clone()))
        .item("file_path", AttributeValue::S(job.file_path.clone()))
        .item(
            "original_filename",
            AttributeValue::S(job.original_filename.clone()),
        )
        .item("copy_count", AttributeValue::N(job.copy_count.to_string()))
        .item("is_color", AttributeValue::Bool(job.is_color))
        .item("notes", AttributeValue::S(job.notes.clone()))
        .item(
            "status",
            AttributeValue::S(job.status.as_str().to_string()),
        )
        .item("created_at", AttributeValue::S(job.created_at.clone()))
        .send()
        .await;

    if let Err(e) = insert {
        tracing::error!("Failed to insert print job row: {:?}", e);
        // Compensate for the orphaned upload; a leftover object is logged,
        // not surfaced.
        if let Err(cleanup) =
            storage::delete_object(&state.s3_client, &state.config.files_bucket, &key).await
        {
            tracing::error!("Compensating delete of {} failed: {}", key, cleanup);
        }
        return http::error_response(&PortalError::Persistence(
            "Failed to create print job".to_string(),
        ));
    }

    tracing::info!("Print job {} created for {}", job.job_id, caller.user_id);
    http::json_response(StatusCode::CREATED, &job)
}

fn matches_query(view: &JobView, q: &str) -> bool {
    let q = q.to_lowercase();
    view.requester_name.to_lowercase().contains(&q)
        || view.requester_email.to_lowercase().contains(&q)
}

/// List jobs visible to the caller, joined with requester/handler names and
/// per-row download links, newest first.
pub async fn list(
    state: &AppState,
    caller: &Caller,
    q: Option<&str>,
    role_filter: Option<&str>,
) -> Result<Response<Body>, Error> {
    let role_filter = match role_filter {
        Some(r) => {
            if !policy::can_filter_by_role(caller.role) {
                return http::error_response(&PortalError::Authorization(
                    "Role filtering is an admin feature".to_string(),
                ));
            }
            match Role::parse(r) {
                Some(role) => Some(role),
                None => {
                    return http::error_response(&PortalError::Validation(format!(
                        "Unknown role filter: {}",
                        r
                    )))
                }
            }
        }
        None => None,
    };

    let result = state
        .dynamo_client
        .query()
        .table_name(&state.config.table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(JOB_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("JOB#".to_string()))
        .send()
        .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to list print jobs: {:?}", e);
            return http::error_response(&PortalError::Persistence(
                "Failed to fetch print jobs".to_string(),
            ));
        }
    };

    let jobs: Vec<PrintJob> = result
        .items()
        .iter()
        .filter_map(job_from_item)
        .filter(|job| policy::can_view_job(caller.role, &caller.user_id, job))
        .collect();

    // Join requester and handler display names in one batch
    let mut ids: Vec<String> = jobs.iter().map(|j| j.requester_id.clone()).collect();
    ids.extend(jobs.iter().filter_map(|j| j.handler_id.clone()));
    ids.sort();
    ids.dedup();
    let profile_map =
        match profiles::batch_get_profiles(&state.dynamo_client, &state.config.table_name, &ids)
            .await
        {
            Ok(m) => m,
            Err(e) => return http::error_response(&e),
        };

    let mut views = Vec::with_capacity(jobs.len());
    for job in jobs {
        let requester = profile_map.get(&job.requester_id);
        let handler_name = job
            .handler_id
            .as_ref()
            .and_then(|id| profile_map.get(id))
            .map(|p| p.full_name.clone());
        let download_url = if policy::can_download_job(caller.role, &caller.user_id, &job) {
            storage::signed_download_url(
                &state.s3_client,
                &state.config.files_bucket,
                &job.file_path,
                state.config.signed_url_ttl_secs,
            )
            .await
        } else {
            None
        };

        views.push(JobView {
            requester_name: requester.map(|p| p.full_name.clone()).unwrap_or_default(),
            requester_email: requester.map(|p| p.email.clone()).unwrap_or_default(),
            requester_role: requester.map(|p| p.role).unwrap_or(Role::Unassigned),
            handler_name,
            download_url,
            job,
        });
    }

    if let Some(q) = q {
        if !q.is_empty() {
            views.retain(|v| matches_query(v, q));
        }
    }
    if let Some(role) = role_filter {
        views.retain(|v| v.requester_role == role);
    }

    views.sort_by(|a, b| b.job.created_at.cmp(&a.job.created_at));
    http::json_response(StatusCode::OK, &views)
}

/// Move a pending job to a terminal status. The legality check is
/// `PrintJob::apply_transition`, which stamps the handler and the completion
/// timestamp together; the write is additionally conditioned on the row
/// still being pending, so a lost race or a repeat invocation comes back
/// NotFound.
pub async fn transition(
    state: &AppState,
    handler_id: &str,
    job_id: &str,
    target: JobStatus,
) -> Result<(), PortalError> {
    let result = state
        .dynamo_client
        .get_item()
        .table_name(&state.config.table_name)
        .key("PK", AttributeValue::S(JOB_PK.to_string()))
        .key("SK", AttributeValue::S(job_sk(job_id)))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch job {}: {:?}", job_id, e);
            PortalError::Persistence("Failed to fetch print job".to_string())
        })?;

    let mut job = result.item().and_then(job_from_item).ok_or_else(|| {
        PortalError::NotFound("No pending print job with that id".to_string())
    })?;

    let now = chrono::Utc::now().to_rfc3339();
    job.apply_transition(target, handler_id, &now)?;

    // The condition guards the gap between the read and the write: if a
    // concurrent handler got there first, this resolves to NotFound rather
    // than a second silent completion.
    state
        .dynamo_client
        .update_item()
        .table_name(&state.config.table_name)
        .key("PK", AttributeValue::S(JOB_PK.to_string()))
        .key("SK", AttributeValue::S(job_sk(job_id)))
        .update_expression(
            "SET #status = :status, handler_id = :handler, completed_at = :now",
        )
        .condition_expression("attribute_exists(PK) AND #status = :pending")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(
            ":status",
            AttributeValue::S(job.status.as_str().to_string()),
        )
        .expression_attribute_values(":handler", AttributeValue::S(handler_id.to_string()))
        .expression_attribute_values(":now", AttributeValue::S(now))
        .expression_attribute_values(
            ":pending",
            AttributeValue::S(JobStatus::Pending.as_str().to_string()),
        )
        .send()
        .await
        .map_err(|e| {
            let msg = format!("{:?}", e);
            if msg.contains("ConditionalCheckFailed") {
                PortalError::NotFound("No pending print job with that id".to_string())
            } else {
                tracing::error!("Failed to update job {}: {}", job_id, msg);
                PortalError::Persistence("Failed to update print job".to_string())
            }
        })?;

    tracing::info!("Job {} moved to {} by {}", job_id, target.as_str(), handler_id);
    Ok(())
}

pub async fn update_status(
    state: &AppState,
    caller: &Caller,
    job_id: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    if !policy::can_transition_jobs(caller.role) {
        return http::error_response(&PortalError::Authorization(
            "Your role does not permit working the print queue".to_string(),
        ));
    }
    let req: TransitionRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    match transition(state, &caller.user_id, job_id, req.new_status).await {
        Ok(()) => http::json_response(
            StatusCode::OK,
            &serde_json::json!({"success": true, "message": "Job status updated"}),
        ),
        Err(e) => http::error_response(&e),
    }
}

/// Delete a job: stored object first, then the row. Requester-only.
pub async fn delete_job(
    state: &AppState,
    caller: &Caller,
    job_id: &str,
) -> Result<Response<Body>, Error> {
    let result = state
        .dynamo_client
        .get_item()
        .table_name(&state.config.table_name)
        .key("PK", AttributeValue::S(JOB_PK.to_string()))
        .key("SK", AttributeValue::S(job_sk(job_id)))
        .send()
        .await;

    let job = match result {
        Ok(r) => match r.item().and_then(job_from_item) {
            Some(job) => job,
            None => {
                return http::error_response(&PortalError::NotFound(
                    "Print job not found".to_string(),
                ))
            }
        },
        Err(e) => {
            tracing::error!("Failed to fetch job {}: {:?}", job_id, e);
            return http::error_response(&PortalError::Persistence(
                "Failed to fetch print job".to_string(),
            ));
        }
    };

    if !policy::can_delete_job(&caller.user_id, &job) {
        return http::error_response(&PortalError::Authorization(
            "Only the requester may delete a print job".to_string(),
        ));
    }

    let key = storage::normalize_object_path(&job.file_path, &state.config.files_bucket);
    if let Err(e) = storage::delete_object(&state.s3_client, &state.config.files_bucket, &key).await
    {
        tracing::error!("Storage half of job {} deletion failed: {}", job_id, e);
        return http::error_response(&PortalError::Deletion {
            storage_deleted: false,
            message: "Failed to delete the stored file; the job record was left in place"
                .to_string(),
        });
    }

    let row_delete = state
        .dynamo_client
        .delete_item()
        .table_name(&state.config.table_name)
        .key("PK", AttributeValue::S(JOB_PK.to_string()))
        .key("SK", AttributeValue::S(job_sk(job_id)))
        .send()
        .await;

    if let Err(e) = row_delete {
        tracing::error!("Row half of job {} deletion failed: {:?}", job_id, e);
        return http::error_response(&PortalError::Deletion {
            storage_deleted: true,
            message: "The stored file was deleted but the job record was not; retry the delete"
                .to_string(),
        });
    }

    tracing::info!("Job {} deleted by requester {}", job_id, caller.user_id);
    http::json_response(
        StatusCode::OK,
        &serde_json::json!({"success": true, "message": "Print job deleted"}),
    )
}

async fn count_own_jobs(
    state: &AppState,
    requester_id: &str,
    status: JobStatus,
) -> Result<i32, PortalError> {
    let result = state
        .dynamo_client
        .query()
        .table_name(&state.config.table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .filter_expression("requester_id = :requester AND #status = :status")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":pk", AttributeValue::S(JOB_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("JOB#".to_string()))
        .expression_attribute_values(":requester", AttributeValue::S(requester_id.to_string()))
        .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
        .select(Select::Count)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to count jobs for {}: {:?}", requester_id, e);
            PortalError::Persistence("Failed to fetch job stats".to_string())
        })?;
    Ok(result.count())
}

/// Pending/completed counters for the caller's own jobs (staff dashboard).
pub async fn stats(state: &AppState, caller: &Caller) -> Result<Response<Body>, Error> {
    let pending = match count_own_jobs(state, &caller.user_id, JobStatus::Pending).await {
        Ok(n) => n,
        Err(e) => return http::error_response(&e),
    };
    let completed = match count_own_jobs(state, &caller.user_id, JobStatus::Completed).await {
        Ok(n) => n,
        Err(e) => return http::error_response(&e),
    };
    http::json_response(StatusCode::OK, &JobStats { pending, completed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit_request() -> SubmitJobRequest {
        SubmitJobRequest {
            file_name: "report.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            file_data: "aGVsbG8=".to_string(),
            copy_count: 3,
            is_color: false,
            notes: "staple top-left".to_string(),
        }
    }

    #[test]
    fn staff_submission_scenario_validates() {
        // 3 copies, black and white, short note: accepted as-is
        assert!(validate_submit(&submit_request(), 25).is_ok());
    }

    #[test]
    fn zero_copies_rejected() {
        let mut req = submit_request();
        req.copy_count = 0;
        let err = validate_submit(&req, 25).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn notes_over_cap_rejected() {
        let mut req = submit_request();
        req.notes = "x".repeat(26);
        let err = validate_submit(&req, 25).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        req.notes = "x".repeat(25);
        assert!(validate_submit(&req, 25).is_ok());
    }

    #[test]
    fn missing_file_rejected() {
        let mut req = submit_request();
        req.file_data = String::new();
        assert!(validate_submit(&req, 25).is_err());
        let mut req = submit_request();
        req.file_name = "  ".to_string();
        assert!(validate_submit(&req, 25).is_err());
    }

    fn view(name: &str, email: &str, role: Role) -> JobView {
        JobView {
            job: PrintJob {
                job_id: "j1".to_string(),
                requester_id: "u1".to_string(),
                file_path: "u1/1-a.pdf".to_string(),
                original_filename: "a.pdf".to_string(),
                copy_count: 1,
                is_color: false,
                notes: String::new(),
                status: JobStatus::Pending,
                handler_id: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                completed_at: None,
            },
            requester_name: name.to_string(),
            requester_email: email.to_string(),
            requester_role: role,
            handler_name: None,
            download_url: None,
        }
    }

    #[test]
    fn query_filter_matches_name_or_email_case_insensitively() {
        let v = view("Jo Bloggs", "jo.bloggs@example.com", Role::Staff);
        assert!(matches_query(&v, "bloggs"));
        assert!(matches_query(&v, "JO"));
        assert!(matches_query(&v, "example.com"));
        assert!(!matches_query(&v, "smith"));
    }

    #[test]
    fn job_item_round_trip() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(JOB_PK.to_string()));
        item.insert("SK".to_string(), AttributeValue::S(job_sk("j1")));
        item.insert(
            "requester_id".to_string(),
            AttributeValue::S("u1".to_string()),
        );
        item.insert(
            "file_path".to_string(),
            AttributeValue::S("u1/42-report.pdf".to_string()),
        );
        item.insert(
            "original_filename".to_string(),
            AttributeValue::S("report.pdf".to_string()),
        );
        item.insert("copy_count".to_string(), AttributeValue::N("3".to_string()));
        item.insert("is_color".to_string(), AttributeValue::Bool(false));
        item.insert(
            "notes".to_string(),
            AttributeValue::S("staple top-left".to_string()),
        );
        item.insert(
            "status".to_string(),
            AttributeValue::S("pending".to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S("2026-01-01T00:00:00Z".to_string()),
        );

        let job = job_from_item(&item).unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.copy_count, 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.handler_id.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn job_item_with_unknown_status_is_skipped() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(JOB_PK.to_string()));
        item.insert("SK".to_string(), AttributeValue::S(job_sk("j1")));
        item.insert(
            "status".to_string(),
            AttributeValue::S("archived".to_string()),
        );
        assert!(job_from_item(&item).is_none());
    }
}
