//! Admin-only operations: user provisioning, role reassignment, user
//! deletion, and the admin job-status endpoint. Every caller here has
//! already passed the admin role gate.

use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::error::PortalError;
use crate::http;
use crate::jobs;
use crate::profiles;
use crate::types::{
    AdminUpdateJobRequest, Caller, CreateUserRequest, DeleteUserRequest, Profile,
    UpdateUserRoleRequest,
};
use crate::AppState;

/// Provision a user with a working role: identity first (invitation email
/// suppressed, password set permanent), then the profile row.
pub async fn create_user(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: CreateUserRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };

    if req.email.trim().is_empty() || req.password.is_empty() || req.full_name.trim().is_empty() {
        return http::error_response(&PortalError::Validation(
            "email, password, full_name and role are required".to_string(),
        ));
    }
    if !req.role.is_assignable() {
        return http::error_response(&PortalError::Validation(
            "Role must be one of staff, front-office, scc-admin".to_string(),
        ));
    }

    tracing::info!("Creating user {} with role {}", req.email, req.role.as_str());

    let created = state
        .cognito_client
        .admin_create_user()
        .user_pool_id(&state.config.cognito_user_pool_id)
        .username(&req.email)
        .message_action(aws_sdk_cognitoidentityprovider::types::MessageActionType::Suppress)
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email")
                .value(&req.email)
                .build()?,
        )
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email_verified")
                .value("true")
                .build()?,
        )
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("name")
                .value(&req.full_name)
                .build()?,
        )
        .send()
        .await;

    let user_sub = match created {
        Ok(response) => response
            .user()
            .and_then(|u| {
                u.attributes()
                    .iter()
                    .find(|a| a.name() == "sub")
                    .and_then(|a| a.value())
            })
            .map(|s| s.to_string()),
        Err(e) => {
            let raw = format!("{:?}", e);
            tracing::error!("AdminCreateUser failed for {}: {}", req.email, raw);
            let err = if raw.contains("UsernameExistsException") {
                PortalError::Validation("An account with this email already exists".to_string())
            } else if raw.contains("InvalidParameterException") {
                PortalError::Validation("Invalid email format".to_string())
            } else {
                PortalError::Persistence("Failed to create user".to_string())
            };
            return http::error_response(&err);
        }
    };

    let user_sub = match user_sub {
        Some(sub) => sub,
        None => {
            tracing::error!("AdminCreateUser returned no subject for {}", req.email);
            return http::error_response(&PortalError::Persistence(
                "Failed to create user".to_string(),
            ));
        }
    };

    if let Err(e) = state
        .cognito_client
        .admin_set_user_password()
        .user_pool_id(&state.config.cognito_user_pool_id)
        .username(&req.email)
        .password(&req.password)
        .permanent(true)
        .send()
        .await
    {
        let raw = format!("{:?}", e);
        tracing::error!("AdminSetUserPassword failed for {}: {}", req.email, raw);
        let err = if raw.contains("InvalidPasswordException") {
            PortalError::Validation(
                "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
                    .to_string(),
            )
        } else {
            PortalError::Persistence("Failed to set the user's password".to_string())
        };
        return http::error_response(&err);
    }

    let now = chrono::Utc::now().to_rfc3339();
    let profile = Profile {
        user_id: user_sub,
        full_name: req.full_name.trim().to_string(),
        email: req.email.trim().to_string(),
        role: req.role,
        created_at: now.clone(),
        updated_at: now,
    };
    if let Err(e) = profiles::put_profile(&state.dynamo_client, &state.config.table_name, &profile)
        .await
    {
        return http::error_response(&e);
    }

    tracing::info!("User {} created as {}", profile.email, profile.role.as_str());
    http::json_response(StatusCode::CREATED, &profile)
}

/// Remove a user: identity record first, then the profile row. Admins may
/// not delete themselves.
pub async fn delete_user(
    state: &AppState,
    caller: &Caller,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let req: DeleteUserRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    if req.user_id.trim().is_empty() {
        return http::error_response(&PortalError::Validation(
            "userId is required".to_string(),
        ));
    }
    if req.user_id == caller.user_id {
        return http::error_response(&PortalError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    // The Cognito username is the email, mirrored on the profile row
    let profile = match profiles::get_profile(
        &state.dynamo_client,
        &state.config.table_name,
        &req.user_id,
    )
    .await
    {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return http::error_response(&PortalError::NotFound("User not found".to_string()))
        }
        Err(e) => return http::error_response(&e),
    };

    if let Err(e) = state
        .cognito_client
        .admin_delete_user()
        .user_pool_id(&state.config.cognito_user_pool_id)
        .username(&profile.email)
        .send()
        .await
    {
        let raw = format!("{:?}", e);
        // A missing identity is fine; the profile row is still removed below
        if !raw.contains("UserNotFoundException") {
            tracing::error!("AdminDeleteUser failed for {}: {}", profile.email, raw);
            return http::error_response(&PortalError::Persistence(
                "Failed to delete user".to_string(),
            ));
        }
    }

    if let Err(e) =
        profiles::delete_profile(&state.dynamo_client, &state.config.table_name, &req.user_id)
            .await
    {
        return http::error_response(&e);
    }

    tracing::info!("User {} deleted by admin {}", req.user_id, caller.user_id);
    http::json_response(
        StatusCode::OK,
        &serde_json::json!({"success": true, "message": "User deleted"}),
    )
}

/// Reassign a user's role. The role already parsed against the closed enum;
/// `unassigned` is additionally refused as a grant.
pub async fn update_user_role(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: UpdateUserRoleRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    if req.user_id.trim().is_empty() {
        return http::error_response(&PortalError::Validation(
            "userId is required".to_string(),
        ));
    }
    if !req.new_role.is_assignable() {
        return http::error_response(&PortalError::Validation(
            "Role must be one of staff, front-office, scc-admin".to_string(),
        ));
    }

    match profiles::update_profile_role(
        &state.dynamo_client,
        &state.config.table_name,
        &req.user_id,
        req.new_role,
    )
    .await
    {
        Ok(()) => {
            tracing::info!("Role of {} set to {}", req.user_id, req.new_role.as_str());
            http::json_response(
                StatusCode::OK,
                &serde_json::json!({"success": true, "message": "Role updated successfully"}),
            )
        }
        Err(e) => http::error_response(&e),
    }
}

/// Merged profile+email listing for the manage-users screen, most recently
/// updated first.
pub async fn list_users(state: &AppState) -> Result<Response<Body>, Error> {
    match profiles::list_profiles(&state.dynamo_client, &state.config.table_name).await {
        Ok(users) => http::json_response(StatusCode::OK, &serde_json::json!({ "users": users })),
        Err(e) => http::error_response(&e),
    }
}

/// Admin path for the job-status transition; same semantics as the
/// front-office endpoint.
pub async fn update_print_job(
    state: &AppState,
    caller: &Caller,
    body: &Body,
) -> Result<Response<Body>, Error> {
    if !crate::policy::can_transition_jobs(caller.role) {
        return http::error_response(&PortalError::Authorization(
            "Your role does not permit working the print queue".to_string(),
        ));
    }
    let req: AdminUpdateJobRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    match jobs::transition(state, &caller.user_id, &req.job_id, req.new_status).await {
        Ok(()) => http::json_response(
            StatusCode::OK,
            &serde_json::json!({"success": true, "message": "Job status updated"}),
        ),
        Err(e) => http::error_response(&e),
    }
}

/// Total user count for the admin dashboard header.
pub async fn stats(state: &AppState) -> Result<Response<Body>, Error> {
    match profiles::count_profiles(&state.dynamo_client, &state.config.table_name).await {
        Ok(count) => {
            http::json_response(StatusCode::OK, &serde_json::json!({ "userCount": count }))
        }
        Err(e) => http::error_response(&e),
    }
}
