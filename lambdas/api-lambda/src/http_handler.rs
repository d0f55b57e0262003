use lambda_http::{
    http::Method, Body, Error, Request, RequestExt, Response,
};
use portal_shared::types::Role;
use portal_shared::{admin, auth, guard, http, jobs, AppState};
use std::sync::Arc;

/// Single router for the portal API. Every protected route runs the
/// session/role guard before touching any data.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("Portal API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return http::preflight();
    }

    let token = http::bearer_token(&event);
    let body = event.body();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&method, parts.as_slice()) {
        // --- AUTH ---
        (&Method::POST, ["auth", "login"]) => auth::login(&state, body).await,
        (&Method::POST, ["auth", "register"]) => auth::register(&state, body).await,
        (&Method::POST, ["auth", "logout"]) => auth::logout(&state, token.as_deref()).await,
        (&Method::GET, ["auth", "session"]) => auth::session(&state, token.as_deref()).await,
        (&Method::POST, ["auth", "forgot-password"]) => {
            auth::forgot_password(&state, body).await
        }
        (&Method::POST, ["auth", "reset-password"]) => auth::reset_password(&state, body).await,
        (
            _,
            ["auth", "login" | "register" | "logout" | "session" | "forgot-password"
            | "reset-password"],
        ) => http::method_not_allowed(),

        // --- PRINT JOBS ---
        // POST /jobs - staff submit a new job
        (&Method::POST, ["jobs"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Staff]).await {
                Ok(caller) => jobs::submit(&state, &caller, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        // GET /jobs - role-scoped listing, with optional q/role filters
        (&Method::GET, ["jobs"]) => {
            match guard::require_role(&state, token.as_deref(), guard::ANY_ASSIGNED).await {
                Ok(caller) => {
                    let params = event.query_string_parameters();
                    let q = params.first("q");
                    let role_filter = params.first("role");
                    jobs::list(&state, &caller, q, role_filter).await
                }
                Err(e) => http::error_response(&e),
            }
        }
        // GET /jobs/stats - caller's own pending/completed counters
        (&Method::GET, ["jobs", "stats"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Staff]).await {
                Ok(caller) => jobs::stats(&state, &caller).await,
                Err(e) => http::error_response(&e),
            }
        }
        // POST /jobs/{id}/status - front office works the queue
        (&Method::POST, ["jobs", job_id, "status"]) => {
            match guard::require_role(
                &state,
                token.as_deref(),
                &[Role::FrontOffice, Role::Admin],
            )
            .await
            {
                Ok(caller) => jobs::update_status(&state, &caller, job_id, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        // /jobs/stats is a literal path, never a job id
        (_, ["jobs", "stats"]) => http::method_not_allowed(),
        // DELETE /jobs/{id} - requester-only, checked inside
        (&Method::DELETE, ["jobs", job_id]) => {
            match guard::require_role(&state, token.as_deref(), guard::ANY_ASSIGNED).await {
                Ok(caller) => jobs::delete_job(&state, &caller, job_id).await,
                Err(e) => http::error_response(&e),
            }
        }
        (_, ["jobs"]) | (_, ["jobs", _, "status"]) | (_, ["jobs", _]) => {
            http::method_not_allowed()
        }

        // --- ADMIN ---
        (&Method::GET, ["admin", "stats"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(_caller) => admin::stats(&state).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::POST, ["admin", "create-user"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(_caller) => admin::create_user(&state, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::POST, ["admin", "delete-user"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(caller) => admin::delete_user(&state, &caller, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::POST, ["admin", "update-user-role"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(_caller) => admin::update_user_role(&state, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::POST, ["admin", "update-print-job"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(caller) => admin::update_print_job(&state, &caller, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        // manage-users: GET lists, PUT reassigns a role, DELETE removes a user
        (&Method::GET, ["admin", "manage-users"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(_caller) => admin::list_users(&state).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::PUT, ["admin", "manage-users"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(_caller) => admin::update_user_role(&state, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        (&Method::DELETE, ["admin", "manage-users"]) => {
            match guard::require_role(&state, token.as_deref(), &[Role::Admin]).await {
                Ok(caller) => admin::delete_user(&state, &caller, body).await,
                Err(e) => http::error_response(&e),
            }
        }
        (
            _,
            ["admin", "stats" | "create-user" | "delete-user" | "update-user-role"
            | "update-print-job" | "manage-users"],
        ) => http::method_not_allowed(),

        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            http::not_found()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::StatusCode;
    use portal_shared::Config;

    fn test_state() -> Arc<AppState> {
        let sdk_config = aws_config::SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        AppState::new(
            aws_sdk_cognitoidentityprovider::Client::new(&sdk_config),
            aws_sdk_dynamodb::Client::new(&sdk_config),
            aws_sdk_s3::Client::new(&sdk_config),
            Config {
                table_name: "scc-portal".to_string(),
                files_bucket: "scc-print-files".to_string(),
                cognito_client_id: "client".to_string(),
                cognito_client_secret: "secret".to_string(),
                cognito_user_pool_id: "pool".to_string(),
                signed_url_ttl_secs: 3600,
                notes_max_len: 25,
            },
        )
    }

    fn request(method: &str, uri: &str) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::Empty)
            .unwrap()
    }

    #[tokio::test]
    async fn delete_on_the_stats_path_is_method_not_allowed() {
        // "stats" is a literal path segment; it must never be read as a job id
        let resp = function_handler(request("DELETE", "/jobs/stats"), test_state())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let resp = function_handler(request("GET", "/nope"), test_state())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_is_answered_directly() {
        let resp = function_handler(request("OPTIONS", "/jobs"), test_state())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
