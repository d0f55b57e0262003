use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{http::StatusCode, Body, Error, Response};
use sha2::Sha256;

use crate::error::PortalError;
use crate::guard;
use crate::http;
use crate::profiles;
use crate::types::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, Profile, RegisterRequest,
    ResetPasswordRequest, Role,
};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
pub fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> String {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    general_purpose::STANDARD.encode(result.into_bytes())
}

/// At least 8 characters with upper, lower, digit and a special character.
fn validate_password(password: &str) -> Result<(), PortalError> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());
    if long_enough && has_upper && has_lower && has_digit && has_special {
        Ok(())
    } else {
        Err(PortalError::Validation(
            "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
                .to_string(),
        ))
    }
}

fn friendly_login_error(raw: &str) -> String {
    if raw.contains("NotAuthorizedException") {
        "Incorrect email or password".to_string()
    } else if raw.contains("UserNotConfirmedException") {
        "Please verify your email before logging in".to_string()
    } else if raw.contains("UserNotFoundException") {
        "No account found with this email".to_string()
    } else if raw.contains("PasswordResetRequiredException") {
        "Password reset required".to_string()
    } else if raw.contains("TooManyRequestsException") {
        "Too many login attempts. Please try again later".to_string()
    } else {
        "Login failed. Please check your credentials".to_string()
    }
}

/// Password sign-in. Responds with tokens, the merged identity+profile, and
/// the dashboard path for the caller's role. An unassigned profile is signed
/// back out and rejected.
pub async fn login(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: LoginRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };

    tracing::info!("Authenticating user: {}", req.email);

    let secret_hash = compute_secret_hash(
        &req.email,
        &state.config.cognito_client_id,
        &state.config.cognito_client_secret,
    );

    let auth_result = state
        .cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::UserPasswordAuth)
        .client_id(&state.config.cognito_client_id)
        .auth_parameters("USERNAME", &req.email)
        .auth_parameters("PASSWORD", &req.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    let tokens = match auth_result {
        Ok(response) => match response.authentication_result {
            Some(tokens) => tokens,
            None => {
                tracing::error!("No authentication result returned for {}", req.email);
                return http::error_response(&PortalError::Authentication(
                    "Login failed. Please check your credentials".to_string(),
                ));
            }
        },
        Err(e) => {
            let raw = format!("{:?}", e);
            tracing::error!("Cognito authentication error: {}", raw);
            return http::error_response(&PortalError::Authentication(friendly_login_error(
                &raw,
            )));
        }
    };

    let access_token = tokens.access_token().unwrap_or_default().to_string();

    // Resolve the profile the same way every protected route does
    let caller = match guard::authenticate(state, Some(&access_token)).await {
        Ok(caller) => caller,
        Err(e) => return http::error_response(&e),
    };

    let redirect = match caller.role.dashboard_path() {
        Some(path) => path.to_string(),
        None => {
            // No role yet: revoke the session we just minted
            let _ = state
                .cognito_client
                .global_sign_out()
                .access_token(&access_token)
                .send()
                .await;
            return http::error_response(&PortalError::Authorization(
                "Your account has not been assigned a role yet".to_string(),
            ));
        }
    };

    tracing::info!("Login successful for {} ({})", req.email, caller.role.as_str());

    let response = LoginResponse {
        id_token: tokens.id_token().unwrap_or_default().to_string(),
        access_token,
        refresh_token: tokens.refresh_token().unwrap_or_default().to_string(),
        expires_in: tokens.expires_in(),
        user: caller,
        redirect,
    };
    http::json_response(StatusCode::OK, &response)
}

/// Self-service registration. The profile is created with role `unassigned`;
/// an admin grants a working role afterwards.
pub async fn register(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: RegisterRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };

    if req.full_name.trim().is_empty() || req.email.trim().is_empty() {
        return http::error_response(&PortalError::Validation(
            "Full name and email are required".to_string(),
        ));
    }
    if let Err(e) = validate_password(&req.password) {
        return http::error_response(&e);
    }

    tracing::info!("Signing up user: {}", req.email);

    let secret_hash = compute_secret_hash(
        &req.email,
        &state.config.cognito_client_id,
        &state.config.cognito_client_secret,
    );

    let signup_result = state
        .cognito_client
        .sign_up()
        .client_id(&state.config.cognito_client_id)
        .username(&req.email)
        .password(&req.password)
        .secret_hash(&secret_hash)
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email")
                .value(&req.email)
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

    // The profile row is keyed by the identity subject
    let user_sub = match signup_result {
        Ok(response) => response.user_sub().to_string(),
        Err(e) => {
            let raw = format!("{:?}", e);
            tracing::error!("Cognito signup error: {}", raw);
            let message = if raw.contains("InvalidPasswordException") {
                "Password must contain at least 8 characters with uppercase, lowercase, number, and special character".to_string()
            } else if raw.contains("UsernameExistsException") {
                "An account with this email already exists".to_string()
            } else if raw.contains("InvalidParameterException") {
                "Invalid email or password format".to_string()
            } else {
                "Signup failed. Please check your details and try again".to_string()
            };
            return http::error_response(&PortalError::Validation(message));
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let profile = Profile {
        user_id: user_sub,
        full_name: req.full_name.trim().to_string(),
        email: req.email.trim().to_string(),
        role: Role::Unassigned,
        created_at: now.clone(),
        updated_at: now,
    };
    if let Err(e) = profiles::put_profile(&state.dynamo_client, &state.config.table_name, &profile)
        .await
    {
        // The identity exists but the profile insert failed; the guard will
        // refuse this user until an admin recreates the row.
        tracing::error!("Profile insert failed after signup for {}", profile.email);
        return http::error_response(&e);
    }

    tracing::info!("Signup successful for {}", profile.email);
    http::json_response(
        StatusCode::OK,
        &serde_json::json!({"message": "Registration successful. Please verify your email, then wait for a role assignment."}),
    )
}

pub async fn logout(state: &AppState, token: Option<&str>) -> Result<Response<Body>, Error> {
    let token = match token {
        Some(t) => t,
        None => {
            return http::error_response(&PortalError::Authentication(
                "Missing authorization token".to_string(),
            ))
        }
    };
    if let Err(e) = state
        .cognito_client
        .global_sign_out()
        .access_token(token)
        .send()
        .await
    {
        tracing::warn!("Sign-out failed: {:?}", e);
        return http::error_response(&PortalError::Authentication(
            "Invalid or expired session".to_string(),
        ));
    }
    http::json_response(StatusCode::OK, &serde_json::json!({"message": "Signed out"}))
}

/// The merged identity+profile object for the current session.
pub async fn session(state: &AppState, token: Option<&str>) -> Result<Response<Body>, Error> {
    match guard::authenticate(state, token).await {
        Ok(caller) => http::json_response(StatusCode::OK, &caller),
        Err(e) => http::error_response(&e),
    }
}

/// Start password recovery; Cognito delivers the code to the user's email.
/// The response is the same whether or not the account exists.
pub async fn forgot_password(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: ForgotPasswordRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };

    let secret_hash = compute_secret_hash(
        &req.email,
        &state.config.cognito_client_id,
        &state.config.cognito_client_secret,
    );

    if let Err(e) = state
        .cognito_client
        .forgot_password()
        .client_id(&state.config.cognito_client_id)
        .secret_hash(&secret_hash)
        .username(&req.email)
        .send()
        .await
    {
        tracing::warn!("Forgot-password request failed for {}: {:?}", req.email, e);
    }

    http::json_response(
        StatusCode::OK,
        &serde_json::json!({"message": "If an account exists for that email, a reset code has been sent"}),
    )
}

/// Complete password recovery with the emailed code.
pub async fn reset_password(state: &AppState, body: &Body) -> Result<Response<Body>, Error> {
    let req: ResetPasswordRequest = match http::parse_json(body) {
        Ok(r) => r,
        Err(e) => return http::error_response(&e),
    };
    if let Err(e) = validate_password(&req.new_password) {
        return http::error_response(&e);
    }

    let secret_hash = compute_secret_hash(
        &req.email,
        &state.config.cognito_client_id,
        &state.config.cognito_client_secret,
    );

    let result = state
        .cognito_client
        .confirm_forgot_password()
        .client_id(&state.config.cognito_client_id)
        .secret_hash(&secret_hash)
        .username(&req.email)
        .confirmation_code(&req.code)
        .password(&req.new_password)
        .send()
        .await;

    match result {
        Ok(_) => http::json_response(
            StatusCode::OK,
            &serde_json::json!({"message": "Password updated. You can now log in"}),
        ),
        Err(e) => {
            let raw = format!("{:?}", e);
            tracing::error!("Password reset failed for {}: {}", req.email, raw);
            let message = if raw.contains("CodeMismatchException") {
                "The reset code is incorrect".to_string()
            } else if raw.contains("ExpiredCodeException") {
                "The reset code has expired; request a new one".to_string()
            } else {
                "Password reset failed. Request a new code and try again".to_string()
            };
            http::error_response(&PortalError::Validation(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_complexity_enforced() {
        assert!(validate_password("Aa1!aaaa").is_ok());
        assert!(validate_password("short1!A").is_ok());
        // Each missing class rejected
        assert!(validate_password("aa1!aaaa").is_err()); // no upper
        assert!(validate_password("AA1!AAAA").is_err()); // no lower
        assert!(validate_password("Aa!aaaaa").is_err()); // no digit
        assert!(validate_password("Aa1aaaaa").is_err()); // no special
        assert!(validate_password("Aa1!a").is_err()); // too short
    }

    #[test]
    fn secret_hash_is_deterministic() {
        let a = compute_secret_hash("jo@example.com", "client", "secret");
        let b = compute_secret_hash("jo@example.com", "client", "secret");
        assert_eq!(a, b);
        let c = compute_secret_hash("other@example.com", "client", "secret");
        assert_ne!(a, c);
    }

    #[test]
    fn login_errors_map_to_friendly_messages() {
        assert_eq!(
            friendly_login_error("... NotAuthorizedException ..."),
            "Incorrect email or password"
        );
        assert_eq!(
            friendly_login_error("... UserNotFoundException ..."),
            "No account found with this email"
        );
        assert_eq!(
            friendly_login_error("something else"),
            "Login failed. Please check your credentials"
        );
    }
}
