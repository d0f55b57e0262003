//! Session/role guard. Every protected route re-verifies the caller from
//! scratch: bearer token -> Cognito GetUser -> profile row -> role check.
//! There is no cross-request session cache.

use crate::error::PortalError;
use crate::profiles;
use crate::types::{Caller, Role};
use crate::AppState;

fn role_allowed(role: Role, allowed: &[Role]) -> bool {
    // Unassigned never passes a role gate, even if listed by mistake
    role != Role::Unassigned && allowed.contains(&role)
}

/// Best-effort revocation of the caller's tokens before a rejection.
async fn force_sign_out(state: &AppState, access_token: &str) {
    if let Err(e) = state
        .cognito_client
        .global_sign_out()
        .access_token(access_token)
        .send()
        .await
    {
        tracing::warn!("Forced sign-out failed: {:?}", e);
    }
}

/// Resolve a bearer token to the caller's merged identity+profile.
pub async fn authenticate(state: &AppState, token: Option<&str>) -> Result<Caller, PortalError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(PortalError::Authentication(
                "Missing authorization token".to_string(),
            ))
        }
    };

    let user = state
        .cognito_client
        .get_user()
        .access_token(token)
        .send()
        .await
        .map_err(|e| {
            tracing::info!("Token rejected by identity provider: {:?}", e);
            PortalError::Authentication("Invalid or expired session".to_string())
        })?;

    let mut user_id = None;
    let mut email = None;
    for attr in user.user_attributes() {
        match attr.name() {
            "sub" => user_id = attr.value().map(|v| v.to_string()),
            "email" => email = attr.value().map(|v| v.to_string()),
            _ => {}
        }
    }
    let user_id = user_id.ok_or_else(|| {
        PortalError::Authentication("Identity record is missing its subject".to_string())
    })?;

    let profile =
        match profiles::get_profile(&state.dynamo_client, &state.config.table_name, &user_id).await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!("Authenticated user {} has no profile row", user_id);
                force_sign_out(state, token).await;
                return Err(PortalError::Authentication("Profile not found".to_string()));
            }
            Err(_) => {
                force_sign_out(state, token).await;
                return Err(PortalError::Authentication(
                    "Profile could not be read".to_string(),
                ));
            }
        };

    Ok(Caller {
        user_id,
        email: email.unwrap_or_else(|| profile.email.clone()),
        full_name: profile.full_name,
        role: profile.role,
    })
}

/// Authenticate, then require one of the allowed roles. A wrong-role caller
/// is signed out before the rejection, matching the strict page guards.
pub async fn require_role(
    state: &AppState,
    token: Option<&str>,
    allowed: &[Role],
) -> Result<Caller, PortalError> {
    let caller = authenticate(state, token).await?;
    if !role_allowed(caller.role, allowed) {
        tracing::warn!(
            "User {} with role {} rejected by role gate",
            caller.user_id,
            caller.role.as_str()
        );
        if let Some(token) = token {
            force_sign_out(state, token).await;
        }
        return Err(PortalError::Authorization(
            "Your role does not permit this action".to_string(),
        ));
    }
    Ok(caller)
}

/// Any role an admin could have granted.
pub const ANY_ASSIGNED: &[Role] = &[Role::Staff, Role::FrontOffice, Role::Admin];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_never_passes_a_gate() {
        assert!(!role_allowed(Role::Unassigned, ANY_ASSIGNED));
        assert!(!role_allowed(Role::Unassigned, &[Role::Unassigned]));
    }

    #[test]
    fn exact_and_union_gates() {
        assert!(role_allowed(Role::Staff, &[Role::Staff]));
        assert!(!role_allowed(Role::Staff, &[Role::FrontOffice, Role::Admin]));
        assert!(role_allowed(Role::FrontOffice, &[Role::FrontOffice, Role::Admin]));
        assert!(role_allowed(Role::Admin, &[Role::FrontOffice, Role::Admin]));
        assert!(!role_allowed(Role::FrontOffice, &[Role::Admin]));
    }

    #[test]
    fn any_assigned_covers_the_three_working_roles() {
        for role in [Role::Staff, Role::FrontOffice, Role::Admin] {
            assert!(role_allowed(role, ANY_ASSIGNED));
        }
    }
}
