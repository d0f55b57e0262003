use lambda_http::{http::StatusCode, Body, Error, Request, Response};
use serde::Serialize;

use crate::error::PortalError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn base_builder(status: StatusCode) -> lambda_http::http::response::Builder {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
}

/// Serialize a payload to a JSON response with CORS headers.
pub fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response<Body>, Error> {
    Ok(base_builder(status)
        .body(serde_json::to_string(payload)?.into())
        .map_err(Box::new)?)
}

/// Map a domain error to its wire shape.
pub fn error_response(err: &PortalError) -> Result<Response<Body>, Error> {
    let mut body = serde_json::json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    if let PortalError::Deletion { storage_deleted, .. } = err {
        body["storage_deleted"] = serde_json::json!(storage_deleted);
    }
    Ok(base_builder(err.status_code())
        .body(body.to_string().into())
        .map_err(Box::new)?)
}

pub fn preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,DELETE,OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn not_found() -> Result<Response<Body>, Error> {
    Ok(base_builder(StatusCode::NOT_FOUND)
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    Ok(base_builder(StatusCode::METHOD_NOT_ALLOWED)
        .body(
            serde_json::json!({"error": "Method not allowed"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}

pub fn body_bytes(body: &Body) -> &[u8] {
    match body {
        Body::Text(text) => text.as_bytes(),
        Body::Binary(bytes) => bytes,
        Body::Empty => &[],
    }
}

/// Parse a JSON request body; malformed bodies (including unknown role or
/// status strings, which the closed enums refuse) surface as Validation.
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &Body) -> Result<T, PortalError> {
    serde_json::from_slice(body_bytes(body))
        .map_err(|e| PortalError::Validation(format!("Invalid request body: {}", e)))
}

/// Extract the bearer token from the Authorization header, if any.
pub fn bearer_token(event: &Request) -> Option<String> {
    event
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpdateUserRoleRequest;

    #[test]
    fn parse_json_rejects_malformed_body() {
        let err = parse_json::<UpdateUserRoleRequest>(&Body::Text("not json".to_string()))
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn parse_json_rejects_unknown_role() {
        let body = Body::Text(r#"{"userId":"u1","newRole":"superuser"}"#.to_string());
        let err = parse_json::<UpdateUserRoleRequest>(&body).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn parse_json_accepts_valid_role() {
        let body = Body::Text(r#"{"userId":"u1","newRole":"front-office"}"#.to_string());
        let req = parse_json::<UpdateUserRoleRequest>(&body).unwrap();
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.new_role, crate::types::Role::FrontOffice);
    }

    #[test]
    fn deletion_error_body_reports_which_half_completed() {
        let err = PortalError::Deletion {
            storage_deleted: true,
            message: "Failed to delete print job record".to_string(),
        };
        let resp = error_response(&err).unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = match resp.body() {
            Body::Text(t) => serde_json::from_str(t).unwrap(),
            _ => panic!("expected text body"),
        };
        assert_eq!(body["error"], "DeletionError");
        assert_eq!(body["storage_deleted"], true);
    }
}
