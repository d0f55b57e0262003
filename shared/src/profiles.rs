use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use crate::error::PortalError;
use crate::types::{Profile, Role};

/// Static partition: all profiles live under PK = "PROFILE" so the admin
/// listing is a query, not a scan.
pub const PROFILE_PK: &str = "PROFILE";

pub fn profile_sk(user_id: &str) -> String {
    format!("PROFILE#{}", user_id)
}

pub fn profile_from_item(item: &HashMap<String, AttributeValue>) -> Option<Profile> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let user_id = sk.strip_prefix("PROFILE#")?.to_string();
    let role = item
        .get("role")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Role::parse(s))
        .unwrap_or(Role::Unassigned);
    Some(Profile {
        user_id,
        full_name: item
            .get("full_name")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        email: item
            .get("email")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        role,
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        updated_at: item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
    })
}

pub async fn get_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<Profile>, PortalError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(PROFILE_PK.to_string()))
        .key("SK", AttributeValue::S(profile_sk(user_id)))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch profile {}: {:?}", user_id, e);
            PortalError::Persistence("Failed to fetch profile".to_string())
        })?;

    Ok(result.item().and_then(profile_from_item))
}

pub async fn put_profile(
    client: &DynamoClient,
    table_name: &str,
    profile: &Profile,
) -> Result<(), PortalError> {
    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(PROFILE_PK.to_string()))
        .item("SK", AttributeValue::S(profile_sk(&profile.user_id)))
        .item("full_name", AttributeValue::S(profile.full_name.clone()))
        .item("email", AttributeValue::S(profile.email.clone()))
        .item("role", AttributeValue::S(profile.role.as_str().to_string()))
        .item("created_at", AttributeValue::S(profile.created_at.clone()))
        .item("updated_at", AttributeValue::S(profile.updated_at.clone()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to store profile {}: {:?}", profile.user_id, e);
            PortalError::Persistence("Failed to store profile".to_string())
        })?;
    Ok(())
}

/// Reassign a profile's role. The condition expression turns "no such row"
/// into NotFound instead of silently upserting one.
pub async fn update_profile_role(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    role: Role,
) -> Result<(), PortalError> {
    let now = chrono::Utc::now().to_rfc3339();
    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(PROFILE_PK.to_string()))
        .key("SK", AttributeValue::S(profile_sk(user_id)))
        .update_expression("SET #role = :role, updated_at = :now")
        .condition_expression("attribute_exists(PK)")
        .expression_attribute_names("#role", "role")
        .expression_attribute_values(":role", AttributeValue::S(role.as_str().to_string()))
        .expression_attribute_values(":now", AttributeValue::S(now))
        .send()
        .await
        .map_err(|e| {
            let msg = format!("{:?}", e);
            if msg.contains("ConditionalCheckFailed") {
                PortalError::NotFound("Profile not found".to_string())
            } else {
                tracing::error!("Failed to update role for {}: {}", user_id, msg);
                PortalError::Persistence("Failed to update role".to_string())
            }
        })?;
    Ok(())
}

pub async fn delete_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<(), PortalError> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(PROFILE_PK.to_string()))
        .key("SK", AttributeValue::S(profile_sk(user_id)))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete profile {}: {:?}", user_id, e);
            PortalError::Persistence("Failed to delete profile".to_string())
        })?;
    Ok(())
}

/// All profiles, most recently updated first.
pub async fn list_profiles(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Profile>, PortalError> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(PROFILE_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("PROFILE#".to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to list profiles: {:?}", e);
            PortalError::Persistence("Failed to list users".to_string())
        })?;

    let mut profiles: Vec<Profile> = result
        .items()
        .iter()
        .filter_map(profile_from_item)
        .collect();
    profiles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(profiles)
}

/// Batch-fetch profiles by id, for joining display names onto job rows.
pub async fn batch_get_profiles(
    client: &DynamoClient,
    table_name: &str,
    user_ids: &[String],
) -> Result<HashMap<String, Profile>, PortalError> {
    let mut profiles = HashMap::new();
    if user_ids.is_empty() {
        return Ok(profiles);
    }

    // DynamoDB allows up to 100 keys per batch
    for chunk in user_ids.chunks(100) {
        let mut keys = Vec::new();
        for user_id in chunk {
            let mut key = HashMap::new();
            key.insert("PK".to_string(), AttributeValue::S(PROFILE_PK.to_string()));
            key.insert("SK".to_string(), AttributeValue::S(profile_sk(user_id)));
            keys.push(key);
        }

        let batch_result = client
            .batch_get_item()
            .request_items(
                table_name,
                aws_sdk_dynamodb::types::KeysAndAttributes::builder()
                    .set_keys(Some(keys))
                    .build()
                    .map_err(|e| {
                        tracing::error!("Failed to build batch get request: {:?}", e);
                        PortalError::Persistence("Failed to fetch profiles".to_string())
                    })?,
            )
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Batch profile fetch failed: {:?}", e);
                PortalError::Persistence("Failed to fetch profiles".to_string())
            })?;

        if let Some(responses) = batch_result.responses() {
            if let Some(items) = responses.get(table_name) {
                for item in items {
                    if let Some(profile) = profile_from_item(item) {
                        profiles.insert(profile.user_id.clone(), profile);
                    }
                }
            }
        }
    }

    Ok(profiles)
}

/// Total profile count, COUNT-projected so no items come back.
pub async fn count_profiles(client: &DynamoClient, table_name: &str) -> Result<i32, PortalError> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(PROFILE_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("PROFILE#".to_string()))
        .select(Select::Count)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to count profiles: {:?}", e);
            PortalError::Persistence("Failed to count users".to_string())
        })?;
    Ok(result.count())
}
