use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::PortalError;

/// Normalize a stored file reference to a bucket-relative object key.
///
/// Historical rows stored the full public URL; newer rows store the key
/// directly. Strips any of the public URL shapes for the configured bucket:
/// `https://{bucket}.s3.amazonaws.com/{key}`,
/// `https://{bucket}.s3.{region}.amazonaws.com/{key}`, and
/// `https://s3.{region}.amazonaws.com/{bucket}/{key}`. Idempotent;
/// unrecognized references pass through unchanged.
pub fn normalize_object_path(reference: &str, bucket: &str) -> String {
    let no_scheme = match reference
        .strip_prefix("https://")
        .or_else(|| reference.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return reference.to_string(),
    };

    let (host, path) = match no_scheme.split_once('/') {
        Some(parts) => parts,
        None => return reference.to_string(),
    };

    // Virtual-hosted: {bucket}.s3.amazonaws.com or {bucket}.s3.{region}.amazonaws.com
    if let Some(after_bucket) = host.strip_prefix(&format!("{}.s3", bucket)) {
        if after_bucket == ".amazonaws.com"
            || (after_bucket.starts_with('.') && after_bucket.ends_with(".amazonaws.com"))
        {
            return path.to_string();
        }
    }

    // Path-style: s3.{region}.amazonaws.com/{bucket}/{key}
    if host.starts_with("s3.") && host.ends_with(".amazonaws.com") {
        if let Some(key) = path.strip_prefix(&format!("{}/", bucket)) {
            return key.to_string();
        }
    }

    reference.to_string()
}

/// Requester-scoped object key for a new upload. Spaces in the original
/// file name become underscores.
pub fn object_key(requester_id: &str, file_name: &str, unix_millis: i64) -> String {
    format!(
        "{}/{}-{}",
        requester_id,
        unix_millis,
        file_name.replace(' ', "_")
    )
}

pub async fn upload_object(
    s3_client: &S3Client,
    bucket: &str,
    key: &str,
    bytes: Vec<u8>,
    content_type: Option<&str>,
) -> Result<(), PortalError> {
    let mut req = s3_client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(bytes));
    if let Some(ct) = content_type {
        req = req.content_type(ct);
    }
    req.send().await.map_err(|e| {
        tracing::error!("S3 put_object failed for {}: {:?}", key, e);
        PortalError::Storage("Failed to upload file".to_string())
    })?;
    Ok(())
}

pub async fn delete_object(
    s3_client: &S3Client,
    bucket: &str,
    key: &str,
) -> Result<(), PortalError> {
    s3_client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("S3 delete_object failed for {}: {:?}", key, e);
            PortalError::Storage("Failed to delete stored file".to_string())
        })?;
    Ok(())
}

/// Presign a GET for the stored object. Returns None instead of an error on
/// any minting failure so a single bad row never fails a whole listing.
pub async fn signed_download_url(
    s3_client: &S3Client,
    bucket: &str,
    reference: &str,
    ttl_seconds: u64,
) -> Option<String> {
    let key = normalize_object_path(reference, bucket);
    let config =
        match aws_sdk_s3::presigning::PresigningConfig::expires_in(std::time::Duration::from_secs(
            ttl_seconds,
        )) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Invalid presigning config: {:?}", e);
                return None;
            }
        };

    match s3_client
        .get_object()
        .bucket(bucket)
        .key(&key)
        .presigned(config)
        .await
    {
        Ok(presigned) => Some(presigned.uri().to_string()),
        Err(e) => {
            tracing::warn!("Failed to presign download for {}: {:?}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "scc-print-files";

    #[test]
    fn strips_virtual_hosted_url() {
        let url = format!("https://{}.s3.amazonaws.com/u1/42-report.pdf", BUCKET);
        assert_eq!(normalize_object_path(&url, BUCKET), "u1/42-report.pdf");
    }

    #[test]
    fn strips_region_qualified_virtual_hosted_url() {
        let url = format!(
            "https://{}.s3.ap-southeast-2.amazonaws.com/u1/42-report.pdf",
            BUCKET
        );
        assert_eq!(normalize_object_path(&url, BUCKET), "u1/42-report.pdf");
    }

    #[test]
    fn strips_path_style_url() {
        let url = format!(
            "https://s3.ap-southeast-2.amazonaws.com/{}/u1/42-report.pdf",
            BUCKET
        );
        assert_eq!(normalize_object_path(&url, BUCKET), "u1/42-report.pdf");
    }

    #[test]
    fn relative_path_passes_through() {
        assert_eq!(
            normalize_object_path("u1/42-report.pdf", BUCKET),
            "u1/42-report.pdf"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let url = format!("https://{}.s3.amazonaws.com/u1/42-report.pdf", BUCKET);
        let once = normalize_object_path(&url, BUCKET);
        let twice = normalize_object_path(&once, BUCKET);
        assert_eq!(once, twice);
        assert_eq!(once, normalize_object_path("u1/42-report.pdf", BUCKET));
    }

    #[test]
    fn other_buckets_and_hosts_pass_through() {
        let other = "https://other-bucket.s3.amazonaws.com/u1/42-report.pdf";
        assert_eq!(normalize_object_path(other, BUCKET), other);
        let elsewhere = "https://cdn.example.com/u1/42-report.pdf";
        assert_eq!(normalize_object_path(elsewhere, BUCKET), elsewhere);
    }

    #[test]
    fn object_key_replaces_spaces() {
        assert_eq!(
            object_key("u1", "term report final.pdf", 42),
            "u1/42-term_report_final.pdf"
        );
    }
}
