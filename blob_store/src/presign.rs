//! Expiry bounds for presigned URLs.

use std::time::Duration;

/// Default lifetime of a presigned GET URL.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Maximum presigned URL expiry (7 days for S3).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Validate presigned URL expiry duration.
pub fn validate_expiry(expires_in: Duration) -> Result<(), String> {
    if expires_in > MAX_PRESIGN_EXPIRY {
        Err(format!(
            "Expiry duration {:?} exceeds maximum allowed {:?}",
            expires_in, MAX_PRESIGN_EXPIRY
        ))
    } else if expires_in.is_zero() {
        Err("Expiry duration must be greater than zero".to_string())
    } else {
        Ok(())
    }
}
