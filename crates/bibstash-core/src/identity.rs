//! Identity normalization
//!
//! Every record the store hands out carries a valid UUID v4 and a pair of
//! RFC 3339 timestamps (`created_at`, `timestamp`) in its `custom`
//! metadata. Normalization recovers what is already valid, migrates
//! legacy single-timestamp records, and mints anything still missing.
//! It is idempotent on already-valid input.

use bibstash_identifiers::is_valid_uuid_v4;
use uuid::Uuid;

use crate::record::CustomMeta;

/// Current time as an RFC 3339 string.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Normalize engine-owned metadata in place and return the record's UUID.
///
/// - A present, well-formed UUID v4 is kept verbatim; anything else is
///   replaced with a freshly minted one.
/// - A missing `created_at` is promoted from a legacy `timestamp` if one
///   exists, otherwise minted.
/// - A missing `timestamp` defaults to `created_at`: a record with no
///   modification history was last modified when it was created.
///
/// Unrecognized fields on `custom` are left untouched. Returning the
/// parsed UUID makes the "reference without a UUID" state unrepresentable
/// for callers that construct entities from the result.
pub fn normalize_custom(custom: &mut CustomMeta) -> Uuid {
    let kept = custom
        .uuid
        .as_deref()
        .filter(|u| is_valid_uuid_v4(u))
        .and_then(|u| Uuid::parse_str(u).ok());

    let uuid = match kept {
        Some(uuid) => uuid,
        None => {
            let minted = Uuid::new_v4();
            custom.uuid = Some(minted.to_string());
            minted
        }
    };

    if custom.created_at.is_none() {
        match custom.timestamp.clone() {
            // Legacy migration: single-timestamp records predate created_at
            Some(legacy) => custom.created_at = Some(legacy),
            None => custom.created_at = Some(now_iso()),
        }
    }

    if custom.timestamp.is_none() {
        custom.timestamp = custom.created_at.clone();
    }

    uuid
}
