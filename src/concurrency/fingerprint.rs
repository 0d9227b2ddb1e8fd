//! Content fingerprints (ETags)
//!
//! A fingerprint is the hex SHA-256 of a record's canonical serialization.
//! It goes out on the wire as a strong entity tag (`"<hex>"`); conditional
//! headers coming back in are normalized before comparison.

use sha2::{Digest, Sha256};

use crate::models::Plan;
use crate::types::Result;

/// Matches any existing record in a conditional header
pub const WILDCARD: &str = "*";

/// Hex SHA-256 of `body`
pub fn fingerprint(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a plan and fingerprint the result.
///
/// Returns `(body, fingerprint)`; the body is what gets stored and served.
pub fn fingerprint_plan(plan: &Plan) -> Result<(String, String)> {
    let body = plan.to_canonical_json()?;
    let fp = fingerprint(&body);
    Ok((body, fp))
}

/// Render a fingerprint as a strong entity tag
pub fn to_entity_tag(fp: &str) -> String {
    format!("\"{}\"", fp)
}

/// Strip a weak prefix and surrounding quotes from one entity tag
pub fn normalize(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

/// Whether a conditional header value matches the current fingerprint.
///
/// Accepts `*` and comma-separated lists of (possibly weak) entity tags.
pub fn header_matches(header: &str, current: &str) -> bool {
    header
        .split(',')
        .map(normalize)
        .any(|tag| tag == WILDCARD || tag == current)
}
