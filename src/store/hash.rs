//! Content fingerprints of entity sets.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::graph::Entity;

/// Hex characters kept from the SHA-256 digest.
pub const HASH_LEN: usize = 16;

/// Timestamps change on every re-add and never affect generated content.
const VOLATILE_FIELDS: &[&str] = &["created_at", "updated_at"];

/// Order-independent fingerprint of `entities`.
///
/// Entities are sorted by id and serialized as JSON without timestamps
/// before hashing. Keys come out sorted because serde_json's default `Map`
/// is a `BTreeMap`; the crate must not enable `preserve_order`.
pub fn compute_entity_hash<'a, I>(entities: I) -> String
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut sorted: Vec<&Entity> = entities.into_iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));

    let canonical: Vec<Value> = sorted
        .into_iter()
        .map(|entity| {
            let mut value = entity.to_dict();
            if let Value::Object(map) = &mut value {
                for field in VOLATILE_FIELDS {
                    map.remove(*field);
                }
            }
            value
        })
        .collect();

    let text = Value::Array(canonical).to_string();
    let digest = Sha256::digest(text.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}
