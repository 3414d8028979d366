//! Random identifiers for registrations and tenant clusters
//!
//! Identifiers are `[a-z0-9]` strings of fixed length. Collisions are not
//! checked for: 10 characters give a 36^10 space.

use rand::distributions::Uniform;
use rand::Rng;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated identifiers
pub const ID_LENGTH: usize = 10;

/// Prefix of tenant cluster ids, which double as backend resource names
pub const TENANT_CLUSTER_PREFIX: &str = "tcp-";

/// Prefix of the backend object holding a registration
pub const REGISTRATION_OBJECT_PREFIX: &str = "mc-";

pub fn random_string(length: usize) -> String {
    let dist = Uniform::from(0..CHARSET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(length)
        .map(|i| CHARSET[i] as char)
        .collect()
}

/// Id for a new management-cluster registration
pub fn registration_id() -> String {
    random_string(ID_LENGTH)
}

/// Id for a new tenant cluster
pub fn tenant_cluster_id() -> String {
    format!("{}{}", TENANT_CLUSTER_PREFIX, random_string(ID_LENGTH))
}

/// Name of the backend object storing the registration `id`
pub fn registration_object_name(id: &str) -> String {
    format!("{}{}", REGISTRATION_OBJECT_PREFIX, id)
}

/// Recover a registration id from its backend object name
pub fn id_from_object_name(name: &str) -> Option<&str> {
    name.strip_prefix(REGISTRATION_OBJECT_PREFIX)
        .filter(|id| !id.is_empty())
}
